//! Speech output adapter.
//!
//! Reply text is queued to a dedicated speaker task which forwards it to
//! the external synthesis collaborator. Synthesis failures and timeouts
//! are non-fatal: the reply text is already in the transcript, so the
//! session continues with text-only output.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use tandem_core::error::{Result, TandemError};
use tandem_core::types::VoiceParams;

/// Service for converting reply text into an audio buffer.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech for the given text.
    ///
    /// Returns the encoded audio buffer in the format named by
    /// `params.output_format`.
    fn synthesize(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Mock synthesizer that records spoken text.
///
/// Optionally fails or delays every call to exercise the degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Texts successfully synthesized so far.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _params: &VoiceParams) -> Result<Vec<u8>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(TandemError::Synthesis("provider unavailable".to_string()));
        }
        if text.trim().is_empty() {
            return Err(TandemError::Synthesis(
                "cannot synthesize empty text".to_string(),
            ));
        }
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Run the speaker queue until the sending side closes.
///
/// Each synthesis call carries its own deadline and never holds session
/// state; a failed or timed-out call is logged and the loop moves on to
/// the next queued reply.
pub async fn run_speaker<S: SpeechSynthesizer>(
    mut rx: mpsc::Receiver<String>,
    synthesizer: S,
    params: VoiceParams,
    timeout: Duration,
) {
    debug!(voice_id = %params.voice_id, "Speaker task started");

    while let Some(text) = rx.recv().await {
        match tokio::time::timeout(timeout, synthesizer.synthesize(&text, &params)).await {
            Ok(Ok(audio)) => {
                debug!(bytes = audio.len(), "Reply synthesized");
            }
            Ok(Err(e)) => {
                warn!(
                    component = "speaker",
                    operation = "synthesize",
                    error = %e,
                    "Synthesis failed, reply stays text-only"
                );
            }
            Err(_) => {
                warn!(
                    component = "speaker",
                    operation = "synthesize",
                    timeout_secs = timeout.as_secs(),
                    "Synthesis timed out, reply stays text-only"
                );
            }
        }
    }

    debug!("Speaker task stopped");
}

// =============================================================================
// Tests
// =============================================================================
