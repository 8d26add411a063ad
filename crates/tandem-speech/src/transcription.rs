//! Transcription collaborator contract.
//!
//! The real speech-to-text engine lives outside this system; it is
//! consumed through the `TranscriptionService` trait. `MockTranscription`
//! stands in during tests and offline development.

use std::future::Future;

use tandem_core::error::{Result, TandemError};
use tandem_core::types::Transcript;

/// Service for transcribing captured audio to text.
///
/// Implementations accept raw PCM samples and return one attributed
/// transcript per chunk, or fail with a `Transcription` error which the
/// caller recovers from by dropping the chunk.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe one chunk of audio.
    ///
    /// # Arguments
    /// * `samples` - PCM audio samples as f32 values in [-1.0, 1.0].
    /// * `sample_rate` - Sample rate in Hz (e.g. 16000).
    /// * `language_code` - ISO recognition code, e.g. "en".
    fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language_code: &str,
    ) -> impl Future<Output = Result<Transcript>> + Send;
}

/// Mock transcription service returning a fixed text.
///
/// Rejects empty audio and a zero sample rate, mirroring the failure modes
/// of a real engine.
#[derive(Debug, Clone)]
pub struct MockTranscription {
    text: String,
    confidence: f32,
}

impl MockTranscription {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

impl Default for MockTranscription {
    fn default() -> Self {
        Self::new("[mock transcript]", 0.95)
    }
}

impl TranscriptionService for MockTranscription {
    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language_code: &str,
    ) -> Result<Transcript> {
        if samples.is_empty() {
            return Err(TandemError::Transcription(
                "cannot transcribe empty audio".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(TandemError::Transcription(
                "sample rate must be greater than 0".to_string(),
            ));
        }

        Ok(Transcript {
            text: self.text.clone(),
            confidence: self.confidence,
            language_code: language_code.to_string(),
        })
    }
}
