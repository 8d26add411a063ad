//! Transcript ingest: recognized speech segments become utterances.
//!
//! Sits between the transcription collaborator and the session task.
//! Applies the listening gate and the confidence floor, validates the
//! segment, and forwards a well-formed `Utterance` over the session
//! channel. The session task is the only writer of conversational state,
//! so ingest never touches the window directly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use tandem_core::error::{Result, TandemError};
use tandem_core::events::SessionCommand;
use tandem_core::types::{Transcript, Utterance};

use crate::listener::ListenerControl;

/// What happened to a submitted transcript segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Forwarded to the session task.
    Accepted(Uuid),
    /// Recognizer confidence was below the configured floor.
    DroppedLowConfidence,
    /// The listening gate is closed; segment discarded.
    NotListening,
}

/// Converts transcripts plus speaker attribution into session commands.
pub struct TranscriptIngest {
    tx: mpsc::Sender<SessionCommand>,
    listener: Arc<ListenerControl>,
    min_confidence: f32,
}

impl TranscriptIngest {
    pub fn new(
        tx: mpsc::Sender<SessionCommand>,
        listener: Arc<ListenerControl>,
        min_confidence: f32,
    ) -> Self {
        Self {
            tx,
            listener,
            min_confidence,
        }
    }

    /// Submit one recognized segment with its speaker attribution.
    ///
    /// Malformed segments fail with `ValidationError` and nothing is
    /// forwarded. A closed session channel means shutdown is in progress.
    pub async fn submit(&self, transcript: Transcript, speaker_id: &str) -> Result<IngestOutcome> {
        if !self.listener.is_listening() {
            return Ok(IngestOutcome::NotListening);
        }

        if transcript.confidence < self.min_confidence {
            debug!(
                confidence = transcript.confidence,
                floor = self.min_confidence,
                "Transcript segment below confidence floor, dropped"
            );
            return Ok(IngestOutcome::DroppedLowConfidence);
        }

        let utterance = Utterance::new(speaker_id, transcript.text, transcript.language_code);
        utterance.validate()?;

        let id = utterance.id;
        self.tx
            .send(SessionCommand::Ingest(utterance))
            .await
            .map_err(|_| TandemError::ShuttingDown)?;
        Ok(IngestOutcome::Accepted(id))
    }
}

// =============================================================================
// Tests
// =============================================================================
