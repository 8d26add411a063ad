//! Command and event types for the single-writer session task.
//!
//! All mutations of conversational state flow through `SessionCommand`
//! messages consumed by one task, which serializes window and store
//! mutations. `SessionEvent`s are broadcast to the UI surface.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::types::{ConversationSummary, Reference, Utterance};

/// Commands accepted by the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// A validated utterance from transcript ingest; triggers the full
    /// response cycle when the speaker is not the persona.
    Ingest(Utterance),
    /// Switch the recognition language.
    SetLanguage { language: String, code: String },
    /// Open the listening gate.
    StartListening,
    /// Close the listening gate.
    StopListening,
    /// Reset the context window at a session boundary.
    ClearContext,
    /// Request a point-in-time view of session state for the UI.
    Snapshot(oneshot::Sender<SessionSnapshot>),
    /// Flush persistent state and stop the session task.
    Shutdown(oneshot::Sender<()>),
}

/// Events broadcast to UI subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    UtteranceAdded { utterance: Utterance },
    ReplyReady {
        utterance: Utterance,
        /// References folded into the reply's context bundle.
        references: Vec<Reference>,
        /// True when the reply fell back to the apology utterance.
        degraded: bool,
    },
    ListeningChanged { listening: bool },
    LanguageChanged { language: String, code: String },
    ContextCleared,
}

/// Point-in-time view of session state served to the UI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Recent utterances, oldest first.
    pub window: Vec<Utterance>,
    /// References surfaced by the most recent response cycle.
    pub references: Vec<Reference>,
    pub listening: bool,
    /// Display name of the active language.
    pub language: String,
    pub summary: ConversationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_event_serializes_with_tag() {
        let event = SessionEvent::ListeningChanged { listening: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "listening_changed");
        assert_eq!(json["listening"], true);
    }

    #[test]
    fn test_reply_ready_round_trip() {
        let event = SessionEvent::ReplyReady {
            utterance: Utterance::new("Theo", "On it.", "en"),
            references: vec![],
            degraded: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        match back {
            SessionEvent::ReplyReady { utterance, degraded, .. } => {
                assert_eq!(utterance.speaker_id, "Theo");
                assert!(!degraded);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_serde() {
        let snapshot = SessionSnapshot {
            window: vec![],
            references: vec![],
            listening: false,
            language: "English".to_string(),
            summary: ConversationSummary::default(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["language"], "English");
        assert_eq!(json["listening"], false);
    }
}
