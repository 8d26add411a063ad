use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, TandemError};

// =============================================================================
// Utterance
// =============================================================================

/// One attributed, timestamped unit of transcribed speech.
///
/// Immutable once created; appended to the recent-message window and
/// archived into the reference store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: Uuid,
    /// Who said it: a participant name or the persona's name.
    pub speaker_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// ISO recognition code, e.g. "en".
    pub language_code: String,
}

impl Utterance {
    /// Create an utterance stamped with the current time.
    pub fn new(speaker_id: impl Into<String>, text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker_id: speaker_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            language_code: language_code.into(),
        }
    }

    /// Check that the utterance is well-formed.
    ///
    /// Rejects empty speaker ids, empty or whitespace-only text, and empty
    /// language codes. Used by the context manager and transcript ingest
    /// before any state is mutated.
    pub fn validate(&self) -> Result<()> {
        if self.speaker_id.trim().is_empty() {
            return Err(TandemError::Validation(
                "utterance speaker_id must not be empty".to_string(),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(TandemError::Validation(
                "utterance text must not be empty".to_string(),
            ));
        }
        if self.language_code.trim().is_empty() {
            return Err(TandemError::Validation(
                "utterance language_code must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Reference
// =============================================================================

/// A retrieved piece of long-term memory relevant to the current query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reference {
    /// The stored text the similarity query matched.
    pub source_text: String,
    /// The stored embedding; empty for references synthesized from search
    /// results rather than the vector memory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Cosine similarity against the query embedding.
    pub similarity_score: f64,
    /// Arbitrary metadata captured at storage time (speaker, url, ...).
    pub metadata: Value,
}

// =============================================================================
// ContextBundle
// =============================================================================

/// The combined short-term and long-term memory handed to response
/// generation. Built fresh per response cycle and discarded after use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Recent utterances, oldest first.
    pub window: Vec<Utterance>,
    /// Retrieved references, best match first.
    pub references: Vec<Reference>,
    pub language_code: String,
}

impl ContextBundle {
    /// A bundle carrying only the recent window (degraded retrieval path).
    pub fn window_only(window: Vec<Utterance>, language_code: impl Into<String>) -> Self {
        Self {
            window,
            references: Vec::new(),
            language_code: language_code.into(),
        }
    }
}

// =============================================================================
// Collaborator contracts
// =============================================================================

/// Output of the transcription collaborator for one audio chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Recognizer confidence in [0, 1].
    pub confidence: f32,
    pub language_code: String,
}

/// One result from the internet-search collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Voice parameters forwarded to the speech-synthesis collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
}

impl VoiceParams {
    pub fn from_config(tts: &crate::config::TtsConfig) -> Self {
        Self {
            voice_id: tts.voice_id.clone(),
            model_id: tts.model_id.clone(),
            output_format: tts.output_format.clone(),
        }
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Session-level statistics shown in the UI sidebar.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Distinct speakers seen this session.
    pub participants: Vec<String>,
    /// Utterances currently held in the window.
    pub message_count: usize,
    /// Entries currently held in the reference store.
    pub reference_count: usize,
    /// Seconds since the first windowed utterance, 0 when empty.
    pub duration_secs: i64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_new_sets_id_and_timestamp() {
        let u = Utterance::new("alice", "hello there", "en");
        assert_ne!(u.id, Uuid::nil());
        assert_eq!(u.speaker_id, "alice");
        assert_eq!(u.language_code, "en");
        assert!((Utc::now() - u.timestamp).num_seconds() < 2);
    }

    #[test]
    fn test_utterance_validate_ok() {
        let u = Utterance::new("alice", "hello", "en");
        assert!(u.validate().is_ok());
    }

    #[test]
    fn test_utterance_empty_text_rejected() {
        let u = Utterance::new("alice", "", "en");
        assert!(matches!(u.validate(), Err(TandemError::Validation(_))));
    }

    #[test]
    fn test_utterance_whitespace_text_rejected() {
        let u = Utterance::new("alice", "   \t", "en");
        assert!(u.validate().is_err());
    }

    #[test]
    fn test_utterance_empty_speaker_rejected() {
        let u = Utterance::new("", "hello", "en");
        assert!(u.validate().is_err());
    }

    #[test]
    fn test_utterance_empty_language_rejected() {
        let u = Utterance::new("alice", "hello", "");
        assert!(u.validate().is_err());
    }

    #[test]
    fn test_window_only_bundle_has_no_references() {
        let window = vec![Utterance::new("alice", "hi", "en")];
        let bundle = ContextBundle::window_only(window, "en");
        assert_eq!(bundle.window.len(), 1);
        assert!(bundle.references.is_empty());
        assert_eq!(bundle.language_code, "en");
    }

    #[test]
    fn test_utterance_serde_round_trip() {
        let u = Utterance::new("bob", "status update", "en");
        let json = serde_json::to_string(&u).unwrap();
        let back: Utterance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn test_voice_params_from_config() {
        let tts = crate::config::TtsConfig::default();
        let params = VoiceParams::from_config(&tts);
        assert_eq!(params.voice_id, tts.voice_id);
        assert_eq!(params.model_id, tts.model_id);
        assert_eq!(params.output_format, tts.output_format);
    }

    #[test]
    fn test_search_hit_serde() {
        let hit = SearchHit {
            title: "Rust book".to_string(),
            snippet: "ownership and borrowing".to_string(),
            url: "https://doc.rust-lang.org/book".to_string(),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["title"], "Rust book");
    }
}
