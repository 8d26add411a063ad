//! Context manager: short-term window plus retrieved long-term references.
//!
//! Owns the context window exclusively; the session task is the only
//! writer. Appended utterances are archived into the reference store so
//! they can resurface later as references.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use tandem_core::config::MemoryConfig;
use tandem_core::error::Result;
use tandem_core::types::{ContextBundle, ConversationSummary, Reference, Utterance};

use crate::embedding::EmbeddingService;
use crate::store::ReferenceStore;
use crate::window::ContextWindow;

/// Maintains short-term memory and assembles the bundle handed to
/// response generation.
pub struct ContextManager<E: EmbeddingService> {
    window: ContextWindow,
    participants: BTreeSet<String>,
    store: Arc<ReferenceStore>,
    embedder: E,
    max_references: usize,
    similarity_threshold: f64,
}

impl<E: EmbeddingService> ContextManager<E> {
    pub fn new(config: &MemoryConfig, store: Arc<ReferenceStore>, embedder: E) -> Self {
        Self {
            window: ContextWindow::new(config.max_recent_messages),
            participants: BTreeSet::new(),
            store,
            embedder,
            max_references: config.max_references,
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Append an utterance to the window and archive it into long-term
    /// memory.
    ///
    /// A malformed utterance is rejected with `ValidationError` before any
    /// state changes. Archive failures degrade long-term memory only and
    /// never fail the append.
    pub async fn append(&mut self, utterance: Utterance) -> Result<()> {
        utterance.validate()?;

        self.participants.insert(utterance.speaker_id.clone());
        self.archive(&utterance).await;
        self.window.push(utterance);
        Ok(())
    }

    /// Build the context bundle for one response cycle.
    ///
    /// Retrieval failures (embedding or reference store) degrade to a
    /// window-only bundle with an empty reference list; this method never
    /// fails.
    pub async fn build_bundle(&self, query_text: &str, language_code: &str) -> ContextBundle {
        let window = self.window.to_vec();
        match self.retrieve(query_text).await {
            Ok(references) => ContextBundle {
                window,
                references,
                language_code: language_code.to_string(),
            },
            Err(e) => {
                warn!(
                    component = "context_manager",
                    operation = "build_bundle",
                    error = %e,
                    "Reference retrieval unavailable, continuing with window only"
                );
                ContextBundle::window_only(window, language_code)
            }
        }
    }

    /// Reset the window and participant set at a session boundary.
    ///
    /// Long-term memory in the reference store is untouched.
    pub fn clear(&mut self) {
        self.window.clear();
        self.participants.clear();
    }

    /// Snapshot of the current window, oldest first.
    pub fn window(&self) -> Vec<Utterance> {
        self.window.to_vec()
    }

    /// Session statistics for the UI sidebar.
    pub fn summary(&self) -> ConversationSummary {
        let duration_secs = self
            .window
            .front()
            .map(|u| (Utc::now() - u.timestamp).num_seconds().max(0))
            .unwrap_or(0);
        ConversationSummary {
            participants: self.participants.iter().cloned().collect(),
            message_count: self.window.len(),
            reference_count: self.store.len(),
            duration_secs,
        }
    }

    async fn retrieve(&self, query_text: &str) -> Result<Vec<Reference>> {
        let embedding = self.embedder.embed(query_text).await?;
        let hits = self.store.query(&embedding, self.max_references)?;
        Ok(hits
            .into_iter()
            .filter(|r| r.similarity_score >= self.similarity_threshold)
            .collect())
    }

    async fn archive(&self, utterance: &Utterance) {
        let metadata = json!({
            "speaker": utterance.speaker_id,
            "language": utterance.language_code,
            "utterance_id": utterance.id,
            "timestamp": utterance.timestamp.to_rfc3339(),
        });
        let archived = match self.embedder.embed(&utterance.text).await {
            Ok(embedding) => self.store.add(&utterance.text, embedding, metadata),
            Err(e) => Err(e),
        };
        if let Err(e) = archived {
            warn!(
                component = "context_manager",
                operation = "archive",
                error = %e,
                "Failed to archive utterance into reference store"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::error::TandemError;

    use crate::embedding::HashEmbedding;

    const DIM: usize = 4;

    /// Embedder that always returns the same vector; lets tests control
    /// similarity scores exactly.
    struct FixedEmbedding(Vec<f32>);

    impl EmbeddingService for FixedEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    /// Embedder that always fails, simulating an unreachable backend.
    struct FailingEmbedding;

    impl EmbeddingService for FailingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(TandemError::Retrieval("embedding backend down".to_string()))
        }

        fn dimensions(&self) -> usize {
            DIM
        }
    }

    fn memory_config(cap: usize, max_references: usize, threshold: f64) -> MemoryConfig {
        MemoryConfig {
            max_recent_messages: cap,
            max_references,
            similarity_threshold: threshold,
            embedding_dim: DIM,
            ..MemoryConfig::default()
        }
    }

    /// Unit vector with cosine similarity `c` against [1, 0, 0, 0].
    fn at_similarity(c: f32) -> Vec<f32> {
        vec![c, (1.0 - c * c).sqrt(), 0.0, 0.0]
    }

    fn manager(
        cap: usize,
        max_references: usize,
        threshold: f64,
    ) -> (ContextManager<FixedEmbedding>, Arc<ReferenceStore>) {
        let store = Arc::new(ReferenceStore::new(100, DIM));
        let config = memory_config(cap, max_references, threshold);
        let mgr = ContextManager::new(
            &config,
            Arc::clone(&store),
            FixedEmbedding(vec![1.0, 0.0, 0.0, 0.0]),
        );
        (mgr, store)
    }

    fn utt(speaker: &str, text: &str) -> Utterance {
        Utterance::new(speaker, text, "en")
    }

    // ---- Append / window law ----

    #[tokio::test]
    async fn test_append_fifo_eviction_law() {
        let (mut mgr, _store) = manager(3, 2, 0.5);
        for text in ["u1", "u2", "u3", "u4"] {
            mgr.append(utt("alice", text)).await.unwrap();
        }
        let texts: Vec<String> = mgr.window().iter().map(|u| u.text.clone()).collect();
        assert_eq!(texts, vec!["u2", "u3", "u4"]);
    }

    #[tokio::test]
    async fn test_append_rejects_malformed_without_mutation() {
        let (mut mgr, store) = manager(3, 2, 0.5);
        let result = mgr.append(utt("alice", "   ")).await;
        assert!(matches!(result, Err(TandemError::Validation(_))));
        assert!(mgr.window().is_empty());
        assert!(store.is_empty());
        assert!(mgr.summary().participants.is_empty());
    }

    #[tokio::test]
    async fn test_append_archives_into_store() {
        let (mut mgr, store) = manager(3, 2, 0.5);
        mgr.append(utt("alice", "kickoff notes")).await.unwrap();
        assert_eq!(store.len(), 1);

        let hits = store.query(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].source_text, "kickoff notes");
        assert_eq!(hits[0].metadata["speaker"], "alice");
    }

    #[tokio::test]
    async fn test_append_with_failing_archive_still_succeeds() {
        let store = Arc::new(ReferenceStore::new(100, DIM));
        let config = memory_config(3, 2, 0.5);
        let mut mgr = ContextManager::new(&config, Arc::clone(&store), FailingEmbedding);

        mgr.append(utt("alice", "hello")).await.unwrap();
        assert_eq!(mgr.window().len(), 1);
        assert!(store.is_empty());
    }

    // ---- build_bundle ----

    #[tokio::test]
    async fn test_bundle_threshold_and_ordering() {
        // max_references = 2, stored scores [0.9, 0.8, 0.4], threshold 0.5
        // -> the two scoring >= 0.5, descending.
        let (mgr, store) = manager(5, 2, 0.5);
        store.add("strong", at_similarity(0.9), json!({})).unwrap();
        store.add("good", at_similarity(0.8), json!({})).unwrap();
        store.add("weak", at_similarity(0.4), json!({})).unwrap();

        let bundle = mgr.build_bundle("what did we decide", "en").await;
        assert_eq!(bundle.references.len(), 2);
        assert_eq!(bundle.references[0].source_text, "strong");
        assert_eq!(bundle.references[1].source_text, "good");
    }

    #[tokio::test]
    async fn test_bundle_filters_below_threshold() {
        let (mgr, store) = manager(5, 5, 0.85);
        store.add("strong", at_similarity(0.9), json!({})).unwrap();
        store.add("good", at_similarity(0.8), json!({})).unwrap();

        let bundle = mgr.build_bundle("query", "en").await;
        assert_eq!(bundle.references.len(), 1);
        assert_eq!(bundle.references[0].source_text, "strong");
    }

    #[tokio::test]
    async fn test_bundle_includes_window() {
        let (mut mgr, _store) = manager(5, 2, 0.5);
        mgr.append(utt("alice", "first")).await.unwrap();
        mgr.append(utt("bob", "second")).await.unwrap();

        let bundle = mgr.build_bundle("query", "en").await;
        assert_eq!(bundle.window.len(), 2);
        assert_eq!(bundle.window[0].text, "first");
        assert_eq!(bundle.language_code, "en");
    }

    #[tokio::test]
    async fn test_bundle_degrades_on_embedding_failure() {
        // Degradation law: retrieval being unavailable must never surface
        // as an error, only as an empty reference list.
        let store = Arc::new(ReferenceStore::new(100, DIM));
        let config = memory_config(5, 2, 0.5);
        let mut mgr = ContextManager::new(&config, Arc::clone(&store), FailingEmbedding);

        mgr.append(utt("alice", "hello")).await.unwrap();
        let bundle = mgr.build_bundle("query", "en").await;
        assert_eq!(bundle.window.len(), 1);
        assert!(bundle.references.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_degrades_on_store_mismatch() {
        // Embedder and store disagree on dimensions: the store query fails
        // and the bundle falls back to window-only.
        let store = Arc::new(ReferenceStore::new(100, 8));
        let config = MemoryConfig {
            embedding_dim: 8,
            ..memory_config(5, 2, 0.5)
        };
        let mgr = ContextManager::new(
            &config,
            Arc::clone(&store),
            FixedEmbedding(vec![1.0, 0.0, 0.0, 0.0]),
        );

        let bundle = mgr.build_bundle("query", "en").await;
        assert!(bundle.references.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_empty_store_empty_references() {
        let (mgr, _store) = manager(5, 2, 0.5);
        let bundle = mgr.build_bundle("query", "en").await;
        assert!(bundle.references.is_empty());
    }

    // ---- clear / summary ----

    #[tokio::test]
    async fn test_clear_resets_window_and_participants() {
        let (mut mgr, store) = manager(5, 2, 0.5);
        mgr.append(utt("alice", "one")).await.unwrap();
        mgr.append(utt("bob", "two")).await.unwrap();

        mgr.clear();
        assert!(mgr.window().is_empty());
        assert!(mgr.summary().participants.is_empty());
        // Long-term memory survives session boundaries.
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let (mut mgr, _store) = manager(5, 2, 0.5);
        mgr.append(utt("alice", "one")).await.unwrap();
        mgr.append(utt("bob", "two")).await.unwrap();
        mgr.append(utt("alice", "three")).await.unwrap();

        let summary = mgr.summary();
        assert_eq!(summary.participants, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(summary.message_count, 3);
        assert_eq!(summary.reference_count, 3);
        assert!(summary.duration_secs >= 0);
    }

    #[tokio::test]
    async fn test_summary_empty_session() {
        let (mgr, _store) = manager(5, 2, 0.5);
        let summary = mgr.summary();
        assert_eq!(summary.message_count, 0);
        assert_eq!(summary.duration_secs, 0);
    }

    // ---- With the real hash embedder ----

    #[tokio::test]
    async fn test_archived_utterance_resurfaces_as_reference() {
        let store = Arc::new(ReferenceStore::new(100, 384));
        let config = MemoryConfig {
            max_recent_messages: 2,
            embedding_dim: 384,
            similarity_threshold: 0.5,
            ..MemoryConfig::default()
        };
        let mut mgr = ContextManager::new(&config, Arc::clone(&store), HashEmbedding::new(384));

        // Push the utterance out of the window, then ask for its exact text:
        // the hash embedder guarantees similarity 1.0 for identical text.
        mgr.append(utt("alice", "the deploy window is Thursday")).await.unwrap();
        mgr.append(utt("bob", "noted")).await.unwrap();
        mgr.append(utt("carol", "moving on")).await.unwrap();

        let bundle = mgr.build_bundle("the deploy window is Thursday", "en").await;
        assert!(bundle
            .references
            .iter()
            .any(|r| r.source_text == "the deploy window is Thursday"));
        assert!((bundle.references[0].similarity_score - 1.0).abs() < 1e-5);
    }
}
