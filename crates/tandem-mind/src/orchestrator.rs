//! Response orchestrator: turns a context bundle into persona reply text.
//!
//! Coordinates the search and model collaborators under per-call
//! deadlines. Collaborator failures never escape: a failed or timed-out
//! generation yields the configured fallback utterance and the session
//! continues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use tandem_core::config::AiConfig;
use tandem_core::types::{ContextBundle, Reference};

use crate::model::ModelService;
use crate::persona;
use crate::search::{SearchRecord, SearchService};

/// Deadline for one search collaborator call.
const SEARCH_TIMEOUT_SECS: u64 = 10;

/// Outcome of one response cycle.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The persona's reply, or the fallback apology when degraded.
    pub text: String,
    /// References that backed the reply, including folded-in search
    /// results.
    pub references: Vec<Reference>,
    /// True when generation failed or timed out and the fallback was
    /// used.
    pub degraded: bool,
    /// True when the search collaborator was consulted this turn.
    pub used_search: bool,
}

/// Coordinates persona prompting, optional lookup, and generation.
pub struct ResponseOrchestrator<M, S> {
    model: M,
    search: S,
    ai: AiConfig,
    /// Set when the persona's prior turn flagged a knowledge gap.
    needs_lookup: AtomicBool,
    history: Mutex<Vec<SearchRecord>>,
}

impl<M: ModelService, S: SearchService> ResponseOrchestrator<M, S> {
    pub fn new(ai: AiConfig, model: M, search: S) -> Self {
        Self {
            model,
            search,
            ai,
            needs_lookup: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Produce the persona's reply for one response cycle.
    ///
    /// If the prior turn flagged a knowledge gap, the search collaborator
    /// runs first and its hits are folded into the bundle as references.
    /// Generation runs under the configured deadline; on timeout or model
    /// failure the configured fallback utterance is returned instead.
    pub async fn respond(&self, mut bundle: ContextBundle, query: &str) -> Reply {
        let mut used_search = false;
        if self.needs_lookup.swap(false, Ordering::Relaxed) {
            used_search = true;
            self.fold_search_results(&mut bundle, query).await;
        }

        let prompt = persona::response_prompt(&self.ai.persona, &bundle, query);
        let deadline = Duration::from_secs(self.ai.generation_timeout_secs);

        let raw = match tokio::time::timeout(
            deadline,
            self.model
                .generate(&prompt, self.ai.temperature, self.ai.max_tokens),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(
                    component = "orchestrator",
                    operation = "generate",
                    error = %e,
                    "Generation failed, presenting fallback utterance"
                );
                return self.fallback(bundle, used_search);
            }
            Err(_) => {
                warn!(
                    component = "orchestrator",
                    operation = "generate",
                    timeout_secs = self.ai.generation_timeout_secs,
                    "Generation timed out, presenting fallback utterance"
                );
                return self.fallback(bundle, used_search);
            }
        };

        let (text, flagged_gap) = persona::strip_gap_marker(&raw);
        if flagged_gap {
            debug!("Persona flagged a knowledge gap, lookup scheduled for next turn");
            self.needs_lookup.store(true, Ordering::Relaxed);
        }
        if text.is_empty() {
            return self.fallback(bundle, used_search);
        }

        Reply {
            text,
            references: bundle.references,
            degraded: false,
            used_search,
        }
    }

    /// Decide whether the persona should interject unprompted.
    ///
    /// Returns `None` when the model answers with the LISTEN token or when
    /// any collaborator failure occurs (staying quiet is the safe
    /// degradation).
    pub async fn interject(&self, bundle: &ContextBundle) -> Option<String> {
        let prompt = persona::interjection_prompt(&self.ai.persona, bundle);
        let deadline = Duration::from_secs(self.ai.generation_timeout_secs);

        match tokio::time::timeout(
            deadline,
            self.model
                .generate(&prompt, self.ai.temperature, self.ai.max_tokens),
        )
        .await
        {
            Ok(Ok(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() || text == persona::LISTEN_TOKEN {
                    None
                } else {
                    Some(text)
                }
            }
            Ok(Err(e)) => {
                warn!(
                    component = "orchestrator",
                    operation = "interject",
                    error = %e,
                    "Interjection check failed, staying quiet"
                );
                None
            }
            Err(_) => None,
        }
    }

    /// Produce an end-of-meeting reflection.
    pub async fn reflect(&self, bundle: &ContextBundle) -> String {
        let prompt = persona::reflection_prompt(&self.ai.persona, bundle);
        let deadline = Duration::from_secs(self.ai.generation_timeout_secs);

        match tokio::time::timeout(
            deadline,
            self.model
                .generate(&prompt, self.ai.temperature, self.ai.max_tokens),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) | Ok(Err(_)) | Err(_) => {
                warn!(
                    component = "orchestrator",
                    operation = "reflect",
                    "Reflection unavailable, presenting fallback utterance"
                );
                self.ai.fallback_reply.clone()
            }
        }
    }

    /// Whether a lookup is scheduled for the next turn.
    pub fn lookup_pending(&self) -> bool {
        self.needs_lookup.load(Ordering::Relaxed)
    }

    /// Session-scoped search history, oldest first.
    pub fn search_history(&self) -> Vec<SearchRecord> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    async fn fold_search_results(&self, bundle: &mut ContextBundle, query: &str) {
        let cfg = &self.ai.search;
        let outcome = tokio::time::timeout(
            Duration::from_secs(SEARCH_TIMEOUT_SECS),
            self.search.search(
                query,
                cfg.max_results,
                &cfg.include_domains,
                &cfg.exclude_domains,
            ),
        )
        .await;

        match outcome {
            Ok(Ok(hits)) => {
                self.record_search(query, hits.len(), true);
                debug!(hits = hits.len(), "Search results folded into bundle");
                bundle.references.extend(hits.into_iter().map(|hit| Reference {
                    source_text: hit.snippet,
                    embedding: vec![],
                    similarity_score: 1.0,
                    metadata: json!({
                        "source": "search",
                        "title": hit.title,
                        "url": hit.url,
                    }),
                }));
            }
            Ok(Err(e)) => {
                self.record_search(query, 0, false);
                warn!(
                    component = "orchestrator",
                    operation = "search",
                    error = %e,
                    "Search failed, continuing without lookup results"
                );
            }
            Err(_) => {
                self.record_search(query, 0, false);
                warn!(
                    component = "orchestrator",
                    operation = "search",
                    timeout_secs = SEARCH_TIMEOUT_SECS,
                    "Search timed out, continuing without lookup results"
                );
            }
        }
    }

    fn record_search(&self, query: &str, result_count: usize, succeeded: bool) {
        if let Ok(mut history) = self.history.lock() {
            history.push(SearchRecord {
                query: query.to_string(),
                result_count,
                succeeded,
                timestamp: Utc::now(),
            });
        }
    }

    fn fallback(&self, bundle: ContextBundle, used_search: bool) -> Reply {
        Reply {
            text: self.ai.fallback_reply.clone(),
            references: bundle.references,
            degraded: true,
            used_search,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::types::{SearchHit, Utterance};

    use crate::model::MockModel;
    use crate::search::MockSearch;

    fn ai_config() -> AiConfig {
        AiConfig {
            generation_timeout_secs: 1,
            ..AiConfig::default()
        }
    }

    fn bundle() -> ContextBundle {
        ContextBundle {
            window: vec![Utterance::new("alice", "can we ship friday?", "en")],
            references: vec![],
            language_code: "en".to_string(),
        }
    }

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            snippet: format!("snippet about {}", title),
            url: format!("https://example.com/{}", title),
        }
    }

    // ---- Normal generation ----

    #[tokio::test]
    async fn test_respond_returns_model_reply() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("Friday works if we freeze scope today."),
            MockSearch::empty(),
        );
        let reply = orch.respond(bundle(), "can we ship friday?").await;
        assert_eq!(reply.text, "Friday works if we freeze scope today.");
        assert!(!reply.degraded);
        assert!(!reply.used_search);
    }

    #[tokio::test]
    async fn test_respond_prompt_contains_persona_and_window() {
        let model = MockModel::new("ok");
        let orch = ResponseOrchestrator::new(ai_config(), model.clone(), MockSearch::empty());
        orch.respond(bundle(), "thoughts?").await;

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Theo"));
        assert!(prompts[0].contains("[alice] can we ship friday?"));
        assert!(prompts[0].contains("thoughts?"));
    }

    // ---- Deadline / failure degradation ----

    #[tokio::test]
    async fn test_respond_timeout_returns_fallback() {
        // The model stalls past the deadline; the orchestrator must return
        // the configured fallback utterance, not an error.
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::with_delay("too late", Duration::from_secs(30)),
            MockSearch::empty(),
        );
        let reply = orch.respond(bundle(), "query").await;
        assert_eq!(reply.text, ai_config().fallback_reply);
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn test_respond_model_failure_returns_fallback() {
        let orch =
            ResponseOrchestrator::new(ai_config(), MockModel::failing(), MockSearch::empty());
        let reply = orch.respond(bundle(), "query").await;
        assert_eq!(reply.text, ai_config().fallback_reply);
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn test_respond_empty_reply_returns_fallback() {
        let orch = ResponseOrchestrator::new(ai_config(), MockModel::new("   "), MockSearch::empty());
        let reply = orch.respond(bundle(), "query").await;
        assert_eq!(reply.text, ai_config().fallback_reply);
        assert!(reply.degraded);
    }

    // ---- Knowledge-gap rule ----

    #[tokio::test]
    async fn test_gap_marker_schedules_lookup_and_is_stripped() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("I think so, but [needs lookup] the exact version."),
            MockSearch::empty(),
        );
        let reply = orch.respond(bundle(), "which version?").await;
        assert!(!reply.text.contains(persona::GAP_MARKER));
        assert!(orch.lookup_pending());
    }

    #[tokio::test]
    async fn test_next_turn_after_gap_folds_search_references() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("Version 2.4 shipped in March."),
            MockSearch::new(vec![hit("release notes")]),
        );

        // Simulate the prior turn having flagged a gap.
        orch.needs_lookup.store(true, Ordering::Relaxed);

        let reply = orch.respond(bundle(), "which version?").await;
        assert!(reply.used_search);
        assert!(!orch.lookup_pending());
        assert_eq!(reply.references.len(), 1);
        assert_eq!(reply.references[0].metadata["source"], "search");
        assert_eq!(reply.references[0].metadata["title"], "release notes");
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_no_lookup() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("Best guess: March."),
            MockSearch::failing(),
        );
        orch.needs_lookup.store(true, Ordering::Relaxed);

        let reply = orch.respond(bundle(), "which version?").await;
        // Reply still succeeds; no references were folded in.
        assert_eq!(reply.text, "Best guess: March.");
        assert!(reply.references.is_empty());
        assert!(!reply.degraded);

        let history = orch.search_history();
        assert_eq!(history.len(), 1);
        assert!(!history[0].succeeded);
    }

    #[tokio::test]
    async fn test_search_history_records_successful_lookup() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("answer"),
            MockSearch::new(vec![hit("a"), hit("b")]),
        );
        orch.needs_lookup.store(true, Ordering::Relaxed);
        orch.respond(bundle(), "lookup this").await;

        let history = orch.search_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "lookup this");
        assert_eq!(history[0].result_count, 2);
        assert!(history[0].succeeded);
    }

    #[tokio::test]
    async fn test_lookup_flag_cleared_even_when_search_fails() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("answer"),
            MockSearch::failing(),
        );
        orch.needs_lookup.store(true, Ordering::Relaxed);
        orch.respond(bundle(), "query").await;
        assert!(!orch.lookup_pending());
    }

    // ---- Interjection ----

    #[tokio::test]
    async fn test_interject_listen_token_stays_quiet() {
        let orch =
            ResponseOrchestrator::new(ai_config(), MockModel::new("LISTEN"), MockSearch::empty());
        assert!(orch.interject(&bundle()).await.is_none());
    }

    #[tokio::test]
    async fn test_interject_with_content_speaks() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("One risk worth noting: the migration."),
            MockSearch::empty(),
        );
        let interjection = orch.interject(&bundle()).await;
        assert_eq!(
            interjection.as_deref(),
            Some("One risk worth noting: the migration.")
        );
    }

    #[tokio::test]
    async fn test_interject_failure_stays_quiet() {
        let orch =
            ResponseOrchestrator::new(ai_config(), MockModel::failing(), MockSearch::empty());
        assert!(orch.interject(&bundle()).await.is_none());
    }

    // ---- Reflection ----

    #[tokio::test]
    async fn test_reflect_returns_model_text() {
        let orch = ResponseOrchestrator::new(
            ai_config(),
            MockModel::new("Key insight: scope creep."),
            MockSearch::empty(),
        );
        assert_eq!(orch.reflect(&bundle()).await, "Key insight: scope creep.");
    }

    #[tokio::test]
    async fn test_reflect_failure_returns_fallback() {
        let orch =
            ResponseOrchestrator::new(ai_config(), MockModel::failing(), MockSearch::empty());
        assert_eq!(orch.reflect(&bundle()).await, ai_config().fallback_reply);
    }

    // ---- References pass through ----

    #[tokio::test]
    async fn test_bundle_references_survive_into_reply() {
        let mut b = bundle();
        b.references.push(Reference {
            source_text: "from memory".to_string(),
            embedding: vec![],
            similarity_score: 0.8,
            metadata: serde_json::json!({}),
        });
        let orch =
            ResponseOrchestrator::new(ai_config(), MockModel::new("ok"), MockSearch::empty());
        let reply = orch.respond(b, "query").await;
        assert_eq!(reply.references.len(), 1);
        assert_eq!(reply.references[0].source_text, "from memory");
    }
}
