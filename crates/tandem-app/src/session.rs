//! The session engine: single writer of all conversational state.
//!
//! One task owns the context manager and the response orchestrator and
//! consumes `SessionCommand`s from the command channel, so window and
//! store mutations are serialized by construction. Long-running
//! collaborator calls happen inside the orchestrator under their own
//! deadlines; no lock on shared state is held while waiting.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use tandem_core::events::{SessionCommand, SessionEvent, SessionSnapshot};
use tandem_core::types::{Reference, Utterance};
use tandem_memory::{ContextManager, EmbeddingService, ReferenceStore};
use tandem_mind::{ModelService, ResponseOrchestrator, SearchService};
use tandem_speech::ListenerControl;

/// Owns conversational state and drives the response cycle.
pub struct SessionEngine<E: EmbeddingService, M: ModelService, S: SearchService> {
    context: ContextManager<E>,
    orchestrator: ResponseOrchestrator<M, S>,
    store: Arc<ReferenceStore>,
    listener: Arc<ListenerControl>,
    /// Queue into the speaker task; `None` when speech output is disabled.
    speaker_tx: Option<mpsc::Sender<String>>,
    events: broadcast::Sender<SessionEvent>,
    persona_name: String,
    /// References surfaced by the most recent response cycle.
    last_references: Vec<Reference>,
}

impl<E: EmbeddingService, M: ModelService, S: SearchService> SessionEngine<E, M, S> {
    pub fn new(
        context: ContextManager<E>,
        orchestrator: ResponseOrchestrator<M, S>,
        store: Arc<ReferenceStore>,
        listener: Arc<ListenerControl>,
        speaker_tx: Option<mpsc::Sender<String>>,
        events: broadcast::Sender<SessionEvent>,
        persona_name: String,
    ) -> Self {
        Self {
            context,
            orchestrator,
            store,
            listener,
            speaker_tx,
            events,
            persona_name,
            last_references: Vec::new(),
        }
    }

    /// Consume commands until shutdown or until all senders are dropped.
    ///
    /// Persistent state is flushed on both exit paths.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        info!(persona = %self.persona_name, "Session engine started");

        while let Some(command) = rx.recv().await {
            match command {
                SessionCommand::Ingest(utterance) => self.handle_ingest(utterance).await,
                SessionCommand::SetLanguage { language, code } => {
                    self.listener.set_language(language.clone(), code.clone());
                    info!(language = %language, code = %code, "Language switched");
                    self.broadcast(SessionEvent::LanguageChanged { language, code });
                }
                SessionCommand::StartListening => {
                    self.listener.start();
                    self.broadcast(SessionEvent::ListeningChanged { listening: true });
                }
                SessionCommand::StopListening => {
                    self.listener.stop();
                    self.broadcast(SessionEvent::ListeningChanged { listening: false });
                }
                SessionCommand::ClearContext => {
                    self.context.clear();
                    self.last_references.clear();
                    info!("Context cleared at session boundary");
                    self.broadcast(SessionEvent::ContextCleared);
                }
                SessionCommand::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                SessionCommand::Shutdown(ack) => {
                    self.flush();
                    let _ = ack.send(());
                    info!("Session engine stopped");
                    return;
                }
            }
        }

        // All senders dropped without an explicit shutdown.
        self.flush();
        info!("Session engine stopped (command channel closed)");
    }

    /// One full response cycle for an incoming utterance.
    ///
    /// Every stage degrades locally: a malformed utterance is dropped, a
    /// failed retrieval yields a window-only bundle, a failed generation
    /// yields the fallback utterance, and a full speaker queue leaves the
    /// reply text-only. Nothing here aborts the session.
    async fn handle_ingest(&mut self, utterance: Utterance) {
        if let Err(e) = self.context.append(utterance.clone()).await {
            warn!(
                component = "session",
                operation = "append",
                error = %e,
                "Utterance rejected"
            );
            return;
        }
        self.broadcast(SessionEvent::UtteranceAdded {
            utterance: utterance.clone(),
        });

        // The persona does not answer itself.
        if utterance.speaker_id == self.persona_name {
            return;
        }

        let bundle = self
            .context
            .build_bundle(&utterance.text, &utterance.language_code)
            .await;
        let reply = self.orchestrator.respond(bundle, &utterance.text).await;

        let persona_utterance = Utterance::new(
            self.persona_name.clone(),
            reply.text.clone(),
            utterance.language_code.clone(),
        );
        if let Err(e) = self.context.append(persona_utterance.clone()).await {
            warn!(
                component = "session",
                operation = "append_reply",
                error = %e,
                "Persona reply could not be archived"
            );
        }

        self.last_references = reply.references.clone();

        if let Some(ref speaker_tx) = self.speaker_tx {
            if speaker_tx.try_send(reply.text.clone()).is_err() {
                warn!("Speaker queue full or closed, reply stays text-only");
            }
        }

        self.broadcast(SessionEvent::ReplyReady {
            utterance: persona_utterance,
            references: reply.references,
            degraded: reply.degraded,
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            window: self.context.window(),
            references: self.last_references.clone(),
            listening: self.listener.is_listening(),
            language: self.listener.language(),
            summary: self.context.summary(),
        }
    }

    fn flush(&self) {
        if let Err(e) = self.store.flush() {
            warn!(
                component = "session",
                operation = "flush",
                error = %e,
                "Failed to flush reference store"
            );
        }
    }

    fn broadcast(&self, event: SessionEvent) {
        // Send fails only when no UI is subscribed, which is fine.
        let _ = self.events.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================
