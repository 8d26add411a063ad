//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};

use tandem_core::config::TandemConfig;
use tandem_core::events::{SessionCommand, SessionEvent, SessionSnapshot};
use tandem_speech::{ListenerControl, TranscriptIngest};

use crate::error::ApiError;

/// Deadline for a snapshot round-trip into the session task.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared application state.
///
/// All fields are cheap to clone across handler tasks. Mutations of
/// conversational state go through `commands`; the listener gate is the
/// only piece of state handlers read directly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TandemConfig>,
    pub commands: mpsc::Sender<SessionCommand>,
    pub ingest: Arc<TranscriptIngest>,
    pub listener: Arc<ListenerControl>,
    pub events: broadcast::Sender<SessionEvent>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<TandemConfig>,
        commands: mpsc::Sender<SessionCommand>,
        ingest: Arc<TranscriptIngest>,
        listener: Arc<ListenerControl>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            commands,
            ingest,
            listener,
            events,
            start_time: Instant::now(),
        }
    }

    /// Fetch a point-in-time view of session state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot(tx))
            .await
            .map_err(|_| ApiError::SessionUnavailable)?;
        match tokio::time::timeout(SNAPSHOT_TIMEOUT, rx).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            _ => Err(ApiError::SessionUnavailable),
        }
    }

    /// Send a command to the session task.
    pub async fn send(&self, command: SessionCommand) -> Result<(), ApiError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ApiError::SessionUnavailable)
    }
}
