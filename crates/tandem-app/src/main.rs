//! Tandem application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Parse CLI args and load + validate configuration (fatal on error)
//! 2. Read provider credentials from the environment
//! 3. Restore the reference store from its SQLite snapshot
//! 4. Spawn the session engine, speaker task, and autosave loop
//! 5. Serve the UI surface until ctrl-c, then flush and exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, mpsc, oneshot};

use tandem_api::{create_router, AppState};
use tandem_core::config::{Credentials, TandemConfig};
use tandem_core::types::VoiceParams;
use tandem_memory::{ContextManager, HashEmbedding, ReferenceStore};
use tandem_mind::{MockModel, MockSearch, ResponseOrchestrator};
use tandem_speech::{run_speaker, ListenerControl, MockSynthesizer, TranscriptIngest};

mod cli;
mod session;

use cli::CliArgs;
use session::SessionEngine;

/// Periodically flush the reference store.
async fn autosave_loop(store: Arc<ReferenceStore>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick fires immediately; skip it.
    interval.tick().await;
    loop {
        interval.tick().await;
        match store.flush() {
            Ok(()) => tracing::debug!("Autosave flush complete"),
            Err(e) => tracing::warn!(
                component = "autosave",
                operation = "flush",
                error = %e,
                "Autosave flush failed"
            ),
        }
    }
}

/// Load configuration, treating any error as fatal.
///
/// An explicitly requested file must load; the default path may be absent,
/// in which case the built-in defaults apply.
fn load_config(path: &PathBuf, explicit: bool) -> Result<TandemConfig, Box<dyn std::error::Error>> {
    if explicit || path.exists() {
        Ok(TandemConfig::load(path)?)
    } else {
        let config = TandemConfig::default();
        config.validate()?;
        Ok(config)
    }
}

/// Resolve where the reference-store snapshot lives.
fn resolve_persist_path(config: &TandemConfig, data_dir: Option<&PathBuf>) -> PathBuf {
    match data_dir {
        Some(dir) => dir.join(&config.memory.persist_path),
        None => PathBuf::from(&config.memory.persist_path),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level comes from it.
    let (config_path, explicit) = args.resolve_config_path();
    let config = load_config(&config_path, explicit)?;

    // Tracing.
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    tracing::info!("Starting Tandem v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    // Credentials: a missing key disables its collaborator, never logged.
    let credentials = Credentials::from_env();
    if !credentials.has_model() {
        tracing::warn!("MODEL_API_KEY not set — generation uses the offline mock collaborator");
    }
    if !credentials.has_tts() {
        tracing::warn!("TTS_API_KEY not set — synthesis uses the offline mock collaborator");
    }
    if !credentials.has_search() {
        tracing::warn!("SEARCH_API_KEY not set — lookups use the offline mock collaborator");
    }

    // Reference store: a startup persistence failure is fatal.
    let persist_path = resolve_persist_path(&config, args.data_dir.as_ref());
    let store = Arc::new(ReferenceStore::open(
        &persist_path,
        config.memory.max_elements,
        config.memory.embedding_dim,
    )?);
    tracing::info!(
        path = %persist_path.display(),
        entries = store.len(),
        "Reference store ready"
    );

    // Shared control state and channels.
    let default_language = config.speech.default_language.clone();
    let default_code = config
        .language_code(&default_language)
        .ok_or("default_language missing from language_codes")?
        .to_string();
    let listener = Arc::new(ListenerControl::new(default_language, default_code));

    let (commands_tx, commands_rx) = mpsc::channel(64);
    let (events_tx, _) = broadcast::channel(256);

    // Speaker task (skipped entirely when speech output is disabled).
    let speaker_tx = if config.tts.enabled {
        let (tx, rx) = mpsc::channel(16);
        let params = VoiceParams::from_config(&config.tts);
        let timeout = Duration::from_secs(config.tts.timeout_secs);
        tokio::spawn(run_speaker(rx, MockSynthesizer::new(), params, timeout));
        Some(tx)
    } else {
        tracing::info!("Speech output disabled in config");
        None
    };

    // Session engine: the single writer of conversational state.
    let embedder = HashEmbedding::new(config.memory.embedding_dim);
    let context = ContextManager::new(&config.memory, Arc::clone(&store), embedder);
    let orchestrator = ResponseOrchestrator::new(
        config.ai.clone(),
        MockModel::new("Noted. I'll follow up on that after the meeting."),
        MockSearch::empty(),
    );
    let engine = SessionEngine::new(
        context,
        orchestrator,
        Arc::clone(&store),
        Arc::clone(&listener),
        speaker_tx,
        events_tx.clone(),
        config.ai.persona.name.clone(),
    );
    let engine_handle = tokio::spawn(engine.run(commands_rx));

    // Autosave loop.
    tokio::spawn(autosave_loop(
        Arc::clone(&store),
        config.session.autosave_interval_secs,
    ));

    // UI surface.
    let port = args.resolve_port(config.session.port);
    let ingest = Arc::new(TranscriptIngest::new(
        commands_tx.clone(),
        Arc::clone(&listener),
        config.speech.min_confidence,
    ));
    let state = AppState::new(
        Arc::new(config),
        commands_tx.clone(),
        ingest,
        listener,
        events_tx,
    );
    let router = create_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let tcp_listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind — is another instance running?");
            return Err(e.into());
        }
    };
    tracing::info!(addr = %addr, "UI surface listening");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Stop the session: abort in-flight work best-effort and flush.
    let (ack_tx, ack_rx) = oneshot::channel();
    if commands_tx
        .send(tandem_core::events::SessionCommand::Shutdown(ack_tx))
        .await
        .is_ok()
    {
        let _ = tokio::time::timeout(Duration::from_secs(5), ack_rx).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;

    tracing::info!("Tandem stopped");
    Ok(())
}
