//! Route handlers for the UI surface.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use tandem_core::config::TandemConfig;
use tandem_core::error::TandemError;
use tandem_core::events::SessionCommand;
use tandem_core::types::{ConversationSummary, Reference, Transcript, Utterance};
use tandem_speech::IngestOutcome;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response bodies
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub listening: bool,
    pub language: String,
    pub summary: ConversationSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageRequest {
    /// Display name, e.g. "English".
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub utterances: Vec<Utterance>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferencesResponse {
    pub references: Vec<Reference>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UtteranceRequest {
    pub speaker_id: String,
    pub text: String,
    /// Recognizer confidence; defaults to 1.0 for typed input.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

// =============================================================================
// Handlers
// =============================================================================

/// Liveness probe with version and uptime.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Current session status for the UI sidebar.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let snapshot = state.snapshot().await?;
    Ok(Json(StatusResponse {
        listening: snapshot.listening,
        language: snapshot.language,
        summary: snapshot.summary,
    }))
}

/// Open the listening gate.
///
/// The gate flips synchronously so a transcript pushed right after this
/// call is accepted; the session command only drives the UI broadcast.
pub async fn listen_start(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.listener.start();
    state.send(SessionCommand::StartListening).await?;
    info!("Listening started via UI");
    Ok(Json(json!({ "listening": true })))
}

/// Close the listening gate.
pub async fn listen_stop(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.listener.stop();
    state.send(SessionCommand::StopListening).await?;
    info!("Listening stopped via UI");
    Ok(Json(json!({ "listening": false })))
}

/// Switch the recognition language.
pub async fn set_language(
    State(state): State<AppState>,
    Json(body): Json<LanguageRequest>,
) -> Result<Json<Value>, ApiError> {
    let code = state
        .config
        .language_code(&body.language)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown language '{}'", body.language)))?
        .to_string();

    state.listener.set_language(body.language.clone(), code.clone());
    state
        .send(SessionCommand::SetLanguage {
            language: body.language.clone(),
            code: code.clone(),
        })
        .await?;
    Ok(Json(json!({ "language": body.language, "code": code })))
}

/// Live transcript view: the current context window.
pub async fn transcript(
    State(state): State<AppState>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let snapshot = state.snapshot().await?;
    Ok(Json(TranscriptResponse {
        utterances: snapshot.window,
    }))
}

/// References panel: what backed the most recent reply.
pub async fn references(
    State(state): State<AppState>,
) -> Result<Json<ReferencesResponse>, ApiError> {
    let snapshot = state.snapshot().await?;
    Ok(Json(ReferencesResponse {
        references: snapshot.references,
    }))
}

/// Accept one recognized segment pushed by the external recognizer.
pub async fn push_utterance(
    State(state): State<AppState>,
    Json(body): Json<UtteranceRequest>,
) -> Result<Json<Value>, ApiError> {
    let transcript = Transcript {
        text: body.text,
        confidence: body.confidence,
        language_code: state.listener.language_code(),
    };

    let outcome = state
        .ingest
        .submit(transcript, &body.speaker_id)
        .await
        .map_err(|e| match e {
            TandemError::Validation(msg) => ApiError::BadRequest(msg),
            _ => ApiError::SessionUnavailable,
        })?;

    let response = match outcome {
        IngestOutcome::Accepted(id) => json!({ "status": "accepted", "id": id }),
        IngestOutcome::DroppedLowConfidence => json!({ "status": "dropped_low_confidence" }),
        IngestOutcome::NotListening => json!({ "status": "not_listening" }),
    };
    Ok(Json(response))
}

/// The active configuration (credentials are not part of it).
pub async fn get_config(State(state): State<AppState>) -> Json<TandemConfig> {
    Json(state.config.as_ref().clone())
}
