//! Router setup with all API routes and middleware.

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// CORS allows the localhost origin the UI is served from; everything
/// else stays same-origin.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.session.port;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            format!("http://127.0.0.1:{}", port)
                .parse::<HeaderValue>()
                .expect("static origin"),
            format!("http://localhost:{}", port)
                .parse::<HeaderValue>()
                .expect("static origin"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/listen/start", post(handlers::listen_start))
        .route("/listen/stop", post(handlers::listen_stop))
        .route("/language", put(handlers::set_language))
        .route("/transcript", get(handlers::transcript))
        .route("/references", get(handlers::references))
        .route("/utterance", post(handlers::push_utterance))
        .route("/config", get(handlers::get_config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Tests
// =============================================================================
