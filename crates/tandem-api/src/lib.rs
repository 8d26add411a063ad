//! HTTP surface consumed by the external UI.
//!
//! Exposes the session controls the UI needs: start/stop listening, a
//! language selector, the live transcript view, and the references panel.
//! All conversational state lives behind the session task; handlers talk
//! to it through the command channel and never mutate shared state
//! directly.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
