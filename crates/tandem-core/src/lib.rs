pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{Credentials, PersonaConfig, TandemConfig};
pub use error::{Result, TandemError};
pub use events::{SessionCommand, SessionEvent, SessionSnapshot};
pub use types::*;
