use thiserror::Error;

/// Top-level error type for the Tandem system.
///
/// Each variant corresponds to one failure class in the recovery policy:
/// configuration errors are fatal at startup, validation errors are rejected
/// locally without mutating state, and collaborator failures (retrieval,
/// generation, transcription, synthesis, search) are recovered by degrading
/// to a reduced path. Subsystem crates convert into this type so the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TandemError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reference retrieval unavailable: {0}")]
    Retrieval(String),

    #[error("Generation timed out after {timeout_secs}s")]
    GenerationTimeout { timeout_secs: u64 },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl TandemError {
    /// True for failures that must terminate the process at startup.
    ///
    /// Everything else is recovered locally and never aborts an active
    /// session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TandemError::Config(_))
    }
}

impl From<toml::de::Error> for TandemError {
    fn from(err: toml::de::Error) -> Self {
        TandemError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TandemError {
    fn from(err: toml::ser::Error) -> Self {
        TandemError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TandemError {
    fn from(err: serde_json::Error) -> Self {
        TandemError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tandem operations.
pub type Result<T> = std::result::Result<T, TandemError>;
