//! Error types for the Solace companion core

use thiserror::Error;

/// Result type alias for Solace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the companion session core
///
/// Propagation policy: `Config` is fatal at launch, `Connection` terminates
/// the session after one reconnect attempt, everything per-utterance
/// (`Generation`, `GenerationTimeout`, `Synthesis`, `Transcription`) is
/// recovered and the session continues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing/invalid startup secrets)
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected malformed request (caller's fault, e.g. empty room name)
    #[error("validation error: {0}")]
    Validation(String),

    /// Room transport unreachable or refused the grant
    #[error("connection error: {0}")]
    Connection(String),

    /// LLM generation failure
    #[error("generation error: {0}")]
    Generation(String),

    /// LLM response missed the hard deadline
    #[error("generation timed out after {0:?}")]
    GenerationTimeout(std::time::Duration),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Speech-to-text error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Grant signing error
    #[error("signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

impl Error {
    /// Whether the session survives this error (transient per-utterance
    /// failures never terminate the session)
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Generation(_)
                | Self::GenerationTimeout(_)
                | Self::Synthesis(_)
                | Self::Transcription(_)
        )
    }
}
