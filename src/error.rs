//! Error handling for the proctoring session engine

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// Nothing here is fatal to the host process: every variant degrades the
/// current session and is surfaced to the caller or logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied unusable input (e.g. empty candidate name)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Frame source cannot be acquired or failed to capture
    #[error("Frame source unavailable: {0}")]
    FrameSourceUnavailable(String),

    /// Malformed or error message on the detection channel
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Detection channel connection was lost
    #[error("Channel closed")]
    ChannelClosed,

    /// Registration collaborator rejected the session start
    #[error("Session start failed: {0}")]
    SessionStartFailed(String),

    /// Registration collaborator rejected the session end
    #[error("Session end failed: {0}")]
    SessionEndFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
