//! Error types for the feed adapter

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for feed adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Handshake with the feed endpoint failed
    #[error("Connection failed for {url}: {reason}")]
    ConnectionFailed {
        /// Endpoint that was dialed
        url: String,
        /// Reason for the failure
        reason: String,
    },

    /// Handshake did not complete in time
    #[error("Connection timeout for {url} after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Endpoint that was dialed
        url: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Remote side closed the stream
    #[error("Connection closed: {reason:?}")]
    ConnectionClosed {
        /// Close reason, if the remote sent one
        reason: Option<String>,
    },

    /// Connector was closed and will not be reused
    #[error("Connector is shut down")]
    ShutDown,

    /// No candidate decoder accepted the frame
    #[error("Unrecognized frame ({attempts} decoders tried): {detail}")]
    Normalization {
        /// How many decoders were tried
        attempts: usize,
        /// Error from the last decoder
        detail: String,
    },

    /// JSON parsing error from exchange payload
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error in adapter settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}
