//! Error types for pubsub-link.

use thiserror::Error;

/// Errors that can occur in pubsub-link operations.
#[derive(Error, Debug)]
pub enum PubsubLinkError {
    /// WebSocket transport failure (dial, send, or mid-stream error).
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Failed to serialize an outgoing envelope.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid endpoint URL or connection options.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Malformed request input (e.g. a non-numeric filter field). This is a
    /// caller bug surfaced at construction time, not a runtime condition.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The background connection task is no longer running.
    #[error("Connection task is not running")]
    ChannelClosed,
}

/// Result type for pubsub-link operations.
pub type Result<T> = std::result::Result<T, PubsubLinkError>;
