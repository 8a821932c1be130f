//! Real-time client error types.

/// Errors that can occur on the real-time channel.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Connection closed by server")]
    Closed,
}
