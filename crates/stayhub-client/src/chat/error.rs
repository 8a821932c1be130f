//! Chat synchronization errors.

/// Errors surfaced by [`ChatSync`](super::ChatSync) and its task handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Not connected to the chat channel")]
    NotConnected,

    #[error("Message {correlation_id} in chat {chat_id} was not confirmed in time")]
    SendTimeout { correlation_id: String, chat_id: i64 },

    #[error("Malformed server payload: {0}")]
    MalformedServerPayload(String),

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("No failed message with correlation id {0}")]
    UnknownMessage(String),

    #[error("Failed to encode outbound payload: {0}")]
    Encode(String),

    #[error("Chat task is no longer running")]
    ChannelClosed,
}
