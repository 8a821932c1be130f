//! Change notifications broadcast by the chat state owner.

use stayhub_core::models::ChatMessage;

/// Something changed in the local chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message was appended (optimistic send or new inbound message).
    MessageAdded { chat_id: i64, message: ChatMessage },
    /// The server echoed an optimistic send; `message` is its authoritative copy.
    MessageConfirmed {
        chat_id: i64,
        correlation_id: String,
        message: ChatMessage,
    },
    /// A known message was replaced by a newer server copy.
    MessageUpdated { chat_id: i64, message: ChatMessage },
    /// An optimistic send timed out.
    MessageFailed { chat_id: i64, correlation_id: String },
    /// A failed send was withdrawn ahead of a resend.
    MessageRemoved { chat_id: i64, correlation_id: String },
    /// Messages changed to read.
    MessagesRead { chat_id: i64, message_ids: Vec<i64> },
    UnreadChanged { chat_id: i64, unread_count: u32 },
    ConnectionChanged { connected: bool },
}
