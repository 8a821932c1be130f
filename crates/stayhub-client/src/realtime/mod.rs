//! Real-time chat channel: STOMP frames over a WebSocket.

mod client;
mod config;
mod error;
pub mod frame;

pub use client::{
    ConnectionState, InboundMessage, Outbound, Publisher, RealtimeChannels, RealtimeClient,
};
pub use config::{RealtimeConfig, ReconnectPolicy};
pub use error::RealtimeError;

/// Per-chat broadcast topic.
pub fn chat_topic(chat_id: i64) -> String {
    format!("/topic/chat/{chat_id}")
}

/// The signed-in user's private queue.
pub const USER_QUEUE: &str = "/user/queue/messages";
/// Destination for outbound chat messages.
pub const SEND_DESTINATION: &str = "/app/chat.send";
/// Destination for read receipts.
pub const READ_DESTINATION: &str = "/app/chat.read";
