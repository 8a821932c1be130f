//! Chat threads and messages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

coded_enum! {
    /// Read state of a message.
    ///
    /// For the sender's own optimistic copy `Unread` doubles as "sending"
    /// and `Read` as "delivered".
    #[derive(Default)]
    pub enum MessageStatus: "message status" {
        #[default]
        Unread = 0,
        Read = 1,
    }
}

/// Kind of message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "i64")]
pub enum MessageType {
    #[default]
    Text = 0,
    Image = 1,
    System = 2,
}

impl From<MessageType> for i64 {
    fn from(value: MessageType) -> Self {
        value as Self
    }
}

impl From<i64> for MessageType {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Image,
            2 => Self::System,
            // Unknown kinds render as text
            _ => Self::Text,
        }
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::from)
    }
}

/// A single chat message as the API and the real-time channel carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned id; `None` on optimistic local copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub status: MessageStatus,
    pub created_at: NaiveDateTime,
    /// Client-generated id tying an optimistic copy to its server echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ChatMessage {
    pub const fn is_read(&self) -> bool {
        matches!(self.status, MessageStatus::Read)
    }
}

/// A two-party messaging thread scoped to one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub host_id: i64,
    pub guest_id: i64,
    #[serde(default)]
    pub listing_id: Option<i64>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Chat {
    /// The participant that is not `user_id`.
    pub const fn other_participant(&self, user_id: i64) -> i64 {
        if self.host_id == user_id {
            self.guest_id
        } else {
            self.host_id
        }
    }

    pub const fn has_participant(&self, user_id: i64) -> bool {
        self.host_id == user_id || self.guest_id == user_id
    }
}

/// Body for `POST /chats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChat {
    pub host_id: i64,
    pub guest_id: i64,
    pub listing_id: i64,
}

/// Batch read notification, published on the read destination and
/// sent to `PUT /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub chat_id: i64,
    pub reader_id: i64,
    pub message_ids: Vec<i64>,
}
