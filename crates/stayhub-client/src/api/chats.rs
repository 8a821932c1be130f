//! Chat thread and message endpoints.
//!
//! These back the initial load of the chat list and history; live
//! traffic goes over the real-time channel.

use reqwest::Method;
use serde::Serialize;

use stayhub_core::models::{Chat, ChatMessage, MessageType, NewChat, ReadReceipt, RoleType};

use super::{ApiClient, ApiError, query_string};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMessage<'a> {
    chat_id: i64,
    sender_id: i64,
    content: &'a str,
    message_type: MessageType,
}

impl ApiClient {
    pub async fn create_chat(&self, chat: &NewChat) -> Result<Chat, ApiError> {
        self.send_json(Method::POST, "/chats", chat).await
    }

    /// Chats `user_id` participates in under `role`.
    pub async fn chats(&self, user_id: i64, role: RoleType) -> Result<Vec<Chat>, ApiError> {
        let query = query_string(&[("roleType", Some(i64::from(role).to_string()))]);
        self.get(&format!("/chats/{user_id}{query}")).await
    }

    /// Full history of a chat, oldest first.
    pub async fn messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>, ApiError> {
        self.get(&format!("/messages/{chat_id}")).await
    }

    pub async fn create_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ApiError> {
        let body = NewMessage {
            chat_id,
            sender_id,
            content,
            message_type: MessageType::Text,
        };
        self.send_json(Method::POST, "/messages", &body).await
    }

    /// Mark a batch of messages read.
    pub async fn mark_messages_read(&self, receipt: &ReadReceipt) -> Result<(), ApiError> {
        self.send_json_unit(Method::PUT, "/messages", receipt).await
    }
}
