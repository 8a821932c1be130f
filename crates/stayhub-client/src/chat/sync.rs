//! Local chat state and its reconciliation rules.
//!
//! [`ChatSync`] holds the chat list, each chat's messages in receipt
//! order, the outbox of unconfirmed sends, and unread counters. It is
//! owned by one task and mutated through `&mut self` only.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stayhub_core::config::ChatSettings;
use stayhub_core::models::{Chat, ChatMessage, MessageStatus, MessageType, ReadReceipt};

use super::error::ChatError;
use super::events::ChatEvent;
use super::outbox::Outbox;
use crate::realtime::{self, Publisher, RealtimeError};

const EVENT_CAPACITY: usize = 256;

/// Runtime chat settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long a send may stay unconfirmed before it is marked failed.
    pub send_timeout: Duration,
    pub send_destination: String,
    pub read_destination: String,
    /// Private queue subscribed alongside the per-chat topics.
    pub user_queue: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            send_destination: realtime::SEND_DESTINATION.to_string(),
            read_destination: realtime::READ_DESTINATION.to_string(),
            user_queue: Some(realtime::USER_QUEUE.to_string()),
        }
    }
}

impl ChatConfig {
    pub fn from_settings(settings: &ChatSettings) -> Self {
        Self {
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            ..Self::default()
        }
    }
}

/// Delivery state of a message in the local view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Optimistic copy awaiting the server echo.
    Sending,
    Delivered,
    /// Not confirmed within the send timeout.
    Failed,
}

/// A message as held locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    pub message: ChatMessage,
    pub delivery: DeliveryState,
}

impl LocalMessage {
    fn delivered(message: ChatMessage) -> Self {
        Self {
            message,
            delivery: DeliveryState::Delivered,
        }
    }

    fn has_correlation(&self, correlation_id: &str) -> bool {
        self.message.correlation_id.as_deref() == Some(correlation_id)
    }
}

/// Which reconciliation rule an inbound payload hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Replaced the optimistic copy matching the echoed correlation id.
    Confirmed { chat_id: i64, index: usize },
    /// Replaced an optimistic copy with the same chat, sender and content.
    Matched { chat_id: i64, index: usize },
    /// A message with the same server id was updated in place.
    Updated { chat_id: i64, index: usize },
    Appended { chat_id: i64, index: usize },
    /// A read receipt marked `count` messages read.
    ReadApplied { chat_id: i64, count: usize },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InboundPayload {
    Message(ChatMessage),
    Receipt(ReadReceipt),
}

/// The chat view of one signed-in user.
#[derive(Debug)]
pub struct ChatSync {
    user_id: i64,
    config: ChatConfig,
    chats: BTreeMap<i64, Chat>,
    messages: HashMap<i64, Vec<LocalMessage>>,
    outbox: Outbox,
    open_chat: Option<i64>,
    connected: bool,
    publisher: Publisher,
    events: broadcast::Sender<ChatEvent>,
    /// Receipts produced while disconnected.
    unsent_receipts: Vec<ReadReceipt>,
}

impl ChatSync {
    pub fn new(user_id: i64, config: ChatConfig, publisher: Publisher) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        if let Some(queue) = &config.user_queue
            && let Err(e) = publisher.subscribe(queue.as_str())
        {
            warn!(error = %e, queue = %queue, "Failed to subscribe to user queue");
        }
        Self {
            user_id,
            outbox: Outbox::new(config.send_timeout),
            config,
            chats: BTreeMap::new(),
            messages: HashMap::new(),
            open_chat: None,
            connected: false,
            publisher,
            events,
            unsent_receipts: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<ChatEvent> {
        self.events.clone()
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub const fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Replace the chat list and subscribe to each chat's topic.
    pub fn load_chats(&mut self, chats: Vec<Chat>) {
        for chat in &chats {
            if let Err(e) = self.publisher.subscribe(realtime::chat_topic(chat.id)) {
                warn!(chat_id = chat.id, error = %e, "Failed to subscribe to chat topic");
            }
        }
        info!(count = chats.len(), "Loaded chats");
        self.chats = chats.into_iter().map(|c| (c.id, c)).collect();
    }

    /// Seed a chat's history. Unconfirmed and failed local sends are kept
    /// after the loaded messages unless the history already carries their
    /// correlation id.
    pub fn load_history(&mut self, chat_id: i64, history: Vec<ChatMessage>) {
        let local: Vec<LocalMessage> = self
            .messages
            .remove(&chat_id)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.delivery != DeliveryState::Delivered)
            .filter(|m| {
                let Some(cid) = m.message.correlation_id.as_deref() else {
                    return true;
                };
                let persisted = history
                    .iter()
                    .any(|h| h.correlation_id.as_deref() == Some(cid));
                if persisted {
                    self.outbox.take(cid);
                }
                !persisted
            })
            .collect();

        let mut merged: Vec<LocalMessage> = history.into_iter().map(LocalMessage::delivered).collect();
        merged.extend(local);
        debug!(chat_id, count = merged.len(), "Loaded chat history");
        self.messages.insert(chat_id, merged);
    }

    /// Send `content` optimistically. Returns the correlation id.
    pub fn send(&mut self, chat_id: i64, content: &str, now: Instant) -> Result<String, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.connected {
            return Err(ChatError::NotConnected);
        }

        let correlation_id = Uuid::new_v4().to_string();
        let message = ChatMessage {
            id: None,
            chat_id,
            sender_id: self.user_id,
            content: content.to_string(),
            message_type: MessageType::Text,
            status: MessageStatus::Unread,
            created_at: Utc::now().naive_utc(),
            correlation_id: Some(correlation_id.clone()),
        };
        let body = serde_json::to_string(&message).map_err(|e| ChatError::Encode(e.to_string()))?;
        self.publisher
            .publish(self.config.send_destination.as_str(), body)
            .map_err(|e| match e {
                RealtimeError::Closed => ChatError::ChannelClosed,
                _ => ChatError::NotConnected,
            })?;

        self.outbox.add(&correlation_id, chat_id, content, now);
        self.touch_chat(&message);
        self.messages.entry(chat_id).or_default().push(LocalMessage {
            message: message.clone(),
            delivery: DeliveryState::Sending,
        });
        debug!(chat_id, correlation_id = %correlation_id, "Message sent optimistically");
        self.emit(ChatEvent::MessageAdded { chat_id, message });
        Ok(correlation_id)
    }

    /// Apply one payload from the real-time channel.
    pub fn handle_inbound(&mut self, payload: &str) -> Result<Reconciled, ChatError> {
        let payload: InboundPayload = serde_json::from_str(payload)
            .map_err(|e| ChatError::MalformedServerPayload(e.to_string()))?;
        match payload {
            InboundPayload::Message(message) => Ok(self.reconcile(message)),
            InboundPayload::Receipt(receipt) => Ok(self.apply_receipt(&receipt)),
        }
    }

    fn reconcile(&mut self, message: ChatMessage) -> Reconciled {
        let chat_id = message.chat_id;
        let list = self.messages.entry(chat_id).or_default();

        // Echoed correlation id; a late echo also rescues a failed copy.
        if let Some(cid) = message.correlation_id.clone()
            && let Some(index) = list.iter().position(|m| m.has_correlation(&cid))
        {
            let index = settle(list, index, message.clone());
            self.outbox.take(&cid);
            debug!(chat_id, correlation_id = %cid, "Send confirmed by correlation id");
            self.emit(ChatEvent::MessageConfirmed {
                chat_id,
                correlation_id: cid,
                message,
            });
            return Reconciled::Confirmed { chat_id, index };
        }

        // Server dropped the correlation id: match on chat, sender and content.
        if message.correlation_id.is_none()
            && message.sender_id == self.user_id
            && let Some(index) = list.iter().position(|m| {
                m.delivery == DeliveryState::Sending
                    && m.message.id.is_none()
                    && m.message.sender_id == message.sender_id
                    && m.message.content == message.content
            })
        {
            let cid = list[index].message.correlation_id.clone().unwrap_or_default();
            let index = settle(list, index, message.clone());
            self.outbox.take(&cid);
            debug!(chat_id, correlation_id = %cid, "Send confirmed by content match");
            self.emit(ChatEvent::MessageConfirmed {
                chat_id,
                correlation_id: cid,
                message,
            });
            return Reconciled::Matched { chat_id, index };
        }

        if let Some(id) = message.id
            && let Some(index) = list.iter().position(|m| m.message.id == Some(id))
        {
            let mut message = message;
            // Read is sticky: a stale copy never makes a message unread again.
            if list[index].message.is_read() {
                message.status = MessageStatus::Read;
            }
            list[index] = LocalMessage::delivered(message.clone());
            debug!(chat_id, message_id = id, "Message updated in place");
            self.emit(ChatEvent::MessageUpdated { chat_id, message });
            return Reconciled::Updated { chat_id, index };
        }

        let mut message = message;
        let from_other = message.sender_id != self.user_id;
        let viewing = self.open_chat == Some(chat_id);
        if from_other && viewing {
            message.status = MessageStatus::Read;
        }

        list.push(LocalMessage::delivered(message.clone()));
        let index = list.len() - 1;
        self.touch_chat(&message);
        let message_id = message.id;
        let unread = message.status == MessageStatus::Unread;
        self.emit(ChatEvent::MessageAdded { chat_id, message });

        if from_other && unread {
            self.bump_unread(chat_id);
        } else if from_other && viewing && let Some(id) = message_id {
            self.emit(ChatEvent::MessagesRead {
                chat_id,
                message_ids: vec![id],
            });
            self.send_receipt(ReadReceipt {
                chat_id,
                reader_id: self.user_id,
                message_ids: vec![id],
            });
        }
        Reconciled::Appended { chat_id, index }
    }

    fn apply_receipt(&mut self, receipt: &ReadReceipt) -> Reconciled {
        let chat_id = receipt.chat_id;
        let mut newly_read = Vec::new();
        let mut newly_read_incoming = 0_u32;

        if let Some(list) = self.messages.get_mut(&chat_id) {
            for local in list.iter_mut() {
                let Some(id) = local.message.id else { continue };
                if local.message.status == MessageStatus::Unread && receipt.message_ids.contains(&id) {
                    local.message.status = MessageStatus::Read;
                    if local.message.sender_id != self.user_id {
                        newly_read_incoming += 1;
                    }
                    newly_read.push(id);
                }
            }
        }

        if !newly_read.is_empty() {
            debug!(chat_id, reader_id = receipt.reader_id, count = newly_read.len(), "Applied read receipt");
            let count = newly_read.len();
            self.emit(ChatEvent::MessagesRead {
                chat_id,
                message_ids: newly_read,
            });
            // Our own reads from another device clear unread here too.
            if receipt.reader_id == self.user_id && newly_read_incoming > 0 {
                self.adjust_unread(chat_id, |n| n.saturating_sub(newly_read_incoming));
            }
            return Reconciled::ReadApplied { chat_id, count };
        }
        Reconciled::ReadApplied { chat_id, count: 0 }
    }

    /// Open a chat: mark its unread incoming messages read and publish one
    /// batch receipt. Returns the ids marked.
    pub fn open_chat(&mut self, chat_id: i64) -> Vec<i64> {
        self.open_chat = Some(chat_id);
        let user_id = self.user_id;

        let mut marked = Vec::new();
        if let Some(list) = self.messages.get_mut(&chat_id) {
            for local in list.iter_mut() {
                if local.message.sender_id != user_id
                    && local.message.status == MessageStatus::Unread
                {
                    local.message.status = MessageStatus::Read;
                    if let Some(id) = local.message.id {
                        marked.push(id);
                    }
                }
            }
        }

        self.adjust_unread(chat_id, |_| 0);
        info!(chat_id, marked = marked.len(), "Chat opened");

        if !marked.is_empty() {
            self.emit(ChatEvent::MessagesRead {
                chat_id,
                message_ids: marked.clone(),
            });
            self.send_receipt(ReadReceipt {
                chat_id,
                reader_id: user_id,
                message_ids: marked.clone(),
            });
        }
        marked
    }

    pub fn close_chat(&mut self) {
        if let Some(chat_id) = self.open_chat.take() {
            debug!(chat_id, "Chat closed");
        }
    }

    /// Mark sends past their deadline as failed.
    pub fn expire_pending(&mut self, now: Instant) -> Vec<ChatError> {
        let mut failures = Vec::new();
        for pending in self.outbox.take_expired(now) {
            if let Some(local) = self
                .messages
                .get_mut(&pending.chat_id)
                .and_then(|list| list.iter_mut().find(|m| m.has_correlation(&pending.correlation_id)))
            {
                local.delivery = DeliveryState::Failed;
            }
            warn!(
                chat_id = pending.chat_id,
                correlation_id = %pending.correlation_id,
                "Send not confirmed in time"
            );
            self.emit(ChatEvent::MessageFailed {
                chat_id: pending.chat_id,
                correlation_id: pending.correlation_id.clone(),
            });
            failures.push(ChatError::SendTimeout {
                correlation_id: pending.correlation_id,
                chat_id: pending.chat_id,
            });
        }
        failures
    }

    /// Retry a failed send under a fresh correlation id.
    pub fn resend(&mut self, correlation_id: &str, now: Instant) -> Result<String, ChatError> {
        let Some((chat_id, index)) = self.messages.iter().find_map(|(chat_id, list)| {
            list.iter()
                .position(|m| m.delivery == DeliveryState::Failed && m.has_correlation(correlation_id))
                .map(|index| (*chat_id, index))
        }) else {
            return Err(ChatError::UnknownMessage(correlation_id.to_string()));
        };
        if !self.connected {
            return Err(ChatError::NotConnected);
        }

        let Some(content) = self
            .messages
            .get(&chat_id)
            .and_then(|list| list.get(index))
            .map(|m| m.message.content.clone())
        else {
            return Err(ChatError::UnknownMessage(correlation_id.to_string()));
        };
        info!(chat_id, correlation_id, "Resending failed message");
        // The failed copy stays until the new send is accepted.
        let new_correlation_id = self.send(chat_id, &content, now)?;
        if let Some(list) = self.messages.get_mut(&chat_id) {
            list.remove(index);
        }
        self.emit(ChatEvent::MessageRemoved {
            chat_id,
            correlation_id: correlation_id.to_string(),
        });
        Ok(new_correlation_id)
    }

    pub fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        info!(connected, "Chat channel connection changed");
        self.emit(ChatEvent::ConnectionChanged { connected });

        if connected {
            for receipt in std::mem::take(&mut self.unsent_receipts) {
                self.send_receipt(receipt);
            }
        }
    }

    fn send_receipt(&mut self, receipt: ReadReceipt) {
        if self.connected {
            match serde_json::to_string(&receipt) {
                Ok(body) => match self.publisher.publish(self.config.read_destination.as_str(), body) {
                    Ok(()) => {
                        debug!(chat_id = receipt.chat_id, count = receipt.message_ids.len(), "Read receipt published");
                        return;
                    }
                    Err(e) => warn!(error = %e, "Failed to publish read receipt"),
                },
                Err(e) => warn!(error = %e, "Failed to encode read receipt"),
            }
        }
        self.unsent_receipts.push(receipt);
    }

    /// Receipts that could not be published, for delivery by other means.
    pub fn take_unsent_receipts(&mut self) -> Vec<ReadReceipt> {
        std::mem::take(&mut self.unsent_receipts)
    }

    fn bump_unread(&mut self, chat_id: i64) {
        if !self.chats.contains_key(&chat_id) {
            debug!(chat_id, "Message for a chat not in the list");
            return;
        }
        self.adjust_unread(chat_id, |n| n.saturating_add(1));
    }

    fn adjust_unread(&mut self, chat_id: i64, f: impl FnOnce(u32) -> u32) {
        let Some(chat) = self.chats.get_mut(&chat_id) else {
            return;
        };
        let next = f(chat.unread_count);
        if next != chat.unread_count {
            chat.unread_count = next;
            self.emit(ChatEvent::UnreadChanged {
                chat_id,
                unread_count: next,
            });
        }
    }

    fn touch_chat(&mut self, message: &ChatMessage) {
        if let Some(chat) = self.chats.get_mut(&message.chat_id) {
            chat.last_message = Some(message.content.clone());
            chat.last_message_time = Some(message.created_at);
        }
    }

    pub fn messages(&self, chat_id: i64) -> &[LocalMessage] {
        self.messages.get(&chat_id).map_or(&[], Vec::as_slice)
    }

    pub fn chat(&self, chat_id: i64) -> Option<&Chat> {
        self.chats.get(&chat_id)
    }

    pub fn chats(&self) -> impl Iterator<Item = &Chat> {
        self.chats.values()
    }

    pub fn total_unread(&self) -> u32 {
        self.chats.values().map(|c| c.unread_count).sum()
    }

    pub const fn open_chat_id(&self) -> Option<i64> {
        self.open_chat
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pending_sends(&self) -> usize {
        self.outbox.len()
    }
}

/// Put the authoritative copy of a message in the slot at `index`. When
/// another row already holds the same server id, that row is updated and
/// the slot at `index` is dropped. Returns the index of the surviving row.
fn settle(list: &mut Vec<LocalMessage>, index: usize, mut message: ChatMessage) -> usize {
    let existing = message
        .id
        .and_then(|id| (0..list.len()).find(|&i| i != index && list[i].message.id == Some(id)));
    let Some(slot) = existing else {
        list[index] = LocalMessage::delivered(message);
        return index;
    };
    list.remove(index);
    let slot = if slot > index { slot - 1 } else { slot };
    if list[slot].message.is_read() {
        message.status = MessageStatus::Read;
    }
    list[slot] = LocalMessage::delivered(message);
    slot
}
