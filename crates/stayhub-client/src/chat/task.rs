//! Single-consumer task that owns [`ChatSync`].
//!
//! Commands arrive from cloneable [`ChatHandle`]s; payloads and
//! connection state arrive from the real-time client. Send timeouts are
//! swept on an interval.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use stayhub_core::models::{Chat, ChatMessage, ReadReceipt};

use super::error::ChatError;
use super::events::ChatEvent;
use super::sync::{ChatSync, LocalMessage};
use crate::api::ApiClient;
use crate::realtime::{ConnectionState, InboundMessage};

const COMMAND_CAPACITY: usize = 64;
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Requests accepted by the chat task.
#[derive(Debug)]
pub enum ChatCommand {
    LoadChats {
        chats: Vec<Chat>,
    },
    LoadHistory {
        chat_id: i64,
        messages: Vec<ChatMessage>,
    },
    Send {
        chat_id: i64,
        content: String,
        reply: oneshot::Sender<Result<String, ChatError>>,
    },
    Resend {
        correlation_id: String,
        reply: oneshot::Sender<Result<String, ChatError>>,
    },
    Open {
        chat_id: i64,
        reply: oneshot::Sender<Vec<i64>>,
    },
    Close,
    Snapshot {
        chat_id: i64,
        reply: oneshot::Sender<ChatSnapshot>,
    },
}

/// Point-in-time copy of one chat's state.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub chat: Option<Chat>,
    pub messages: Vec<LocalMessage>,
    pub connected: bool,
    pub total_unread: u32,
}

/// Cloneable front end to a running [`ChatSyncTask`].
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<ChatCommand>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ChatCommand,
    ) -> Result<T, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| ChatError::ChannelClosed)?;
        rx.await.map_err(|_| ChatError::ChannelClosed)
    }

    async fn notify(&self, command: ChatCommand) -> Result<(), ChatError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatError::ChannelClosed)
    }

    pub async fn load_chats(&self, chats: Vec<Chat>) -> Result<(), ChatError> {
        self.notify(ChatCommand::LoadChats { chats }).await
    }

    pub async fn load_history(&self, chat_id: i64, messages: Vec<ChatMessage>) -> Result<(), ChatError> {
        self.notify(ChatCommand::LoadHistory { chat_id, messages }).await
    }

    /// Send a message; resolves to its correlation id once queued.
    pub async fn send(&self, chat_id: i64, content: impl Into<String>) -> Result<String, ChatError> {
        let content = content.into();
        self.request(|reply| ChatCommand::Send {
            chat_id,
            content,
            reply,
        })
        .await?
    }

    pub async fn resend(&self, correlation_id: impl Into<String>) -> Result<String, ChatError> {
        let correlation_id = correlation_id.into();
        self.request(|reply| ChatCommand::Resend {
            correlation_id,
            reply,
        })
        .await?
    }

    pub async fn open(&self, chat_id: i64) -> Result<Vec<i64>, ChatError> {
        self.request(|reply| ChatCommand::Open { chat_id, reply })
            .await
    }

    pub async fn close(&self) -> Result<(), ChatError> {
        self.notify(ChatCommand::Close).await
    }

    pub async fn snapshot(&self, chat_id: i64) -> Result<ChatSnapshot, ChatError> {
        self.request(|reply| ChatCommand::Snapshot { chat_id, reply })
            .await
    }
}

/// Owns the chat state and drives it from commands, inbound payloads,
/// connection changes and the timeout sweep.
pub struct ChatSyncTask {
    sync: ChatSync,
    commands: mpsc::Receiver<ChatCommand>,
    inbound: mpsc::Receiver<InboundMessage>,
    state: watch::Receiver<ConnectionState>,
    api: Option<ApiClient>,
    sweep_interval: Duration,
}

impl ChatSyncTask {
    pub fn new(
        sync: ChatSync,
        inbound: mpsc::Receiver<InboundMessage>,
        state: watch::Receiver<ConnectionState>,
    ) -> (Self, ChatHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = ChatHandle {
            commands: tx,
            events: sync.event_sender(),
        };
        let task = Self {
            sync,
            commands: rx,
            inbound,
            state,
            api: None,
            sweep_interval: SWEEP_INTERVAL,
        };
        (task, handle)
    }

    /// Deliver read receipts over REST when the channel is down.
    #[must_use]
    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Run until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let connected = self.state.borrow_and_update().is_connected();
        self.sync.set_connected(connected);

        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound_open = true;
        let mut state_open = true;

        info!(user_id = self.sync.user_id(), "Chat task started");
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("All chat handles dropped");
                        break;
                    };
                    self.apply(command);
                }
                message = self.inbound.recv(), if inbound_open => {
                    match message {
                        Some(message) => self.on_inbound(&message),
                        None => {
                            debug!("Inbound queue closed");
                            inbound_open = false;
                        }
                    }
                }
                changed = self.state.changed(), if state_open => {
                    let connected = if changed.is_ok() {
                        self.state.borrow_and_update().is_connected()
                    } else {
                        state_open = false;
                        false
                    };
                    self.sync.set_connected(connected);
                }
                _ = sweep.tick() => {
                    for failure in self.sync.expire_pending(Instant::now()) {
                        debug!(error = %failure, "Send timed out");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Chat task received shutdown signal");
                    break;
                }
            }
            self.flush_receipts();
        }
    }

    fn apply(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::LoadChats { chats } => self.sync.load_chats(chats),
            ChatCommand::LoadHistory { chat_id, messages } => {
                self.sync.load_history(chat_id, messages);
            }
            ChatCommand::Send {
                chat_id,
                content,
                reply,
            } => {
                let _ = reply.send(self.sync.send(chat_id, &content, Instant::now()));
            }
            ChatCommand::Resend {
                correlation_id,
                reply,
            } => {
                let _ = reply.send(self.sync.resend(&correlation_id, Instant::now()));
            }
            ChatCommand::Open { chat_id, reply } => {
                let _ = reply.send(self.sync.open_chat(chat_id));
            }
            ChatCommand::Close => self.sync.close_chat(),
            ChatCommand::Snapshot { chat_id, reply } => {
                let _ = reply.send(ChatSnapshot {
                    chat: self.sync.chat(chat_id).cloned(),
                    messages: self.sync.messages(chat_id).to_vec(),
                    connected: self.sync.is_connected(),
                    total_unread: self.sync.total_unread(),
                });
            }
        }
    }

    fn on_inbound(&mut self, message: &InboundMessage) {
        match self.sync.handle_inbound(&message.body) {
            Ok(outcome) => debug!(destination = %message.destination, ?outcome, "Inbound payload applied"),
            Err(e) => warn!(destination = %message.destination, error = %e, "Dropping inbound payload"),
        }
    }

    /// Hand receipts the channel could not take to the REST API.
    fn flush_receipts(&mut self) {
        if self.sync.is_connected() {
            return;
        }
        let Some(api) = &self.api else {
            return;
        };
        for receipt in self.sync.take_unsent_receipts() {
            let api = api.clone();
            tokio::spawn(mark_read(api, receipt));
        }
    }
}

async fn mark_read(api: ApiClient, receipt: ReadReceipt) {
    match api.mark_messages_read(&receipt).await {
        Ok(()) => debug!(chat_id = receipt.chat_id, "Read receipt delivered over REST"),
        Err(e) => warn!(chat_id = receipt.chat_id, error = %e, "Failed to deliver read receipt"),
    }
}
