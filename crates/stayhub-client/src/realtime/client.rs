//! WebSocket client that keeps the chat channel connected.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, sleep, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use super::config::RealtimeConfig;
use super::error::RealtimeError;
use super::frame::{Command, Frame};

const QUEUE_CAPACITY: usize = 256;

/// Connection state published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Work queued for the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Publish { destination: String, body: String },
    Subscribe { destination: String },
    Unsubscribe { destination: String },
}

/// A MESSAGE frame body and the destination it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub destination: String,
    pub body: String,
}

/// Cloneable, non-blocking handle for queueing outbound work.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Outbound>,
}

impl Publisher {
    /// A publisher paired with the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn publish(
        &self,
        destination: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), RealtimeError> {
        self.enqueue(Outbound::Publish {
            destination: destination.into(),
            body: body.into(),
        })
    }

    /// Subscribe now and again after every reconnect.
    pub fn subscribe(&self, destination: impl Into<String>) -> Result<(), RealtimeError> {
        self.enqueue(Outbound::Subscribe {
            destination: destination.into(),
        })
    }

    pub fn unsubscribe(&self, destination: impl Into<String>) -> Result<(), RealtimeError> {
        self.enqueue(Outbound::Unsubscribe {
            destination: destination.into(),
        })
    }

    fn enqueue(&self, item: Outbound) -> Result<(), RealtimeError> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RealtimeError::Stream("outbound queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => RealtimeError::Closed,
        })
    }
}

/// Endpoints handed to the consumer of a [`RealtimeClient`].
#[derive(Debug)]
pub struct RealtimeChannels {
    pub publisher: Publisher,
    pub inbound: mpsc::Receiver<InboundMessage>,
    pub state: watch::Receiver<ConnectionState>,
}

/// Maintains the STOMP-over-WebSocket connection, reconnecting per policy.
pub struct RealtimeClient {
    config: RealtimeConfig,
    outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::Sender<InboundMessage>,
    state: watch::Sender<ConnectionState>,
    /// destination -> subscription id, replayed on every connect
    subscriptions: BTreeMap<String, String>,
    next_subscription: u64,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> (Self, RealtimeChannels) {
        let (publisher, outbound) = Publisher::channel(QUEUE_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let client = Self {
            config,
            outbound,
            inbound: inbound_tx,
            state: state_tx,
            subscriptions: BTreeMap::new(),
            next_subscription: 0,
        };
        let channels = RealtimeChannels {
            publisher,
            inbound: inbound_rx,
            state: state_rx,
        };
        (client, channels)
    }

    /// Run with automatic reconnection until shutdown, until every
    /// publisher is dropped, or until the policy gives up.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Realtime client shutting down");
                break;
            }

            let started = Instant::now();
            let result = self.connect_and_run(&mut shutdown).await;
            self.set_state(ConnectionState::Disconnected);

            match result {
                Ok(()) => {
                    info!("Realtime connection closed cleanly");
                    break;
                }
                Err(e) => {
                    // Reset backoff if connection was up for >60s
                    if started.elapsed() > Duration::from_secs(60) {
                        attempt = 0;
                    }

                    if !self.config.reconnect.should_retry(attempt) {
                        error!(error = %e, attempt, "Max reconnect attempts reached");
                        break;
                    }

                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis(), "Reconnecting");

                    tokio::select! {
                        () = sleep(delay) => {}
                        _ = shutdown.changed() => {
                            info!("Realtime client shutting down during reconnect wait");
                            break;
                        }
                    }

                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Apply queued subscription changes and drop publishes queued while
    /// no connection existed.
    fn drain_offline_queue(&mut self) -> bool {
        loop {
            match self.outbound.try_recv() {
                Ok(Outbound::Publish { destination, .. }) => {
                    warn!(%destination, "Dropping publish queued while disconnected");
                }
                Ok(Outbound::Subscribe { destination }) => {
                    self.register_subscription(&destination);
                }
                Ok(Outbound::Unsubscribe { destination }) => {
                    self.subscriptions.remove(&destination);
                }
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Record a subscription, returning its id if it is new.
    fn register_subscription(&mut self, destination: &str) -> Option<String> {
        if self.subscriptions.contains_key(destination) {
            return None;
        }
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(destination.to_string(), id.clone());
        Some(id)
    }

    /// Connect, perform the STOMP handshake, and run the frame loop.
    async fn connect_and_run(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RealtimeError> {
        if !self.drain_offline_queue() {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);

        let (ws, _) = timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.config.ws_url.as_str()),
        )
        .await
        .map_err(|_| RealtimeError::Connection("timed out opening WebSocket".into()))?
        .map_err(|e| RealtimeError::Connection(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let connect = Frame::connect(
            host_of(&self.config.ws_url),
            self.config.token.as_deref(),
            self.config.heartbeat_interval,
        );
        sink.send(text(&connect))
            .await
            .map_err(|e| RealtimeError::Connection(e.to_string()))?;

        timeout(self.config.connect_timeout, await_connected(&mut stream))
            .await
            .map_err(|_| RealtimeError::Connection("timed out waiting for CONNECTED".into()))??;

        for (destination, id) in &self.subscriptions {
            sink.send(text(&Frame::subscribe(id, destination)))
                .await
                .map_err(|e| RealtimeError::Stream(e.to_string()))?;
        }

        self.set_state(ConnectionState::Connected);
        info!(
            url = %self.config.ws_url,
            subscriptions = self.subscriptions.len(),
            "Realtime channel connected"
        );

        let mut heartbeat = (!self.config.heartbeat_interval.is_zero())
            .then(|| tokio::time::interval(self.config.heartbeat_interval));

        loop {
            tokio::select! {
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(body))) => {
                            let frame = match Frame::decode(body.as_str()) {
                                Ok(Some(frame)) => frame,
                                Ok(None) => continue,
                                Err(e) => {
                                    warn!(error = %e, "Dropping undecodable frame");
                                    continue;
                                }
                            };
                            match frame.command {
                                Command::Message => {
                                    let message = InboundMessage {
                                        destination: frame.get("destination").unwrap_or_default().to_string(),
                                        body: frame.body,
                                    };
                                    if self.inbound.send(message).await.is_err() {
                                        info!("Inbound consumer gone, closing realtime channel");
                                        let _ = sink.send(text(&Frame::disconnect())).await;
                                        return Ok(());
                                    }
                                }
                                Command::Error => {
                                    return Err(RealtimeError::Protocol(
                                        frame.get("message").unwrap_or("server error").to_string(),
                                    ));
                                }
                                other => debug!(command = %other, "Ignoring frame"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Err(RealtimeError::Closed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(RealtimeError::Stream(e.to_string())),
                    }
                }
                queued = self.outbound.recv() => {
                    let Some(queued) = queued else {
                        info!("All publishers dropped, closing realtime channel");
                        let _ = sink.send(text(&Frame::disconnect())).await;
                        return Ok(());
                    };
                    let frame = match queued {
                        Outbound::Publish { destination, body } => Some(Frame::send(&destination, body)),
                        Outbound::Subscribe { destination } => self
                            .register_subscription(&destination)
                            .map(|id| Frame::subscribe(&id, &destination)),
                        Outbound::Unsubscribe { destination } => self
                            .subscriptions
                            .remove(&destination)
                            .map(|id| Frame::unsubscribe(&id)),
                    };
                    if let Some(frame) = frame {
                        sink.send(text(&frame))
                            .await
                            .map_err(|e| RealtimeError::Stream(e.to_string()))?;
                    }
                }
                () = tick(heartbeat.as_mut()) => {
                    sink.send(Message::Text("\n".into()))
                        .await
                        .map_err(|e| RealtimeError::Stream(e.to_string()))?;
                }
                _ = shutdown.changed() => {
                    info!("Realtime client received shutdown signal");
                    let _ = sink.send(text(&Frame::disconnect())).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
            }
        }
    }
}

/// Read frames until the server accepts or rejects the STOMP session.
async fn await_connected<S>(stream: &mut S) -> Result<(), RealtimeError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(body))) => match Frame::decode(body.as_str())? {
                Some(frame) if frame.command == Command::Connected => {
                    debug!(version = ?frame.get("version"), "STOMP session established");
                    return Ok(());
                }
                Some(frame) if frame.command == Command::Error => {
                    return Err(RealtimeError::Protocol(
                        frame.get("message").unwrap_or("connect rejected").to_string(),
                    ));
                }
                _ => {}
            },
            Some(Ok(Message::Close(_))) | None => return Err(RealtimeError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RealtimeError::Stream(e.to_string())),
        }
    }
}

fn text(frame: &Frame) -> Message {
    Message::Text(frame.encode().into())
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Host (and port) portion of a WebSocket URL, for the CONNECT `host` header.
fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or(without_scheme)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn host_is_extracted_from_url() {
        assert_eq!(host_of("ws://localhost:8080/ws"), "localhost:8080");
        assert_eq!(host_of("wss://chat.example.com"), "chat.example.com");
        assert_eq!(host_of("example.com/ws?x=1"), "example.com");
    }

    #[test]
    fn publisher_reports_closed_queue() {
        let (publisher, rx) = Publisher::channel(1);
        drop(rx);
        assert!(matches!(
            publisher.publish("/app/chat.send", "{}"),
            Err(RealtimeError::Closed)
        ));
    }

    #[test]
    fn publisher_reports_full_queue() {
        let (publisher, _rx) = Publisher::channel(1);
        publisher.subscribe("/topic/chat/1").unwrap();
        assert!(matches!(
            publisher.subscribe("/topic/chat/2"),
            Err(RealtimeError::Stream(_))
        ));
    }

    #[test]
    fn offline_queue_keeps_subscriptions_and_drops_publishes() {
        let (mut client, channels) = RealtimeClient::new(RealtimeConfig::new("ws://localhost/ws"));
        let publisher = channels.publisher;
        publisher.subscribe("/topic/chat/1").unwrap();
        publisher.subscribe("/topic/chat/1").unwrap();
        publisher.subscribe("/topic/chat/2").unwrap();
        publisher.publish("/app/chat.send", "{}").unwrap();
        publisher.unsubscribe("/topic/chat/2").unwrap();

        assert!(client.drain_offline_queue());
        assert_eq!(client.subscriptions.len(), 1);
        assert_eq!(
            client.subscriptions.get("/topic/chat/1").map(String::as_str),
            Some("sub-0")
        );

        drop(publisher);
        assert!(!client.drain_offline_queue());
    }
}
