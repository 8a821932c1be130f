//! `RealtimeClient` against an in-process STOMP-over-WebSocket server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use stayhub_client::realtime::frame::{Command, Frame};
use stayhub_client::realtime::{ConnectionState, RealtimeClient, RealtimeConfig, ReconnectPolicy};

const WAIT: Duration = Duration::from_secs(5);

/// Accept connections; for each, complete the handshake, report every
/// client frame, and write pushed text to the socket as is.
async fn spawn_server(
    close_first_after_handshake: bool,
) -> (String, mpsc::UnboundedReceiver<Frame>, mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let mut connection = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            connection += 1;
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            loop {
                tokio::select! {
                    incoming = ws.next() => {
                        let Some(Ok(Message::Text(text))) = incoming else { break };
                        let Some(frame) = Frame::decode(text.as_str()).unwrap() else { continue };
                        let command = frame.command;
                        frames_tx.send(frame).unwrap();
                        if command == Command::Connect {
                            let connected = Frame::new(Command::Connected).header("version", "1.2");
                            ws.send(Message::Text(connected.encode().into())).await.unwrap();
                            if close_first_after_handshake && connection == 1 {
                                let _ = ws.close(None).await;
                                break;
                            }
                        }
                    }
                    raw = push_rx.recv() => {
                        let Some(raw) = raw else { break };
                        ws.send(Message::Text(raw.into())).await.unwrap();
                    }
                }
            }
        }
    });

    (format!("ws://{addr}/ws"), frames_rx, push_tx)
}

fn message_frame(body: &str) -> String {
    Frame::new(Command::Message)
        .header("destination", "/topic/chat/5")
        .header("subscription", "sub-0")
        .body(body)
        .encode()
}

fn config(url: String) -> RealtimeConfig {
    RealtimeConfig {
        token: Some("tok".into()),
        reconnect: ReconnectPolicy {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            multiplier: 1.0,
            max_attempts: None,
        },
        heartbeat_interval: Duration::ZERO,
        connect_timeout: Duration::from_secs(2),
        ..RealtimeConfig::new(url)
    }
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
    timeout(WAIT, frames.recv()).await.unwrap().unwrap()
}

async fn wait_for(state: &mut watch::Receiver<ConnectionState>, wanted: ConnectionState) {
    timeout(WAIT, state.wait_for(|s| *s == wanted)).await.unwrap().unwrap();
}

#[tokio::test]
async fn connects_subscribes_and_forwards_messages() {
    let (url, mut frames, push) = spawn_server(false).await;
    let (client, mut channels) = RealtimeClient::new(config(url));
    channels.publisher.subscribe("/topic/chat/5").unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(client.run(shutdown_rx));

    let connect = next_frame(&mut frames).await;
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.get("Authorization"), Some("Bearer tok"));
    assert_eq!(connect.get("accept-version"), Some("1.2"));

    let subscribe = next_frame(&mut frames).await;
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("destination"), Some("/topic/chat/5"));

    wait_for(&mut channels.state, ConnectionState::Connected).await;

    push.send(message_frame(r#"{"id":1}"#)).unwrap();
    let inbound = timeout(WAIT, channels.inbound.recv()).await.unwrap().unwrap();
    assert_eq!(inbound.destination, "/topic/chat/5");
    assert_eq!(inbound.body, r#"{"id":1}"#);

    channels.publisher.publish("/app/chat.send", r#"{"content":"hi"}"#).unwrap();
    let send = next_frame(&mut frames).await;
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.get("destination"), Some("/app/chat.send"));
    assert_eq!(send.body, r#"{"content":"hi"}"#);

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, run).await.unwrap().unwrap();
    assert_eq!(*channels.state.borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnects_and_resubscribes_after_drop() {
    let (url, mut frames, _push) = spawn_server(true).await;
    let (client, mut channels) = RealtimeClient::new(config(url));
    channels.publisher.subscribe("/topic/chat/7").unwrap();

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(client.run(shutdown_rx));

    // First session is closed by the server right after CONNECTED.
    assert_eq!(next_frame(&mut frames).await.command, Command::Connect);

    let mut connects = 1;
    loop {
        let frame = next_frame(&mut frames).await;
        match frame.command {
            Command::Connect => connects += 1,
            Command::Subscribe if connects >= 2 => {
                assert_eq!(frame.get("destination"), Some("/topic/chat/7"));
                break;
            }
            _ => {}
        }
    }
    wait_for(&mut channels.state, ConnectionState::Connected).await;
}

#[tokio::test]
async fn undecodable_frame_keeps_the_session() {
    let (url, mut frames, push) = spawn_server(false).await;
    let (client, mut channels) = RealtimeClient::new(config(url));
    channels.publisher.subscribe("/topic/chat/5").unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(client.run(shutdown_rx));
    assert_eq!(next_frame(&mut frames).await.command, Command::Connect);
    assert_eq!(next_frame(&mut frames).await.command, Command::Subscribe);
    wait_for(&mut channels.state, ConnectionState::Connected).await;

    push.send("BOGUS\n\n\0".into()).unwrap();
    push.send(message_frame(r#"{"id":2}"#)).unwrap();
    let inbound = timeout(WAIT, channels.inbound.recv()).await.unwrap().unwrap();
    assert_eq!(inbound.body, r#"{"id":2}"#);

    // Still the first session: no reconnect handshake followed.
    assert!(frames.try_recv().is_err());
    assert_eq!(*channels.state.borrow(), ConnectionState::Connected);

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, run).await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_server_keeps_retrying_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, channels) = RealtimeClient::new(config(format!("ws://{addr}/ws")));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(client.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!run.is_finished());
    assert_ne!(*channels.state.borrow(), ConnectionState::Connected);

    shutdown_tx.send(true).unwrap();
    timeout(WAIT, run).await.unwrap().unwrap();
}
