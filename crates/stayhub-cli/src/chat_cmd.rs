//! Chat subcommands: list, history, and a live session on one chat.

use std::io::{self, Write};

use anyhow::bail;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use stayhub_client::chat::{ChatConfig, ChatHandle, ChatSync, ChatSyncTask};
use stayhub_client::{ApiClient, RealtimeClient, RealtimeConfig};
use stayhub_core::models::{Chat, ChatMessage, User};

use crate::context::CliContext;
use crate::fmt;

/// Chat subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum ChatAction {
    /// List chats with their unread counts.
    List,
    /// Print a chat's message history.
    History { chat_id: i64 },
    /// Follow a chat live. Lines typed are sent; `/resend <id>` retries a
    /// failed message and `/quit` leaves.
    Open { chat_id: i64 },
}

/// A line typed during a live session.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Send(&'a str),
    Resend(&'a str),
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Send(line);
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));
    match name {
        "quit" | "q" => Input::Quit,
        "resend" if !arg.is_empty() => Input::Resend(arg),
        // "//text" sends "/text"
        _ if command.starts_with('/') => Input::Send(command),
        _ => Input::Unknown(name),
    }
}

/// Execute a chat subcommand.
pub async fn run(action: ChatAction, ctx: &mut CliContext) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let api = ctx.api()?;
    match action {
        ChatAction::List => {
            let chats = ctx.check(api.chats(user.id, user.role_type).await)?;
            let mut out = io::stdout();
            if chats.is_empty() {
                writeln!(out, "No chats")?;
            }
            for chat in &chats {
                fmt::write_chat_row(&mut out, chat, user.id)?;
            }
            Ok(())
        }
        ChatAction::History { chat_id } => {
            let messages = ctx.check(api.messages(chat_id).await)?;
            let mut out = io::stdout();
            for message in &messages {
                fmt::write_message(&mut out, message, user.id)?;
            }
            Ok(())
        }
        ChatAction::Open { chat_id } => open(ctx, api, &user, chat_id).await,
    }
}

async fn open(ctx: &mut CliContext, api: ApiClient, user: &User, chat_id: i64) -> anyhow::Result<()> {
    let chats = ctx.check(api.chats(user.id, user.role_type).await)?;
    if !chats.iter().any(|c| c.id == chat_id) {
        bail!("Chat #{chat_id} not found");
    }
    let history = ctx.check(api.messages(chat_id).await)?;

    let realtime = RealtimeConfig::from_settings(&ctx.config.api, &ctx.config.chat, user.token.clone());
    let (client, channels) = RealtimeClient::new(realtime);
    let sync = ChatSync::new(
        user.id,
        ChatConfig::from_settings(&ctx.config.chat),
        channels.publisher.clone(),
    );
    let (task, handle) = ChatSyncTask::new(sync, channels.inbound, channels.state);
    let task = task.with_api(api);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let client_task = tokio::spawn(client.run(shutdown_rx.clone()));
    let sync_task = tokio::spawn(task.run(shutdown_rx));

    let result = session_loop(&handle, chats, history, chat_id, user.id).await;

    if let Err(e) = handle.close().await {
        debug!(error = %e, "Chat task already stopped");
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = sync_task.await {
        warn!(error = %e, "Chat task panicked");
    }
    if let Err(e) = client_task.await {
        warn!(error = %e, "Real-time client panicked");
    }
    result
}

async fn session_loop(
    handle: &ChatHandle,
    chats: Vec<Chat>,
    history: Vec<ChatMessage>,
    chat_id: i64,
    user_id: i64,
) -> anyhow::Result<()> {
    let mut events = handle.subscribe();
    handle.load_chats(chats).await?;
    handle.load_history(chat_id, history).await?;
    handle.open(chat_id).await?;

    let mut out = io::stdout();
    let snapshot = handle.snapshot(chat_id).await?;
    writeln!(out, "-- chat #{chat_id} (type /quit to leave) --")?;
    for local in &snapshot.messages {
        fmt::write_local_message(&mut out, local, user_id)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let outcome = match parse_input(&line) {
                    Input::Quit => break,
                    Input::Empty => continue,
                    Input::Send(text) => handle.send(chat_id, text).await,
                    Input::Resend(correlation_id) => handle.resend(correlation_id).await,
                    Input::Unknown(name) => {
                        writeln!(io::stderr(), "Unknown command /{name}")?;
                        continue;
                    }
                };
                if let Err(e) = outcome {
                    writeln!(io::stderr(), "Not sent: {e}")?;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    fmt::write_event(&mut out, &event, chat_id, user_id)?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed chat events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
