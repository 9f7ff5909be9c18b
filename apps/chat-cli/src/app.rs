//! Application orchestrator: wires the messaging manager to the terminal.
//!
//! Lines read from stdin are commands:
//! - `/join <room>` and `/leave <room>` change room membership
//! - `/room <room>` selects the room plain lines are sent to
//! - `/reconnect` forces an immediate reconnect
//! - `/quit` exits
//! - anything else is sent as a text message to the current room

use std::sync::Arc;

use hotdesk_messaging::{ConnectionState, MessagingCallbacks, MessagingManager};
use hotdesk_protocol::messages::SendMessageRequest;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::{Config, TOKEN_ENV};

/// Events relayed from manager callbacks to the main loop.
#[derive(Debug)]
enum AppEvent {
    Authenticated,
}

/// A parsed stdin line.
#[derive(Debug, PartialEq)]
enum Command {
    Join(String),
    Leave(String),
    SelectRoom(String),
    Reconnect,
    Quit,
    Say(String),
    Invalid(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    let cmd = match (cmd, arg.is_empty()) {
        ("join", false) => Command::Join(arg.to_string()),
        ("leave", false) => Command::Leave(arg.to_string()),
        ("room", false) => Command::SelectRoom(arg.to_string()),
        ("reconnect", true) => Command::Reconnect,
        ("quit", true) => Command::Quit,
        _ => Command::Invalid(line.to_string()),
    };
    Some(cmd)
}

fn callbacks(events: mpsc::UnboundedSender<AppEvent>) -> MessagingCallbacks {
    MessagingCallbacks {
        on_auth_success: Some(Box::new(move |user| {
            tracing::info!(user = %user.id, name = %user.name, "signed in");
            let _ = events.send(AppEvent::Authenticated);
        })),
        on_auth_error: Some(Box::new(|reason| {
            tracing::error!(%reason, "authentication failed, check the token");
        })),
        on_message: Some(Box::new(|msg| {
            println!("[{}] {}: {}", msg.room_id, msg.sender_id, msg.content);
        })),
        on_user_status_update: Some(Box::new(|update| {
            let status = if update.is_online { "online" } else { "offline" };
            tracing::info!(user = %update.user_id, status, "presence");
        })),
        on_typing: Some(Box::new(|t| {
            tracing::debug!(room = %t.room_id, user = %t.user_id, typing = t.is_typing, "typing");
        })),
        on_connect: Some(Box::new(|| tracing::info!("connected"))),
        on_disconnect: Some(Box::new(|reason| {
            tracing::warn!(%reason, "disconnected");
        })),
    }
}

/// Runs the chat client until Ctrl-C, `/quit` or end of input.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let token = config
        .resolve_token(std::env::var(TOKEN_ENV).ok())
        .ok_or_else(|| anyhow::anyhow!("no token configured; set {TOKEN_ENV} or `token` in the config file"))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(MessagingManager::new(config.messaging(), callbacks(event_tx)));
    let mut status = manager.subscribe_status();

    manager.connect(token);

    let mut current_room = config.rooms.first().cloned();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }

            Some(event) = event_rx.recv() => match event {
                AppEvent::Authenticated => {
                    for room in &config.rooms {
                        tracing::info!(%room, "join requested");
                        manager.join_room(room).await;
                    }
                }
            },

            Ok(()) = status.changed() => {
                let state = status.borrow_and_update().clone();
                if state == ConnectionState::Failed {
                    tracing::error!(
                        error = %manager.error().unwrap_or_default(),
                        "giving up, type /reconnect to try again"
                    );
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("end of input");
                    break;
                };
                match parse_command(&line) {
                    None => {}
                    Some(Command::Quit) => break,
                    Some(Command::Reconnect) => manager.reconnect(),
                    Some(Command::Join(room)) => {
                        manager.join_room(&room).await;
                        current_room = Some(room);
                    }
                    Some(Command::Leave(room)) => {
                        manager.leave_room(&room).await;
                        if current_room.as_deref() == Some(room.as_str()) {
                            current_room = None;
                        }
                    }
                    Some(Command::SelectRoom(room)) => current_room = Some(room),
                    Some(Command::Say(text)) => {
                        let Some(room) = &current_room else {
                            tracing::warn!("no room selected, use /join <room>");
                            continue;
                        };
                        let manager = Arc::clone(&manager);
                        let request = SendMessageRequest::text(room.clone(), text);
                        tokio::spawn(async move {
                            match manager.send_message(&request).await {
                                Ok(sent) => tracing::debug!(id = %sent.id, room = %sent.room_id, "delivered"),
                                Err(e) => tracing::warn!(error = %e, "message not delivered"),
                            }
                        });
                    }
                    Some(Command::Invalid(line)) => {
                        tracing::warn!(%line, "unknown command");
                    }
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}
