//! Inbound event dispatch.
//!
//! Applies each server event to the session, then invokes the matching
//! consumer callback with the session lock released.

use std::sync::Arc;

use tracing::{info, trace, warn};

use hotdesk_protocol::constants::MessageType;
use hotdesk_protocol::envelope::Message;
use hotdesk_protocol::messages::{AuthErrorResponse, TypingIndicator, UserStatusUpdate};
use hotdesk_protocol::types::{AuthenticatedUser, ChatMessage};

use crate::manager::Shared;
use crate::reconnection::retry_or_fail;
use crate::types::{ConnectionState, DisconnectReason};

/// Fallback when the server rejects the token without a reason.
const AUTH_FAILED: &str = "authentication failed";

/// Parses a payload, logging and discarding malformed or missing ones.
fn payload<T: for<'de> serde::Deserialize<'de>>(msg: &Message) -> Option<T> {
    match msg.parse_payload::<T>() {
        Ok(Some(p)) => Some(p),
        Ok(None) => {
            warn!(msg_type = ?msg.msg_type, "event without payload, dropping");
            None
        }
        Err(e) => {
            warn!(msg_type = ?msg.msg_type, error = %e, "malformed event payload, dropping");
            None
        }
    }
}

/// Handles one inbound event from the transport opened in `generation`.
pub(crate) fn handle_event(shared: &Arc<Shared>, generation: u64, msg: Message) {
    match msg.msg_type {
        MessageType::Authenticated => {
            let Some(user) = payload::<AuthenticatedUser>(&msg) else {
                return;
            };
            {
                let mut s = shared.session();
                if s.generation != generation {
                    return;
                }
                if s.state != ConnectionState::Connected {
                    warn!(state = %s.state, "authenticated outside an open session, ignoring");
                    return;
                }
                s.user = Some(user.clone());
                s.attempts = 0;
                s.error = None;
            }
            info!(user = %user.id, "authenticated");
            if let Some(cb) = &shared.callbacks.on_auth_success {
                cb(&user);
            }
        }

        MessageType::AuthError => {
            let reason = msg
                .parse_payload::<AuthErrorResponse>()
                .ok()
                .flatten()
                .map(|r| r.message)
                .filter(|r| !r.is_empty())
                .or_else(|| msg.error.as_ref().map(|e| e.message.clone()))
                .unwrap_or_else(|| AUTH_FAILED.to_owned());
            {
                let mut s = shared.session();
                if s.generation != generation {
                    return;
                }
                // Not retryable: a new token is needed.
                s.teardown();
                s.error = Some(reason.clone());
                shared.set_state(&mut s, ConnectionState::Disconnected);
            }
            warn!(%reason, "authentication rejected");
            if let Some(cb) = &shared.callbacks.on_auth_error {
                cb(&reason);
            }
        }

        MessageType::NewMessage => {
            let Some(message) = payload::<ChatMessage>(&msg) else {
                return;
            };
            if !shared.is_current(generation) {
                return;
            }
            trace!(room = %message.room_id, id = %message.id, "new message");
            if let Some(cb) = &shared.callbacks.on_message {
                cb(&message);
            }
        }

        MessageType::UserStatusUpdate => {
            let Some(update) = payload::<UserStatusUpdate>(&msg) else {
                return;
            };
            {
                let mut s = shared.session();
                if s.generation != generation {
                    return;
                }
                s.apply_presence(&update);
            }
            if let Some(cb) = &shared.callbacks.on_user_status_update {
                cb(&update);
            }
        }

        MessageType::UserTyping => {
            let Some(indicator) = payload::<TypingIndicator>(&msg) else {
                return;
            };
            if !shared.is_current(generation) {
                return;
            }
            if let Some(cb) = &shared.callbacks.on_typing {
                cb(&indicator);
            }
        }

        MessageType::Error => {
            let message = msg
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown server error".to_owned());
            let mut s = shared.session();
            if s.generation != generation {
                return;
            }
            warn!(error = %message, "server reported an error");
            s.error = Some(message);
        }

        other => {
            trace!(msg_type = ?other, "ignoring event");
        }
    }
}

/// Handles loss of the transport opened in `generation`.
pub(crate) fn handle_loss(shared: &Arc<Shared>, generation: u64, reason: DisconnectReason) {
    {
        let mut s = shared.session();
        if s.generation != generation {
            return;
        }
        warn!(%reason, "connection lost");
        s.teardown();
        s.error = Some(reason.to_string());
        if reason.is_retryable() {
            retry_or_fail(shared, &mut s);
        } else {
            shared.set_state(&mut s, ConnectionState::Disconnected);
        }
    }
    if let Some(cb) = &shared.callbacks.on_disconnect {
        cb(&reason);
    }
}
