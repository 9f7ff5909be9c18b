//! Connection attempts and reconnection with exponential backoff.
//!
//! Every attempt, immediate or delayed, is a spawned task owning a
//! [`CancellationToken`] stored in the session. Teardown cancels it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hotdesk_protocol::constants::MessageType;
use hotdesk_protocol::messages::AuthenticateRequest;

use crate::client::{MessagingError, SessionHandlers, SocketClient};
use crate::dispatch;
use crate::manager::Shared;
use crate::session::Session;
use crate::types::ConnectionState;

/// Spawns a connection attempt for the current generation, after `delay`
/// or immediately. Replaces any previously pending attempt.
pub(crate) fn schedule_attempt(shared: &Arc<Shared>, s: &mut Session, delay: Option<Duration>) {
    if let Some(prev) = s.pending_attempt.take() {
        prev.cancel();
    }
    let cancel = CancellationToken::new();
    s.pending_attempt = Some(cancel.clone());
    tokio::spawn(run_attempt(shared.clone(), s.generation, delay, cancel));
}

/// Counts a failed attempt (or lost session) and schedules the next retry,
/// or enters `Failed` once the retry budget is spent.
pub(crate) fn retry_or_fail(shared: &Arc<Shared>, s: &mut Session) {
    let max_attempts = shared.config.reconnect.max_attempts;
    if s.attempts >= max_attempts {
        if let Some(token) = s.pending_attempt.take() {
            token.cancel();
        }
        warn!(attempts = s.attempts, "giving up reconnecting");
        s.error = Some(format!("failed to reconnect after {max_attempts} attempts"));
        shared.set_state(s, ConnectionState::Failed);
        return;
    }

    s.attempts += 1;
    let attempt = s.attempts;
    let delay = shared.config.reconnect.delay_for_attempt(attempt);
    info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
    shared.set_state(s, ConnectionState::Reconnecting { attempt });
    schedule_attempt(shared, s, Some(delay));
}

/// Handlers for a transport opened in `generation`.
///
/// They hold a weak reference so an open transport never keeps the
/// manager alive.
fn session_handlers(shared: &Arc<Shared>, generation: u64) -> SessionHandlers {
    let weak_event = Arc::downgrade(shared);
    let weak_loss = Arc::downgrade(shared);
    SessionHandlers {
        on_event: Box::new(move |msg| {
            if let Some(shared) = weak_event.upgrade() {
                dispatch::handle_event(&shared, generation, msg);
            }
        }),
        on_loss: Box::new(move |reason| {
            if let Some(shared) = weak_loss.upgrade() {
                dispatch::handle_loss(&shared, generation, reason);
            }
        }),
    }
}

async fn run_attempt(
    shared: Arc<Shared>,
    generation: u64,
    delay: Option<Duration>,
    cancel: CancellationToken,
) {
    if let Some(delay) = delay {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let mut s = shared.session();
        if s.generation != generation || cancel.is_cancelled() {
            return;
        }
        shared.set_state(&mut s, ConnectionState::Connecting);
    }

    let handlers = session_handlers(&shared, generation);
    let opened = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("connection attempt cancelled");
            return;
        }
        r = SocketClient::open(shared.connector.as_ref(), &shared.config, handlers) => r,
    };

    finish_attempt(&shared, generation, opened).await;
}

/// Installs a freshly opened transport and starts the handshake, or counts
/// the failure.
async fn finish_attempt(
    shared: &Arc<Shared>,
    generation: u64,
    opened: Result<SocketClient, MessagingError>,
) {
    let (handle, token) = {
        let mut s = shared.session();
        if s.generation != generation {
            // Superseded while opening; dropping the client closes it.
            debug!("discarding stale connection attempt");
            return;
        }
        s.pending_attempt = None;

        match opened {
            Ok(client) => {
                let handle = client.handle();
                s.client = Some(client);
                shared.set_state(&mut s, ConnectionState::Connected);
                (handle, s.token.clone().unwrap_or_default())
            }
            Err(e) => {
                warn!(attempt = s.attempts, error = %e, "connection attempt failed");
                s.error = Some(e.to_string());
                retry_or_fail(shared, &mut s);
                return;
            }
        }
    };

    info!(url = %shared.config.url, "transport open, authenticating");
    if let Some(cb) = &shared.callbacks.on_connect {
        cb();
    }

    let req = AuthenticateRequest { token };
    if let Err(e) = handle.emit(MessageType::Authenticate, Some(&req)).await {
        // The read pump reports the loss and drives the retry.
        warn!(error = %e, "failed to send authenticate");
    }
}
