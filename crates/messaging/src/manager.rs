//! Messaging connection manager.
//!
//! Owns at most one live transport, authenticates it, tracks connection
//! and presence state, relays server events to consumer callbacks, and
//! reconnects with exponential backoff on unexpected disconnects.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use hotdesk_protocol::constants::MessageType;
use hotdesk_protocol::messages::{
    JoinRoomRequest, LeaveRoomRequest, SendMessageRequest, TypingRequest,
};
use hotdesk_protocol::types::{AuthenticatedUser, ChatMessage};

use crate::client::{MessagingError, SocketHandle};
use crate::reconnection::schedule_attempt;
use crate::session::Session;
use crate::transport::{Connector, WsConnector};
use crate::types::{ConnectionState, DisconnectReason, MessagingCallbacks, MessagingConfig};

/// State shared between the manager, its attempt tasks and the read pump.
pub(crate) struct Shared {
    pub(crate) config: MessagingConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) callbacks: MessagingCallbacks,
    session: Mutex<Session>,
    status_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    pub(crate) fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.session().generation == generation
    }

    /// Updates the connection state and publishes it to subscribers.
    pub(crate) fn set_state(&self, s: &mut Session, state: ConnectionState) {
        if s.state != state {
            debug!(from = %s.state, to = %state, "connection state changed");
        }
        s.state = state.clone();
        self.status_tx.send_replace(state);
    }
}

/// Real-time messaging client for one consumer.
pub struct MessagingManager {
    shared: Arc<Shared>,
}

impl MessagingManager {
    /// Creates a manager that connects over WebSocket.
    pub fn new(config: MessagingConfig, callbacks: MessagingCallbacks) -> Self {
        let connector = Arc::new(WsConnector::new(config.max_message_size));
        Self::with_connector(config, callbacks, connector)
    }

    /// Creates a manager over a custom transport.
    pub fn with_connector(
        config: MessagingConfig,
        callbacks: MessagingCallbacks,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                callbacks,
                session: Mutex::new(Session::new()),
                status_tx,
            }),
        }
    }

    /// Starts a new session with `token`, replacing any existing one.
    ///
    /// Never fails: connection problems show up as state transitions, the
    /// [`error`](Self::error) accessor and callbacks.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the connection
    /// attempt is spawned onto the current runtime.
    pub fn connect(&self, token: impl Into<String>) {
        let had_client = {
            let mut s = self.shared.session();
            let had_client = s.teardown();
            s.token = Some(token.into());
            s.attempts = 0;
            s.error = None;
            info!(url = %self.shared.config.url, "connecting");
            self.shared.set_state(&mut s, ConnectionState::Connecting);
            schedule_attempt(&self.shared, &mut s, None);
            had_client
        };
        if had_client {
            self.notify_client_disconnect();
        }
    }

    /// Tears the session down. Idempotent.
    pub fn disconnect(&self) {
        let had_client = {
            let mut s = self.shared.session();
            let had_client = s.teardown();
            s.attempts = 0;
            s.error = None;
            self.shared.set_state(&mut s, ConnectionState::Disconnected);
            had_client
        };
        if had_client {
            info!("disconnected");
            self.notify_client_disconnect();
        }
    }

    /// Resets the retry budget and connects again immediately with the
    /// last token, bypassing backoff.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime while a token is stored.
    pub fn reconnect(&self) {
        let had_client = {
            let mut s = self.shared.session();
            let had_client = s.teardown();
            s.attempts = 0;
            if s.token.is_none() {
                s.error = Some("no token to reconnect with".into());
                self.shared.set_state(&mut s, ConnectionState::Disconnected);
                return;
            }
            s.error = None;
            info!("manual reconnect");
            self.shared.set_state(&mut s, ConnectionState::Connecting);
            schedule_attempt(&self.shared, &mut s, None);
            had_client
        };
        if had_client {
            self.notify_client_disconnect();
        }
    }

    /// Joins a room. Dropped unless authenticated.
    pub async fn join_room(&self, room_id: &str) {
        let Some(handle) = self.authenticated_handle() else {
            debug!(room = room_id, "join_room while not authenticated, dropping");
            return;
        };
        let req = JoinRoomRequest {
            room_id: room_id.to_string(),
        };
        if let Err(e) = handle.emit(MessageType::JoinRoom, Some(&req)).await {
            debug!(room = room_id, error = %e, "join_room not sent");
        }
    }

    /// Leaves a room. Dropped unless authenticated.
    pub async fn leave_room(&self, room_id: &str) {
        let Some(handle) = self.authenticated_handle() else {
            debug!(room = room_id, "leave_room while not authenticated, dropping");
            return;
        };
        let req = LeaveRoomRequest {
            room_id: room_id.to_string(),
        };
        if let Err(e) = handle.emit(MessageType::LeaveRoom, Some(&req)).await {
            debug!(room = room_id, error = %e, "leave_room not sent");
        }
    }

    /// Starts or stops the typing indicator. Dropped unless authenticated.
    pub async fn send_typing(&self, room_id: &str, is_typing: bool) {
        let Some(handle) = self.authenticated_handle() else {
            return;
        };
        let req = TypingRequest {
            room_id: room_id.to_string(),
            is_typing,
        };
        if let Err(e) = handle.emit(MessageType::Typing, Some(&req)).await {
            debug!(room = room_id, error = %e, "typing not sent");
        }
    }

    /// Posts a message and waits for the server acknowledgement.
    ///
    /// Fails with [`MessagingError::Timeout`] when no acknowledgement
    /// arrives within the configured send timeout, and with
    /// [`MessagingError::Closed`] when the session ends first.
    pub async fn send_message(
        &self,
        message: &SendMessageRequest,
    ) -> Result<ChatMessage, MessagingError> {
        let handle = self
            .authenticated_handle()
            .ok_or(MessagingError::NotAuthenticated)?;
        let resp = handle
            .request(
                MessageType::SendMessage,
                Some(message),
                self.shared.config.send_timeout,
            )
            .await?;
        resp.parse_payload::<ChatMessage>()?
            .ok_or(MessagingError::EmptyResponse)
    }

    /// Current connection state.
    pub fn status(&self) -> ConnectionState {
        self.shared.session().state.clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionState> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.session().state == ConnectionState::Connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.session().is_authenticated()
    }

    pub fn current_user(&self) -> Option<AuthenticatedUser> {
        self.shared.session().user.clone()
    }

    /// Snapshot of the users currently known to be online.
    pub fn online_users(&self) -> HashSet<String> {
        self.shared.session().online.clone()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.shared.session().online.contains(user_id)
    }

    /// Last connection-level error, if any.
    pub fn error(&self) -> Option<String> {
        self.shared.session().error.clone()
    }

    /// Retries counted since the last successful authentication.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.session().attempts
    }

    /// Whether a retry timer or connection attempt is outstanding.
    pub fn has_pending_attempt(&self) -> bool {
        self.shared.session().pending_attempt.is_some()
    }

    fn authenticated_handle(&self) -> Option<SocketHandle> {
        let s = self.shared.session();
        if !s.is_authenticated() {
            return None;
        }
        s.client.as_ref().map(|c| c.handle())
    }

    fn notify_client_disconnect(&self) {
        if let Some(cb) = &self.shared.callbacks.on_disconnect {
            cb(&DisconnectReason::Client);
        }
    }
}

impl Drop for MessagingManager {
    fn drop(&mut self) {
        self.shared.session().teardown();
    }
}
