//! Socket client for one messaging session.
//!
//! Implements fire-and-forget emits, request-response with UUID
//! correlation, ping keepalive, and push event dispatching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use hotdesk_protocol::constants::MessageType;
use hotdesk_protocol::envelope::Message;

use crate::transport::{Connector, FrameSink, FrameStream};
use crate::types::{DisconnectReason, MessagingConfig};

/// Errors from the messaging client.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("server sent an empty response")]
    EmptyResponse,
}

/// In-flight requests keyed by correlation id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Receives every inbound message that is not a correlated reply.
pub(crate) type EventHandler = Box<dyn Fn(Message) + Send + Sync>;

/// Receives the reason when the transport is lost.
pub(crate) type LossHandler = Box<dyn FnOnce(DisconnectReason) + Send>;

/// Handlers wired into the read pump for the lifetime of one transport.
pub(crate) struct SessionHandlers {
    pub(crate) on_event: EventHandler,
    pub(crate) on_loss: LossHandler,
}

pub(crate) fn lock_pending(
    pending: &PendingMap,
) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Message>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops every pending sender so each waiting request resolves to
/// [`MessagingError::Closed`].
pub(crate) fn reject_pending(pending: &PendingMap) {
    let rejected = {
        let mut map = lock_pending(pending);
        let n = map.len();
        map.clear();
        n
    };
    if rejected > 0 {
        trace!(rejected, "rejected in-flight requests");
    }
}

/// Cloneable sending side of a [`SocketClient`].
#[derive(Clone)]
pub(crate) struct SocketHandle {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
}

impl SocketHandle {
    /// Sends a message without waiting for any reply.
    pub(crate) async fn emit<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<(), MessagingError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| MessagingError::Closed)
    }

    /// Sends a request and waits up to `timeout` for the correlated reply.
    pub(crate) async fn request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
        timeout: Duration,
    ) -> Result<Message, MessagingError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id.clone(), tx);

        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            lock_pending(&self.pending).remove(&id);
            return Err(MessagingError::Closed);
        }

        let result = tokio::time::timeout(timeout, rx).await;

        // Clean up pending entry on any exit path.
        lock_pending(&self.pending).remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(MessagingError::Server {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(MessagingError::Closed),
            Err(_) => Err(MessagingError::Timeout),
        }
    }
}

/// Socket client owning one open transport and its pumps.
pub struct SocketClient {
    handle: SocketHandle,
    cancel: CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
}

impl SocketClient {
    /// Opens a transport through `connector` and starts the pumps.
    pub(crate) async fn open(
        connector: &dyn Connector,
        config: &MessagingConfig,
        handlers: SessionHandlers,
    ) -> Result<Self, MessagingError> {
        let (sink, stream) = connector.open(&config.url).await?;
        Ok(Self::start(sink, stream, config, handlers))
    }

    /// Spawns the read, write and ping pumps over an open transport.
    pub(crate) fn start(
        sink: FrameSink,
        stream: FrameStream,
        config: &MessagingConfig,
        handlers: SessionHandlers,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();
        let fault = CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            let fault = fault.clone();
            tokio::spawn(crate::pumps::write::write_pump(
                sink, write_rx, cancel, fault,
            ))
        };

        let read_handle = {
            let pump = crate::pumps::read::ReadPump {
                pending: pending.clone(),
                handlers,
                write_tx: write_tx.clone(),
                pong_wait: config.pong_wait,
                max_message_size: config.max_message_size,
                cancel: cancel.clone(),
                fault,
            };
            tokio::spawn(pump.run(stream))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(
                write_tx,
                config.ping_period,
                cancel,
            ))
        };

        Self {
            handle: SocketHandle { write_tx, pending },
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        }
    }

    /// Returns a cloneable handle for sending on this transport.
    pub(crate) fn handle(&self) -> SocketHandle {
        self.handle.clone()
    }

    /// Closes the transport and rejects every in-flight request.
    ///
    /// The loss handler is not invoked for a local close.
    pub fn close(&self) {
        self.cancel.cancel();
        reject_pending(&self.handle.pending);
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        // The write pump flushes a close frame on its own once cancelled.
        self.close();
    }
}
