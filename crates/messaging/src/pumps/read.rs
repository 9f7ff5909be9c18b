//! Read pump: routes inbound frames to pending requests or the event handler.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hotdesk_protocol::constants::{
    DISCONNECT_PING_TIMEOUT, DISCONNECT_SERVER, DISCONNECT_TRANSPORT_CLOSE, MessageType,
};
use hotdesk_protocol::envelope::Message;
use hotdesk_protocol::messages::DisconnectNotice;

use crate::client::{PendingMap, SessionHandlers, lock_pending, reject_pending};
use crate::types::DisconnectReason;

/// State owned by the read side of one transport.
pub(crate) struct ReadPump {
    pub(crate) pending: PendingMap,
    pub(crate) handlers: SessionHandlers,
    pub(crate) write_tx: mpsc::Sender<tungstenite::Message>,
    pub(crate) pong_wait: Duration,
    pub(crate) max_message_size: usize,
    /// Local close.
    pub(crate) cancel: CancellationToken,
    /// Tripped by the write pump when the sink fails.
    pub(crate) fault: CancellationToken,
}

impl ReadPump {
    /// Reads until the transport is lost or closed locally.
    ///
    /// On exit every pending request is rejected and the other pumps are
    /// stopped. The loss handler runs only when the session ended for a
    /// reason other than a local close.
    pub(crate) async fn run<S>(self, mut read: S)
    where
        S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        // Any inbound frame resets the deadline. If nothing arrives within
        // `pong_wait` the transport is considered dead.
        let pong_deadline = tokio::time::sleep(self.pong_wait);
        tokio::pin!(pong_deadline);

        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break None,

                _ = self.fault.cancelled() => {
                    break Some(DisconnectReason::Transport("transport write failed".into()));
                }

                () = &mut pong_deadline => {
                    warn!("pong timeout, connection dead");
                    break Some(DisconnectReason::Transport(DISCONNECT_PING_TIMEOUT.into()));
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            pong_deadline.as_mut().reset(tokio::time::Instant::now() + self.pong_wait);

                            match frame {
                                tungstenite::Message::Text(text) => {
                                    if let Some(reason) = self.handle_text(text.as_str()) {
                                        break Some(reason);
                                    }
                                }
                                tungstenite::Message::Ping(data) => {
                                    trace!("received ping, sending pong");
                                    let _ = self.write_tx.send(tungstenite::Message::Pong(data)).await;
                                }
                                tungstenite::Message::Pong(_) => {
                                    trace!("received pong");
                                }
                                tungstenite::Message::Close(frame) => {
                                    let reason = frame
                                        .map(|f| f.reason.as_str().to_owned())
                                        .filter(|r| !r.is_empty())
                                        .unwrap_or_else(|| DISCONNECT_SERVER.to_owned());
                                    debug!(%reason, "received close frame");
                                    break Some(DisconnectReason::Server(reason));
                                }
                                _ => {} // Binary frames are not part of the protocol.
                            }
                        }
                        Some(Err(e)) => {
                            warn!("transport read error: {e}");
                            break Some(DisconnectReason::Transport(e.to_string()));
                        }
                        None => {
                            debug!("transport stream ended");
                            break Some(DisconnectReason::Transport(DISCONNECT_TRANSPORT_CLOSE.into()));
                        }
                    }
                }
            }
        };

        reject_pending(&self.pending);
        self.cancel.cancel();

        if let Some(reason) = reason {
            (self.handlers.on_loss)(reason);
        }
    }

    /// Handles one text frame. Returns a reason when the server ended the
    /// session.
    fn handle_text(&self, text: &str) -> Option<DisconnectReason> {
        if text.len() > self.max_message_size {
            warn!("message too large ({} bytes), dropping", text.len());
            return None;
        }

        let msg: Message = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to parse message: {e}");
                return None;
            }
        };

        trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

        if msg.msg_type == MessageType::Disconnect {
            let reason = msg
                .parse_payload::<DisconnectNotice>()
                .ok()
                .flatten()
                .map(|n| n.reason)
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DISCONNECT_SERVER.to_owned());
            return Some(DisconnectReason::Server(reason));
        }

        // Route response to pending request.
        if !msg.id.is_empty() {
            let waiter = lock_pending(&self.pending).remove(&msg.id);
            if let Some(tx) = waiter {
                let _ = tx.send(msg);
                return None;
            }
            // Late or duplicate reply: its request already resolved.
            if msg.msg_type == MessageType::MessageSent {
                debug!(id = %msg.id, "reply without a pending request, dropping");
                return None;
            }
        }

        (self.handlers.on_event)(msg);
        None
    }
}
