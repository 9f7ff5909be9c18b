//! In-memory transports for tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use hotdesk_protocol::constants::MessageType;
use hotdesk_protocol::envelope::{ErrorBody, Message};
use serde::Serialize;

use crate::client::SessionHandlers;
use crate::transport::{Connector, FrameSink, FrameStream};
use crate::types::DisconnectReason;

type Frame = Result<tungstenite::Message, tungstenite::Error>;

/// Server side of one mock transport.
pub(crate) struct MockPeer {
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<tungstenite::Message>,
}

impl MockPeer {
    /// Pushes an envelope to the client as a text frame.
    pub(crate) fn send(&self, msg: &Message) {
        let json = serde_json::to_string(msg).unwrap();
        self.send_frame(tungstenite::Message::Text(json.into()));
    }

    pub(crate) fn send_frame(&self, frame: tungstenite::Message) {
        let _ = self.to_client.send(Ok(frame));
    }

    /// Makes the client's read half fail with a transport error.
    pub(crate) fn fail(&self) {
        let _ = self
            .to_client
            .send(Err(tungstenite::Error::ConnectionClosed));
    }

    /// Next envelope written by the client, skipping control frames.
    /// `None` once the client side has shut down.
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.from_client.recv().await? {
                tungstenite::Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).unwrap());
                }
                _ => continue,
            }
        }
    }

    /// Next raw frame written by the client.
    pub(crate) async fn recv_frame(&mut self) -> Option<tungstenite::Message> {
        self.from_client.recv().await
    }
}

/// Scriptable [`Connector`] handing each opened transport to the test.
pub(crate) struct MockConnector {
    fail_remaining: AtomicU32,
    hang: AtomicBool,
    opens: AtomicU32,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            fail_remaining: AtomicU32::new(0),
            hang: AtomicBool::new(false),
            opens: AtomicU32::new(0),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    /// Makes the next `n` opens fail.
    pub(crate) fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Makes every open attempt pend forever.
    pub(crate) fn hang_opens(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of `open` calls so far.
    pub(crate) fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Waits for the next successfully opened transport.
    pub(crate) async fn next_peer(&self) -> MockPeer {
        self.peers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> Result<(FrameSink, FrameStream), tungstenite::Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(tungstenite::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel::<Frame>();
        let (client_tx, from_client) = mpsc::unbounded_channel::<tungstenite::Message>();

        let stream = futures_util::stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
        .boxed();
        let sink = futures_util::sink::unfold(
            client_tx,
            |tx, frame: tungstenite::Message| async move {
                tx.send(frame)
                    .map_err(|_| tungstenite::Error::ConnectionClosed)?;
                Ok::<_, tungstenite::Error>(tx)
            },
        );

        let _ = self.peers_tx.send(MockPeer {
            to_client,
            from_client,
        });
        Ok((Box::pin(sink), stream))
    }
}

/// Server push: no correlation id.
pub(crate) fn push<T: Serialize>(msg_type: MessageType, payload: &T) -> Message {
    Message::new(String::new(), msg_type, Some(payload)).unwrap()
}

/// Success reply correlated to `req`.
pub(crate) fn reply<T: Serialize>(
    req: &Message,
    msg_type: MessageType,
    payload: Option<&T>,
) -> Message {
    Message::new(&req.id, msg_type, payload).unwrap()
}

/// Error reply correlated to `req`.
pub(crate) fn reply_error(req: &Message, code: i32, message: &str) -> Message {
    Message {
        id: req.id.clone(),
        msg_type: MessageType::Error,
        payload: None,
        error: Some(ErrorBody {
            code,
            message: message.to_string(),
        }),
    }
}

pub(crate) type Recorded<T> = Arc<Mutex<Vec<T>>>;

/// Session handlers that record everything they receive.
pub(crate) fn collecting_handlers() -> (
    SessionHandlers,
    Recorded<Message>,
    Recorded<DisconnectReason>,
) {
    let events: Recorded<Message> = Arc::new(Mutex::new(Vec::new()));
    let losses: Recorded<DisconnectReason> = Arc::new(Mutex::new(Vec::new()));
    let ev = events.clone();
    let lo = losses.clone();
    let handlers = SessionHandlers {
        on_event: Box::new(move |msg| ev.lock().unwrap().push(msg)),
        on_loss: Box::new(move |reason| lo.lock().unwrap().push(reason)),
    };
    (handlers, events, losses)
}

/// Yields to the runtime until `cond` holds. Never advances paused time.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
