//! Transport abstraction over the real-time connection.
//!
//! The socket client only needs a frame sink and a frame stream, so any
//! bidirectional channel that speaks WebSocket frames can back a session.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Sink, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

/// Outbound half of an open transport.
pub type FrameSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of an open transport.
pub type FrameStream = BoxStream<'static, Result<tungstenite::Message, tungstenite::Error>>;

/// Opens transports to the messaging server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a transport to `url`. Returning `Ok` is the transport-level
    /// "open" event.
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), tungstenite::Error>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    max_message_size: usize,
}

impl WsConnector {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), tungstenite::Error> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.max_message_size);
        ws_config.max_frame_size = Some(self.max_message_size);
        let (ws_stream, response) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        debug!(url, status = %response.status(), "websocket upgraded");

        let (write, read) = ws_stream.split();
        Ok((Box::pin(write), read.boxed()))
    }
}
