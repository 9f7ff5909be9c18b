//! Real-time messaging client.
//!
//! Provides the connection manager, the WebSocket socket client and
//! its pumps, and reconnection with exponential backoff.

mod client;
mod dispatch;
pub mod manager;
mod pumps;
pub(crate) mod reconnection;
mod session;
#[cfg(test)]
mod test_support;
pub mod transport;
pub mod types;

pub use hotdesk_protocol;
pub use client::MessagingError;
pub use manager::MessagingManager;
pub use transport::{Connector, FrameSink, FrameStream, WsConnector};
pub use types::{ConnectionState, DisconnectReason, MessagingCallbacks, MessagingConfig, ReconnectConfig};
