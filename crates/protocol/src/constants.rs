use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time allowed to flush the close frame when a connection shuts down.
pub const WS_WRITE_WAIT: Duration = Duration::from_secs(5);

/// Time to wait for any incoming frame before the connection is
/// considered dead.
///
/// Every inbound frame (pong, push event, reply) resets the deadline, so
/// this only has to exceed [`WS_PING_PERIOD`] by a comfortable margin.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send transport pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(25);

/// Maximum message size in bytes (1 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Time a `send_message` request waits for the server acknowledgement.
pub const SEND_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Disconnect reason reported when the server kicks the client.
pub const DISCONNECT_SERVER: &str = "io server disconnect";

/// Disconnect reason reported when the transport closes without a reason.
pub const DISCONNECT_TRANSPORT_CLOSE: &str = "transport close";

/// Disconnect reason reported when the keepalive deadline expires.
pub const DISCONNECT_PING_TIMEOUT: &str = "ping timeout";

/// Real-time event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Handshake
    #[serde(rename = "authenticate")]
    Authenticate,
    #[serde(rename = "authenticated")]
    Authenticated,
    #[serde(rename = "auth_error")]
    AuthError,

    // Requests from client to server
    #[serde(rename = "join_room")]
    JoinRoom,
    #[serde(rename = "leave_room")]
    LeaveRoom,
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "send_message")]
    SendMessage,

    // Responses from server to client
    #[serde(rename = "message_sent")]
    MessageSent,
    #[serde(rename = "error")]
    Error,

    // Events from server to client (push notifications)
    #[serde(rename = "new_message")]
    NewMessage,
    #[serde(rename = "user_status_update")]
    UserStatusUpdate,
    #[serde(rename = "user_typing")]
    UserTyping,
    #[serde(rename = "disconnect")]
    Disconnect,

    /// Forward compatibility: unknown event types deserialize here.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_serialization() {
        assert_eq!(
            serde_json::to_string(&MessageType::Authenticate).unwrap(),
            "\"authenticate\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::UserStatusUpdate).unwrap(),
            "\"user_status_update\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::MessageSent).unwrap(),
            "\"message_sent\""
        );
    }

    #[test]
    fn message_type_deserialization() {
        let mt: MessageType = serde_json::from_str("\"user_typing\"").unwrap();
        assert_eq!(mt, MessageType::UserTyping);
    }

    #[test]
    fn unknown_message_type() {
        let mt: MessageType = serde_json::from_str("\"seat_booked\"").unwrap();
        assert_eq!(mt, MessageType::Unknown);
    }

    #[test]
    fn send_timeout_is_ten_seconds() {
        assert_eq!(SEND_MESSAGE_TIMEOUT, Duration::from_secs(10));
        assert!(WS_PING_PERIOD < WS_PONG_WAIT);
    }
}
