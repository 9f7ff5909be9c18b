//! Public types for the messaging connection manager.

use std::fmt;
use std::time::Duration;

use hotdesk_protocol::constants::{
    SEND_MESSAGE_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT,
};
use hotdesk_protocol::messages::{TypingIndicator, UserStatusUpdate};
use hotdesk_protocol::types::{AuthenticatedUser, ChatMessage};

/// Connection state of the messaging session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No transport and no pending attempt.
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open. Authenticated once the handshake completes.
    Connected,
    /// Connection lost, waiting to retry.
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted. Terminal until `reconnect()`.
    Failed,
}

impl ConnectionState {
    /// Lower-case status name, as shown to UI consumers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// `disconnect()` was called locally.
    Client,
    /// The server ended the session (disconnect event or close frame).
    Server(String),
    /// The transport failed, closed, or went silent.
    Transport(String),
}

impl DisconnectReason {
    /// Whether the manager should schedule a reconnect for this reason.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DisconnectReason::Client)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Client => f.write_str("io client disconnect"),
            DisconnectReason::Server(reason) | DisconnectReason::Transport(reason) => {
                f.write_str(reason)
            }
        }
    }
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Number of retries before giving up and entering `Failed`.
    pub max_attempts: u32,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Random spread applied to each delay, as a ratio (0.25 = ±25%).
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let with_jitter = if self.jitter > 0.0 {
            let offset = (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as f64
                / 1_000_000_000.0)
                * 2.0
                - 1.0; // [-1.0, 1.0)
            (capped + capped * self.jitter * offset).max(0.0)
        } else {
            capped
        };
        Duration::try_from_secs_f64(with_jitter).unwrap_or(self.max_delay)
    }
}

/// Messaging client configuration.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// WebSocket URL of the messaging server.
    pub url: String,
    pub reconnect: ReconnectConfig,
    /// How long `send_message` waits for the acknowledgement.
    pub send_timeout: Duration,
    pub ping_period: Duration,
    /// Silence after which the transport is considered dead.
    pub pong_wait: Duration,
    pub max_message_size: usize,
}

impl MessagingConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".into(),
            reconnect: ReconnectConfig::default(),
            send_timeout: SEND_MESSAGE_TIMEOUT,
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
            max_message_size: WS_MAX_MESSAGE_SIZE,
        }
    }
}

pub type UserCallback = Box<dyn Fn(&AuthenticatedUser) + Send + Sync>;
pub type AuthErrorCallback = Box<dyn Fn(&str) + Send + Sync>;
pub type MessageCallback = Box<dyn Fn(&ChatMessage) + Send + Sync>;
pub type StatusCallback = Box<dyn Fn(&UserStatusUpdate) + Send + Sync>;
pub type TypingCallback = Box<dyn Fn(&TypingIndicator) + Send + Sync>;
pub type ConnectCallback = Box<dyn Fn() + Send + Sync>;
pub type DisconnectCallback = Box<dyn Fn(&DisconnectReason) + Send + Sync>;

/// Consumer hooks. Each one is optional and runs in the task that handled
/// the triggering event, never while session state is locked.
#[derive(Default)]
pub struct MessagingCallbacks {
    pub on_auth_success: Option<UserCallback>,
    pub on_auth_error: Option<AuthErrorCallback>,
    pub on_message: Option<MessageCallback>,
    pub on_user_status_update: Option<StatusCallback>,
    pub on_typing: Option<TypingCallback>,
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
}

impl fmt::Debug for MessagingCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingCallbacks")
            .field("on_auth_success", &self.on_auth_success.is_some())
            .field("on_auth_error", &self.on_auth_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_user_status_update", &self.on_user_status_update.is_some())
            .field("on_typing", &self.on_typing.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}
