//! Chat client configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/hotdesk/chat.toml`
//! - Windows: `%APPDATA%/hotdesk/chat.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use hotdesk_messaging::{MessagingConfig, ReconnectConfig};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the stored token.
pub const TOKEN_ENV: &str = "HOTDESK_TOKEN";

/// Chat client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the messaging server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Authentication token. Empty means "take it from the environment".
    #[serde(default)]
    pub token: String,

    /// Rooms joined after every successful authentication.
    #[serde(default)]
    pub rooms: Vec<String>,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Seconds to wait for a `send_message` acknowledgement.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

fn default_server_url() -> String {
    MessagingConfig::default().url
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_send_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            token: String::new(),
            rooms: Vec::new(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Token to authenticate with: the environment wins over the file.
    pub fn resolve_token(&self, env_token: Option<String>) -> Option<String> {
        env_token
            .filter(|t| !t.is_empty())
            .or_else(|| Some(self.token.clone()).filter(|t| !t.is_empty()))
    }

    /// Builds the library configuration.
    pub fn messaging(&self) -> MessagingConfig {
        MessagingConfig {
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
                max_attempts: self.max_reconnect_attempts,
                max_delay: Duration::from_millis(self.max_reconnect_delay_ms),
                ..ReconnectConfig::default()
            },
            send_timeout: Duration::from_secs(self.send_timeout_secs),
            ..MessagingConfig::new(self.server_url.clone())
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("hotdesk").join("chat.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("hotdesk")
            .join("chat.toml"))
    }
}
