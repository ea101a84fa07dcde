use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Complete relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Per-connection limits and deadlines
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Pending frames a connection may buffer before the hub evicts it
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Largest inbound message accepted (bytes)
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Idle time after which a silent peer is dropped (seconds)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Deadline for a single outbound write (seconds)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// Liveness ping interval (seconds), must be below read_timeout_secs
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    1_048_576 // 1 MiB
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_message_bytes: default_max_message_bytes(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

impl ConnectionConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// Hub command loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Commands that may queue up in front of the hub loop
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_command_buffer() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroQueueCapacity,
    ZeroCommandBuffer,
    ZeroMessageLimit,
    ZeroTimeout(&'static str),
    PingNotBelowReadTimeout { ping_secs: u64, read_secs: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroQueueCapacity => write!(f, "connection.queue_capacity must be > 0"),
            ConfigError::ZeroCommandBuffer => write!(f, "hub.command_buffer must be > 0"),
            ConfigError::ZeroMessageLimit => {
                write!(f, "connection.max_message_bytes must be > 0")
            }
            ConfigError::ZeroTimeout(field) => write!(f, "connection.{} must be > 0", field),
            ConfigError::PingNotBelowReadTimeout {
                ping_secs,
                read_secs,
            } => write!(
                f,
                "ping interval ({}s) must be shorter than read timeout ({}s)",
                ping_secs, read_secs
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RelayConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Override fields from `RELAY_*` env vars. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(addr) = env_parse("RELAY_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(n) = env_parse("RELAY_QUEUE_CAPACITY") {
            self.connection.queue_capacity = n;
        }
        if let Some(n) = env_parse("RELAY_MAX_MESSAGE_BYTES") {
            self.connection.max_message_bytes = n;
        }
        if let Some(n) = env_parse("RELAY_READ_TIMEOUT_SECS") {
            self.connection.read_timeout_secs = n;
        }
        if let Some(n) = env_parse("RELAY_WRITE_TIMEOUT_SECS") {
            self.connection.write_timeout_secs = n;
        }
        if let Some(n) = env_parse("RELAY_PING_INTERVAL_SECS") {
            self.connection.ping_interval_secs = n;
        }
        if let Some(n) = env_parse("RELAY_COMMAND_BUFFER") {
            self.hub.command_buffer = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let conn = &self.connection;
        if conn.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.hub.command_buffer == 0 {
            return Err(ConfigError::ZeroCommandBuffer);
        }
        if conn.max_message_bytes == 0 {
            return Err(ConfigError::ZeroMessageLimit);
        }
        if conn.read_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("read_timeout_secs"));
        }
        if conn.write_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("write_timeout_secs"));
        }
        if conn.ping_interval_secs == 0 {
            return Err(ConfigError::ZeroTimeout("ping_interval_secs"));
        }
        // A healthy but quiet peer must be pinged before its read deadline expires
        if conn.ping_interval_secs >= conn.read_timeout_secs {
            return Err(ConfigError::PingNotBelowReadTimeout {
                ping_secs: conn.ping_interval_secs,
                read_secs: conn.read_timeout_secs,
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<RelayConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
    let config: RelayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path))?;
    Ok(config)
}
