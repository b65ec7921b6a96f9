//! Protobridge Configuration Management
//!
//! Loads the bridge options from `bridge.properties`, a `key=value` file with
//! `#` comments. Unknown keys are ignored; values that fail to parse keep
//! their defaults and are reported with a warning.

use protobridge_core::BridgeError;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

/// Default options file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "bridge.properties";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    // ========== Server ==========
    /// Bind IP (from "server-ip", default: 0.0.0.0)
    pub server_ip: String,
    /// Bind port (from "server-port", default: 19132)
    pub server_port: u16,
    /// Maximum players (from "max-players")
    pub max_players: usize,
    /// Message of the day, used as the world name (from "motd")
    pub motd: String,
    /// Require authenticated logins (from "xbox-auth")
    pub xbox_auth: bool,

    // ========== Network ==========
    /// Largest datagram accepted (from "network.max-mtu-size")
    pub max_mtu_size: usize,
    /// Deflate level 0-9 (from "network.compression-level")
    pub compression_level: u32,
    /// Smallest batch worth compressing, negative disables (from "network.batch-threshold")
    pub compression_threshold: Option<usize>,
    /// Compress large batches on worker threads (from "network.async-compression")
    pub async_compression: bool,
    /// Smallest batch sent to a worker thread (from "network.async-compression-threshold")
    pub async_compression_threshold: usize,
    /// Legacy protocol versions accepted at login (from "network.legacy-protocols", comma separated)
    pub legacy_protocols: Vec<u32>,
    /// Capacity of the transport to tick event queue (from "network.event-queue-capacity")
    pub event_queue_capacity: usize,
    /// Tick length in milliseconds (from "network.tick-interval-ms")
    pub tick_interval_ms: u64,
    /// Seconds of silence before a peer is dropped (from "network.session-timeout")
    pub session_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_ip: "0.0.0.0".to_string(),
            server_port: 19132,
            max_players: 20,
            motd: "Protobridge Server".to_string(),
            xbox_auth: false,

            max_mtu_size: 1492,
            compression_level: 7,
            compression_threshold: Some(256),
            async_compression: false,
            async_compression_threshold: 10_000,
            legacy_protocols: vec![527],
            event_queue_capacity: 1024,
            tick_interval_ms: 50,
            session_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from an options file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("{} not found, using default configuration", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Parse options file content
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = config.parse_option(key.trim(), value.trim()) {
                    tracing::warn!("{}, keeping default", e);
                }
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "server-ip" => self.server_ip = value.to_string(),
            "server-port" => self.server_port = parse_value(key, value)?,
            "max-players" => self.max_players = parse_value(key, value)?,
            "motd" => self.motd = value.to_string(),
            "xbox-auth" => self.xbox_auth = parse_bool(key, value)?,
            "network.max-mtu-size" => self.max_mtu_size = parse_value(key, value)?,
            "network.compression-level" => self.compression_level = parse_value(key, value)?,
            "network.batch-threshold" => {
                let threshold: i64 = parse_value(key, value)?;
                self.compression_threshold = usize::try_from(threshold).ok();
            }
            "network.async-compression" => self.async_compression = parse_bool(key, value)?,
            "network.async-compression-threshold" => self.async_compression_threshold = parse_value(key, value)?,
            "network.legacy-protocols" => {
                self.legacy_protocols = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_value(key, s))
                    .collect::<Result<Vec<u32>, _>>()?;
            }
            "network.event-queue-capacity" => self.event_queue_capacity = parse_value(key, value)?,
            "network.tick-interval-ms" => self.tick_interval_ms = parse_value(key, value)?,
            "network.session-timeout" => self.session_timeout_secs = parse_value(key, value)?,
            _ => tracing::debug!("Ignoring unknown option {}", key),
        }
        Ok(())
    }

    /// Socket address the transport binds to
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.server_ip, self.server_port);
        address.parse().map_err(|_| ConfigError::InvalidAddress(address))
    }

    /// Log a configuration summary
    pub fn display(&self) {
        tracing::info!("Bridge configuration:");
        tracing::info!("  Bind: {}:{}", self.server_ip, self.server_port);
        tracing::info!("  Max players: {}", self.max_players);
        tracing::info!("  Authentication required: {}", self.xbox_auth);
        tracing::info!("  Max MTU: {}", self.max_mtu_size);
        match self.compression_threshold {
            Some(threshold) => tracing::info!(
                "  Compression: level {}, threshold {} bytes",
                self.compression_level,
                threshold
            ),
            None => tracing::info!("  Compression: disabled"),
        }
        tracing::info!(
            "  Async compression: {} (threshold {} bytes)",
            self.async_compression,
            self.async_compression_threshold
        );
        tracing::info!("  Legacy protocols: {:?}", self.legacy_protocols);
        tracing::info!("  Tick: {} ms", self.tick_interval_ms);
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
