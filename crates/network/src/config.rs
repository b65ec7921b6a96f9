//! Network configuration
//!
//! The runtime subset of [`BridgeConfig`] the network layer needs, with
//! validation.

use protobridge_config::BridgeConfig;
use protobridge_core::{BridgeError, Result};
use protobridge_protocol::compression::{DEFAULT_LEVEL, DEFAULT_MAX_DECOMPRESSION_SIZE, DEFAULT_THRESHOLD};
use protobridge_protocol::SUPPORTED_LEGACY_PROTOCOLS;
use std::net::SocketAddr;
use std::time::Duration;

/// Network layer configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address to bind the datagram socket to
    ///
    /// # Default
    /// `0.0.0.0:19132`
    pub bind_address: SocketAddr,

    /// Largest datagram accepted from a peer
    ///
    /// # Default
    /// 1492 bytes
    ///
    /// # Notes
    /// - Datagrams are read into a buffer of this size; longer ones are truncated by the OS
    /// - Outbound payloads above it are still sent, with a warning
    pub max_mtu_size: usize,

    /// Maximum number of players admitted past login
    pub max_players: usize,

    /// Whether logins must carry a verified identity chain
    pub auth_required: bool,

    /// Deflate level (0-9)
    ///
    /// # Default
    /// 7
    pub compression_level: u32,

    /// Minimum batch size before compression is applied
    ///
    /// # Default
    /// 256 bytes
    ///
    /// # Notes
    /// - `None` disables compression; batches are still wrapped in deflate framing
    pub compression_threshold: Option<usize>,

    /// Largest batch a peer may send once inflated
    pub max_decompression_size: usize,

    /// Whether large batches are compressed on the blocking pool
    ///
    /// # Default
    /// `false` (everything is compressed on the tick thread)
    pub async_compression: bool,

    /// Smallest batch handed to the blocking pool when async compression is on
    pub async_compression_threshold: usize,

    /// Legacy protocol versions accepted at login
    pub legacy_protocols: Vec<u32>,

    /// Capacity of the bounded transport to tick channel
    ///
    /// # Notes
    /// - When full, the transport task waits, applying backpressure to the socket
    pub event_queue_capacity: usize,

    /// Length of one tick
    ///
    /// # Default
    /// 50ms (20 ticks per second)
    pub tick_interval: Duration,

    /// Silence after which the transport drops a peer
    pub session_timeout: Duration,

    /// World name sent in start game
    pub motd: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 19132)),
            max_mtu_size: 1492,
            max_players: 20,
            auth_required: false,
            compression_level: DEFAULT_LEVEL,
            compression_threshold: Some(DEFAULT_THRESHOLD),
            max_decompression_size: DEFAULT_MAX_DECOMPRESSION_SIZE,
            async_compression: false,
            async_compression_threshold: 10_000,
            legacy_protocols: SUPPORTED_LEGACY_PROTOCOLS.to_vec(),
            event_queue_capacity: 1024,
            tick_interval: Duration::from_millis(50),
            session_timeout: Duration::from_secs(10),
            motd: "Protobridge Server".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Build the network configuration from the loaded options file
    pub fn from_bridge_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            bind_address: config.bind_address()?,
            max_mtu_size: config.max_mtu_size,
            max_players: config.max_players,
            auth_required: config.xbox_auth,
            compression_level: config.compression_level,
            compression_threshold: config.compression_threshold,
            async_compression: config.async_compression,
            async_compression_threshold: config.async_compression_threshold,
            legacy_protocols: config.legacy_protocols.clone(),
            event_queue_capacity: config.event_queue_capacity,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            session_timeout: Duration::from_secs(config.session_timeout_secs),
            motd: config.motd.clone(),
            ..Self::default()
        })
    }

    /// Validate the configuration
    ///
    /// # Checks
    /// - `max_players` must be > 0
    /// - `compression_level` must be 0-9
    /// - `max_mtu_size` must be between 576 and 65535
    /// - `event_queue_capacity` and `tick_interval` must be non-zero
    /// - legacy protocols must be older than the canonical protocol
    pub fn validate(&self) -> Result<()> {
        if self.max_players == 0 {
            return Err(BridgeError::Config("max_players must be > 0".to_string()));
        }

        if self.compression_level > 9 {
            return Err(BridgeError::Config("compression_level must be 0-9".to_string()));
        }

        if !(576..=65535).contains(&self.max_mtu_size) {
            return Err(BridgeError::Config("max_mtu_size must be 576-65535".to_string()));
        }

        if self.event_queue_capacity == 0 {
            return Err(BridgeError::Config("event_queue_capacity must be > 0".to_string()));
        }

        if self.tick_interval.is_zero() {
            return Err(BridgeError::Config("tick_interval must be > 0".to_string()));
        }

        if let Some(version) = self
            .legacy_protocols
            .iter()
            .find(|version| !protobridge_protocol::is_legacy_version(**version))
        {
            return Err(BridgeError::Config(format!(
                "legacy protocol {} is not older than {}",
                version,
                protobridge_protocol::CURRENT_PROTOCOL
            )));
        }

        if self.async_compression && self.async_compression_threshold == 0 {
            tracing::warn!("async_compression_threshold is 0, every batch will be compressed off-thread");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.bind_address.port(), 19132);
        assert_eq!(config.compression_level, 7);
        assert_eq!(config.legacy_protocols, vec![527]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_bridge_config() {
        let bridge = BridgeConfig::parse("server-port=19200\nnetwork.tick-interval-ms=20\nxbox-auth=true");
        let config = NetworkConfig::from_bridge_config(&bridge).unwrap();
        assert_eq!(config.bind_address.port(), 19200);
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert!(config.auth_required);
    }

    #[test]
    fn test_invalid_compression_level() {
        let config = NetworkConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_canonical_protocol_is_not_legacy() {
        let config = NetworkConfig {
            legacy_protocols: vec![protobridge_protocol::CURRENT_PROTOCOL],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
