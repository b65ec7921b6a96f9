//! Negotiated protocol version of one connection
//!
//! Written once by the handshake, read by everything that sends. Reading the
//! generation before the handshake stored a version is a programming error.

use protobridge_core::{BridgeError, Result};
use protobridge_protocol::{is_legacy_version, CURRENT_PROTOCOL};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolState {
    version: Option<u32>,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the negotiated version; a second call fails with `InvalidState`
    pub fn set_version(&mut self, version: u32) -> Result<()> {
        if let Some(current) = self.version {
            return Err(BridgeError::InvalidState(format!(
                "Protocol version already set to {} (attempted {})",
                current, version
            )));
        }
        self.version = Some(version);
        Ok(())
    }

    pub fn is_negotiated(&self) -> bool {
        self.version.is_some()
    }

    pub fn version(&self) -> Result<u32> {
        self.version
            .ok_or_else(|| BridgeError::InvalidState("Protocol version queried before handshake".into()))
    }

    /// Whether the peer speaks a protocol older than the canonical one
    ///
    /// # Panics
    /// If called before [`set_version`](Self::set_version).
    pub fn is_legacy(&self) -> bool {
        match self.version {
            Some(version) => is_legacy_version(version),
            None => panic!("is_legacy queried before the protocol version was negotiated"),
        }
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            Some(version) if version == CURRENT_PROTOCOL => write!(f, "{} (canonical)", version),
            Some(version) => write!(f, "{} (legacy)", version),
            None => write!(f, "unnegotiated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobridge_protocol::LEGACY_PROTOCOL;

    #[test]
    fn test_set_once() {
        let mut state = ProtocolState::new();
        assert!(state.version().is_err());
        state.set_version(LEGACY_PROTOCOL).unwrap();
        assert!(state.is_legacy());
        assert!(matches!(state.set_version(CURRENT_PROTOCOL), Err(BridgeError::InvalidState(_))));
        assert_eq!(state.version().unwrap(), LEGACY_PROTOCOL);
    }

    #[test]
    fn test_canonical_is_not_legacy() {
        let mut state = ProtocolState::new();
        state.set_version(CURRENT_PROTOCOL).unwrap();
        assert!(!state.is_legacy());
        assert_eq!(state.to_string(), "534 (canonical)");
    }

    #[test]
    #[should_panic(expected = "before the protocol version was negotiated")]
    fn test_query_before_handshake_panics() {
        ProtocolState::new().is_legacy();
    }
}
