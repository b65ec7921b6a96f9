//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-assigned connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// World-unique actor identifier (signed on the wire)
pub type ActorUniqueId = i64;

/// Per-session actor identifier (unsigned on the wire)
pub type ActorRuntimeId = u64;

/// Game mode as known to the game-state layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    /// Network id of this game mode.
    ///
    /// Spectator is sent as creative: clients of both generations have no
    /// spectator mode of their own, spectating is expressed through abilities.
    pub fn to_protocol(self) -> i32 {
        match self {
            Self::Survival => 0,
            Self::Creative => 1,
            Self::Adventure => 2,
            Self::Spectator => 1,
        }
    }

    pub fn from_protocol(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Survival),
            1 => Some(Self::Creative),
            2 => Some(Self::Adventure),
            3 | 6 => Some(Self::Spectator),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Adventure => "adventure",
            Self::Spectator => "spectator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "#7");
    }

    #[test]
    fn test_spectator_maps_to_creative() {
        assert_eq!(GameMode::Spectator.to_protocol(), 1);
        assert_eq!(GameMode::from_protocol(2), Some(GameMode::Adventure));
        assert_eq!(GameMode::from_protocol(42), None);
    }
}
