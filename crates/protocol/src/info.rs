//! # Protocol Versions and Packet Ids
//!
//! The bridge speaks exactly two schema generations:
//!
//! - **Canonical** ([`CURRENT_PROTOCOL`]): the layout the server core produces.
//! - **Legacy** ([`LEGACY_PROTOCOL`]): the previous generation, which some clients
//!   still speak. Any accepted version strictly below canonical is served the
//!   legacy layout.
//!
//! ## Packet Header
//!
//! Every packet inside a batch starts with an unsigned varint header. The low 10
//! bits hold the packet id; bits 10-11 and 12-13 hold sender and recipient
//! sub-client ids, which the bridge always writes as zero.

/// Protocol version the server core is built for
pub const CURRENT_PROTOCOL: u32 = 534;

/// Game version string of the canonical protocol
pub const MINECRAFT_VERSION_NETWORK: &str = "1.19.10";

/// The older schema generation served through translation
pub const LEGACY_PROTOCOL: u32 = 527;

/// Game version string of the legacy protocol
pub const LEGACY_VERSION_NETWORK: &str = "1.19.0";

/// Legacy protocol versions accepted by default
pub const SUPPORTED_LEGACY_PROTOCOLS: &[u32] = &[LEGACY_PROTOCOL];

/// Mask of the packet id inside a packet header
pub const PACKET_ID_MASK: u32 = 0x3ff;

/// Packet kinds the bridge knows how to encode or decode
///
/// Kinds that are not listed here travel as [`crate::RawPacket`] and are never
/// translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PacketKind {
    // ========================================================================
    // SESSION
    // ========================================================================

    /// Client login: protocol version + connection request (serverbound)
    Login = 0x01,

    /// Login/spawn status (clientbound)
    PlayStatus = 0x02,

    /// Disconnect with optional message (clientbound)
    Disconnect = 0x05,

    // ========================================================================
    // SPAWNING
    // ========================================================================

    /// Session bootstrap: player, level settings, palettes (clientbound)
    ///
    /// Layout differs between generations (level settings).
    StartGame = 0x0b,

    /// Spawn another player (clientbound)
    ///
    /// Layout differs between generations (abilities vs adventure settings).
    AddPlayer = 0x0c,

    /// Spawn a non-player actor (clientbound)
    ///
    /// Layout differs between generations (body yaw).
    AddActor = 0x0d,

    // ========================================================================
    // ACTOR STATE
    // ========================================================================

    /// Attribute values of an actor (clientbound)
    UpdateAttributes = 0x1d,

    /// Metadata of an actor (clientbound)
    SetActorData = 0x27,

    // ========================================================================
    // ABILITIES
    // ========================================================================

    /// Legacy abilities and permissions (both directions, legacy only)
    AdventureSettings = 0x37,

    /// Game mode of the receiving player (clientbound)
    SetPlayerGameType = 0x3e,

    /// Requested view distance (serverbound)
    RequestChunkRadius = 0x45,

    /// Accepted view distance (clientbound)
    ChunkRadiusUpdated = 0x46,

    /// Client asks to change a single ability, e.g. toggle flying (serverbound)
    RequestAbility = 0xb8,

    /// Abilities and permissions of a player (clientbound, canonical only)
    UpdateAbilities = 0xbb,

    /// World-level adventure settings (clientbound, canonical only)
    UpdateAdventureSettings = 0xbc,
}

impl PacketKind {
    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0x01 => Some(Self::Login),
            0x02 => Some(Self::PlayStatus),
            0x05 => Some(Self::Disconnect),
            0x0b => Some(Self::StartGame),
            0x0c => Some(Self::AddPlayer),
            0x0d => Some(Self::AddActor),
            0x1d => Some(Self::UpdateAttributes),
            0x27 => Some(Self::SetActorData),
            0x37 => Some(Self::AdventureSettings),
            0x3e => Some(Self::SetPlayerGameType),
            0x45 => Some(Self::RequestChunkRadius),
            0x46 => Some(Self::ChunkRadiusUpdated),
            0xb8 => Some(Self::RequestAbility),
            0xbb => Some(Self::UpdateAbilities),
            0xbc => Some(Self::UpdateAdventureSettings),
            _ => None,
        }
    }
}

/// Whether a protocol version is served with the legacy layout
#[inline]
pub fn is_legacy_version(version: u32) -> bool {
    version < CURRENT_PROTOCOL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_kind_ids_round_trip() {
        for kind in [
            PacketKind::Login,
            PacketKind::StartGame,
            PacketKind::AddPlayer,
            PacketKind::AddActor,
            PacketKind::AdventureSettings,
            PacketKind::UpdateAbilities,
        ] {
            assert_eq!(PacketKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(PacketKind::from_id(0x3ff), None);
    }

    #[test]
    fn test_legacy_threshold_is_strict() {
        assert!(is_legacy_version(LEGACY_PROTOCOL));
        assert!(!is_legacy_version(CURRENT_PROTOCOL));
    }
}
