//! # Legacy Packets
//!
//! Packets in the layout of the previous protocol generation, for the kinds whose
//! layout differs from the canonical one. Everything else is shared and uses the
//! canonical structures in [`crate::packets`].

pub mod actor;
pub mod adventure;
pub mod start_game;

pub use actor::{LegacyAddActorPacket, LegacyAddPlayerPacket};
pub use adventure::AdventureSettingsPacket;
pub use start_game::{LegacyLevelSettings, LegacyStartGamePacket};

use crate::context::SerializerContext;
use crate::info::PacketKind;
use crate::packets::{ensure_consumed, read_packet_header, write_packet_header};
use bytes::{Bytes, BytesMut};
use protobridge_core::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyPacket {
    AddActor(Box<LegacyAddActorPacket>),
    AddPlayer(Box<LegacyAddPlayerPacket>),
    AdventureSettings(AdventureSettingsPacket),
    StartGame(Box<LegacyStartGamePacket>),
}

impl LegacyPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::AddActor(_) => PacketKind::AddActor,
            Self::AddPlayer(_) => PacketKind::AddPlayer,
            Self::AdventureSettings(_) => PacketKind::AdventureSettings,
            Self::StartGame(_) => PacketKind::StartGame,
        }
    }

    /// Write header and body in the legacy layout
    pub fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        write_packet_header(buf, self.kind().id());
        match self {
            Self::AddActor(p) => p.write(buf),
            Self::AddPlayer(p) => p.write(buf, context)?,
            Self::AdventureSettings(p) => p.write(buf),
            Self::StartGame(p) => p.write_body(buf),
        }
        Ok(())
    }

    /// Decode one packet (header and body) in the legacy layout
    pub fn decode(mut buf: Bytes, context: &SerializerContext) -> Result<Self> {
        let id = read_packet_header(&mut buf)?;
        let packet = match PacketKind::from_id(id) {
            Some(PacketKind::AddActor) => Self::AddActor(Box::new(LegacyAddActorPacket::read(&mut buf)?)),
            Some(PacketKind::AddPlayer) => Self::AddPlayer(Box::new(LegacyAddPlayerPacket::read(&mut buf, context)?)),
            Some(PacketKind::AdventureSettings) => Self::AdventureSettings(AdventureSettingsPacket::read(&mut buf)?),
            Some(PacketKind::StartGame) => Self::StartGame(Box::new(LegacyStartGamePacket::read_body(&mut buf)?)),
            _ => {
                return Err(BridgeError::Protocol(format!(
                    "Packet 0x{:02x} has no legacy-specific layout",
                    id
                )))
            }
        };
        ensure_consumed(&buf, id)?;
        Ok(packet)
    }
}
