//! # Canonical Packets
//!
//! Structured packets in the layout of the canonical protocol. Game-state code
//! produces [`ClientboundPacket`]s; the network layer decodes inbound bytes into
//! [`ServerboundPacket`]s.
//!
//! Kinds the bridge has no structure for travel as [`RawPacket`]: an id plus an
//! opaque body. Raw packets are never translated, so a raw body must already be
//! valid for every protocol generation it is sent to.

pub mod abilities;
pub mod actor;
pub mod session;
pub mod start_game;

pub use abilities::*;
pub use actor::*;
pub use session::*;
pub use start_game::*;

use crate::codecs::*;
use crate::context::SerializerContext;
use crate::info::{PacketKind, PACKET_ID_MASK};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use protobridge_core::{BridgeError, Result};

/// A packet with a fixed id and one body layout
pub trait DataPacket: Sized {
    const KIND: PacketKind;

    /// Write the body (without header)
    fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()>;

    /// Read the body (header already consumed)
    fn decode<B: Buf>(buf: &mut B, context: &SerializerContext) -> Result<Self>;
}

/// Write a packet header: id in the low 10 bits, sub-client ids zero
#[inline]
pub fn write_packet_header(buf: &mut BytesMut, id: u32) {
    write_uvarint(buf, id & PACKET_ID_MASK);
}

#[inline]
pub fn read_packet_header<B: Buf>(buf: &mut B) -> Result<u32> {
    Ok(read_uvarint(buf)? & PACKET_ID_MASK)
}

/// Packet with an opaque body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: u32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(id: u32, body: impl Into<Bytes>) -> Self {
        Self { id, body: body.into() }
    }
}

/// Canonical server-to-client packets
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPacket {
    PlayStatus(PlayStatusPacket),
    Disconnect(DisconnectPacket),
    StartGame(Box<StartGamePacket>),
    AddPlayer(Box<AddPlayerPacket>),
    AddActor(Box<AddActorPacket>),
    UpdateAttributes(UpdateAttributesPacket),
    SetActorData(SetActorDataPacket),
    SetPlayerGameType(SetPlayerGameTypePacket),
    ChunkRadiusUpdated(ChunkRadiusUpdatedPacket),
    UpdateAbilities(UpdateAbilitiesPacket),
    UpdateAdventureSettings(UpdateAdventureSettingsPacket),
    Raw(RawPacket),
}

impl ClientboundPacket {
    /// Structured kind, `None` for raw packets
    pub fn kind(&self) -> Option<PacketKind> {
        Some(match self {
            Self::PlayStatus(_) => PlayStatusPacket::KIND,
            Self::Disconnect(_) => DisconnectPacket::KIND,
            Self::StartGame(_) => StartGamePacket::KIND,
            Self::AddPlayer(_) => AddPlayerPacket::KIND,
            Self::AddActor(_) => AddActorPacket::KIND,
            Self::UpdateAttributes(_) => UpdateAttributesPacket::KIND,
            Self::SetActorData(_) => SetActorDataPacket::KIND,
            Self::SetPlayerGameType(_) => SetPlayerGameTypePacket::KIND,
            Self::ChunkRadiusUpdated(_) => ChunkRadiusUpdatedPacket::KIND,
            Self::UpdateAbilities(_) => UpdateAbilitiesPacket::KIND,
            Self::UpdateAdventureSettings(_) => UpdateAdventureSettingsPacket::KIND,
            Self::Raw(_) => return None,
        })
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::Raw(raw) => raw.id,
            other => other.kind().map(PacketKind::id).unwrap_or_default(),
        }
    }

    /// Write header and body
    pub fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        write_packet_header(buf, self.id());
        match self {
            Self::PlayStatus(p) => p.encode(buf, context),
            Self::Disconnect(p) => p.encode(buf, context),
            Self::StartGame(p) => p.encode(buf, context),
            Self::AddPlayer(p) => p.encode(buf, context),
            Self::AddActor(p) => p.encode(buf, context),
            Self::UpdateAttributes(p) => p.encode(buf, context),
            Self::SetActorData(p) => p.encode(buf, context),
            Self::SetPlayerGameType(p) => p.encode(buf, context),
            Self::ChunkRadiusUpdated(p) => p.encode(buf, context),
            Self::UpdateAbilities(p) => p.encode(buf, context),
            Self::UpdateAdventureSettings(p) => p.encode(buf, context),
            Self::Raw(raw) => {
                buf.put_slice(&raw.body);
                Ok(())
            }
        }
    }

    /// Decode one packet (header and body) in the canonical layout
    ///
    /// Unknown ids decode as raw packets. The whole buffer must be consumed.
    pub fn decode(mut buf: Bytes, context: &SerializerContext) -> Result<Self> {
        let id = read_packet_header(&mut buf)?;
        let packet = match PacketKind::from_id(id) {
            Some(PacketKind::PlayStatus) => Self::PlayStatus(PlayStatusPacket::decode(&mut buf, context)?),
            Some(PacketKind::Disconnect) => Self::Disconnect(DisconnectPacket::decode(&mut buf, context)?),
            Some(PacketKind::StartGame) => Self::StartGame(Box::new(StartGamePacket::decode(&mut buf, context)?)),
            Some(PacketKind::AddPlayer) => Self::AddPlayer(Box::new(AddPlayerPacket::decode(&mut buf, context)?)),
            Some(PacketKind::AddActor) => Self::AddActor(Box::new(AddActorPacket::decode(&mut buf, context)?)),
            Some(PacketKind::UpdateAttributes) => {
                Self::UpdateAttributes(UpdateAttributesPacket::decode(&mut buf, context)?)
            }
            Some(PacketKind::SetActorData) => Self::SetActorData(SetActorDataPacket::decode(&mut buf, context)?),
            Some(PacketKind::SetPlayerGameType) => {
                Self::SetPlayerGameType(SetPlayerGameTypePacket::decode(&mut buf, context)?)
            }
            Some(PacketKind::ChunkRadiusUpdated) => {
                Self::ChunkRadiusUpdated(ChunkRadiusUpdatedPacket::decode(&mut buf, context)?)
            }
            Some(PacketKind::UpdateAbilities) => {
                Self::UpdateAbilities(UpdateAbilitiesPacket::decode(&mut buf, context)?)
            }
            Some(PacketKind::UpdateAdventureSettings) => {
                Self::UpdateAdventureSettings(UpdateAdventureSettingsPacket::decode(&mut buf, context)?)
            }
            _ => return Ok(Self::Raw(RawPacket::new(id, buf))),
        };
        ensure_consumed(&buf, id)?;
        Ok(packet)
    }
}

macro_rules! impl_from_packet {
    ($enum:ident, $($variant:ident($packet:ty)),* $(,)?) => {
        $(impl From<$packet> for $enum {
            fn from(packet: $packet) -> Self {
                Self::$variant(packet.into())
            }
        })*
    };
}

impl_from_packet!(
    ClientboundPacket,
    PlayStatus(PlayStatusPacket),
    Disconnect(DisconnectPacket),
    StartGame(StartGamePacket),
    AddPlayer(AddPlayerPacket),
    AddActor(AddActorPacket),
    UpdateAttributes(UpdateAttributesPacket),
    SetActorData(SetActorDataPacket),
    SetPlayerGameType(SetPlayerGameTypePacket),
    ChunkRadiusUpdated(ChunkRadiusUpdatedPacket),
    UpdateAbilities(UpdateAbilitiesPacket),
    UpdateAdventureSettings(UpdateAdventureSettingsPacket),
    Raw(RawPacket),
);

/// Canonical client-to-server packets the bridge looks into
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Login(LoginPacket),
    RequestChunkRadius(RequestChunkRadiusPacket),
    RequestAbility(RequestAbilityPacket),
    Raw(RawPacket),
}

impl ServerboundPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::Login(_) => LoginPacket::KIND.id(),
            Self::RequestChunkRadius(_) => RequestChunkRadiusPacket::KIND.id(),
            Self::RequestAbility(_) => RequestAbilityPacket::KIND.id(),
            Self::Raw(raw) => raw.id,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        write_packet_header(buf, self.id());
        match self {
            Self::Login(p) => p.encode(buf, context),
            Self::RequestChunkRadius(p) => p.encode(buf, context),
            Self::RequestAbility(p) => p.encode(buf, context),
            Self::Raw(raw) => {
                buf.put_slice(&raw.body);
                Ok(())
            }
        }
    }

    /// Decode the body of a packet whose header was already read
    pub fn decode_body(id: u32, mut buf: Bytes, context: &SerializerContext) -> Result<Self> {
        let packet = match PacketKind::from_id(id) {
            Some(PacketKind::Login) => Self::Login(LoginPacket::decode(&mut buf, context)?),
            Some(PacketKind::RequestChunkRadius) => {
                Self::RequestChunkRadius(RequestChunkRadiusPacket::decode(&mut buf, context)?)
            }
            Some(PacketKind::RequestAbility) => Self::RequestAbility(RequestAbilityPacket::decode(&mut buf, context)?),
            _ => return Ok(Self::Raw(RawPacket::new(id, buf))),
        };
        ensure_consumed(&buf, id)?;
        Ok(packet)
    }

    pub fn decode(mut buf: Bytes, context: &SerializerContext) -> Result<Self> {
        let id = read_packet_header(&mut buf)?;
        Self::decode_body(id, buf, context)
    }
}

impl_from_packet!(
    ServerboundPacket,
    Login(LoginPacket),
    RequestChunkRadius(RequestChunkRadiusPacket),
    RequestAbility(RequestAbilityPacket),
    Raw(RawPacket),
);

pub(crate) fn ensure_consumed<B: Buf>(buf: &B, id: u32) -> Result<()> {
    if buf.has_remaining() {
        return Err(BridgeError::InvalidData(format!(
            "{} trailing bytes after packet 0x{:02x}",
            buf.remaining(),
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ItemTypeDictionary;

    fn context() -> SerializerContext {
        SerializerContext::new(ItemTypeDictionary::vanilla_subset())
    }

    #[test]
    fn test_header_masks_sub_client_bits() {
        let mut buf = BytesMut::new();
        write_uvarint(&mut buf, (2 << 12) | (1 << 10) | PacketKind::AddActor.id());
        assert_eq!(read_packet_header(&mut buf).unwrap(), 0x0d);
    }

    #[test]
    fn test_unknown_id_decodes_raw() {
        let mut buf = BytesMut::new();
        write_packet_header(&mut buf, 0x9c);
        buf.put_slice(&[1, 2, 3]);
        let packet = ClientboundPacket::decode(buf.freeze(), &context()).unwrap();
        assert_eq!(packet, ClientboundPacket::Raw(RawPacket::new(0x9c, vec![1u8, 2, 3])));
        assert_eq!(packet.kind(), None);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = BytesMut::new();
        ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 1 })
            .encode(&mut buf, &context())
            .unwrap();
        buf.put_u8(0);
        assert!(ClientboundPacket::decode(buf.freeze(), &context()).is_err());
    }

    #[test]
    fn test_from_boxes_large_packets() {
        let packet = ClientboundPacket::from(actor::fixtures::zombie());
        assert!(matches!(packet, ClientboundPacket::AddActor(_)));
        assert_eq!(packet.id(), 0x0d);
    }
}
