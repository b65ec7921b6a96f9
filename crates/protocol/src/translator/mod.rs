//! # Schema Translation
//!
//! The [`TranslationTable`] maps each canonical packet kind whose layout changed
//! between generations to the legacy kind replacing it and a pure transform.
//! Kinds missing from the table are layout-compatible and pass through as-is.
//!
//! | canonical          | legacy             |
//! |--------------------|--------------------|
//! | AddActor           | AddActor           |
//! | AddPlayer          | AddPlayer          |
//! | UpdateAbilities    | AdventureSettings  |
//! | StartGame          | StartGame          |
//!
//! Transforms never mutate their input. A transform fails with
//! `MalformedInput` only when a structurally required field is missing.

macro_rules! expect_variant {
    ($packet:expr, $variant:ident) => {
        match $packet {
            $crate::packets::ClientboundPacket::$variant(inner) => inner,
            other => {
                return Err(protobridge_core::BridgeError::InvalidState(format!(
                    "{} translator given packet 0x{:02x}",
                    stringify!($variant),
                    other.id()
                )))
            }
        }
    };
}
pub(crate) use expect_variant;

pub mod abilities;
pub mod actor;
pub mod inbound;
pub mod start_game;

pub use abilities::{abilities_from_adventure_settings, adventure_settings_from_abilities};
pub use actor::legacy_head_yaw;
pub use inbound::decode_legacy_serverbound;

use crate::context::SerializerContext;
use crate::info::PacketKind;
use crate::legacy::LegacyPacket;
use crate::packets::ClientboundPacket;
use bytes::BytesMut;
use protobridge_core::Result;
use std::collections::HashMap;

pub type TransformFn = fn(&ClientboundPacket) -> Result<LegacyPacket>;

#[derive(Clone, Copy)]
pub struct Translator {
    pub legacy_kind: PacketKind,
    pub transform: TransformFn,
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator").field("legacy_kind", &self.legacy_kind).finish()
    }
}

/// A packet ready for the batch serializer, in either layout
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPacket {
    Canonical(ClientboundPacket),
    Legacy(LegacyPacket),
}

impl OutboundPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::Canonical(packet) => packet.id(),
            Self::Legacy(packet) => packet.kind().id(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Write header and body
    pub fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        match self {
            Self::Canonical(packet) => packet.encode(buf, context),
            Self::Legacy(packet) => packet.encode(buf, context),
        }
    }
}

impl From<ClientboundPacket> for OutboundPacket {
    fn from(packet: ClientboundPacket) -> Self {
        Self::Canonical(packet)
    }
}

impl From<LegacyPacket> for OutboundPacket {
    fn from(packet: LegacyPacket) -> Self {
        Self::Legacy(packet)
    }
}

/// Result of running a packet list through the table
#[derive(Debug, Clone)]
pub struct TranslatedBatch {
    pub packets: Vec<OutboundPacket>,
    /// Number of packets that were replaced by their legacy form
    pub translated: usize,
}

impl TranslatedBatch {
    /// Whether the list differs from its canonical source
    pub fn differs(&self) -> bool {
        self.translated > 0
    }
}

#[derive(Debug, Clone)]
pub struct TranslationTable {
    translators: HashMap<PacketKind, Translator>,
}

impl TranslationTable {
    pub fn empty() -> Self {
        Self {
            translators: HashMap::new(),
        }
    }

    /// Table for the canonical/legacy generation pair
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(PacketKind::AddActor, PacketKind::AddActor, actor::translate_add_actor);
        table.register(PacketKind::AddPlayer, PacketKind::AddPlayer, actor::translate_add_player);
        table.register(
            PacketKind::UpdateAbilities,
            PacketKind::AdventureSettings,
            abilities::translate_update_abilities,
        );
        table.register(PacketKind::StartGame, PacketKind::StartGame, start_game::translate_start_game);
        table
    }

    pub fn register(&mut self, kind: PacketKind, legacy_kind: PacketKind, transform: TransformFn) {
        self.translators.insert(kind, Translator { legacy_kind, transform });
    }

    pub fn get(&self, kind: PacketKind) -> Option<&Translator> {
        self.translators.get(&kind)
    }

    pub fn handles(&self, packet: &ClientboundPacket) -> bool {
        packet.kind().is_some_and(|kind| self.translators.contains_key(&kind))
    }

    /// Legacy form of a packet, or the packet itself when its kind is
    /// layout-compatible
    pub fn translate(&self, packet: &ClientboundPacket) -> Result<OutboundPacket> {
        match packet.kind().and_then(|kind| self.get(kind)) {
            Some(translator) => {
                let legacy = (translator.transform)(packet)?;
                debug_assert_eq!(legacy.kind(), translator.legacy_kind);
                Ok(OutboundPacket::Legacy(legacy))
            }
            None => Ok(OutboundPacket::Canonical(packet.clone())),
        }
    }

    /// Translate a packet list, preserving order
    pub fn translate_all(&self, packets: &[ClientboundPacket]) -> Result<TranslatedBatch> {
        let mut translated = 0;
        let packets = packets
            .iter()
            .map(|packet| {
                let out = self.translate(packet)?;
                if out.is_legacy() {
                    translated += 1;
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!("Translated {} of {} packets to the legacy schema", translated, packets.len());
        Ok(TranslatedBatch { packets, translated })
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::standard()
    }
}
