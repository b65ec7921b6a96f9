//! Abilities, adventure settings and game mode packets

use super::DataPacket;
use crate::codecs::*;
use crate::context::SerializerContext;
use crate::info::PacketKind;
use crate::types::AbilitiesData;
use bytes::{Buf, BytesMut};
use protobridge_core::{BridgeError, Result};

/// Abilities and permission levels of one player
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAbilitiesPacket {
    pub data: AbilitiesData,
}

impl DataPacket for UpdateAbilitiesPacket {
    const KIND: PacketKind = PacketKind::UpdateAbilities;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        self.data.validate()?;
        self.data.write(buf);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            data: AbilitiesData::read(buf)?,
        })
    }
}

/// World-level settings that used to live in the legacy adventure settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateAdventureSettingsPacket {
    pub no_attacking_mobs: bool,
    pub no_attacking_players: bool,
    pub world_immutable: bool,
    pub show_name_tags: bool,
    pub auto_jump: bool,
}

impl DataPacket for UpdateAdventureSettingsPacket {
    const KIND: PacketKind = PacketKind::UpdateAdventureSettings;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_bool(buf, self.no_attacking_mobs);
        write_bool(buf, self.no_attacking_players);
        write_bool(buf, self.world_immutable);
        write_bool(buf, self.show_name_tags);
        write_bool(buf, self.auto_jump);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            no_attacking_mobs: read_bool(buf)?,
            no_attacking_players: read_bool(buf)?,
            world_immutable: read_bool(buf)?,
            show_name_tags: read_bool(buf)?,
            auto_jump: read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbilityValue {
    Bool(bool),
    Float(f32),
}

const VALUE_TYPE_BOOL: u8 = 1;
const VALUE_TYPE_FLOAT: u8 = 2;

/// Client asks to change one ability
///
/// # Format
/// ```text
/// {VARINT ability}{U8 value type}{BOOL bool value}{F32 float value}
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestAbilityPacket {
    pub ability_id: i32,
    pub value: AbilityValue,
}

impl DataPacket for RequestAbilityPacket {
    const KIND: PacketKind = PacketKind::RequestAbility;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_varint(buf, self.ability_id);
        let (value_type, bool_value, float_value) = match self.value {
            AbilityValue::Bool(v) => (VALUE_TYPE_BOOL, v, 0.0),
            AbilityValue::Float(v) => (VALUE_TYPE_FLOAT, false, v),
        };
        write_u8(buf, value_type);
        write_bool(buf, bool_value);
        write_f32_le(buf, float_value);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        let ability_id = read_varint(buf)?;
        let value_type = read_u8(buf)?;
        let bool_value = read_bool(buf)?;
        let float_value = read_f32_le(buf)?;
        let value = match value_type {
            VALUE_TYPE_BOOL => AbilityValue::Bool(bool_value),
            VALUE_TYPE_FLOAT => AbilityValue::Float(float_value),
            other => return Err(BridgeError::InvalidData(format!("Unknown ability value type {}", other))),
        };
        Ok(Self { ability_id, value })
    }
}

/// `{VARINT game mode}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPlayerGameTypePacket {
    pub game_mode: i32,
}

impl DataPacket for SetPlayerGameTypePacket {
    const KIND: PacketKind = PacketKind::SetPlayerGameType;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_varint(buf, self.game_mode);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            game_mode: read_varint(buf)?,
        })
    }
}
