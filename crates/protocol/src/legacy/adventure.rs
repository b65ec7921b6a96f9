//! Legacy adventure settings
//!
//! Abilities, permission levels and a few world settings packed into two flag
//! words. Flags carrying [`BITFLAG_SECOND_SET`] live in `flags2` (the marker bit
//! itself is not transmitted); all others live in `flags`.

use crate::codecs::*;
use crate::types::{CommandPermissions, PlayerPermissions};
use bytes::{Buf, BytesMut};
use protobridge_core::Result;

pub const BITFLAG_SECOND_SET: u32 = 1 << 16;

pub const WORLD_IMMUTABLE: u32 = 0x01;
pub const NO_PVP: u32 = 0x02;
pub const AUTO_JUMP: u32 = 0x20;
pub const ALLOW_FLIGHT: u32 = 0x40;
pub const NO_CLIP: u32 = 0x80;
pub const WORLD_BUILDER: u32 = 0x100;
pub const FLYING: u32 = 0x200;
pub const MUTED: u32 = 0x400;

pub const MINE: u32 = 0x01 | BITFLAG_SECOND_SET;
pub const DOORS_AND_SWITCHES: u32 = 0x02 | BITFLAG_SECOND_SET;
pub const OPEN_CONTAINERS: u32 = 0x04 | BITFLAG_SECOND_SET;
pub const ATTACK_PLAYERS: u32 = 0x08 | BITFLAG_SECOND_SET;
pub const ATTACK_MOBS: u32 = 0x10 | BITFLAG_SECOND_SET;
pub const OPERATOR: u32 = 0x20 | BITFLAG_SECOND_SET;
pub const TELEPORT: u32 = 0x80 | BITFLAG_SECOND_SET;
pub const BUILD: u32 = 0x100 | BITFLAG_SECOND_SET;
pub const DEFAULT: u32 = 0x200 | BITFLAG_SECOND_SET;

/// # Format
/// ```text
/// {UVARINT flags}{UVARINT command permission}{UVARINT flags2}
/// {UVARINT player permission}{UVARINT custom flags}{I64 LE target unique id}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdventureSettingsPacket {
    pub flags: u32,
    pub command_permission: CommandPermissions,
    pub flags2: u32,
    pub player_permission: PlayerPermissions,
    pub custom_flags: u32,
    pub target_actor_unique_id: i64,
}

impl AdventureSettingsPacket {
    pub fn new(
        command_permission: CommandPermissions,
        player_permission: PlayerPermissions,
        target_actor_unique_id: i64,
    ) -> Self {
        Self {
            flags: 0,
            command_permission,
            flags2: 0,
            player_permission,
            custom_flags: 0,
            target_actor_unique_id,
        }
    }

    pub fn get_flag(&self, flag: u32) -> bool {
        if flag & BITFLAG_SECOND_SET != 0 {
            self.flags2 & (flag & !BITFLAG_SECOND_SET) != 0
        } else {
            self.flags & flag != 0
        }
    }

    pub fn set_flag(&mut self, flag: u32, value: bool) {
        let (word, bits) = if flag & BITFLAG_SECOND_SET != 0 {
            (&mut self.flags2, flag & !BITFLAG_SECOND_SET)
        } else {
            (&mut self.flags, flag)
        };
        if value {
            *word |= bits;
        } else {
            *word &= !bits;
        }
    }

    pub fn write(&self, buf: &mut BytesMut) {
        write_uvarint(buf, self.flags);
        write_uvarint(buf, self.command_permission as u32);
        write_uvarint(buf, self.flags2);
        write_uvarint(buf, self.player_permission as u32);
        write_uvarint(buf, self.custom_flags);
        write_i64_le(buf, self.target_actor_unique_id);
    }

    pub fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            flags: read_uvarint(buf)?,
            command_permission: CommandPermissions::from_u32(read_uvarint(buf)?)?,
            flags2: read_uvarint(buf)?,
            player_permission: PlayerPermissions::from_u32(read_uvarint(buf)?)?,
            custom_flags: read_uvarint(buf)?,
            target_actor_unique_id: read_i64_le(buf)?,
        })
    }
}
