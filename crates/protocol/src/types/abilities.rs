//! Player abilities and permission levels
//!
//! The canonical protocol describes abilities as layers of (set, value) bit masks
//! plus fly and walk speeds. The legacy protocol folds the same information into
//! the adventure settings flag words, see [`crate::legacy::adventure`].

use crate::codecs::*;
use bytes::{Buf, BytesMut};
use protobridge_core::{BridgeError, Result};
use std::collections::BTreeMap;

pub const ABILITY_BUILD: u8 = 0;
pub const ABILITY_MINE: u8 = 1;
pub const ABILITY_DOORS_AND_SWITCHES: u8 = 2;
pub const ABILITY_OPEN_CONTAINERS: u8 = 3;
pub const ABILITY_ATTACK_PLAYERS: u8 = 4;
pub const ABILITY_ATTACK_MOBS: u8 = 5;
pub const ABILITY_OPERATOR: u8 = 6;
pub const ABILITY_TELEPORT: u8 = 7;
pub const ABILITY_INVULNERABLE: u8 = 8;
pub const ABILITY_FLYING: u8 = 9;
pub const ABILITY_ALLOW_FLIGHT: u8 = 10;
pub const ABILITY_INFINITE_RESOURCES: u8 = 11;
pub const ABILITY_LIGHTNING: u8 = 12;
pub const ABILITY_FLY_SPEED: u8 = 13;
pub const ABILITY_WALK_SPEED: u8 = 14;
pub const ABILITY_MUTED: u8 = 15;
pub const ABILITY_WORLD_BUILDER: u8 = 16;
pub const ABILITY_NO_CLIP: u8 = 17;

pub const NUMBER_OF_ABILITIES: u8 = 18;

pub const LAYER_CACHE: u16 = 0;
pub const LAYER_BASE: u16 = 1;
pub const LAYER_SPECTATOR: u16 = 2;
pub const LAYER_COMMANDS: u16 = 3;

pub const DEFAULT_FLY_SPEED: f32 = 0.05;
pub const DEFAULT_WALK_SPEED: f32 = 0.1;

/// Command permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CommandPermissions {
    Normal = 0,
    Operator = 1,
    Automation = 2,
    Host = 3,
    Owner = 4,
    Internal = 5,
}

impl CommandPermissions {
    pub const ALL: [Self; 6] = [
        Self::Normal,
        Self::Operator,
        Self::Automation,
        Self::Host,
        Self::Owner,
        Self::Internal,
    ];

    pub fn from_u32(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| *p as u32 == value)
            .ok_or_else(|| BridgeError::InvalidData(format!("Unknown command permission {}", value)))
    }
}

/// Player permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlayerPermissions {
    Visitor = 0,
    Member = 1,
    Operator = 2,
    Custom = 3,
}

impl PlayerPermissions {
    pub const ALL: [Self; 4] = [Self::Visitor, Self::Member, Self::Operator, Self::Custom];

    pub fn from_u32(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| *p as u32 == value)
            .ok_or_else(|| BridgeError::InvalidData(format!("Unknown player permission {}", value)))
    }
}

/// One abilities layer
///
/// Only abilities present in `bool_abilities` are marked as set; the others are
/// inherited from lower layers by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilitiesLayer {
    pub layer_id: u16,
    pub bool_abilities: BTreeMap<u8, bool>,
    pub fly_speed: Option<f32>,
    pub walk_speed: Option<f32>,
}

impl AbilitiesLayer {
    pub fn new(layer_id: u16, bool_abilities: BTreeMap<u8, bool>, fly_speed: Option<f32>, walk_speed: Option<f32>) -> Self {
        Self {
            layer_id,
            bool_abilities,
            fly_speed,
            walk_speed,
        }
    }

    /// Value of a boolean ability, `false` when the layer leaves it unset
    pub fn ability(&self, ability: u8) -> bool {
        self.bool_abilities.get(&ability).copied().unwrap_or(false)
    }

    /// Every boolean ability id must fit the 32-bit masks
    pub fn validate(&self) -> Result<()> {
        match self.bool_abilities.keys().find(|&&ability| ability >= NUMBER_OF_ABILITIES) {
            Some(ability) => Err(BridgeError::MalformedInput(format!(
                "Unknown ability {} in abilities layer {}",
                ability, self.layer_id
            ))),
            None => Ok(()),
        }
    }
}

/// Mask bit of an ability; ids beyond the mask width contribute nothing
#[inline]
fn ability_bit(ability: u8) -> u32 {
    1u32.checked_shl(ability as u32).unwrap_or(0)
}

impl BinarySerializable for AbilitiesLayer {
    fn write(&self, buf: &mut BytesMut) {
        let mut set = 0u32;
        let mut values = 0u32;
        for (&ability, &value) in &self.bool_abilities {
            set |= ability_bit(ability);
            if value {
                values |= ability_bit(ability);
            }
        }
        if self.fly_speed.is_some() {
            set |= 1 << ABILITY_FLY_SPEED;
        }
        if self.walk_speed.is_some() {
            set |= 1 << ABILITY_WALK_SPEED;
        }

        write_i16_le(buf, self.layer_id as i16);
        write_u32_le(buf, set);
        write_u32_le(buf, values);
        write_f32_le(buf, self.fly_speed.unwrap_or(0.0));
        write_f32_le(buf, self.walk_speed.unwrap_or(0.0));
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let layer_id = read_i16_le(buf)? as u16;
        let set = read_u32_le(buf)?;
        let values = read_u32_le(buf)?;
        let fly_speed = read_f32_le(buf)?;
        let walk_speed = read_f32_le(buf)?;

        let mut bool_abilities = BTreeMap::new();
        for ability in 0..NUMBER_OF_ABILITIES {
            if ability == ABILITY_FLY_SPEED || ability == ABILITY_WALK_SPEED {
                continue;
            }
            if set & (1 << ability) != 0 {
                bool_abilities.insert(ability, values & (1 << ability) != 0);
            }
        }

        Ok(Self {
            layer_id,
            bool_abilities,
            fly_speed: (set & (1 << ABILITY_FLY_SPEED) != 0).then_some(fly_speed),
            walk_speed: (set & (1 << ABILITY_WALK_SPEED) != 0).then_some(walk_speed),
        })
    }
}

/// Abilities and permission levels of one player
///
/// # Format
/// ```text
/// {I64 LE target unique id}{U8 player permission}{U8 command permission}
/// {U8 layer count}[{layer}]*
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AbilitiesData {
    pub command_permission: CommandPermissions,
    pub player_permission: PlayerPermissions,
    pub target_actor_unique_id: i64,
    pub layers: Vec<AbilitiesLayer>,
}

impl AbilitiesData {
    pub fn new(
        command_permission: CommandPermissions,
        player_permission: PlayerPermissions,
        target_actor_unique_id: i64,
        layers: Vec<AbilitiesLayer>,
    ) -> Self {
        Self {
            command_permission,
            player_permission,
            target_actor_unique_id,
            layers,
        }
    }

    pub fn base_layer(&self) -> Option<&AbilitiesLayer> {
        self.layers.iter().find(|layer| layer.layer_id == LAYER_BASE)
    }

    /// # Errors
    /// `MalformedInput` if any layer names an ability id the protocol does not have.
    pub fn validate(&self) -> Result<()> {
        self.layers.iter().try_for_each(AbilitiesLayer::validate)
    }
}

impl BinarySerializable for AbilitiesData {
    fn write(&self, buf: &mut BytesMut) {
        write_i64_le(buf, self.target_actor_unique_id);
        write_u8(buf, self.player_permission as u8);
        write_u8(buf, self.command_permission as u8);
        write_u8(buf, self.layers.len() as u8);
        for layer in &self.layers {
            layer.write(buf);
        }
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let target_actor_unique_id = read_i64_le(buf)?;
        let player_permission = PlayerPermissions::from_u32(read_u8(buf)? as u32)?;
        let command_permission = CommandPermissions::from_u32(read_u8(buf)? as u32)?;
        let layer_count = read_u8(buf)?;
        let mut layers = Vec::with_capacity(layer_count as usize);
        for _ in 0..layer_count {
            layers.push(AbilitiesLayer::read(buf)?);
        }
        Ok(Self {
            command_permission,
            player_permission,
            target_actor_unique_id,
            layers,
        })
    }
}
