//! Level settings and the other start game sub-structures
//!
//! Level settings are split around the only field whose presence differs between
//! protocol generations (`is_editor_mode`, right after `achievements_disabled`):
//! [`WorldSettings`] holds the fields before it, [`LevelOptions`] the fields after.

use crate::codecs::*;
use crate::nbt::CacheableNbt;
use bytes::{Buf, BytesMut};
use protobridge_core::{BlockPosition, BridgeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSettings {
    pub biome_type: u16,
    pub biome_name: String,
    pub dimension: i32,
}

pub const BIOME_TYPE_DEFAULT: u16 = 0;
pub const DIMENSION_OVERWORLD: i32 = 0;

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            biome_type: BIOME_TYPE_DEFAULT,
            biome_name: String::new(),
            dimension: DIMENSION_OVERWORLD,
        }
    }
}

impl BinarySerializable for SpawnSettings {
    fn write(&self, buf: &mut BytesMut) {
        write_i16_le(buf, self.biome_type as i16);
        write_string(buf, &self.biome_name);
        write_varint(buf, self.dimension);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            biome_type: read_i16_le(buf)? as u16,
            biome_name: read_string(buf)?,
            dimension: read_varint(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameRuleValue {
    Bool(bool),
    Int(u32),
    Float(f32),
}

/// A named game rule
#[derive(Debug, Clone, PartialEq)]
pub struct GameRule {
    pub name: String,
    pub player_modifiable: bool,
    pub value: GameRuleValue,
}

impl GameRule {
    pub fn new(name: impl Into<String>, player_modifiable: bool, value: GameRuleValue) -> Self {
        Self {
            name: name.into(),
            player_modifiable,
            value,
        }
    }
}

impl BinarySerializable for GameRule {
    fn write(&self, buf: &mut BytesMut) {
        write_string(buf, &self.name);
        write_bool(buf, self.player_modifiable);
        match self.value {
            GameRuleValue::Bool(v) => {
                write_uvarint(buf, 1);
                write_bool(buf, v);
            }
            GameRuleValue::Int(v) => {
                write_uvarint(buf, 2);
                write_uvarint(buf, v);
            }
            GameRuleValue::Float(v) => {
                write_uvarint(buf, 3);
                write_f32_le(buf, v);
            }
        }
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let name = read_string(buf)?;
        let player_modifiable = read_bool(buf)?;
        let value = match read_uvarint(buf)? {
            1 => GameRuleValue::Bool(read_bool(buf)?),
            2 => GameRuleValue::Int(read_uvarint(buf)?),
            3 => GameRuleValue::Float(read_f32_le(buf)?),
            other => return Err(BridgeError::InvalidData(format!("Unknown game rule type {}", other))),
        };
        Ok(Self {
            name,
            player_modifiable,
            value,
        })
    }
}

/// Experimental toggles of the world
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Experiments {
    pub experiments: Vec<(String, bool)>,
    pub has_previously_used_experiments: bool,
}

impl BinarySerializable for Experiments {
    fn write(&self, buf: &mut BytesMut) {
        write_i32_le(buf, self.experiments.len() as i32);
        for (name, enabled) in &self.experiments {
            write_string(buf, name);
            write_bool(buf, *enabled);
        }
        write_bool(buf, self.has_previously_used_experiments);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let count = read_i32_le(buf)?;
        let count = usize::try_from(count)
            .ok()
            .filter(|c| c.saturating_mul(2) <= buf.remaining())
            .ok_or_else(|| BridgeError::InvalidData(format!("Invalid experiment count {}", count)))?;
        let mut experiments = Vec::with_capacity(count);
        for _ in 0..count {
            experiments.push((read_string(buf)?, read_bool(buf)?));
        }
        Ok(Self {
            experiments,
            has_previously_used_experiments: read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EducationUriResource {
    pub button_name: String,
    pub link_uri: String,
}

impl BinarySerializable for EducationUriResource {
    fn write(&self, buf: &mut BytesMut) {
        write_string(buf, &self.button_name);
        write_string(buf, &self.link_uri);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            button_name: read_string(buf)?,
            link_uri: read_string(buf)?,
        })
    }
}

pub const MOVEMENT_CLIENT_AUTHORITATIVE: i32 = 0;
pub const MOVEMENT_SERVER_AUTHORITATIVE: i32 = 1;
pub const MOVEMENT_SERVER_AUTHORITATIVE_WITH_REWIND: i32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMovementSettings {
    pub movement_type: i32,
    pub rewind_history_size: i32,
    pub server_authoritative_block_breaking: bool,
}

impl BinarySerializable for PlayerMovementSettings {
    fn write(&self, buf: &mut BytesMut) {
        write_varint(buf, self.movement_type);
        write_varint(buf, self.rewind_history_size);
        write_bool(buf, self.server_authoritative_block_breaking);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            movement_type: read_varint(buf)?,
            rewind_history_size: read_varint(buf)?,
            server_authoritative_block_breaking: read_bool(buf)?,
        })
    }
}

/// Custom block state entry of the block palette
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPaletteEntry {
    pub name: String,
    pub states: CacheableNbt,
}

impl BinarySerializable for BlockPaletteEntry {
    fn write(&self, buf: &mut BytesMut) {
        write_string(buf, &self.name);
        self.states.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            name: read_string(buf)?,
            states: CacheableNbt::read(buf)?,
        })
    }
}

/// Level settings fields preceding the editor mode flag
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    pub seed: i64,
    pub spawn_settings: SpawnSettings,
    pub generator: i32,
    pub world_game_mode: i32,
    pub difficulty: i32,
    pub spawn_position: BlockPosition,
    pub achievements_disabled: bool,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: -1,
            spawn_settings: SpawnSettings::default(),
            generator: 1,
            world_game_mode: 0,
            difficulty: 1,
            spawn_position: BlockPosition::new(0, 0, 0),
            achievements_disabled: true,
        }
    }
}

impl BinarySerializable for WorldSettings {
    fn write(&self, buf: &mut BytesMut) {
        write_i64_le(buf, self.seed);
        self.spawn_settings.write(buf);
        write_varint(buf, self.generator);
        write_varint(buf, self.world_game_mode);
        write_varint(buf, self.difficulty);
        write_block_position(buf, self.spawn_position);
        write_bool(buf, self.achievements_disabled);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            seed: read_i64_le(buf)?,
            spawn_settings: SpawnSettings::read(buf)?,
            generator: read_varint(buf)?,
            world_game_mode: read_varint(buf)?,
            difficulty: read_varint(buf)?,
            spawn_position: read_block_position(buf)?,
            achievements_disabled: read_bool(buf)?,
        })
    }
}

/// Level settings fields following the editor mode flag
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOptions {
    pub time: i32,
    pub edu_edition_offer: i32,
    pub edu_features_enabled: bool,
    pub edu_product_uuid: String,
    pub rain_level: f32,
    pub lightning_level: f32,
    pub confirmed_platform_locked_content: bool,
    pub multiplayer_game: bool,
    pub lan_broadcast: bool,
    pub xbox_live_broadcast_mode: i32,
    pub platform_broadcast_mode: i32,
    pub commands_enabled: bool,
    pub texture_packs_required: bool,
    pub game_rules: Vec<GameRule>,
    pub experiments: Experiments,
    pub bonus_chest_enabled: bool,
    pub start_with_map_enabled: bool,
    pub default_player_permission: i32,
    pub server_chunk_tick_radius: i32,
    pub locked_behavior_pack: bool,
    pub locked_resource_pack: bool,
    pub from_locked_world_template: bool,
    pub msa_gamertags_only: bool,
    pub from_world_template: bool,
    pub world_template_option_locked: bool,
    pub only_spawn_v1_villagers: bool,
    pub vanilla_version: String,
    pub limited_world_width: i32,
    pub limited_world_length: i32,
    pub new_nether: bool,
    /// Written as two empty strings when absent
    pub edu_shared_uri_resource: Option<EducationUriResource>,
    pub experimental_gameplay_override: Option<bool>,
}

impl Default for LevelOptions {
    fn default() -> Self {
        Self {
            time: 0,
            edu_edition_offer: 0,
            edu_features_enabled: false,
            edu_product_uuid: String::new(),
            rain_level: 0.0,
            lightning_level: 0.0,
            confirmed_platform_locked_content: false,
            multiplayer_game: true,
            lan_broadcast: true,
            xbox_live_broadcast_mode: 0,
            platform_broadcast_mode: 0,
            commands_enabled: true,
            texture_packs_required: false,
            game_rules: Vec::new(),
            experiments: Experiments::default(),
            bonus_chest_enabled: false,
            start_with_map_enabled: false,
            default_player_permission: 1,
            server_chunk_tick_radius: 4,
            locked_behavior_pack: false,
            locked_resource_pack: false,
            from_locked_world_template: false,
            msa_gamertags_only: false,
            from_world_template: false,
            world_template_option_locked: false,
            only_spawn_v1_villagers: false,
            vanilla_version: "*".to_string(),
            limited_world_width: 0,
            limited_world_length: 0,
            new_nether: true,
            edu_shared_uri_resource: None,
            experimental_gameplay_override: None,
        }
    }
}

impl BinarySerializable for LevelOptions {
    fn write(&self, buf: &mut BytesMut) {
        write_varint(buf, self.time);
        write_varint(buf, self.edu_edition_offer);
        write_bool(buf, self.edu_features_enabled);
        write_string(buf, &self.edu_product_uuid);
        write_f32_le(buf, self.rain_level);
        write_f32_le(buf, self.lightning_level);
        write_bool(buf, self.confirmed_platform_locked_content);
        write_bool(buf, self.multiplayer_game);
        write_bool(buf, self.lan_broadcast);
        write_varint(buf, self.xbox_live_broadcast_mode);
        write_varint(buf, self.platform_broadcast_mode);
        write_bool(buf, self.commands_enabled);
        write_bool(buf, self.texture_packs_required);
        write_uvarint(buf, self.game_rules.len() as u32);
        for rule in &self.game_rules {
            rule.write(buf);
        }
        self.experiments.write(buf);
        write_bool(buf, self.bonus_chest_enabled);
        write_bool(buf, self.start_with_map_enabled);
        write_varint(buf, self.default_player_permission);
        write_i32_le(buf, self.server_chunk_tick_radius);
        write_bool(buf, self.locked_behavior_pack);
        write_bool(buf, self.locked_resource_pack);
        write_bool(buf, self.from_locked_world_template);
        write_bool(buf, self.msa_gamertags_only);
        write_bool(buf, self.from_world_template);
        write_bool(buf, self.world_template_option_locked);
        write_bool(buf, self.only_spawn_v1_villagers);
        write_string(buf, &self.vanilla_version);
        write_i32_le(buf, self.limited_world_width);
        write_i32_le(buf, self.limited_world_length);
        write_bool(buf, self.new_nether);
        match &self.edu_shared_uri_resource {
            Some(resource) => resource.write(buf),
            None => EducationUriResource::default().write(buf),
        }
        write_bool(buf, self.experimental_gameplay_override.is_some());
        if let Some(value) = self.experimental_gameplay_override {
            write_bool(buf, value);
        }
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let time = read_varint(buf)?;
        let edu_edition_offer = read_varint(buf)?;
        let edu_features_enabled = read_bool(buf)?;
        let edu_product_uuid = read_string(buf)?;
        let rain_level = read_f32_le(buf)?;
        let lightning_level = read_f32_le(buf)?;
        let confirmed_platform_locked_content = read_bool(buf)?;
        let multiplayer_game = read_bool(buf)?;
        let lan_broadcast = read_bool(buf)?;
        let xbox_live_broadcast_mode = read_varint(buf)?;
        let platform_broadcast_mode = read_varint(buf)?;
        let commands_enabled = read_bool(buf)?;
        let texture_packs_required = read_bool(buf)?;
        let rule_count = read_count(buf, 4)?;
        let mut game_rules = Vec::with_capacity(rule_count);
        for _ in 0..rule_count {
            game_rules.push(GameRule::read(buf)?);
        }
        Ok(Self {
            time,
            edu_edition_offer,
            edu_features_enabled,
            edu_product_uuid,
            rain_level,
            lightning_level,
            confirmed_platform_locked_content,
            multiplayer_game,
            lan_broadcast,
            xbox_live_broadcast_mode,
            platform_broadcast_mode,
            commands_enabled,
            texture_packs_required,
            game_rules,
            experiments: Experiments::read(buf)?,
            bonus_chest_enabled: read_bool(buf)?,
            start_with_map_enabled: read_bool(buf)?,
            default_player_permission: read_varint(buf)?,
            server_chunk_tick_radius: read_i32_le(buf)?,
            locked_behavior_pack: read_bool(buf)?,
            locked_resource_pack: read_bool(buf)?,
            from_locked_world_template: read_bool(buf)?,
            msa_gamertags_only: read_bool(buf)?,
            from_world_template: read_bool(buf)?,
            world_template_option_locked: read_bool(buf)?,
            only_spawn_v1_villagers: read_bool(buf)?,
            vanilla_version: read_string(buf)?,
            limited_world_width: read_i32_le(buf)?,
            limited_world_length: read_i32_le(buf)?,
            new_nether: read_bool(buf)?,
            edu_shared_uri_resource: Some(EducationUriResource::read(buf)?),
            experimental_gameplay_override: if read_bool(buf)? { Some(read_bool(buf)?) } else { None },
        })
    }
}

/// Canonical level settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LevelSettings {
    pub world: WorldSettings,
    pub is_editor_mode: bool,
    pub options: LevelOptions,
}

impl BinarySerializable for LevelSettings {
    fn write(&self, buf: &mut BytesMut) {
        self.world.write(buf);
        write_bool(buf, self.is_editor_mode);
        self.options.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            world: WorldSettings::read(buf)?,
            is_editor_mode: read_bool(buf)?,
            options: LevelOptions::read(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_edu_resource_is_written_empty() {
        let options = LevelOptions::default();
        let mut buf = BytesMut::new();
        options.write(&mut buf);

        let decoded = LevelOptions::read(&mut buf).unwrap();
        assert_eq!(decoded.edu_shared_uri_resource, Some(EducationUriResource::default()));
        assert_eq!(decoded.vanilla_version, "*");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_game_rules_keep_order_and_types() {
        let mut options = LevelOptions::default();
        options.game_rules = vec![
            GameRule::new("naturalregeneration", false, GameRuleValue::Bool(false)),
            GameRule::new("spawnradius", false, GameRuleValue::Int(5)),
            GameRule::new("speed", true, GameRuleValue::Float(1.5)),
        ];
        options.experimental_gameplay_override = Some(true);
        let mut buf = BytesMut::new();
        options.write(&mut buf);
        assert_eq!(LevelOptions::read(&mut buf).unwrap().game_rules, options.game_rules);
    }

    #[test]
    fn test_editor_flag_sits_after_achievements() {
        let settings = LevelSettings {
            is_editor_mode: true,
            ..Default::default()
        };
        let mut world = BytesMut::new();
        settings.world.write(&mut world);

        let mut buf = BytesMut::new();
        settings.write(&mut buf);
        assert_eq!(buf[world.len() - 1], 1); // achievements disabled
        assert_eq!(buf[world.len()], 1); // editor mode

        let decoded = LevelSettings::read(&mut buf).unwrap();
        assert_eq!(decoded.world, settings.world);
        assert!(decoded.is_editor_mode);
        assert_eq!(
            decoded.options.edu_shared_uri_resource,
            Some(EducationUriResource::default())
        );
    }
}
