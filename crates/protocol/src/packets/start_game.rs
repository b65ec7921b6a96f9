//! Session bootstrap packet

use super::DataPacket;
use crate::codecs::*;
use crate::context::{ItemTypeEntry, SerializerContext};
use crate::info::PacketKind;
use crate::nbt::CacheableNbt;
use crate::types::{BlockPaletteEntry, LevelSettings, PlayerMovementSettings};
use bytes::{Buf, BytesMut};
use protobridge_core::{Result, Vector3};
use uuid::Uuid;

/// Start game packet, generic over the level settings layout
///
/// Both protocol generations share everything but the level settings, so the
/// legacy packet is this struct instantiated with the legacy settings type.
#[derive(Debug, Clone, PartialEq)]
pub struct StartGamePacket<S = LevelSettings> {
    pub actor_unique_id: i64,
    pub actor_runtime_id: u64,
    pub player_game_mode: i32,
    pub player_position: Vector3,
    pub pitch: f32,
    pub yaw: f32,
    pub level_settings: S,
    pub level_id: String,
    pub world_name: String,
    pub premium_world_template_id: String,
    pub is_trial: bool,
    pub player_movement_settings: PlayerMovementSettings,
    pub current_tick: i64,
    pub enchantment_seed: i32,
    pub block_palette: Vec<BlockPaletteEntry>,
    pub item_table: Vec<ItemTypeEntry>,
    pub multiplayer_correlation_id: String,
    pub enable_new_inventory_system: bool,
    pub server_software_version: String,
    pub player_actor_properties: CacheableNbt,
    pub block_palette_checksum: i64,
    pub world_template_id: Uuid,
}

impl<S> StartGamePacket<S> {
    /// Copy every field, converting the level settings
    pub fn map_level_settings<T>(&self, convert: impl FnOnce(&S) -> T) -> StartGamePacket<T> {
        StartGamePacket {
            actor_unique_id: self.actor_unique_id,
            actor_runtime_id: self.actor_runtime_id,
            player_game_mode: self.player_game_mode,
            player_position: self.player_position,
            pitch: self.pitch,
            yaw: self.yaw,
            level_settings: convert(&self.level_settings),
            level_id: self.level_id.clone(),
            world_name: self.world_name.clone(),
            premium_world_template_id: self.premium_world_template_id.clone(),
            is_trial: self.is_trial,
            player_movement_settings: self.player_movement_settings.clone(),
            current_tick: self.current_tick,
            enchantment_seed: self.enchantment_seed,
            block_palette: self.block_palette.clone(),
            item_table: self.item_table.clone(),
            multiplayer_correlation_id: self.multiplayer_correlation_id.clone(),
            enable_new_inventory_system: self.enable_new_inventory_system,
            server_software_version: self.server_software_version.clone(),
            player_actor_properties: self.player_actor_properties.clone(),
            block_palette_checksum: self.block_palette_checksum,
            world_template_id: self.world_template_id,
        }
    }
}

impl<S: BinarySerializable> StartGamePacket<S> {
    pub(crate) fn write_body(&self, buf: &mut BytesMut) {
        write_actor_unique_id(buf, self.actor_unique_id);
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_varint(buf, self.player_game_mode);
        write_vec3(buf, self.player_position);
        write_f32_le(buf, self.pitch);
        write_f32_le(buf, self.yaw);
        self.level_settings.write(buf);
        write_string(buf, &self.level_id);
        write_string(buf, &self.world_name);
        write_string(buf, &self.premium_world_template_id);
        write_bool(buf, self.is_trial);
        self.player_movement_settings.write(buf);
        write_i64_le(buf, self.current_tick);
        write_varint(buf, self.enchantment_seed);

        write_uvarint(buf, self.block_palette.len() as u32);
        for entry in &self.block_palette {
            entry.write(buf);
        }

        write_uvarint(buf, self.item_table.len() as u32);
        for entry in &self.item_table {
            write_string(buf, &entry.string_id);
            write_i16_le(buf, entry.numeric_id);
            write_bool(buf, entry.component_based);
        }

        write_string(buf, &self.multiplayer_correlation_id);
        write_bool(buf, self.enable_new_inventory_system);
        write_string(buf, &self.server_software_version);
        self.player_actor_properties.write(buf);
        write_i64_le(buf, self.block_palette_checksum);
        write_uuid(buf, &self.world_template_id);
    }

    pub(crate) fn read_body<B: Buf>(buf: &mut B) -> Result<Self> {
        let actor_unique_id = read_actor_unique_id(buf)?;
        let actor_runtime_id = read_actor_runtime_id(buf)?;
        let player_game_mode = read_varint(buf)?;
        let player_position = read_vec3(buf)?;
        let pitch = read_f32_le(buf)?;
        let yaw = read_f32_le(buf)?;
        let level_settings = S::read(buf)?;
        let level_id = read_string(buf)?;
        let world_name = read_string(buf)?;
        let premium_world_template_id = read_string(buf)?;
        let is_trial = read_bool(buf)?;
        let player_movement_settings = PlayerMovementSettings::read(buf)?;
        let current_tick = read_i64_le(buf)?;
        let enchantment_seed = read_varint(buf)?;

        let palette_count = read_count(buf, 4)?;
        let mut block_palette = Vec::with_capacity(palette_count);
        for _ in 0..palette_count {
            block_palette.push(BlockPaletteEntry::read(buf)?);
        }

        let item_count = read_count(buf, 4)?;
        let mut item_table = Vec::with_capacity(item_count);
        for _ in 0..item_count {
            let string_id = read_string(buf)?;
            let numeric_id = read_i16_le(buf)?;
            let component_based = read_bool(buf)?;
            item_table.push(ItemTypeEntry::new(string_id, numeric_id, component_based));
        }

        Ok(Self {
            actor_unique_id,
            actor_runtime_id,
            player_game_mode,
            player_position,
            pitch,
            yaw,
            level_settings,
            level_id,
            world_name,
            premium_world_template_id,
            is_trial,
            player_movement_settings,
            current_tick,
            enchantment_seed,
            block_palette,
            item_table,
            multiplayer_correlation_id: read_string(buf)?,
            enable_new_inventory_system: read_bool(buf)?,
            server_software_version: read_string(buf)?,
            player_actor_properties: CacheableNbt::read(buf)?,
            block_palette_checksum: read_i64_le(buf)?,
            world_template_id: read_uuid(buf)?,
        })
    }
}

impl DataPacket for StartGamePacket {
    const KIND: PacketKind = PacketKind::StartGame;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        self.write_body(buf);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Self::read_body(buf)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::types::level::MOVEMENT_SERVER_AUTHORITATIVE;
    use crate::types::{EducationUriResource, GameRule, GameRuleValue};

    pub fn lobby() -> StartGamePacket {
        let mut level_settings = LevelSettings::default();
        level_settings.is_editor_mode = true;
        level_settings.options.game_rules = vec![GameRule::new("naturalregeneration", false, GameRuleValue::Bool(false))];
        level_settings.options.edu_shared_uri_resource = Some(EducationUriResource {
            button_name: "Help".into(),
            link_uri: "https://example.invalid/help".into(),
        });

        StartGamePacket {
            actor_unique_id: 1,
            actor_runtime_id: 1,
            player_game_mode: 0,
            player_position: Vector3::new(0.5, 65.62, 0.5),
            pitch: 0.0,
            yaw: 180.0,
            level_settings,
            level_id: String::new(),
            world_name: "Lobby".into(),
            premium_world_template_id: String::new(),
            is_trial: false,
            player_movement_settings: PlayerMovementSettings {
                movement_type: MOVEMENT_SERVER_AUTHORITATIVE,
                rewind_history_size: 0,
                server_authoritative_block_breaking: false,
            },
            current_tick: 0,
            enchantment_seed: 0,
            block_palette: vec![],
            item_table: vec![ItemTypeEntry::new("minecraft:stick", 320, false)],
            multiplayer_correlation_id: String::new(),
            enable_new_inventory_system: false,
            server_software_version: "protobridge".into(),
            player_actor_properties: CacheableNbt::empty_compound(),
            block_palette_checksum: 0,
            world_template_id: Uuid::nil(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ItemTypeDictionary;

    #[test]
    fn test_start_game_decodes_what_it_encodes() {
        let context = SerializerContext::new(ItemTypeDictionary::default());
        let packet = fixtures::lobby();
        let mut buf = BytesMut::new();
        packet.encode(&mut buf, &context).unwrap();
        assert_eq!(StartGamePacket::decode(&mut buf, &context).unwrap(), packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_map_level_settings_copies_everything_else() {
        let packet = fixtures::lobby();
        let mapped = packet.map_level_settings(|settings| settings.is_editor_mode);
        assert!(mapped.level_settings);
        assert_eq!(mapped.world_name, packet.world_name);
        assert_eq!(mapped.item_table, packet.item_table);
    }
}
