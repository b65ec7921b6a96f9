//! Legacy actor and player spawn packets

use super::adventure::AdventureSettingsPacket;
use crate::codecs::*;
use crate::context::SerializerContext;
use crate::types::entity::*;
use crate::types::ItemStackWrapper;
use bytes::{Buf, BytesMut};
use protobridge_core::{Result, Vector3};
use uuid::Uuid;

/// Legacy actor spawn: the canonical layout without body yaw
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyAddActorPacket {
    pub actor_unique_id: i64,
    pub actor_runtime_id: u64,
    pub actor_type: String,
    pub position: Vector3,
    pub motion: Vector3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub attributes: Vec<Attribute>,
    pub metadata: EntityMetadata,
    pub links: Vec<EntityLink>,
}

impl LegacyAddActorPacket {
    pub fn write(&self, buf: &mut BytesMut) {
        write_actor_unique_id(buf, self.actor_unique_id);
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_string(buf, &self.actor_type);
        write_vec3(buf, self.position);
        write_vec3(buf, self.motion);
        write_f32_le(buf, self.pitch);
        write_f32_le(buf, self.yaw);
        write_f32_le(buf, self.head_yaw);
        write_spawn_attributes(buf, &self.attributes);
        write_entity_metadata(buf, &self.metadata);
        write_entity_links(buf, &self.links);
    }

    pub fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            actor_unique_id: read_actor_unique_id(buf)?,
            actor_runtime_id: read_actor_runtime_id(buf)?,
            actor_type: read_string(buf)?,
            position: read_vec3(buf)?,
            motion: read_vec3(buf)?,
            pitch: read_f32_le(buf)?,
            yaw: read_f32_le(buf)?,
            head_yaw: read_f32_le(buf)?,
            attributes: read_spawn_attributes(buf)?,
            metadata: read_entity_metadata(buf)?,
            links: read_entity_links(buf)?,
        })
    }
}

/// Legacy player spawn
///
/// # Format
/// ```text
/// {UUID}{STRING username}{VARLONG unique id}{UVARLONG runtime id}
/// {STRING platform chat id}{VEC3 position}{VEC3 motion}
/// {F32 pitch}{F32 yaw}{F32 head yaw}{item stack wrapper}{VARINT game mode}
/// {metadata}{adventure settings body}{links}{STRING device id}{I32 LE build platform}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyAddPlayerPacket {
    pub uuid: Uuid,
    pub username: String,
    pub actor_unique_id: i64,
    pub actor_runtime_id: u64,
    pub platform_chat_id: String,
    pub position: Vector3,
    pub motion: Vector3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub item: ItemStackWrapper,
    pub game_mode: i32,
    pub metadata: EntityMetadata,
    pub adventure_settings: AdventureSettingsPacket,
    pub links: Vec<EntityLink>,
    pub device_id: String,
    pub build_platform: i32,
}

impl LegacyAddPlayerPacket {
    pub fn write(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        write_uuid(buf, &self.uuid);
        write_string(buf, &self.username);
        write_actor_unique_id(buf, self.actor_unique_id);
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_string(buf, &self.platform_chat_id);
        write_vec3(buf, self.position);
        write_vec3(buf, self.motion);
        write_f32_le(buf, self.pitch);
        write_f32_le(buf, self.yaw);
        write_f32_le(buf, self.head_yaw);
        self.item.write(buf, context)?;
        write_varint(buf, self.game_mode);
        write_entity_metadata(buf, &self.metadata);
        self.adventure_settings.write(buf);
        write_entity_links(buf, &self.links);
        write_string(buf, &self.device_id);
        write_i32_le(buf, self.build_platform);
        Ok(())
    }

    pub fn read<B: Buf>(buf: &mut B, context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            uuid: read_uuid(buf)?,
            username: read_string(buf)?,
            actor_unique_id: read_actor_unique_id(buf)?,
            actor_runtime_id: read_actor_runtime_id(buf)?,
            platform_chat_id: read_string(buf)?,
            position: read_vec3(buf)?,
            motion: read_vec3(buf)?,
            pitch: read_f32_le(buf)?,
            yaw: read_f32_le(buf)?,
            head_yaw: read_f32_le(buf)?,
            item: ItemStackWrapper::read(buf, context)?,
            game_mode: read_varint(buf)?,
            metadata: read_entity_metadata(buf)?,
            adventure_settings: AdventureSettingsPacket::read(buf)?,
            links: read_entity_links(buf)?,
            device_id: read_string(buf)?,
            build_platform: read_i32_le(buf)?,
        })
    }
}
