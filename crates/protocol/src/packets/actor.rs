//! Actor spawn and state packets

use super::DataPacket;
use crate::codecs::*;
use crate::context::SerializerContext;
use crate::info::PacketKind;
use crate::types::entity::*;
use crate::types::{AbilitiesData, ItemStackWrapper};
use bytes::{Buf, BytesMut};
use protobridge_core::{BridgeError, Result, Vector3};
use uuid::Uuid;

/// Spawn a non-player actor
///
/// # Format
/// ```text
/// {VARLONG unique id}{UVARLONG runtime id}{STRING type}
/// {VEC3 position}{VEC3 motion}{F32 pitch}{F32 yaw}{F32 head yaw}{F32 body yaw}
/// {attributes}{metadata}{links}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AddActorPacket {
    pub actor_unique_id: i64,
    pub actor_runtime_id: u64,
    pub actor_type: String,
    pub position: Vector3,
    /// Written as zero when absent
    pub motion: Option<Vector3>,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub body_yaw: f32,
    pub attributes: Vec<Attribute>,
    pub metadata: EntityMetadata,
    pub links: Vec<EntityLink>,
}

impl DataPacket for AddActorPacket {
    const KIND: PacketKind = PacketKind::AddActor;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_actor_unique_id(buf, self.actor_unique_id);
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_string(buf, &self.actor_type);
        write_vec3(buf, self.position);
        write_vec3_nullable(buf, self.motion);
        write_f32_le(buf, self.pitch);
        write_f32_le(buf, self.yaw);
        write_f32_le(buf, self.head_yaw);
        write_f32_le(buf, self.body_yaw);
        write_spawn_attributes(buf, &self.attributes);
        write_entity_metadata(buf, &self.metadata);
        write_entity_links(buf, &self.links);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            actor_unique_id: read_actor_unique_id(buf)?,
            actor_runtime_id: read_actor_runtime_id(buf)?,
            actor_type: read_string(buf)?,
            position: read_vec3(buf)?,
            motion: Some(read_vec3(buf)?),
            pitch: read_f32_le(buf)?,
            yaw: read_f32_le(buf)?,
            head_yaw: read_f32_le(buf)?,
            body_yaw: read_f32_le(buf)?,
            attributes: read_spawn_attributes(buf)?,
            metadata: read_entity_metadata(buf)?,
            links: read_entity_links(buf)?,
        })
    }
}

/// Spawn another player
///
/// # Format
/// ```text
/// {UUID}{STRING username}{UVARLONG runtime id}{STRING platform chat id}
/// {VEC3 position}{VEC3 motion}{F32 pitch}{F32 yaw}{F32 head yaw}
/// {item stack wrapper}{VARINT game mode}{metadata}{abilities data}{links}
/// {STRING device id}{I32 LE build platform}
/// ```
///
/// The player's unique id only travels inside the abilities data.
#[derive(Debug, Clone, PartialEq)]
pub struct AddPlayerPacket {
    pub uuid: Uuid,
    pub username: String,
    pub actor_runtime_id: u64,
    pub platform_chat_id: String,
    pub position: Vector3,
    pub motion: Option<Vector3>,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub item: ItemStackWrapper,
    pub game_mode: i32,
    pub metadata: EntityMetadata,
    /// Required; a player spawn without abilities is a producer bug
    pub abilities: Option<AbilitiesData>,
    pub links: Vec<EntityLink>,
    pub device_id: String,
    pub build_platform: i32,
}

impl DataPacket for AddPlayerPacket {
    const KIND: PacketKind = PacketKind::AddPlayer;

    fn encode(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        let abilities = self.abilities.as_ref().ok_or_else(|| {
            BridgeError::MalformedInput(format!("Player {} spawned without abilities", self.username))
        })?;
        abilities.validate()?;
        write_uuid(buf, &self.uuid);
        write_string(buf, &self.username);
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_string(buf, &self.platform_chat_id);
        write_vec3(buf, self.position);
        write_vec3_nullable(buf, self.motion);
        write_f32_le(buf, self.pitch);
        write_f32_le(buf, self.yaw);
        write_f32_le(buf, self.head_yaw);
        self.item.write(buf, context)?;
        write_varint(buf, self.game_mode);
        write_entity_metadata(buf, &self.metadata);
        abilities.write(buf);
        write_entity_links(buf, &self.links);
        write_string(buf, &self.device_id);
        write_i32_le(buf, self.build_platform);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            uuid: read_uuid(buf)?,
            username: read_string(buf)?,
            actor_runtime_id: read_actor_runtime_id(buf)?,
            platform_chat_id: read_string(buf)?,
            position: read_vec3(buf)?,
            motion: Some(read_vec3(buf)?),
            pitch: read_f32_le(buf)?,
            yaw: read_f32_le(buf)?,
            head_yaw: read_f32_le(buf)?,
            item: ItemStackWrapper::read(buf, context)?,
            game_mode: read_varint(buf)?,
            metadata: read_entity_metadata(buf)?,
            abilities: Some(AbilitiesData::read(buf)?),
            links: read_entity_links(buf)?,
            device_id: read_string(buf)?,
            build_platform: read_i32_le(buf)?,
        })
    }
}

/// `{UVARLONG runtime id}{full attributes}{UVARLONG tick}`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAttributesPacket {
    pub actor_runtime_id: u64,
    pub attributes: Vec<Attribute>,
    pub tick: u64,
}

impl DataPacket for UpdateAttributesPacket {
    const KIND: PacketKind = PacketKind::UpdateAttributes;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_update_attributes(buf, &self.attributes);
        write_uvarlong(buf, self.tick);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            actor_runtime_id: read_actor_runtime_id(buf)?,
            attributes: read_update_attributes(buf)?,
            tick: read_uvarlong(buf)?,
        })
    }
}

/// `{UVARLONG runtime id}{metadata}{UVARLONG tick}`
#[derive(Debug, Clone, PartialEq)]
pub struct SetActorDataPacket {
    pub actor_runtime_id: u64,
    pub metadata: EntityMetadata,
    pub tick: u64,
}

impl DataPacket for SetActorDataPacket {
    const KIND: PacketKind = PacketKind::SetActorData;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_actor_runtime_id(buf, self.actor_runtime_id);
        write_entity_metadata(buf, &self.metadata);
        write_uvarlong(buf, self.tick);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self {
            actor_runtime_id: read_actor_runtime_id(buf)?,
            metadata: read_entity_metadata(buf)?,
            tick: read_uvarlong(buf)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ItemTypeDictionary;

    #[test]
    fn test_add_actor_missing_motion_is_zero() {
        let context = SerializerContext::new(ItemTypeDictionary::default());
        let mut buf = BytesMut::new();
        fixtures::zombie().encode(&mut buf, &context).unwrap();

        let decoded = AddActorPacket::decode(&mut buf, &context).unwrap();
        assert_eq!(decoded.motion, Some(Vector3::ZERO));
        assert_eq!(decoded.body_yaw, 30.0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_add_player_roundtrip_through_context() {
        let context = SerializerContext::new(ItemTypeDictionary::vanilla_subset());
        let mut player = fixtures::steve();
        let mut buf = BytesMut::new();
        player.encode(&mut buf, &context).unwrap();

        player.motion = Some(Vector3::ZERO);
        assert_eq!(AddPlayerPacket::decode(&mut buf, &context).unwrap(), player);
    }

    #[test]
    fn test_add_player_without_abilities_is_malformed() {
        let context = SerializerContext::new(ItemTypeDictionary::vanilla_subset());
        let mut player = fixtures::steve();
        player.abilities = None;
        let err = player.encode(&mut BytesMut::new(), &context).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedInput(_)));
    }
}
