//! Actor and player spawn translation

use super::abilities::adventure_settings_from_abilities;
use super::expect_variant;
use crate::legacy::{LegacyAddActorPacket, LegacyAddPlayerPacket, LegacyPacket};
use crate::packets::ClientboundPacket;
use protobridge_core::{BridgeError, Result, Vector3};

/// Head yaw in the legacy layout: the yaw when head yaw is unset (0.0)
#[inline]
pub fn legacy_head_yaw(yaw: f32, head_yaw: f32) -> f32 {
    if head_yaw == 0.0 {
        yaw
    } else {
        head_yaw
    }
}

pub(super) fn translate_add_actor(packet: &ClientboundPacket) -> Result<LegacyPacket> {
    let packet = expect_variant!(packet, AddActor);
    if packet.actor_type.is_empty() {
        return Err(BridgeError::MalformedInput(format!(
            "Actor {} spawned without a type",
            packet.actor_unique_id
        )));
    }
    Ok(LegacyPacket::AddActor(Box::new(LegacyAddActorPacket {
        actor_unique_id: packet.actor_unique_id,
        actor_runtime_id: packet.actor_runtime_id,
        actor_type: packet.actor_type.clone(),
        position: packet.position,
        motion: packet.motion.unwrap_or(Vector3::ZERO),
        pitch: packet.pitch,
        yaw: packet.yaw,
        head_yaw: legacy_head_yaw(packet.yaw, packet.head_yaw),
        attributes: packet.attributes.clone(),
        metadata: packet.metadata.clone(),
        links: packet.links.clone(),
    })))
}

pub(super) fn translate_add_player(packet: &ClientboundPacket) -> Result<LegacyPacket> {
    let packet = expect_variant!(packet, AddPlayer);
    if packet.username.is_empty() {
        return Err(BridgeError::MalformedInput(format!(
            "Player {} spawned without a username",
            packet.uuid
        )));
    }
    let abilities = packet.abilities.as_ref().ok_or_else(|| {
        BridgeError::MalformedInput(format!("Player {} spawned without abilities", packet.username))
    })?;
    abilities.validate()?;

    Ok(LegacyPacket::AddPlayer(Box::new(LegacyAddPlayerPacket {
        uuid: packet.uuid,
        username: packet.username.clone(),
        actor_unique_id: abilities.target_actor_unique_id,
        actor_runtime_id: packet.actor_runtime_id,
        platform_chat_id: packet.platform_chat_id.clone(),
        position: packet.position,
        motion: packet.motion.unwrap_or(Vector3::ZERO),
        pitch: packet.pitch,
        yaw: packet.yaw,
        head_yaw: legacy_head_yaw(packet.yaw, packet.head_yaw),
        item: packet.item.clone(),
        game_mode: packet.game_mode,
        metadata: packet.metadata.clone(),
        adventure_settings: adventure_settings_from_abilities(abilities),
        links: packet.links.clone(),
        device_id: packet.device_id.clone(),
        build_platform: packet.build_platform,
    })))
}
