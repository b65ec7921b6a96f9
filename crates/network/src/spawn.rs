//! Pre-spawn sequence
//!
//! Builds the start game packet from host snapshots and answers the client's
//! chunk radius request. The order of the sequence itself lives in
//! [`SessionBehaviour::begin_spawn_sequence`](crate::behaviour::SessionBehaviour::begin_spawn_sequence).

use crate::host::{PlayerSnapshot, WorldSnapshot};
use crate::session::{NetworkSession, SessionStage};
use protobridge_core::Result;
use protobridge_protocol::nbt::CacheableNbt;
use protobridge_protocol::packets::{ChunkRadiusUpdatedPacket, RequestChunkRadiusPacket, StartGamePacket};
use protobridge_protocol::types::level::MOVEMENT_SERVER_AUTHORITATIVE;
use protobridge_protocol::types::{
    Experiments, GameRule, GameRuleValue, LevelSettings, PlayerMovementSettings, SpawnSettings,
};
use protobridge_protocol::SerializerContext;
use uuid::Uuid;

/// Server software string sent in start game
pub const SERVER_SOFTWARE: &str = concat!("Protobridge ", env!("CARGO_PKG_VERSION"));

pub fn build_level_settings(world: &WorldSnapshot) -> LevelSettings {
    let mut settings = LevelSettings::default();
    settings.world.seed = -1;
    settings.world.spawn_settings = SpawnSettings::default();
    settings.world.world_game_mode = world.server_game_mode.to_protocol();
    settings.world.difficulty = world.difficulty;
    settings.world.spawn_position = world.spawn_position;
    settings.world.achievements_disabled = true;

    settings.options.time = world.time;
    settings.options.edu_edition_offer = 0;
    settings.options.rain_level = 0.0;
    settings.options.lightning_level = 0.0;
    settings.options.commands_enabled = true;
    // client-side regeneration off, the server heals
    settings.options.game_rules = vec![GameRule::new("naturalregeneration", false, GameRuleValue::Bool(false))];
    settings.options.experiments = Experiments::default();
    settings
}

pub fn build_start_game(player: &PlayerSnapshot, world: &WorldSnapshot, context: &SerializerContext) -> StartGamePacket {
    StartGamePacket {
        actor_unique_id: player.actor_unique_id,
        actor_runtime_id: player.actor_runtime_id,
        player_game_mode: player.game_mode.to_protocol(),
        player_position: player.position,
        pitch: player.pitch,
        yaw: player.yaw,
        level_settings: build_level_settings(world),
        level_id: String::new(),
        world_name: world.world_name.clone(),
        premium_world_template_id: String::new(),
        is_trial: false,
        player_movement_settings: PlayerMovementSettings {
            movement_type: MOVEMENT_SERVER_AUTHORITATIVE,
            rewind_history_size: 0,
            server_authoritative_block_breaking: false,
        },
        current_tick: world.current_tick,
        enchantment_seed: 0,
        block_palette: Vec::new(),
        item_table: context.item_dictionary().entries().to_vec(),
        multiplayer_correlation_id: String::new(),
        enable_new_inventory_system: false,
        server_software_version: SERVER_SOFTWARE.to_string(),
        player_actor_properties: CacheableNbt::empty_compound(),
        block_palette_checksum: 0,
        world_template_id: Uuid::nil(),
    }
}

/// Answer a chunk radius request, clamped to the world's view distance
pub fn handle_request_chunk_radius(
    session: &mut NetworkSession,
    request: &RequestChunkRadiusPacket,
    world: &WorldSnapshot,
) -> Result<i32> {
    let radius = request.radius.clamp(1, world.max_view_distance.max(1));
    session.set_view_distance(radius);
    session.send_data_packet(ChunkRadiusUpdatedPacket { radius }, false)?;
    if session.stage() == SessionStage::PreSpawn {
        tracing::debug!("Session {} requested chunk radius {}, using {}", session.id(), request.radius, radius);
    }
    Ok(radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures;
    use crate::session::tests::{sent_packets, session_with};
    use protobridge_protocol::{ClientboundPacket, ItemTypeDictionary, NoCompression, CURRENT_PROTOCOL};
    use std::sync::Arc;

    #[test]
    fn test_start_game_from_snapshots() {
        let context = SerializerContext::new(ItemTypeDictionary::vanilla_subset());
        let packet = build_start_game(&fixtures::alex(), &fixtures::world(), &context);
        assert_eq!(packet.actor_runtime_id, 9);
        assert_eq!(packet.level_settings.world.seed, -1);
        assert!(packet.level_settings.world.achievements_disabled);
        assert!(packet.level_settings.options.commands_enabled);
        assert_eq!(packet.level_settings.options.game_rules[0].name, "naturalregeneration");
        assert_eq!(packet.player_movement_settings.movement_type, MOVEMENT_SERVER_AUTHORITATIVE);
        assert_eq!(packet.item_table.len(), context.item_dictionary().entries().len());
    }

    #[test]
    fn test_chunk_radius_is_clamped() {
        let (mut session, sender) = session_with(Some(CURRENT_PROTOCOL), Arc::new(NoCompression));
        let radius =
            handle_request_chunk_radius(&mut session, &RequestChunkRadiusPacket { radius: 32 }, &fixtures::world())
                .unwrap();
        assert_eq!(radius, 8);
        assert_eq!(session.view_distance(), Some(8));

        session.flush_send_buffer(true).unwrap();
        let packets = sent_packets(&sender, &NoCompression);
        assert_eq!(
            ClientboundPacket::decode(packets[0].clone(), session.context()).unwrap(),
            ClientboundPacket::ChunkRadiusUpdated(ChunkRadiusUpdatedPacket { radius: 8 })
        );
    }
}
