//! A single flat lobby world
//!
//! The bundled host: every player spawns at the same point, nothing is
//! persisted, and inbound game packets are only logged.

use parking_lot::Mutex;
use protobridge_core::{BlockPosition, ConnectionId, GameMode, Result, Vector3};
use protobridge_network::{GameHost, HostBindings, InventorySync, PlayerInfo, PlayerSnapshot, WorldSnapshot};
use protobridge_protocol::packets::ServerboundPacket;
use protobridge_protocol::types::{Attribute, EntityMetadata};
use protobridge_protocol::ClientboundPacket;
use std::collections::HashMap;
use std::sync::Arc;

const SPAWN: BlockPosition = BlockPosition::new(0, 64, 0);

#[derive(Debug, Default)]
struct EmptyInventory;

impl InventorySync for EmptyInventory {
    fn sync_all(&self) -> Vec<ClientboundPacket> {
        Vec::new()
    }

    fn sync_creative(&self) -> Vec<ClientboundPacket> {
        Vec::new()
    }

    fn sync_selected_hotbar_slot(&self) -> Vec<ClientboundPacket> {
        Vec::new()
    }
}

#[derive(Debug)]
pub struct Lobby {
    name: String,
    game_mode: GameMode,
    max_view_distance: i32,
    online: Mutex<HashMap<ConnectionId, String>>,
}

impl Lobby {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            game_mode: GameMode::Creative,
            max_view_distance: 8,
            online: Mutex::new(HashMap::new()),
        }
    }

    pub fn online_count(&self) -> usize {
        self.online.lock().len()
    }

    fn spawn_attributes() -> Vec<Attribute> {
        vec![
            Attribute::new("minecraft:health", 0.0, 20.0, 20.0, 20.0),
            Attribute::new("minecraft:movement", 0.0, f32::MAX, 0.1, 0.1),
            Attribute::new("minecraft:player.hunger", 0.0, 20.0, 20.0, 20.0),
        ]
    }
}

impl GameHost for Lobby {
    fn create_player(&self, connection: ConnectionId, info: &PlayerInfo) -> Result<HostBindings> {
        self.online.lock().insert(connection, info.username.clone());
        tracing::info!(
            "{} joined the lobby ({} online, language {})",
            info.username,
            self.online_count(),
            info.language_code().unwrap_or("unknown")
        );

        let player = PlayerSnapshot {
            actor_unique_id: connection.get() as i64,
            actor_runtime_id: connection.get(),
            username: info.username.clone(),
            game_mode: self.game_mode,
            position: Vector3::new(SPAWN.x as f32 + 0.5, SPAWN.y as f32 + 1.62, SPAWN.z as f32 + 0.5),
            pitch: 0.0,
            yaw: 0.0,
            is_operator: false,
            auto_jump: true,
            allow_flight: self.game_mode == GameMode::Creative,
            has_block_collision: true,
            flying: false,
            attributes: Self::spawn_attributes(),
            metadata: EntityMetadata::new(),
        };
        Ok(HostBindings::new(player, Arc::new(EmptyInventory)))
    }

    fn world(&self, _connection: ConnectionId) -> WorldSnapshot {
        WorldSnapshot {
            world_name: self.name.clone(),
            server_game_mode: self.game_mode,
            difficulty: 1,
            spawn_position: SPAWN,
            time: 6000,
            current_tick: 0,
            max_view_distance: self.max_view_distance,
        }
    }

    fn handle_game_packet(
        &self,
        connection: ConnectionId,
        packet: ServerboundPacket,
    ) -> Result<Vec<ClientboundPacket>> {
        tracing::trace!("Session {} sent packet 0x{:02x}", connection, packet.id());
        Ok(Vec::new())
    }

    fn on_disconnect(&self, connection: ConnectionId, reason: &str) {
        if let Some(username) = self.online.lock().remove(&connection) {
            tracing::info!("{} left the lobby: {}", username, reason);
        }
    }
}
