//! Host collaborators
//!
//! The bridge does not own game state. The host hands it explicit snapshots
//! and handles through [`HostBindings`] when a player is created, and receives
//! inbound game packets and lifecycle notifications through [`GameHost`].

use crate::handshake::{LoginOutcome, PlayerInfo, VerificationRequest};
use async_trait::async_trait;
use protobridge_core::{BlockPosition, ConnectionId, GameMode, Result, Vector3};
use protobridge_protocol::packets::ServerboundPacket;
use protobridge_protocol::types::abilities::*;
use protobridge_protocol::types::{Attribute, EntityMetadata};
use protobridge_protocol::ClientboundPacket;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Player state the bridge reads when building packets
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub actor_unique_id: i64,
    pub actor_runtime_id: u64,
    pub username: String,
    pub game_mode: GameMode,
    pub position: Vector3,
    pub pitch: f32,
    pub yaw: f32,
    pub is_operator: bool,
    pub auto_jump: bool,
    pub allow_flight: bool,
    pub has_block_collision: bool,
    pub flying: bool,
    pub attributes: Vec<Attribute>,
    pub metadata: EntityMetadata,
}

impl PlayerSnapshot {
    pub fn is_spectator(&self) -> bool {
        self.game_mode == GameMode::Spectator
    }

    /// Canonical abilities for the player's current state
    pub fn abilities(&self) -> AbilitiesData {
        let spectator = self.is_spectator();
        let creative = self.game_mode == GameMode::Creative;
        let bool_abilities: BTreeMap<u8, bool> = [
            (ABILITY_BUILD, !spectator),
            (ABILITY_MINE, !spectator),
            (ABILITY_DOORS_AND_SWITCHES, !spectator),
            (ABILITY_OPEN_CONTAINERS, !spectator),
            (ABILITY_ATTACK_PLAYERS, !spectator),
            (ABILITY_ATTACK_MOBS, !spectator),
            (ABILITY_OPERATOR, self.is_operator),
            (ABILITY_TELEPORT, self.is_operator),
            (ABILITY_INVULNERABLE, creative),
            (ABILITY_FLYING, self.flying),
            (ABILITY_ALLOW_FLIGHT, self.allow_flight),
            (ABILITY_INFINITE_RESOURCES, creative),
            (ABILITY_LIGHTNING, false),
            (ABILITY_MUTED, false),
            (ABILITY_WORLD_BUILDER, false),
            (ABILITY_NO_CLIP, !self.has_block_collision),
        ]
        .into_iter()
        .collect();

        let (command_permission, player_permission) = if self.is_operator {
            (CommandPermissions::Operator, PlayerPermissions::Operator)
        } else {
            (CommandPermissions::Normal, PlayerPermissions::Member)
        };
        AbilitiesData::new(
            command_permission,
            player_permission,
            self.actor_unique_id,
            vec![AbilitiesLayer::new(
                LAYER_BASE,
                bool_abilities,
                Some(DEFAULT_FLY_SPEED),
                Some(DEFAULT_WALK_SPEED),
            )],
        )
    }
}

/// World state the start game packet is built from
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub world_name: String,
    pub server_game_mode: GameMode,
    pub difficulty: i32,
    pub spawn_position: BlockPosition,
    pub time: i32,
    pub current_tick: i64,
    pub max_view_distance: i32,
}

/// Sync packets of a player's inventory manager
pub trait InventorySync: Send + Sync + fmt::Debug {
    fn sync_all(&self) -> Vec<ClientboundPacket>;

    fn sync_creative(&self) -> Vec<ClientboundPacket>;

    fn sync_selected_hotbar_slot(&self) -> Vec<ClientboundPacket>;
}

/// What a session holds of its player once the host created it
#[derive(Debug, Clone)]
pub struct HostBindings {
    pub player: PlayerSnapshot,
    pub inventory: Arc<dyn InventorySync>,
}

impl HostBindings {
    pub fn new(player: PlayerSnapshot, inventory: Arc<dyn InventorySync>) -> Self {
        Self { player, inventory }
    }
}

/// The game server behind the bridge
pub trait GameHost: Send + Sync {
    /// Create the player for a verified login
    fn create_player(&self, connection: ConnectionId, info: &PlayerInfo) -> Result<HostBindings>;

    fn world(&self, connection: ConnectionId) -> WorldSnapshot;

    /// Inbound packet in canonical form, after the bridge's own handling
    ///
    /// The returned packets are sent to the same session. `InvalidData` and
    /// `Protocol` errors are treated as bad packets.
    fn handle_game_packet(&self, connection: ConnectionId, packet: ServerboundPacket)
        -> Result<Vec<ClientboundPacket>>;

    /// Called once for every session that had a player, whoever closed it
    fn on_disconnect(&self, connection: ConnectionId, reason: &str);
}

/// Identity chain verification, run off the tick thread
#[async_trait]
pub trait LoginVerifier: Send + Sync {
    async fn verify(&self, request: VerificationRequest) -> Result<LoginOutcome>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_abilities() {
        let mut player = fixtures::alex();
        player.is_operator = true;
        player.flying = true;
        let abilities = player.abilities();
        assert_eq!(abilities.command_permission, CommandPermissions::Operator);
        assert_eq!(abilities.player_permission, PlayerPermissions::Operator);
        assert_eq!(abilities.target_actor_unique_id, 9);
        let base = abilities.base_layer().unwrap();
        assert!(base.ability(ABILITY_OPERATOR));
        assert!(base.ability(ABILITY_FLYING));
        assert!(!base.ability(ABILITY_NO_CLIP));
    }

    #[test]
    fn test_spectator_cannot_build() {
        let mut player = fixtures::alex();
        player.game_mode = GameMode::Spectator;
        let abilities = player.abilities();
        assert_eq!(abilities.player_permission, PlayerPermissions::Member);
        assert!(!abilities.base_layer().unwrap().ability(ABILITY_BUILD));
    }
}
