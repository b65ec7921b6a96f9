//! Version-dependent session procedures
//!
//! Game mode, adventure settings, abilities, respawn and spawn are the same
//! policy for both protocol generations but emit different packet kinds. The
//! variant is chosen once, when the handshake stores the protocol version.
//!
//! | procedure               | canonical                               | legacy                         |
//! |-------------------------|-----------------------------------------|--------------------------------|
//! | sync_adventure_settings | UpdateAdventureSettings                 | AdventureSettings from player  |
//! | sync_abilities          | UpdateAbilities                         | AdventureSettings from player  |
//! | start_game              | StartGame                               | legacy StartGame               |
//! | spawn sequence          | adventure settings, then abilities      | adventure settings only        |

use crate::host::{PlayerSnapshot, WorldSnapshot};
use crate::protocol_state::ProtocolState;
use crate::session::{NetworkSession, SessionStage};
use crate::spawn::build_start_game;
use protobridge_core::{BridgeError, GameMode, Result};
use protobridge_protocol::legacy::adventure::{self, AdventureSettingsPacket};
use protobridge_protocol::legacy::LegacyLevelSettings;
use protobridge_protocol::packets::{
    SetActorDataPacket, SetPlayerGameTypePacket, UpdateAbilitiesPacket, UpdateAdventureSettingsPacket,
    UpdateAttributesPacket,
};
use protobridge_protocol::types::{CommandPermissions, PlayerPermissions};
use protobridge_protocol::{ClientboundPacket, LegacyPacket, OutboundPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBehaviour {
    Canonical,
    Legacy,
}

impl SessionBehaviour {
    /// # Panics
    /// If the version is not negotiated yet.
    pub fn for_state(state: &ProtocolState) -> Self {
        if state.is_legacy() {
            Self::Legacy
        } else {
            Self::Canonical
        }
    }

    pub fn sync_game_mode(self, session: &mut NetworkSession, mode: GameMode, is_rollback: bool) -> Result<()> {
        session.send_data_packet(
            SetPlayerGameTypePacket {
                game_mode: mode.to_protocol(),
            },
            false,
        )?;
        if session.bindings().is_some() {
            if self == Self::Canonical {
                self.sync_abilities(session)?;
            }
            self.sync_adventure_settings(session)?;
        }
        if !is_rollback {
            if let Some(inventory) = session.bindings().map(|bindings| bindings.inventory.clone()) {
                send_all(session, inventory.sync_creative())?;
            }
        }
        Ok(())
    }

    pub fn sync_adventure_settings(self, session: &mut NetworkSession) -> Result<()> {
        let player = require_player(session, "sync adventure settings")?;
        match self {
            Self::Canonical => {
                let spectator = player.is_spectator();
                let packet = UpdateAdventureSettingsPacket {
                    no_attacking_mobs: spectator,
                    no_attacking_players: spectator,
                    world_immutable: spectator,
                    show_name_tags: true,
                    auto_jump: player.auto_jump,
                };
                session.send_data_packet(packet, false)
            }
            Self::Legacy => {
                let packet = legacy_adventure_settings(player);
                session.add_prepared_to_send_buffer(OutboundPacket::Legacy(LegacyPacket::AdventureSettings(packet)));
                Ok(())
            }
        }
    }

    /// Legacy clients have no abilities packet; their abilities travel in the
    /// adventure settings.
    pub fn sync_abilities(self, session: &mut NetworkSession) -> Result<()> {
        match self {
            Self::Canonical => {
                let data = require_player(session, "sync abilities")?.abilities();
                session.send_data_packet(UpdateAbilitiesPacket { data }, false)
            }
            Self::Legacy => self.sync_adventure_settings(session),
        }
    }

    pub fn on_server_respawn(self, session: &mut NetworkSession) -> Result<()> {
        require_player(session, "respawn")?;
        sync_attributes(session)?;
        sync_actor_data(session)?;
        if self == Self::Canonical {
            self.sync_abilities(session)?;
        }
        self.sync_adventure_settings(session)?;
        if let Some(inventory) = session.bindings().map(|bindings| bindings.inventory.clone()) {
            send_all(session, inventory.sync_all())?;
        }
        session.set_stage(SessionStage::InGame);
        Ok(())
    }

    pub fn start_game(self, session: &mut NetworkSession, world: &WorldSnapshot) -> Result<()> {
        let packet = build_start_game(require_player(session, "start game")?, world, session.context());
        match self {
            Self::Canonical => session.send_data_packet(packet, false),
            Self::Legacy => {
                let legacy = packet.map_level_settings(|settings| LegacyLevelSettings::from(settings));
                session.add_prepared_to_send_buffer(OutboundPacket::Legacy(LegacyPacket::StartGame(Box::new(legacy))));
                Ok(())
            }
        }
    }

    /// Send everything a client needs before it requests chunks
    pub fn begin_spawn_sequence(self, session: &mut NetworkSession, world: &WorldSnapshot) -> Result<()> {
        self.start_game(session, world)?;
        sync_attributes(session)?;
        self.sync_adventure_settings(session)?;
        if self == Self::Canonical {
            self.sync_abilities(session)?;
        }
        sync_actor_data(session)?;
        if let Some(inventory) = session.bindings().map(|bindings| bindings.inventory.clone()) {
            send_all(session, inventory.sync_all())?;
            send_all(session, inventory.sync_creative())?;
            send_all(session, inventory.sync_selected_hotbar_slot())?;
        }
        session.set_stage(SessionStage::PreSpawn);
        tracing::debug!("Session {} waiting for chunk radius request", session.id());
        Ok(())
    }
}

/// Legacy adventure settings for a player's current state
pub fn legacy_adventure_settings(player: &PlayerSnapshot) -> AdventureSettingsPacket {
    let (command_permission, player_permission) = if player.is_operator {
        (CommandPermissions::Operator, PlayerPermissions::Operator)
    } else {
        (CommandPermissions::Normal, PlayerPermissions::Member)
    };
    let mut packet = AdventureSettingsPacket::new(command_permission, player_permission, player.actor_unique_id);
    packet.set_flag(adventure::WORLD_IMMUTABLE, player.is_spectator());
    packet.set_flag(adventure::NO_PVP, player.is_spectator());
    packet.set_flag(adventure::AUTO_JUMP, player.auto_jump);
    packet.set_flag(adventure::ALLOW_FLIGHT, player.allow_flight);
    packet.set_flag(adventure::NO_CLIP, !player.has_block_collision);
    packet.set_flag(adventure::FLYING, player.flying);
    packet
}

fn require_player<'a>(session: &'a NetworkSession, action: &str) -> Result<&'a PlayerSnapshot> {
    session
        .player()
        .map_err(|_| BridgeError::InvalidState(format!("Cannot {} for a player that is not yet created", action)))
}

fn sync_attributes(session: &mut NetworkSession) -> Result<()> {
    let player = session.player()?;
    let packet = UpdateAttributesPacket {
        actor_runtime_id: player.actor_runtime_id,
        attributes: player.attributes.clone(),
        tick: 0,
    };
    session.send_data_packet(packet, false)
}

fn sync_actor_data(session: &mut NetworkSession) -> Result<()> {
    let player = session.player()?;
    let packet = SetActorDataPacket {
        actor_runtime_id: player.actor_runtime_id,
        metadata: player.metadata.clone(),
        tick: 0,
    };
    session.send_data_packet(packet, false)
}

fn send_all(session: &mut NetworkSession, packets: Vec<ClientboundPacket>) -> Result<()> {
    for packet in packets {
        session.send_data_packet(packet, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures;
    use crate::session::tests::{sent_packets, session_with, RecordingSender};
    use protobridge_protocol::info::PacketKind;
    use protobridge_protocol::packets::read_packet_header;
    use protobridge_protocol::{NoCompression, CURRENT_PROTOCOL, LEGACY_PROTOCOL};
    use std::sync::Arc;

    fn spawned(version: u32) -> (NetworkSession, Arc<RecordingSender>) {
        let (mut session, sender) = session_with(Some(version), Arc::new(NoCompression));
        session.attach_bindings(fixtures::bindings(fixtures::alex()));
        (session, sender)
    }

    fn sent_ids(session: &mut NetworkSession, sender: &RecordingSender) -> Vec<u32> {
        session.flush_send_buffer(true).unwrap();
        sent_packets(sender, &NoCompression)
            .into_iter()
            .map(|mut packet| read_packet_header(&mut packet).unwrap())
            .collect()
    }

    #[test]
    fn test_behaviour_follows_version() {
        let (canonical, _) = session_with(Some(CURRENT_PROTOCOL), Arc::new(NoCompression));
        let (legacy, _) = session_with(Some(LEGACY_PROTOCOL), Arc::new(NoCompression));
        assert_eq!(canonical.behaviour().unwrap(), SessionBehaviour::Canonical);
        assert_eq!(legacy.behaviour().unwrap(), SessionBehaviour::Legacy);
    }

    #[test]
    fn test_legacy_adventure_settings_flags() {
        let mut player = fixtures::alex();
        player.is_operator = true;
        player.game_mode = GameMode::Spectator;
        player.has_block_collision = false;
        let packet = legacy_adventure_settings(&player);
        assert_eq!(packet.command_permission, CommandPermissions::Operator);
        assert_eq!(packet.player_permission, PlayerPermissions::Operator);
        assert!(packet.get_flag(adventure::WORLD_IMMUTABLE));
        assert!(packet.get_flag(adventure::NO_PVP));
        assert!(packet.get_flag(adventure::AUTO_JUMP));
        assert!(packet.get_flag(adventure::NO_CLIP));
        assert!(!packet.get_flag(adventure::FLYING));
        assert_eq!(packet.target_actor_unique_id, 9);
    }

    #[test]
    fn test_canonical_game_mode_sync() {
        let (mut session, sender) = spawned(CURRENT_PROTOCOL);
        SessionBehaviour::Canonical
            .sync_game_mode(&mut session, GameMode::Creative, false)
            .unwrap();
        assert_eq!(
            sent_ids(&mut session, &sender),
            vec![
                PacketKind::SetPlayerGameType.id(),
                PacketKind::UpdateAbilities.id(),
                PacketKind::UpdateAdventureSettings.id(),
            ]
        );
    }

    #[test]
    fn test_legacy_abilities_become_adventure_settings() {
        let (mut session, sender) = spawned(LEGACY_PROTOCOL);
        SessionBehaviour::Legacy.sync_abilities(&mut session).unwrap();
        assert_eq!(sent_ids(&mut session, &sender), vec![PacketKind::AdventureSettings.id()]);
    }

    #[test]
    fn test_legacy_spawn_sequence_skips_abilities() {
        let (mut session, sender) = spawned(LEGACY_PROTOCOL);
        SessionBehaviour::Legacy
            .begin_spawn_sequence(&mut session, &fixtures::world())
            .unwrap();
        assert_eq!(session.stage(), SessionStage::PreSpawn);
        assert_eq!(
            sent_ids(&mut session, &sender),
            vec![
                PacketKind::StartGame.id(),
                PacketKind::UpdateAttributes.id(),
                PacketKind::AdventureSettings.id(),
                PacketKind::SetActorData.id(),
            ]
        );
    }

    #[test]
    fn test_canonical_respawn() {
        let (mut session, sender) = spawned(CURRENT_PROTOCOL);
        SessionBehaviour::Canonical.on_server_respawn(&mut session).unwrap();
        assert_eq!(session.stage(), SessionStage::InGame);
        assert_eq!(
            sent_ids(&mut session, &sender),
            vec![
                PacketKind::UpdateAttributes.id(),
                PacketKind::SetActorData.id(),
                PacketKind::UpdateAbilities.id(),
                PacketKind::UpdateAdventureSettings.id(),
            ]
        );
    }

    #[test]
    fn test_respawn_without_player_fails() {
        let (mut session, _) = session_with(Some(LEGACY_PROTOCOL), Arc::new(NoCompression));
        assert!(matches!(
            SessionBehaviour::Legacy.on_server_respawn(&mut session),
            Err(BridgeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_legacy_procedures_after_disconnect_buffer_nothing() {
        let (mut session, sender) = spawned(LEGACY_PROTOCOL);
        session.disconnect("Kicked");
        let sent = sender.sent.lock().len();

        let behaviour = session.behaviour().unwrap();
        behaviour.sync_adventure_settings(&mut session).unwrap();
        behaviour.start_game(&mut session, &fixtures::world()).unwrap();
        assert_eq!(session.send_buffer_len(), 0);
        session.tick().unwrap();
        assert_eq!(sender.sent.lock().len(), sent);
    }
}
