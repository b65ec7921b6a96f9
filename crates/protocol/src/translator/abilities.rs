//! Abilities <-> adventure settings mapping
//!
//! Permission levels map 1:1. Boolean abilities of the base layer map onto the
//! adventure settings flags listed in [`ABILITY_FLAGS`]; abilities with no flag
//! (invulnerable, instabuild, lightning) and the speeds are dropped going to
//! legacy and take defaults coming back.

use super::expect_variant;
use crate::legacy::adventure::{self, AdventureSettingsPacket};
use crate::legacy::LegacyPacket;
use crate::packets::{AbilityValue, ClientboundPacket, RequestAbilityPacket};
use crate::types::abilities::*;
use protobridge_core::Result;
use std::collections::BTreeMap;

/// Base-layer ability id and the adventure settings flag carrying it
pub const ABILITY_FLAGS: [(u8, u32); 13] = [
    (ABILITY_BUILD, adventure::BUILD),
    (ABILITY_MINE, adventure::MINE),
    (ABILITY_DOORS_AND_SWITCHES, adventure::DOORS_AND_SWITCHES),
    (ABILITY_OPEN_CONTAINERS, adventure::OPEN_CONTAINERS),
    (ABILITY_ATTACK_PLAYERS, adventure::ATTACK_PLAYERS),
    (ABILITY_ATTACK_MOBS, adventure::ATTACK_MOBS),
    (ABILITY_OPERATOR, adventure::OPERATOR),
    (ABILITY_TELEPORT, adventure::TELEPORT),
    (ABILITY_FLYING, adventure::FLYING),
    (ABILITY_ALLOW_FLIGHT, adventure::ALLOW_FLIGHT),
    (ABILITY_NO_CLIP, adventure::NO_CLIP),
    (ABILITY_WORLD_BUILDER, adventure::WORLD_BUILDER),
    (ABILITY_MUTED, adventure::MUTED),
];

pub fn adventure_settings_from_abilities(data: &AbilitiesData) -> AdventureSettingsPacket {
    let mut settings = AdventureSettingsPacket::new(
        data.command_permission,
        data.player_permission,
        data.target_actor_unique_id,
    );
    if let Some(base) = data.base_layer() {
        for (ability, flag) in ABILITY_FLAGS {
            settings.set_flag(flag, base.ability(ability));
        }
    }
    settings
}

pub fn abilities_from_adventure_settings(settings: &AdventureSettingsPacket) -> AbilitiesData {
    let bool_abilities: BTreeMap<u8, bool> = ABILITY_FLAGS
        .into_iter()
        .map(|(ability, flag)| (ability, settings.get_flag(flag)))
        .collect();
    AbilitiesData::new(
        settings.command_permission,
        settings.player_permission,
        settings.target_actor_unique_id,
        vec![AbilitiesLayer::new(
            LAYER_BASE,
            bool_abilities,
            Some(DEFAULT_FLY_SPEED),
            Some(DEFAULT_WALK_SPEED),
        )],
    )
}

pub(super) fn translate_update_abilities(packet: &ClientboundPacket) -> Result<LegacyPacket> {
    let packet = expect_variant!(packet, UpdateAbilities);
    packet.data.validate()?;
    Ok(LegacyPacket::AdventureSettings(adventure_settings_from_abilities(&packet.data)))
}

/// Canonical counterpart of a flying toggle sent by a legacy client
pub fn request_ability_from_adventure_settings(settings: &AdventureSettingsPacket) -> RequestAbilityPacket {
    RequestAbilityPacket {
        ability_id: ABILITY_FLYING as i32,
        value: AbilityValue::Bool(settings.get_flag(adventure::FLYING)),
    }
}
