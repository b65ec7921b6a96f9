//! Start game translation

use super::expect_variant;
use crate::legacy::{LegacyLevelSettings, LegacyPacket};
use crate::packets::ClientboundPacket;
use protobridge_core::Result;

pub(super) fn translate_start_game(packet: &ClientboundPacket) -> Result<LegacyPacket> {
    let packet = expect_variant!(packet, StartGame);
    Ok(LegacyPacket::StartGame(Box::new(
        packet.map_level_settings(|settings| LegacyLevelSettings::from(settings)),
    )))
}
