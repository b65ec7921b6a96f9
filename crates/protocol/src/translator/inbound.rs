//! Inbound decoding for legacy clients
//!
//! Legacy clients report a flying toggle through adventure settings, which the
//! canonical protocol expresses as a request to change the flying ability. All
//! other serverbound kinds the bridge looks into share their layout.

use super::abilities::request_ability_from_adventure_settings;
use crate::context::SerializerContext;
use crate::info::PacketKind;
use crate::legacy::AdventureSettingsPacket;
use crate::packets::{ensure_consumed, read_packet_header, ServerboundPacket};
use bytes::Bytes;
use protobridge_core::Result;

/// Decode one packet sent by a legacy client into its canonical form
pub fn decode_legacy_serverbound(mut buf: Bytes, context: &SerializerContext) -> Result<ServerboundPacket> {
    let id = read_packet_header(&mut buf)?;
    if id == PacketKind::AdventureSettings.id() {
        let settings = AdventureSettingsPacket::read(&mut buf)?;
        ensure_consumed(&buf, id)?;
        return Ok(ServerboundPacket::RequestAbility(request_ability_from_adventure_settings(&settings)));
    }
    ServerboundPacket::decode_body(id, buf, context)
}
