mod common;

use common::{session, unpack, CountingCompressor, RecordingSender};
use protobridge_core::Vector3;
use protobridge_network::{CompressionPool, NetworkSession, PacketBroadcaster};
use protobridge_protocol::legacy::LegacyPacket;
use protobridge_protocol::packets::{AddActorPacket, SetPlayerGameTypePacket, UpdateAttributesPacket};
use protobridge_protocol::types::{Attribute, EntityMetadata};
use protobridge_protocol::{
    ClientboundPacket, Compressor, ItemTypeDictionary, NoCompression, SerializerContext, TranslationTable,
    CURRENT_PROTOCOL, LEGACY_PROTOCOL,
};
use std::sync::Arc;

fn broadcaster() -> PacketBroadcaster {
    PacketBroadcaster::new(
        Arc::new(TranslationTable::standard()),
        Arc::new(CompressionPool::synchronous()),
    )
}

fn context() -> Arc<SerializerContext> {
    SerializerContext::shared(ItemTypeDictionary::vanilla_subset())
}

fn creeper(yaw: f32, head_yaw: f32) -> AddActorPacket {
    AddActorPacket {
        actor_unique_id: 77,
        actor_runtime_id: 77,
        actor_type: "minecraft:creeper".into(),
        position: Vector3::new(1.0, 70.0, 1.0),
        motion: None,
        pitch: 0.0,
        yaw,
        head_yaw,
        body_yaw: 10.0,
        attributes: Vec::new(),
        metadata: EntityMetadata::new(),
        links: Vec::new(),
    }
}

fn recipients(
    sessions: &mut [(NetworkSession, Arc<RecordingSender>)],
) -> impl Iterator<Item = &mut NetworkSession> {
    sessions.iter_mut().map(|(session, _)| session)
}

#[test]
fn legacy_add_actor_takes_yaw_as_head_yaw() {
    let context = context();
    let compressor: Arc<dyn Compressor> = Arc::new(NoCompression);
    let (mut legacy, sender) = session(1, LEGACY_PROTOCOL, &context, &compressor);

    legacy.send_data_packet(creeper(45.0, 0.0), true).unwrap();

    let packets = unpack(&sender.sent.lock(), &NoCompression);
    assert_eq!(packets.len(), 1);
    let LegacyPacket::AddActor(actor) = LegacyPacket::decode(packets[0].clone(), &context).unwrap() else {
        panic!("expected a legacy add actor");
    };
    assert_eq!(actor.head_yaw, 45.0);
    assert_eq!(actor.yaw, 45.0);
    assert_eq!(actor.motion, Vector3::ZERO);
}

#[test]
fn canonical_add_actor_keeps_body_yaw() {
    let context = context();
    let compressor: Arc<dyn Compressor> = Arc::new(NoCompression);
    let (mut canonical, sender) = session(1, CURRENT_PROTOCOL, &context, &compressor);

    canonical.send_data_packet(creeper(45.0, 0.0), true).unwrap();

    let packets = unpack(&sender.sent.lock(), &NoCompression);
    let ClientboundPacket::AddActor(actor) = ClientboundPacket::decode(packets[0].clone(), &context).unwrap() else {
        panic!("expected a canonical add actor");
    };
    assert_eq!(actor.head_yaw, 0.0);
    assert_eq!(actor.body_yaw, 10.0);
}

#[test]
fn two_contexts_one_codec_give_two_buffers_and_two_compressions() {
    let context_x = context();
    let context_y = context();
    let codec_z = Arc::new(CountingCompressor::default());
    let codec: Arc<dyn Compressor> = codec_z.clone();

    let mut sessions = vec![
        session(1, LEGACY_PROTOCOL, &context_x, &codec),
        session(2, CURRENT_PROTOCOL, &context_x, &codec),
        session(3, LEGACY_PROTOCOL, &context_y, &codec),
    ];
    let packets = vec![
        ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 1 }),
        ClientboundPacket::from(UpdateAttributesPacket {
            actor_runtime_id: 1,
            attributes: vec![Attribute::new("minecraft:health", 0.0, 20.0, 12.0, 20.0)],
            tick: 0,
        }),
    ];

    let report = broadcaster().broadcast_packets(recipients(&mut sessions), &packets);

    assert_eq!(report.buffers, 2);
    assert_eq!(report.compressions, 2);
    assert_eq!(report.translations, 1);
    assert_eq!(report.recipients, 3);
    assert!(report.failed.is_empty());
    assert_eq!(codec_z.calls(), 2);

    for (_, sender) in &sessions {
        let packets = unpack(&sender.sent.lock(), codec.as_ref());
        assert_eq!(packets.len(), 2);
    }
}

#[test]
fn half_legacy_recipients_share_two_buffers() {
    for count in [2, 10, 200] {
        let context = context();
        let codec: Arc<dyn Compressor> = Arc::new(CountingCompressor::default());
        let mut sessions: Vec<_> = (0..count)
            .map(|i| {
                let version = if i % 2 == 0 { LEGACY_PROTOCOL } else { CURRENT_PROTOCOL };
                session(i as u64, version, &context, &codec)
            })
            .collect();

        let packets = vec![ClientboundPacket::from(creeper(90.0, 0.0))];
        let report = broadcaster().broadcast_packets(recipients(&mut sessions), &packets);

        assert_eq!(report.buffers, 2, "{} recipients", count);
        assert_eq!(report.compressions, 2, "{} recipients", count);
        assert_eq!(report.translations, 1);
        assert_eq!(report.recipients, count);
    }
}

#[test]
fn thousands_of_recipients_compress_once() {
    let context = context();
    let counting = Arc::new(CountingCompressor::default());
    let codec: Arc<dyn Compressor> = counting.clone();
    let mut sessions: Vec<_> = (0..3000)
        .map(|i| session(i, CURRENT_PROTOCOL, &context, &codec))
        .collect();

    let packets = vec![ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 0 })];
    let report = broadcaster().broadcast_packets(recipients(&mut sessions), &packets);

    assert_eq!(report.compressions, 1);
    assert_eq!(report.translations, 0);
    assert_eq!(counting.calls(), 1);

    let first = sessions[0].1.sent.lock()[0].clone();
    let last = sessions[2999].1.sent.lock()[0].clone();
    assert_eq!(first, last);
}

#[test]
fn recipient_leaving_does_not_spoil_its_cohort() {
    let context = context();
    let codec: Arc<dyn Compressor> = Arc::new(CountingCompressor::default());
    let mut sessions = vec![
        session(1, LEGACY_PROTOCOL, &context, &codec),
        session(2, LEGACY_PROTOCOL, &context, &codec),
    ];
    sessions[0].0.on_client_disconnect("left");

    let packets = vec![ClientboundPacket::from(creeper(10.0, 20.0))];
    let report = broadcaster().broadcast_packets(recipients(&mut sessions), &packets);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.recipients, 1);
    assert!(sessions[0].1.sent.lock().is_empty());
    let packets = unpack(&sessions[1].1.sent.lock(), codec.as_ref());
    assert!(matches!(
        LegacyPacket::decode(packets[0].clone(), &context).unwrap(),
        LegacyPacket::AddActor(_)
    ));
}

#[test]
fn broadcast_lands_after_earlier_sends() {
    let context = context();
    let codec: Arc<dyn Compressor> = Arc::new(CountingCompressor::default());
    let mut sessions = vec![session(1, CURRENT_PROTOCOL, &context, &codec)];
    sessions[0]
        .0
        .send_data_packet(SetPlayerGameTypePacket { game_mode: 2 }, false)
        .unwrap();

    let packets = vec![ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 1 })];
    broadcaster().broadcast_packets(recipients(&mut sessions), &packets);

    let sent = unpack(&sessions[0].1.sent.lock(), codec.as_ref());
    let modes: Vec<ClientboundPacket> = sent
        .into_iter()
        .map(|packet| ClientboundPacket::decode(packet, &context).unwrap())
        .collect();
    assert_eq!(
        modes,
        vec![
            ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 2 }),
            ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 1 }),
        ]
    );
}

#[test]
fn untranslatable_broadcast_fails_only_the_legacy_cohort() {
    let context = context();
    let codec: Arc<dyn Compressor> = Arc::new(CountingCompressor::default());
    let mut sessions = vec![
        session(1, LEGACY_PROTOCOL, &context, &codec),
        session(2, CURRENT_PROTOCOL, &context, &codec),
    ];
    let mut untyped = creeper(0.0, 0.0);
    untyped.actor_type.clear();

    let report = broadcaster().broadcast_packets(recipients(&mut sessions), &[ClientboundPacket::from(untyped)]);

    assert_eq!(report.translations, 1);
    assert_eq!(report.recipients, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, sessions[0].0.id());
    assert!(report.failed[0].1.contains("without a type"), "{}", report.failed[0].1);

    assert!(sessions[0].1.sent.lock().is_empty());
    let packets = unpack(&sessions[1].1.sent.lock(), codec.as_ref());
    assert!(matches!(
        ClientboundPacket::decode(packets[0].clone(), &context).unwrap(),
        ClientboundPacket::AddActor(_)
    ));
}
