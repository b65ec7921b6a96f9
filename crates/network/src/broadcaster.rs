//! Broadcast batching
//!
//! Sends one canonical packet list to many sessions with the least work:
//!
//! 1. Recipients are grouped by (serializer context, compressor), both compared
//!    by `Arc` identity.
//! 2. The list is translated at most once per call, on the first legacy
//!    recipient. A legacy recipient shares the canonical buffer when
//!    translation changed nothing.
//! 3. Each (context, schema) pair is serialized once.
//! 4. Each serialized buffer is compressed once per compressor, and the same
//!    promise is queued on every recipient of the group.
//!
//! Every cache lives on the stack of one [`PacketBroadcaster::broadcast_packets`]
//! call.

use crate::compression_pool::CompressionPool;
use crate::session::NetworkSession;
use protobridge_core::ConnectionId;
use protobridge_protocol::{
    compressor_identity, ClientboundPacket, Compressor, OutboundPacket, PacketBatch, SerializerContext,
    TranslatedBatch, TranslationTable,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Wire layout a buffer was serialized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Schema {
    Canonical,
    Legacy,
}

/// What one broadcast did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Distinct serialized buffers
    pub buffers: usize,
    /// Translation passes over the packet list (0 or 1)
    pub translations: usize,
    /// Compression jobs submitted
    pub compressions: usize,
    /// Sessions that got the packets
    pub recipients: usize,
    /// Disconnected or not yet negotiated sessions
    pub skipped: usize,
    /// Sessions that could not be served, with the reason
    pub failed: Vec<(ConnectionId, String)>,
}

struct BatchGroup<'s> {
    context: Arc<SerializerContext>,
    compressor: Arc<dyn Compressor>,
    canonical: Vec<&'s mut NetworkSession>,
    legacy: Vec<&'s mut NetworkSession>,
}

#[derive(Debug, Clone)]
pub struct PacketBroadcaster {
    table: Arc<TranslationTable>,
    pool: Arc<CompressionPool>,
}

impl PacketBroadcaster {
    pub fn new(table: Arc<TranslationTable>, pool: Arc<CompressionPool>) -> Self {
        Self { table, pool }
    }

    pub fn broadcast_packets<'s>(
        &self,
        recipients: impl IntoIterator<Item = &'s mut NetworkSession>,
        packets: &[ClientboundPacket],
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if packets.is_empty() {
            return report;
        }

        let mut groups: Vec<BatchGroup<'s>> = Vec::new();
        let mut group_index: HashMap<(usize, usize), usize> = HashMap::new();
        for session in recipients {
            if !session.is_connected() || !session.protocol_state().is_negotiated() {
                report.skipped += 1;
                continue;
            }
            let key = (
                SerializerContext::identity(session.context()),
                compressor_identity(session.compressor()),
            );
            let index = *group_index.entry(key).or_insert_with(|| {
                groups.push(BatchGroup {
                    context: session.context().clone(),
                    compressor: session.compressor().clone(),
                    canonical: Vec::new(),
                    legacy: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[index];
            if session.is_legacy() {
                group.legacy.push(session);
            } else {
                group.canonical.push(session);
            }
        }

        let canonical: Vec<OutboundPacket> = packets.iter().cloned().map(OutboundPacket::Canonical).collect();
        let mut translated: Option<Result<TranslatedBatch, String>> = None;
        let mut buffers: HashMap<(usize, Schema), PacketBatch> = HashMap::new();

        for group in groups {
            let BatchGroup {
                context,
                compressor,
                canonical: mut canonical_recipients,
                legacy,
            } = group;

            let mut legacy_recipients = Vec::new();
            if !legacy.is_empty() {
                let translation = translated.get_or_insert_with(|| {
                    report.translations += 1;
                    self.table.translate_all(packets).map_err(|e| e.to_string())
                });
                match translation {
                    Ok(batch) if batch.differs() => legacy_recipients = legacy,
                    Ok(_) => canonical_recipients.extend(legacy),
                    Err(e) => {
                        tracing::warn!("Failed to translate broadcast for legacy recipients: {}", e);
                        report
                            .failed
                            .extend(legacy.into_iter().map(|session| (session.id(), e.clone())));
                    }
                }
            }

            let context_id = SerializerContext::identity(&context);
            for (schema, recipients) in [(Schema::Canonical, canonical_recipients), (Schema::Legacy, legacy_recipients)] {
                if recipients.is_empty() {
                    continue;
                }
                let list = match (schema, &translated) {
                    (Schema::Legacy, Some(Ok(batch))) => &batch.packets,
                    _ => &canonical,
                };

                let key = (context_id, schema);
                if !buffers.contains_key(&key) {
                    match PacketBatch::from_packets(list, &context) {
                        Ok(batch) => {
                            report.buffers += 1;
                            buffers.insert(key, batch);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to serialize {:?} broadcast buffer: {}", schema, e);
                            let reason = e.to_string();
                            report
                                .failed
                                .extend(recipients.iter().map(|session| (session.id(), reason.clone())));
                            continue;
                        }
                    }
                }
                let Some(batch) = buffers.get(&key) else {
                    continue;
                };

                report.recipients += recipients.len();
                if !compressor.will_compress(batch.buffer()) {
                    for session in recipients {
                        for packet in list {
                            session.add_prepared_to_send_buffer(packet.clone());
                        }
                    }
                    continue;
                }

                let promise = self.pool.prepare_batch(batch, compressor.clone(), false);
                report.compressions += 1;
                for session in recipients {
                    if let Err(e) = session.queue_compressed(promise.clone(), false) {
                        report.failed.push((session.id(), e.to_string()));
                    }
                }
            }
        }

        tracing::trace!(
            "Broadcast of {} packets: {} buffers, {} compressions, {} recipients",
            packets.len(),
            report.buffers,
            report.compressions,
            report.recipients
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{sent_packets, session_in, session_with, RecordingSender};
    use protobridge_core::Vector3;
    use protobridge_protocol::packets::{AddActorPacket, SetPlayerGameTypePacket, UpdateAttributesPacket};
    use protobridge_protocol::types::EntityMetadata;
    use protobridge_protocol::{ItemTypeDictionary, NoCompression, ZlibCompressor, CURRENT_PROTOCOL, LEGACY_PROTOCOL};

    fn broadcaster() -> PacketBroadcaster {
        PacketBroadcaster::new(
            Arc::new(TranslationTable::standard()),
            Arc::new(CompressionPool::synchronous()),
        )
    }

    fn sessions(versions: &[u32], compressor: Arc<dyn Compressor>) -> Vec<(NetworkSession, Arc<RecordingSender>)> {
        let context = SerializerContext::shared(ItemTypeDictionary::vanilla_subset());
        versions
            .iter()
            .map(|version| session_in(Some(*version), context.clone(), compressor.clone()))
            .collect()
    }

    fn zombie() -> AddActorPacket {
        AddActorPacket {
            actor_unique_id: 42,
            actor_runtime_id: 42,
            actor_type: "minecraft:zombie".into(),
            position: Vector3::new(10.5, 64.0, -3.25),
            motion: None,
            pitch: 0.0,
            yaw: 45.0,
            head_yaw: 0.0,
            body_yaw: 30.0,
            attributes: vec![],
            metadata: EntityMetadata::new(),
            links: vec![],
        }
    }

    #[test]
    fn test_pass_through_list_shares_one_buffer() {
        let zlib: Arc<dyn Compressor> = Arc::new(ZlibCompressor::new(7, Some(0), 1 << 20));
        let mut recipients = sessions(&[CURRENT_PROTOCOL, LEGACY_PROTOCOL], zlib);
        let packets = vec![ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 1 })];

        let report = broadcaster().broadcast_packets(recipients.iter_mut().map(|(s, _)| s), &packets);
        assert_eq!(report.buffers, 1);
        assert_eq!(report.translations, 1);
        assert_eq!(report.compressions, 1);
        assert_eq!(report.recipients, 2);
    }

    #[test]
    fn test_changed_list_gets_legacy_buffer() {
        let mut recipients = sessions(&[CURRENT_PROTOCOL, LEGACY_PROTOCOL, LEGACY_PROTOCOL], Arc::new(NoCompression));
        let packets = vec![ClientboundPacket::from(zombie())];

        let report = broadcaster().broadcast_packets(recipients.iter_mut().map(|(s, _)| s), &packets);
        assert_eq!(report.buffers, 2);
        assert_eq!(report.translations, 1);
        assert_eq!(report.compressions, 0);

        for (session, sender) in recipients.iter_mut() {
            assert_eq!(session.send_buffer_len(), 1);
            session.tick().unwrap();
            assert_eq!(sent_packets(sender, &NoCompression).len(), 1);
        }
    }

    #[test]
    fn test_disconnected_recipients_are_skipped() {
        let mut recipients = sessions(&[CURRENT_PROTOCOL, CURRENT_PROTOCOL], Arc::new(NoCompression));
        recipients[1].0.disconnect_without_notify("gone");
        let packets = vec![ClientboundPacket::from(UpdateAttributesPacket {
            actor_runtime_id: 1,
            attributes: vec![],
            tick: 0,
        })];

        let report = broadcaster().broadcast_packets(recipients.iter_mut().map(|(s, _)| s), &packets);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.recipients, 1);
        assert_eq!(report.translations, 0);
    }

    #[test]
    fn test_unnegotiated_recipients_are_skipped() {
        let (mut session, _) = session_with(None, Arc::new(NoCompression));
        let packets = vec![ClientboundPacket::from(SetPlayerGameTypePacket { game_mode: 0 })];
        let report = broadcaster().broadcast_packets([&mut session], &packets);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.buffers, 0);
    }

    #[test]
    fn test_empty_list_does_nothing() {
        let mut recipients = sessions(&[CURRENT_PROTOCOL], Arc::new(NoCompression));
        let report = broadcaster().broadcast_packets(recipients.iter_mut().map(|(s, _)| s), &[]);
        assert_eq!(report, BroadcastReport::default());
    }
}
