//! Network session
//!
//! One [`NetworkSession`] per connected peer. It owns the send buffer and the
//! compressed-batch queue, and is the only place the protocol generation of a
//! peer is consulted on the way out.
//!
//! # Send path
//!
//! ```text
//! send_data_packet(packet, immediate)
//!   -> legacy peer?  translate through the table : pass through
//!   -> send buffer
//!   -> flush: serialize batch -> compression pool -> compressed queue
//!   -> compressed queue drains in order into the PacketSender
//! ```
//!
//! The broadcaster bypasses translation with
//! [`add_prepared_to_send_buffer`](NetworkSession::add_prepared_to_send_buffer)
//! and [`queue_compressed`](NetworkSession::queue_compressed), since it has
//! already produced the right layout for the recipient's cohort.

use crate::behaviour::SessionBehaviour;
use crate::compression_pool::{CompressBatchPromise, CompressionPool};
use crate::handshake::PlayerInfo;
use crate::host::{HostBindings, PlayerSnapshot};
use crate::protocol_state::ProtocolState;
use crate::transport::PacketSender;
use bytes::Bytes;
use protobridge_core::{BridgeError, ConnectionId, Result};
use protobridge_protocol::packets::{DisconnectPacket, ServerboundPacket};
use protobridge_protocol::translator::decode_legacy_serverbound;
use protobridge_protocol::{
    is_legacy_version, ClientboundPacket, Compressor, OutboundPacket, PacketBatch, SerializerContext,
    TranslationTable,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Waiting for the login packet
    Login,
    /// Identity chain being verified; inbound packets are dropped
    Verifying,
    /// Player created, waiting for the chunk radius request
    PreSpawn,
    InGame,
    Disconnected,
}

/// Shared services every session sends through
#[derive(Debug, Clone)]
pub struct SessionServices {
    pub table: Arc<TranslationTable>,
    pub pool: Arc<CompressionPool>,
}

impl SessionServices {
    pub fn new(table: Arc<TranslationTable>, pool: Arc<CompressionPool>) -> Self {
        Self { table, pool }
    }
}

impl Default for SessionServices {
    fn default() -> Self {
        Self::new(Arc::new(TranslationTable::standard()), Arc::new(CompressionPool::synchronous()))
    }
}

#[derive(Debug)]
pub struct NetworkSession {
    id: ConnectionId,
    address: SocketAddr,
    state: ProtocolState,
    behaviour: Option<SessionBehaviour>,
    stage: SessionStage,
    context: Arc<SerializerContext>,
    compressor: Arc<dyn Compressor>,
    sender: Arc<dyn PacketSender>,
    services: SessionServices,
    send_buffer: Vec<OutboundPacket>,
    compressed_queue: VecDeque<(CompressBatchPromise, bool)>,
    bindings: Option<HostBindings>,
    player_info: Option<PlayerInfo>,
    view_distance: Option<i32>,
    disconnect_reason: Option<String>,
}

impl NetworkSession {
    pub fn new(
        id: ConnectionId,
        address: SocketAddr,
        sender: Arc<dyn PacketSender>,
        context: Arc<SerializerContext>,
        compressor: Arc<dyn Compressor>,
        services: SessionServices,
    ) -> Self {
        tracing::debug!("Session {} created for {}", id, address);
        Self {
            id,
            address,
            state: ProtocolState::new(),
            behaviour: None,
            stage: SessionStage::Login,
            context,
            compressor,
            sender,
            services,
            send_buffer: Vec::new(),
            compressed_queue: VecDeque::new(),
            bindings: None,
            player_info: None,
            view_distance: None,
            disconnect_reason: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn context(&self) -> &Arc<SerializerContext> {
        &self.context
    }

    pub fn compressor(&self) -> &Arc<dyn Compressor> {
        &self.compressor
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: SessionStage) {
        tracing::trace!("Session {} stage {:?} -> {:?}", self.id, self.stage, stage);
        self.stage = stage;
    }

    pub fn is_connected(&self) -> bool {
        self.stage != SessionStage::Disconnected
    }

    /// Why the session closed, once it has
    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    pub fn protocol_state(&self) -> &ProtocolState {
        &self.state
    }

    /// # Panics
    /// Before the protocol version is negotiated.
    pub fn is_legacy(&self) -> bool {
        self.state.is_legacy()
    }

    /// Store the negotiated version and select the behaviour variant
    pub fn set_protocol_version(&mut self, version: u32) -> Result<()> {
        self.state.set_version(version)?;
        let behaviour = SessionBehaviour::for_state(&self.state);
        tracing::debug!("Session {} negotiated protocol {}", self.id, self.state);
        self.behaviour = Some(behaviour);
        Ok(())
    }

    pub fn behaviour(&self) -> Result<SessionBehaviour> {
        self.behaviour
            .ok_or_else(|| BridgeError::InvalidState(format!("Session {} has no negotiated behaviour", self.id)))
    }

    pub fn player_info(&self) -> Option<&PlayerInfo> {
        self.player_info.as_ref()
    }

    pub fn set_player_info(&mut self, info: PlayerInfo) {
        self.player_info = Some(info);
    }

    pub fn bindings(&self) -> Option<&HostBindings> {
        self.bindings.as_ref()
    }

    pub fn attach_bindings(&mut self, bindings: HostBindings) {
        self.bindings = Some(bindings);
    }

    pub fn player(&self) -> Result<&PlayerSnapshot> {
        self.bindings
            .as_ref()
            .map(|bindings| &bindings.player)
            .ok_or_else(|| BridgeError::InvalidState(format!("Session {} has no player yet", self.id)))
    }

    /// Replace the player snapshot after a state change on the host
    pub fn update_player(&mut self, player: PlayerSnapshot) -> Result<()> {
        match self.bindings.as_mut() {
            Some(bindings) => {
                bindings.player = player;
                Ok(())
            }
            None => Err(BridgeError::InvalidState(format!("Session {} has no player yet", self.id))),
        }
    }

    pub fn view_distance(&self) -> Option<i32> {
        self.view_distance
    }

    pub fn set_view_distance(&mut self, radius: i32) {
        self.view_distance = Some(radius);
    }

    /// Layout this peer expects for a canonical packet
    pub fn prepare(&self, packet: ClientboundPacket) -> Result<OutboundPacket> {
        if self.state.is_legacy() {
            self.services.table.translate(&packet)
        } else {
            Ok(OutboundPacket::Canonical(packet))
        }
    }

    /// Send one canonical packet, translated for legacy peers
    pub fn send_data_packet(&mut self, packet: impl Into<ClientboundPacket>, immediate: bool) -> Result<()> {
        if !self.is_connected() {
            tracing::trace!("Session {} dropping packet, already disconnected", self.id);
            return Ok(());
        }
        self.add_to_send_buffer(packet)?;
        if immediate {
            self.flush_send_buffer(true)?;
        }
        Ok(())
    }

    pub fn add_to_send_buffer(&mut self, packet: impl Into<ClientboundPacket>) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let packet = self.prepare(packet.into())?;
        self.send_buffer.push(packet);
        Ok(())
    }

    /// Buffer a packet already in this peer's layout; dropped once disconnected
    pub fn add_prepared_to_send_buffer(&mut self, packet: OutboundPacket) {
        if !self.is_connected() {
            tracing::trace!("Session {} dropping prepared packet, already disconnected", self.id);
            return;
        }
        debug_assert!(
            !packet.is_legacy() || self.state.version().map(is_legacy_version).unwrap_or(false),
            "legacy packet buffered for a canonical session"
        );
        self.send_buffer.push(packet);
    }

    /// Send a packet whose layout is the same in every protocol generation,
    /// usable before the version is negotiated
    pub fn send_unversioned(&mut self, packet: impl Into<ClientboundPacket>, immediate: bool) -> Result<()> {
        let packet = packet.into();
        if self.services.table.handles(&packet) {
            return Err(BridgeError::InvalidState(format!(
                "{:?} differs between protocol generations",
                packet.kind()
            )));
        }
        if !self.is_connected() {
            return Ok(());
        }
        self.send_buffer.push(OutboundPacket::Canonical(packet));
        if immediate {
            self.flush_send_buffer(true)?;
        }
        Ok(())
    }

    pub fn send_buffer_len(&self) -> usize {
        self.send_buffer.len()
    }

    /// Serialize the send buffer into one batch and queue its compression
    pub fn flush_send_buffer(&mut self, immediate: bool) -> Result<()> {
        if self.send_buffer.is_empty() {
            return Ok(());
        }
        let packets = std::mem::take(&mut self.send_buffer);
        let batch = PacketBatch::from_packets(&packets, &self.context)?;
        tracing::trace!("Session {} flushing {} packets ({} bytes)", self.id, packets.len(), batch.len());
        let promise = self
            .services
            .pool
            .prepare_batch(&batch, self.compressor.clone(), immediate);
        self.queue_compressed_no_buffer_flush(promise, immediate)
    }

    /// Queue a compressed batch after everything already buffered
    pub fn queue_compressed(&mut self, promise: CompressBatchPromise, immediate: bool) -> Result<()> {
        self.flush_send_buffer(immediate)?;
        self.queue_compressed_no_buffer_flush(promise, immediate)
    }

    fn queue_compressed_no_buffer_flush(&mut self, promise: CompressBatchPromise, immediate: bool) -> Result<()> {
        self.compressed_queue.push_back((promise, immediate));
        self.flush_compressed_queue()
    }

    pub fn compressed_queue_len(&self) -> usize {
        self.compressed_queue.len()
    }

    /// Send every resolved batch at the head of the queue
    pub fn flush_compressed_queue(&mut self) -> Result<()> {
        while let Some((promise, immediate)) = self.compressed_queue.front() {
            let immediate = *immediate;
            let Some(result) = promise.result() else {
                break;
            };
            self.compressed_queue.pop_front();
            self.sender.send(result?, immediate)?;
        }
        Ok(())
    }

    /// Per-tick work: flush buffered packets and resolved batches
    pub fn tick(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        self.flush_send_buffer(false)?;
        self.flush_compressed_queue()
    }

    /// Decode a received game payload (game packet id stripped)
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Vec<ServerboundPacket>> {
        let decompressed = self
            .compressor
            .decompress(payload)
            .map_err(|e| BridgeError::InvalidData(format!("Failed to decompress batch: {}", e)))?;
        let batch = PacketBatch::from_raw(Bytes::from(decompressed));

        let legacy = self.state.version().map(is_legacy_version).unwrap_or(false);
        batch
            .packets()?
            .into_iter()
            .map(|packet| {
                if legacy {
                    decode_legacy_serverbound(packet, &self.context)
                } else {
                    ServerboundPacket::decode(packet, &self.context)
                }
            })
            .collect()
    }

    /// Close the session, telling the client why
    pub fn disconnect(&mut self, reason: &str) {
        self.close(reason, true);
    }

    /// Close the session without a disconnect packet
    pub fn disconnect_without_notify(&mut self, reason: &str) {
        self.close(reason, false);
    }

    fn close(&mut self, reason: &str, notify: bool) {
        if !self.is_connected() {
            return;
        }
        if notify {
            let packet = ClientboundPacket::from(DisconnectPacket::new(reason));
            self.add_prepared_to_send_buffer(OutboundPacket::Canonical(packet));
        }
        if let Err(e) = self.flush_send_buffer(true) {
            tracing::debug!("Session {} failed to flush before disconnect: {}", self.id, e);
        }
        tracing::info!("Session {} disconnected: {}", self.id, reason);
        self.stage = SessionStage::Disconnected;
        self.disconnect_reason = Some(reason.to_string());
        self.send_buffer.clear();
        self.compressed_queue.clear();
        self.sender.close(reason);
    }

    /// The peer went away; nothing more is sent
    pub fn on_client_disconnect(&mut self, reason: &str) {
        if !self.is_connected() {
            return;
        }
        tracing::info!("Session {} closed by client: {}", self.id, reason);
        self.stage = SessionStage::Disconnected;
        self.disconnect_reason = Some(reason.to_string());
        self.send_buffer.clear();
        self.compressed_queue.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use protobridge_protocol::packets::play_status::LOGIN_FAILED_CLIENT;
    use protobridge_protocol::packets::{PlayStatusPacket, SetPlayerGameTypePacket, UpdateAbilitiesPacket};
    use protobridge_protocol::legacy::adventure::AdventureSettingsPacket;
    use protobridge_protocol::types::abilities::LAYER_BASE;
    use protobridge_protocol::types::{AbilitiesData, AbilitiesLayer, CommandPermissions, PlayerPermissions};
    use protobridge_protocol::{
        ItemTypeDictionary, LegacyPacket, NoCompression, ZlibCompressor, CURRENT_PROTOCOL, LEGACY_PROTOCOL,
    };

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSender {
        pub sent: Mutex<Vec<(Bytes, bool)>>,
        pub closed: Mutex<Option<String>>,
    }

    impl PacketSender for RecordingSender {
        fn send(&self, payload: Bytes, immediate: bool) -> Result<()> {
            self.sent.lock().push((payload, immediate));
            Ok(())
        }

        fn close(&self, reason: &str) {
            *self.closed.lock() = Some(reason.to_string());
        }
    }

    pub(crate) fn session_with(
        version: Option<u32>,
        compressor: Arc<dyn Compressor>,
    ) -> (NetworkSession, Arc<RecordingSender>) {
        session_in(
            version,
            SerializerContext::shared(ItemTypeDictionary::vanilla_subset()),
            compressor,
        )
    }

    pub(crate) fn session_in(
        version: Option<u32>,
        context: Arc<SerializerContext>,
        compressor: Arc<dyn Compressor>,
    ) -> (NetworkSession, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let mut session = NetworkSession::new(
            ConnectionId::new(1),
            "127.0.0.1:19133".parse().unwrap(),
            sender.clone(),
            context,
            compressor,
            SessionServices::default(),
        );
        if let Some(version) = version {
            session.set_protocol_version(version).unwrap();
        }
        (session, sender)
    }

    /// Packets (header and body) of every payload sent so far
    pub(crate) fn sent_packets(sender: &RecordingSender, compressor: &dyn Compressor) -> Vec<Bytes> {
        sender
            .sent
            .lock()
            .iter()
            .flat_map(|(payload, _)| {
                let raw = compressor.decompress(payload).unwrap();
                PacketBatch::from_raw(Bytes::from(raw)).packets().unwrap()
            })
            .collect()
    }

    fn abilities() -> UpdateAbilitiesPacket {
        UpdateAbilitiesPacket {
            data: AbilitiesData::new(CommandPermissions::Operator, PlayerPermissions::Operator, 3, vec![]),
        }
    }

    #[test]
    fn test_canonical_session_sends_unchanged() {
        let (mut session, sender) = session_with(Some(CURRENT_PROTOCOL), Arc::new(NoCompression));
        session.send_data_packet(abilities(), true).unwrap();

        let packets = sent_packets(&sender, &NoCompression);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], 0xbb);
        assert!(sender.sent.lock()[0].1);
    }

    #[test]
    fn test_legacy_session_translates() {
        let (mut session, sender) = session_with(Some(LEGACY_PROTOCOL), Arc::new(NoCompression));
        session.send_data_packet(abilities(), true).unwrap();

        let packets = sent_packets(&sender, &NoCompression);
        let LegacyPacket::AdventureSettings(settings) = LegacyPacket::decode(packets[0].clone(), session.context()).unwrap()
        else {
            panic!("expected adventure settings");
        };
        assert_eq!(settings.command_permission, CommandPermissions::Operator);
        assert_eq!(settings.target_actor_unique_id, 3);
    }

    #[test]
    fn test_buffer_flushes_on_tick() {
        let (mut session, sender) = session_with(Some(CURRENT_PROTOCOL), Arc::new(ZlibCompressor::default()));
        session.send_data_packet(SetPlayerGameTypePacket { game_mode: 1 }, false).unwrap();
        session.send_data_packet(SetPlayerGameTypePacket { game_mode: 2 }, false).unwrap();
        assert_eq!(session.send_buffer_len(), 2);
        assert!(sender.sent.lock().is_empty());

        session.tick().unwrap();
        assert_eq!(sender.sent.lock().len(), 1);
        assert_eq!(sent_packets(&sender, &ZlibCompressor::default()).len(), 2);
    }

    #[test]
    fn test_compressed_queue_preserves_order() {
        let (mut session, sender) = session_with(Some(CURRENT_PROTOCOL), Arc::new(NoCompression));
        let first = CompressBatchPromise::pending();
        let second = CompressBatchPromise::resolved(Bytes::from_static(b"second"));

        session.queue_compressed(first.clone(), false).unwrap();
        session.queue_compressed(second, false).unwrap();
        assert!(sender.sent.lock().is_empty());
        assert_eq!(session.compressed_queue_len(), 2);

        first.resolve(Ok(Bytes::from_static(b"first")));
        session.tick().unwrap();
        let sent: Vec<Bytes> = sender.sent.lock().iter().map(|(payload, _)| payload.clone()).collect();
        assert_eq!(sent, vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]);
    }

    #[test]
    fn test_queue_compressed_flushes_buffer_first() {
        let (mut session, sender) = session_with(Some(CURRENT_PROTOCOL), Arc::new(NoCompression));
        session.add_to_send_buffer(SetPlayerGameTypePacket { game_mode: 1 }).unwrap();
        session
            .queue_compressed(CompressBatchPromise::resolved(Bytes::from_static(b"batch")), false)
            .unwrap();

        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0].0[..], &[2, 0x3e, 2]);
        assert_eq!(sent[1].0, Bytes::from_static(b"batch"));
    }

    #[test]
    fn test_disconnect_notifies_and_closes() {
        let (mut session, sender) = session_with(None, Arc::new(NoCompression));
        session.disconnect("Server closed");
        assert!(!session.is_connected());
        assert_eq!(sender.closed.lock().as_deref(), Some("Server closed"));

        let packets = sent_packets(&sender, &NoCompression);
        assert_eq!(packets[0][0], 0x05);

        session.send_data_packet(SetPlayerGameTypePacket { game_mode: 1 }, true).unwrap();
        assert_eq!(sender.sent.lock().len(), 1);
    }

    #[test]
    fn test_unversioned_send_before_handshake() {
        let (mut session, sender) = session_with(None, Arc::new(NoCompression));
        session
            .send_unversioned(PlayStatusPacket { status: LOGIN_FAILED_CLIENT }, true)
            .unwrap();
        assert_eq!(sent_packets(&sender, &NoCompression)[0][0], 0x02);

        assert!(matches!(
            session.send_unversioned(abilities(), true),
            Err(BridgeError::InvalidState(_))
        ));
    }

    #[test]
    #[should_panic]
    fn test_send_before_handshake_panics() {
        let (mut session, _) = session_with(None, Arc::new(NoCompression));
        let _ = session.send_data_packet(SetPlayerGameTypePacket { game_mode: 1 }, false);
    }

    #[test]
    fn test_unknown_ability_fails_without_panicking() {
        let mut packet = abilities();
        let mut base = std::collections::BTreeMap::new();
        base.insert(40, true);
        packet.data.layers.push(AbilitiesLayer::new(LAYER_BASE, base, None, None));

        for version in [CURRENT_PROTOCOL, LEGACY_PROTOCOL] {
            let (mut session, sender) = session_with(Some(version), Arc::new(NoCompression));
            assert!(matches!(
                session.send_data_packet(packet.clone(), true),
                Err(BridgeError::MalformedInput(_))
            ));
            assert!(sender.sent.lock().is_empty());
        }
    }

    #[test]
    fn test_prepared_packets_dropped_after_disconnect() {
        let (mut session, sender) = session_with(Some(LEGACY_PROTOCOL), Arc::new(NoCompression));
        session.on_client_disconnect("Timeout");

        let settings = AdventureSettingsPacket::new(CommandPermissions::Normal, PlayerPermissions::Member, 1);
        session.add_prepared_to_send_buffer(OutboundPacket::Legacy(LegacyPacket::AdventureSettings(settings)));
        session.add_to_send_buffer(SetPlayerGameTypePacket { game_mode: 1 }).unwrap();
        assert_eq!(session.send_buffer_len(), 0);
        assert!(sender.sent.lock().is_empty());
    }
}
