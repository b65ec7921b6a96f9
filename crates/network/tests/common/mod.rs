#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use protobridge_core::{BlockPosition, ConnectionId, GameMode, Result, Vector3};
use protobridge_network::{
    GameHost, HostBindings, InventorySync, NetworkSession, PacketSender, PlayerInfo, PlayerSnapshot,
    SessionServices, Transport, WorldSnapshot,
};
use protobridge_protocol::packets::ServerboundPacket;
use protobridge_protocol::types::EntityMetadata;
use protobridge_protocol::{
    ClientboundPacket, Compressor, PacketBatch, SerializerContext, ZlibCompressor,
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Codec that counts how often it compressed
#[derive(Debug, Default)]
pub struct CountingCompressor {
    inner: ZlibCompressor,
    pub calls: AtomicUsize,
}

impl CountingCompressor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compressor for CountingCompressor {
    fn will_compress(&self, _data: &[u8]) -> bool {
        true
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compress(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.decompress(data)
    }
}

#[derive(Debug, Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<Bytes>>,
    pub closed: Mutex<Option<String>>,
}

impl PacketSender for RecordingSender {
    fn send(&self, payload: Bytes, _immediate: bool) -> Result<()> {
        self.sent.lock().push(payload);
        Ok(())
    }

    fn close(&self, reason: &str) {
        *self.closed.lock() = Some(reason.to_string());
    }
}

pub fn session(
    id: u64,
    version: u32,
    context: &Arc<SerializerContext>,
    compressor: &Arc<dyn Compressor>,
) -> (NetworkSession, Arc<RecordingSender>) {
    let sender = Arc::new(RecordingSender::default());
    let mut session = NetworkSession::new(
        ConnectionId::new(id),
        SocketAddr::from(([127, 0, 0, 1], 40000 + id as u16)),
        sender.clone(),
        context.clone(),
        compressor.clone(),
        SessionServices::default(),
    );
    session.set_protocol_version(version).unwrap();
    (session, sender)
}

/// Packets (header and body) inside a list of sent payloads
pub fn unpack(payloads: &[Bytes], compressor: &dyn Compressor) -> Vec<Bytes> {
    payloads
        .iter()
        .flat_map(|payload| {
            let raw = compressor.decompress(payload).unwrap();
            PacketBatch::from_raw(Bytes::from(raw)).packets().unwrap()
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<(ConnectionId, Bytes)>>,
    pub closed: Mutex<Vec<(ConnectionId, String)>>,
    pub blocked: Mutex<Vec<(IpAddr, Duration)>>,
}

impl MockTransport {
    pub fn sent_to(&self, connection: ConnectionId) -> Vec<Bytes> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == connection)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl Transport for MockTransport {
    fn put_packet(&self, connection: ConnectionId, payload: Bytes, _immediate: bool) -> Result<()> {
        self.sent.lock().push((connection, payload));
        Ok(())
    }

    fn close_session(&self, connection: ConnectionId, reason: &str) {
        self.closed.lock().push((connection, reason.to_string()));
    }

    fn block_address(&self, address: IpAddr, timeout: Duration) {
        self.blocked.lock().push((address, timeout));
    }

    fn unblock_address(&self, address: IpAddr) {
        self.blocked.lock().retain(|(blocked, _)| *blocked != address);
    }

    fn send_raw(&self, _address: SocketAddr, _payload: Bytes) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoInventory;

impl InventorySync for NoInventory {
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

/// Host with one flat world that records what it was told
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub created: Mutex<Vec<(ConnectionId, String, u32)>>,
    pub forwarded: Mutex<Vec<(ConnectionId, u32)>>,
    pub disconnected: Mutex<Vec<(ConnectionId, String)>>,
}

impl GameHost for RecordingHost {
    fn create_player(&self, connection: ConnectionId, info: &PlayerInfo) -> Result<HostBindings> {
        self.created
            .lock()
            .push((connection, info.username.clone(), info.protocol));
        let player = PlayerSnapshot {
            actor_unique_id: connection.get() as i64,
            actor_runtime_id: connection.get(),
            username: info.username.clone(),
            game_mode: GameMode::Survival,
            position: Vector3::new(0.5, 65.0, 0.5),
            pitch: 0.0,
            yaw: 0.0,
            is_operator: false,
            auto_jump: true,
            allow_flight: false,
            has_block_collision: true,
            flying: false,
            attributes: Vec::new(),
            metadata: EntityMetadata::new(),
        };
        Ok(HostBindings::new(player, Arc::new(NoInventory)))
    }

    fn world(&self, _connection: ConnectionId) -> WorldSnapshot {
        WorldSnapshot {
            world_name: "Test".into(),
            server_game_mode: GameMode::Survival,
            difficulty: 1,
            spawn_position: BlockPosition::new(0, 64, 0),
            time: 0,
            current_tick: 0,
            max_view_distance: 6,
        }
    }

    fn handle_game_packet(&self, connection: ConnectionId, packet: ServerboundPacket) -> Result<Vec<ClientboundPacket>> {
        self.forwarded.lock().push((connection, packet.id()));
        Ok(Vec::new())
    }

    fn on_disconnect(&self, connection: ConnectionId, reason: &str) {
        self.disconnected.lock().push((connection, reason.to_string()));
    }
}

pub fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES384"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2ln", header, body)
}

pub fn chain_json(name: &str) -> String {
    let link = jwt(&json!({
        "extraData": {
            "displayName": name,
            "identity": "5f1c2d3e-4a5b-4c6d-8e7f-901a2b3c4d5e",
            "XUID": "",
        },
    }));
    json!({ "chain": [link] }).to_string()
}

pub fn client_data() -> String {
    jwt(&json!({ "LanguageCode": "en_GB" }))
}
