//! # Network Interface
//!
//! The tick-thread side of the bridge. It owns every [`NetworkSession`], drains
//! the event channel the transport and login verifiers write to, and routes
//! inbound game packets by session stage.
//!
//! # Architecture
//!
//! ```text
//!  transport tasks ──┐
//!                    ├─> bounded mpsc<InterfaceEvent> ──> tick() ──> sessions ──> PacketSender
//!  login verifiers ──┘                                      │
//!                                                           └──> GameHost
//! ```
//!
//! ## Stages
//!
//! | stage      | inbound packets                                        |
//! |------------|--------------------------------------------------------|
//! | Login      | Login only                                             |
//! | Verifying  | dropped                                                |
//! | PreSpawn   | RequestChunkRadius answered, everything forwarded       |
//! | InGame     | forwarded to the host                                  |
//!
//! # Thread Safety
//!
//! Sessions are only touched from the thread calling [`NetworkInterface::tick`].
//! Other tasks talk to it through the channel returned by [`event_channel`].

use crate::broadcaster::{BroadcastReport, PacketBroadcaster};
use crate::compression_pool::CompressionPool;
use crate::config::NetworkConfig;
use crate::handshake::{self, LoginDecision, LoginOutcome, VerificationRequest};
use crate::host::{GameHost, LoginVerifier};
use crate::session::{NetworkSession, SessionServices, SessionStage};
use crate::spawn;
use crate::transport::{SessionPacketSender, Transport, TransportEvent, GAME_PACKET_ID};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use protobridge_core::{BridgeError, ConnectionId, Result};
use protobridge_protocol::packets::play_status::{LOGIN_SUCCESS, PLAYER_SPAWN};
use protobridge_protocol::packets::{LoginPacket, PlayStatusPacket, RequestChunkRadiusPacket, ServerboundPacket};
use protobridge_protocol::{
    ClientboundPacket, Compressor, ItemTypeDictionary, SerializerContext, TranslationTable, ZlibCompressor,
};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long an address that sent a bad packet stays blocked
pub const BAD_PACKET_BLOCK: Duration = Duration::from_secs(5);

/// Everything the tick thread is told about
#[derive(Debug, Clone)]
pub enum InterfaceEvent {
    Transport(TransportEvent),
    LoginVerified {
        connection: ConnectionId,
        outcome: LoginOutcome,
    },
}

impl From<TransportEvent> for InterfaceEvent {
    fn from(event: TransportEvent) -> Self {
        Self::Transport(event)
    }
}

/// Bounded channel between the transport/verifiers and the tick thread
pub fn event_channel(capacity: usize) -> (mpsc::Sender<InterfaceEvent>, mpsc::Receiver<InterfaceEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Random id shown to a client whose packet could not be processed
pub fn generate_error_id() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Tick-thread owner of all sessions
///
/// # Lifecycle
///
/// ```text
/// 1. Connect event: session created in the Login stage
/// 2. Login packet: version checked, chain handed to the verifier
/// 3. LoginVerified event: version stored, player created, spawn sequence sent
/// 4. RequestChunkRadius: radius answered, player spawned
/// 5. Disconnect (either side): session removed at the end of the tick
/// ```
pub struct NetworkInterface {
    /// Network configuration
    config: NetworkConfig,

    transport: Arc<dyn Transport>,
    host: Arc<dyn GameHost>,
    verifier: Arc<dyn LoginVerifier>,

    /// Serializer context shared by every session
    context: Arc<SerializerContext>,

    /// Codec shared by every session
    compressor: Arc<dyn Compressor>,

    services: SessionServices,
    broadcaster: PacketBroadcaster,

    /// All live sessions
    /// Key: ConnectionId, Value: session
    sessions: HashMap<ConnectionId, NetworkSession>,

    events_tx: mpsc::Sender<InterfaceEvent>,
    events_rx: mpsc::Receiver<InterfaceEvent>,
}

impl NetworkInterface {
    /// Create the interface
    ///
    /// # Arguments
    /// * `config` - Validated before use
    /// * `events` - Channel from [`event_channel`]; the transport holds a clone of the sender
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if the configuration is invalid.
    pub fn new(
        config: NetworkConfig,
        transport: Arc<dyn Transport>,
        host: Arc<dyn GameHost>,
        verifier: Arc<dyn LoginVerifier>,
        events: (mpsc::Sender<InterfaceEvent>, mpsc::Receiver<InterfaceEvent>),
    ) -> Result<Self> {
        config.validate()?;

        let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::new(
            config.compression_level,
            config.compression_threshold,
            config.max_decompression_size,
        ));
        let table = Arc::new(TranslationTable::standard());
        let pool = Arc::new(CompressionPool::from_config(&config));
        let (events_tx, events_rx) = events;

        tracing::info!(
            "Network interface ready: max_players={}, legacy protocols={:?}",
            config.max_players,
            config.legacy_protocols
        );

        Ok(Self {
            context: SerializerContext::shared(ItemTypeDictionary::vanilla_subset()),
            compressor,
            services: SessionServices::new(table.clone(), pool.clone()),
            broadcaster: PacketBroadcaster::new(table, pool),
            sessions: HashMap::new(),
            config,
            transport,
            host,
            verifier,
            events_tx,
            events_rx,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Sender for transports and verifier tasks
    pub fn events(&self) -> mpsc::Sender<InterfaceEvent> {
        self.events_tx.clone()
    }

    pub fn session(&self, connection: ConnectionId) -> Option<&NetworkSession> {
        self.sessions.get(&connection)
    }

    pub fn session_mut(&mut self, connection: ConnectionId) -> Option<&mut NetworkSession> {
        self.sessions.get_mut(&connection)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sessions that have not disconnected
    pub fn connection_count(&self) -> usize {
        self.sessions.values().filter(|session| session.is_connected()).count()
    }

    /// Send one packet to one session
    pub fn send_packet(
        &mut self,
        connection: ConnectionId,
        packet: impl Into<ClientboundPacket>,
        immediate: bool,
    ) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&connection)
            .ok_or_else(|| BridgeError::NotFound(format!("Session {}", connection)))?;
        session.send_data_packet(packet, immediate)
    }

    /// Broadcast a packet list to the given sessions
    ///
    /// Recipients the broadcaster could not serve are disconnected.
    pub fn broadcast_packets(&mut self, recipients: &[ConnectionId], packets: &[ClientboundPacket]) -> BroadcastReport {
        let wanted: HashSet<ConnectionId> = recipients.iter().copied().collect();
        let report = self.broadcaster.broadcast_packets(
            self.sessions
                .iter_mut()
                .filter(|(id, _)| wanted.contains(id))
                .map(|(_, session)| session),
            packets,
        );
        self.disconnect_failed(&report);
        report
    }

    /// Broadcast a packet list to every in-game session
    pub fn broadcast_to_all(&mut self, packets: &[ClientboundPacket]) -> BroadcastReport {
        let report = self.broadcaster.broadcast_packets(
            self.sessions
                .values_mut()
                .filter(|session| session.stage() == SessionStage::InGame),
            packets,
        );
        self.disconnect_failed(&report);
        report
    }

    fn disconnect_failed(&mut self, report: &BroadcastReport) {
        for (connection, reason) in &report.failed {
            if let Some(session) = self.sessions.get_mut(connection) {
                tracing::error!("Broadcast to session {} failed: {}", connection, reason);
                session.disconnect("Internal server error");
            }
        }
    }

    /// Drain every queued event
    ///
    /// # Returns
    /// The number of events handled
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: InterfaceEvent) {
        match event {
            InterfaceEvent::Transport(TransportEvent::Connect { connection, address }) => {
                self.on_connect(connection, address)
            }
            InterfaceEvent::Transport(TransportEvent::Packet { connection, payload }) => {
                self.on_packet(connection, payload)
            }
            InterfaceEvent::Transport(TransportEvent::Disconnect { connection, reason }) => {
                if let Some(session) = self.sessions.get_mut(&connection) {
                    session.on_client_disconnect(&reason);
                }
            }
            InterfaceEvent::LoginVerified { connection, outcome } => self.on_login_verified(connection, outcome),
        }
    }

    /// One tick: events, session flushes, cleanup
    pub fn tick(&mut self) {
        self.process_events();

        for session in self.sessions.values_mut() {
            if let Err(e) = session.tick() {
                tracing::warn!("Session {} failed to flush: {}", session.id(), e);
                session.disconnect("Internal server error");
            }
        }

        let closed: Vec<ConnectionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| !session.is_connected())
            .map(|(id, _)| *id)
            .collect();
        for connection in closed {
            let Some(session) = self.sessions.remove(&connection) else {
                continue;
            };
            if session.bindings().is_some() {
                let reason = session.disconnect_reason().unwrap_or("Disconnected");
                self.host.on_disconnect(connection, reason);
            }
            tracing::debug!("Session {} removed", connection);
        }
    }

    /// Tick until Ctrl-C
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Network interface starting tick loop ({:?})", self.config.tick_interval);
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, initiating shutdown");
                    break;
                }
            }
        }

        for session in self.sessions.values_mut() {
            session.disconnect("Server closed");
        }
        self.tick();
        tracing::info!("Network interface stopped");
        Ok(())
    }

    fn on_connect(&mut self, connection: ConnectionId, address: SocketAddr) {
        if self.sessions.contains_key(&connection) {
            tracing::warn!("Duplicate connect event for session {}", connection);
            return;
        }
        let sender = Arc::new(SessionPacketSender::new(connection, self.transport.clone()));
        let session = NetworkSession::new(
            connection,
            address,
            sender,
            self.context.clone(),
            self.compressor.clone(),
            self.services.clone(),
        );
        self.sessions.insert(connection, session);
    }

    fn on_packet(&mut self, connection: ConnectionId, payload: Bytes) {
        let Some(session) = self.sessions.get(&connection) else {
            tracing::trace!("Packet for unknown session {}", connection);
            return;
        };
        if !session.is_connected() {
            return;
        }
        if payload.first() != Some(&GAME_PACKET_ID) {
            tracing::debug!(
                "Ignoring non-game packet from session {}: {}",
                connection,
                STANDARD.encode(&payload)
            );
            return;
        }

        if let Err(e) = self.handle_payload(connection, &payload[1..]) {
            if e.is_bad_packet() {
                self.handle_bad_packet(connection, &e);
            } else if let Some(session) = self.sessions.get_mut(&connection) {
                tracing::error!("Session {} failed to handle packet: {}", connection, e);
                session.disconnect("Internal server error");
            }
        }
    }

    fn handle_payload(&mut self, connection: ConnectionId, payload: &[u8]) -> Result<()> {
        let packets = match self.sessions.get(&connection) {
            Some(session) => session.decode_payload(payload)?,
            None => return Ok(()),
        };
        for packet in packets {
            let Some(stage) = self.sessions.get(&connection).map(NetworkSession::stage) else {
                return Ok(());
            };
            match (stage, packet) {
                (SessionStage::Login, ServerboundPacket::Login(login)) => self.handle_login(connection, login)?,
                (SessionStage::Login, other) => {
                    tracing::debug!("Session {} sent packet 0x{:02x} before logging in", connection, other.id());
                }
                (SessionStage::Verifying, _) => {
                    tracing::trace!("Dropping packet from session {} during login verification", connection);
                }
                (SessionStage::PreSpawn, ServerboundPacket::RequestChunkRadius(request)) => {
                    self.handle_chunk_radius(connection, request)?
                }
                (SessionStage::PreSpawn | SessionStage::InGame, packet) => self.forward(connection, packet)?,
                (SessionStage::Disconnected, _) => return Ok(()),
            }
        }
        Ok(())
    }

    fn handle_login(&mut self, connection: ConnectionId, packet: LoginPacket) -> Result<()> {
        let decision = handshake::process_login(&packet, &self.config.legacy_protocols)?;
        let connected = self.connection_count();
        let Some(session) = self.sessions.get_mut(&connection) else {
            return Ok(());
        };

        match decision {
            LoginDecision::Rejected { status, reason } => {
                session.send_unversioned(PlayStatusPacket { status }, true)?;
                session.disconnect_without_notify(&reason);
            }
            LoginDecision::Kicked(reason) => session.disconnect(&reason),
            LoginDecision::Verify {
                protocol,
                info,
                chain,
                client_data_jwt,
            } => {
                if connected > self.config.max_players {
                    session.disconnect(handshake::reasons::SERVER_FULL);
                    return Ok(());
                }
                tracing::info!(
                    "Session {} logging in as {} ({}), protocol {}",
                    connection,
                    info.username,
                    info.uuid,
                    protocol
                );
                session.set_player_info(info);
                session.set_stage(SessionStage::Verifying);

                let request = VerificationRequest {
                    connection,
                    chain,
                    client_data_jwt,
                    auth_required: self.config.auth_required,
                };
                self.spawn_verification(request)?;
            }
        }
        Ok(())
    }

    fn spawn_verification(&self, request: VerificationRequest) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeError::InvalidState(format!("Login verification needs a tokio runtime: {}", e)))?;
        let verifier = self.verifier.clone();
        let events = self.events_tx.clone();
        runtime.spawn(async move {
            let connection = request.connection;
            let outcome = handshake::run_verification(verifier, request).await;
            if events
                .send(InterfaceEvent::LoginVerified { connection, outcome })
                .await
                .is_err()
            {
                tracing::debug!("Interface gone before login of session {} was verified", connection);
            }
        });
        Ok(())
    }

    fn on_login_verified(&mut self, connection: ConnectionId, outcome: LoginOutcome) {
        let Some(session) = self.sessions.get_mut(&connection) else {
            tracing::debug!("Session {} left during login verification", connection);
            return;
        };
        if session.stage() != SessionStage::Verifying {
            return;
        }
        if let Some(reason) = outcome.rejection(self.config.auth_required) {
            session.disconnect(&reason);
            return;
        }
        if !outcome.authenticated {
            tracing::debug!("Session {} logged in without an authenticated chain", connection);
        }
        if let Err(e) = self.complete_login(connection) {
            tracing::error!("Failed to complete login of session {}: {}", connection, e);
            if let Some(session) = self.sessions.get_mut(&connection) {
                session.disconnect("Internal server error");
            }
        }
    }

    fn complete_login(&mut self, connection: ConnectionId) -> Result<()> {
        let host = self.host.clone();
        let session = self
            .sessions
            .get_mut(&connection)
            .ok_or_else(|| BridgeError::NotFound(format!("Session {}", connection)))?;
        let info = session
            .player_info()
            .cloned()
            .ok_or_else(|| BridgeError::InvalidState(format!("Session {} has no player info", connection)))?;

        session.set_protocol_version(info.protocol)?;
        session.send_data_packet(PlayStatusPacket { status: LOGIN_SUCCESS }, true)?;

        let bindings = host.create_player(connection, &info)?;
        session.attach_bindings(bindings);
        let world = host.world(connection);
        session.behaviour()?.begin_spawn_sequence(session, &world)
    }

    fn handle_chunk_radius(
        &mut self,
        connection: ConnectionId,
        request: RequestChunkRadiusPacket,
    ) -> Result<()> {
        let world = self.host.world(connection);
        let Some(session) = self.sessions.get_mut(&connection) else {
            return Ok(());
        };
        spawn::handle_request_chunk_radius(session, &request, &world)?;
        self.forward(connection, ServerboundPacket::RequestChunkRadius(request))?;

        if let Some(session) = self.sessions.get_mut(&connection) {
            session.send_data_packet(PlayStatusPacket { status: PLAYER_SPAWN }, false)?;
            session.set_stage(SessionStage::InGame);
            tracing::info!("Session {} spawned", connection);
        }
        Ok(())
    }

    fn forward(&mut self, connection: ConnectionId, packet: ServerboundPacket) -> Result<()> {
        let replies = self.host.handle_game_packet(connection, packet)?;
        if let Some(session) = self.sessions.get_mut(&connection) {
            for reply in replies {
                session.send_data_packet(reply, false)?;
            }
        }
        Ok(())
    }

    fn handle_bad_packet(&mut self, connection: ConnectionId, error: &BridgeError) {
        let Some(session) = self.sessions.get_mut(&connection) else {
            return;
        };
        let error_id = generate_error_id();
        tracing::error!("Bad packet from session {} (Error ID: {}): {}", connection, error_id, error);
        session.disconnect(&format!("Packet processing error (Error ID: {})", error_id));
        self.transport.block_address(session.address().ip(), BAD_PACKET_BLOCK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_id_is_six_hex_bytes() {
        let id = generate_error_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_transport_events_convert() {
        let event: InterfaceEvent = TransportEvent::Disconnect {
            connection: ConnectionId::new(2),
            reason: "timeout".into(),
        }
        .into();
        assert!(matches!(event, InterfaceEvent::Transport(TransportEvent::Disconnect { .. })));
    }
}
