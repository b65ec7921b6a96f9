//! # UDP Transport
//!
//! Reference [`Transport`] over a single `tokio::net::UdpSocket`. Every remote
//! address is one session; datagrams are delivered as-is, without the
//! reliability and fragmentation layer a production transport would add.
//!
//! # Architecture
//!
//! ```text
//! recv loop ──> peers (DashMap addr -> id) ──> mpsc<InterfaceEvent> ──> tick thread
//! tick thread ──> put_packet ──> try_send_to
//! ```
//!
//! Peers silent for longer than the session timeout are reported as
//! disconnected by a periodic sweep.

use crate::config::NetworkConfig;
use crate::interface::InterfaceEvent;
use crate::transport::{Transport, TransportEvent, GAME_PACKET_ID};
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use protobridge_core::{BridgeError, ConnectionId, IdGenerator, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const SOCKET_BUFFER_SIZE: usize = 1024 * 1024;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Peer {
    connection: ConnectionId,
    last_seen: Instant,
}

pub struct UdpTransport {
    socket: UdpSocket,
    max_mtu_size: usize,
    session_timeout: Duration,
    events: mpsc::Sender<InterfaceEvent>,
    ids: IdGenerator,

    /// Key: remote address, Value: its session
    peers: DashMap<SocketAddr, Peer>,
    /// Key: session, Value: remote address
    addresses: DashMap<ConnectionId, SocketAddr>,
    /// Key: blocked ip, Value: when the block ends
    blocked: DashMap<IpAddr, Instant>,
}

impl UdpTransport {
    /// Bind the socket described by the configuration
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `BridgeError::Io` if the socket cannot be created or bound.
    pub fn bind(config: &NetworkConfig, events: mpsc::Sender<InterfaceEvent>) -> Result<Arc<Self>> {
        let address = config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.set_nonblocking(true)?;
        socket.bind(&address.into())?;
        let socket = UdpSocket::from_std(socket.into())?;

        tracing::info!("UDP transport listening on {}", socket.local_addr()?);
        Ok(Arc::new(Self {
            socket,
            max_mtu_size: config.max_mtu_size,
            session_timeout: config.session_timeout,
            events,
            ids: IdGenerator::new(),
            peers: DashMap::new(),
            addresses: DashMap::new(),
            blocked: DashMap::new(),
        }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Receive until the interface drops its end of the channel
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut buf = vec![0u8; self.max_mtu_size];
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            tracing::warn!("UDP receive failed: {}", e);
                            continue;
                        }
                    };
                    let payload = Bytes::copy_from_slice(&buf[..len]);
                    if !self.on_datagram(from, payload).await {
                        break;
                    }
                }
                _ = sweep.tick() => {
                    if !self.sweep_idle().await {
                        break;
                    }
                }
            }
        }

        tracing::info!("UDP transport stopped");
        Ok(())
    }

    fn is_blocked(&self, ip: IpAddr) -> bool {
        let Some(until) = self.blocked.get(&ip).map(|entry| *entry) else {
            return false;
        };
        if until > Instant::now() {
            return true;
        }
        self.blocked.remove(&ip);
        false
    }

    /// Returns false once the interface is gone
    async fn on_datagram(&self, from: SocketAddr, payload: Bytes) -> bool {
        if self.is_blocked(from.ip()) {
            tracing::trace!("Dropping datagram from blocked address {}", from);
            return true;
        }

        let now = Instant::now();
        let existing = self.peers.get_mut(&from).map(|mut peer| {
            peer.last_seen = now;
            peer.connection
        });
        let connection = match existing {
            Some(connection) => connection,
            None => {
                let connection = self.ids.next_id();
                self.peers.insert(
                    from,
                    Peer {
                        connection,
                        last_seen: now,
                    },
                );
                self.addresses.insert(connection, from);
                tracing::debug!("New peer {} as session {}", from, connection);
                let connect = TransportEvent::Connect {
                    connection,
                    address: from,
                };
                if self.events.send(connect.into()).await.is_err() {
                    return false;
                }
                connection
            }
        };

        self.events
            .send(TransportEvent::Packet { connection, payload }.into())
            .await
            .is_ok()
    }

    /// Report peers that went quiet; returns false once the interface is gone
    async fn sweep_idle(&self) -> bool {
        let now = Instant::now();
        let idle: Vec<(SocketAddr, ConnectionId)> = self
            .peers
            .iter()
            .filter(|entry| now.duration_since(entry.last_seen) > self.session_timeout)
            .map(|entry| (*entry.key(), entry.connection))
            .collect();

        for (address, connection) in idle {
            self.peers.remove(&address);
            self.addresses.remove(&connection);
            tracing::debug!("Session {} ({}) timed out", connection, address);
            let event = TransportEvent::Disconnect {
                connection,
                reason: "Timeout".to_string(),
            };
            if self.events.send(event.into()).await.is_err() {
                return false;
            }
        }
        self.blocked.retain(|_, until| *until > now);
        true
    }
}

impl Transport for UdpTransport {
    /// Datagrams are unreliable and unbuffered, so `immediate` changes nothing
    fn put_packet(&self, connection: ConnectionId, payload: Bytes, _immediate: bool) -> Result<()> {
        let address = self
            .addresses
            .get(&connection)
            .map(|entry| *entry)
            .ok_or_else(|| BridgeError::NotFound(format!("Session {}", connection)))?;

        let mut datagram = BytesMut::with_capacity(payload.len() + 1);
        datagram.put_u8(GAME_PACKET_ID);
        datagram.put_slice(&payload);
        if datagram.len() > self.max_mtu_size {
            tracing::warn!(
                "Datagram of {} bytes for session {} exceeds the MTU of {}",
                datagram.len(),
                connection,
                self.max_mtu_size
            );
        }
        self.send_raw(address, datagram.freeze())
    }

    fn close_session(&self, connection: ConnectionId, reason: &str) {
        if let Some((_, address)) = self.addresses.remove(&connection) {
            self.peers.remove(&address);
            tracing::debug!("Closed session {} ({}): {}", connection, address, reason);
        }
    }

    fn block_address(&self, address: IpAddr, timeout: Duration) {
        tracing::info!("Blocking {} for {:?}", address, timeout);
        self.blocked.insert(address, Instant::now() + timeout);
    }

    fn unblock_address(&self, address: IpAddr) {
        if self.blocked.remove(&address).is_some() {
            tracing::info!("Unblocked {}", address);
        }
    }

    fn send_raw(&self, address: SocketAddr, payload: Bytes) -> Result<()> {
        match self.socket.try_send_to(&payload, address) {
            Ok(_) => Ok(()),
            Err(e) => Err(BridgeError::Network(format!("Failed to send to {}: {}", address, e))),
        }
    }
}
