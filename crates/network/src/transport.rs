//! Transport seam
//!
//! The transport owns sockets, peers and address blocking. It reports
//! lifecycle and payloads as [`TransportEvent`]s over the interface channel
//! and accepts outbound payloads through [`Transport::put_packet`].

use bytes::Bytes;
use protobridge_core::{ConnectionId, Result};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Leading byte of every game payload on the wire
pub const GAME_PACKET_ID: u8 = 0xfe;

/// Lifecycle and data notifications from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connect { connection: ConnectionId, address: SocketAddr },
    /// Payload as received, game packet id included
    Packet { connection: ConnectionId, payload: Bytes },
    Disconnect { connection: ConnectionId, reason: String },
}

pub trait Transport: Send + Sync {
    /// Send a compressed batch; the transport adds the game packet id
    fn put_packet(&self, connection: ConnectionId, payload: Bytes, immediate: bool) -> Result<()>;

    /// Forget a session the server closed; no disconnect event follows
    fn close_session(&self, connection: ConnectionId, reason: &str);

    /// Drop datagrams from an address for a while
    fn block_address(&self, address: IpAddr, timeout: Duration);

    fn unblock_address(&self, address: IpAddr);

    /// Send a datagram outside any session
    fn send_raw(&self, address: SocketAddr, payload: Bytes) -> Result<()>;
}

/// Raw send primitive of one session
pub trait PacketSender: Send + Sync + fmt::Debug {
    fn send(&self, payload: Bytes, immediate: bool) -> Result<()>;

    fn close(&self, reason: &str);
}

/// [`PacketSender`] bound to one connection of a [`Transport`]
#[derive(Clone)]
pub struct SessionPacketSender {
    connection: ConnectionId,
    transport: Arc<dyn Transport>,
}

impl SessionPacketSender {
    pub fn new(connection: ConnectionId, transport: Arc<dyn Transport>) -> Self {
        Self { connection, transport }
    }
}

impl fmt::Debug for SessionPacketSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPacketSender")
            .field("connection", &self.connection)
            .finish()
    }
}

impl PacketSender for SessionPacketSender {
    fn send(&self, payload: Bytes, immediate: bool) -> Result<()> {
        self.transport.put_packet(self.connection, payload, immediate)
    }

    fn close(&self, reason: &str) {
        self.transport.close_session(self.connection, reason);
    }
}
