//! # Protobridge Networking Layer
//!
//! Sessions, handshake and broadcast batching for a server that speaks the
//! canonical protocol to current clients and the legacy protocol to older ones.
//!
//! # Architecture
//!
//! ```text
//! UdpTransport ──events──> NetworkInterface ──> NetworkSession ──> PacketSender
//!                               │    │               │
//!                               │    │               └─ SessionBehaviour (canonical | legacy)
//!                               │    └─ PacketBroadcaster (one buffer per context and schema)
//!                               └─ GameHost / LoginVerifier
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Network configuration
//! - [`protocol_state`] - Negotiated protocol version of a session
//! - [`session`] - Per-session send path and compressed queue
//! - [`behaviour`] - Version-dependent session procedures
//! - [`broadcaster`] - Broadcast batching
//! - [`compression_pool`] - Inline or blocking-pool batch compression
//! - [`handshake`] - Login validation and identity chain parsing
//! - [`spawn`] - Start game and chunk radius
//! - [`interface`] - Tick loop and event routing
//! - [`host`] - Game host collaborators
//! - [`transport`] - Transport seam
//! - [`udp`] - Reference UDP transport

pub mod behaviour;
pub mod broadcaster;
pub mod compression_pool;
pub mod config;
pub mod handshake;
pub mod host;
pub mod interface;
pub mod protocol_state;
pub mod session;
pub mod spawn;
pub mod transport;
pub mod udp;

// Re-export commonly used items
pub use behaviour::SessionBehaviour;
pub use broadcaster::{BroadcastReport, PacketBroadcaster};
pub use compression_pool::{CompressBatchPromise, CompressionPool};
pub use config::NetworkConfig;
pub use handshake::{LoginOutcome, OfflineVerifier, PlayerInfo, VerificationRequest};
pub use host::{GameHost, HostBindings, InventorySync, LoginVerifier, PlayerSnapshot, WorldSnapshot};
pub use interface::{event_channel, InterfaceEvent, NetworkInterface};
pub use protocol_state::ProtocolState;
pub use session::{NetworkSession, SessionServices, SessionStage};
pub use transport::{PacketSender, SessionPacketSender, Transport, TransportEvent, GAME_PACKET_ID};
pub use udp::UdpTransport;
