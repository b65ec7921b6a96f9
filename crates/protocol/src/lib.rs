//! # Protobridge Protocol Library
//!
//! Wire-level building blocks of the protocol bridge: codecs, canonical and legacy
//! packet structures, the schema translation table, batch framing and compression.
//!
//! ## Architecture
//!
//! ### 1. Codecs ([`codecs`], [`nbt`])
//! Little-endian fixed-width values, LEB128 varints (zigzag for signed), length
//! prefixed strings, UUIDs, and byte-exact capture of network NBT.
//!
//! ### 2. Serializer context ([`context`])
//! Per-connection encoding rules (the item type dictionary). Shared by `Arc`
//! and compared by identity.
//!
//! ### 3. Packets ([`packets`], [`legacy`], [`types`])
//! Canonical packets as produced by the server core, and the legacy structures
//! for the kinds whose layout changed: actor spawn, player spawn, abilities and
//! start game.
//!
//! ### 4. Translation ([`translator`])
//! Pure canonical to legacy transforms keyed by packet kind, plus the inbound
//! special case for legacy adventure settings.
//!
//! ### 5. Batches and compression ([`batch`], [`compression`])
//! Length-prefixed packet framing and the pluggable compression codec.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use protobridge_protocol::{
//!     ClientboundPacket, ItemTypeDictionary, PacketBatch, SerializerContext, TranslationTable,
//! };
//!
//! # fn spawn_packets() -> Vec<ClientboundPacket> { Vec::new() }
//! let context = SerializerContext::new(ItemTypeDictionary::vanilla_subset());
//! let table = TranslationTable::standard();
//!
//! let translated = table.translate_all(&spawn_packets()).unwrap();
//! let batch = PacketBatch::from_packets(&translated.packets, &context).unwrap();
//! ```

pub mod batch;
pub mod codecs;
pub mod compression;
pub mod context;
pub mod info;
pub mod legacy;
pub mod nbt;
pub mod packets;
pub mod translator;
pub mod types;

// Re-export commonly used items
pub use batch::PacketBatch;
pub use compression::{compressor_identity, Compressor, NoCompression, ZlibCompressor};
pub use context::{ItemTypeDictionary, ItemTypeEntry, SerializerContext};
pub use info::*;
pub use legacy::LegacyPacket;
pub use nbt::CacheableNbt;
pub use packets::{ClientboundPacket, DataPacket, RawPacket, ServerboundPacket};
pub use translator::{OutboundPacket, TranslatedBatch, TranslationTable};
