//! Packet batches
//!
//! A batch is the unit handed to compression and to the transport:
//!
//! ```text
//! [{UVARINT length}{UVARINT header}{body}]*
//! ```
//!
//! Batches are serialized once per (serializer context, layout) and shared by
//! reference between every recipient of a broadcast.

use crate::codecs::*;
use crate::context::SerializerContext;
use crate::translator::OutboundPacket;
use bytes::{Buf, Bytes, BytesMut};
use protobridge_core::{BridgeError, Result};

/// Most packets a peer may put in one batch
pub const MAX_PACKETS_PER_BATCH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBatch {
    buffer: Bytes,
}

impl PacketBatch {
    /// Serialize packets in order
    pub fn from_packets<'a>(
        packets: impl IntoIterator<Item = &'a OutboundPacket>,
        context: &SerializerContext,
    ) -> Result<Self> {
        let mut buffer = BytesMut::new();
        let mut scratch = BytesMut::new();
        for packet in packets {
            scratch.clear();
            packet.encode(&mut scratch, context)?;
            write_bytes(&mut buffer, &scratch);
        }
        Ok(Self {
            buffer: buffer.freeze(),
        })
    }

    /// Frame already-encoded packets (header included)
    pub fn from_encoded<'a>(packets: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut buffer = BytesMut::new();
        for packet in packets {
            write_bytes(&mut buffer, packet);
        }
        Self {
            buffer: buffer.freeze(),
        }
    }

    /// Wrap a decompressed batch received from a peer
    pub fn from_raw(buffer: Bytes) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Split into packet payloads (header and body), sharing the batch memory
    pub fn packets(&self) -> Result<Vec<Bytes>> {
        let mut buf = self.buffer.clone();
        let mut packets = Vec::new();
        while buf.has_remaining() {
            if packets.len() == MAX_PACKETS_PER_BATCH {
                return Err(BridgeError::InvalidData(format!(
                    "Too many packets in batch, limit is {}",
                    MAX_PACKETS_PER_BATCH
                )));
            }
            let len = read_uvarint(&mut buf)? as usize;
            if len > buf.remaining() {
                return Err(BridgeError::InvalidData(format!(
                    "Packet length {} exceeds remaining {} bytes",
                    len,
                    buf.remaining()
                )));
            }
            packets.push(buf.split_to(len));
        }
        Ok(packets)
    }
}
