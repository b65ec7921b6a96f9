//! Login, status and view distance packets

use super::DataPacket;
use crate::codecs::*;
use crate::context::SerializerContext;
use crate::info::PacketKind;
use bytes::{Buf, BufMut, BytesMut};
use protobridge_core::{BridgeError, Result};

/// Client login
///
/// # Format
/// ```text
/// {I32 BE protocol}{UVARINT request length}
///   {I32 LE chain length}{JSON {"chain": [jwt, ...]}}
///   {I32 LE client data length}{JWT client data}
/// ```
///
/// The chain is kept as JSON text; the handshake parses and verifies it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginPacket {
    pub protocol: i32,
    pub chain_data_json: String,
    pub client_data_jwt: String,
}

fn read_le_prefixed_string<B: Buf>(buf: &mut B) -> Result<String> {
    let len = read_i32_le(buf)?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= buf.remaining())
        .ok_or_else(|| BridgeError::InvalidData(format!("Invalid login field length {}", len)))?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|e| BridgeError::InvalidData(format!("Invalid UTF-8: {}", e)))
}

impl DataPacket for LoginPacket {
    const KIND: PacketKind = PacketKind::Login;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        buf.put_i32(self.protocol);
        let mut request = BytesMut::new();
        write_i32_le(&mut request, self.chain_data_json.len() as i32);
        request.put_slice(self.chain_data_json.as_bytes());
        write_i32_le(&mut request, self.client_data_jwt.len() as i32);
        request.put_slice(self.client_data_jwt.as_bytes());
        write_bytes(buf, &request);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(BridgeError::InvalidData("Login packet too short".into()));
        }
        let protocol = buf.get_i32();
        let request = read_bytes(buf)?;
        let mut request = &request[..];
        Ok(Self {
            protocol,
            chain_data_json: read_le_prefixed_string(&mut request)?,
            client_data_jwt: read_le_prefixed_string(&mut request)?,
        })
    }
}

/// Login and spawn status codes
pub mod play_status {
    pub const LOGIN_SUCCESS: i32 = 0;
    pub const LOGIN_FAILED_CLIENT: i32 = 1;
    pub const LOGIN_FAILED_SERVER: i32 = 2;
    pub const PLAYER_SPAWN: i32 = 3;
    pub const LOGIN_FAILED_INVALID_TENANT: i32 = 4;
    pub const LOGIN_FAILED_VANILLA_EDU: i32 = 5;
    pub const LOGIN_FAILED_EDU_VANILLA: i32 = 6;
    pub const LOGIN_FAILED_SERVER_FULL: i32 = 7;
}

/// `{I32 BE status}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayStatusPacket {
    pub status: i32,
}

impl DataPacket for PlayStatusPacket {
    const KIND: PacketKind = PacketKind::PlayStatus;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        buf.put_i32(self.status);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(BridgeError::InvalidData("Play status packet too short".into()));
        }
        Ok(Self { status: buf.get_i32() })
    }
}

/// `{BOOL hide screen}[{STRING message}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectPacket {
    /// `None` hides the disconnection screen
    pub message: Option<String>,
}

impl DisconnectPacket {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

impl DataPacket for DisconnectPacket {
    const KIND: PacketKind = PacketKind::Disconnect;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_bool(buf, self.message.is_none());
        if let Some(message) = &self.message {
            write_string(buf, message);
        }
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        let hide = read_bool(buf)?;
        Ok(Self {
            message: if hide { None } else { Some(read_string(buf)?) },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestChunkRadiusPacket {
    pub radius: i32,
}

impl DataPacket for RequestChunkRadiusPacket {
    const KIND: PacketKind = PacketKind::RequestChunkRadius;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_varint(buf, self.radius);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self { radius: read_varint(buf)? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRadiusUpdatedPacket {
    pub radius: i32,
}

impl DataPacket for ChunkRadiusUpdatedPacket {
    const KIND: PacketKind = PacketKind::ChunkRadiusUpdated;

    fn encode(&self, buf: &mut BytesMut, _context: &SerializerContext) -> Result<()> {
        write_varint(buf, self.radius);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B, _context: &SerializerContext) -> Result<Self> {
        Ok(Self { radius: read_varint(buf)? })
    }
}
