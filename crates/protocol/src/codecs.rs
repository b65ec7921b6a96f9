//! Binary codecs for the Bedrock-style wire format
//!
//! Fixed-width integers and floats are little-endian. Variable-length integers use
//! 7 data bits per byte with the high bit as continuation flag (LEB128); signed
//! variants are zigzag encoded first. Strings are prefixed with an unsigned varint
//! byte length.

use bytes::{Buf, BufMut, BytesMut};
use protobridge_core::{BlockPosition, BridgeError, Result, Vector3};
use uuid::Uuid;

/// Trait for structures that have one fixed binary layout
pub trait BinarySerializable: Sized {
    fn write(&self, buf: &mut BytesMut);
    fn read<B: Buf>(buf: &mut B) -> Result<Self>;
}

#[inline]
fn ensure<B: Buf>(buf: &B, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(BridgeError::InvalidData(format!(
            "Not enough bytes for {} (need {}, have {})",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

#[inline]
pub fn write_u8(buf: &mut BytesMut, val: u8) {
    buf.put_u8(val);
}

#[inline]
pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    ensure(buf, 1, "byte")?;
    Ok(buf.get_u8())
}

#[inline]
pub fn write_bool(buf: &mut BytesMut, val: bool) {
    buf.put_u8(val as u8);
}

#[inline]
pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    Ok(read_u8(buf)? != 0)
}

#[inline]
pub fn write_i16_le(buf: &mut BytesMut, val: i16) {
    buf.put_i16_le(val);
}

#[inline]
pub fn read_i16_le<B: Buf>(buf: &mut B) -> Result<i16> {
    ensure(buf, 2, "i16")?;
    Ok(buf.get_i16_le())
}

#[inline]
pub fn write_i32_le(buf: &mut BytesMut, val: i32) {
    buf.put_i32_le(val);
}

#[inline]
pub fn read_i32_le<B: Buf>(buf: &mut B) -> Result<i32> {
    ensure(buf, 4, "i32")?;
    Ok(buf.get_i32_le())
}

#[inline]
pub fn write_u32_le(buf: &mut BytesMut, val: u32) {
    buf.put_u32_le(val);
}

#[inline]
pub fn read_u32_le<B: Buf>(buf: &mut B) -> Result<u32> {
    ensure(buf, 4, "u32")?;
    Ok(buf.get_u32_le())
}

#[inline]
pub fn write_i64_le(buf: &mut BytesMut, val: i64) {
    buf.put_i64_le(val);
}

#[inline]
pub fn read_i64_le<B: Buf>(buf: &mut B) -> Result<i64> {
    ensure(buf, 8, "i64")?;
    Ok(buf.get_i64_le())
}

#[inline]
pub fn write_f32_le(buf: &mut BytesMut, val: f32) {
    buf.put_f32_le(val);
}

#[inline]
pub fn read_f32_le<B: Buf>(buf: &mut B) -> Result<f32> {
    ensure(buf, 4, "f32")?;
    Ok(buf.get_f32_le())
}

#[inline]
pub fn write_f64_le(buf: &mut BytesMut, val: f64) {
    buf.put_f64_le(val);
}

#[inline]
pub fn read_f64_le<B: Buf>(buf: &mut B) -> Result<f64> {
    ensure(buf, 8, "f64")?;
    Ok(buf.get_f64_le())
}

/// Write an unsigned 32-bit varint (1-5 bytes)
#[inline]
pub fn write_uvarint(buf: &mut BytesMut, val: u32) {
    write_uvarlong(buf, val as u64);
}

/// Read an unsigned 32-bit varint
///
/// Fails if the encoding runs past 5 bytes.
pub fn read_uvarint<B: Buf>(buf: &mut B) -> Result<u32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = read_u8(buf)?;
        value |= ((byte & 0x7f) as u32) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(BridgeError::InvalidData("VarInt did not terminate after 5 bytes".into()))
}

/// Write a zigzag-encoded signed 32-bit varint
#[inline]
pub fn write_varint(buf: &mut BytesMut, val: i32) {
    write_uvarint(buf, ((val << 1) ^ (val >> 31)) as u32);
}

#[inline]
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<i32> {
    let raw = read_uvarint(buf)?;
    Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
}

/// Write an unsigned 64-bit varint (1-10 bytes)
pub fn write_uvarlong(buf: &mut BytesMut, mut val: u64) {
    loop {
        let byte = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Read an unsigned 64-bit varint
///
/// Fails if the encoding runs past 10 bytes.
pub fn read_uvarlong<B: Buf>(buf: &mut B) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..10 {
        let byte = read_u8(buf)?;
        value |= ((byte & 0x7f) as u64) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(BridgeError::InvalidData("VarLong did not terminate after 10 bytes".into()))
}

#[inline]
pub fn write_varlong(buf: &mut BytesMut, val: i64) {
    write_uvarlong(buf, ((val << 1) ^ (val >> 63)) as u64);
}

#[inline]
pub fn read_varlong<B: Buf>(buf: &mut B) -> Result<i64> {
    let raw = read_uvarlong(buf)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

/// Write a length-prefixed byte string
#[inline]
pub fn write_bytes(buf: &mut BytesMut, val: &[u8]) {
    write_uvarint(buf, val.len() as u32);
    buf.put_slice(val);
}

/// Read a length-prefixed byte string
pub fn read_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>> {
    let len = read_uvarint(buf)? as usize;
    ensure(buf, len, "string payload")?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Write a length-prefixed UTF-8 string
#[inline]
pub fn write_string(buf: &mut BytesMut, val: &str) {
    write_bytes(buf, val.as_bytes());
}

/// Read a length-prefixed UTF-8 string
pub fn read_string<B: Buf>(buf: &mut B) -> Result<String> {
    let bytes = read_bytes(buf)?;
    String::from_utf8(bytes).map_err(|e| BridgeError::InvalidData(format!("Invalid UTF-8: {}", e)))
}

#[inline]
pub fn write_vec3(buf: &mut BytesMut, val: Vector3) {
    buf.put_f32_le(val.x);
    buf.put_f32_le(val.y);
    buf.put_f32_le(val.z);
}

/// Absent vectors are written as zero
#[inline]
pub fn write_vec3_nullable(buf: &mut BytesMut, val: Option<Vector3>) {
    write_vec3(buf, val.unwrap_or(Vector3::ZERO));
}

#[inline]
pub fn read_vec3<B: Buf>(buf: &mut B) -> Result<Vector3> {
    ensure(buf, 12, "vector3")?;
    Ok(Vector3::new(buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()))
}

/// Write a block position
///
/// # Format
/// - varint x
/// - uvarint y (two's complement reinterpretation of the signed value)
/// - varint z
#[inline]
pub fn write_block_position(buf: &mut BytesMut, val: BlockPosition) {
    write_varint(buf, val.x);
    write_uvarint(buf, val.y as u32);
    write_varint(buf, val.z);
}

#[inline]
pub fn read_block_position<B: Buf>(buf: &mut B) -> Result<BlockPosition> {
    let x = read_varint(buf)?;
    let y = read_uvarint(buf)? as i32;
    let z = read_varint(buf)?;
    Ok(BlockPosition::new(x, y, z))
}

/// Write a UUID as two little-endian 64-bit halves
pub fn write_uuid(buf: &mut BytesMut, val: &Uuid) {
    let bytes = val.as_bytes();
    for half in bytes.chunks_exact(8) {
        for b in half.iter().rev() {
            buf.put_u8(*b);
        }
    }
}

pub fn read_uuid<B: Buf>(buf: &mut B) -> Result<Uuid> {
    ensure(buf, 16, "uuid")?;
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    bytes[0..8].reverse();
    bytes[8..16].reverse();
    Ok(Uuid::from_bytes(bytes))
}

#[inline]
pub fn write_actor_unique_id(buf: &mut BytesMut, val: i64) {
    write_varlong(buf, val);
}

#[inline]
pub fn read_actor_unique_id<B: Buf>(buf: &mut B) -> Result<i64> {
    read_varlong(buf)
}

#[inline]
pub fn write_actor_runtime_id(buf: &mut BytesMut, val: u64) {
    write_uvarlong(buf, val);
}

#[inline]
pub fn read_actor_runtime_id<B: Buf>(buf: &mut B) -> Result<u64> {
    read_uvarlong(buf)
}

/// Read a uvarint element count, rejecting counts the remaining buffer can't hold.
///
/// `min_element_size` is the smallest encoding of one element in bytes.
pub fn read_count<B: Buf>(buf: &mut B, min_element_size: usize) -> Result<usize> {
    let count = read_uvarint(buf)? as usize;
    if count.saturating_mul(min_element_size) > buf.remaining() {
        return Err(BridgeError::InvalidData(format!(
            "Element count {} exceeds remaining {} bytes",
            count,
            buf.remaining()
        )));
    }
    Ok(count)
}
