//! Network NBT capture
//!
//! The bridge never interprets NBT payloads (block states, actor properties); it
//! only needs to find where a tag ends so the bytes can be carried through
//! unchanged. Network NBT is little-endian with varint lengths and ints.

use bytes::{Buf, BufMut, BytesMut};
use protobridge_core::{BridgeError, Result};

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

const MAX_DEPTH: usize = 512;

/// Already-encoded network NBT root tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheableNbt(Vec<u8>);

impl CacheableNbt {
    /// An unnamed, empty compound tag
    pub fn empty_compound() -> Self {
        Self(vec![TAG_COMPOUND, 0x00, TAG_END])
    }

    /// Wrap bytes that are known to hold exactly one root tag
    pub fn from_encoded(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn encoded(&self) -> &[u8] {
        &self.0
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.0);
    }

    /// Read one root tag, capturing its exact bytes
    pub fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        let mut capture = Capture { src: buf, out: Vec::new() };
        let tag = capture.byte()?;
        if tag == TAG_END {
            return Err(BridgeError::InvalidData("NBT root cannot be TAG_End".into()));
        }
        capture.string()?;
        capture.payload(tag, 0)?;
        Ok(Self(capture.out))
    }
}

impl Default for CacheableNbt {
    fn default() -> Self {
        Self::empty_compound()
    }
}

struct Capture<'a, B: Buf> {
    src: &'a mut B,
    out: Vec<u8>,
}

impl<B: Buf> Capture<'_, B> {
    fn take(&mut self, len: usize) -> Result<()> {
        if self.src.remaining() < len {
            return Err(BridgeError::InvalidData("Truncated NBT data".into()));
        }
        let start = self.out.len();
        self.out.resize(start + len, 0);
        self.src.copy_to_slice(&mut self.out[start..]);
        Ok(())
    }

    fn byte(&mut self) -> Result<u8> {
        self.take(1)?;
        Ok(self.out[self.out.len() - 1])
    }

    fn uvar(&mut self, max_bytes: usize) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..max_bytes {
            let b = self.byte()?;
            value |= ((b & 0x7f) as u64) << (i * 7);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BridgeError::InvalidData("NBT varint too long".into()))
    }

    fn signed_len(&mut self) -> Result<usize> {
        let raw = self.uvar(5)? as u32;
        let len = ((raw >> 1) as i32) ^ -((raw & 1) as i32);
        usize::try_from(len).map_err(|_| BridgeError::InvalidData(format!("Negative NBT length {}", len)))
    }

    fn string(&mut self) -> Result<()> {
        let len = self.uvar(5)? as usize;
        self.take(len)
    }

    fn payload(&mut self, tag: u8, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(BridgeError::InvalidData("NBT nesting too deep".into()));
        }
        match tag {
            TAG_BYTE => self.take(1),
            TAG_SHORT => self.take(2),
            TAG_INT => self.uvar(5).map(|_| ()),
            TAG_LONG => self.uvar(10).map(|_| ()),
            TAG_FLOAT => self.take(4),
            TAG_DOUBLE => self.take(8),
            TAG_BYTE_ARRAY => {
                let len = self.signed_len()?;
                self.take(len)
            }
            TAG_STRING => self.string(),
            TAG_LIST => {
                let element = self.byte()?;
                let len = self.signed_len()?;
                if element == TAG_END && len > 0 {
                    return Err(BridgeError::InvalidData("NBT list of TAG_End".into()));
                }
                for _ in 0..len {
                    self.payload(element, depth + 1)?;
                }
                Ok(())
            }
            TAG_COMPOUND => loop {
                let child = self.byte()?;
                if child == TAG_END {
                    return Ok(());
                }
                self.string()?;
                self.payload(child, depth + 1)?;
            },
            TAG_INT_ARRAY => {
                let len = self.signed_len()?;
                for _ in 0..len {
                    self.uvar(5)?;
                }
                Ok(())
            }
            TAG_LONG_ARRAY => {
                let len = self.signed_len()?;
                for _ in 0..len {
                    self.uvar(10)?;
                }
                Ok(())
            }
            other => Err(BridgeError::InvalidData(format!("Unknown NBT tag type {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_compound_capture() {
        let mut buf = BytesMut::from(&[0x0a, 0x00, 0x00, 0xff][..]);
        let nbt = CacheableNbt::read(&mut buf).unwrap();
        assert_eq!(nbt, CacheableNbt::empty_compound());
        // trailing byte untouched
        assert_eq!(&buf[..], &[0xff]);
    }

    #[test]
    fn test_nested_compound_capture() {
        // {"name": "minecraft:stone", "states": {"stone_type": "granite"}, "version": 17959425}
        let mut encoded = BytesMut::new();
        encoded.put_slice(&[TAG_COMPOUND, 0x00]);
        encoded.put_slice(&[TAG_STRING, 4]);
        encoded.put_slice(b"name");
        encoded.put_u8(15);
        encoded.put_slice(b"minecraft:stone");
        encoded.put_slice(&[TAG_COMPOUND, 6]);
        encoded.put_slice(b"states");
        encoded.put_slice(&[TAG_STRING, 10]);
        encoded.put_slice(b"stone_type");
        encoded.put_u8(7);
        encoded.put_slice(b"granite");
        encoded.put_u8(TAG_END);
        encoded.put_slice(&[TAG_INT, 7]);
        encoded.put_slice(b"version");
        encoded.put_slice(&[0x82, 0x80, 0x90, 0x11]);
        encoded.put_slice(&[TAG_LIST, 4]);
        encoded.put_slice(b"list");
        encoded.put_slice(&[TAG_BYTE, 4, 1, 2]);
        encoded.put_u8(TAG_END);

        let expected = encoded.to_vec();
        let nbt = CacheableNbt::read(&mut encoded).unwrap();
        assert_eq!(nbt.encoded(), &expected[..]);
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_truncated_nbt_is_rejected() {
        let mut buf = BytesMut::from(&[0x0a, 0x00, TAG_STRING, 4, b'n'][..]);
        assert!(CacheableNbt::read(&mut buf).is_err());
    }
}
