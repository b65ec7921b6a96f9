//! Batch compression codecs

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use protobridge_core::{BridgeError, Result};
use std::fmt::Debug;
use std::io::Read;

/// A compression codec
///
/// Codecs are shared through `Arc<dyn Compressor>`; two connections use the same
/// codec only if they hold the same `Arc`.
pub trait Compressor: Send + Sync + Debug {
    /// Whether a buffer of this size is worth compressing
    fn will_compress(&self, data: &[u8]) -> bool;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Identity of a shared codec, valid while the `Arc` is alive
#[inline]
pub fn compressor_identity(compressor: &std::sync::Arc<dyn Compressor>) -> usize {
    std::sync::Arc::as_ptr(compressor) as *const () as usize
}

pub const DEFAULT_LEVEL: u32 = 7;
pub const DEFAULT_THRESHOLD: usize = 256;
pub const DEFAULT_MAX_DECOMPRESSION_SIZE: usize = 2 * 1024 * 1024;

/// Raw deflate
///
/// Buffers below the threshold are still wrapped in deflate framing, stored at
/// level 0, since peers always inflate.
#[derive(Debug, Clone)]
pub struct ZlibCompressor {
    level: u32,
    threshold: Option<usize>,
    max_decompression_size: usize,
}

impl ZlibCompressor {
    /// `threshold` of `None` never compresses
    pub fn new(level: u32, threshold: Option<usize>, max_decompression_size: usize) -> Self {
        Self {
            level: level.min(9),
            threshold,
            max_decompression_size,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL, Some(DEFAULT_THRESHOLD), DEFAULT_MAX_DECOMPRESSION_SIZE)
    }
}

impl Compressor for ZlibCompressor {
    fn will_compress(&self, data: &[u8]) -> bool {
        self.threshold.is_some_and(|threshold| data.len() >= threshold)
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let level = if self.will_compress(data) { self.level } else { 0 };
        let mut encoder = DeflateEncoder::new(data, Compression::new(level));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| BridgeError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let limit = self.max_decompression_size as u64;
        let mut decoder = DeflateDecoder::new(data).take(limit + 1);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| BridgeError::Compression(e.to_string()))?;
        if decompressed.len() as u64 > limit {
            return Err(BridgeError::Compression(format!(
                "Decompressed size exceeds limit of {} bytes",
                limit
            )));
        }
        Ok(decompressed)
    }
}

/// Codec that never compresses and passes bytes through
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn will_compress(&self, _data: &[u8]) -> bool {
        false
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zlib_roundtrip() {
        let zlib = ZlibCompressor::default();
        let original = vec![0x3e; 1024];
        assert!(zlib.will_compress(&original));

        let compressed = zlib.compress(&original).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(zlib.decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_small_buffers_are_stored() {
        let zlib = ZlibCompressor::default();
        let original = b"Hello, World!";
        assert!(!zlib.will_compress(original));

        let stored = zlib.compress(original).unwrap();
        assert!(stored.len() > original.len());
        assert_eq!(zlib.decompress(&stored).unwrap(), original);
    }

    #[test]
    fn test_decompression_limit() {
        let zlib = ZlibCompressor::new(DEFAULT_LEVEL, Some(0), 100);
        let bomb = zlib.compress(&[0u8; 4096]).unwrap();
        assert!(zlib.decompress(&bomb).is_err());
    }

    #[test]
    fn test_identity_is_by_reference() {
        let a: Arc<dyn Compressor> = Arc::new(ZlibCompressor::default());
        let b: Arc<dyn Compressor> = Arc::new(ZlibCompressor::default());
        assert_eq!(compressor_identity(&a), compressor_identity(&a.clone()));
        assert_ne!(compressor_identity(&a), compressor_identity(&b));
    }
}
