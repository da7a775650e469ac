//! Zlib format wrapper for DEFLATE (RFC 1950).
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: method 8 (DEFLATE) in the low nibble, log2(window) - 8 above it
//! - FLG: check bits making `(CMF * 256 + FLG) % 31 == 0`; bit 5 is FDICT
//! - ADLER32: checksum of the uncompressed data, big-endian
//!
//! The compressor always writes `78 01`. The decompressor accepts any valid
//! header without a preset dictionary.

use crate::deflate::{DeflateParams, Deflater, deflate_with_params};
use crate::inflate::{InflateFlags, StreamInflater, inflate_with_flags};
use oxizip_core::error::Result;
use oxizip_core::traits::{Decompressor, FlushMode, InflateStatus};

/// Compress `input` into a zlib stream at `level` (0-10).
///
/// # Example
///
/// ```
/// use oxizip_deflate::{zlib_compress, zlib_decompress};
///
/// let packed = zlib_compress(b"zlib zlib zlib zlib", 6).unwrap();
/// assert_eq!(&packed[..2], &[0x78, 0x01]);
/// assert_eq!(zlib_decompress(&packed).unwrap(), b"zlib zlib zlib zlib");
/// ```
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    deflate_with_params(input, DeflateParams::zlib(level))
}

/// Decompress a complete zlib stream, verifying its Adler-32.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    inflate_with_flags(input, InflateFlags::PARSE_ZLIB_HEADER)
}

/// Incremental zlib compressor collecting output in memory.
#[derive(Debug)]
pub struct ZlibCompressor {
    deflater: Deflater,
    output: Vec<u8>,
}

impl ZlibCompressor {
    /// Create a compressor at `level` (0-10).
    pub fn new(level: u8) -> Self {
        Self {
            deflater: Deflater::with_params(DeflateParams::zlib(level)),
            output: Vec::new(),
        }
    }

    /// Feed more data.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.push(data, FlushMode::None)
    }

    /// Flush everything written so far to a byte boundary.
    pub fn sync(&mut self) -> Result<()> {
        self.push(&[], FlushMode::Sync)
    }

    /// Finish the stream and take the compressed bytes.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.push(&[], FlushMode::Finish)?;
        Ok(std::mem::take(&mut self.output))
    }

    /// Start a new stream.
    pub fn reset(&mut self) {
        self.deflater.reset();
        self.output.clear();
    }

    fn push(&mut self, data: &[u8], flush: FlushMode) -> Result<()> {
        let output = &mut self.output;
        self.deflater.compress_to(data, flush, |chunk| {
            output.extend_from_slice(chunk);
            Ok(())
        })?;
        Ok(())
    }
}

/// Incremental zlib decompressor collecting output in memory.
#[derive(Debug)]
pub struct ZlibDecompressor {
    inflater: StreamInflater,
    output: Vec<u8>,
    finished: bool,
}

impl ZlibDecompressor {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self {
            inflater: StreamInflater::zlib(),
            output: Vec::new(),
            finished: false,
        }
    }

    /// Feed more compressed data. Bytes past the end of the stream are ignored.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut pos = 0;
        let mut buf = [0u8; 8192];
        while !self.finished {
            let (consumed, written, status) = self.inflater.decompress(&data[pos..], &mut buf)?;
            pos += consumed;
            self.output.extend_from_slice(&buf[..written]);
            match status {
                InflateStatus::Done => self.finished = true,
                InflateStatus::NeedsMoreInput => break,
                InflateStatus::HasMoreOutput => {}
            }
        }
        Ok(())
    }

    /// Whether the stream trailer has been verified.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take everything decompressed so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Start a new stream.
    pub fn reset(&mut self) {
        self.inflater.reset();
        self.output.clear();
        self.finished = false;
    }
}

impl Default for ZlibDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxizip_core::error::OxiZipError;

    #[test]
    fn test_zlib_header_check_bits() {
        let packed = zlib_compress(b"header", 6).unwrap();
        let header = u16::from_be_bytes([packed[0], packed[1]]);
        assert_eq!(header % 31, 0);
        assert_eq!(packed[0] & 0x0F, 8);
    }

    #[test]
    fn test_zlib_roundtrip_empty() {
        let packed = zlib_compress(&[], 6).unwrap();
        // Header, empty static block, Adler-32 of nothing.
        assert_eq!(packed, vec![0x78, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert!(zlib_decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_decodes_zlib_default_stream() {
        // zlib.compress(b"abc") at the default level (78 9C).
        let packed = [0x78, 0x9C, 0x4B, 0x4C, 0x4A, 0x06, 0x00, 0x02, 0x4D, 0x01, 0x27];
        assert_eq!(zlib_decompress(&packed).unwrap(), b"abc");
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(zlib_decompress(&[0x78, 0x02, 0x03, 0x00]).is_err());
        // Method 7.
        assert!(zlib_decompress(&[0x77, 0x05, 0x03, 0x00]).is_err());
        // Preset dictionary requested.
        assert!(matches!(
            zlib_decompress(&[0x78, 0xBB, 0x00, 0x00, 0x00, 0x01]),
            Err(OxiZipError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_streaming_pair() {
        let mut compressor = ZlibCompressor::new(6);
        for i in 0..200 {
            compressor
                .write(format!("line {i}: the same old text\n").as_bytes())
                .unwrap();
        }
        let packed = compressor.finish().unwrap();

        let mut decompressor = ZlibDecompressor::new();
        for chunk in packed.chunks(17) {
            decompressor.write(chunk).unwrap();
        }
        assert!(decompressor.is_finished());
        let text = String::from_utf8(decompressor.take_output()).unwrap();
        assert!(text.starts_with("line 0: the same old text\nline 1:"));
        assert!(text.ends_with("line 199: the same old text\n"));
    }
}
