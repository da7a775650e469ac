//! Status, flush, and level types shared by the codec and container crates.
//!
//! Streaming codecs return a status alongside their byte counts. A status is
//! a scheduling signal ("call me again with more input"), never a failure;
//! failures are reported through [`crate::error::OxiZipError`].

use crate::error::{OxiZipError, Result};

/// Outcome of one call into a streaming decompressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateStatus {
    /// Input was exhausted before the stream ended; supply more and call again.
    NeedsMoreInput,
    /// The output buffer filled up; drain it and call again.
    HasMoreOutput,
    /// The final block (and trailer, if any) was consumed.
    Done,
}

/// Outcome of one call into a streaming compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflateStatus {
    /// Progress was made; the stream is still open or has pending output.
    Okay,
    /// The stream is finished and every byte has been handed out.
    Done,
}

/// Flush mode for compression, mirroring zlib's flush values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub enum FlushMode {
    /// Buffer input internally for the best ratio.
    #[default]
    None,
    /// Emit a block boundary; the dictionary is kept.
    Partial,
    /// Emit a block boundary followed by an empty stored block.
    Sync,
    /// Like `Sync`, and forget the dictionary so the stream can be entered here.
    Full,
    /// Emit the final block and trailer. No more input is accepted.
    Finish,
}

impl FlushMode {
    /// Parse a zlib flush constant (0 none, 1 partial, 2 sync, 3 full, 4 finish).
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Partial),
            2 => Ok(Self::Sync),
            3 => Ok(Self::Full),
            4 => Ok(Self::Finish),
            other => Err(OxiZipError::invalid_parameter(format!(
                "invalid flush value {other}"
            ))),
        }
    }

    /// Whether this mode forces the current block out.
    pub fn is_flush(self) -> bool {
        self != Self::None
    }
}

impl TryFrom<i32> for FlushMode {
    type Error = OxiZipError;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_raw(value)
    }
}

/// Compression level (0-10). 10 is "uber" and searches hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression (store only).
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression.
    pub const DEFAULT: Self = Self(6);
    /// Best zlib-compatible compression.
    pub const BEST: Self = Self(9);
    /// Slowest, most thorough search.
    pub const UBER: Self = Self(10);

    /// Create a new compression level, clamped to 0-10.
    pub fn new(level: u8) -> Self {
        Self(level.min(10))
    }

    /// Get the numeric level.
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Whether this level stores data without compressing it.
    pub fn is_store(&self) -> bool {
        self.0 == 0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for CompressionLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

/// A streaming decompressor.
///
/// Implementations keep their state between calls, so the input may be fed
/// in arbitrary pieces and the output drained through a buffer of any size.
pub trait Decompressor {
    /// Decompress from `input` into `output`.
    ///
    /// Returns `(bytes consumed, bytes written, status)`.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, InflateStatus)>;

    /// Reset to the initial state.
    fn reset(&mut self);

    /// Whether the end of the stream has been reached.
    fn is_finished(&self) -> bool;

    /// Decompress a complete stream held in memory.
    fn decompress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) =
                self.decompress(&input[input_pos..], &mut buffer)?;
            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            match status {
                InflateStatus::Done => break,
                InflateStatus::NeedsMoreInput if input_pos >= input.len() => {
                    return Err(OxiZipError::corrupted(
                        input_pos as u64,
                        "truncated stream",
                    ));
                }
                InflateStatus::NeedsMoreInput | InflateStatus::HasMoreOutput => continue,
            }
        }

        Ok(output)
    }
}

/// A streaming compressor.
pub trait Compressor {
    /// Compress from `input` into `output` under `flush`.
    ///
    /// Returns `(bytes consumed, bytes written, status)`. When the output
    /// buffer fills up the call returns early; call again with the unconsumed
    /// input and the same flush mode.
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, DeflateStatus)>;

    /// Reset to the initial state.
    fn reset(&mut self);

    /// Whether the stream has been finished and fully drained.
    fn is_finished(&self) -> bool;

    /// Compress a complete buffer and finish the stream.
    fn compress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) =
                self.compress(&input[input_pos..], &mut buffer, FlushMode::Finish)?;
            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            if status == DeflateStatus::Done {
                break;
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::new(5).level(), 5);
        assert_eq!(CompressionLevel::new(15).level(), 10);
        assert_eq!(CompressionLevel::default(), CompressionLevel::DEFAULT);
        assert!(CompressionLevel::NONE.is_store());
    }

    #[test]
    fn test_flush_from_raw() {
        assert_eq!(FlushMode::from_raw(0).ok(), Some(FlushMode::None));
        assert_eq!(FlushMode::from_raw(3).ok(), Some(FlushMode::Full));
        assert_eq!(FlushMode::try_from(4).ok(), Some(FlushMode::Finish));
        assert!(matches!(
            FlushMode::from_raw(7),
            Err(OxiZipError::InvalidParameter { .. })
        ));
        assert!(FlushMode::from_raw(-1).is_err());
    }

    #[test]
    fn test_flush_ordering() {
        assert!(!FlushMode::None.is_flush());
        assert!(FlushMode::Sync.is_flush());
        assert!(FlushMode::Finish > FlushMode::Full);
    }
}
