//! # OxiZip Core
//!
//! Core components for the OxiZip codec and archive library.
//!
//! This crate provides the fundamental building blocks shared by the codec
//! and container layers:
//!
//! - [`bitbuf`]: LSB-first bit accumulator for DEFLATE output
//! - [`checksum`]: CRC-32 and Adler-32
//! - [`traits`]: streaming codec traits, statuses, flush mode, and levels
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! OxiZip is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: Front-ends                                          │
//! │     Entry layer (open/write/read/close), CLI           │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     ZIP reader, writer, append-in-place                │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Deflate (LZ77+Huffman), Inflate, zlib wrapper      │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Primitives (this crate)                             │
//! │     BitBuffer, CRC-32, Adler-32, statuses, errors      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxizip_core::bitbuf::BitBuffer;
//! use oxizip_core::checksum::{adler32, Crc32, ADLER32_INIT};
//!
//! let mut bits = BitBuffer::new();
//! bits.put_bits(0b11, 2);
//! bits.align_to_byte();
//! assert_eq!(bits.as_bytes(), &[0b11]);
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! assert_eq!(adler32(ADLER32_INIT, b""), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitbuf;
pub mod checksum;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use bitbuf::{BitBuffer, BitSnapshot};
pub use checksum::{ADLER32_INIT, Adler32, CRC32_INIT, Crc32, adler32, crc32};
pub use error::{OxiZipError, Result};
pub use traits::{
    CompressionLevel, Compressor, Decompressor, DeflateStatus, FlushMode, InflateStatus,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitbuf::BitBuffer;
    pub use crate::checksum::{Adler32, Crc32};
    pub use crate::error::{OxiZipError, Result};
    pub use crate::traits::{
        CompressionLevel, Compressor, Decompressor, DeflateStatus, FlushMode, InflateStatus,
    };
}
