//! # OxiZip Deflate
//!
//! Pure Rust DEFLATE (RFC 1951) and zlib (RFC 1950) codec.
//!
//! Both directions are resumable state machines: they accept input and
//! output in arbitrarily small pieces and report through a status when more
//! of either is needed.
//!
//! ## Features
//!
//! - **Compression**: hash-chain LZ77 with lazy matching, length-limited
//!   Huffman codes
//!   - Stored, static, and dynamic blocks chosen per block
//!   - None, partial, sync, full, and finish flushes
//!   - Strategies: filtered, Huffman-only, RLE, fixed
//! - **Decompression**: all block types, zlib header and Adler-32 trailer
//!   - Linear output buffers or power-of-two ring buffers
//!   - Output is identical however the input is chunked
//!
//! ## Example
//!
//! ```rust
//! use oxizip_deflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1: Fast single-probe matcher
//! - Level 2-3: Greedy parsing
//! - Level 4-9: Lazy parsing with growing probe budgets (default is 6)
//! - Level 10: Maximum probes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod zlib;

// Re-exports
pub use deflate::{DeflateParams, Deflater, Strategy, compress_bound, deflate, deflate_with_params};
pub use huffman::{DecodeTable, Decoded, EncodeTable, build_lengths, kraft_sum};
pub use inflate::{
    InflateFlags, InflateResult, Inflater, StreamInflater, inflate, inflate_to_buffer,
    inflate_with_flags,
};
pub use lz77::{LzToken, Match, MatchFinder};
pub use zlib::{ZlibCompressor, ZlibDecompressor, zlib_compress, zlib_decompress};
