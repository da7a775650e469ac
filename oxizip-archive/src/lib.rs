//! # OxiZip Archive
//!
//! ZIP container support for OxiZip.
//!
//! - **Reader**: locates the end record, loads the central directory once,
//!   and answers lookups through a name-sorted index
//! - **Writer**: stored or deflated entries, alignment, reserved prefix,
//!   pre-compressed data, streaming entries
//! - **Append**: turn a reader into a writer and add entries in place
//! - **Entry handle**: one-entry-at-a-time sequential API over both
//!
//! All storage access goes through [`zip::ZipIo`], a positioned read/write
//! trait, so readers never share a cursor.
//!
//! ## Example
//!
//! ```rust
//! use oxizip_archive::zip::{MemoryIo, ZipFlags, ZipReader, ZipWriter};
//!
//! let mut writer = ZipWriter::new(MemoryIo::new());
//! writer.add_mem("a.txt", b"hello", 6).unwrap();
//! writer.finalize().unwrap();
//!
//! let reader = ZipReader::new(writer.into_inner(), ZipFlags::NONE).unwrap();
//! let index = reader.locate("A.TXT", None, ZipFlags::NONE).unwrap();
//! assert_eq!(reader.extract_to_vec(index, ZipFlags::NONE).unwrap(), b"hello");
//! ```
//!
//! ## Limits
//!
//! Archives are limited to 65535 entries and 4 GiB. Zip64, multi-disk,
//! encrypted, and patched archives are reported as unsupported.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod zip;

// Re-exports
pub use zip::{
    DosDateTime, EntryOptions, FileIo, FileStat, MemoryIo, Mode, Zip, ZipFlags, ZipIo, ZipReader,
    ZipWriter, ZipWriterOptions,
};
