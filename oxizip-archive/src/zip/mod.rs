//! ZIP archive format support.
//!
//! Reading and writing of classic (non-zip64) ZIP archives as described in
//! the PKWARE APPNOTE, with stored and deflated entries.

pub mod handle;
pub mod header;
pub mod io;
mod reader;
mod writer;

pub use handle::{Mode, Zip, safe_relative_path, zip_create, zip_extract};
pub use header::DosDateTime;
pub use io::{FileIo, MemoryIo, ZipIo};
pub use reader::{FileStat, ZipFlags, ZipReader};
pub use writer::{EntryOptions, EntryWriter, ZipWriter, ZipWriterOptions, validate_name};

use oxizip_core::error::Result;

/// Open an in-memory archive for reading.
pub fn read_zip(data: Vec<u8>) -> Result<ZipReader<MemoryIo>> {
    ZipReader::new(MemoryIo::from_vec(data), ZipFlags::NONE)
}

/// Start a new in-memory archive.
pub fn write_zip() -> ZipWriter<MemoryIo> {
    ZipWriter::new(MemoryIo::new())
}
