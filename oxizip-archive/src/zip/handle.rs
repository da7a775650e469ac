//! Sequential entry-at-a-time access to an archive.
//!
//! [`Zip`] wraps a reader or writer and tracks one open entry. Reading code
//! opens an entry by name or index and pulls its data; writing code opens a
//! new entry, pushes data into it, and closes it.
//!
//! ```
//! use oxizip_archive::zip::{MemoryIo, Mode, Zip};
//!
//! let mut zip = Zip::open(MemoryIo::new(), 6, Mode::Write).unwrap();
//! zip.entry_open("hello.txt").unwrap();
//! zip.entry_write(b"Hello, ").unwrap();
//! zip.entry_write(b"World!").unwrap();
//! zip.entry_close().unwrap();
//! let io = zip.close().unwrap();
//!
//! let mut zip = Zip::open(io, 0, Mode::Read).unwrap();
//! zip.entry_open("HELLO.TXT").unwrap();
//! assert_eq!(zip.entry_read().unwrap(), b"Hello, World!");
//! ```

use super::header::DosDateTime;
use super::io::{FileIo, MemoryIo, ZipIo};
use super::reader::{FileStat, ZipFlags, ZipReader};
use super::writer::{EntryWriter, ZipWriter};
use oxizip_core::error::{OxiZipError, Result};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// How an archive handle is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read entries of an existing archive.
    Read,
    /// Write a new archive from scratch.
    Write,
    /// Add entries to an existing archive in place.
    Append,
}

#[derive(Debug)]
enum Archive<I: ZipIo> {
    Reader(ZipReader<I>),
    Writer(ZipWriter<I>),
}

#[derive(Debug)]
enum OpenEntry {
    Reading(FileStat),
    Writing(EntryWriter),
}

/// Archive handle with at most one open entry.
#[derive(Debug)]
pub struct Zip<I: ZipIo> {
    archive: Archive<I>,
    level: u8,
    entry: Option<OpenEntry>,
}

impl<I: ZipIo> Zip<I> {
    /// Open `io` in `mode`. `level` (0-10) applies to entries written
    /// through this handle.
    pub fn open(io: I, level: u8, mode: Mode) -> Result<Self> {
        let archive = match mode {
            Mode::Read => Archive::Reader(ZipReader::new(io, ZipFlags::NONE)?),
            Mode::Write => Archive::Writer(ZipWriter::new(io)),
            Mode::Append => Archive::Writer(ZipReader::new(io, ZipFlags::NONE)?.into_writer()?),
        };
        Ok(Self {
            archive,
            level,
            entry: None,
        })
    }

    /// Whether the handle was opened for reading.
    pub fn is_reading(&self) -> bool {
        matches!(self.archive, Archive::Reader(_))
    }

    /// The reader behind a read handle.
    pub fn reader(&self) -> Option<&ZipReader<I>> {
        match &self.archive {
            Archive::Reader(reader) => Some(reader),
            Archive::Writer(_) => None,
        }
    }

    /// Entries in the archive, including ones written through this handle.
    pub fn total_entries(&self) -> usize {
        match &self.archive {
            Archive::Reader(reader) => reader.total_entries(),
            Archive::Writer(writer) => writer.total_entries(),
        }
    }

    /// Open the entry called `name`.
    ///
    /// Backslashes in `name` are treated as `/`. In read mode the entry is
    /// looked up case-insensitively; in write modes a new entry is started.
    pub fn entry_open(&mut self, name: &str) -> Result<()> {
        self.check_no_entry()?;
        let name = if name.contains('\\') {
            Cow::Owned(name.replace('\\', "/"))
        } else {
            Cow::Borrowed(name)
        };

        let entry = match &mut self.archive {
            Archive::Reader(reader) => {
                let index = reader
                    .locate(&name, None, ZipFlags::NONE)
                    .ok_or_else(|| OxiZipError::entry_not_found(name.as_ref()))?;
                OpenEntry::Reading(reader.file_stat(index)?)
            }
            Archive::Writer(writer) => OpenEntry::Writing(writer.begin_entry(&name, self.level)?),
        };
        self.entry = Some(entry);
        Ok(())
    }

    /// Open entry `index` of a read handle.
    pub fn entry_open_by_index(&mut self, index: usize) -> Result<()> {
        self.check_no_entry()?;
        let Archive::Reader(reader) = &self.archive else {
            return Err(OxiZipError::invalid_state(
                "entries can only be opened by index when reading",
            ));
        };
        self.entry = Some(OpenEntry::Reading(reader.file_stat(index)?));
        Ok(())
    }

    /// Append data to the entry open for writing.
    pub fn entry_write(&mut self, data: &[u8]) -> Result<()> {
        match (&mut self.archive, &mut self.entry) {
            (Archive::Writer(writer), Some(OpenEntry::Writing(entry))) => {
                writer.write_entry(entry, data)
            }
            _ => Err(OxiZipError::invalid_state("no entry open for writing")),
        }
    }

    /// Read the whole open entry into a new vector.
    pub fn entry_read(&self) -> Result<Vec<u8>> {
        let (reader, stat) = self.reading()?;
        reader.extract_to_vec(stat.index, ZipFlags::NONE)
    }

    /// Read the open entry into `buf`, returning the bytes written.
    pub fn entry_read_no_alloc(&self, buf: &mut [u8]) -> Result<usize> {
        let (reader, stat) = self.reading()?;
        reader.extract_to_buffer(stat.index, buf, ZipFlags::NONE)
    }

    /// Stream the open entry through `callback` as (offset, chunk) pairs.
    pub fn entry_extract<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> io::Result<()>,
    {
        let (reader, stat) = self.reading()?;
        reader.extract_to_callback(stat.index, ZipFlags::NONE, callback)
    }

    /// Close the open entry. A written entry is recorded in the archive.
    pub fn entry_close(&mut self) -> Result<()> {
        match self.entry.take() {
            None => Err(OxiZipError::invalid_state("no entry is open")),
            Some(OpenEntry::Reading(_)) => Ok(()),
            Some(OpenEntry::Writing(entry)) => match &mut self.archive {
                Archive::Writer(writer) => writer.finish_entry(entry),
                Archive::Reader(_) => Err(OxiZipError::invalid_state("no entry open for writing")),
            },
        }
    }

    /// Name of the open entry.
    pub fn entry_name(&self) -> Result<&str> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => &stat.name,
            OpenEntry::Writing(entry) => entry.name(),
        })
    }

    /// Central directory index of the open entry. A written entry gets the
    /// next free index.
    pub fn entry_index(&self) -> Result<usize> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => stat.index,
            OpenEntry::Writing(_) => self.total_entries(),
        })
    }

    /// Whether the open entry is a directory.
    pub fn entry_is_dir(&self) -> Result<bool> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => stat.is_directory,
            OpenEntry::Writing(entry) => entry.name().ends_with('/'),
        })
    }

    /// Uncompressed size of the open entry (bytes written so far when writing).
    pub fn entry_size(&self) -> Result<u64> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => stat.uncompressed_size,
            OpenEntry::Writing(entry) => entry.uncompressed_size(),
        })
    }

    /// CRC-32 of the open entry (of the bytes written so far when writing).
    pub fn entry_crc32(&self) -> Result<u32> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => stat.crc32,
            OpenEntry::Writing(entry) => entry.crc32(),
        })
    }

    /// Modification time of the open entry.
    pub fn entry_time(&self) -> Result<DosDateTime> {
        Ok(match self.open_entry()? {
            OpenEntry::Reading(stat) => stat.time,
            OpenEntry::Writing(entry) => entry.modified(),
        })
    }

    /// Close the handle and give back the storage.
    ///
    /// Write handles are finalized; an entry still open for writing is
    /// dropped first.
    pub fn close(mut self) -> Result<I> {
        match self.archive {
            Archive::Reader(reader) => Ok(reader.into_inner()),
            Archive::Writer(mut writer) => {
                if let Some(OpenEntry::Writing(entry)) = self.entry.take() {
                    writer.abort_entry(entry);
                }
                writer.finalize()?;
                Ok(writer.into_inner())
            }
        }
    }

    fn check_no_entry(&self) -> Result<()> {
        if self.entry.is_some() {
            return Err(OxiZipError::invalid_state(
                "another entry is still open; close it first",
            ));
        }
        Ok(())
    }

    fn open_entry(&self) -> Result<&OpenEntry> {
        self.entry
            .as_ref()
            .ok_or_else(|| OxiZipError::invalid_state("no entry is open"))
    }

    fn reading(&self) -> Result<(&ZipReader<I>, &FileStat)> {
        match (&self.archive, &self.entry) {
            (Archive::Reader(reader), Some(OpenEntry::Reading(stat))) => {
                if stat.is_directory {
                    return Err(OxiZipError::invalid_parameter(format!(
                        "{} is a directory",
                        stat.name
                    )));
                }
                Ok((reader, stat))
            }
            _ => Err(OxiZipError::invalid_state("no entry open for reading")),
        }
    }
}

impl Zip<FileIo> {
    /// Open the archive at `path`. Write mode creates or truncates the file.
    pub fn open_path(path: impl AsRef<Path>, level: u8, mode: Mode) -> Result<Self> {
        let io = match mode {
            Mode::Read => FileIo::open(path)?,
            Mode::Write => FileIo::create(path)?,
            Mode::Append => FileIo::open_rw(path)?,
        };
        Self::open(io, level, mode)
    }
}

impl Zip<MemoryIo> {
    /// Open an archive held in memory.
    pub fn from_bytes(data: Vec<u8>, level: u8, mode: Mode) -> Result<Self> {
        Self::open(MemoryIo::from_vec(data), level, mode)
    }
}

/// Write a new archive at `path` holding `files` as (name, contents) pairs.
pub fn zip_create<N, D>(
    path: impl AsRef<Path>,
    files: impl IntoIterator<Item = (N, D)>,
    level: u8,
) -> Result<()>
where
    N: AsRef<str>,
    D: AsRef<[u8]>,
{
    let mut writer = ZipWriter::new(FileIo::create(path)?);
    for (name, data) in files {
        writer.add_mem(name.as_ref(), data.as_ref(), level)?;
    }
    writer.finalize()
}

/// Extract every entry of the archive at `path` below `dir`.
///
/// `on_extract` is called with each path after it is written. Entries whose
/// names would land outside `dir` are rejected. Returns the number of
/// entries extracted.
pub fn zip_extract<F>(
    path: impl AsRef<Path>,
    dir: impl AsRef<Path>,
    mut on_extract: F,
) -> Result<usize>
where
    F: FnMut(&Path),
{
    let reader = ZipReader::new(FileIo::open(path)?, ZipFlags::NONE)?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    for index in 0..reader.total_entries() {
        let stat = reader.file_stat(index)?;
        let target = dir.join(safe_relative_path(&stat.name)?);
        if stat.is_directory {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = io::BufWriter::new(fs::File::create(&target)?);
            reader.extract_to_writer(index, &mut file, ZipFlags::NONE)?;
            io::Write::flush(&mut file)?;
        }
        on_extract(&target);
    }

    log::debug!(
        "extracted {} entries into {}",
        reader.total_entries(),
        dir.display()
    );
    Ok(reader.total_entries())
}

/// Turn an entry name into a relative path that stays below its root.
pub fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(&name.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(OxiZipError::invalid_name(
                    name,
                    "escapes the extraction directory",
                ));
            }
        }
    }
    if path.as_os_str().is_empty() {
        return Err(OxiZipError::invalid_name(name, "empty path"));
    }
    Ok(path)
}
