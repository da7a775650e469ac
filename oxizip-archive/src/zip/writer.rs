//! ZIP archive writer.
//!
//! Entries are written front to back. Each one gets a local header followed
//! by its data, and a matching central directory record is kept in memory
//! until [`ZipWriter::finalize`] writes the directory and end record.
//!
//! The in-memory directory only changes after an entry is completely
//! written, so a failed add never leaves a half-described entry behind.

use super::header::{
    CentralHeader, DIRECTORY_EXTERNAL_ATTR, DosDateTime, EOCD_SIZE, EndOfCentralDir,
    CENTRAL_HEADER_SIZE, FILE_EXTERNAL_ATTR, FLAG_UTF8, LOCAL_HEADER_SIZE, LocalHeader,
    METHOD_DEFLATED, METHOD_STORED, VERSION_MADE_BY, VERSION_NEEDED_DEFLATE,
};
use super::io::ZipIo;
use super::reader::{ZipFlags, ZipReader};
use oxizip_core::checksum::Crc32;
use oxizip_core::error::{OxiZipError, Result};
use oxizip_core::traits::{CompressionLevel, FlushMode};
use oxizip_deflate::{Deflater, deflate};
use std::borrow::Cow;

/// Largest archive the classic format can describe.
const MAX_ARCHIVE_SIZE: u64 = 0xFFFF_FFFF;

/// Largest entry count the classic format can describe.
const MAX_ENTRIES: usize = 0xFFFF;

/// Payloads this small are always stored.
const MIN_DEFLATE_SIZE: usize = 3;

/// Archive-wide writer settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZipWriterOptions {
    /// Start every local header on a multiple of this many bytes
    /// (0 for none, otherwise a power of two).
    pub alignment: u64,
    /// Zero bytes to leave at the start of the archive.
    pub reserved_prefix: u64,
}

/// Per-entry settings for [`ZipWriter::add_mem_ex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOptions {
    /// Compression level 0-10. With `COMPRESSED_DATA`, nonzero marks the
    /// data as deflated.
    pub level: u8,
    /// Entry comment.
    pub comment: String,
    /// `COMPRESSED_DATA` means the data is already a raw deflate stream.
    pub flags: ZipFlags,
    /// Uncompressed size of pre-compressed data.
    pub uncompressed_size: u64,
    /// CRC-32 of the uncompressed form of pre-compressed data.
    pub crc32: u32,
    /// Modification time; the current time when `None`.
    pub modified: Option<DosDateTime>,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::DEFAULT.level(),
            comment: String::new(),
            flags: ZipFlags::NONE,
            uncompressed_size: 0,
            crc32: 0,
            modified: None,
        }
    }
}

/// State of an entry being written piece by piece.
///
/// Created by [`ZipWriter::begin_entry`] and handed back to
/// [`ZipWriter::write_entry`] and [`ZipWriter::finish_entry`].
#[derive(Debug)]
pub struct EntryWriter {
    name: String,
    local_header_offset: u64,
    cursor: u64,
    crc: Crc32,
    uncompressed_size: u64,
    deflater: Option<Deflater>,
    // First bytes of a deflated entry, stored instead if nothing follows.
    head: Vec<u8>,
    modified: DosDateTime,
    failed: bool,
}

impl EntryWriter {
    /// Entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes written so far.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// CRC-32 of the bytes written so far.
    pub fn crc32(&self) -> u32 {
        self.crc.value()
    }

    /// Modification time recorded for the entry.
    pub fn modified(&self) -> DosDateTime {
        self.modified
    }

    fn data_offset(&self) -> u64 {
        self.local_header_offset + (LOCAL_HEADER_SIZE + self.name.len()) as u64
    }

    fn method(&self) -> u16 {
        if self.deflater.is_some() {
            METHOD_DEFLATED
        } else {
            METHOD_STORED
        }
    }
}

/// Describes one entry for its headers.
struct EntryRecord<'a> {
    name: &'a str,
    comment: &'a str,
    method: u16,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
}

impl EntryRecord<'_> {
    fn flags(&self) -> u16 {
        if self.name.is_ascii() && self.comment.is_ascii() {
            0
        } else {
            FLAG_UTF8
        }
    }

    fn version_needed(&self) -> u16 {
        if self.method == METHOD_DEFLATED {
            VERSION_NEEDED_DEFLATE
        } else {
            0
        }
    }

    fn local_header(&self) -> LocalHeader {
        let (time, date) = self.modified.to_dos();
        LocalHeader {
            version_needed: self.version_needed(),
            flags: self.flags(),
            method: self.method,
            time,
            date,
            crc32: self.crc32,
            compressed_size: self.compressed_size as u32,
            uncompressed_size: self.uncompressed_size as u32,
            name_len: self.name.len() as u16,
            extra_len: 0,
        }
    }

    fn central_header(&self) -> CentralHeader {
        let (time, date) = self.modified.to_dos();
        CentralHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: self.version_needed(),
            flags: self.flags(),
            method: self.method,
            time,
            date,
            crc32: self.crc32,
            compressed_size: self.compressed_size as u32,
            uncompressed_size: self.uncompressed_size as u32,
            name_len: self.name.len() as u16,
            extra_len: 0,
            comment_len: self.comment.len() as u16,
            disk_start: 0,
            internal_attr: 0,
            external_attr: if self.name.ends_with('/') {
                DIRECTORY_EXTERNAL_ATTR
            } else {
                FILE_EXTERNAL_ATTR
            },
            local_header_offset: self.local_header_offset as u32,
        }
    }
}

/// ZIP archive writer over positioned storage.
#[derive(Debug)]
pub struct ZipWriter<I: ZipIo> {
    io: I,
    options: ZipWriterOptions,
    central_dir: Vec<u8>,
    total_entries: usize,
    offset: u64,
    entry_in_progress: bool,
    finalized: bool,
}

impl<I: ZipIo> ZipWriter<I> {
    /// Start a new archive at the beginning of `io`.
    pub fn new(io: I) -> Self {
        Self {
            io,
            options: ZipWriterOptions::default(),
            central_dir: Vec::new(),
            total_entries: 0,
            offset: 0,
            entry_in_progress: false,
            finalized: false,
        }
    }

    /// Start a new archive with alignment and a reserved prefix.
    pub fn with_options(io: I, options: ZipWriterOptions) -> Result<Self> {
        if options.alignment != 0 && !options.alignment.is_power_of_two() {
            return Err(OxiZipError::invalid_parameter(format!(
                "alignment {} is not a power of two",
                options.alignment
            )));
        }
        if options.reserved_prefix > MAX_ARCHIVE_SIZE {
            return Err(OxiZipError::unsupported("zip64"));
        }
        let mut writer = Self {
            options,
            ..Self::new(io)
        };
        writer.write_zeros(0, options.reserved_prefix)?;
        writer.offset = options.reserved_prefix;
        Ok(writer)
    }

    /// Continue an existing archive in place.
    ///
    /// New entries are written where the old central directory began; the
    /// old directory records are kept and rewritten on finalize.
    pub fn from_reader(reader: ZipReader<I>) -> Result<Self> {
        let (io, central_dir, total_entries, cd_offset) = reader.into_parts();
        log::debug!(
            "appending to archive with {} entries at offset {}",
            total_entries,
            cd_offset
        );
        Ok(Self {
            io,
            options: ZipWriterOptions::default(),
            central_dir,
            total_entries,
            offset: cd_offset,
            entry_in_progress: false,
            finalized: false,
        })
    }

    /// Entries written so far.
    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    /// Bytes used by the archive so far.
    pub fn archive_size(&self) -> u64 {
        self.offset
    }

    /// Whether [`finalize`](Self::finalize) has completed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The underlying storage.
    pub fn get_ref(&self) -> &I {
        &self.io
    }

    /// Mutable access to the underlying storage.
    pub fn get_mut(&mut self) -> &mut I {
        &mut self.io
    }

    /// Give back the underlying storage. Does not finalize.
    pub fn into_inner(self) -> I {
        self.io
    }

    /// Add an entry from memory at compression `level` (0-10).
    pub fn add_mem(&mut self, name: &str, data: &[u8], level: u8) -> Result<()> {
        self.add_mem_ex(
            name,
            data,
            &EntryOptions {
                level,
                ..EntryOptions::default()
            },
        )
    }

    /// Add an entry from memory with full control over its metadata.
    pub fn add_mem_ex(&mut self, name: &str, data: &[u8], options: &EntryOptions) -> Result<()> {
        self.check_open()?;
        validate_name(name)?;
        if options.comment.len() > usize::from(u16::MAX) {
            return Err(OxiZipError::invalid_parameter("entry comment too long"));
        }
        let is_dir = name.ends_with('/');
        if is_dir && !data.is_empty() {
            return Err(OxiZipError::invalid_parameter(format!(
                "directory entry {name} cannot carry data"
            )));
        }

        let level = CompressionLevel::new(options.level).level();
        let raw = options.flags.contains(ZipFlags::COMPRESSED_DATA);
        let (crc32, uncompressed_size) = if raw {
            (options.crc32, options.uncompressed_size)
        } else {
            (Crc32::compute(data), data.len() as u64)
        };

        let (method, payload): (u16, Cow<'_, [u8]>) = if raw {
            let method = if level == 0 { METHOD_STORED } else { METHOD_DEFLATED };
            (method, Cow::Borrowed(data))
        } else if level == 0 || data.len() <= MIN_DEFLATE_SIZE {
            (METHOD_STORED, Cow::Borrowed(data))
        } else {
            (METHOD_DEFLATED, Cow::Owned(deflate(data, level)?))
        };

        let padding = self.padding();
        let local_header_offset = self.offset + padding;
        let record = EntryRecord {
            name,
            comment: &options.comment,
            method,
            modified: options.modified.unwrap_or_else(DosDateTime::now),
            crc32,
            compressed_size: payload.len() as u64,
            uncompressed_size,
            local_header_offset,
        };
        let data_offset = local_header_offset + (LOCAL_HEADER_SIZE + name.len()) as u64;
        let end = data_offset + payload.len() as u64;
        self.check_room(end, &record)?;

        self.write_zeros(self.offset, padding)?;
        self.io
            .write_all_at(local_header_offset, &record.local_header().to_bytes())?;
        self.io
            .write_all_at(local_header_offset + LOCAL_HEADER_SIZE as u64, name.as_bytes())?;
        self.io.write_all_at(data_offset, &payload)?;

        self.push_record(&record);
        self.offset = end;
        log::debug!(
            "added {}: {} -> {} bytes (method {})",
            name,
            uncompressed_size,
            payload.len(),
            method
        );
        Ok(())
    }

    /// Add a directory entry. A trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = if name.ends_with('/') {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(format!("{name}/"))
        };
        self.add_mem_ex(
            &name,
            &[],
            &EntryOptions {
                level: 0,
                ..EntryOptions::default()
            },
        )
    }

    /// Start an entry whose data will arrive in pieces.
    ///
    /// Only one entry can be in progress; other adds fail until it is
    /// finished or aborted.
    pub fn begin_entry(&mut self, name: &str, level: u8) -> Result<EntryWriter> {
        self.begin_entry_at(name, level, DosDateTime::now())
    }

    /// Like [`begin_entry`](Self::begin_entry) with an explicit modification time.
    pub fn begin_entry_at(
        &mut self,
        name: &str,
        level: u8,
        modified: DosDateTime,
    ) -> Result<EntryWriter> {
        self.check_open()?;
        validate_name(name)?;
        let level = CompressionLevel::new(level).level();

        let padding = self.padding();
        let local_header_offset = self.offset + padding;
        let mut entry = EntryWriter {
            name: name.to_string(),
            local_header_offset,
            cursor: 0,
            crc: Crc32::new(),
            uncompressed_size: 0,
            deflater: (level > 0 && !name.ends_with('/')).then(|| Deflater::new(level)),
            head: Vec::new(),
            modified,
            failed: false,
        };
        entry.cursor = entry.data_offset();
        let record = entry_record(&entry, 0);
        self.check_room(entry.cursor, &record)?;

        // Sizes and CRC are patched in when the entry is finished.
        self.write_zeros(self.offset, padding)?;
        self.io
            .write_all_at(local_header_offset, &record.local_header().to_bytes())?;
        self.io
            .write_all_at(local_header_offset + LOCAL_HEADER_SIZE as u64, name.as_bytes())?;

        self.entry_in_progress = true;
        Ok(entry)
    }

    /// Append data to an entry started with [`begin_entry`](Self::begin_entry).
    ///
    /// After an error the entry is unusable; abort or finish it (finishing
    /// reports the earlier failure) and the archive stays consistent.
    pub fn write_entry(&mut self, entry: &mut EntryWriter, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(OxiZipError::Finalized);
        }
        if !self.entry_in_progress || entry.failed {
            return Err(OxiZipError::invalid_state("entry is not open for writing"));
        }
        if entry.name.ends_with('/') && !data.is_empty() {
            return Err(OxiZipError::invalid_parameter(format!(
                "directory entry {} cannot carry data",
                entry.name
            )));
        }

        let result = self.write_entry_data(entry, data);
        if result.is_err() {
            entry.failed = true;
        }
        result
    }

    fn write_entry_data(&mut self, entry: &mut EntryWriter, data: &[u8]) -> Result<()> {
        entry.crc.update(data);
        entry.uncompressed_size += data.len() as u64;
        if entry.deflater.is_some() && entry.head.len() < MIN_DEFLATE_SIZE {
            let take = (MIN_DEFLATE_SIZE - entry.head.len()).min(data.len());
            entry.head.extend_from_slice(&data[..take]);
        }

        let io = &mut self.io;
        let cursor = &mut entry.cursor;
        match entry.deflater.as_mut() {
            Some(deflater) => {
                deflater.compress_to(data, FlushMode::None, |chunk| {
                    io.write_all_at(*cursor, chunk)?;
                    *cursor += chunk.len() as u64;
                    Ok(())
                })?;
            }
            None => {
                io.write_all_at(*cursor, data)?;
                *cursor += data.len() as u64;
            }
        }

        if entry.cursor > MAX_ARCHIVE_SIZE || entry.uncompressed_size > MAX_ARCHIVE_SIZE {
            return Err(OxiZipError::unsupported("zip64"));
        }
        Ok(())
    }

    /// Complete an entry: flush the compressor, patch the local header, and
    /// record it in the central directory.
    pub fn finish_entry(&mut self, mut entry: EntryWriter) -> Result<()> {
        if self.finalized {
            return Err(OxiZipError::Finalized);
        }
        if !self.entry_in_progress {
            return Err(OxiZipError::invalid_state("no entry in progress"));
        }
        self.entry_in_progress = false;
        if entry.failed {
            return Err(OxiZipError::invalid_state(format!(
                "entry {} failed while writing and was discarded",
                entry.name
            )));
        }

        if let Some(mut deflater) = entry.deflater.take() {
            if entry.uncompressed_size <= MIN_DEFLATE_SIZE as u64 {
                // Tiny payloads go out stored, over any deflate output so far.
                let data_offset = entry.data_offset();
                self.io.write_all_at(data_offset, &entry.head)?;
                entry.cursor = data_offset + entry.head.len() as u64;
            } else {
                let io = &mut self.io;
                let cursor = &mut entry.cursor;
                deflater.compress_to(&[], FlushMode::Finish, |chunk| {
                    io.write_all_at(*cursor, chunk)?;
                    *cursor += chunk.len() as u64;
                    Ok(())
                })?;
                entry.deflater = Some(deflater);
            }
        }

        let record = entry_record(&entry, entry.cursor - entry.data_offset());
        self.check_room(entry.cursor, &record)?;
        self.io
            .write_all_at(entry.local_header_offset, &record.local_header().to_bytes())?;

        self.push_record(&record);
        self.offset = entry.cursor;
        log::debug!(
            "added {}: {} -> {} bytes (method {})",
            entry.name,
            entry.uncompressed_size,
            record.compressed_size,
            record.method
        );
        Ok(())
    }

    /// Give up on an entry. Its bytes are overwritten by whatever comes next.
    pub fn abort_entry(&mut self, entry: EntryWriter) {
        log::debug!("discarded entry {}", entry.name);
        self.entry_in_progress = false;
    }

    /// Write the central directory and end record.
    ///
    /// Runs once; afterwards every add and a second finalize fail with
    /// [`OxiZipError::Finalized`].
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(OxiZipError::Finalized);
        }
        if self.entry_in_progress {
            return Err(OxiZipError::invalid_state("an entry is still being written"));
        }

        let cd_offset = self.offset;
        let cd_size = self.central_dir.len() as u64;
        let end = cd_offset + cd_size + EOCD_SIZE as u64;
        if end > MAX_ARCHIVE_SIZE {
            return Err(OxiZipError::unsupported("zip64"));
        }

        let eocd = EndOfCentralDir {
            entries_on_disk: self.total_entries as u16,
            total_entries: self.total_entries as u16,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            ..EndOfCentralDir::default()
        };
        let mut record = Vec::with_capacity(EOCD_SIZE);
        eocd.write(&mut record);

        self.io.write_all_at(cd_offset, &self.central_dir)?;
        self.io.write_all_at(cd_offset + cd_size, &record)?;
        if self.io.size() > end {
            self.io.truncate(end)?;
        }
        self.io.flush()?;

        self.offset = end;
        self.finalized = true;
        log::debug!(
            "finalized archive: {} entries, {} bytes",
            self.total_entries,
            end
        );
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(OxiZipError::Finalized);
        }
        if self.entry_in_progress {
            return Err(OxiZipError::invalid_state("an entry is still being written"));
        }
        Ok(())
    }

    /// Zero bytes needed before the next local header.
    fn padding(&self) -> u64 {
        match self.options.alignment {
            0 => 0,
            align => (align - (self.offset & (align - 1))) & (align - 1),
        }
    }

    fn write_zeros(&mut self, offset: u64, count: u64) -> Result<()> {
        let zeros = [0u8; 4096];
        let mut done = 0u64;
        while done < count {
            let n = zeros.len().min((count - done) as usize);
            self.io.write_all_at(offset + done, &zeros[..n])?;
            done += n as u64;
        }
        Ok(())
    }

    /// Fail before writing if an entry ending at `data_end` would push the
    /// archive past what the classic format can describe.
    fn check_room(&self, data_end: u64, record: &EntryRecord<'_>) -> Result<()> {
        if self.total_entries >= MAX_ENTRIES {
            return Err(OxiZipError::unsupported("zip64"));
        }
        let directory = (self.central_dir.len()
            + CENTRAL_HEADER_SIZE
            + record.name.len()
            + record.comment.len()
            + EOCD_SIZE) as u64;
        if record.uncompressed_size > MAX_ARCHIVE_SIZE || data_end + directory > MAX_ARCHIVE_SIZE {
            return Err(OxiZipError::unsupported("zip64"));
        }
        Ok(())
    }

    fn push_record(&mut self, record: &EntryRecord<'_>) {
        record.central_header().write(&mut self.central_dir);
        self.central_dir.extend_from_slice(record.name.as_bytes());
        self.central_dir.extend_from_slice(record.comment.as_bytes());
        self.total_entries += 1;
    }
}

fn entry_record(entry: &EntryWriter, compressed_size: u64) -> EntryRecord<'_> {
    EntryRecord {
        name: &entry.name,
        comment: "",
        method: if compressed_size == 0 && entry.uncompressed_size == 0 {
            METHOD_STORED
        } else {
            entry.method()
        },
        modified: entry.modified,
        crc32: entry.crc.value(),
        compressed_size,
        uncompressed_size: entry.uncompressed_size,
        local_header_offset: entry.local_header_offset,
    }
}

/// Check that `name` is a portable entry name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OxiZipError::invalid_name(name, "empty name"));
    }
    if name.len() > usize::from(u16::MAX) {
        return Err(OxiZipError::unsupported("zip64"));
    }
    if name.starts_with('/') {
        return Err(OxiZipError::invalid_name(name, "leading '/'"));
    }
    if name.contains('\\') {
        return Err(OxiZipError::invalid_name(name, "contains '\\'"));
    }
    if name.contains(':') {
        return Err(OxiZipError::invalid_name(name, "contains ':'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::io::MemoryIo;
    use std::io;

    fn fixed_time() -> DosDateTime {
        DosDateTime::from_unix(1_709_210_096)
    }

    fn reopen(writer: ZipWriter<MemoryIo>) -> ZipReader<MemoryIo> {
        ZipReader::new(writer.into_inner(), ZipFlags::NONE).unwrap()
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name("dir/sub/b.bin").is_ok());
        for bad in ["", "/abs", "dir\\file", "c:file"] {
            assert!(
                matches!(validate_name(bad), Err(OxiZipError::InvalidName { .. })),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_empty_archive() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.finalize().unwrap();
        assert_eq!(writer.archive_size(), EOCD_SIZE as u64);
        let reader = reopen(writer);
        assert_eq!(reader.total_entries(), 0);
    }

    #[test]
    fn test_small_payloads_are_stored() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_mem("tiny", b"abc", 9).unwrap();
        writer.add_mem("big", &[b'x'; 1000], 9).unwrap();
        writer.add_mem("plain", &[b'y'; 1000], 0).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        let methods: Vec<u16> = (0..3).map(|i| reader.file_stat(i).unwrap().method).collect();
        assert_eq!(methods, vec![METHOD_STORED, METHOD_DEFLATED, METHOD_STORED]);
        assert_eq!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap(), vec![b'x'; 1000]);
    }

    #[test]
    fn test_finalize_twice_and_add_after_finalize() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_mem("a", b"1", 6).unwrap();
        writer.finalize().unwrap();
        assert!(writer.is_finalized());
        assert!(matches!(writer.finalize(), Err(OxiZipError::Finalized)));
        assert!(matches!(
            writer.add_mem("b", b"2", 6),
            Err(OxiZipError::Finalized)
        ));
        assert!(matches!(
            writer.begin_entry("c", 6),
            Err(OxiZipError::Finalized)
        ));
    }

    #[test]
    fn test_invalid_name_leaves_archive_usable() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        assert!(writer.add_mem("/etc/passwd", b"x", 6).is_err());
        writer.add_mem("ok.txt", b"fine", 6).unwrap();
        writer.finalize().unwrap();
        assert_eq!(reopen(writer).total_entries(), 1);
    }

    #[test]
    fn test_alignment() {
        let options = ZipWriterOptions {
            alignment: 64,
            reserved_prefix: 0,
        };
        let mut writer = ZipWriter::with_options(MemoryIo::new(), options).unwrap();
        writer.add_mem("one", b"first entry", 0).unwrap();
        writer.add_mem("two", b"second entry", 0).unwrap();
        writer.add_mem("three", b"third entry", 6).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        for index in 0..3 {
            let stat = reader.file_stat(index).unwrap();
            assert_eq!(stat.local_header_offset % 64, 0, "{}", stat.name);
        }
        reader.validate().unwrap();
    }

    #[test]
    fn test_bad_alignment_rejected() {
        let options = ZipWriterOptions {
            alignment: 12,
            reserved_prefix: 0,
        };
        assert!(matches!(
            ZipWriter::with_options(MemoryIo::new(), options),
            Err(OxiZipError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_reserved_prefix() {
        let options = ZipWriterOptions {
            alignment: 0,
            reserved_prefix: 100,
        };
        let mut writer = ZipWriter::with_options(MemoryIo::new(), options).unwrap();
        writer.add_mem("after-prefix", b"data", 6).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        assert_eq!(reader.file_stat(0).unwrap().local_header_offset, 100);
        assert!(reader.get_ref().as_slice()[..100].iter().all(|&b| b == 0));
        assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"data");
    }

    #[test]
    fn test_directory_entry() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_directory("docs").unwrap();
        assert!(writer.add_mem("dir/", b"oops", 6).is_err());
        writer.finalize().unwrap();

        let reader = reopen(writer);
        let stat = reader.file_stat(0).unwrap();
        assert_eq!(stat.name, "docs/");
        assert!(stat.is_directory);
        assert_eq!(stat.external_attr, DIRECTORY_EXTERNAL_ATTR);
        assert!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap().is_empty());
    }

    #[test]
    fn test_entry_options() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        let options = EntryOptions {
            comment: "first".to_string(),
            modified: Some(fixed_time()),
            ..EntryOptions::default()
        };
        writer.add_mem_ex("notes.txt", b"some notes", &options).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        let stat = reader.file_stat(0).unwrap();
        assert_eq!(stat.comment, "first");
        assert_eq!(stat.time.to_string(), "2024-02-29 12:34:56");
        assert_eq!(reader.locate("NOTES.txt", Some("first"), ZipFlags::NONE), Some(0));
        assert_eq!(reader.locate("notes.txt", Some("second"), ZipFlags::NONE), None);
    }

    #[test]
    fn test_precompressed_data() {
        let data = b"precompressed precompressed precompressed".repeat(20);
        let packed = deflate(&data, 9).unwrap();
        let options = EntryOptions {
            flags: ZipFlags::COMPRESSED_DATA,
            uncompressed_size: data.len() as u64,
            crc32: Crc32::compute(&data),
            ..EntryOptions::default()
        };
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_mem_ex("raw.txt", &packed, &options).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), data);
        assert_eq!(
            reader.extract_to_vec(0, ZipFlags::COMPRESSED_DATA).unwrap(),
            packed
        );
    }

    #[test]
    fn test_streaming_entry() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        let mut entry = writer.begin_entry_at("log.txt", 6, fixed_time()).unwrap();
        assert!(matches!(
            writer.add_mem("other", b"x", 6),
            Err(OxiZipError::InvalidState { .. })
        ));
        let mut expected = Vec::new();
        for i in 0..500 {
            let line = format!("event {i} happened\n");
            writer.write_entry(&mut entry, line.as_bytes()).unwrap();
            expected.extend_from_slice(line.as_bytes());
        }
        assert_eq!(entry.uncompressed_size(), expected.len() as u64);
        writer.finish_entry(entry).unwrap();

        let empty = writer.begin_entry("empty.txt", 6).unwrap();
        writer.finish_entry(empty).unwrap();
        writer.add_mem("after", b"after streaming", 6).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        assert_eq!(reader.total_entries(), 3);
        let stat = reader.file_stat(0).unwrap();
        assert_eq!(stat.method, METHOD_DEFLATED);
        assert!(stat.compressed_size < stat.uncompressed_size);
        assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), expected);
        assert_eq!(reader.file_stat(1).unwrap().method, METHOD_STORED);
        assert!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap().is_empty());
        assert_eq!(reader.extract_to_vec(2, ZipFlags::NONE).unwrap(), b"after streaming");
    }

    #[test]
    fn test_tiny_streamed_entries_are_stored() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        for (name, pieces) in [
            ("one", &[&b"x"[..]][..]),
            ("three", &[&b"a"[..], b"", b"bc"][..]),
            ("four", &[&b"ab"[..], b"cd"][..]),
        ] {
            let mut entry = writer.begin_entry(name, 9).unwrap();
            for piece in pieces {
                writer.write_entry(&mut entry, piece).unwrap();
            }
            writer.finish_entry(entry).unwrap();
        }
        writer.finalize().unwrap();

        let reader = reopen(writer);
        let one = reader.file_stat(0).unwrap();
        assert_eq!(one.method, METHOD_STORED);
        assert_eq!(one.compressed_size, 1);
        assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"x");

        let three = reader.file_stat(1).unwrap();
        assert_eq!(three.method, METHOD_STORED);
        assert_eq!(three.compressed_size, 3);
        assert_eq!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap(), b"abc");
        let four = reader.file_stat(2).unwrap();
        // Leftover deflate output of "three" is overwritten by the next entry.
        assert_eq!(
            four.local_header_offset,
            three.local_header_offset + (LOCAL_HEADER_SIZE + "three".len() + 3) as u64
        );
        assert_eq!(four.method, METHOD_DEFLATED);
        assert_eq!(reader.extract_to_vec(2, ZipFlags::NONE).unwrap(), b"abcd");
        reader.validate().unwrap();
    }

    #[test]
    fn test_aborted_entry_leaves_no_trace() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_mem("keep", b"kept", 6).unwrap();
        let mut entry = writer.begin_entry("drop", 6).unwrap();
        writer.write_entry(&mut entry, &[7u8; 10_000]).unwrap();
        writer.abort_entry(entry);
        writer.finalize().unwrap();

        let reader = reopen(writer);
        assert_eq!(reader.total_entries(), 1);
        assert_eq!(reader.locate("drop", None, ZipFlags::NONE), None);
        reader.validate().unwrap();
    }

    /// Storage that refuses writes past a limit.
    struct FailingIo {
        inner: MemoryIo,
        limit: u64,
        armed: bool,
    }

    impl ZipIo for FailingIo {
        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read_at(offset, buf)
        }

        fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
            if self.armed && offset + buf.len() as u64 > self.limit {
                self.armed = false;
                return Err(io::Error::other("disk full"));
            }
            self.inner.write_at(offset, buf)
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.inner.truncate(len)
        }
    }

    #[test]
    fn test_failed_add_still_finalizes() {
        let io = FailingIo {
            inner: MemoryIo::new(),
            limit: 200,
            armed: true,
        };
        let mut writer = ZipWriter::new(io);
        writer.add_mem("small", b"fits", 0).unwrap();
        let err = writer.add_mem("large", &[1u8; 4096], 0).unwrap_err();
        assert!(matches!(err, OxiZipError::Io(_)));
        assert_eq!(writer.total_entries(), 1);

        writer.finalize().unwrap();
        let reader = ZipReader::new(writer.into_inner().inner, ZipFlags::NONE).unwrap();
        assert_eq!(reader.total_entries(), 1);
        assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"fits");
    }

    #[test]
    fn test_failed_stream_write_still_finalizes() {
        let io = FailingIo {
            inner: MemoryIo::new(),
            limit: 1000,
            armed: true,
        };
        let mut writer = ZipWriter::new(io);
        let mut entry = writer.begin_entry("stream", 0).unwrap();
        assert!(writer.write_entry(&mut entry, &[2u8; 5000]).is_err());
        assert!(writer.write_entry(&mut entry, b"more").is_err());
        assert!(writer.finish_entry(entry).is_err());

        writer.add_mem("next", b"next entry", 6).unwrap();
        writer.finalize().unwrap();
        let reader = ZipReader::new(writer.into_inner().inner, ZipFlags::NONE).unwrap();
        assert_eq!(reader.total_entries(), 1);
        assert_eq!(reader.file_name(0).unwrap(), "next");
        reader.validate().unwrap();
    }

    #[test]
    fn test_utf8_flag() {
        let mut writer = ZipWriter::new(MemoryIo::new());
        writer.add_mem("ascii.txt", b"a", 6).unwrap();
        writer.add_mem("ünïcödé.txt", b"u", 6).unwrap();
        writer.finalize().unwrap();

        let reader = reopen(writer);
        assert_eq!(reader.file_stat(0).unwrap().flags & FLAG_UTF8, 0);
        assert_eq!(reader.file_stat(1).unwrap().flags & FLAG_UTF8, FLAG_UTF8);
        assert_eq!(reader.locate("ünïcödé.txt", None, ZipFlags::NONE), Some(1));
    }
}
