//! ZIP archive reader.
//!
//! The central directory is loaded once as a single byte blob. Entries are
//! addressed through an offset table into that blob, and a second table sorted
//! by case-folded name gives logarithmic lookups.

use super::header::{
    CENTRAL_HEADER_SIZE, CentralHeader, DOS_DIRECTORY_ATTR, DosDateTime, EOCD_SIZE,
    END_OF_CENTRAL_DIR_SIG, EndOfCentralDir, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, FLAG_PATCH,
    FLAG_STRONG_ENCRYPTION, LOCAL_HEADER_SIZE, LocalHeader, METHOD_DEFLATED, METHOD_STORED,
    ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG, ZIP64_LOCATOR_SIZE,
};
use super::io::ZipIo;
use super::writer::ZipWriter;
use oxizip_core::checksum::Crc32;
use oxizip_core::error::{OxiZipError, Result};
use oxizip_core::traits::{Decompressor, InflateStatus};
use oxizip_deflate::{InflateFlags, Inflater, StreamInflater};
use std::cmp::Ordering;
use std::io::{self, Write};
use std::ops::BitOr;

/// Bytes read per step while scanning backwards for the end record.
const EOCD_SCAN_CHUNK: usize = 4096;

/// The end record starts no further back than its own size plus a maximal
/// comment.
const MAX_EOCD_SEARCH: u64 = 0xFFFF + EOCD_SIZE as u64;

/// Compressed bytes read per step during extraction.
const READ_CHUNK: usize = 64 * 1024;

/// Output chunk handed to sinks during streaming extraction.
const OUTPUT_CHUNK: usize = 32 * 1024;

/// Options for opening, locating, and extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ZipFlags(u32);

impl ZipFlags {
    /// No options.
    pub const NONE: Self = Self(0);
    /// Match names byte for byte instead of ASCII case-insensitively.
    pub const CASE_SENSITIVE: Self = Self(0x0100);
    /// Match only the part of stored names after the last separator.
    pub const IGNORE_PATH: Self = Self(0x0200);
    /// Read or write the entry's compressed bytes as they are.
    pub const COMPRESSED_DATA: Self = Self(0x0400);
    /// Skip building the sorted name index when opening.
    pub const DO_NOT_SORT_CENTRAL_DIRECTORY: Self = Self(0x0800);

    /// Raw bit value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ZipFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Metadata for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Position in the central directory.
    pub index: usize,
    /// Offset of the entry's central directory record in the archive.
    pub central_dir_offset: u64,
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flag.
    pub flags: u16,
    /// Compression method.
    pub method: u16,
    /// Modification time as stored.
    pub time: DosDateTime,
    /// Modification time in seconds since the Unix epoch (UTC).
    pub modified: i64,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
    /// Internal attributes.
    pub internal_attr: u16,
    /// External attributes.
    pub external_attr: u32,
    /// Offset of the local header.
    pub local_header_offset: u64,
    /// Entry name.
    pub name: String,
    /// Entry comment.
    pub comment: String,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Whether this reader can extract the entry without `COMPRESSED_DATA`.
    pub is_supported: bool,
}

/// Location of an entry's data, checked against its local header.
struct EntryData {
    stat: FileStat,
    data_offset: u64,
    raw: bool,
}

/// ZIP archive reader over positioned storage.
#[derive(Debug)]
pub struct ZipReader<I: ZipIo> {
    io: I,
    flags: ZipFlags,
    archive_size: u64,
    cd_offset: u64,
    central_dir: Vec<u8>,
    offsets: Vec<u32>,
    sorted: Vec<u32>,
    comment: Vec<u8>,
}

impl<I: ZipIo> ZipReader<I> {
    /// Open an archive and load its central directory.
    pub fn new(io: I, flags: ZipFlags) -> Result<Self> {
        let archive_size = io.size();
        if archive_size < EOCD_SIZE as u64 {
            return Err(OxiZipError::corrupted(0, "too small to be a ZIP archive"));
        }

        let eocd_pos = find_eocd(&io, archive_size)?;
        let mut buf = [0u8; EOCD_SIZE];
        io.read_exact_at(eocd_pos, &mut buf)?;
        let eocd = EndOfCentralDir::parse(&buf, eocd_pos)?;

        if eocd_pos >= ZIP64_LOCATOR_SIZE as u64 {
            let mut sig = [0u8; 4];
            io.read_exact_at(eocd_pos - ZIP64_LOCATOR_SIZE as u64, &mut sig)?;
            if u32::from_le_bytes(sig) == ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG {
                return Err(OxiZipError::unsupported("zip64"));
            }
        }
        if eocd.is_zip64() {
            return Err(OxiZipError::unsupported("zip64"));
        }
        if eocd.is_multi_disk() {
            return Err(OxiZipError::unsupported("multi-disk archive"));
        }

        let total = usize::from(eocd.total_entries);
        let cd_offset = u64::from(eocd.cd_offset);
        let cd_size = u64::from(eocd.cd_size);
        if cd_size < (total * CENTRAL_HEADER_SIZE) as u64 || cd_offset + cd_size > eocd_pos {
            return Err(OxiZipError::corrupted(
                eocd_pos,
                "central directory lies outside the archive",
            ));
        }

        let comment_len =
            u64::from(eocd.comment_len).min(archive_size - eocd_pos - EOCD_SIZE as u64);
        let mut comment = vec![0u8; comment_len as usize];
        io.read_exact_at(eocd_pos + EOCD_SIZE as u64, &mut comment)?;

        let mut central_dir = vec![0u8; cd_size as usize];
        io.read_exact_at(cd_offset, &mut central_dir)?;

        let mut offsets = Vec::with_capacity(total);
        let mut pos = 0usize;
        for _ in 0..total {
            let record_offset = cd_offset + pos as u64;
            let header = CentralHeader::parse(&central_dir[pos..], record_offset)?;
            validate_record(&header, archive_size, record_offset)?;
            let end = pos + header.record_len();
            if end > central_dir.len() {
                return Err(OxiZipError::corrupted(
                    record_offset,
                    "central directory record overruns the directory",
                ));
            }
            offsets.push(pos as u32);
            pos = end;
        }
        central_dir.truncate(pos);

        let mut sorted = Vec::new();
        if !flags.contains(ZipFlags::DO_NOT_SORT_CENTRAL_DIRECTORY) {
            sorted = (0..total as u32).collect();
            sorted.sort_by(|&a, &b| {
                compare_folded(
                    record_name(&central_dir, offsets[a as usize] as usize),
                    record_name(&central_dir, offsets[b as usize] as usize),
                )
            });
        }

        log::debug!(
            "opened ZIP archive: {} entries, central directory at {} ({} bytes)",
            total,
            cd_offset,
            cd_size
        );

        Ok(Self {
            io,
            flags,
            archive_size,
            cd_offset,
            central_dir,
            offsets,
            sorted,
            comment,
        })
    }

    /// Number of entries in the central directory.
    pub fn total_entries(&self) -> usize {
        self.offsets.len()
    }

    /// Size of the archive in bytes.
    pub fn archive_size(&self) -> u64 {
        self.archive_size
    }

    /// Offset where the central directory starts.
    pub fn central_dir_offset(&self) -> u64 {
        self.cd_offset
    }

    /// Archive comment bytes.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Flags the reader was opened with.
    pub fn flags(&self) -> ZipFlags {
        self.flags
    }

    /// The underlying storage.
    pub fn get_ref(&self) -> &I {
        &self.io
    }

    /// Give back the underlying storage.
    pub fn into_inner(self) -> I {
        self.io
    }

    /// Switch to writing, appending new entries in place.
    ///
    /// New entries overwrite the old central directory; a fresh one is
    /// written on finalize.
    pub fn into_writer(self) -> Result<ZipWriter<I>> {
        ZipWriter::from_reader(self)
    }

    /// Split into storage, central directory blob, and directory offset.
    pub(crate) fn into_parts(self) -> (I, Vec<u8>, usize, u64) {
        let total = self.offsets.len();
        (self.io, self.central_dir, total, self.cd_offset)
    }

    fn record_offset(&self, index: usize) -> Result<usize> {
        self.offsets
            .get(index)
            .map(|&off| off as usize)
            .ok_or_else(|| {
                OxiZipError::invalid_parameter(format!(
                    "entry index {index} out of range ({} entries)",
                    self.offsets.len()
                ))
            })
    }

    /// Metadata for entry `index`.
    pub fn file_stat(&self, index: usize) -> Result<FileStat> {
        let off = self.record_offset(index)?;
        let header = CentralHeader::parse(&self.central_dir[off..], self.cd_offset + off as u64)?;
        let name = record_name(&self.central_dir, off);
        let comment = record_comment(&self.central_dir, off);
        let time = DosDateTime::from_dos(header.time, header.date);

        Ok(FileStat {
            index,
            central_dir_offset: self.cd_offset + off as u64,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            method: header.method,
            time,
            modified: time.to_unix(),
            crc32: header.crc32,
            compressed_size: u64::from(header.compressed_size),
            uncompressed_size: u64::from(header.uncompressed_size),
            internal_attr: header.internal_attr,
            external_attr: header.external_attr,
            local_header_offset: u64::from(header.local_header_offset),
            name: String::from_utf8_lossy(name).into_owned(),
            comment: String::from_utf8_lossy(comment).into_owned(),
            is_directory: is_directory_record(name, header.external_attr),
            is_supported: header.method == METHOD_STORED || header.method == METHOD_DEFLATED,
        })
    }

    /// Name of entry `index`.
    pub fn file_name(&self, index: usize) -> Result<String> {
        let off = self.record_offset(index)?;
        Ok(String::from_utf8_lossy(record_name(&self.central_dir, off)).into_owned())
    }

    /// Whether entry `index` is a directory.
    pub fn is_directory(&self, index: usize) -> Result<bool> {
        let off = self.record_offset(index)?;
        let header = CentralHeader::parse(&self.central_dir[off..], self.cd_offset + off as u64)?;
        Ok(is_directory_record(
            record_name(&self.central_dir, off),
            header.external_attr,
        ))
    }

    /// Find the entry called `name`.
    ///
    /// Names compare ASCII case-insensitively unless `CASE_SENSITIVE` is set.
    /// With no comment and no path or case options the sorted index is
    /// searched; everything else falls back to a linear scan.
    pub fn locate(&self, name: &str, comment: Option<&str>, flags: ZipFlags) -> Option<usize> {
        let name = name.as_bytes();
        if name.is_empty() || name.len() > usize::from(u16::MAX) {
            return None;
        }

        let case_sensitive = flags.contains(ZipFlags::CASE_SENSITIVE);
        let ignore_path = flags.contains(ZipFlags::IGNORE_PATH);
        if comment.is_none() && !case_sensitive && !ignore_path && !self.sorted.is_empty() {
            return self.locate_sorted(name);
        }

        (0..self.offsets.len()).find(|&index| {
            let off = self.offsets[index] as usize;
            let mut stored = record_name(&self.central_dir, off);
            if ignore_path {
                if let Some(sep) = stored.iter().rposition(|&b| matches!(b, b'/' | b'\\' | b':')) {
                    stored = &stored[sep + 1..];
                }
            }
            if !names_equal(stored, name, case_sensitive) {
                return false;
            }
            match comment {
                None => true,
                Some(wanted) => names_equal(
                    record_comment(&self.central_dir, off),
                    wanted.as_bytes(),
                    case_sensitive,
                ),
            }
        })
    }

    fn locate_sorted(&self, name: &[u8]) -> Option<usize> {
        self.sorted
            .binary_search_by(|&index| {
                compare_folded(
                    record_name(&self.central_dir, self.offsets[index as usize] as usize),
                    name,
                )
            })
            .ok()
            .map(|pos| self.sorted[pos] as usize)
    }

    /// Check the local header and work out where the entry data lives.
    ///
    /// Returns `None` for entries without data (directories, empty files).
    fn entry_data(&self, index: usize, flags: ZipFlags) -> Result<Option<EntryData>> {
        let stat = self.file_stat(index)?;
        let raw = flags.contains(ZipFlags::COMPRESSED_DATA);
        if stat.is_directory || stat.compressed_size == 0 {
            return Ok(None);
        }
        if !raw && !stat.is_supported {
            return Err(OxiZipError::unsupported(format!(
                "compression method {}",
                stat.method
            )));
        }

        let mut buf = [0u8; LOCAL_HEADER_SIZE];
        self.io.read_exact_at(stat.local_header_offset, &mut buf)?;
        let local = LocalHeader::parse(&buf, stat.local_header_offset)?;
        let name = record_name(&self.central_dir, self.offsets[index] as usize);
        if !local_matches_central(&local, &stat, name.len()) {
            return Err(OxiZipError::corrupted(
                stat.local_header_offset,
                "local header disagrees with the central directory",
            ));
        }
        let mut local_name = vec![0u8; name.len()];
        self.io.read_exact_at(
            stat.local_header_offset + LOCAL_HEADER_SIZE as u64,
            &mut local_name,
        )?;
        if local_name != name {
            return Err(OxiZipError::corrupted(
                stat.local_header_offset + LOCAL_HEADER_SIZE as u64,
                "local name disagrees with the central directory",
            ));
        }

        let data_offset = stat.local_header_offset + local.total_len();
        if data_offset + stat.compressed_size > self.archive_size {
            return Err(OxiZipError::corrupted(
                data_offset,
                "entry data runs past the end of the archive",
            ));
        }

        Ok(Some(EntryData {
            stat,
            data_offset,
            raw,
        }))
    }

    /// Stream entry `index` through `sink`, verifying size and CRC-32.
    fn extract_with(
        &self,
        index: usize,
        flags: ZipFlags,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let Some(entry) = self.entry_data(index, flags)? else {
            return Ok(());
        };
        let stat = &entry.stat;
        let comp_size = stat.compressed_size;
        let mut input = vec![0u8; READ_CHUNK.min(comp_size as usize)];
        let mut crc = Crc32::new();

        if entry.raw || stat.method == METHOD_STORED {
            let mut pos = 0u64;
            while pos < comp_size {
                let n = input.len().min((comp_size - pos) as usize);
                self.io.read_exact_at(entry.data_offset + pos, &mut input[..n])?;
                if !entry.raw {
                    crc.update(&input[..n]);
                }
                sink(&input[..n])?;
                pos += n as u64;
            }
            if !entry.raw && crc.value() != stat.crc32 {
                return Err(OxiZipError::crc_mismatch(stat.crc32, crc.value()));
            }
            return Ok(());
        }

        let mut inflater = StreamInflater::new();
        let mut output = vec![0u8; OUTPUT_CHUNK];
        let mut read_pos = 0u64;
        let mut start = 0usize;
        let mut avail = 0usize;
        let mut produced = 0u64;

        loop {
            if start == avail && read_pos < comp_size {
                avail = input.len().min((comp_size - read_pos) as usize);
                self.io.read_exact_at(entry.data_offset + read_pos, &mut input[..avail])?;
                read_pos += avail as u64;
                start = 0;
            }

            let (consumed, written, status) =
                inflater.decompress(&input[start..avail], &mut output)?;
            start += consumed;
            produced += written as u64;
            if produced > stat.uncompressed_size {
                return Err(OxiZipError::corrupted(
                    entry.data_offset,
                    "entry inflates past its recorded size",
                ));
            }
            crc.update(&output[..written]);
            sink(&output[..written])?;

            match status {
                InflateStatus::Done => break,
                InflateStatus::NeedsMoreInput if start == avail && read_pos == comp_size => {
                    return Err(OxiZipError::corrupted(
                        entry.data_offset + comp_size,
                        "entry data ends inside the deflate stream",
                    ));
                }
                _ => {}
            }
        }

        finish_checks(&entry, produced, crc.value())
    }

    /// Extract entry `index` into a new vector.
    pub fn extract_to_vec(&self, index: usize, flags: ZipFlags) -> Result<Vec<u8>> {
        let stat = self.file_stat(index)?;
        let expected = if flags.contains(ZipFlags::COMPRESSED_DATA) {
            stat.compressed_size
        } else {
            stat.uncompressed_size
        };
        let capacity = usize::try_from(expected)
            .map_err(|_| OxiZipError::size_overflow(format!("entry {} size", stat.name)))?;

        let mut out = Vec::with_capacity(capacity);
        self.extract_with(index, flags, &mut |chunk| {
            out.extend_from_slice(chunk);
            Ok(())
        })?;
        Ok(out)
    }

    /// Extract the entry called `name` into a new vector.
    pub fn extract_file_to_vec(&self, name: &str, flags: ZipFlags) -> Result<Vec<u8>> {
        let index = self
            .locate(name, None, flags)
            .ok_or_else(|| OxiZipError::entry_not_found(name))?;
        self.extract_to_vec(index, flags)
    }

    /// Extract entry `index` into `buf` without heap allocation.
    ///
    /// Returns the number of bytes written. Fails with `BufferTooSmall` before
    /// touching the data if `buf` cannot hold the whole entry.
    pub fn extract_to_buffer(
        &self,
        index: usize,
        buf: &mut [u8],
        flags: ZipFlags,
    ) -> Result<usize> {
        let Some(entry) = self.entry_data(index, flags)? else {
            return Ok(0);
        };
        let stat = &entry.stat;
        let copy_raw = entry.raw || stat.method == METHOD_STORED;
        let wanted = if copy_raw {
            stat.compressed_size
        } else {
            stat.uncompressed_size
        };
        let needed = usize::try_from(wanted)
            .map_err(|_| OxiZipError::size_overflow(format!("entry {} size", stat.name)))?;
        if buf.len() < needed {
            return Err(OxiZipError::buffer_too_small(needed, buf.len()));
        }
        let out = &mut buf[..needed];

        if copy_raw {
            self.io.read_exact_at(entry.data_offset, out)?;
            if !entry.raw {
                let computed = Crc32::compute(out);
                if computed != stat.crc32 {
                    return Err(OxiZipError::crc_mismatch(stat.crc32, computed));
                }
            }
            return Ok(needed);
        }
        if needed == 0 {
            return finish_checks(&entry, 0, 0).map(|()| 0);
        }

        let mut inflater = Inflater::new();
        let mut chunk = [0u8; 4096];
        let inflate_flags = InflateFlags::NON_WRAPPING_OUTPUT | InflateFlags::HAS_MORE_INPUT;
        let comp_size = stat.compressed_size;
        let mut read_pos = 0u64;
        let mut start = 0usize;
        let mut avail = 0usize;
        let mut out_pos = 0usize;

        loop {
            if start == avail && read_pos < comp_size {
                avail = chunk.len().min((comp_size - read_pos) as usize);
                self.io.read_exact_at(entry.data_offset + read_pos, &mut chunk[..avail])?;
                read_pos += avail as u64;
                start = 0;
            }

            let result = inflater.decompress(&chunk[start..avail], out, out_pos, inflate_flags)?;
            start += result.consumed;
            out_pos += result.written;

            match result.status {
                InflateStatus::Done => break,
                InflateStatus::HasMoreOutput => {
                    return Err(OxiZipError::corrupted(
                        entry.data_offset,
                        "entry inflates past its recorded size",
                    ));
                }
                InflateStatus::NeedsMoreInput if start == avail && read_pos == comp_size => {
                    return Err(OxiZipError::corrupted(
                        entry.data_offset + comp_size,
                        "entry data ends inside the deflate stream",
                    ));
                }
                InflateStatus::NeedsMoreInput => {}
            }
        }

        finish_checks(&entry, out_pos as u64, Crc32::compute(&out[..out_pos]))?;
        Ok(out_pos)
    }

    /// Extract entry `index` into `writer`.
    pub fn extract_to_writer<W: Write>(
        &self,
        index: usize,
        writer: &mut W,
        flags: ZipFlags,
    ) -> Result<()> {
        self.extract_with(index, flags, &mut |chunk| {
            writer.write_all(chunk)?;
            Ok(())
        })
    }

    /// Extract entry `index`, handing each chunk to `callback` with its
    /// offset in the output.
    pub fn extract_to_callback<F>(
        &self,
        index: usize,
        flags: ZipFlags,
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> io::Result<()>,
    {
        let mut offset = 0u64;
        self.extract_with(index, flags, &mut |chunk| {
            callback(offset, chunk)?;
            offset += chunk.len() as u64;
            Ok(())
        })
    }

    /// Decompress entry `index` and check its CRC without keeping the data.
    pub fn validate_entry(&self, index: usize) -> Result<()> {
        self.extract_with(index, ZipFlags::NONE, &mut |_| Ok(()))
    }

    /// Validate every entry in the archive.
    pub fn validate(&self) -> Result<()> {
        (0..self.total_entries()).try_for_each(|index| self.validate_entry(index))
    }
}

/// Scan backwards in bounded chunks for the end of central directory record.
fn find_eocd<I: ZipIo>(io: &I, archive_size: u64) -> Result<u64> {
    let sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
    let mut buf = [0u8; EOCD_SCAN_CHUNK];
    let mut chunk_start = archive_size.saturating_sub(EOCD_SCAN_CHUNK as u64);

    loop {
        let n = (archive_size - chunk_start).min(EOCD_SCAN_CHUNK as u64) as usize;
        io.read_exact_at(chunk_start, &mut buf[..n])?;

        // A candidate must leave room for the fixed record after it.
        let found = buf[..n]
            .windows(4)
            .enumerate()
            .rev()
            .find(|&(at, w)| {
                w == sig && archive_size - (chunk_start + at as u64) >= EOCD_SIZE as u64
            });
        if let Some((at, _)) = found {
            return Ok(chunk_start + at as u64);
        }

        if chunk_start == 0 || archive_size - chunk_start >= MAX_EOCD_SEARCH {
            return Err(OxiZipError::corrupted(
                archive_size,
                "end of central directory record not found",
            ));
        }
        chunk_start = chunk_start.saturating_sub((EOCD_SCAN_CHUNK - 3) as u64);
    }
}

fn validate_record(header: &CentralHeader, archive_size: u64, offset: u64) -> Result<()> {
    if header.is_zip64() {
        return Err(OxiZipError::unsupported("zip64"));
    }
    if header.disk_start != 0 {
        return Err(OxiZipError::unsupported("multi-disk archive"));
    }
    if header.flags & (FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION) != 0 {
        return Err(OxiZipError::unsupported("encrypted entry"));
    }
    if header.flags & FLAG_PATCH != 0 {
        return Err(OxiZipError::unsupported("patched entry"));
    }
    if header.method == METHOD_STORED && header.compressed_size != header.uncompressed_size {
        return Err(OxiZipError::corrupted(offset, "stored entry sizes disagree"));
    }
    if header.uncompressed_size != 0 && header.compressed_size == 0 {
        return Err(OxiZipError::corrupted(
            offset,
            "entry has data but no compressed bytes",
        ));
    }
    let end = u64::from(header.local_header_offset)
        + LOCAL_HEADER_SIZE as u64
        + u64::from(header.compressed_size);
    if end > archive_size {
        return Err(OxiZipError::corrupted(
            offset,
            "entry extends past the end of the archive",
        ));
    }
    Ok(())
}

fn finish_checks(entry: &EntryData, produced: u64, crc: u32) -> Result<()> {
    if produced != entry.stat.uncompressed_size {
        return Err(OxiZipError::corrupted(
            entry.data_offset,
            format!(
                "entry inflated to {produced} bytes, expected {}",
                entry.stat.uncompressed_size
            ),
        ));
    }
    if crc != entry.stat.crc32 {
        return Err(OxiZipError::crc_mismatch(entry.stat.crc32, crc));
    }
    Ok(())
}

/// Fixed local header fields against the central record. Sizes and CRC-32
/// are only compared when no data descriptor follows the data.
fn local_matches_central(local: &LocalHeader, stat: &FileStat, name_len: usize) -> bool {
    if local.method != stat.method
        || local.flags != stat.flags
        || usize::from(local.name_len) != name_len
    {
        return false;
    }
    stat.flags & FLAG_DATA_DESCRIPTOR != 0
        || (local.crc32 == stat.crc32
            && u64::from(local.compressed_size) == stat.compressed_size
            && u64::from(local.uncompressed_size) == stat.uncompressed_size)
}

fn record_name(central_dir: &[u8], off: usize) -> &[u8] {
    let len = usize::from(u16::from_le_bytes([central_dir[off + 28], central_dir[off + 29]]));
    let start = off + CENTRAL_HEADER_SIZE;
    &central_dir[start..start + len]
}

fn record_comment(central_dir: &[u8], off: usize) -> &[u8] {
    let field = |at: usize| {
        usize::from(u16::from_le_bytes([
            central_dir[off + at],
            central_dir[off + at + 1],
        ]))
    };
    let start = off + CENTRAL_HEADER_SIZE + field(28) + field(30);
    &central_dir[start..start + field(32)]
}

fn is_directory_record(name: &[u8], external_attr: u32) -> bool {
    name.last() == Some(&b'/') || external_attr & DOS_DIRECTORY_ATTR != 0
}

fn compare_folded(a: &[u8], b: &[u8]) -> Ordering {
    a.iter()
        .map(u8::to_ascii_lowercase)
        .cmp(b.iter().map(u8::to_ascii_lowercase))
}

fn names_equal(a: &[u8], b: &[u8], case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::io::MemoryIo;

    fn empty_archive() -> Vec<u8> {
        let mut eocd = Vec::new();
        EndOfCentralDir::default().write(&mut eocd);
        eocd
    }

    #[test]
    fn test_compare_folded() {
        assert_eq!(compare_folded(b"ABC", b"abc"), Ordering::Equal);
        assert_eq!(compare_folded(b"abc", b"ABD"), Ordering::Less);
        assert_eq!(compare_folded(b"ab", b"AB/"), Ordering::Less);
        assert!(names_equal(b"Dir/File", b"dir/file", false));
        assert!(!names_equal(b"Dir/File", b"dir/file", true));
    }

    #[test]
    fn test_flags() {
        let flags = ZipFlags::CASE_SENSITIVE | ZipFlags::IGNORE_PATH;
        assert!(flags.contains(ZipFlags::CASE_SENSITIVE));
        assert!(!flags.contains(ZipFlags::COMPRESSED_DATA));
        assert_eq!(ZipFlags::from_bits(flags.bits()), flags);
        assert!(flags.contains(ZipFlags::NONE));
    }

    #[test]
    fn test_find_eocd_in_minimal_archive() {
        let io = MemoryIo::from_vec(empty_archive());
        assert_eq!(find_eocd(&io, io.size()).unwrap(), 0);
        let reader = ZipReader::new(io, ZipFlags::NONE).unwrap();
        assert_eq!(reader.total_entries(), 0);
        assert!(reader.comment().is_empty());
        assert_eq!(reader.locate("anything", None, ZipFlags::NONE), None);
    }

    #[test]
    fn test_find_eocd_across_chunks() {
        // Leading padding that is not part of any entry, and a comment long
        // enough to push the record out of the last scan chunk.
        let mut bytes = vec![0u8; 10_000];
        let eocd_pos = bytes.len();
        let eocd = EndOfCentralDir {
            comment_len: 6000,
            ..EndOfCentralDir::default()
        };
        eocd.write(&mut bytes);
        bytes.extend(std::iter::repeat_n(b'c', 6000));

        let io = MemoryIo::from_vec(bytes);
        assert_eq!(find_eocd(&io, io.size()).unwrap(), eocd_pos as u64);
        let reader = ZipReader::new(io, ZipFlags::NONE).unwrap();
        assert_eq!(reader.comment().len(), 6000);
    }

    #[test]
    fn test_signature_too_close_to_end_is_ignored() {
        let mut bytes = empty_archive();
        // A stray signature in the last few bytes is not a record.
        bytes.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);
        let io = MemoryIo::from_vec(bytes);
        assert_eq!(find_eocd(&io, io.size()).unwrap(), 0);
    }

    #[test]
    fn test_comment_past_eof_is_clamped() {
        let mut bytes = Vec::new();
        EndOfCentralDir {
            comment_len: 40,
            ..EndOfCentralDir::default()
        }
        .write(&mut bytes);
        bytes.extend_from_slice(b"short");
        let reader = ZipReader::new(MemoryIo::from_vec(bytes), ZipFlags::NONE).unwrap();
        assert_eq!(reader.comment(), b"short");
    }
}
