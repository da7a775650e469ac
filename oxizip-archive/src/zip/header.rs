//! ZIP header structures.
//!
//! All integers are little-endian. Only the classic 32-bit layout is
//! handled; zip64 markers are recognised so they can be rejected.

use oxizip_core::error::{OxiZipError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// ZIP local file header signature.
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x04034B50;

/// ZIP central directory header signature.
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x02014B50;

/// ZIP end of central directory signature.
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054B50;

/// ZIP64 end of central directory locator signature.
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG: u32 = 0x07064B50;

/// Fixed part of a local file header.
pub const LOCAL_HEADER_SIZE: usize = 30;

/// Fixed part of a central directory record.
pub const CENTRAL_HEADER_SIZE: usize = 46;

/// Fixed part of the end of central directory record.
pub const EOCD_SIZE: usize = 22;

/// Size of the zip64 end of central directory locator.
pub const ZIP64_LOCATOR_SIZE: usize = 20;

/// Marker value meaning "see the zip64 extra field".
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Marker value for 16-bit zip64 fields.
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Method 0.
pub const METHOD_STORED: u16 = 0;

/// Method 8.
pub const METHOD_DEFLATED: u16 = 8;

/// General purpose flag: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// General purpose flag: sizes and CRC follow the data.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose flag: compressed patched data.
pub const FLAG_PATCH: u16 = 0x0020;

/// General purpose flag: strong encryption.
pub const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

/// General purpose flag: name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Version made by: Unix host, format version 2.0.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// Version needed to extract deflated entries.
pub const VERSION_NEEDED_DEFLATE: u16 = 20;

/// MS-DOS directory attribute bit.
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// External attributes of a regular file (`-rw-r--r--`).
pub const FILE_EXTERNAL_ATTR: u32 = 0o100644 << 16;

/// External attributes of a directory (`drwxr-xr-x` plus the DOS bit).
pub const DIRECTORY_EXTERNAL_ATTR: u32 = (0o040755 << 16) | DOS_DIRECTORY_ATTR;

#[inline]
fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Read the 32-bit signature at the start of `buf`, if there is room.
pub fn signature(buf: &[u8]) -> Option<u32> {
    (buf.len() >= 4).then(|| le_u32(buf, 0))
}

/// End of central directory record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndOfCentralDir {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk holding the start of the central directory.
    pub cd_disk: u16,
    /// Central directory records on this disk.
    pub entries_on_disk: u16,
    /// Central directory records in total.
    pub total_entries: u16,
    /// Size of the central directory in bytes.
    pub cd_size: u32,
    /// Offset of the central directory from the start of the archive.
    pub cd_offset: u32,
    /// Length of the archive comment that follows.
    pub comment_len: u16,
}

impl EndOfCentralDir {
    /// Parse the fixed part of the record.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < EOCD_SIZE || le_u32(buf, 0) != END_OF_CENTRAL_DIR_SIG {
            return Err(OxiZipError::corrupted(
                offset,
                "bad end of central directory record",
            ));
        }
        Ok(Self {
            disk_number: le_u16(buf, 4),
            cd_disk: le_u16(buf, 6),
            entries_on_disk: le_u16(buf, 8),
            total_entries: le_u16(buf, 10),
            cd_size: le_u32(buf, 12),
            cd_offset: le_u32(buf, 16),
            comment_len: le_u16(buf, 20),
        })
    }

    /// Whether any field carries a zip64 marker.
    pub fn is_zip64(&self) -> bool {
        self.total_entries == ZIP64_MARKER_16
            || self.entries_on_disk == ZIP64_MARKER_16
            || self.cd_size == ZIP64_MARKER_32
            || self.cd_offset == ZIP64_MARKER_32
    }

    /// Whether the record describes a multi-disk archive.
    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.cd_disk != 0 || self.entries_on_disk != self.total_entries
    }

    /// Append the record (without comment bytes) to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
        out.extend_from_slice(&self.disk_number.to_le_bytes());
        out.extend_from_slice(&self.cd_disk.to_le_bytes());
        out.extend_from_slice(&self.entries_on_disk.to_le_bytes());
        out.extend_from_slice(&self.total_entries.to_le_bytes());
        out.extend_from_slice(&self.cd_size.to_le_bytes());
        out.extend_from_slice(&self.cd_offset.to_le_bytes());
        out.extend_from_slice(&self.comment_len.to_le_bytes());
    }
}

/// ZIP local file header (fixed part).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalHeader {
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flag.
    pub flags: u16,
    /// Compression method.
    pub method: u16,
    /// Last modification time (DOS format).
    pub time: u16,
    /// Last modification date (DOS format).
    pub date: u16,
    /// CRC-32 of uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// File name length.
    pub name_len: u16,
    /// Extra field length.
    pub extra_len: u16,
}

impl LocalHeader {
    /// Parse the fixed 30-byte header found at archive offset `offset`.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < LOCAL_HEADER_SIZE || le_u32(buf, 0) != LOCAL_FILE_HEADER_SIG {
            return Err(OxiZipError::corrupted(offset, "bad local file header"));
        }
        Ok(Self {
            version_needed: le_u16(buf, 4),
            flags: le_u16(buf, 6),
            method: le_u16(buf, 8),
            time: le_u16(buf, 10),
            date: le_u16(buf, 12),
            crc32: le_u32(buf, 14),
            compressed_size: le_u32(buf, 18),
            uncompressed_size: le_u32(buf, 22),
            name_len: le_u16(buf, 26),
            extra_len: le_u16(buf, 28),
        })
    }

    /// Bytes between the header start and the entry data.
    pub fn total_len(&self) -> u64 {
        LOCAL_HEADER_SIZE as u64 + u64::from(self.name_len) + u64::from(self.extra_len)
    }

    /// Serialize the fixed part.
    pub fn to_bytes(&self) -> [u8; LOCAL_HEADER_SIZE] {
        let mut buf = [0u8; LOCAL_HEADER_SIZE];
        buf[0..4].copy_from_slice(&LOCAL_FILE_HEADER_SIG.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version_needed.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..10].copy_from_slice(&self.method.to_le_bytes());
        buf[10..12].copy_from_slice(&self.time.to_le_bytes());
        buf[12..14].copy_from_slice(&self.date.to_le_bytes());
        buf[14..18].copy_from_slice(&self.crc32.to_le_bytes());
        buf[18..22].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[22..26].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[26..28].copy_from_slice(&self.name_len.to_le_bytes());
        buf[28..30].copy_from_slice(&self.extra_len.to_le_bytes());
        buf
    }
}

/// ZIP central directory record (fixed part).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentralHeader {
    /// Version made by (host in the high byte).
    pub version_made_by: u16,
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flag.
    pub flags: u16,
    /// Compression method.
    pub method: u16,
    /// Last modification time (DOS format).
    pub time: u16,
    /// Last modification date (DOS format).
    pub date: u16,
    /// CRC-32 of uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// File name length.
    pub name_len: u16,
    /// Extra field length.
    pub extra_len: u16,
    /// File comment length.
    pub comment_len: u16,
    /// Disk number where the entry starts.
    pub disk_start: u16,
    /// Internal file attributes.
    pub internal_attr: u16,
    /// External file attributes.
    pub external_attr: u32,
    /// Offset of the local header.
    pub local_header_offset: u32,
}

impl CentralHeader {
    /// Parse the fixed 46-byte record found at archive offset `offset`.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < CENTRAL_HEADER_SIZE || le_u32(buf, 0) != CENTRAL_DIR_HEADER_SIG {
            return Err(OxiZipError::corrupted(offset, "bad central directory record"));
        }
        Ok(Self {
            version_made_by: le_u16(buf, 4),
            version_needed: le_u16(buf, 6),
            flags: le_u16(buf, 8),
            method: le_u16(buf, 10),
            time: le_u16(buf, 12),
            date: le_u16(buf, 14),
            crc32: le_u32(buf, 16),
            compressed_size: le_u32(buf, 20),
            uncompressed_size: le_u32(buf, 24),
            name_len: le_u16(buf, 28),
            extra_len: le_u16(buf, 30),
            comment_len: le_u16(buf, 32),
            disk_start: le_u16(buf, 34),
            internal_attr: le_u16(buf, 36),
            external_attr: le_u32(buf, 38),
            local_header_offset: le_u32(buf, 42),
        })
    }

    /// Length of the whole record including its variable fields.
    pub fn record_len(&self) -> usize {
        CENTRAL_HEADER_SIZE
            + usize::from(self.name_len)
            + usize::from(self.extra_len)
            + usize::from(self.comment_len)
    }

    /// Whether any size or offset carries a zip64 marker.
    pub fn is_zip64(&self) -> bool {
        self.compressed_size == ZIP64_MARKER_32
            || self.uncompressed_size == ZIP64_MARKER_32
            || self.local_header_offset == ZIP64_MARKER_32
            || self.disk_start == ZIP64_MARKER_16
    }

    /// Append the fixed part to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&CENTRAL_DIR_HEADER_SIG.to_le_bytes());
        out.extend_from_slice(&self.version_made_by.to_le_bytes());
        out.extend_from_slice(&self.version_needed.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.date.to_le_bytes());
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.name_len.to_le_bytes());
        out.extend_from_slice(&self.extra_len.to_le_bytes());
        out.extend_from_slice(&self.comment_len.to_le_bytes());
        out.extend_from_slice(&self.disk_start.to_le_bytes());
        out.extend_from_slice(&self.internal_attr.to_le_bytes());
        out.extend_from_slice(&self.external_attr.to_le_bytes());
        out.extend_from_slice(&self.local_header_offset.to_le_bytes());
    }
}

/// Broken-down MS-DOS timestamp (two-second resolution, years 1980-2107).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DosDateTime {
    /// Full year.
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-58 in steps of two.
    pub second: u8,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const EPOCH: Self = Self {
        year: 1980,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Decode the packed `(time, date)` pair from a header.
    pub fn from_dos(time: u16, date: u16) -> Self {
        Self {
            year: 1980 + (date >> 9),
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: (time >> 11) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2) as u8,
        }
    }

    /// Encode as the packed `(time, date)` pair.
    pub fn to_dos(&self) -> (u16, u16) {
        let time = (u16::from(self.hour) << 11)
            | (u16::from(self.minute) << 5)
            | (u16::from(self.second) / 2);
        let date = (self.year.saturating_sub(1980).min(127) << 9)
            | (u16::from(self.month) << 5)
            | u16::from(self.day);
        (time, date)
    }

    /// Convert from seconds since the Unix epoch (UTC).
    ///
    /// Instants outside the DOS range clamp to its ends; odd seconds round
    /// down.
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        if year < 1980 {
            return Self::EPOCH;
        }
        if year > 2107 {
            return Self {
                year: 2107,
                month: 12,
                day: 31,
                hour: 23,
                minute: 59,
                second: 58,
            };
        }
        Self {
            year: year as u16,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: ((rem % 60) & !1) as u8,
        }
    }

    /// Seconds since the Unix epoch (UTC).
    pub fn to_unix(&self) -> i64 {
        let days = days_from_civil(i64::from(self.year), self.month.max(1), self.day.max(1));
        days * 86_400
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }

    /// Convert from a system time.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
        };
        Self::from_unix(secs)
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl std::fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// Proleptic Gregorian conversions, days relative to 1970-01-01.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let month = i64::from(month);
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
