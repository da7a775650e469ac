//! Positioned I/O for archives.
//!
//! The archive layer never keeps a shared cursor: every access names its own
//! offset. Readers therefore only need `&self`, and two readers over the same
//! file can extract entries independently.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Random-access byte storage backing a ZIP archive.
pub trait ZipIo {
    /// Current length of the storage in bytes.
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`. Returns 0 at end of storage.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` at `offset`, growing the storage if needed.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize>;

    /// Push buffered writes to the backing store.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Drop everything from `len` on.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Fill `buf` from `offset` or fail with `UnexpectedEof`.
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read at offset {offset}"),
                    ));
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Write all of `buf` at `offset`.
    fn write_all_at(&mut self, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("storage refused bytes at offset {offset}"),
                    ));
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<T: ZipIo + ?Sized> ZipIo for &mut T {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        (**self).write_at(offset, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }
}

/// In-memory archive storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryIo {
    data: Vec<u8>,
}

impl MemoryIo {
    /// Empty storage, ready for a new archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing archive bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The stored bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the stored bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take the stored bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for MemoryIo {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl ZipIo for MemoryIo {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset beyond memory"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset beyond memory"))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        if let Ok(len) = usize::try_from(len) {
            self.data.truncate(len);
        }
        Ok(())
    }
}

/// Archive storage in a file on disk.
#[derive(Debug)]
pub struct FileIo {
    file: File,
    len: u64,
}

impl FileIo {
    /// Open an existing archive for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Create (or truncate) a file for a new archive.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::from_file(file)
    }

    /// Open an existing archive for reading and in-place appending.
    pub fn open_rw(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_file(OpenOptions::new().read(true).write(true).open(path)?)
    }

    /// Wrap an already opened file.
    pub fn from_file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Give back the file.
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl ZipIo for FileIo {
    fn size(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let n = self.file.write(buf)?;
        self.len = self.len.max(offset + n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        if len < self.len {
            self.file.set_len(len)?;
            self.len = len;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_io_grows_with_gap() {
        let mut io = MemoryIo::new();
        io.write_all_at(4, b"zip").unwrap();
        assert_eq!(io.as_slice(), &[0, 0, 0, 0, b'z', b'i', b'p']);
        assert_eq!(io.size(), 7);
    }

    #[test]
    fn test_memory_io_short_read() {
        let io = MemoryIo::from_vec(b"abc".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(io.read_at(1, &mut buf).unwrap(), 2);
        assert_eq!(io.read_at(9, &mut buf).unwrap(), 0);
        let err = io.read_exact_at(1, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    fn write_marker<I: ZipIo>(mut io: I) -> u64 {
        io.write_all_at(0, b"pk").unwrap();
        io.size()
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut io = MemoryIo::new();
        assert_eq!(write_marker(&mut io), 2);
        assert_eq!(io.into_inner(), b"pk");
    }

    #[test]
    fn test_file_io_positioned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("io.bin");
        let mut io = FileIo::create(&path).unwrap();
        io.write_all_at(0, b"hello world").unwrap();
        io.write_all_at(6, b"WORLD").unwrap();
        io.flush().unwrap();
        assert_eq!(io.size(), 11);

        let mut buf = [0u8; 5];
        io.read_exact_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"WORLD");

        let reopened = FileIo::open(&path).unwrap();
        assert_eq!(reopened.size(), 11);
    }
}
