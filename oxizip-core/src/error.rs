//! Error types for OxiZip operations.
//!
//! Every fallible operation in the workspace reports one of a small, closed
//! set of error kinds. Scheduling signals such as "needs more input" are not
//! errors; they live in [`crate::traits`] as status values.

use std::io;
use thiserror::Error;

/// The main error type for OxiZip operations.
#[derive(Debug, Error)]
pub enum OxiZipError {
    /// I/O error from the underlying read/write collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied argument or call sequence is invalid.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the bad parameter.
        message: String,
    },

    /// Huffman code lengths do not describe a usable prefix code.
    #[error("Corrupt Huffman table: {message}")]
    CorruptTable {
        /// Description of the table defect.
        message: String,
    },

    /// Corrupted data in a stream or archive.
    #[error("Corrupted data at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// CRC-32 checksum mismatch.
    #[error("CRC mismatch: expected {expected:#x}, computed {computed:#x}")]
    CrcMismatch {
        /// Expected CRC value from the archive.
        expected: u32,
        /// Computed CRC value from data.
        computed: u32,
    },

    /// Adler-32 checksum mismatch in a zlib trailer.
    #[error("Adler-32 mismatch: expected {expected:#x}, computed {computed:#x}")]
    AdlerMismatch {
        /// Adler-32 stored in the stream trailer.
        expected: u32,
        /// Adler-32 computed over the decompressed output.
        computed: u32,
    },

    /// A valid but unsupported feature (zip64, multi-disk, encryption...).
    #[error("Unsupported feature: {feature}")]
    Unsupported {
        /// Name of the unsupported feature.
        feature: String,
    },

    /// An archive entry name violates the portability rules.
    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Entry not found in archive.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },

    /// Buffer too small for operation.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// The handle is in the wrong mode for the requested operation.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state conflict.
        message: String,
    },

    /// The archive was already finalized; only closing is allowed.
    #[error("Archive already finalized")]
    Finalized,

    /// A size or offset does not fit the type that has to hold it.
    #[error("Size overflow: {what}")]
    SizeOverflow {
        /// The quantity that overflowed.
        what: String,
    },
}

/// Result type alias for OxiZip operations.
pub type Result<T> = std::result::Result<T, OxiZipError>;

impl OxiZipError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a corrupt table error.
    pub fn corrupt_table(message: impl Into<String>) -> Self {
        Self::CorruptTable {
            message: message.into(),
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create an Adler-32 mismatch error.
    pub fn adler_mismatch(expected: u32, computed: u32) -> Self {
        Self::AdlerMismatch { expected, computed }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a size overflow error.
    pub fn size_overflow(what: impl Into<String>) -> Self {
        Self::SizeOverflow { what: what.into() }
    }

    /// Whether this error describes damaged input rather than misuse.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptTable { .. }
                | Self::Corrupted { .. }
                | Self::CrcMismatch { .. }
                | Self::AdlerMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiZipError::crc_mismatch(0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("CRC mismatch"));

        let err = OxiZipError::unsupported("zip64");
        assert!(err.to_string().contains("zip64"));

        let err = OxiZipError::invalid_name("/etc/passwd", "leading slash");
        assert!(err.to_string().contains("leading slash"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiZipError = io_err.into();
        assert!(matches!(err, OxiZipError::Io(_)));
    }

    #[test]
    fn test_data_error_classification() {
        assert!(OxiZipError::corrupted(12, "bad").is_data_error());
        assert!(OxiZipError::adler_mismatch(1, 2).is_data_error());
        assert!(!OxiZipError::unsupported("multi-disk").is_data_error());
        assert!(!OxiZipError::Finalized.is_data_error());
    }
}
