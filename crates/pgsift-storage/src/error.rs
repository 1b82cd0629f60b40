//! Storage error types.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while decoding cluster files.
///
/// Per-tuple and per-page damage is absorbed by the iterating layers; these
/// errors surface only from operations on whole files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error reading a cluster file.
    #[error("storage I/O error: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: io::Error,
    },

    /// Input buffer is shorter than the fixed format requires.
    #[error("{kind} too small: {len} bytes (need at least {min})")]
    TooSmall {
        /// What was being parsed.
        kind: &'static str,
        /// Actual buffer length.
        len: usize,
        /// Minimum length the format requires.
        min: usize,
    },

    /// A magic number or version discriminator did not match any known value.
    #[error("invalid {kind} magic: {found:#010x} (expected {expected:#010x})")]
    BadMagic {
        /// What was being parsed.
        kind: &'static str,
        /// The value the format requires.
        expected: u32,
        /// The value found in the file.
        found: u32,
    },

    /// A length or offset field is out of range for its container.
    #[error("corrupt {kind}: {reason}")]
    Corrupt {
        /// What was being parsed.
        kind: &'static str,
        /// Description of the inconsistency.
        reason: String,
    },

    /// A block range expression could not be parsed or is inverted.
    #[error("invalid block range: {reason}")]
    InvalidRange {
        /// Description of the problem.
        reason: String,
    },

    /// A database or relation looked up by name does not exist.
    #[error("{kind} {name:?} not found")]
    NotFound {
        /// Entity kind (database, table, ...).
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },
}

impl StorageError {
    /// Creates a too-small error.
    pub fn too_small(kind: &'static str, len: usize, min: usize) -> Self {
        Self::TooSmall { kind, len, min }
    }

    /// Creates a bad-magic error.
    pub fn bad_magic(kind: &'static str, expected: u32, found: u32) -> Self {
        Self::BadMagic {
            kind,
            expected,
            found,
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            kind,
            reason: reason.into(),
        }
    }

    /// Creates an invalid-range error.
    pub fn invalid_range(reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns true if the input was simply not the expected kind of file.
    pub fn is_format_mismatch(&self) -> bool {
        matches!(self, Self::TooSmall { .. } | Self::BadMagic { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::too_small("relmap file", 100, 512);
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("512"));
        assert!(err.is_format_mismatch());
    }

    #[test]
    fn test_bad_magic_display() {
        let err = StorageError::bad_magic("relmap file", 0x0059_2717, 0xFF);
        assert!(err.to_string().contains("0x00592717"));
        assert!(err.is_format_mismatch());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: StorageError = io_err.into();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!err.is_format_mismatch());
    }
}
