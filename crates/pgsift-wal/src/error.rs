//! WAL error types.

use std::io;
use thiserror::Error;

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur while decoding WAL files.
///
/// Per-page damage is absorbed by the segment iterator; these errors
/// surface only from whole-file and directory operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// I/O error reading a segment or directory.
    #[error("WAL I/O error: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: io::Error,
    },

    /// Segment is shorter than one page header.
    #[error("WAL segment too small: {len} bytes (need at least {min})")]
    TooSmall {
        /// Actual length.
        len: usize,
        /// Minimum required.
        min: usize,
    },

    /// Page magic matches no supported engine version.
    #[error("unknown WAL page magic: {found:#06x}")]
    UnknownMagic {
        /// The magic value found.
        found: u16,
    },
}

impl WalError {
    /// Creates a too-small error.
    pub fn too_small(len: usize, min: usize) -> Self {
        Self::TooSmall { len, min }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = WalError::too_small(10, 40);
        assert!(err.to_string().contains("10"));
        let err = WalError::UnknownMagic { found: 0xBEEF };
        assert!(err.to_string().contains("0xbeef"));
    }
}
