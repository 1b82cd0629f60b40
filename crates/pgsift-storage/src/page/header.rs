//! Heap page header.
//!
//! Every page starts with a 24-byte header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       8   lsn (high word, then low word)
//!   8       2   checksum
//!  10       2   flags
//!  12       2   lower (end of the line-pointer array)
//!  14       2   upper (start of tuple storage)
//!  16       2   special (start of the special region)
//!  18       2   page size | layout version
//!  20       4   oldest unpruned xid
//! ```

use pgsift_common::{Lsn, TransactionId, PAGE_HEADER_SIZE, PAGE_SIZE};
use serde::Serialize;

use crate::bytes;
use crate::error::{StorageError, StorageResult};

/// Parsed page header fields.
#[derive(Debug, Clone, Serialize)]
pub struct PageHeader {
    /// LSN of the last WAL record touching this page.
    pub lsn: Lsn,
    /// Stored checksum, zero when checksums are disabled.
    pub checksum: u16,
    /// Page flag bits.
    pub flags: u16,
    /// Offset to the end of the line-pointer array.
    pub lower: u16,
    /// Offset to the start of tuple storage.
    pub upper: u16,
    /// Offset to the special region (page size when absent).
    pub special: u16,
    /// Page size extracted from the combined size/version word.
    pub page_size: usize,
    /// Page layout version.
    pub version: u8,
    /// Oldest unpruned transaction id on the page.
    pub prune_xid: TransactionId,
}

impl PageHeader {
    /// Parses the header at the start of `page`.
    pub fn parse(page: &[u8]) -> StorageResult<Self> {
        if page.len() < PAGE_HEADER_SIZE {
            return Err(StorageError::too_small(
                "page",
                page.len(),
                PAGE_HEADER_SIZE,
            ));
        }

        let size_version = bytes::u16(page, 18);
        Ok(Self {
            lsn: Lsn::from_parts(bytes::u32(page, 0), bytes::u32(page, 4)),
            checksum: bytes::u16(page, 8),
            flags: bytes::u16(page, 10),
            lower: bytes::u16(page, 12),
            upper: bytes::u16(page, 14),
            special: bytes::u16(page, 16),
            page_size: usize::from(size_version & 0xFF00),
            version: (size_version & 0x00FF) as u8,
            prune_xid: TransactionId::new(bytes::u32(page, 20)),
        })
    }

    /// Checks the header's bound invariants:
    /// `header ≤ lower ≤ upper ≤ special ≤ page size`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let lower = usize::from(self.lower);
        let upper = usize::from(self.upper);
        let special = usize::from(self.special);
        lower >= PAGE_HEADER_SIZE && lower <= upper && upper <= special && special <= PAGE_SIZE
    }

    /// Number of line pointers on the page.
    #[must_use]
    pub fn item_count(&self) -> usize {
        let lower = usize::from(self.lower);
        if lower < PAGE_HEADER_SIZE {
            return 0;
        }
        (lower - PAGE_HEADER_SIZE) / pgsift_common::ITEM_ID_SIZE
    }

    /// Unused bytes between the line-pointer array and tuple storage.
    #[must_use]
    pub fn free_space(&self) -> usize {
        usize::from(self.upper).saturating_sub(usize::from(self.lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&1u32.to_le_bytes()); // lsn high
        page[4..8].copy_from_slice(&0xAB00u32.to_le_bytes()); // lsn low
        page[8..10].copy_from_slice(&0x3412u16.to_le_bytes()); // checksum
        page[12..14].copy_from_slice(&28u16.to_le_bytes()); // lower
        page[14..16].copy_from_slice(&8000u16.to_le_bytes()); // upper
        page[16..18].copy_from_slice(&8192u16.to_le_bytes()); // special
        page[18..20].copy_from_slice(&(8192u16 | 4).to_le_bytes());
        page
    }

    #[test]
    fn test_parse() {
        let header = PageHeader::parse(&sample_page()).unwrap();
        assert_eq!(header.lsn.to_string(), "1/AB00");
        assert_eq!(header.checksum, 0x3412);
        assert_eq!(header.lower, 28);
        assert_eq!(header.upper, 8000);
        assert_eq!(header.special, 8192);
        assert_eq!(header.page_size, 8192);
        assert_eq!(header.version, 4);
        assert!(header.is_valid());
    }

    #[test]
    fn test_geometry() {
        let header = PageHeader::parse(&sample_page()).unwrap();
        assert_eq!(header.item_count(), 1); // (28 - 24) / 4
        assert_eq!(header.free_space(), 8000 - 28);
    }

    #[test]
    fn test_too_small() {
        let err = PageHeader::parse(&[0u8; 10]).unwrap_err();
        assert!(err.is_format_mismatch());
    }

    #[test]
    fn test_invalid_bounds() {
        let mut page = sample_page();
        page[12..14].copy_from_slice(&9000u16.to_le_bytes()); // lower > upper
        let header = PageHeader::parse(&page).unwrap();
        assert!(!header.is_valid());
    }
}
