//! Heap tuples.
//!
//! A stored tuple is a 23-byte fixed header, an optional null bitmap, an
//! alignment gap up to `hoff`, then the column payload. Visibility is
//! derived from the header's hint bits: the engine is not running, so the
//! hint bits are all the commit information there is.

mod decode;

pub use decode::{decode_tuple, Column, Row};

use pgsift_common::{TransactionId, TUPLE_HEADER_SIZE};

use crate::bytes;

/// Tuple header infomask bits.
#[allow(missing_docs)]
pub mod infomask {
    pub const HAS_NULL: u16 = 0x0001;
    pub const HAS_VARWIDTH: u16 = 0x0002;
    pub const HAS_EXTERNAL: u16 = 0x0004;
    pub const XMIN_COMMITTED: u16 = 0x0100;
    pub const XMIN_INVALID: u16 = 0x0200;
    pub const XMAX_COMMITTED: u16 = 0x0400;
    pub const XMAX_INVALID: u16 = 0x0800;
    pub const XMAX_IS_MULTI: u16 = 0x1000;
    pub const UPDATED: u16 = 0x2000;

    /// Low bits of infomask2 holding the column count.
    pub const NATTS_MASK: u16 = 0x07FF;
}

/// Parsed fixed part of a tuple header.
#[derive(Debug, Clone)]
pub struct HeapTupleHeader {
    /// Inserting transaction.
    pub xmin: TransactionId,
    /// Deleting or locking transaction, invalid if never touched.
    pub xmax: TransactionId,
    /// Command id or vacuum transaction, depending on context.
    pub field3: u32,
    /// Block number half of the tuple's self-pointer.
    pub ctid_block: u32,
    /// Offset half of the tuple's self-pointer.
    pub ctid_offset: u16,
    /// Attribute count and flag bits.
    pub infomask2: u16,
    /// Visibility and layout flag bits.
    pub infomask: u16,
    /// Offset from tuple start to the column payload.
    pub hoff: u8,
}

impl HeapTupleHeader {
    /// Number of attributes stored in this tuple.
    #[must_use]
    pub fn natts(&self) -> usize {
        usize::from(self.infomask2 & infomask::NATTS_MASK)
    }

    /// True when a null bitmap follows the fixed header.
    #[must_use]
    pub fn has_nulls(&self) -> bool {
        self.infomask & infomask::HAS_NULL != 0
    }

    /// True when the inserting transaction is known aborted.
    #[must_use]
    pub fn xmin_invalid(&self) -> bool {
        self.infomask & infomask::XMIN_INVALID != 0
    }

    /// True when the inserting transaction is known committed.
    #[must_use]
    pub fn xmin_committed(&self) -> bool {
        self.infomask & infomask::XMIN_COMMITTED != 0
    }

    /// True when the deleting transaction is known committed.
    #[must_use]
    pub fn xmax_committed(&self) -> bool {
        self.infomask & infomask::XMAX_COMMITTED != 0
    }

    /// True when there is no live deleting transaction.
    #[must_use]
    pub fn xmax_invalid(&self) -> bool {
        self.infomask & infomask::XMAX_INVALID != 0
    }
}

/// An owned tuple: header, null bitmap and column payload. Independent of
/// the page buffer it was cut from.
#[derive(Debug, Clone)]
pub struct HeapTuple {
    /// Fixed header fields.
    pub header: HeapTupleHeader,
    /// Null bitmap, empty when the tuple has no nulls.
    pub bitmap: Vec<u8>,
    /// Column payload starting at `hoff`.
    pub data: Vec<u8>,
}

impl HeapTuple {
    /// Parses a tuple from the raw bytes addressed by an item pointer.
    ///
    /// Returns `None` when the buffer cannot hold the header or `hoff`
    /// points outside it; the caller skips the item and moves on.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < TUPLE_HEADER_SIZE {
            return None;
        }

        let header = HeapTupleHeader {
            xmin: TransactionId::new(bytes::u32(raw, 0)),
            xmax: TransactionId::new(bytes::u32(raw, 4)),
            field3: bytes::u32(raw, 8),
            ctid_block: bytes::u32(raw, 12),
            ctid_offset: bytes::u16(raw, 16),
            infomask2: bytes::u16(raw, 18),
            infomask: bytes::u16(raw, 20),
            hoff: raw[22],
        };

        let hoff = usize::from(header.hoff);
        if hoff < TUPLE_HEADER_SIZE || hoff > raw.len() {
            return None;
        }

        let bitmap = if header.has_nulls() {
            let len = (header.natts() + 7) / 8;
            raw[TUPLE_HEADER_SIZE..raw.len().min(TUPLE_HEADER_SIZE + len)].to_vec()
        } else {
            Vec::new()
        };

        Some(Self {
            header,
            bitmap,
            data: raw[hoff..].to_vec(),
        })
    }

    /// True when the null bitmap marks column `attnum` (1-based) as null.
    #[must_use]
    pub fn is_null(&self, attnum: usize) -> bool {
        if self.bitmap.is_empty() || attnum == 0 {
            return false;
        }
        let byte = (attnum - 1) / 8;
        let bit = (attnum - 1) % 8;
        match self.bitmap.get(byte) {
            // A set bit means present; clear means null
            Some(b) => b & (1 << bit) == 0,
            // Bitmap shorter than the column list: treat as null
            None => true,
        }
    }

    /// A tuple is visible when its insert is not known aborted and there is
    /// no committed delete on it.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        if self.header.xmin_invalid() {
            return false;
        }
        self.header.xmax_invalid() || !self.header.xmax_committed()
    }

    /// A tuple is deleted-but-retained when a committed delete has not yet
    /// been vacuumed away.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.header.xmax_committed() && !self.header.xmax_invalid()
    }
}

/// Builds the raw bytes of a heap tuple. Fixture helper; the library never
/// writes tuples itself.
#[must_use]
pub fn build_tuple(
    xmin: u32,
    xmax: u32,
    infomask: u16,
    natts: u16,
    bitmap: &[u8],
    payload: &[u8],
) -> Vec<u8> {
    let mut infomask = infomask;
    if !bitmap.is_empty() {
        infomask |= infomask::HAS_NULL;
    }
    let hoff = bytes::align(TUPLE_HEADER_SIZE + bitmap.len(), 8);

    let mut raw = Vec::with_capacity(hoff + payload.len());
    raw.extend_from_slice(&xmin.to_le_bytes());
    raw.extend_from_slice(&xmax.to_le_bytes());
    raw.extend_from_slice(&0u32.to_le_bytes()); // cid
    raw.extend_from_slice(&0u32.to_le_bytes()); // ctid block
    raw.extend_from_slice(&1u16.to_le_bytes()); // ctid offset
    raw.extend_from_slice(&natts.to_le_bytes());
    raw.extend_from_slice(&infomask.to_le_bytes());
    raw.push(hoff as u8);
    raw.extend_from_slice(bitmap);
    raw.resize(hoff, 0);
    raw.extend_from_slice(payload);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let raw = build_tuple(100, 0, infomask::XMAX_INVALID, 2, &[], &[1, 2, 3, 4]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        assert_eq!(tuple.header.xmin.as_u32(), 100);
        assert_eq!(tuple.header.natts(), 2);
        assert_eq!(tuple.data, vec![1, 2, 3, 4]);
        assert!(tuple.bitmap.is_empty());
        assert_eq!(tuple.header.hoff, 24);
    }

    #[test]
    fn test_bitmap_alignment() {
        // 9 columns need a 2-byte bitmap; hoff pads 23+2 to 32
        let raw = build_tuple(1, 0, 0, 9, &[0xFF, 0x01], &[7]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        assert_eq!(tuple.header.hoff, 32);
        assert_eq!(tuple.bitmap, vec![0xFF, 0x01]);
        assert_eq!(tuple.data, vec![7]);
        assert!(!tuple.is_null(9));
    }

    #[test]
    fn test_null_bits() {
        // Bitmap 0b101: columns 1 and 3 present, column 2 null
        let raw = build_tuple(1, 0, 0, 3, &[0b101], &[]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        assert!(!tuple.is_null(1));
        assert!(tuple.is_null(2));
        assert!(!tuple.is_null(3));
        // Beyond the bitmap's bytes counts as null
        assert!(tuple.is_null(100));
    }

    #[test]
    fn test_no_bitmap_means_no_nulls() {
        let raw = build_tuple(1, 0, 0, 3, &[], &[]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        assert!(!tuple.is_null(1));
        assert!(!tuple.is_null(3));
    }

    #[test]
    fn test_visibility() {
        let live = build_tuple(5, 0, infomask::XMAX_INVALID, 1, &[], &[]);
        let tuple = HeapTuple::parse(&live).unwrap();
        assert!(tuple.is_visible());
        assert!(!tuple.is_deleted());

        let deleted = build_tuple(5, 9, infomask::XMAX_COMMITTED, 1, &[], &[]);
        let tuple = HeapTuple::parse(&deleted).unwrap();
        assert!(!tuple.is_visible());
        assert!(tuple.is_deleted());

        let aborted_insert = build_tuple(5, 0, infomask::XMIN_INVALID, 1, &[], &[]);
        let tuple = HeapTuple::parse(&aborted_insert).unwrap();
        assert!(!tuple.is_visible());
        assert!(!tuple.is_deleted());
    }

    #[test]
    fn test_truncated() {
        assert!(HeapTuple::parse(&[0u8; 10]).is_none());
        let mut raw = build_tuple(1, 0, 0, 1, &[], &[1]);
        raw[22] = 200; // hoff beyond the buffer
        assert!(HeapTuple::parse(&raw).is_none());
    }
}
