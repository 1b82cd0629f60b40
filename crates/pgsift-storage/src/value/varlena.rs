//! Variable-length value headers.
//!
//! A varlena datum self-describes its length with one of five headers,
//! discriminated by the first byte (everything little-endian):
//!
//! ```text
//! First byte      Form
//! ----------      ----
//! 0x01 or 0x02    external-pointer tag; a 17-byte pointer record follows
//! low bits  x1    1-byte header; total length (incl. header) in bits 1-7
//! low bits  00    4-byte header, inline uncompressed; length in bits 2-31
//! low bits  10    4-byte header, inline compressed; a raw-size word whose
//!                 top two bits select the codec precedes the payload
//! ```
//!
//! The tag bytes 0x01, 0x02 and 0x12 all mark external pointers; the
//! distinction from a 1-byte short header is exactly that test.

use crate::bytes;
use crate::compress::{self, CompressionMethod};

/// Pointer records produced by stripping the 0x01 tag begin with this
/// on-disk tag byte.
pub const VARTAG_ONDISK: u8 = 0x12;

/// Returns true if `buf` begins with an external-pointer tag.
#[inline]
#[must_use]
pub fn is_external(buf: &[u8]) -> bool {
    matches!(buf.first(), Some(0x01 | 0x02 | 0x12))
}

/// Returns true if `buf` begins with a 1-byte short header (as opposed to
/// an external tag or a 4-byte header).
#[inline]
#[must_use]
pub fn is_short(buf: &[u8]) -> bool {
    match buf.first() {
        Some(&b) => b & 0x01 == 0x01 && b != 0x01,
        None => false,
    }
}

/// Decodes one varlena datum at the start of `buf`.
///
/// Returns `(payload, bytes_consumed)`. For external pointers the payload
/// is the 17-byte pointer record, not a value; callers detect that with
/// [`is_external`] and resolve it through the TOAST layer. Compressed
/// inline values are decompressed here; if decompression fails the
/// still-compressed bytes are returned so they remain inspectable.
///
/// Returns `None` when the header is inconsistent with the buffer.
#[must_use]
pub fn read_varlena(buf: &[u8]) -> Option<(Vec<u8>, usize)> {
    let b0 = *buf.first()?;

    // External pointer: tag byte, then the 17-byte pointer record.
    if b0 == 0x01 || b0 == 0x02 {
        if buf.len() < 18 {
            return None;
        }
        return Some((buf[1..18].to_vec(), 18));
    }

    // 1-byte short header: total length, header included, in the upper bits.
    if b0 & 0x01 == 0x01 {
        let total = (b0 >> 1) as usize;
        if total == 0 || total > buf.len() {
            return None;
        }
        return Some((buf[1..total].to_vec(), total));
    }

    // 4-byte header.
    if buf.len() < 4 {
        return None;
    }
    let header = bytes::u32(buf, 0);
    let total = ((header >> 2) & 0x3FFF_FFFF) as usize;

    if header & 0x03 == 0x02 {
        // Inline compressed: raw-size word, then the compressed stream.
        if total < 8 || total > buf.len() {
            return None;
        }
        let info = bytes::u32(buf, 4);
        let raw_size = (info & 0x3FFF_FFFF) as usize;
        let method = CompressionMethod::from_bits((info >> 30) as u8);
        let out = compress::decompress(&buf[8..total], raw_size, method);
        return Some((out, total));
    }

    // Inline uncompressed.
    if total < 4 || total > buf.len() {
        return None;
    }
    Some((buf[4..total].to_vec(), total))
}

/// Builds a varlena datum around `payload`, choosing the 1-byte form when
/// it fits. Fixture and test helper; the library itself never writes.
#[must_use]
pub fn build_varlena(payload: &[u8]) -> Vec<u8> {
    if payload.len() + 1 <= 0x7F {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push((((payload.len() + 1) as u8) << 1) | 0x01);
        out.extend_from_slice(payload);
        out
    } else {
        let total = (payload.len() + 4) as u32;
        let mut out = Vec::with_capacity(payload.len() + 4);
        out.extend_from_slice(&(total << 2).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }
}
