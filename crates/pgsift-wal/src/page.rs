//! WAL page headers.
//!
//! Every 8 KB WAL page opens with a header whose magic word doubles as an
//! engine version stamp. The first page of a segment (and only it) uses
//! the long form:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       2   magic (version stamp)
//!   2       2   info flags
//!   4       4   timeline id
//!   8       8   page address (LSN of this page)
//!  16       4   remaining length of a record continued from the
//!                previous page
//! ---- long form only ----
//!  24       8   system identifier
//!  32       4   segment size
//!  36       4   page size
//! ```

use bytes::Buf;
use pgsift_common::Lsn;
use serde::Serialize;

use crate::error::{WalError, WalResult};

/// WAL page size.
pub const WAL_PAGE_SIZE: usize = 8192;
/// Short page-header size.
pub const SHORT_HEADER_SIZE: usize = 24;
/// Long page-header size (first page of a segment).
pub const LONG_HEADER_SIZE: usize = 40;

/// Info flag: the first record on this page continues one from the
/// previous page.
pub const XLP_FIRST_IS_CONTRECORD: u16 = 0x0001;
/// Info flag: this header is the long form.
pub const XLP_LONG_HEADER: u16 = 0x0002;

/// Page magics for the supported engine versions.
const MAGICS: [(u16, u32); 5] = [
    (0xD113, 16),
    (0xD110, 15),
    (0xD10F, 14),
    (0xD10D, 13),
    (0xD109, 12),
];

/// Maps a page magic to its engine major version.
#[must_use]
pub fn version_from_magic(magic: u16) -> Option<u32> {
    MAGICS
        .iter()
        .find(|(m, _)| *m == magic)
        .map(|(_, v)| *v)
}

/// A parsed WAL page header.
#[derive(Debug, Clone, Serialize)]
pub struct WalPageHeader {
    /// Magic word; identifies the engine version.
    pub magic: u16,
    /// Info flags.
    pub info: u16,
    /// Timeline the page belongs to.
    pub timeline_id: u32,
    /// WAL position of the page's first byte.
    pub page_addr: Lsn,
    /// Bytes of continuation payload at the start of the page.
    pub remaining_len: u32,
    /// System identifier (long form only).
    pub system_id: Option<u64>,
    /// Segment size (long form only).
    pub segment_size: Option<u32>,
    /// Page size (long form only).
    pub page_size: Option<u32>,
}

impl WalPageHeader {
    /// Parses the header at the start of a page, validating the magic.
    pub fn parse(page: &[u8]) -> WalResult<Self> {
        if page.len() < SHORT_HEADER_SIZE {
            return Err(WalError::too_small(page.len(), SHORT_HEADER_SIZE));
        }

        let mut buf = page;
        let magic = buf.get_u16_le();
        if version_from_magic(magic).is_none() {
            return Err(WalError::UnknownMagic { found: magic });
        }

        let info = buf.get_u16_le();
        let timeline_id = buf.get_u32_le();
        let page_addr = Lsn::new(buf.get_u64_le());
        let remaining_len = buf.get_u32_le();
        let _padding = buf.get_u32_le();

        let mut header = Self {
            magic,
            info,
            timeline_id,
            page_addr,
            remaining_len,
            system_id: None,
            segment_size: None,
            page_size: None,
        };

        if header.is_long() && page.len() >= LONG_HEADER_SIZE {
            header.system_id = Some(buf.get_u64_le());
            header.segment_size = Some(buf.get_u32_le());
            header.page_size = Some(buf.get_u32_le());
        }

        Ok(header)
    }

    /// True for the long (segment-leading) form.
    #[must_use]
    pub fn is_long(&self) -> bool {
        self.info & XLP_LONG_HEADER != 0
    }

    /// True when the page opens with the tail of a spilled record.
    #[must_use]
    pub fn starts_with_continuation(&self) -> bool {
        self.info & XLP_FIRST_IS_CONTRECORD != 0
    }

    /// Header size implied by the info flags.
    #[must_use]
    pub fn header_size(&self) -> usize {
        if self.is_long() {
            LONG_HEADER_SIZE
        } else {
            SHORT_HEADER_SIZE
        }
    }
}

/// Builds a WAL page header image. Fixture helper.
#[must_use]
pub fn build_page_header(
    magic: u16,
    info: u16,
    timeline: u32,
    page_addr: u64,
    remaining: u32,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&info.to_le_bytes());
    out.extend_from_slice(&timeline.to_le_bytes());
    out.extend_from_slice(&page_addr.to_le_bytes());
    out.extend_from_slice(&remaining.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // padding
    if info & XLP_LONG_HEADER != 0 {
        out.extend_from_slice(&0xC0FF_EE00_0000_0001u64.to_le_bytes());
        out.extend_from_slice(&(16 * 1024 * 1024u32).to_le_bytes());
        out.extend_from_slice(&(WAL_PAGE_SIZE as u32).to_le_bytes());
    }
    out
}
