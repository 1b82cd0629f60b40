//! Cluster-wide constants.
//!
//! Everything here mirrors the on-disk format of the engine; none of these
//! values are tunable.

// =============================================================================
// Page geometry
// =============================================================================

/// Size of a heap or index page in bytes (8 KB).
pub const PAGE_SIZE: usize = 8192;

/// Size of the page header in bytes.
///
/// Layout: lsn (8), checksum (2), flags (2), lower (2), upper (2),
/// special (2), pagesize_version (2), prune_xid (4).
pub const PAGE_HEADER_SIZE: usize = 24;

/// Size of one item pointer in the line-pointer array.
pub const ITEM_ID_SIZE: usize = 4;

/// Size of the fixed part of a heap tuple header.
///
/// xmin (4), xmax (4), cid/xvac (4), ctid (6), infomask2 (2),
/// infomask (2), hoff (1). The optional null bitmap follows.
pub const TUPLE_HEADER_SIZE: usize = 23;

// =============================================================================
// Fixed catalog OIDs
// =============================================================================

/// OID (and filenode, unless remapped) of the database catalog.
pub const DATABASE_CATALOG_OID: u32 = 1262;

/// OID of the relation catalog, present in every database directory.
pub const RELATION_CATALOG_OID: u32 = 1259;

/// OID of the attribute catalog, present in every database directory.
pub const ATTRIBUTE_CATALOG_OID: u32 = 1249;

/// OID of the shared authorization catalog.
pub const AUTH_CATALOG_OID: u32 = 1260;

// =============================================================================
// File magics
// =============================================================================

/// Magic number at the start of an OID-to-filenode map file.
pub const RELMAP_MAGIC: u32 = 0x0059_2717;

/// Maximum number of mappings a map file can hold.
pub const RELMAP_MAX_MAPPINGS: usize = 62;

/// Exact size of an OID-to-filenode map file.
pub const RELMAP_FILE_SIZE: usize = 512;

/// Magic number in the special area of a sequence page.
pub const SEQUENCE_MAGIC: u16 = 0x1717;

// =============================================================================
// Segments
// =============================================================================

/// Default relation segment size (1 GB); large relations are split into
/// `<filenode>`, `<filenode>.1`, ... files of at most this size.
pub const DEFAULT_SEGMENT_SIZE: usize = 1024 * 1024 * 1024;
