//! Index file classification.
//!
//! Index kinds are recognized from page zero without walking the tree.
//! B-tree, hash, sp-gist and block-range indexes carry a magic word at the
//! start of their metapage data; gist and gin metapages have no magic, so
//! they are recognized from their special-area signature instead (gist
//! ends every page with the id word `0xFF81`, gin keeps a meta flag in its
//! opaque flags).

use pgsift_common::{PAGE_HEADER_SIZE, PAGE_SIZE};
use serde::Serialize;

use crate::bytes;
use crate::error::{StorageError, StorageResult};

/// B-tree metapage magic.
pub const BTREE_MAGIC: u32 = 0x0005_3162;
/// Hash metapage magic.
pub const HASH_MAGIC: u32 = 0x0644_0640;
/// SP-GiST metapage magic.
pub const SPGIST_MAGIC: u32 = 0xBA0B_ABEE;
/// Block-range-index metapage magic.
pub const BRIN_MAGIC: u32 = 0xA810_9CFA;

/// Trailing page-id word on every gist page.
const GIST_PAGE_ID: u16 = 0xFF81;
/// Meta bit in the gin special-area flags.
const GIN_META_FLAG: u16 = 0x0008;

/// Recognized index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// B-tree.
    BTree,
    /// Hash.
    Hash,
    /// Generalized inverted index.
    Gin,
    /// Generalized search tree.
    Gist,
    /// Space-partitioned search tree.
    SpGist,
    /// Block-range index.
    Brin,
}

/// Shallow description of an index file.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    /// Recognized kind.
    pub kind: IndexKind,
    /// Metapage format version, where the metapage carries one.
    pub version: Option<u32>,
    /// Root block number, for kinds that record it.
    pub root: Option<u32>,
    /// Tree depth, for kinds that record it.
    pub level: Option<u32>,
}

/// Classifies an index file from its first page.
///
/// Returns a bad-magic error when page zero matches no known kind; tree
/// internals are never traversed.
pub fn classify_index(data: &[u8]) -> StorageResult<IndexInfo> {
    if data.len() < PAGE_SIZE {
        return Err(StorageError::too_small("index file", data.len(), PAGE_SIZE));
    }

    // Metapage payload starts right after the page header
    let meta = PAGE_HEADER_SIZE;
    let magic = bytes::u32(data, meta);

    match magic {
        BTREE_MAGIC => {
            return Ok(IndexInfo {
                kind: IndexKind::BTree,
                version: Some(bytes::u32(data, meta + 4)),
                root: Some(bytes::u32(data, meta + 8)),
                level: Some(bytes::u32(data, meta + 12)),
            });
        }
        HASH_MAGIC => {
            return Ok(IndexInfo {
                kind: IndexKind::Hash,
                version: Some(bytes::u32(data, meta + 4)),
                root: None,
                level: None,
            });
        }
        SPGIST_MAGIC => {
            return Ok(IndexInfo {
                kind: IndexKind::SpGist,
                version: None,
                root: None,
                level: None,
            });
        }
        BRIN_MAGIC => {
            return Ok(IndexInfo {
                kind: IndexKind::Brin,
                version: Some(bytes::u32(data, meta + 4)),
                root: None,
                level: None,
            });
        }
        _ => {}
    }

    // No metapage magic: check the special-area signatures
    let special = bytes::u16(data, 16) as usize;
    if special >= PAGE_HEADER_SIZE && special < PAGE_SIZE {
        if bytes::u16(data, PAGE_SIZE - 2) == GIST_PAGE_ID {
            return Ok(IndexInfo {
                kind: IndexKind::Gist,
                version: None,
                root: None,
                level: None,
            });
        }
        // Gin opaque area: rightlink (4), maxoff (2), flags (2)
        if PAGE_SIZE - special == 8 && bytes::u16(data, special + 6) & GIN_META_FLAG != 0 {
            return Ok(IndexInfo {
                kind: IndexKind::Gin,
                version: None,
                root: None,
                level: None,
            });
        }
    }

    Err(StorageError::bad_magic("index metapage", BTREE_MAGIC, magic))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_page() -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        page[12..14].copy_from_slice(&24u16.to_le_bytes());
        page[14..16].copy_from_slice(&8192u16.to_le_bytes());
        page[16..18].copy_from_slice(&8192u16.to_le_bytes());
        page[18..20].copy_from_slice(&(8192u16 | 4).to_le_bytes());
        page
    }

    #[test]
    fn test_btree() {
        let mut page = empty_page();
        page[24..28].copy_from_slice(&BTREE_MAGIC.to_le_bytes());
        page[28..32].copy_from_slice(&4u32.to_le_bytes()); // version
        page[32..36].copy_from_slice(&3u32.to_le_bytes()); // root
        page[36..40].copy_from_slice(&1u32.to_le_bytes()); // level

        let info = classify_index(&page).unwrap();
        assert_eq!(info.kind, IndexKind::BTree);
        assert_eq!(info.version, Some(4));
        assert_eq!(info.root, Some(3));
        assert_eq!(info.level, Some(1));
    }

    #[test]
    fn test_hash_and_spgist_and_brin() {
        let mut page = empty_page();
        page[24..28].copy_from_slice(&HASH_MAGIC.to_le_bytes());
        page[28..32].copy_from_slice(&4u32.to_le_bytes());
        let info = classify_index(&page).unwrap();
        assert_eq!(info.kind, IndexKind::Hash);
        assert_eq!(info.version, Some(4));

        let mut page = empty_page();
        page[24..28].copy_from_slice(&SPGIST_MAGIC.to_le_bytes());
        assert_eq!(classify_index(&page).unwrap().kind, IndexKind::SpGist);

        let mut page = empty_page();
        page[24..28].copy_from_slice(&BRIN_MAGIC.to_le_bytes());
        assert_eq!(classify_index(&page).unwrap().kind, IndexKind::Brin);
    }

    #[test]
    fn test_gist_by_page_id() {
        let mut page = empty_page();
        // Special area at the tail carrying the gist page id
        page[16..18].copy_from_slice(&((PAGE_SIZE - 16) as u16).to_le_bytes());
        page[PAGE_SIZE - 2..].copy_from_slice(&GIST_PAGE_ID.to_le_bytes());
        assert_eq!(classify_index(&page).unwrap().kind, IndexKind::Gist);
    }

    #[test]
    fn test_gin_by_meta_flag() {
        let mut page = empty_page();
        let special = PAGE_SIZE - 8;
        page[16..18].copy_from_slice(&(special as u16).to_le_bytes());
        page[special + 6..special + 8].copy_from_slice(&GIN_META_FLAG.to_le_bytes());
        assert_eq!(classify_index(&page).unwrap().kind, IndexKind::Gin);
    }

    #[test]
    fn test_unrecognized() {
        let page = empty_page();
        assert!(classify_index(&page).is_err());
        assert!(classify_index(&[0u8; 128]).is_err());
    }
}
