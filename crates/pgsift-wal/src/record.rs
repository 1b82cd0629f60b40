//! WAL records.
//!
//! A record is a fixed 24-byte header — total length, transaction id,
//! previous-record LSN, info bits, resource manager id, CRC — followed by
//! per-resource-manager payload. The payload's leading block references
//! name the relations and blocks the record touches; embedded page images
//! and block data are skipped using their declared lengths.

use bytes::Buf;
use pgsift_common::{Lsn, TransactionId};
use serde::Serialize;

use crate::page::WAL_PAGE_SIZE;

/// Size of the fixed record header.
pub const RECORD_HEADER_SIZE: usize = 24;

/// Resource manager ids.
#[allow(missing_docs)]
pub mod rmgr {
    pub const XLOG: u8 = 0;
    pub const XACT: u8 = 1;
    pub const SMGR: u8 = 2;
    pub const CLOG: u8 = 3;
    pub const DBASE: u8 = 4;
    pub const TBLSPC: u8 = 5;
    pub const MULTIXACT: u8 = 6;
    pub const RELMAP: u8 = 7;
    pub const STANDBY: u8 = 8;
    pub const HEAP2: u8 = 9;
    pub const HEAP: u8 = 10;
    pub const BTREE: u8 = 11;
    pub const HASH: u8 = 12;
    pub const GIN: u8 = 13;
    pub const GIST: u8 = 14;
    pub const SEQ: u8 = 15;
    pub const SPGIST: u8 = 16;
    pub const BRIN: u8 = 17;
    pub const COMMIT_TS: u8 = 18;
    pub const REPLORIGIN: u8 = 19;
    pub const GENERIC: u8 = 20;
    pub const LOGICALMSG: u8 = 21;
}

/// Identifies the relation file a block reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelFileLocator {
    /// Tablespace OID.
    pub spc_oid: u32,
    /// Database OID.
    pub db_oid: u32,
    /// Relation filenode.
    pub rel_oid: u32,
}

/// One block reference inside a record.
#[derive(Debug, Clone, Serialize)]
pub struct BlockRef {
    /// Block reference id.
    pub id: u8,
    /// Relation fork.
    pub fork: u8,
    /// Raw reference flags.
    pub flags: u8,
    /// Relation file, absent when the reference reuses the previous one.
    pub rel: Option<RelFileLocator>,
    /// Block number within the relation.
    pub block: u32,
}

/// A decoded WAL record.
#[derive(Debug, Clone, Serialize)]
pub struct WalRecord {
    /// Position of the record in the log.
    pub lsn: Lsn,
    /// Total length including header and payload.
    pub total_len: u32,
    /// Transaction that emitted the record.
    pub xid: TransactionId,
    /// Position of the previous record.
    pub prev_lsn: Lsn,
    /// Operation info bits.
    pub info: u8,
    /// Resource manager id.
    pub rmid: u8,
    /// Stored record CRC (not verified).
    pub crc: u32,
    /// Resource manager name.
    pub rmgr_name: String,
    /// Human-readable operation name.
    pub operation: String,
    /// Blocks the record touches.
    pub blocks: Vec<BlockRef>,
}

impl WalRecord {
    /// Parses one record at `data`, returning it plus the bytes consumed.
    ///
    /// Returns `None` for impossible lengths; the caller stops walking the
    /// page.
    #[must_use]
    pub fn parse(data: &[u8], lsn: Lsn) -> Option<(Self, usize)> {
        if data.len() < RECORD_HEADER_SIZE {
            return None;
        }

        let mut buf = data;
        let total_len = buf.get_u32_le();
        if (total_len as usize) < RECORD_HEADER_SIZE || total_len as usize > WAL_PAGE_SIZE * 2 {
            return None;
        }

        let xid = TransactionId::new(buf.get_u32_le());
        let prev_lsn = Lsn::new(buf.get_u64_le());
        let info = buf.get_u8();
        let rmid = buf.get_u8();
        let _padding = buf.get_u16_le();
        let crc = buf.get_u32_le();

        let payload_end = (total_len as usize).min(data.len());
        let blocks = if payload_end > RECORD_HEADER_SIZE {
            parse_block_refs(&data[RECORD_HEADER_SIZE..payload_end])
        } else {
            Vec::new()
        };

        Some((
            Self {
                lsn,
                total_len,
                xid,
                prev_lsn,
                info,
                rmid,
                crc,
                rmgr_name: rmgr_name(rmid).to_string(),
                operation: operation_name(rmid, info),
                blocks,
            },
            total_len as usize,
        ))
    }
}

/// Walks the block-reference trailers at the start of a record payload.
fn parse_block_refs(data: &[u8]) -> Vec<BlockRef> {
    let mut blocks = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let block_id = data[pos];
        pos += 1;

        // 0xFF / 0xFE announce the record's main data, not another block
        if block_id == 0xFF || block_id == 0xFE || block_id > 32 {
            break;
        }

        let Some(&fork_flags) = data.get(pos) else {
            break;
        };
        pos += 1;

        let has_image = fork_flags & 0x10 != 0;
        let has_data = fork_flags & 0x20 != 0;
        let same_rel = fork_flags & 0x40 != 0;

        let rel = if !same_rel {
            if pos + 12 > data.len() {
                break;
            }
            let rel = RelFileLocator {
                spc_oid: u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()),
                db_oid: u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap()),
                rel_oid: u32::from_le_bytes(data[pos + 8..pos + 12].try_into().unwrap()),
            };
            pos += 12;
            Some(rel)
        } else {
            None
        };

        let mut block = 0u32;
        if pos + 4 <= data.len() {
            block = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            pos += 4;
        }

        // Skip embedded page image and block data by their lengths
        if has_image && pos + 2 <= data.len() {
            let len = u16::from_le_bytes(data[pos..pos + 2].try_into().unwrap());
            pos += 2 + usize::from(len);
        }
        if has_data && pos + 2 <= data.len() {
            let len = u16::from_le_bytes(data[pos..pos + 2].try_into().unwrap());
            pos += 2 + usize::from(len);
        }

        blocks.push(BlockRef {
            id: block_id,
            fork: fork_flags & 0x0F,
            flags: fork_flags,
            rel,
            block,
        });
    }

    blocks
}

/// Returns the resource manager's name.
#[must_use]
pub fn rmgr_name(rmid: u8) -> &'static str {
    match rmid {
        rmgr::XLOG => "XLOG",
        rmgr::XACT => "Transaction",
        rmgr::SMGR => "Storage",
        rmgr::CLOG => "CLOG",
        rmgr::DBASE => "Database",
        rmgr::TBLSPC => "Tablespace",
        rmgr::MULTIXACT => "MultiXact",
        rmgr::RELMAP => "RelMap",
        rmgr::STANDBY => "Standby",
        rmgr::HEAP2 => "Heap2",
        rmgr::HEAP => "Heap",
        rmgr::BTREE => "BTree",
        rmgr::HASH => "Hash",
        rmgr::GIN => "GIN",
        rmgr::GIST => "GiST",
        rmgr::SEQ => "Sequence",
        rmgr::SPGIST => "SP-GiST",
        rmgr::BRIN => "BRIN",
        rmgr::COMMIT_TS => "CommitTS",
        rmgr::REPLORIGIN => "ReplOrigin",
        rmgr::GENERIC => "Generic",
        rmgr::LOGICALMSG => "LogicalMsg",
        _ => "Unknown",
    }
}

/// Maps a resource manager and its info bits to an operation name.
#[must_use]
pub fn operation_name(rmid: u8, info: u8) -> String {
    let name = match rmid {
        rmgr::HEAP => match info & 0x70 {
            0x00 => "INSERT",
            0x10 => "DELETE",
            0x20 => "UPDATE",
            0x30 => "TRUNCATE",
            0x40 => "HOT_UPDATE",
            0x50 => "CONFIRM",
            0x60 => "LOCK",
            0x70 => "INPLACE",
            _ => unreachable!(),
        },
        rmgr::HEAP2 => match info & 0x70 {
            0x00 => "PRUNE",
            0x10 => "VACUUM",
            0x20 => "FREEZE_PAGE",
            0x30 => "VISIBLE",
            0x40 => "MULTI_INSERT",
            0x50 => "LOCK_UPDATED",
            0x60 => "NEW_CID",
            _ => return format!("op_{info:#04x}"),
        },
        rmgr::XACT => match info & 0x70 {
            0x00 => "COMMIT",
            0x10 => "PREPARE",
            0x20 => "ABORT",
            0x30 => "COMMIT_PREPARED",
            0x40 => "ABORT_PREPARED",
            0x50 => "ASSIGNMENT",
            _ => return format!("op_{info:#04x}"),
        },
        rmgr::XLOG => match info & 0xF0 {
            0x00 => "CHECKPOINT_SHUTDOWN",
            0x10 => "CHECKPOINT_ONLINE",
            0x20 => "NOOP",
            0x30 => "NEXTOID",
            0x40 => "SWITCH",
            0x50 => "BACKUP_END",
            0x60 => "PARAMETER_CHANGE",
            0x70 => "RESTORE_POINT",
            0x80 => "FPW_CHANGE",
            0x90 => "END_OF_RECOVERY",
            0xA0 => "OVERWRITE_CONTRECORD",
            _ => return format!("op_{info:#04x}"),
        },
        rmgr::SMGR => match info & 0x70 {
            0x10 => "CREATE",
            0x20 => "TRUNCATE",
            _ => return format!("op_{info:#04x}"),
        },
        rmgr::DBASE => match info & 0x70 {
            0x00 => "CREATE",
            0x10 => "DROP",
            _ => return format!("op_{info:#04x}"),
        },
        rmgr::BTREE => match info & 0x70 {
            0x00 => "INSERT_LEAF",
            0x10 => "INSERT_UPPER",
            0x20 => "INSERT_META",
            0x30 => "SPLIT_L",
            0x40 => "SPLIT_R",
            0x60 => "DELETE",
            0x70 => "UNLINK_PAGE",
            _ => return format!("op_{info:#04x}"),
        },
        _ => return format!("op_{info:#04x}"),
    };
    name.to_string()
}

/// Builds a record image. Fixture helper.
#[must_use]
pub fn build_record(xid: u32, prev_lsn: u64, info: u8, rmid: u8, payload: &[u8]) -> Vec<u8> {
    let total = (RECORD_HEADER_SIZE + payload.len()) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&xid.to_le_bytes());
    out.extend_from_slice(&prev_lsn.to_le_bytes());
    out.push(info);
    out.push(rmid);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // crc
    out.extend_from_slice(payload);
    out
}
