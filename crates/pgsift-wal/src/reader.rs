//! WAL segment and directory reading.
//!
//! Segments are walked page by page: validate the page header, skip any
//! record continuation spilling over from the previous page, then decode
//! records until zero padding or the page end. A bad page poisons only
//! itself; the walk continues on the next one.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pgsift_common::{Lsn, TransactionId};
use serde::Serialize;

use crate::error::{WalError, WalResult};
use crate::page::{version_from_magic, WalPageHeader, SHORT_HEADER_SIZE, WAL_PAGE_SIZE};
use crate::record::{rmgr, WalRecord, RECORD_HEADER_SIZE};

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

fn is_zero_padding(data: &[u8]) -> bool {
    data.iter().take(8).all(|&b| b == 0)
}

/// Decodes every record of one WAL segment.
///
/// Pages with unknown magic or damaged headers contribute no records but
/// do not fail the segment.
pub fn parse_wal_file(data: &[u8]) -> WalResult<Vec<WalRecord>> {
    if data.len() < SHORT_HEADER_SIZE {
        return Err(WalError::too_small(data.len(), SHORT_HEADER_SIZE));
    }

    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + WAL_PAGE_SIZE <= data.len() {
        let page = &data[offset..offset + WAL_PAGE_SIZE];
        match parse_wal_page(page, offset as u64) {
            Ok(mut page_records) => records.append(&mut page_records),
            Err(err) => {
                tracing::trace!(offset, error = %err, "skipping WAL page");
            }
        }
        offset += WAL_PAGE_SIZE;
    }

    Ok(records)
}

fn parse_wal_page(page: &[u8], base_offset: u64) -> WalResult<Vec<WalRecord>> {
    let header = WalPageHeader::parse(page)?;

    let mut pos = header.header_size();

    // Skip the tail of a record spilling over from the previous page
    if header.starts_with_continuation() && header.remaining_len > 0 {
        pos = align8(pos + header.remaining_len as usize);
    }

    let mut records = Vec::new();
    while pos + RECORD_HEADER_SIZE <= page.len() {
        if is_zero_padding(&page[pos..]) {
            break;
        }

        let Some((record, consumed)) =
            WalRecord::parse(&page[pos..], Lsn::new(base_offset + pos as u64))
        else {
            break;
        };
        records.push(record);
        pos = align8(pos + consumed);
    }

    Ok(records)
}

/// Per-transaction activity seen in the log.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionInfo {
    /// Transaction id.
    pub xid: TransactionId,
    /// Final status: `COMMIT`, `ABORT` or `IN_PROGRESS`.
    pub status: String,
    /// Records attributed to the transaction.
    pub operations: usize,
}

/// Summary of a `pg_wal` directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalSummary {
    /// Segments read.
    pub segment_count: usize,
    /// Records decoded.
    pub record_count: usize,
    /// Lowest record LSN seen, formatted.
    pub first_lsn: String,
    /// Highest record LSN seen, formatted.
    pub last_lsn: String,
    /// Engine major version from the first readable page magic.
    pub engine_version: u32,
    /// Timeline of the first readable page.
    pub timeline_id: u32,
    /// Record count per operation name.
    pub operations: BTreeMap<String, usize>,
    /// Transactions in ascending xid order.
    pub transactions: Vec<TransactionInfo>,
    /// Touch count per `db_oid/rel_oid` from block references.
    pub affected_relations: BTreeMap<String, usize>,
}

/// Names the WAL segment files of a directory in lexical order.
fn wal_segment_names(wal_dir: &Path) -> WalResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(wal_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Segment names are 24 hex digits; skip history and status files
        if entry.file_type()?.is_file() && name.len() == 24 && !name.ends_with(".history") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Scans `<cluster>/pg_wal`, decoding every segment in lexical order, and
/// aggregates operations, transactions and touched relations.
pub fn scan_wal_directory(data_dir: &Path) -> WalResult<WalSummary> {
    let wal_dir = data_dir.join("pg_wal");
    let names = wal_segment_names(&wal_dir)?;

    let mut summary = WalSummary::default();
    let mut txn_ops: BTreeMap<u32, usize> = BTreeMap::new();
    let mut txn_status: BTreeMap<u32, String> = BTreeMap::new();
    let mut first_lsn = 0u64;
    let mut last_lsn = 0u64;

    for name in names {
        let Ok(data) = fs::read(wal_dir.join(&name)) else {
            continue;
        };
        let Ok(records) = parse_wal_file(&data) else {
            continue;
        };

        summary.segment_count += 1;

        if summary.engine_version == 0 && data.len() >= 8 {
            let magic = u16::from_le_bytes([data[0], data[1]]);
            summary.engine_version = version_from_magic(magic).unwrap_or(0);
            summary.timeline_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        }

        for record in records {
            summary.record_count += 1;

            let lsn = record.lsn.as_u64();
            if first_lsn == 0 || lsn < first_lsn {
                first_lsn = lsn;
            }
            last_lsn = last_lsn.max(lsn);

            *summary
                .operations
                .entry(record.operation.clone())
                .or_default() += 1;

            let xid = record.xid.as_u32();
            if xid != 0 {
                *txn_ops.entry(xid).or_default() += 1;
                if record.rmid == rmgr::XACT {
                    if record.operation.contains("COMMIT") {
                        txn_status.insert(xid, "COMMIT".to_string());
                    } else if record.operation.contains("ABORT") {
                        txn_status.insert(xid, "ABORT".to_string());
                    }
                }
            }

            for block in &record.blocks {
                if let Some(rel) = &block.rel {
                    if rel.rel_oid != 0 {
                        let key = format!("{}/{}", rel.db_oid, rel.rel_oid);
                        *summary.affected_relations.entry(key).or_default() += 1;
                    }
                }
            }
        }
    }

    summary.first_lsn = Lsn::new(first_lsn).to_string();
    summary.last_lsn = Lsn::new(last_lsn).to_string();
    summary.transactions = txn_ops
        .into_iter()
        .map(|(xid, operations)| TransactionInfo {
            xid: TransactionId::new(xid),
            status: txn_status
                .get(&xid)
                .cloned()
                .unwrap_or_else(|| "IN_PROGRESS".to_string()),
            operations,
        })
        .collect();

    Ok(summary)
}

/// Returns up to `limit` of the most recent records, newest segments
/// first, preserving in-segment order.
pub fn recent_records(data_dir: &Path, limit: usize) -> WalResult<Vec<WalRecord>> {
    let wal_dir = data_dir.join("pg_wal");
    let names = wal_segment_names(&wal_dir)?;

    let mut all = Vec::new();
    for name in names.iter().rev() {
        if all.len() >= limit {
            break;
        }
        let Ok(data) = fs::read(wal_dir.join(name)) else {
            continue;
        };
        let Ok(mut records) = parse_wal_file(&data) else {
            continue;
        };
        records.append(&mut all);
        all = records;
    }

    if all.len() > limit {
        all.drain(..all.len() - limit);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{build_page_header, XLP_FIRST_IS_CONTRECORD, XLP_LONG_HEADER};
    use crate::record::build_record;

    /// Assembles one WAL page from a header and records.
    fn wal_page(header: Vec<u8>, records: &[Vec<u8>]) -> Vec<u8> {
        let mut page = vec![0u8; WAL_PAGE_SIZE];
        page[..header.len()].copy_from_slice(&header);
        let mut pos = align8(header.len());
        for raw in records {
            page[pos..pos + raw.len()].copy_from_slice(raw);
            pos = align8(pos + raw.len());
        }
        page
    }

    #[test]
    fn test_parse_segment() {
        let records = vec![
            build_record(5, 0, 0x00, rmgr::HEAP, &[]),
            build_record(5, 0x28, 0x00, rmgr::XACT, &[]),
        ];
        let page = wal_page(
            build_page_header(0xD10F, XLP_LONG_HEADER, 1, 0, 0),
            &records,
        );

        let parsed = parse_wal_file(&page).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].operation, "INSERT");
        assert_eq!(parsed[1].operation, "COMMIT");
        assert_eq!(parsed[0].lsn.as_u64(), 40); // long header aligns to 40
    }

    #[test]
    fn test_continuation_skip() {
        // remaining_len 100 from the previous page: first record sits at
        // align8(24 + 100) = 128
        let header = build_page_header(0xD10F, XLP_FIRST_IS_CONTRECORD, 1, 0, 100);
        let mut page = vec![0u8; WAL_PAGE_SIZE];
        page[..header.len()].copy_from_slice(&header);
        let record = build_record(7, 0, 0x00, rmgr::HEAP, &[]);
        page[128..128 + record.len()].copy_from_slice(&record);

        let parsed = parse_wal_file(&page).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].lsn.as_u64(), 128);
        assert_eq!(parsed[0].xid.as_u32(), 7);
    }

    #[test]
    fn test_unknown_magic_page_contributes_nothing() {
        let good = wal_page(
            build_page_header(0xD10F, 0, 1, 0, 0),
            &[build_record(1, 0, 0x00, rmgr::HEAP, &[])],
        );
        let mut bad = vec![0u8; WAL_PAGE_SIZE];
        bad[0..2].copy_from_slice(&0xBEEFu16.to_le_bytes());

        let mut data = bad;
        data.extend_from_slice(&good);
        let parsed = parse_wal_file(&data).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_zero_padding_stops_page() {
        let page = wal_page(
            build_page_header(0xD113, 0, 1, 0, 0),
            &[build_record(1, 0, 0x00, rmgr::HEAP, &[])],
        );
        // Only the one record is found despite the page being full of zeroes
        assert_eq!(parse_wal_file(&page).unwrap().len(), 1);
    }

    #[test]
    fn test_too_small() {
        assert!(parse_wal_file(&[0u8; 8]).is_err());
    }

    fn write_segment(dir: &Path, name: &str, records: &[Vec<u8>]) {
        let page = wal_page(build_page_header(0xD10F, 0, 3, 0, 0), records);
        fs::write(dir.join(name), page).unwrap();
    }

    #[test]
    fn test_directory_summary() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("pg_wal");
        fs::create_dir_all(&wal_dir).unwrap();

        write_segment(
            &wal_dir,
            "000000010000000000000001",
            &[
                build_record(10, 0, 0x00, rmgr::HEAP, &[]),
                build_record(10, 0, 0x00, rmgr::XACT, &[]),
            ],
        );
        write_segment(
            &wal_dir,
            "000000010000000000000002",
            &[
                build_record(11, 0, 0x10, rmgr::HEAP, &[]),
                build_record(11, 0, 0x20, rmgr::XACT, &[]),
            ],
        );
        // Noise that must be ignored
        fs::write(wal_dir.join("00000002.history"), b"history").unwrap();
        fs::write(wal_dir.join("archive_status"), b"").unwrap();

        let summary = scan_wal_directory(dir.path()).unwrap();
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.record_count, 4);
        assert_eq!(summary.engine_version, 14);
        assert_eq!(summary.timeline_id, 3);
        assert_eq!(summary.operations["INSERT"], 1);
        assert_eq!(summary.operations["DELETE"], 1);
        assert_eq!(summary.operations["COMMIT"], 1);
        assert_eq!(summary.operations["ABORT"], 1);

        assert_eq!(summary.transactions.len(), 2);
        assert_eq!(summary.transactions[0].xid.as_u32(), 10);
        assert_eq!(summary.transactions[0].status, "COMMIT");
        assert_eq!(summary.transactions[1].status, "ABORT");
    }

    #[test]
    fn test_recent_records() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("pg_wal");
        fs::create_dir_all(&wal_dir).unwrap();

        write_segment(
            &wal_dir,
            "000000010000000000000001",
            &[build_record(1, 0, 0x00, rmgr::HEAP, &[])],
        );
        write_segment(
            &wal_dir,
            "000000010000000000000002",
            &[
                build_record(2, 0, 0x10, rmgr::HEAP, &[]),
                build_record(2, 0, 0x20, rmgr::HEAP, &[]),
            ],
        );

        let records = recent_records(dir.path(), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation, "DELETE");
        assert_eq!(records[1].operation, "UPDATE");

        let all = recent_records(dir.path(), 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].operation, "INSERT");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_wal_directory(dir.path()).is_err());
    }
}
