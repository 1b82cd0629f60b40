//! Block ranges and per-block inspection.
//!
//! A block range expression selects pages of a relation file: `"5"` is a
//! single block, `"0:10"` inclusive bounds, `"5:"` and `":20"` open ends,
//! `""` everything. Block info records surface the page-header geometry
//! without decoding tuples.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use pgsift_common::{Lsn, ITEM_ID_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};
use serde::Serialize;

use crate::bytes;
use crate::error::{StorageError, StorageResult};
use crate::heap::read_tuples;
use crate::page::TupleEntry;

/// An inclusive range of block numbers; `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRange {
    /// First block, or the file start.
    pub start: Option<u64>,
    /// Last block, or the file end.
    pub end: Option<u64>,
}

/// Parses a block range expression. The empty string selects everything
/// (`Ok(None)`); negative numbers, garbage and inverted bounds are errors.
pub fn parse_block_range(s: &str) -> StorageResult<Option<BlockRange>> {
    if s.is_empty() {
        return Ok(None);
    }

    let parse_bound = |part: &str| -> StorageResult<u64> {
        part.parse::<u64>().map_err(|_| {
            StorageError::invalid_range(format!("invalid block number: {part:?}"))
        })
    };

    let range = if let Some((lo, hi)) = s.split_once(':') {
        BlockRange {
            start: if lo.is_empty() {
                None
            } else {
                Some(parse_bound(lo)?)
            },
            end: if hi.is_empty() {
                None
            } else {
                Some(parse_bound(hi)?)
            },
        }
    } else {
        let block = parse_bound(s)?;
        BlockRange {
            start: Some(block),
            end: Some(block),
        }
    };

    if let (Some(start), Some(end)) = (range.start, range.end) {
        if start > end {
            return Err(StorageError::invalid_range(format!(
                "start block ({start}) greater than end block ({end})"
            )));
        }
    }

    Ok(Some(range))
}

/// Reads the selected blocks of a relation file.
pub fn read_block_range(path: &Path, range: Option<BlockRange>) -> StorageResult<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let total_blocks = file.metadata()?.len() / PAGE_SIZE as u64;
    if total_blocks == 0 {
        return Ok(Vec::new());
    }

    let range = range.unwrap_or_default();
    let start = range.start.unwrap_or(0);
    let end = range.end.unwrap_or(total_blocks - 1).min(total_blocks - 1);

    if start >= total_blocks {
        return Err(StorageError::invalid_range(format!(
            "start block {start} beyond file ({total_blocks} blocks)"
        )));
    }

    file.seek(SeekFrom::Start(start * PAGE_SIZE as u64))?;
    let mut data = vec![0u8; ((end - start + 1) as usize) * PAGE_SIZE];
    let n = file.read(&mut data)?;
    data.truncate(n);
    Ok(data)
}

/// Page-header geometry of one block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockInfo {
    /// Block number within the relation.
    pub block_number: u64,
    /// Page LSN, formatted the way the engine prints it.
    pub lsn: String,
    /// Stored checksum.
    pub checksum: u16,
    /// Page flags.
    pub flags: u16,
    /// End of the line-pointer array.
    pub lower: u16,
    /// Start of tuple storage.
    pub upper: u16,
    /// Start of the special region.
    pub special: u16,
    /// Page size from the size/version word.
    pub page_size: usize,
    /// Page layout version.
    pub version: u8,
    /// Line-pointer count.
    pub item_count: usize,
    /// Bytes between lower and upper.
    pub free_space: usize,
    /// True for an all-zero (never initialized) page.
    pub is_empty: bool,
}

/// Summarizes one page's header. Returns `None` for short buffers.
#[must_use]
pub fn parse_block_info(page: &[u8], block_number: u64) -> Option<BlockInfo> {
    if page.len() < PAGE_SIZE {
        return None;
    }

    if page[..PAGE_SIZE].iter().all(|&b| b == 0) {
        return Some(BlockInfo {
            block_number,
            lsn: Lsn::INVALID.to_string(),
            checksum: 0,
            flags: 0,
            lower: 0,
            upper: 0,
            special: 0,
            page_size: 0,
            version: 0,
            item_count: 0,
            free_space: 0,
            is_empty: true,
        });
    }

    let lower = bytes::u16(page, 12);
    let upper = bytes::u16(page, 14);
    let size_version = bytes::u16(page, 18);

    let item_count = if usize::from(lower) >= PAGE_HEADER_SIZE {
        (usize::from(lower) - PAGE_HEADER_SIZE) / ITEM_ID_SIZE
    } else {
        0
    };

    Some(BlockInfo {
        block_number,
        lsn: Lsn::from_parts(bytes::u32(page, 0), bytes::u32(page, 4)).to_string(),
        checksum: bytes::u16(page, 8),
        flags: bytes::u16(page, 10),
        lower,
        upper,
        special: bytes::u16(page, 16),
        page_size: usize::from(size_version & 0xFF00),
        version: (size_version & 0x00FF) as u8,
        item_count,
        free_space: usize::from(upper).saturating_sub(usize::from(lower)),
        is_empty: false,
    })
}

/// Summarizes every block in a range of a relation file.
pub fn dump_block_range(path: &Path, range: Option<BlockRange>) -> StorageResult<Vec<BlockInfo>> {
    let data = read_block_range(path, range)?;
    let first = range.and_then(|r| r.start).unwrap_or(0);

    Ok(data
        .chunks_exact(PAGE_SIZE)
        .enumerate()
        .filter_map(|(i, page)| parse_block_info(page, first + i as u64))
        .collect())
}

/// Reads tuples from the selected blocks only.
pub fn read_tuples_in_range(
    path: &Path,
    range: Option<BlockRange>,
    include_dead: bool,
) -> StorageResult<Vec<TupleEntry>> {
    let data = read_block_range(path, range)?;
    Ok(read_tuples(&data, !include_dead))
}

/// Aggregate statistics over a block range.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockRangeStats {
    /// Blocks inspected.
    pub total_blocks: usize,
    /// First block number.
    pub start_block: u64,
    /// Last block number.
    pub end_block: u64,
    /// All-zero pages.
    pub empty_blocks: usize,
    /// Initialized pages.
    pub used_blocks: usize,
    /// Line pointers across used pages.
    pub total_items: usize,
    /// Free bytes across used pages.
    pub total_free_space: u64,
    /// Mean fill percentage of used pages.
    pub avg_fill_percent: f64,
}

/// Computes aggregate statistics for a block range.
pub fn block_range_stats(path: &Path, range: Option<BlockRange>) -> StorageResult<BlockRangeStats> {
    let blocks = dump_block_range(path, range)?;
    let mut stats = BlockRangeStats {
        total_blocks: blocks.len(),
        ..Default::default()
    };
    let Some(first) = blocks.first() else {
        return Ok(stats);
    };
    stats.start_block = first.block_number;
    stats.end_block = blocks.last().map(|b| b.block_number).unwrap_or_default();

    let mut used_bytes = 0u64;
    for block in &blocks {
        if block.is_empty {
            stats.empty_blocks += 1;
        } else {
            stats.used_blocks += 1;
            stats.total_items += block.item_count;
            stats.total_free_space += block.free_space as u64;
            if block.page_size > 0 {
                used_bytes += (block.page_size - block.free_space) as u64;
            }
        }
    }

    if stats.used_blocks > 0 {
        let capacity = (stats.used_blocks * PAGE_SIZE) as f64;
        stats.avg_fill_percent = used_bytes as f64 / capacity * 100.0;
    }

    Ok(stats)
}

/// A hex dump of one block.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryBlockDump {
    /// Block number within the relation.
    pub block_number: u64,
    /// Byte offset of the block within the file.
    pub offset: u64,
    /// Classic sixteen-bytes-per-line hex rendering.
    pub hex_dump: String,
    /// Bytes dumped.
    pub size: usize,
}

/// Hex-dumps the selected blocks.
pub fn dump_binary_range(
    path: &Path,
    range: Option<BlockRange>,
) -> StorageResult<Vec<BinaryBlockDump>> {
    let data = read_block_range(path, range)?;
    let first = range.and_then(|r| r.start).unwrap_or(0);

    Ok(data
        .chunks_exact(PAGE_SIZE)
        .enumerate()
        .map(|(i, page)| BinaryBlockDump {
            block_number: first + i as u64,
            offset: (first + i as u64) * PAGE_SIZE as u64,
            hex_dump: hex_dump(page),
            size: page.len(),
        })
        .collect())
}

/// Formats bytes as a classic hex dump with an ASCII gutter.
#[must_use]
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", i * 16));
        for (j, b) in line.iter().enumerate() {
            out.push_str(&format!("{b:02x} "));
            if j == 7 {
                out.push(' ');
            }
        }
        for _ in line.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" |");
        for &b in line {
            out.push(if (0x20..0x7F).contains(&b) { b as char } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_range_table() {
        assert_eq!(parse_block_range("").unwrap(), None);
        assert_eq!(
            parse_block_range("5").unwrap(),
            Some(BlockRange {
                start: Some(5),
                end: Some(5)
            })
        );
        assert_eq!(
            parse_block_range("0:10").unwrap(),
            Some(BlockRange {
                start: Some(0),
                end: Some(10)
            })
        );
        assert_eq!(
            parse_block_range("5:").unwrap(),
            Some(BlockRange {
                start: Some(5),
                end: None
            })
        );
        assert_eq!(
            parse_block_range(":20").unwrap(),
            Some(BlockRange {
                start: None,
                end: Some(20)
            })
        );
        assert!(parse_block_range("10:5").is_err());
        assert!(parse_block_range("-1:5").is_err());
        assert!(parse_block_range("abc").is_err());
    }

    #[test]
    fn test_parse_block_info_fields() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0u32.to_le_bytes());
        page[4..8].copy_from_slice(&1u32.to_le_bytes());
        page[8..10].copy_from_slice(&0x3412u16.to_le_bytes());
        page[12..14].copy_from_slice(&28u16.to_le_bytes());
        page[14..16].copy_from_slice(&8000u16.to_le_bytes());
        page[16..18].copy_from_slice(&8192u16.to_le_bytes());
        page[18..20].copy_from_slice(&(8192u16 | 4).to_le_bytes());

        let info = parse_block_info(&page, 0).unwrap();
        assert_eq!(info.checksum, 0x3412);
        assert_eq!(info.page_size, 8192);
        assert_eq!(info.version, 4);
        assert_eq!(info.item_count, 1);
        assert_eq!(info.free_space, 8000 - 28);
        assert!(!info.is_empty);
    }

    #[test]
    fn test_empty_block() {
        let page = vec![0u8; PAGE_SIZE];
        let info = parse_block_info(&page, 3).unwrap();
        assert!(info.is_empty);
        assert_eq!(info.block_number, 3);
        assert!(parse_block_info(&[0u8; 100], 0).is_none());
    }

    #[test]
    fn test_read_block_range_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("161616");
        let mut data = Vec::new();
        for i in 0u8..4 {
            let mut page = vec![0u8; PAGE_SIZE];
            page[0] = i + 1;
            data.extend_from_slice(&page);
        }
        fs::write(&path, &data).unwrap();

        let all = read_block_range(&path, None).unwrap();
        assert_eq!(all.len(), PAGE_SIZE * 4);

        let middle = read_block_range(&path, parse_block_range("1:2").unwrap()).unwrap();
        assert_eq!(middle.len(), PAGE_SIZE * 2);
        assert_eq!(middle[0], 2);
        assert_eq!(middle[PAGE_SIZE], 3);

        // End clamps to the file, start beyond it errors
        let tail = read_block_range(&path, parse_block_range("3:100").unwrap()).unwrap();
        assert_eq!(tail.len(), PAGE_SIZE);
        assert!(read_block_range(&path, parse_block_range("100:").unwrap()).is_err());
    }

    #[test]
    fn test_stats_and_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r");

        let used = crate::page::build_page(&[crate::tuple::build_tuple(
            1,
            0,
            crate::tuple::infomask::XMAX_INVALID,
            1,
            &[],
            &[9, 0, 0, 0],
        )]);
        let mut data = used;
        data.extend_from_slice(&vec![0u8; PAGE_SIZE]);
        fs::write(&path, &data).unwrap();

        let stats = block_range_stats(&path, None).unwrap();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.used_blocks, 1);
        assert_eq!(stats.empty_blocks, 1);
        assert_eq!(stats.total_items, 1);
        assert!(stats.avg_fill_percent > 0.0);

        let dumps = dump_binary_range(&path, parse_block_range("0").unwrap()).unwrap();
        assert_eq!(dumps.len(), 1);
        assert!(dumps[0].hex_dump.starts_with("00000000  "));
        assert_eq!(dumps[0].size, PAGE_SIZE);
    }

    #[test]
    fn test_hex_dump_format() {
        let dump = hex_dump(b"ABCDEFGHIJKLMNOPqr");
        let mut lines = dump.lines();
        let first = lines.next().unwrap();
        assert!(first.contains("41 42 43 44 45 46 47 48  49 4a 4b 4c 4d 4e 4f 50"));
        assert!(first.ends_with("|ABCDEFGHIJKLMNOP|"));
        let second = lines.next().unwrap();
        assert!(second.starts_with("00000010"));
        assert!(second.contains("|qr|"));
    }
}
