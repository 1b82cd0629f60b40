//! Multi-segment relation files.
//!
//! Relations larger than the segment size are split across files named
//! `<filenode>`, `<filenode>.1`, `<filenode>.2`, ... This module maps
//! logical block numbers onto segments and reads across the split.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use pgsift_common::{DEFAULT_SEGMENT_SIZE, PAGE_SIZE};
use serde::Serialize;

use crate::error::{StorageError, StorageResult};

/// Options for segment-aware reads.
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Segment size in bytes.
    pub segment_size: usize,
    /// Overrides the segment number derived from the file name.
    pub segment_number: Option<u32>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            segment_number: None,
        }
    }
}

/// Description of one on-disk segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    /// Path of the segment file.
    pub path: String,
    /// Segment number (0 for the bare filenode).
    pub segment_number: u32,
    /// Configured segment size.
    pub segment_size: usize,
    /// Actual file size in bytes.
    pub file_size: u64,
    /// Number of whole pages in the file.
    pub total_blocks: u64,
    /// Byte offset of this segment within the logical relation.
    pub global_offset: u64,
}

/// Maps a logical block number to `(segment_number, local_block)`.
#[must_use]
pub fn segment_for_block(global_block: u64, segment_size: usize) -> (u64, u64) {
    let segment_size = if segment_size == 0 {
        DEFAULT_SEGMENT_SIZE
    } else {
        segment_size
    };
    let blocks_per_segment = (segment_size / PAGE_SIZE) as u64;
    (
        global_block / blocks_per_segment,
        global_block % blocks_per_segment,
    )
}

/// Extracts the segment number from a path: a numeric `.N` suffix, else 0.
#[must_use]
pub fn segment_number_from_path(path: &Path) -> u32 {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or(0)
}

/// Describes the segment file at `path`.
pub fn segment_info(path: &Path, opts: &SegmentOptions) -> StorageResult<SegmentInfo> {
    let meta = fs::metadata(path)?;
    let number = opts
        .segment_number
        .unwrap_or_else(|| segment_number_from_path(path));

    Ok(SegmentInfo {
        path: path.display().to_string(),
        segment_number: number,
        segment_size: opts.segment_size,
        file_size: meta.len(),
        total_blocks: meta.len() / PAGE_SIZE as u64,
        global_offset: u64::from(number) * opts.segment_size as u64,
    })
}

/// Lists the segments of a relation, stopping at the first missing one.
pub fn list_segments(base_path: &Path) -> StorageResult<Vec<SegmentInfo>> {
    let opts = SegmentOptions::default();
    let mut segments = Vec::new();

    if base_path.is_file() {
        segments.push(segment_info(base_path, &opts)?);
    }

    for n in 1u32.. {
        let candidate = base_path.with_extension(n.to_string());
        if !candidate.is_file() {
            break;
        }
        let mut info = segment_info(&candidate, &opts)?;
        info.segment_number = n;
        info.global_offset = u64::from(n) * opts.segment_size as u64;
        segments.push(info);
    }

    Ok(segments)
}

/// Reads one block from a segment file by local block number.
pub fn read_segment_block(
    path: &Path,
    local_block: u64,
    opts: &SegmentOptions,
) -> StorageResult<Vec<u8>> {
    let info = segment_info(path, opts)?;
    if local_block >= info.total_blocks {
        return Err(StorageError::invalid_range(format!(
            "block {local_block} beyond segment ({} blocks)",
            info.total_blocks
        )));
    }

    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(local_block * PAGE_SIZE as u64))?;
    let mut page = vec![0u8; PAGE_SIZE];
    let n = file.read(&mut page)?;
    page.truncate(n);
    Ok(page)
}

/// Reads logical blocks `start..=end` across segments, routing each block
/// to its segment. Stops quietly at the first missing segment.
pub fn read_multi_segment(
    base_path: &Path,
    start: u64,
    end: u64,
    opts: &SegmentOptions,
) -> StorageResult<Vec<u8>> {
    let segments = list_segments(base_path)?;
    if segments.is_empty() {
        return Err(StorageError::not_found(
            "segment file",
            base_path.display().to_string(),
        ));
    }

    let mut out = Vec::new();
    for block in start..=end {
        let (seg, local) = segment_for_block(block, opts.segment_size);
        let Some(info) = segments.get(seg as usize) else {
            break;
        };
        match read_segment_block(Path::new(&info.path), local, opts) {
            Ok(page) => out.extend_from_slice(&page),
            Err(_) => break,
        }
    }

    Ok(out)
}
