//! Out-of-line (TOAST) value resolution.
//!
//! Values too large for a page are sliced into chunks and stored in a
//! companion chunk table; the tuple keeps an 18-byte pointer record naming
//! the chunk table and a value id. This module parses those pointers,
//! reads chunk tables, reassembles values and undoes compression.

use std::collections::HashMap;

use pgsift_common::Oid;
use serde::Serialize;

use crate::bytes;
use crate::compress::{self, CompressionMethod};
use crate::error::StorageResult;
use crate::file::FileReader;
use crate::heap::read_tuples;
use crate::value::varlena::{self, read_varlena};

/// A parsed external-pointer record.
#[derive(Debug, Clone)]
pub struct ToastPointer {
    /// Size of the value once reassembled and decompressed.
    pub raw_size: u32,
    /// Size as stored in the chunk table.
    pub external_size: u32,
    /// Chunk id of the value within its chunk table.
    pub value_id: Oid,
    /// OID of the chunk table.
    pub toast_relid: Oid,
    /// True when the stored bytes are compressed.
    pub compressed: bool,
    /// Codec for compressed values.
    pub method: CompressionMethod,
}

/// One row of a chunk table.
#[derive(Debug, Clone)]
pub struct ToastChunk {
    /// Value this chunk belongs to.
    pub chunk_id: u32,
    /// Position of this chunk within its value.
    pub chunk_seq: i32,
    /// Chunk payload.
    pub data: Vec<u8>,
}

/// Returns true if `data` starts with an external-pointer tag.
#[must_use]
pub fn is_toast_pointer(data: &[u8]) -> bool {
    data.len() >= 2 && varlena::is_external(data)
}

/// Parses an external-pointer record: a tag byte, then raw size (with the
/// compression method in its top two bits), external size, value id and
/// chunk-table OID.
#[must_use]
pub fn parse_toast_pointer(data: &[u8]) -> Option<ToastPointer> {
    if data.len() < 17 || !varlena::is_external(data) {
        return None;
    }

    let tag = data[0];
    let raw_field = bytes::u32(data, 1);
    let raw_size = raw_field & 0x3FFF_FFFF;
    let external_size = bytes::u32(data, 5);

    // The 0x02 tag always means compressed; for on-disk pointers the
    // stored size being smaller than the raw size is the indicator
    let compressed = tag == 0x02 || (tag == 0x12 && external_size < raw_size);

    Some(ToastPointer {
        raw_size,
        external_size,
        value_id: Oid::new(bytes::u32(data, 9)),
        toast_relid: Oid::new(bytes::u32(data, 13)),
        compressed,
        method: CompressionMethod::from_bits((raw_field >> 30) as u8),
    })
}

/// Reads every chunk of a chunk-table file.
///
/// Chunk tables have a fixed three-column shape: chunk id, sequence
/// number, then the chunk bytes as a varlena.
#[must_use]
pub fn read_chunk_table(data: &[u8]) -> Vec<ToastChunk> {
    let mut chunks = Vec::new();

    for entry in read_tuples(data, true) {
        let tuple = &entry.tuple;
        if tuple.data.len() < 8 {
            continue;
        }

        let chunk_id = bytes::u32(&tuple.data, 0);
        let chunk_seq = bytes::i32(&tuple.data, 4);

        let offset = bytes::align(8, 4);
        let Some((payload, _)) = read_varlena(&tuple.data[offset.min(tuple.data.len())..]) else {
            continue;
        };

        if !payload.is_empty() {
            chunks.push(ToastChunk {
                chunk_id,
                chunk_seq,
                data: payload,
            });
        }
    }

    chunks
}

/// Reassembles one value from its chunks.
///
/// Chunks are filtered by value id, ordered by sequence number and
/// concatenated; compressed values are passed through the codec chain and
/// the result is truncated to the pointer's raw size. Returns `None` when
/// no chunks match.
#[must_use]
pub fn reassemble(chunks: &[ToastChunk], value_id: Oid, ptr: &ToastPointer) -> Option<Vec<u8>> {
    let mut parts: Vec<&ToastChunk> = chunks
        .iter()
        .filter(|c| c.chunk_id == value_id.as_u32())
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.sort_by_key(|c| c.chunk_seq);

    let mut data = Vec::with_capacity(ptr.external_size as usize);
    for chunk in parts {
        data.extend_from_slice(&chunk.data);
    }

    let raw_size = ptr.raw_size as usize;
    let mut out = if ptr.compressed && !data.is_empty() {
        compress::decompress(&data, raw_size, ptr.method)
    } else {
        data
    };

    if raw_size > 0 && out.len() > raw_size {
        out.truncate(raw_size);
    }
    Some(out)
}

/// Chunk-count and size statistics for one chunk table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToastTableStats {
    /// Chunk table OID.
    pub toast_relid: Oid,
    /// Total chunk rows.
    pub total_chunks: usize,
    /// Distinct values stored.
    pub unique_values: usize,
    /// Total stored bytes across all chunks.
    pub total_size: u64,
    /// Largest chunk count for a single value.
    pub max_chunks_per_value: usize,
    /// Mean chunk size in bytes.
    pub average_chunk_size: f64,
}

/// Summarizes a chunk-table file.
#[must_use]
pub fn chunk_table_stats(toast_relid: Oid, data: &[u8]) -> ToastTableStats {
    let chunks = read_chunk_table(data);

    let mut per_value: HashMap<u32, usize> = HashMap::new();
    let mut total_size = 0u64;
    for chunk in &chunks {
        *per_value.entry(chunk.chunk_id).or_default() += 1;
        total_size += chunk.data.len() as u64;
    }

    ToastTableStats {
        toast_relid,
        total_chunks: chunks.len(),
        unique_values: per_value.len(),
        total_size,
        max_chunks_per_value: per_value.values().copied().max().unwrap_or(0),
        average_chunk_size: if chunks.is_empty() {
            0.0
        } else {
            total_size as f64 / chunks.len() as f64
        },
    }
}

/// Resolves external pointers against chunk tables, loading each table at
/// most once.
///
/// The cache is owned by the reader instance and keyed by chunk-table OID;
/// create one reader per database (chunk-table files live under the
/// database directory).
pub struct ToastReader<R> {
    reader: Option<R>,
    db_oid: Oid,
    chunks: HashMap<Oid, Vec<ToastChunk>>,
}

impl ToastReader<crate::file::DirReader> {
    /// Creates a reader with no file access; chunk tables must be loaded
    /// explicitly with [`ToastReader::load_table`].
    #[must_use]
    pub fn detached() -> Self {
        Self {
            reader: None,
            db_oid: Oid::INVALID,
            chunks: HashMap::new(),
        }
    }
}

impl<R: FileReader> ToastReader<R> {
    /// Creates a reader that lazily loads chunk tables for one database.
    pub fn for_database(reader: R, db_oid: Oid) -> Self {
        Self {
            reader: Some(reader),
            db_oid,
            chunks: HashMap::new(),
        }
    }

    /// Loads a chunk table from pre-read file data.
    pub fn load_table(&mut self, toast_relid: Oid, data: &[u8]) {
        self.chunks.insert(toast_relid, read_chunk_table(data));
    }

    /// Loads a chunk table through the file reader.
    pub fn load_table_from_file(&mut self, toast_relid: Oid) -> StorageResult<()> {
        let Some(reader) = &self.reader else {
            return Ok(());
        };
        let path = format!("base/{}/{}", self.db_oid, toast_relid);
        let data = reader.read(&path)?;
        self.load_table(toast_relid, &data);
        Ok(())
    }

    /// Resolves a value: external pointers are reassembled from their
    /// chunk table, anything else is returned as-is.
    pub fn read_value(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let Some(ptr) = parse_toast_pointer(data) else {
            return Some(data.to_vec());
        };

        if !self.chunks.contains_key(&ptr.toast_relid) {
            if let Err(err) = self.load_table_from_file(ptr.toast_relid) {
                tracing::debug!(
                    toast_relid = %ptr.toast_relid,
                    error = %err,
                    "chunk table unavailable"
                );
            }
        }

        let chunks = self.chunks.get(&ptr.toast_relid)?;
        reassemble(chunks, ptr.value_id, &ptr)
    }
}
