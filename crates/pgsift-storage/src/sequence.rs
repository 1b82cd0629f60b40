//! Sequence files.
//!
//! A sequence is stored as a single-page heap file whose special area
//! starts with the magic `0x1717`. The page's one tuple carries the
//! sequence parameters. Two tuple layouts exist: the modern one leads with
//! the element type OID, the legacy one leads with the last value. Without
//! a version hint the first word is tested against the known integer type
//! OIDs, a heuristic that can misfire when a legacy sequence's last value
//! happens to collide with one of them.

use pgsift_common::{Oid, RelKind, PAGE_SIZE, RELATION_CATALOG_OID, SEQUENCE_MAGIC};
use serde::Serialize;

use crate::bytes;
use crate::catalog::{parse_databases, parse_relations};
use crate::error::{StorageError, StorageResult};
use crate::file::FileReader;
use crate::page::parse_page;

/// Parsed sequence parameters and runtime state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceState {
    /// Sequence name, filled by catalog-driven sweeps.
    pub name: String,
    /// Sequence OID, filled by catalog-driven sweeps.
    pub oid: Oid,
    /// On-disk filenode, filled by catalog-driven sweeps.
    pub filenode: Oid,
    /// Last value handed out (or the start value before first use).
    pub last_value: i64,
    /// Configured start value.
    pub start_value: i64,
    /// Configured increment.
    pub increment_by: i64,
    /// Configured maximum.
    pub max_value: i64,
    /// Configured minimum.
    pub min_value: i64,
    /// Configured cache size.
    pub cache_value: i64,
    /// Wraparound allowed.
    pub is_cycled: bool,
    /// True once a value has been handed out.
    pub is_called: bool,
}

/// Integer type OIDs a modern sequence tuple can lead with.
fn is_integer_type_oid(word: u32) -> bool {
    matches!(word, 20 | 21 | 23)
}

/// Returns true if `data` looks like a sequence file (special-area magic).
#[must_use]
pub fn is_sequence_file(data: &[u8]) -> bool {
    if data.len() < PAGE_SIZE {
        return false;
    }
    let special = bytes::u16(data, 16) as usize;
    if special == 0 || special >= PAGE_SIZE - 2 {
        return false;
    }
    bytes::u16(data, special) == SEQUENCE_MAGIC
}

/// Parses a sequence file, auto-detecting the tuple layout.
pub fn parse_sequence(data: &[u8]) -> StorageResult<SequenceState> {
    parse_sequence_with_version(data, 0)
}

/// Parses a sequence file with an engine-major-version hint.
///
/// A hint of 10 or newer forces the modern layout and an older hint forces
/// the legacy one, sidestepping the first-word heuristic entirely.
pub fn parse_sequence_with_version(data: &[u8], version_hint: u32) -> StorageResult<SequenceState> {
    if data.len() < PAGE_SIZE {
        return Err(StorageError::too_small("sequence file", data.len(), PAGE_SIZE));
    }
    if !is_sequence_file(data) {
        let special = bytes::u16(data, 16) as usize;
        return Err(StorageError::bad_magic(
            "sequence page",
            u32::from(SEQUENCE_MAGIC),
            u32::from(bytes::u16(data, special.min(PAGE_SIZE - 2))),
        ));
    }

    let entries = parse_page(&data[..PAGE_SIZE]);
    let tuple = entries
        .first()
        .map(|e| &e.tuple)
        .ok_or_else(|| StorageError::corrupt("sequence page", "no tuple on page"))?;

    parse_sequence_tuple(&tuple.data, version_hint)
}

fn parse_sequence_tuple(data: &[u8], version_hint: u32) -> StorageResult<SequenceState> {
    if data.len() < 8 {
        return Err(StorageError::too_small("sequence tuple", data.len(), 8));
    }

    let modern = match version_hint {
        0 => is_integer_type_oid(bytes::u32(data, 0)),
        v => v >= 10,
    };

    let mut seq = SequenceState::default();

    if modern {
        // Type OID, then the six parameters, then runtime state
        if data.len() < 4 + 48 {
            return Err(StorageError::too_small("sequence tuple", data.len(), 52));
        }
        let mut offset = 4;
        seq.start_value = bytes::i64(data, offset);
        offset += 8;
        seq.increment_by = bytes::i64(data, offset);
        offset += 8;
        seq.max_value = bytes::i64(data, offset);
        offset += 8;
        seq.min_value = bytes::i64(data, offset);
        offset += 8;
        seq.cache_value = bytes::i64(data, offset);
        offset += 8;
        seq.is_cycled = data[offset] != 0;
        offset = bytes::align(offset + 1, 8);

        if data.len() >= offset + 8 {
            seq.last_value = bytes::i64(data, offset);
            offset += 8;
            // Runtime tail is (log count, called flag); older writers drop
            // the log count
            if data.len() >= offset + 9 {
                seq.is_called = data[offset + 8] != 0;
            } else if data.len() > offset {
                seq.is_called = data[offset] != 0;
            }
        } else {
            seq.last_value = seq.start_value;
        }
    } else {
        // Legacy: last value first, parameters after
        if data.len() < 57 {
            seq.last_value = bytes::i64(data, 0);
            return Ok(seq);
        }
        let mut offset = 0;
        seq.last_value = bytes::i64(data, offset);
        offset += 8;
        seq.start_value = bytes::i64(data, offset);
        offset += 8;
        seq.increment_by = bytes::i64(data, offset);
        offset += 8;
        seq.max_value = bytes::i64(data, offset);
        offset += 8;
        seq.min_value = bytes::i64(data, offset);
        offset += 8;
        seq.cache_value = bytes::i64(data, offset);
        offset += 8;
        offset += 8; // log count
        if let Some(&b) = data.get(offset) {
            seq.is_cycled = b != 0;
        }
        if let Some(&b) = data.get(offset + 1) {
            seq.is_called = b != 0;
        }
    }

    Ok(seq)
}

/// Finds and parses every sequence of one database via its relation
/// catalog. Unreadable or malformed sequence files are skipped.
pub fn find_sequences(
    reader: &impl FileReader,
    db_oid: Oid,
    version_hint: u32,
) -> StorageResult<Vec<SequenceState>> {
    let class_data = reader.read(&format!("base/{db_oid}/{RELATION_CATALOG_OID}"))?;

    let mut sequences = Vec::new();
    for rel in parse_relations(&class_data) {
        if rel.kind != RelKind::Sequence {
            continue;
        }
        let Ok(data) = reader.read(&format!("base/{db_oid}/{}", rel.filenode)) else {
            continue;
        };
        match parse_sequence_with_version(&data, version_hint) {
            Ok(mut seq) => {
                seq.name = rel.name;
                seq.oid = rel.oid;
                seq.filenode = rel.filenode;
                sequences.push(seq);
            }
            Err(err) => {
                tracing::debug!(sequence = %rel.name, error = %err, "skipping sequence");
            }
        }
    }

    Ok(sequences)
}

/// Sweeps every non-template database for sequences, grouped by database
/// name.
pub fn scan_all_sequences(
    reader: &impl FileReader,
    version_hint: u32,
) -> StorageResult<Vec<(String, Vec<SequenceState>)>> {
    let db_data = reader.read(&format!("global/{}", pgsift_common::DATABASE_CATALOG_OID))?;

    let mut results = Vec::new();
    for db in parse_databases(&db_data) {
        if db.name.starts_with("template") {
            continue;
        }
        match find_sequences(reader, db.oid, version_hint) {
            Ok(seqs) if !seqs.is_empty() => results.push((db.name, seqs)),
            _ => {}
        }
    }

    Ok(results)
}

/// Builds a sequence file image with the modern tuple layout. Fixture
/// helper.
#[must_use]
pub fn build_sequence_file(last_value: i64, start: i64, increment: i64, is_called: bool) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&20u32.to_le_bytes()); // int8 element type
    payload.extend_from_slice(&start.to_le_bytes());
    payload.extend_from_slice(&increment.to_le_bytes());
    payload.extend_from_slice(&i64::MAX.to_le_bytes());
    payload.extend_from_slice(&1i64.to_le_bytes());
    payload.extend_from_slice(&1i64.to_le_bytes());
    payload.push(0); // not cycled
    while payload.len() % 8 != 0 {
        payload.push(0);
    }
    payload.extend_from_slice(&last_value.to_le_bytes());
    payload.extend_from_slice(&0i64.to_le_bytes()); // log count
    payload.push(u8::from(is_called));

    let tuple = crate::tuple::build_tuple(
        1,
        0,
        crate::tuple::infomask::XMAX_INVALID,
        3,
        &[],
        &payload,
    );
    crate::page::build_page_with_special(&[tuple], &SEQUENCE_MAGIC.to_le_bytes())
}
