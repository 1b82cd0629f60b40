//! Whole-file heap reading.
//!
//! A heap file is a sequence of pages. These functions iterate every page,
//! yield tuples in file order (page offset, then line pointer), and apply
//! the visibility rules from the tuple layer. Deleted-but-retained rows go
//! through the same decode path; only the predicate differs.

use pgsift_common::PAGE_SIZE;
use serde::Serialize;

use crate::page::{parse_page, TupleEntry};
use crate::tuple::{decode_tuple, Column, Row};

/// Extracts tuples from heap file data.
///
/// With `visible_only` set, tuples whose insert was aborted or whose delete
/// committed are filtered out.
#[must_use]
pub fn read_tuples(data: &[u8], visible_only: bool) -> Vec<TupleEntry> {
    let mut entries = Vec::new();

    let mut offset = 0;
    while offset + PAGE_SIZE <= data.len() {
        for mut entry in parse_page(&data[offset..offset + PAGE_SIZE]) {
            if !visible_only || entry.tuple.is_visible() {
                entry.page_offset = offset;
                entries.push(entry);
            }
        }
        offset += PAGE_SIZE;
    }

    entries
}

/// Decodes heap file data into rows using a column schema.
#[must_use]
pub fn read_rows(data: &[u8], columns: &[Column], visible_only: bool) -> Vec<Row> {
    read_tuples(data, visible_only)
        .iter()
        .map(|entry| decode_tuple(&entry.tuple, columns))
        .collect()
}

/// A deleted-but-retained row, kept around until vacuum reclaims it.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedRow {
    /// Byte offset of the containing page.
    pub page_offset: usize,
    /// Byte offset of the tuple within its page.
    pub item_offset: usize,
    /// Decoded columns, when a schema was available.
    pub row: Option<Row>,
    /// Raw payload size in bytes.
    pub raw_size: usize,
}

/// Scans for rows whose delete committed but which vacuum has not yet
/// removed. Pass an empty schema to skip decoding.
#[must_use]
pub fn read_deleted_rows(data: &[u8], columns: &[Column]) -> Vec<DeletedRow> {
    read_tuples(data, false)
        .iter()
        .filter(|entry| entry.tuple.is_deleted())
        .map(|entry| DeletedRow {
            page_offset: entry.page_offset,
            item_offset: entry.item_offset,
            row: (!columns.is_empty()).then(|| decode_tuple(&entry.tuple, columns)),
            raw_size: entry.tuple.data.len(),
        })
        .collect()
}

/// Decodes visible and deleted rows in one pass, keeping them separate.
#[must_use]
pub fn read_rows_with_deleted(data: &[u8], columns: &[Column]) -> (Vec<Row>, Vec<Row>) {
    let mut visible = Vec::new();
    let mut deleted = Vec::new();

    for entry in read_tuples(data, false) {
        let row = decode_tuple(&entry.tuple, columns);
        if entry.tuple.is_visible() {
            visible.push(row);
        } else if entry.tuple.is_deleted() {
            deleted.push(row);
        }
    }

    (visible, deleted)
}
