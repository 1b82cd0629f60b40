//! # pgsift-wal
//!
//! Offline decoding of the engine's write-ahead log.
//!
//! A WAL segment is a train of 8 KB pages, each starting with a short or
//! long header, carrying 8-byte-aligned records. This crate decodes page
//! headers, record headers and block references, classifies operations by
//! resource manager, and summarizes whole `pg_wal` directories. Nothing is
//! replayed; the log is read purely as evidence.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod page;
pub mod reader;
pub mod record;

pub use error::{WalError, WalResult};
pub use page::WalPageHeader;
pub use reader::{parse_wal_file, recent_records, scan_wal_directory, WalSummary};
pub use record::{BlockRef, WalRecord};
