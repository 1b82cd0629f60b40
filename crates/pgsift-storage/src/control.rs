//! Cluster control file.
//!
//! `global/pg_control` is a single fixed-layout block recording the
//! cluster's identity, state and last checkpoint. The fields parsed here
//! sit at the same offsets for every supported engine major version:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!    0      8   system identifier
//!    8      4   control-format version
//!   12      4   catalog version
//!   16      4   cluster state
//!   24      8   state timestamp (seconds)
//!   32      8   checkpoint LSN
//!   40      8   checkpoint redo LSN
//!   48      4   timeline id
//!   52      4   previous timeline id
//!   56      1   full-page-writes flag
//!   64      8   next transaction id
//!  256      4   page size
//!  260      4   blocks per relation segment
//!  268      4   WAL segment size
//!  292      4   data-checksum version (0 = checksums disabled)
//! ```

use pgsift_common::Lsn;
use serde::Serialize;

use crate::bytes;
use crate::error::{StorageError, StorageResult};
use crate::file::FileReader;

/// Minimum bytes a control block can occupy on disk.
const MIN_CONTROL_SIZE: usize = 296;

/// Cluster state enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    /// Database system is starting up.
    StartingUp,
    /// Shut down cleanly.
    ShutDown,
    /// Shut down while in recovery.
    ShutDownInRecovery,
    /// Shutdown in progress.
    ShuttingDown,
    /// Recovering from a crash.
    InCrashRecovery,
    /// Replaying archived WAL.
    InArchiveRecovery,
    /// Running normally.
    InProduction,
    /// Unrecognized state code.
    Unknown(u32),
}

impl ClusterState {
    fn from_code(code: u32) -> Self {
        match code {
            0 => Self::StartingUp,
            1 => Self::ShutDown,
            2 => Self::ShutDownInRecovery,
            3 => Self::ShuttingDown,
            4 => Self::InCrashRecovery,
            5 => Self::InArchiveRecovery,
            6 => Self::InProduction,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable state description.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::StartingUp => "starting up",
            Self::ShutDown => "shut down",
            Self::ShutDownInRecovery => "shut down in recovery",
            Self::ShuttingDown => "shutting down",
            Self::InCrashRecovery => "in crash recovery",
            Self::InArchiveRecovery => "in archive recovery",
            Self::InProduction => "in production",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Parsed control file.
#[derive(Debug, Clone, Serialize)]
pub struct ControlFile {
    /// Unique cluster identifier, shared with every WAL segment.
    pub system_identifier: u64,
    /// Control-file format version (e.g. 1300).
    pub control_version: u32,
    /// System-catalog format version (date-coded).
    pub catalog_version: u32,
    /// Cluster state at last update.
    pub state: ClusterState,
    /// Unix timestamp of the last state change.
    pub state_time: i64,
    /// LSN of the last checkpoint record.
    pub checkpoint_lsn: Lsn,
    /// LSN recovery must replay from.
    pub redo_lsn: Lsn,
    /// Current timeline.
    pub timeline_id: u32,
    /// Timeline before the last switch.
    pub prev_timeline_id: u32,
    /// Whether full-page writes were on at the checkpoint.
    pub full_page_writes: bool,
    /// Next transaction id (with epoch in the high bits).
    pub next_xid: u64,
    /// Page size the cluster was initialized with.
    pub block_size: u32,
    /// Blocks per relation segment.
    pub blocks_per_segment: u32,
    /// WAL segment size in bytes.
    pub wal_segment_size: u32,
    /// Nonzero when data checksums are enabled.
    pub data_checksum_version: u32,
}

impl ControlFile {
    /// Parses a control block.
    pub fn parse(data: &[u8]) -> StorageResult<Self> {
        if data.len() < MIN_CONTROL_SIZE {
            return Err(StorageError::too_small(
                "control file",
                data.len(),
                MIN_CONTROL_SIZE,
            ));
        }

        Ok(Self {
            system_identifier: bytes::u64(data, 0),
            control_version: bytes::u32(data, 8),
            catalog_version: bytes::u32(data, 12),
            state: ClusterState::from_code(bytes::u32(data, 16)),
            state_time: bytes::i64(data, 24),
            checkpoint_lsn: Lsn::new(bytes::u64(data, 32)),
            redo_lsn: Lsn::new(bytes::u64(data, 40)),
            timeline_id: bytes::u32(data, 48),
            prev_timeline_id: bytes::u32(data, 52),
            full_page_writes: data[56] != 0,
            next_xid: bytes::u64(data, 64),
            block_size: bytes::u32(data, 256),
            blocks_per_segment: bytes::u32(data, 260),
            wal_segment_size: bytes::u32(data, 268),
            data_checksum_version: bytes::u32(data, 292),
        })
    }

    /// Reads and parses `global/pg_control` through a file reader.
    pub fn read_from(reader: &impl FileReader) -> StorageResult<Self> {
        let data = reader.read("global/pg_control")?;
        Self::parse(&data)
    }

    /// True when the cluster stores page checksums.
    #[must_use]
    pub fn data_checksums_enabled(&self) -> bool {
        self.data_checksum_version != 0
    }

    /// Best-effort engine major version from the date-coded catalog
    /// version. Returns 0 when the code is unrecognized.
    #[must_use]
    pub fn major_version(&self) -> u32 {
        match self.catalog_version {
            201_900_000..=202_003_999 => 12,
            202_004_000..=202_100_999 => 13,
            202_101_000..=202_204_999 => 14,
            202_205_000..=202_304_999 => 15,
            202_305_000..=202_404_999 => 16,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_fixture() -> Vec<u8> {
        let mut data = vec![0u8; 8192];
        data[0..8].copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        data[8..12].copy_from_slice(&1300u32.to_le_bytes());
        data[12..16].copy_from_slice(&202_107_181u32.to_le_bytes());
        data[16..20].copy_from_slice(&6u32.to_le_bytes()); // in production
        data[24..32].copy_from_slice(&1_700_000_000i64.to_le_bytes());
        data[32..40].copy_from_slice(&0x1_0000_0028u64.to_le_bytes());
        data[40..48].copy_from_slice(&0x1_0000_0000u64.to_le_bytes());
        data[48..52].copy_from_slice(&1u32.to_le_bytes());
        data[52..56].copy_from_slice(&1u32.to_le_bytes());
        data[56] = 1;
        data[64..72].copy_from_slice(&745u64.to_le_bytes());
        data[256..260].copy_from_slice(&8192u32.to_le_bytes());
        data[260..264].copy_from_slice(&131_072u32.to_le_bytes());
        data[268..272].copy_from_slice(&(16 * 1024 * 1024u32).to_le_bytes());
        data[292..296].copy_from_slice(&1u32.to_le_bytes());
        data
    }

    #[test]
    fn test_parse() {
        let control = ControlFile::parse(&control_fixture()).unwrap();
        assert_eq!(control.system_identifier, 0x1122_3344_5566_7788);
        assert_eq!(control.control_version, 1300);
        assert_eq!(control.state, ClusterState::InProduction);
        assert_eq!(control.state.describe(), "in production");
        assert_eq!(control.checkpoint_lsn.to_string(), "1/28");
        assert_eq!(control.redo_lsn.to_string(), "1/0");
        assert_eq!(control.timeline_id, 1);
        assert!(control.full_page_writes);
        assert_eq!(control.next_xid, 745);
        assert_eq!(control.block_size, 8192);
        assert_eq!(control.blocks_per_segment, 131_072);
        assert!(control.data_checksums_enabled());
    }

    #[test]
    fn test_major_version_mapping() {
        let mut data = control_fixture();
        let control = ControlFile::parse(&data).unwrap();
        assert_eq!(control.major_version(), 14); // 202107181

        data[12..16].copy_from_slice(&201_909_212u32.to_le_bytes());
        assert_eq!(ControlFile::parse(&data).unwrap().major_version(), 12);
        data[12..16].copy_from_slice(&202_307_071u32.to_le_bytes());
        assert_eq!(ControlFile::parse(&data).unwrap().major_version(), 16);
        data[12..16].copy_from_slice(&123u32.to_le_bytes());
        assert_eq!(ControlFile::parse(&data).unwrap().major_version(), 0);
    }

    #[test]
    fn test_unknown_state() {
        let mut data = control_fixture();
        data[16..20].copy_from_slice(&99u32.to_le_bytes());
        let control = ControlFile::parse(&data).unwrap();
        assert_eq!(control.state, ClusterState::Unknown(99));
        assert_eq!(control.state.describe(), "unknown");
    }

    #[test]
    fn test_too_small() {
        let err = ControlFile::parse(&[0u8; 64]).unwrap_err();
        assert!(err.is_format_mismatch());
    }

    #[test]
    fn test_read_from_reader() {
        let fixture = control_fixture();
        let reader = crate::file::FnReader(move |path: &str| -> std::io::Result<Vec<u8>> {
            assert_eq!(path, "global/pg_control");
            Ok(fixture.clone())
        });
        let control = ControlFile::read_from(&reader).unwrap();
        assert_eq!(control.block_size, 8192);
    }
}
