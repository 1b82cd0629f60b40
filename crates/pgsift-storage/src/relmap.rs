//! OID-to-filenode map files.
//!
//! Mapped system catalogs keep their file assignment in a 512-byte
//! `pg_filenode.map` instead of the relation catalog: a magic word, a
//! mapping count, 62 `(oid, filenode)` slots and a trailing CRC. One map
//! lives in `global/`, one in each database directory.

use pgsift_common::{Oid, RELMAP_FILE_SIZE, RELMAP_MAGIC, RELMAP_MAX_MAPPINGS};
use serde::Serialize;

use crate::bytes;
use crate::catalog::{self, parse_databases};
use crate::error::{StorageError, StorageResult};
use crate::file::FileReader;

/// One OID-to-filenode mapping.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelMapping {
    /// Catalog OID.
    pub oid: Oid,
    /// On-disk filenode.
    pub filenode: Oid,
    /// Well-known catalog name, when recognized.
    pub catalog_name: Option<&'static str>,
}

/// A parsed map file.
#[derive(Debug, Clone, Serialize)]
pub struct RelMapFile {
    /// Stored magic word.
    pub magic: u32,
    /// Number of occupied mapping slots.
    pub num_mappings: u32,
    /// The occupied mappings.
    pub mappings: Vec<RelMapping>,
    /// Stored CRC over the preceding bytes (not verified here).
    pub crc: u32,
    /// True for the cluster-wide map under `global/`.
    pub is_global: bool,
}

impl RelMapFile {
    /// Parses a 512-byte map file.
    pub fn parse(data: &[u8]) -> StorageResult<Self> {
        if data.len() < RELMAP_FILE_SIZE {
            return Err(StorageError::too_small(
                "relation map file",
                data.len(),
                RELMAP_FILE_SIZE,
            ));
        }

        let magic = bytes::u32(data, 0);
        if magic != RELMAP_MAGIC {
            return Err(StorageError::bad_magic(
                "relation map",
                RELMAP_MAGIC,
                magic,
            ));
        }

        let num_mappings = bytes::u32(data, 4);
        if num_mappings as usize > RELMAP_MAX_MAPPINGS {
            return Err(StorageError::corrupt(
                "relation map",
                format!("{num_mappings} mappings (limit {RELMAP_MAX_MAPPINGS})"),
            ));
        }

        let mut mappings = Vec::with_capacity(num_mappings as usize);
        for i in 0..num_mappings as usize {
            let offset = 8 + i * 8;
            let oid = Oid::new(bytes::u32(data, offset));
            mappings.push(RelMapping {
                oid,
                filenode: Oid::new(bytes::u32(data, offset + 4)),
                catalog_name: catalog::catalog_name(oid),
            });
        }

        Ok(Self {
            magic,
            num_mappings,
            mappings,
            crc: bytes::u32(data, 8 + RELMAP_MAX_MAPPINGS * 8),
            is_global: false,
        })
    }

    /// Looks up the filenode assigned to a catalog OID.
    #[must_use]
    pub fn filenode(&self, oid: Oid) -> Option<Oid> {
        self.mappings
            .iter()
            .find(|m| m.oid == oid)
            .map(|m| m.filenode)
    }

    /// Looks up the catalog OID owning a filenode.
    #[must_use]
    pub fn oid(&self, filenode: Oid) -> Option<Oid> {
        self.mappings
            .iter()
            .find(|m| m.filenode == filenode)
            .map(|m| m.oid)
    }
}

/// Reads the cluster-wide map from `global/pg_filenode.map`.
pub fn read_global_map(reader: &impl FileReader) -> StorageResult<RelMapFile> {
    let data = reader.read("global/pg_filenode.map")?;
    let mut map = RelMapFile::parse(&data)?;
    map.is_global = true;
    Ok(map)
}

/// Reads a database's map from `base/<oid>/pg_filenode.map`.
pub fn read_database_map(reader: &impl FileReader, db_oid: Oid) -> StorageResult<RelMapFile> {
    let data = reader.read(&format!("base/{db_oid}/pg_filenode.map"))?;
    RelMapFile::parse(&data)
}

/// Every map file in the cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterMaps {
    /// The shared map under `global/`.
    pub global: RelMapFile,
    /// Per-database maps, where readable.
    pub databases: Vec<RelMapFile>,
}

/// Reads the global map plus the map of every listed database. Databases
/// whose map is unreadable are skipped.
pub fn read_all_maps(reader: &impl FileReader) -> StorageResult<ClusterMaps> {
    let global = read_global_map(reader)?;

    let mut databases = Vec::new();
    if let Ok(db_data) = reader.read(&format!("global/{}", pgsift_common::DATABASE_CATALOG_OID)) {
        for db in parse_databases(&db_data) {
            match read_database_map(reader, db.oid) {
                Ok(map) => databases.push(map),
                Err(err) => {
                    tracing::debug!(db = %db.name, error = %err, "skipping database map");
                }
            }
        }
    }

    Ok(ClusterMaps { global, databases })
}

/// Builds a map file image. Fixture helper.
#[must_use]
pub fn build_relmap(mappings: &[(u32, u32)]) -> Vec<u8> {
    let mut data = vec![0u8; RELMAP_FILE_SIZE];
    data[0..4].copy_from_slice(&RELMAP_MAGIC.to_le_bytes());
    data[4..8].copy_from_slice(&(mappings.len() as u32).to_le_bytes());
    for (i, (oid, filenode)) in mappings.iter().enumerate() {
        let offset = 8 + i * 8;
        data[offset..offset + 4].copy_from_slice(&oid.to_le_bytes());
        data[offset + 4..offset + 8].copy_from_slice(&filenode.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookups() {
        let data = build_relmap(&[(1262, 1262), (1259, 16384)]);
        let map = RelMapFile::parse(&data).unwrap();

        assert_eq!(map.magic, RELMAP_MAGIC);
        assert_eq!(map.num_mappings, 2);
        assert_eq!(map.mappings.len(), 2);
        assert_eq!(map.filenode(Oid::new(1259)), Some(Oid::new(16384)));
        assert_eq!(map.oid(Oid::new(16384)), Some(Oid::new(1259)));
        assert_eq!(map.filenode(Oid::new(9999)), None);
        assert_eq!(map.oid(Oid::new(9999)), None);
        assert_eq!(map.mappings[0].catalog_name, Some("pg_database"));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RelMapFile::parse(&[0u8; 100]).is_err());

        let mut bad_magic = build_relmap(&[]);
        bad_magic[0] = 0xFF;
        assert!(RelMapFile::parse(&bad_magic).is_err());

        let mut bad_count = build_relmap(&[]);
        bad_count[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(RelMapFile::parse(&bad_count).is_err());
    }

    #[test]
    fn test_mapping_count_bounds() {
        let pairs: Vec<(u32, u32)> = (0..62).map(|i| (1000 + i, 2000 + i)).collect();
        let map = RelMapFile::parse(&build_relmap(&pairs)).unwrap();
        assert_eq!(map.num_mappings, 62);
        for (oid, filenode) in pairs {
            assert_eq!(map.filenode(Oid::new(oid)), Some(Oid::new(filenode)));
            assert_eq!(map.oid(Oid::new(filenode)), Some(Oid::new(oid)));
        }
    }

    #[test]
    fn test_read_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("global")).unwrap();
        std::fs::write(
            dir.path().join("global/pg_filenode.map"),
            build_relmap(&[(1262, 1262)]),
        )
        .unwrap();

        let reader = crate::file::DirReader::new(dir.path());
        let map = read_global_map(&reader).unwrap();
        assert!(map.is_global);
        assert_eq!(map.filenode(Oid::new(1262)), Some(Oid::new(1262)));
    }
}
