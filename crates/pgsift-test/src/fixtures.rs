//! Synthetic cluster fixtures.
//!
//! Builds a small but structurally faithful cluster directory: shared
//! catalogs under `global/`, one user database with a couple of tables, a
//! sequence, a chunk table, and a short stretch of WAL. Catalog row
//! payloads follow the modern (v14) column layouts; the control file
//! advertises the matching catalog version.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pgsift_storage::page::build_page;
use pgsift_storage::page::checksum::page_checksum;
use pgsift_storage::relmap::build_relmap;
use pgsift_storage::tuple::{build_tuple, infomask};
use pgsift_storage::value::decode::oids;
use pgsift_storage::value::varlena::build_varlena;
use pgsift_wal::page::{build_page_header, WAL_PAGE_SIZE};
use pgsift_wal::record::{build_record, rmgr};

/// OID of the test database.
pub const DB_OID: u32 = 16384;
/// OID and filenode of the `users` table.
pub const USERS_OID: u32 = 16385;
/// OID and filenode of the `secrets` table.
pub const SECRETS_OID: u32 = 16386;
/// OID and filenode of the `users_id_seq` sequence.
pub const SEQ_OID: u32 = 16390;
/// OID and filenode of the chunk table backing `secrets`.
pub const TOAST_OID: u32 = 16500;

fn name_field(name: &str) -> [u8; 64] {
    let mut field = [0u8; 64];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

fn live_tuple(natts: u16, payload: &[u8]) -> Vec<u8> {
    build_tuple(100, 0, infomask::XMAX_INVALID, natts, &[], payload)
}

fn deleted_tuple(natts: u16, payload: &[u8]) -> Vec<u8> {
    build_tuple(100, 200, infomask::XMAX_COMMITTED, natts, &[], payload)
}

/// Builds a database catalog row (v15+ layout prefix).
#[must_use]
pub fn database_row(oid: u32, name: &str, tablespace: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&oid.to_le_bytes());
    p.extend_from_slice(&name_field(name));
    p.extend_from_slice(&10u32.to_le_bytes()); // owner
    p.extend_from_slice(&6i32.to_le_bytes()); // encoding
    p.push(b'c'); // locale provider
    p.push(u8::from(name.starts_with("template")));
    p.push(1); // allow connections
    p.push(0); // pad
    p.extend_from_slice(&(-1i32).to_le_bytes()); // connection limit
    p.extend_from_slice(&726u32.to_le_bytes()); // frozen xid
    p.extend_from_slice(&1u32.to_le_bytes()); // min multixact
    p.extend_from_slice(&tablespace.to_le_bytes());
    p
}

/// Builds a relation catalog row.
#[must_use]
pub fn relation_row(oid: u32, name: &str, filenode: u32, kind: char, toast: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&oid.to_le_bytes());
    p.extend_from_slice(&name_field(name));
    for v in [2200u32, 0, 0, 10, 0, filenode, 0] {
        p.extend_from_slice(&v.to_le_bytes());
    }
    p.extend_from_slice(&1i32.to_le_bytes()); // pages
    p.extend_from_slice(&0f32.to_le_bytes()); // tuple estimate
    p.extend_from_slice(&0i32.to_le_bytes()); // all-visible pages
    p.extend_from_slice(&toast.to_le_bytes());
    p.push(0); // has index
    p.push(0); // shared
    p.push(b'p'); // persistence
    p.push(kind as u8);
    p.extend_from_slice(&0i16.to_le_bytes()); // natts (unused downstream)
    p
}

/// Builds an attribute catalog row (modern layout).
#[must_use]
pub fn attribute_row(relid: u32, name: &str, type_id: u32, length: i16, attnum: i16, align: u8) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&relid.to_le_bytes());
    p.extend_from_slice(&name_field(name));
    p.extend_from_slice(&type_id.to_le_bytes());
    p.extend_from_slice(&(-1i32).to_le_bytes()); // stats target
    p.extend_from_slice(&length.to_le_bytes());
    p.extend_from_slice(&attnum.to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes()); // dimensions
    p.extend_from_slice(&(-1i32).to_le_bytes()); // cache offset
    p.extend_from_slice(&(-1i32).to_le_bytes()); // type modifier
    p.push(1); // by value
    p.push(align);
    p.push(b'p'); // storage
    p.push(0); // compression
    p.extend_from_slice(&[0; 6]); // notnull .. isdropped
    p
}

/// Builds an authorization catalog row.
#[must_use]
pub fn auth_row(oid: u32, name: &str, password: Option<&str>) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&oid.to_le_bytes());
    p.extend_from_slice(&name_field(name));
    p.extend_from_slice(&[1, 1, 1, 1, 1, 0, 0]); // role flags
    p.push(0); // pad
    p.extend_from_slice(&(-1i32).to_le_bytes()); // connection limit
    if let Some(pw) = password {
        p.extend_from_slice(&build_varlena(pw.as_bytes()));
    }
    p
}

/// Builds a binary-JSON object of string pairs.
#[must_use]
pub fn jsonb_object(pairs: &[(&str, &str)]) -> Vec<u8> {
    let count = pairs.len() as u32;
    let mut out = (0x2000_0000u32 | count).to_le_bytes().to_vec();
    for (k, _) in pairs {
        out.extend_from_slice(&(k.len() as u32).to_le_bytes());
    }
    for (_, v) in pairs {
        out.extend_from_slice(&(v.len() as u32).to_le_bytes());
    }
    for (k, _) in pairs {
        out.extend_from_slice(k.as_bytes());
    }
    for (_, v) in pairs {
        out.extend_from_slice(v.as_bytes());
    }
    out
}

/// Builds a `users` heap row: `(id int4, name text)`.
#[must_use]
pub fn users_row(id: i32, name: &str) -> Vec<u8> {
    let mut p = id.to_le_bytes().to_vec();
    p.extend_from_slice(&build_varlena(name.as_bytes()));
    p
}

/// Builds a chunk-table row.
#[must_use]
pub fn toast_chunk_row(chunk_id: u32, seq: i32, data: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&chunk_id.to_le_bytes());
    p.extend_from_slice(&seq.to_le_bytes());
    p.extend_from_slice(&build_varlena(data));
    p
}

/// Builds a control file advertising an engine v14 cluster with data
/// checksums enabled.
#[must_use]
pub fn control_file() -> Vec<u8> {
    let mut data = vec![0u8; 8192];
    data[0..8].copy_from_slice(&0x6111_2222_3333_4444u64.to_le_bytes());
    data[8..12].copy_from_slice(&1300u32.to_le_bytes());
    data[12..16].copy_from_slice(&202_107_181u32.to_le_bytes()); // v14
    data[16..20].copy_from_slice(&1u32.to_le_bytes()); // shut down
    data[24..32].copy_from_slice(&1_690_000_000i64.to_le_bytes());
    data[32..40].copy_from_slice(&0x1_0000_0060u64.to_le_bytes());
    data[40..48].copy_from_slice(&0x1_0000_0028u64.to_le_bytes());
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

/// Stamps valid checksums into every page of a heap file image.
#[must_use]
pub fn with_checksums(mut data: Vec<u8>) -> Vec<u8> {
    let page_size = pgsift_common::PAGE_SIZE;
    for block in 0..data.len() / page_size {
        let start = block * page_size;
        let sum = page_checksum(&data[start..start + page_size], block as u32);
        data[start + 8..start + 10].copy_from_slice(&sum.to_le_bytes());
    }
    data
}

/// A synthetic cluster written to disk.
pub struct TestCluster {
    /// Cluster root directory.
    pub root: PathBuf,
}

/// Writes the full fixture cluster under `root`.
pub fn write_cluster(root: &Path) -> io::Result<TestCluster> {
    let global = root.join("global");
    let base = root.join("base").join(DB_OID.to_string());
    let wal = root.join("pg_wal");
    fs::create_dir_all(&global)?;
    fs::create_dir_all(&base)?;
    fs::create_dir_all(&wal)?;

    // Shared catalogs
    let db_page = build_page(&[
        live_tuple(15, &database_row(1, "template1", 1663)),
        live_tuple(15, &database_row(DB_OID, "testdb", 1663)),
    ]);
    fs::write(global.join("1262"), with_checksums(db_page))?;

    let auth_page = build_page(&[live_tuple(
        12,
        &auth_row(10, "postgres", Some("SCRAM-SHA-256$4096:c2FsdA==$stored:server")),
    )]);
    fs::write(global.join("1260"), auth_page)?;

    fs::write(global.join("pg_control"), control_file())?;
    fs::write(
        global.join("pg_filenode.map"),
        build_relmap(&[(1262, 1262), (1260, 1260)]),
    )?;

    // Relation catalog
    let class_page = build_page(&[
        live_tuple(33, &relation_row(USERS_OID, "users", USERS_OID, 'r', 0)),
        live_tuple(33, &relation_row(SECRETS_OID, "secrets", SECRETS_OID, 'r', TOAST_OID)),
        live_tuple(33, &relation_row(SEQ_OID, "users_id_seq", SEQ_OID, 'S', 0)),
        live_tuple(33, &relation_row(1259, "pg_class", 1259, 'r', 0)),
    ]);
    fs::write(base.join("1259"), with_checksums(class_page))?;

    // Attribute catalog
    let attr_page = build_page(&[
        live_tuple(26, &attribute_row(USERS_OID, "id", oids::INT4, 4, 1, b'i')),
        live_tuple(26, &attribute_row(USERS_OID, "name", oids::TEXT, -1, 2, b'i')),
        live_tuple(26, &attribute_row(SECRETS_OID, "id", oids::INT4, 4, 1, b'i')),
        live_tuple(26, &attribute_row(SECRETS_OID, "value", oids::JSONB, -1, 2, b'i')),
    ]);
    fs::write(base.join("1249"), with_checksums(attr_page))?;

    // users: two live rows, one deleted
    let users_page = build_page(&[
        live_tuple(2, &users_row(1, "alice")),
        live_tuple(2, &users_row(2, "bob")),
        deleted_tuple(2, &users_row(3, "carol")),
    ]);
    fs::write(base.join(USERS_OID.to_string()), with_checksums(users_page))?;

    // secrets: one row holding a binary-JSON object
    let mut secret_payload = 1i32.to_le_bytes().to_vec();
    secret_payload.extend_from_slice(&build_varlena(&jsonb_object(&[("api_key", "hunter2")])));
    let secrets_page = build_page(&[live_tuple(2, &secret_payload)]);
    fs::write(
        base.join(SECRETS_OID.to_string()),
        with_checksums(secrets_page),
    )?;

    // sequence
    fs::write(
        base.join(SEQ_OID.to_string()),
        pgsift_storage::sequence::build_sequence_file(2, 1, 1, true),
    )?;

    // chunk table: one value split across two chunks
    let toast_page = build_page(&[
        build_tuple(
            100,
            0,
            infomask::XMAX_INVALID,
            3,
            &[],
            &toast_chunk_row(4242, 1, b"chunked value"),
        ),
        build_tuple(
            100,
            0,
            infomask::XMAX_INVALID,
            3,
            &[],
            &toast_chunk_row(4242, 0, b"a long, "),
        ),
    ]);
    fs::write(base.join(TOAST_OID.to_string()), toast_page)?;

    // One WAL segment: an insert, its commit, and a delete
    let mut wal_page = vec![0u8; WAL_PAGE_SIZE];
    let header = build_page_header(0xD10F, 0x0002, 1, 0, 0);
    wal_page[..header.len()].copy_from_slice(&header);
    let mut pos = 40;
    for record in [
        build_record(745, 0, 0x00, rmgr::HEAP, &[]),
        build_record(745, 0x28, 0x00, rmgr::XACT, &[]),
        build_record(746, 0x50, 0x10, rmgr::HEAP, &[]),
    ] {
        wal_page[pos..pos + record.len()].copy_from_slice(&record);
        pos = (pos + record.len() + 7) & !7;
    }
    fs::write(wal.join("000000010000000000000001"), wal_page)?;

    Ok(TestCluster {
        root: root.to_path_buf(),
    })
}
