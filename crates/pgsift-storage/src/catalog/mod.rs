//! System catalog parsing.
//!
//! Three catalogs live at fixed OIDs and bootstrap everything else: the
//! database catalog (`global/1262`), the relation catalog
//! (`base/<db>/1259`) and the attribute catalog (`base/<db>/1249`). Their
//! schemas are hard-coded here because no schema exists yet to describe
//! them. Column layouts moved between engine major versions, so parsers
//! try the known layouts and keep the one that self-validates.

use std::collections::BTreeMap;

use pgsift_common::{Oid, RelKind};
use serde::Serialize;

use crate::heap::read_tuples;
use crate::tuple::{decode_tuple, Column, Row};
use crate::value::decode::{oids, type_name};
use crate::value::Value;

/// A database, as listed in the shared database catalog.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    /// Database OID; names the `base/<oid>` directory.
    pub oid: Oid,
    /// Database name.
    pub name: String,
    /// Tablespace holding the database's default storage.
    pub tablespace_oid: Oid,
}

/// A relation, as listed in a database's relation catalog.
#[derive(Debug, Clone, Serialize)]
pub struct RelationInfo {
    /// Relation OID.
    pub oid: Oid,
    /// Relation name.
    pub name: String,
    /// On-disk file name; falls back to the OID for never-rewritten
    /// relations whose stored filenode is zero.
    pub filenode: Oid,
    /// Relation kind letter.
    pub kind: RelKind,
    /// Companion chunk table for out-of-line values, if any.
    pub toast_relid: Oid,
}

/// A column, as listed in a database's attribute catalog.
#[derive(Debug, Clone, Serialize)]
pub struct AttrInfo {
    /// Column name.
    pub name: String,
    /// Type OID.
    pub type_id: u32,
    /// Storage width (`-1` for varlena).
    pub length: i32,
    /// 1-based attribute number.
    pub attnum: i32,
    /// Alignment code (`c`/`s`/`i`/`d`).
    pub align: u8,
}

impl AttrInfo {
    /// Converts to a decoding column.
    #[must_use]
    pub fn to_column(&self) -> Column {
        Column::new(self.name.clone(), self.type_id, self.length)
            .with_attnum(self.attnum)
            .with_align(self.align)
    }

    /// SQL name of the column's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        type_name(self.type_id)
    }
}

/// A role from the shared authorization catalog.
#[derive(Debug, Clone, Serialize)]
pub struct AuthInfo {
    /// Role OID.
    pub oid: Oid,
    /// Role name.
    pub role_name: String,
    /// Stored password hash, if one is set.
    pub password: Option<String>,
    /// Superuser flag.
    pub superuser: bool,
    /// Login permission flag.
    pub can_login: bool,
}

fn col(name: &str, type_id: u32, length: i32, align: u8) -> Column {
    Column::new(name, type_id, length).with_align(align)
}

// =============================================================================
// Database catalog
// =============================================================================

/// Database catalog layouts, newest first. Only the prefix up to the
/// tablespace column matters; trailing columns are never decoded.
fn database_layouts() -> Vec<Vec<Column>> {
    let prefix = || {
        vec![
            col("oid", oids::OID, 4, b'i'),
            col("datname", oids::NAME, 64, b'c'),
            col("datdba", oids::OID, 4, b'i'),
            col("encoding", oids::INT4, 4, b'i'),
        ]
    };

    // v16: locale provider char plus a login-event-trigger flag
    let mut v16 = prefix();
    v16.extend([
        col("datlocprovider", oids::CHAR, 1, b'c'),
        col("datistemplate", oids::BOOL, 1, b'c'),
        col("datallowconn", oids::BOOL, 1, b'c'),
        col("dathasloginevt", oids::BOOL, 1, b'c'),
        col("datconnlimit", oids::INT4, 4, b'i'),
        col("datfrozenxid", oids::XID, 4, b'i'),
        col("datminmxid", oids::XID, 4, b'i'),
        col("dattablespace", oids::OID, 4, b'i'),
    ]);

    // v15: locale provider char, no login-event flag
    let mut v15 = prefix();
    v15.extend([
        col("datlocprovider", oids::CHAR, 1, b'c'),
        col("datistemplate", oids::BOOL, 1, b'c'),
        col("datallowconn", oids::BOOL, 1, b'c'),
        col("datconnlimit", oids::INT4, 4, b'i'),
        col("datfrozenxid", oids::XID, 4, b'i'),
        col("datminmxid", oids::XID, 4, b'i'),
        col("dattablespace", oids::OID, 4, b'i'),
    ]);

    // v12-14: collate/ctype stored inline as fixed name fields
    let mut v12 = prefix();
    v12.extend([
        col("datcollate", oids::NAME, 64, b'c'),
        col("datctype", oids::NAME, 64, b'c'),
        col("datistemplate", oids::BOOL, 1, b'c'),
        col("datallowconn", oids::BOOL, 1, b'c'),
        col("datconnlimit", oids::INT4, 4, b'i'),
        col("datlastsysoid", oids::OID, 4, b'i'),
        col("datfrozenxid", oids::XID, 4, b'i'),
        col("datminmxid", oids::XID, 4, b'i'),
        col("dattablespace", oids::OID, 4, b'i'),
    ]);

    vec![v16, v15, v12]
}

fn row_u32(row: &Row, name: &str) -> u32 {
    row.get(name)
        .and_then(Value::as_i64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn row_text(row: &Row, name: &str) -> String {
    row.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn row_bool(row: &Row, name: &str) -> bool {
    matches!(row.get(name), Some(Value::Bool(true)))
}

fn plausible_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_graphic() || c == ' ')
}

fn plausible_tablespace(oid: u32) -> bool {
    oid == 1663 || oid == 1664 || oid >= 16384
}

/// Parses the database catalog into database descriptions.
///
/// Tries the known column layouts and keeps whichever validates for the
/// most rows; zero-OID rows are stripped.
#[must_use]
pub fn parse_databases(data: &[u8]) -> Vec<DatabaseInfo> {
    let entries = read_tuples(data, true);
    let mut best: Vec<DatabaseInfo> = Vec::new();
    let mut best_score = 0usize;

    for layout in database_layouts() {
        let mut parsed = Vec::new();
        let mut score = 0usize;

        for entry in &entries {
            let row = decode_tuple(&entry.tuple, &layout);
            let oid = row_u32(&row, "oid");
            let name = row_text(&row, "datname");
            let tablespace = row_u32(&row, "dattablespace");

            if oid == 0 || !plausible_name(&name) {
                continue;
            }
            if plausible_tablespace(tablespace) {
                score += 1;
            }
            parsed.push(DatabaseInfo {
                oid: Oid::new(oid),
                name,
                tablespace_oid: Oid::new(tablespace),
            });
        }

        if score > best_score || (best.is_empty() && !parsed.is_empty()) {
            best_score = score;
            best = parsed;
        }
    }

    best
}

// =============================================================================
// Relation catalog
// =============================================================================

/// Relation catalog prefix, stable across supported versions.
fn relation_layout() -> Vec<Column> {
    vec![
        col("oid", oids::OID, 4, b'i'),
        col("relname", oids::NAME, 64, b'c'),
        col("relnamespace", oids::OID, 4, b'i'),
        col("reltype", oids::OID, 4, b'i'),
        col("reloftype", oids::OID, 4, b'i'),
        col("relowner", oids::OID, 4, b'i'),
        col("relam", oids::OID, 4, b'i'),
        col("relfilenode", oids::OID, 4, b'i'),
        col("reltablespace", oids::OID, 4, b'i'),
        col("relpages", oids::INT4, 4, b'i'),
        col("reltuples", oids::FLOAT4, 4, b'i'),
        col("relallvisible", oids::INT4, 4, b'i'),
        col("reltoastrelid", oids::OID, 4, b'i'),
        col("relhasindex", oids::BOOL, 1, b'c'),
        col("relisshared", oids::BOOL, 1, b'c'),
        col("relpersistence", oids::CHAR, 1, b'c'),
        col("relkind", oids::CHAR, 1, b'c'),
    ]
}

/// Parses the relation catalog into relation descriptions.
#[must_use]
pub fn parse_relations(data: &[u8]) -> Vec<RelationInfo> {
    let layout = relation_layout();
    let mut relations = Vec::new();

    for entry in read_tuples(data, true) {
        let row = decode_tuple(&entry.tuple, &layout);
        let oid = row_u32(&row, "oid");
        let name = row_text(&row, "relname");
        if oid == 0 || !plausible_name(&name) {
            continue;
        }

        let filenode = row_u32(&row, "relfilenode");
        let kind = row_text(&row, "relkind").chars().next().unwrap_or('r');

        relations.push(RelationInfo {
            oid: Oid::new(oid),
            name,
            filenode: Oid::new(if filenode != 0 { filenode } else { oid }),
            kind: RelKind::from_char(kind),
            toast_relid: Oid::new(row_u32(&row, "reltoastrelid")),
        });
    }

    relations
}

// =============================================================================
// Attribute catalog
// =============================================================================

/// Attribute catalog layouts. The alignment and storage code columns
/// swapped places (and a compression code appeared) in newer versions.
fn attribute_layouts(version_hint: u32) -> Vec<Vec<Column>> {
    let prefix = || {
        vec![
            col("attrelid", oids::OID, 4, b'i'),
            col("attname", oids::NAME, 64, b'c'),
            col("atttypid", oids::OID, 4, b'i'),
            col("attstattarget", oids::INT4, 4, b'i'),
            col("attlen", oids::INT2, 2, b's'),
            col("attnum", oids::INT2, 2, b's'),
            col("attndims", oids::INT4, 4, b'i'),
            col("attcacheoff", oids::INT4, 4, b'i'),
            col("atttypmod", oids::INT4, 4, b'i'),
            col("attbyval", oids::BOOL, 1, b'c'),
        ]
    };

    // v14+: alignment before storage, compression code present
    let mut modern = prefix();
    modern.extend([
        col("attalign", oids::CHAR, 1, b'c'),
        col("attstorage", oids::CHAR, 1, b'c'),
        col("attcompression", oids::CHAR, 1, b'c'),
        col("attnotnull", oids::BOOL, 1, b'c'),
        col("atthasdef", oids::BOOL, 1, b'c'),
        col("atthasmissing", oids::BOOL, 1, b'c'),
        col("attidentity", oids::CHAR, 1, b'c'),
        col("attgenerated", oids::CHAR, 1, b'c'),
        col("attisdropped", oids::BOOL, 1, b'c'),
    ]);

    // v12-13: storage before alignment, no compression code
    let mut legacy = prefix();
    legacy.extend([
        col("attstorage", oids::CHAR, 1, b'c'),
        col("attalign", oids::CHAR, 1, b'c'),
        col("attnotnull", oids::BOOL, 1, b'c'),
        col("atthasdef", oids::BOOL, 1, b'c'),
        col("atthasmissing", oids::BOOL, 1, b'c'),
        col("attidentity", oids::CHAR, 1, b'c'),
        col("attgenerated", oids::CHAR, 1, b'c'),
        col("attisdropped", oids::BOOL, 1, b'c'),
    ]);

    match version_hint {
        14.. => vec![modern],
        12 | 13 => vec![legacy],
        _ => vec![modern, legacy],
    }
}

fn is_align_code(b: u8) -> bool {
    matches!(b, b'c' | b's' | b'i' | b'd')
}

/// Parses the attribute catalog, grouping columns by owning relation.
///
/// `version_hint` is the engine major version when known (0 to autodetect).
/// Layout candidates are tried until one yields self-consistent rows: a
/// printable name, a valid alignment code, and either a positive length or
/// a recognized type.
#[must_use]
pub fn parse_attributes(data: &[u8], version_hint: u32) -> BTreeMap<Oid, Vec<AttrInfo>> {
    let entries = read_tuples(data, true);
    let mut best: BTreeMap<Oid, Vec<AttrInfo>> = BTreeMap::new();
    let mut best_score = 0usize;

    for layout in attribute_layouts(version_hint) {
        let mut grouped: BTreeMap<Oid, Vec<AttrInfo>> = BTreeMap::new();
        let mut score = 0usize;

        for entry in &entries {
            let row = decode_tuple(&entry.tuple, &layout);
            let relid = row_u32(&row, "attrelid");
            let name = row_text(&row, "attname");
            let attnum = row
                .get("attnum")
                .and_then(Value::as_i64)
                .unwrap_or(0) as i32;
            let length = row
                .get("attlen")
                .and_then(Value::as_i64)
                .unwrap_or(0) as i32;
            let type_id = row_u32(&row, "atttypid");
            let align = row_text(&row, "attalign").bytes().next().unwrap_or(0);

            if relid == 0 || attnum <= 0 || !plausible_name(&name) {
                continue;
            }
            if row_bool(&row, "attisdropped") {
                continue;
            }

            let self_consistent = is_align_code(align)
                && (length > 0 || length == -1)
                && (length > 0 || type_name(type_id) != "unknown");
            if self_consistent {
                score += 1;
            }

            grouped.entry(Oid::new(relid)).or_default().push(AttrInfo {
                name,
                type_id,
                length,
                attnum,
                align,
            });
        }

        if score > best_score {
            best_score = score;
            best = grouped;
        }
    }

    for attrs in best.values_mut() {
        attrs.sort_by_key(|a| a.attnum);
    }
    best
}

// =============================================================================
// Authorization catalog
// =============================================================================

fn auth_layout() -> Vec<Column> {
    vec![
        col("oid", oids::OID, 4, b'i'),
        col("rolname", oids::NAME, 64, b'c'),
        col("rolsuper", oids::BOOL, 1, b'c'),
        col("rolinherit", oids::BOOL, 1, b'c'),
        col("rolcreaterole", oids::BOOL, 1, b'c'),
        col("rolcreatedb", oids::BOOL, 1, b'c'),
        col("rolcanlogin", oids::BOOL, 1, b'c'),
        col("rolreplication", oids::BOOL, 1, b'c'),
        col("rolbypassrls", oids::BOOL, 1, b'c'),
        col("rolconnlimit", oids::INT4, 4, b'i'),
        col("rolpassword", oids::TEXT, -1, b'i'),
    ]
}

/// Parses the authorization catalog into role and password-hash records.
///
/// Dead tuples are included: dropped or altered roles are often exactly
/// what a forensic caller is after.
#[must_use]
pub fn parse_auth(data: &[u8]) -> Vec<AuthInfo> {
    let layout = auth_layout();
    let mut roles = Vec::new();

    for entry in read_tuples(data, false) {
        let row = decode_tuple(&entry.tuple, &layout);
        let oid = row_u32(&row, "oid");
        let name = row_text(&row, "rolname");
        if oid == 0 || !plausible_name(&name) {
            continue;
        }

        let password = match row.get("rolpassword") {
            Some(Value::Text(p)) if !p.is_empty() => Some(p.clone()),
            _ => None,
        };

        roles.push(AuthInfo {
            oid: Oid::new(oid),
            role_name: name,
            password,
            superuser: row_bool(&row, "rolsuper"),
            can_login: row_bool(&row, "rolcanlogin"),
        });
    }

    roles
}

// =============================================================================
// Well-known catalog names
// =============================================================================

/// Returns the name of a well-known system catalog OID, if recognized.
#[must_use]
pub fn catalog_name(oid: Oid) -> Option<&'static str> {
    Some(match oid.as_u32() {
        1213 => "pg_tablespace",
        1247 => "pg_type",
        1249 => "pg_attribute",
        1255 => "pg_proc",
        1259 => "pg_class",
        1260 => "pg_authid",
        1261 => "pg_auth_members",
        1262 => "pg_database",
        2396 => "pg_shdepend",
        2964 => "pg_db_role_setting",
        3592 => "pg_shseclabel",
        3602 => "pg_transform",
        6000 => "pg_replication_origin",
        6100 => "pg_subscription",
        _ => return None,
    })
}
