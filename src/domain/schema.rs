use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::TableId;

/// A complete, point-in-time structural description of one database schema.
///
/// This is both the in-memory model the diff engine operates on and the
/// persisted snapshot document (JSON): `tables` is keyed by identity token,
/// not by table name, so that two snapshots taken at different times still
/// recognise "the same table" after a rename. `functions` maps routine name
/// to its full definition text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: BTreeMap<TableId, Table>,
    #[serde(default)]
    pub functions: BTreeMap<String, String>,
}

/// One table's structure. The identity token lives in the surrounding map
/// key; everything in here — including the name — is mutable metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: BTreeMap<String, Column>,
    /// Index name → fully rendered, backend-specific creation statement.
    /// Indexes are atomic: either the definition matches byte-for-byte or
    /// the index is dropped and recreated.
    pub indexes: BTreeMap<String, String>,
    /// Constraint name → rendered foreign-key creation statement.
    /// Older snapshot documents predate this field — it must default to an
    /// empty map rather than fail deserialization.
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
}

/// One column's declared attributes, as introspected from the catalog.
///
/// Field names follow the snapshot document vocabulary (`type`, `null`, …).
/// The optional attributes are backend-dependent: MySQL fills `key`/`extra`,
/// PostgreSQL fills `max_len`. All of them participate in the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(rename = "null")]
    pub nullable: bool,
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<i64>,
    /// Key-role marker, e.g. `PRI` for primary-key members (MySQL). Stored
    /// under `index` in the snapshot document; `key` is accepted on input.
    #[serde(
        rename = "index",
        alias = "key",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
    /// Auxiliary attribute, e.g. `auto_increment` (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Column {
    /// True when the column declares itself an auto-incrementing primary key,
    /// which some backends fold into the column definition itself.
    pub fn is_auto_increment_pk(&self) -> bool {
        self.key.as_deref() == Some("PRI") && self.extra.as_deref() == Some("auto_increment")
    }
}
