use serde::{Deserialize, Serialize};

/// Newtype to avoid confusion between schema (namespace) names and table names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaName(pub String);

/// Stable, opaque identity token naming one logical table across snapshots.
///
/// Assigned once by the identity tracker (a 128-bit random token rendered as
/// a hex string) and persisted out-of-band as the table's comment. The token
/// is the table's true key: its display name is mutable metadata and may
/// change between two snapshots without breaking the match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub String);

impl TableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// SHA-256 hex fingerprint of a column's canonical attribute set.
///
/// Computed by `schemadrift::fingerprint(&column)`. Two columns with equal
/// fingerprints are structurally identical regardless of name — the diff
/// engine uses this to tell a rename apart from a drop + add.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Returns the raw hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
