use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::schema::Column;
use crate::domain::value_objects::Fingerprint;

/// Compute a SHA-256 fingerprint of a column's full attribute set.
///
/// Algorithm:
/// 1. Every attribute (type, nullability, default, max length, key role,
///    extra) is placed into a `BTreeMap` keyed by attribute name, so the
///    serialization is canonical — insertion order cannot leak into the hash.
/// 2. The map is serialised to JSON and hashed with SHA-256.
///
/// Two columns with equal fingerprints are considered structurally identical
/// regardless of name. The diff engine relies on this to distinguish a
/// renamed column (fingerprint preserved) from a replaced one.
pub fn fingerprint(column: &Column) -> Fingerprint {
    let attrs: BTreeMap<&str, Value> = BTreeMap::from([
        ("type", Value::String(column.data_type.clone())),
        ("null", Value::Bool(column.nullable)),
        (
            "default",
            column
                .default
                .clone()
                .map_or(Value::Null, Value::String),
        ),
        (
            "max_len",
            column.max_len.map_or(Value::Null, |n| Value::from(n)),
        ),
        (
            "key",
            column.key.clone().map_or(Value::Null, Value::String),
        ),
        (
            "extra",
            column.extra.clone().map_or(Value::Null, Value::String),
        ),
    ]);

    let canonical = serde_json::to_string(&attrs).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    Fingerprint(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_column() -> Column {
        Column {
            data_type: "varchar(255)".into(),
            nullable: false,
            default: None,
            max_len: None,
            key: None,
            extra: None,
        }
    }

    #[test]
    fn identical_columns_identical_fingerprint() {
        assert_eq!(fingerprint(&base_column()), fingerprint(&base_column()));
    }

    #[test]
    fn type_change_changes_fingerprint() {
        let mut changed = base_column();
        changed.data_type = "text".into();
        assert_ne!(fingerprint(&base_column()), fingerprint(&changed));
    }

    #[test]
    fn nullability_change_changes_fingerprint() {
        let mut changed = base_column();
        changed.nullable = true;
        assert_ne!(fingerprint(&base_column()), fingerprint(&changed));
    }

    #[test]
    fn default_change_changes_fingerprint() {
        let mut changed = base_column();
        changed.default = Some("'pending'".into());
        assert_ne!(fingerprint(&base_column()), fingerprint(&changed));
    }

    #[test]
    fn auxiliary_attributes_participate() {
        let mut keyed = base_column();
        keyed.key = Some("PRI".into());
        assert_ne!(fingerprint(&base_column()), fingerprint(&keyed));

        let mut extra = base_column();
        extra.extra = Some("auto_increment".into());
        assert_ne!(fingerprint(&base_column()), fingerprint(&extra));
        assert_ne!(fingerprint(&keyed), fingerprint(&extra));
    }

    #[test]
    fn max_len_participates() {
        let mut sized = base_column();
        sized.max_len = Some(255);
        assert_ne!(fingerprint(&base_column()), fingerprint(&sized));
    }
}
