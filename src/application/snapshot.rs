use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::error::DiffError;
use crate::domain::ports::SchemaRepository;
use crate::domain::schema::Schema;
use crate::domain::value_objects::SchemaName;

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot service
// ─────────────────────────────────────────────────────────────────────────────

/// Captures the live schema and moves snapshot documents in and out of files.
pub struct SnapshotService {
    repository: Arc<dyn SchemaRepository>,
    schema: SchemaName,
}

impl SnapshotService {
    pub fn new(repository: Arc<dyn SchemaRepository>, schema: SchemaName) -> Self {
        Self { repository, schema }
    }

    /// Introspect the live database, backfilling identity tokens first so
    /// every table in the result is addressable across renames.
    pub async fn capture_live(&self) -> Result<Schema> {
        self.repository.ensure_identities(&self.schema).await?;
        self.repository.snapshot(&self.schema).await
    }

    /// Parse a stored snapshot document.
    pub fn load(path: &Path) -> Result<Schema> {
        if !path.exists() {
            return Err(DiffError::SnapshotMissing {
                path: path.to_path_buf(),
            }
            .into());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed snapshot document {}", path.display()))
    }

    /// Persist a snapshot as pretty-printed JSON.
    pub fn dump(schema: &Schema, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(schema).context("Failed to encode snapshot")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        info!(path = %path.display(), tables = schema.tables.len(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{Column, Table};
    use crate::domain::value_objects::TableId;
    use std::collections::BTreeMap;

    fn sample_schema() -> Schema {
        let mut columns = BTreeMap::new();
        columns.insert(
            "id".to_string(),
            Column {
                data_type: "integer".into(),
                nullable: false,
                default: None,
                max_len: None,
                key: None,
                extra: None,
            },
        );
        let mut tables = BTreeMap::new();
        tables.insert(
            TableId("t1".into()),
            Table {
                name: "tags".into(),
                columns,
                indexes: BTreeMap::new(),
                foreign_keys: BTreeMap::new(),
            },
        );
        Schema {
            tables,
            functions: BTreeMap::new(),
        }
    }

    #[test]
    fn missing_snapshot_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = SnapshotService::load(&path).unwrap_err();
        match err.downcast_ref::<DiffError>() {
            Some(DiffError::SnapshotMissing { path: reported }) => {
                assert_eq!(reported, &path)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dump_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");
        let schema = sample_schema();

        SnapshotService::dump(&schema, &path).unwrap();
        let loaded = SnapshotService::load(&path).unwrap();
        assert_eq!(loaded, schema);
    }

    #[test]
    fn malformed_document_is_fatal_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = SnapshotService::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Malformed snapshot document"));
    }
}
