use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of schemadrift's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                              |
/// |---------|-----------------|------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                 |
/// | `Info`  | `info`          | Default — shows identity backfills       |
/// | `Debug` | `debug`         | `--verbose` — shows catalog queries too  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for schemadrift.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any schemadrift async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "schemadrift=error",
        LogLevel::Info => "schemadrift=info",
        LogLevel::Debug => "schemadrift=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use domain::changeset::{Changeset, Statement, StatementKind, Summary};
pub use domain::error::DiffError;
pub use domain::fingerprint::fingerprint;
pub use domain::ports::{OutputWriter, SchemaRepository};
pub use domain::schema::{Column, Schema, Table};
pub use domain::value_objects::{Fingerprint, SchemaName, TableId};
pub use infrastructure::config::{AppConfig, Collation, DbConfig, DiffOptions, OutputConfig};

use crate::application::diff::DiffEngine;
use crate::application::snapshot::SnapshotService;
use crate::infrastructure::db::client::connect;
use crate::infrastructure::db::dialect::renderer_for;

// ─── Public entry points ───

/// Diff the live database against the stored snapshot at `snapshot_path`.
///
/// Connects, backfills missing identity tokens, introspects the live schema
/// and returns the ordered change-set that would transform it into the
/// snapshot. Nothing from the change-set is executed.
pub async fn compare(cfg: &AppConfig, snapshot_path: &Path) -> Result<Changeset> {
    let target = SnapshotService::load(snapshot_path)?;
    let current = capture(cfg).await?;
    diff_schemas(cfg, &current, &target)
}

/// Capture the live schema and write it to `path` as a snapshot document.
///
/// This is the counterpart of [`compare`]: run it against the database whose
/// structure you want to reproduce elsewhere, then feed the written file to
/// `compare` on the databases that should follow it.
pub async fn dump(cfg: &AppConfig, path: &Path) -> Result<Schema> {
    let schema = capture(cfg).await?;
    SnapshotService::dump(&schema, path)?;
    Ok(schema)
}

/// Diff two snapshots without touching a database.
///
/// Pure and synchronous — useful for tooling that stores snapshots itself.
pub fn diff_schemas(cfg: &AppConfig, current: &Schema, target: &Schema) -> Result<Changeset> {
    Ok(build_engine(cfg)?.diff(current, target)?)
}

/// Re-stamp identity tokens from the snapshot at `snapshot_path` onto live
/// tables matched by display name.
///
/// Recovery path for when table comments were wiped (a dump/restore cycle,
/// an over-eager DBA): without its token a table would be treated as dropped
/// and recreated on the next comparison. Returns the identity-persistence
/// statements as an ordinary changeset; nothing is executed. Tables that
/// were also renamed cannot be matched by name and are left alone.
pub async fn repair(cfg: &AppConfig, snapshot_path: &Path) -> Result<Changeset> {
    let target = SnapshotService::load(snapshot_path)?;
    let repository = Arc::new(connect(&cfg.db).await?);
    let live = repository.identities(&SchemaName(cfg.db.schema.clone())).await?;
    Ok(build_engine(cfg)?.repair(&live, &target))
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Connect and introspect the live schema, identity backfill included.
async fn capture(cfg: &AppConfig) -> Result<Schema> {
    let repository = Arc::new(connect(&cfg.db).await?);
    let service = SnapshotService::new(repository, SchemaName(cfg.db.schema.clone()));
    service.capture_live().await
}

fn build_engine(cfg: &AppConfig) -> Result<DiffEngine> {
    let collation = Collation::from_options(&cfg.diff)?;
    Ok(DiffEngine::new(
        renderer_for(&cfg.db.driver),
        SchemaName(cfg.db.schema.clone()),
        cfg.diff.allow_destructive,
        collation,
    ))
}
