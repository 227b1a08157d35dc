//! Typed failures of the diff core.
//!
//! Structural ambiguities (blocked destructive changes) fail loudly and
//! early; cosmetic catalog irregularities degrade with a `tracing::warn!`
//! and never surface here. Everything infrastructure-flavoured (connection
//! failures, query errors) stays in `anyhow` at the boundary.

use std::path::PathBuf;

/// Errors that abort a diff or snapshot run.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A table exists live but is absent from the target snapshot while
    /// destructive changes are disallowed. Hard stop — no partial changeset.
    #[error("table '{table}' has been removed but DROP is not allowed")]
    TableDropBlocked {
        /// Current name of the offending table.
        table: String,
    },

    /// A column exists live but is absent from the target table while
    /// destructive changes are disallowed. Same policy as table drops.
    #[error("column '{table}.{column}' has been removed but DROP is not allowed")]
    ColumnDropBlocked {
        table: String,
        column: String,
    },

    /// The target snapshot document does not exist.
    #[error("snapshot file does not exist: {}", path.display())]
    SnapshotMissing { path: PathBuf },

    /// An invalid charset/collation specifier was supplied. Caught at
    /// configuration time, before any comparison runs.
    #[error("invalid collation specifier: '{0}'")]
    InvalidCollation(String),

    /// The self-healing identity write failed. Fatal: without a persisted
    /// identity, downstream rename detection would silently misbehave.
    #[error("failed to persist identity token on table '{table}'")]
    IdentityPersistence {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}
