use std::fmt::Write as FmtWrite;

use anyhow::Result;

use crate::domain::{changeset::Changeset, ports::OutputWriter};

/// Renders the changeset as an executable SQL script.
///
/// The statements are already fully rendered and ordered by the diff engine;
/// this writer only adds the header, the transaction wrapper and a marker
/// comment in front of each destructive statement.
pub struct SqlWriter;

impl OutputWriter for SqlWriter {
    fn format(&self, changeset: &Changeset) -> Result<String> {
        let mut sql = String::new();

        writeln!(sql, "-- Changeset: {}", changeset.changeset_id)?;
        writeln!(sql, "-- Schema: {}", changeset.schema)?;
        writeln!(sql, "-- Driver: {}", changeset.driver)?;
        writeln!(sql, "-- Generated: {}", changeset.created_at)?;
        writeln!(
            sql,
            "-- Summary: {} statement(s), {} destructive",
            changeset.summary.total_statements, changeset.summary.destructive_statements
        )?;
        writeln!(sql)?;
        writeln!(sql, "BEGIN;")?;
        writeln!(sql)?;

        for statement in &changeset.statements {
            if statement.destructive {
                writeln!(sql, "-- destructive")?;
            }
            writeln!(sql, "{};", statement.sql)?;
            writeln!(sql)?;
        }

        writeln!(sql, "COMMIT;")?;
        Ok(sql)
    }

    fn extension(&self) -> &'static str {
        "sql"
    }
}
