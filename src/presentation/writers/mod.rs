use crate::domain::{changeset::Changeset, ports::OutputWriter};
use anyhow::Result;
use std::fs;

use self::{json::JsonWriter, sql::SqlWriter};

pub mod json;
pub mod sql;

/// Register available writers - OCP: add new ones without touching main.rs
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(SqlWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "sql" => Some(Box::new(SqlWriter)),
        _ => None,
    }
}

/// Writes the changeset to disk via the chosen writer
pub fn write_to_file(writer: &dyn OutputWriter, changeset: &Changeset, dir: &str) -> Result<()> {
    // Ensure the output directory exists
    fs::create_dir_all(dir)?;

    let content = writer.format(changeset)?;
    let path = format!("{}/{}.{}", dir, changeset.changeset_id, writer.extension());
    fs::write(&path, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::changeset::{Statement, StatementKind};

    #[test]
    fn writer_for_known_and_unknown_formats() {
        assert!(writer_for("sql").is_some());
        assert!(writer_for("json").is_some());
        assert!(writer_for("html").is_none());
    }

    #[test]
    fn write_to_file_names_file_after_changeset_id() {
        let dir = tempfile::tempdir().unwrap();
        let cs = Changeset::new(
            "public",
            "postgres",
            vec![Statement::new(
                "ALTER TABLE t ADD COLUMN x text",
                StatementKind::AddColumn,
            )],
        );

        write_to_file(&SqlWriter, &cs, dir.path().to_str().unwrap()).unwrap();

        let expected = dir.path().join(format!("{}.sql", cs.changeset_id));
        assert!(expected.exists());
    }
}
