use anyhow::Result;

use crate::domain::{changeset::Changeset, ports::OutputWriter};

/// Serializes the changeset verbatim — statements, kinds, destructive flags
/// and summary — for downstream tooling.
pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, changeset: &Changeset) -> Result<String> {
        Ok(serde_json::to_string_pretty(changeset)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::changeset::{Statement, StatementKind};
    use serde_json::Value;

    #[test]
    fn json_output_exposes_statements_and_summary() {
        let cs = Changeset::new(
            "public",
            "postgres",
            vec![
                Statement::new(
                    "ALTER TABLE users RENAME COLUMN email TO email_address",
                    StatementKind::RenameColumn,
                ),
                Statement::destructive("DROP TABLE legacy", StatementKind::DropTable),
            ],
        );

        let parsed: Value = serde_json::from_str(&JsonWriter.format(&cs).unwrap()).unwrap();

        assert_eq!(parsed["driver"], "postgres");
        assert_eq!(parsed["statements"][0]["kind"], "rename_column");
        assert_eq!(parsed["statements"][1]["destructive"], true);
        assert_eq!(parsed["summary"]["total_statements"], 2);
        assert_eq!(parsed["summary"]["destructive_statements"], 1);
    }
}
