use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// What a statement does, for reporting. The SQL itself is already rendered
/// and backend-specific; the kind never influences execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    RenameTable,
    DropTable,
    AddColumn,
    ModifyColumn,
    RenameColumn,
    DropColumn,
    CreateIndex,
    DropIndex,
    AddForeignKey,
    DropForeignKey,
    ReplaceRoutine,
    SetIdentity,
}

/// One opaque, fully rendered, backend-specific executable unit.
///
/// Statements must be applied in emission order on a single connection;
/// `destructive` tags operations that discard existing structure or data
/// (table/column drops) so executors and reviewers can single them out.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
    pub destructive: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, kind: StatementKind) -> Self {
        Statement {
            sql: sql.into(),
            kind,
            destructive: false,
        }
    }

    pub fn destructive(sql: impl Into<String>, kind: StatementKind) -> Self {
        Statement {
            sql: sql.into(),
            kind,
            destructive: true,
        }
    }
}

/// The ordered output of one diff run.
///
/// Ordering is a hard invariant: foreign keys are dropped before dependent
/// indexes are rebuilt, and re-added only after. The changeset is handed to
/// an external executor — ideally wrapped in one transaction — and is never
/// executed by this crate itself.
#[derive(Debug, Clone, Serialize)]
pub struct Changeset {
    pub changeset_id: String,
    /// Database driver the statements were rendered for: "postgres", "mysql".
    pub driver: String,
    pub schema: String,
    pub created_at: String,
    pub statements: Vec<Statement>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub tables_created: usize,
    pub tables_renamed: usize,
    pub tables_dropped: usize,
    pub columns_added: usize,
    pub columns_modified: usize,
    pub columns_renamed: usize,
    pub columns_dropped: usize,
    pub index_changes: usize,
    pub foreign_key_changes: usize,
    pub routines_replaced: usize,
    pub destructive_statements: usize,
    pub total_statements: usize,
}

impl Changeset {
    pub fn new(schema: &str, driver: &str, statements: Vec<Statement>) -> Self {
        let count = |kind: StatementKind| statements.iter().filter(|s| s.kind == kind).count();

        let summary = Summary {
            tables_created: count(StatementKind::CreateTable),
            tables_renamed: count(StatementKind::RenameTable),
            tables_dropped: count(StatementKind::DropTable),
            columns_added: count(StatementKind::AddColumn),
            columns_modified: count(StatementKind::ModifyColumn),
            columns_renamed: count(StatementKind::RenameColumn),
            columns_dropped: count(StatementKind::DropColumn),
            index_changes: count(StatementKind::CreateIndex) + count(StatementKind::DropIndex),
            foreign_key_changes: count(StatementKind::AddForeignKey)
                + count(StatementKind::DropForeignKey),
            routines_replaced: count(StatementKind::ReplaceRoutine),
            destructive_statements: statements.iter().filter(|s| s.destructive).count(),
            total_statements: statements.len(),
        };

        Changeset {
            changeset_id: format!(
                "cs_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            driver: driver.to_string(),
            schema: schema.to_string(),
            created_at: Utc::now().to_rfc3339(),
            statements,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
