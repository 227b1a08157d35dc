use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use crate::domain::changeset::{Changeset, Statement, StatementKind};
use crate::domain::error::DiffError;
use crate::domain::fingerprint::fingerprint;
use crate::domain::schema::{Schema, Table};
use crate::domain::value_objects::{SchemaName, TableId};
use crate::infrastructure::config::Collation;
use crate::infrastructure::db::dialect::SqlRenderer;

// ─────────────────────────────────────────────────────────────────────────────
// Diff Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the ordered change-set that transforms `current` into `target`.
///
/// Tables are matched by identity token, never by name; columns are matched
/// by name first and by structural fingerprint second (rename detection).
/// The engine only renders through the [`SqlRenderer`] capability set — it
/// never knows which backend it is talking to.
///
/// The engine owns the changeset it produces and executes nothing itself.
pub struct DiffEngine {
    renderer: Arc<dyn SqlRenderer>,
    schema: SchemaName,
    allow_destructive: bool,
    collation: Option<Collation>,
}

/// Per-invocation state, discarded with the run.
struct DiffRun {
    statements: Vec<Statement>,
    /// Tables whose CREATE TABLE established the primary key inline
    /// (auto-increment column); the explicit primary-key index creation is
    /// suppressed for them to avoid adding the key twice.
    inline_pk_tables: BTreeSet<String>,
}

impl DiffRun {
    fn push(&mut self, sql: impl Into<String>, kind: StatementKind) {
        self.statements.push(Statement::new(sql, kind));
    }

    fn push_destructive(&mut self, sql: impl Into<String>, kind: StatementKind) {
        self.statements.push(Statement::destructive(sql, kind));
    }
}

impl DiffEngine {
    pub fn new(
        renderer: Arc<dyn SqlRenderer>,
        schema: SchemaName,
        allow_destructive: bool,
        collation: Option<Collation>,
    ) -> Self {
        Self {
            renderer,
            schema,
            allow_destructive,
            collation,
        }
    }

    /// Compare two snapshots and produce the change-set, or fail without a
    /// partial result when a blocked destructive change is encountered.
    pub fn diff(&self, current: &Schema, target: &Schema) -> Result<Changeset, DiffError> {
        let mut run = DiffRun {
            statements: Vec::new(),
            inline_pk_tables: BTreeSet::new(),
        };

        // Tables removed from the target version.
        for (id, old_table) in &current.tables {
            if target.tables.contains_key(id) {
                continue;
            }
            if !self.allow_destructive {
                return Err(DiffError::TableDropBlocked {
                    table: old_table.name.clone(),
                });
            }
            warn!(table = %old_table.name, "dropping table absent from target");
            run.push_destructive(
                self.renderer.render_drop_table(&old_table.name),
                StatementKind::DropTable,
            );
        }

        let empty = BTreeMap::new();
        for (id, new_table) in &target.tables {
            let mut changed = false;
            let mut old_indexes: Option<&BTreeMap<String, String>> = None;
            let mut old_foreign_keys: &BTreeMap<String, String> = &empty;

            match current.tables.get(id) {
                Some(old_table) => {
                    // Same identity, new display name.
                    if new_table.name != old_table.name {
                        run.push(
                            self.renderer
                                .render_rename_table(&old_table.name, &new_table.name),
                            StatementKind::RenameTable,
                        );
                        changed = true;
                    }

                    changed |= self.diff_columns(old_table, new_table, &mut run)?;
                    old_indexes = Some(&old_table.indexes);
                    old_foreign_keys = &old_table.foreign_keys;

                    // Index or foreign-key differences alone also count.
                    if !changed {
                        changed = new_table.indexes != old_table.indexes
                            || new_table.foreign_keys != old_table.foreign_keys;
                    }
                }
                None => {
                    self.create_table(id, new_table, &mut run);
                    changed = true;
                }
            }

            // Any change to the table rebuilds its constraint surface, in a
            // fixed order: index changes may require that no foreign key
            // references the about-to-be-dropped index, and new foreign keys
            // may depend on newly created indexes.
            if changed {
                for name in old_foreign_keys.keys() {
                    run.push(
                        self.renderer.render_drop_foreign_key(&new_table.name, name),
                        StatementKind::DropForeignKey,
                    );
                }
                self.diff_indexes(&new_table.name, old_indexes, &new_table.indexes, &mut run);
                for def in new_table.foreign_keys.values() {
                    run.push(def.clone(), StatementKind::AddForeignKey);
                }
            }
        }

        // Stored routines: plain textual equality, no rename detection.
        for (name, definition) in &target.functions {
            if current.functions.get(name) != Some(definition) {
                for sql in self
                    .renderer
                    .render_replace_routine(&self.schema, name, definition)
                {
                    run.push(sql, StatementKind::ReplaceRoutine);
                }
            }
        }

        Ok(Changeset::new(
            &self.schema.0,
            self.renderer.name(),
            run.statements,
        ))
    }

    /// Re-stamp identity tokens from the target snapshot onto live tables
    /// matched by display name — the recovery path when table comments were
    /// wiped. Produces identity-persistence statements only, left to the
    /// external executor like any other changeset. A table that was both
    /// renamed and stripped of its token cannot be matched this way.
    pub fn repair(
        &self,
        live_identities: &BTreeMap<String, Option<String>>,
        target: &Schema,
    ) -> Changeset {
        let mut statements = Vec::new();
        for (id, table) in &target.tables {
            let Some(current) = live_identities.get(&table.name) else {
                continue;
            };
            if current.as_deref() == Some(id.as_str()) {
                continue;
            }
            statements.push(Statement::new(
                self.renderer
                    .render_set_identity(&self.schema, &table.name, id.as_str()),
                StatementKind::SetIdentity,
            ));
        }
        Changeset::new(&self.schema.0, self.renderer.name(), statements)
    }

    fn create_table(&self, id: &TableId, table: &Table, run: &mut DiffRun) {
        let sql = self
            .renderer
            .render_create_table(table, self.collation.as_ref());
        if sql.inline_primary_key {
            run.inline_pk_tables.insert(table.name.clone());
        }
        for statement in sql.statements {
            run.push(statement, StatementKind::CreateTable);
        }
        run.push(
            self.renderer
                .render_set_identity(&self.schema, &table.name, id.as_str()),
            StatementKind::SetIdentity,
        );
    }

    /// Column-level reconciliation with rename detection. Returns whether
    /// anything about the table's columns changed.
    fn diff_columns(
        &self,
        old_table: &Table,
        new_table: &Table,
        run: &mut DiffRun,
    ) -> Result<bool, DiffError> {
        let table_name = &new_table.name;
        let mut old_columns = old_table.columns.clone();
        let mut changed = false;

        for (name, column) in &new_table.columns {
            let fp = fingerprint(column);

            match old_columns.get(name) {
                Some(old_column) if fingerprint(old_column) == fp => continue,
                Some(_) => {
                    // Same name, different structure.
                    for sql in self.renderer.render_modify_column(table_name, name, column) {
                        run.push(sql, StatementKind::ModifyColumn);
                    }
                    changed = true;
                }
                None => {
                    changed = true;

                    // Rename candidate: an unmatched old column (one whose
                    // name is not also a target column) with an identical
                    // fingerprint. First match in map order wins — accepted
                    // nondeterminism for duplicate-structure degenerate cases.
                    let candidate = old_columns
                        .iter()
                        .filter(|(old_name, _)| !new_table.columns.contains_key(*old_name))
                        .find(|(_, old_column)| fingerprint(old_column) == fp)
                        .map(|(old_name, _)| old_name.clone());

                    match candidate {
                        Some(old_name) => {
                            for sql in self
                                .renderer
                                .render_rename_column(table_name, &old_name, name, column)
                            {
                                run.push(sql, StatementKind::RenameColumn);
                            }
                            // Claim the old column so it cannot be matched
                            // again, and account for it under its new name in
                            // the drop sweep below.
                            old_columns.remove(&old_name);
                            old_columns.insert(name.clone(), column.clone());
                        }
                        None => {
                            for sql in self.renderer.render_add_column(table_name, name, column)
                            {
                                run.push(sql, StatementKind::AddColumn);
                            }
                        }
                    }
                }
            }
        }

        // Columns removed from the target version: same explicit allowance as
        // table drops.
        for name in old_columns.keys() {
            if new_table.columns.contains_key(name) {
                continue;
            }
            if !self.allow_destructive {
                return Err(DiffError::ColumnDropBlocked {
                    table: table_name.clone(),
                    column: name.clone(),
                });
            }
            warn!(table = %table_name, column = %name, "dropping column absent from target");
            run.push_destructive(
                self.renderer.render_drop_column(table_name, name),
                StatementKind::DropColumn,
            );
            changed = true;
        }

        Ok(changed)
    }

    /// Index reconciliation. `old_indexes` is `None` for brand-new tables.
    fn diff_indexes(
        &self,
        table: &str,
        old_indexes: Option<&BTreeMap<String, String>>,
        new_indexes: &BTreeMap<String, String>,
        run: &mut DiffRun,
    ) {
        for (name, definition) in new_indexes {
            if let Some(old_definition) = old_indexes.and_then(|m| m.get(name)) {
                // Identical definition — nothing to do.
                if old_definition == definition {
                    continue;
                }
                for sql in self.renderer.render_drop_index(table, name) {
                    run.push(sql, StatementKind::DropIndex);
                }
            }

            // The column definition already established this primary key.
            if self.renderer.primary_index_name() == Some(name.as_str())
                && run.inline_pk_tables.contains(table)
            {
                continue;
            }

            run.push(definition.clone(), StatementKind::CreateIndex);
        }

        // Indexes carry no data — stale ones are always safe to drop.
        if let Some(old_indexes) = old_indexes {
            for name in old_indexes.keys() {
                if !new_indexes.contains_key(name) {
                    for sql in self.renderer.render_drop_index(table, name) {
                        run.push(sql, StatementKind::DropIndex);
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
