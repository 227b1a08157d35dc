use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::any::AnyRow;
use sqlx::{Column as _, Row, TypeInfo};
use tracing::warn;

use crate::domain::schema::{Column, Table};
use crate::domain::value_objects::SchemaName;
use crate::infrastructure::config::Collation;

// ─────────────────────────────────────────────────────────────────────────────
// Rendering types
// ─────────────────────────────────────────────────────────────────────────────

/// A rendered column definition fragment plus anything that must run first.
pub struct RenderedColumn {
    pub def: String,
    /// Statements that must execute before the definition is usable
    /// (e.g. `CREATE SEQUENCE` for a `nextval(…)` default).
    pub prelude: Vec<String>,
    /// True when the fragment establishes the table's primary key inline
    /// (`PRIMARY KEY AUTO_INCREMENT`); the explicit primary-key index
    /// creation must then be suppressed for this table.
    pub inline_primary_key: bool,
}

/// The full statement sequence for one CREATE TABLE.
pub struct CreateTableSql {
    pub statements: Vec<String>,
    pub inline_primary_key: bool,
}

/// A DEFAULT clause plus its side-effect prelude.
pub struct RenderedDefault {
    /// `"DEFAULT <expr>"`, or empty when the column has no default.
    pub clause: String,
    pub prelude: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: DDL statement rendering.
///
/// Implemented per backend family. Pure string manipulation with no sqlx
/// dependency — the diff engine depends on this trait alone and never on a
/// concrete backend.
pub trait SqlRenderer: Send + Sync {
    /// Driver name as a lowercase string ("postgres", "mysql"). Used for
    /// output metadata only, never for branching logic.
    fn name(&self) -> &'static str;

    /// The index name under which the backend reports the primary key, when
    /// it has a universal one (`PRIMARY` on MySQL). Backends that name
    /// primary-key constraints individually return `None`, which also
    /// disables inline-primary-key suppression for them.
    fn primary_index_name(&self) -> Option<&'static str> {
        None
    }

    /// Render one column definition fragment for CREATE TABLE / ADD COLUMN.
    fn render_column(&self, name: &str, column: &Column) -> RenderedColumn;

    /// Render the DEFAULT clause, including any backend side effect that must
    /// be created before the default can be referenced.
    fn render_default(&self, default: Option<&str>) -> RenderedDefault;

    fn render_create_table(&self, table: &Table, collation: Option<&Collation>) -> CreateTableSql;
    fn render_rename_table(&self, old_name: &str, new_name: &str) -> String;
    fn render_drop_table(&self, name: &str) -> String;

    fn render_add_column(&self, table: &str, name: &str, column: &Column) -> Vec<String>;
    fn render_modify_column(&self, table: &str, name: &str, column: &Column) -> Vec<String>;
    /// Rename re-asserts the full definition where the backend requires it
    /// (a rename may piggyback a type change on MySQL's `CHANGE`).
    fn render_rename_column(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
        column: &Column,
    ) -> Vec<String>;
    fn render_drop_column(&self, table: &str, name: &str) -> String;

    /// Drop an index by name; primary-key indexes use the backend's dedicated
    /// form. May expand to several statements (constraint + index on
    /// PostgreSQL).
    fn render_drop_index(&self, table: &str, name: &str) -> Vec<String>;
    fn render_drop_foreign_key(&self, table: &str, name: &str) -> String;

    /// The identity-persistence statement: attach `token` to the table as
    /// out-of-band metadata readable back via introspection. The token is
    /// embedded as an escaped literal — DDL forbids bound parameters.
    fn render_set_identity(&self, schema: &SchemaName, table: &str, token: &str) -> String;

    /// Drop-if-exists followed by the routine's (re)creation statement.
    fn render_replace_routine(
        &self,
        schema: &SchemaName,
        name: &str,
        definition: &str,
    ) -> Vec<String>;
}

/// Catalog introspection: the queries that read the live schema and the row
/// parsing that turns their results into the schema model.
///
/// Lives in infrastructure only — callers outside this module receive model
/// types, never raw `AnyRow`s.
pub trait CatalogIntrospector: Send + Sync {
    /// Query yielding `(table_name, identity_comment)` pairs. Binds: schema.
    fn table_identities_sql(&self) -> &'static str;

    /// Query yielding one row per column. Binds: schema, table.
    fn columns_sql(&self) -> &'static str;
    fn parse_column(&self, row: &AnyRow, schema: &SchemaName) -> Result<(String, Column)>;

    /// Query yielding the raw index catalog rows. Binds: schema, table.
    fn indexes_sql(&self) -> &'static str;
    /// Assemble `index name → rendered definition` from the raw rows.
    fn collect_indexes(
        &self,
        table: &str,
        schema: &SchemaName,
        rows: &[AnyRow],
    ) -> Result<BTreeMap<String, String>>;

    /// Query yielding one row per single-column foreign key, or `None` when
    /// the backend reports foreign keys through constraint-typed indexes
    /// instead. Binds: schema, table.
    fn foreign_keys_sql(&self) -> Option<&'static str> {
        None
    }
    fn parse_foreign_key(&self, _table: &str, _row: &AnyRow) -> Result<(String, String)> {
        anyhow::bail!("backend does not introspect foreign keys directly")
    }

    /// Query yielding `(routine_name, definition)` pairs, or `None` when the
    /// backend exposes no reliable routine definitions. Binds: schema.
    fn functions_sql(&self) -> Option<&'static str> {
        None
    }
    fn parse_function(&self, _row: &AnyRow) -> Result<(String, String)> {
        anyhow::bail!("backend does not introspect routines")
    }
}

/// Combined supertrait — convenience alias so callers only store one object.
pub trait Dialect: SqlRenderer + CatalogIntrospector {}
impl Dialect for MysqlDialect {}
impl Dialect for PostgresDialect {}

/// Resolve the dialect from a driver name string.
pub fn from_driver(driver: &str) -> Box<dyn Dialect> {
    match driver {
        "mysql" => Box::new(MysqlDialect),
        _ => Box::new(PostgresDialect),
    }
}

/// Rendering-only handle for the pure diff path, which never touches sqlx.
pub fn renderer_for(driver: &str) -> Arc<dyn SqlRenderer> {
    match driver {
        "mysql" => Arc::new(MysqlDialect),
        _ => Arc::new(PostgresDialect),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect;

impl MysqlDialect {
    /// `type [NOT NULL] [DEFAULT …] [extra]` — the tail shared by MODIFY and
    /// CHANGE statements.
    fn column_tail(&self, column: &Column) -> String {
        let mut tail = column.data_type.clone();
        if !column.nullable {
            tail.push_str(" NOT NULL");
        }
        let default = self.render_default(column.default.as_deref());
        if !default.clause.is_empty() {
            tail.push(' ');
            tail.push_str(&default.clause);
        }
        if let Some(extra) = column.extra.as_deref().filter(|e| !e.is_empty()) {
            tail.push(' ');
            tail.push_str(extra);
        }
        tail
    }
}

impl SqlRenderer for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn primary_index_name(&self) -> Option<&'static str> {
        Some("PRIMARY")
    }

    fn render_column(&self, name: &str, column: &Column) -> RenderedColumn {
        let null = if column.nullable { "" } else { " NOT NULL" };

        // An auto-incrementing primary key is declared inline; emitting the
        // explicit PRIMARY index afterwards would add the key twice.
        if column.is_auto_increment_pk() {
            return RenderedColumn {
                def: format!(
                    "{} {}{} PRIMARY KEY AUTO_INCREMENT",
                    name, column.data_type, null
                ),
                prelude: vec![],
                inline_primary_key: true,
            };
        }

        let default = self.render_default(column.default.as_deref());
        let mut def = format!("{} {}{}", name, column.data_type, null);
        if !default.clause.is_empty() {
            def.push(' ');
            def.push_str(&default.clause);
        }
        RenderedColumn {
            def,
            prelude: default.prelude,
            inline_primary_key: false,
        }
    }

    fn render_default(&self, default: Option<&str>) -> RenderedDefault {
        RenderedDefault {
            clause: default.map(|d| format!("DEFAULT {}", d)).unwrap_or_default(),
            prelude: vec![],
        }
    }

    fn render_create_table(&self, table: &Table, collation: Option<&Collation>) -> CreateTableSql {
        let mut defs = Vec::with_capacity(table.columns.len());
        let mut inline_primary_key = false;
        for (name, column) in &table.columns {
            let rendered = self.render_column(name, column);
            inline_primary_key |= rendered.inline_primary_key;
            defs.push(rendered.def);
        }

        let mut query = format!("CREATE TABLE {} ({})", table.name, defs.join(", "));
        if let Some(c) = collation {
            query.push_str(&format!(
                " CHARACTER SET {} COLLATE {}",
                c.charset, c.collation
            ));
        }

        CreateTableSql {
            statements: vec![query],
            inline_primary_key,
        }
    }

    fn render_rename_table(&self, old_name: &str, new_name: &str) -> String {
        format!("ALTER TABLE {} RENAME {}", old_name, new_name)
    }

    fn render_drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", name)
    }

    fn render_add_column(&self, table: &str, name: &str, column: &Column) -> Vec<String> {
        let rendered = self.render_column(name, column);
        let mut statements = rendered.prelude;
        statements.push(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table, rendered.def
        ));
        statements
    }

    fn render_modify_column(&self, table: &str, name: &str, column: &Column) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} MODIFY {} {}",
            table,
            name,
            self.column_tail(column)
        )]
    }

    fn render_rename_column(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
        column: &Column,
    ) -> Vec<String> {
        // CHANGE re-asserts the full definition, so a rename may piggyback a
        // type change.
        vec![format!(
            "ALTER TABLE {} CHANGE {} {} {}",
            table,
            old_name,
            new_name,
            self.column_tail(column)
        )]
    }

    fn render_drop_column(&self, table: &str, name: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", table, name)
    }

    fn render_drop_index(&self, table: &str, name: &str) -> Vec<String> {
        if name == "PRIMARY" {
            vec![format!("ALTER TABLE {} DROP PRIMARY KEY", table)]
        } else {
            vec![format!("DROP INDEX {} ON {}", name, table)]
        }
    }

    fn render_drop_foreign_key(&self, table: &str, name: &str) -> String {
        format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, name)
    }

    fn render_set_identity(&self, _schema: &SchemaName, table: &str, token: &str) -> String {
        format!("ALTER TABLE {} COMMENT '{}'", table, escape_literal(token))
    }

    fn render_replace_routine(
        &self,
        _schema: &SchemaName,
        name: &str,
        definition: &str,
    ) -> Vec<String> {
        vec![
            format!("DROP FUNCTION IF EXISTS {}", name),
            definition.to_string(),
        ]
    }
}

impl CatalogIntrospector for MysqlDialect {
    fn table_identities_sql(&self) -> &'static str {
        "SELECT table_name, table_comment \
         FROM information_schema.tables \
         WHERE table_schema = ? \
         ORDER BY table_comment"
    }

    fn columns_sql(&self) -> &'static str {
        "SELECT column_name, column_type, is_nullable, column_default, column_key, extra \
         FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ?"
    }

    fn parse_column(&self, row: &AnyRow, _schema: &SchemaName) -> Result<(String, Column)> {
        let name = blob_or_string(row, 0)?;
        let data_type = blob_or_string(row, 1)?;
        let nullable = blob_or_string(row, 2)? == "YES";
        let default = opt_blob_or_string(row, 3)?;
        let key = opt_blob_or_string(row, 4)?.filter(|k| !k.is_empty());
        let extra = opt_blob_or_string(row, 5)?.filter(|e| !e.is_empty());

        // A nullable column with no declared default effectively defaults to
        // NULL; recording it that way keeps fingerprints stable across dumps.
        let default = match (nullable, default) {
            (true, None) => Some("NULL".to_string()),
            (_, d) => d,
        };

        Ok((
            name,
            Column {
                data_type,
                nullable,
                default,
                max_len: None,
                key,
                extra,
            },
        ))
    }

    fn indexes_sql(&self) -> &'static str {
        "SELECT index_name, column_name, non_unique, seq_in_index \
         FROM information_schema.statistics \
         WHERE table_schema = ? AND table_name = ? \
         ORDER BY index_name, seq_in_index"
    }

    fn collect_indexes(
        &self,
        table: &str,
        _schema: &SchemaName,
        rows: &[AnyRow],
    ) -> Result<BTreeMap<String, String>> {
        // Group catalog rows per index, columns ordered by seq_in_index.
        let mut grouped: BTreeMap<String, (bool, BTreeMap<i64, String>)> = BTreeMap::new();
        for row in rows {
            let index_name = blob_or_string(row, 0)?;
            let column_name = blob_or_string(row, 1)?;
            let non_unique = any_i64(row, 2)? != 0;
            let seq = any_i64(row, 3)?;
            grouped
                .entry(index_name)
                .or_insert_with(|| (non_unique, BTreeMap::new()))
                .1
                .insert(seq, column_name);
        }

        let mut indexes = BTreeMap::new();
        for (name, (non_unique, columns)) in grouped {
            let cols = columns.into_values().collect::<Vec<_>>().join(", ");
            let def = if name == "PRIMARY" {
                format!("ALTER TABLE {} ADD PRIMARY KEY ({})", table, cols)
            } else if !non_unique {
                format!("ALTER TABLE {} ADD UNIQUE INDEX {} ({})", table, name, cols)
            } else {
                format!("ALTER TABLE {} ADD INDEX {} ({})", table, name, cols)
            };
            indexes.insert(name, def);
        }
        Ok(indexes)
    }

    // Single-column foreign keys only.
    fn foreign_keys_sql(&self) -> Option<&'static str> {
        Some(
            "SELECT \
                referential_constraints.constraint_name, \
                key_column_usage.column_name, \
                key_column_usage.referenced_table_name, \
                key_column_usage.referenced_column_name, \
                referential_constraints.delete_rule, \
                referential_constraints.update_rule \
             FROM information_schema.referential_constraints \
             LEFT JOIN information_schema.key_column_usage \
                USING (constraint_schema, constraint_name) \
             WHERE referential_constraints.constraint_schema = ? \
             AND key_column_usage.table_name = ? \
             AND key_column_usage.referenced_table_schema = key_column_usage.constraint_schema \
             GROUP BY referential_constraints.constraint_name \
             ORDER BY constraint_name",
        )
    }

    fn parse_foreign_key(&self, table: &str, row: &AnyRow) -> Result<(String, String)> {
        let name = blob_or_string(row, 0)?;
        let column = blob_or_string(row, 1)?;
        let referenced_table = blob_or_string(row, 2)?;
        let referenced_column = blob_or_string(row, 3)?;
        let delete_rule = blob_or_string(row, 4)?;
        let update_rule = blob_or_string(row, 5)?;

        let def = format!(
            "ALTER TABLE {} ADD FOREIGN KEY {} ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            table, name, column, referenced_table, referenced_column, delete_rule, update_rule
        );
        Ok((name, def))
    }

    // information_schema.routines returns unreliable definitions on MySQL;
    // routine reconciliation is effectively a no-op for this backend.
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl SqlRenderer for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn render_column(&self, name: &str, column: &Column) -> RenderedColumn {
        let max_len = column
            .max_len
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();
        let null = if column.nullable { "" } else { " NOT NULL" };
        let default = self.render_default(column.default.as_deref());

        let mut def = format!("{} {}{}{}", name, column.data_type, max_len, null);
        if !default.clause.is_empty() {
            def.push(' ');
            def.push_str(&default.clause);
        }
        RenderedColumn {
            def,
            prelude: default.prelude,
            inline_primary_key: false,
        }
    }

    fn render_default(&self, default: Option<&str>) -> RenderedDefault {
        let Some(default) = default else {
            return RenderedDefault {
                clause: String::new(),
                prelude: vec![],
            };
        };

        // Sequence-backed defaults: the sequence object must exist before it
        // can be referenced by the column.
        let prelude = match sequence_from_default(default) {
            Some(seq) => vec![format!("CREATE SEQUENCE IF NOT EXISTS {}", seq)],
            None => vec![],
        };
        RenderedDefault {
            clause: format!("DEFAULT {}", default),
            prelude,
        }
    }

    fn render_create_table(&self, table: &Table, _collation: Option<&Collation>) -> CreateTableSql {
        let mut statements = Vec::new();
        let mut defs = Vec::with_capacity(table.columns.len());
        for (name, column) in &table.columns {
            let rendered = self.render_column(name, column);
            statements.extend(rendered.prelude);
            defs.push(rendered.def);
        }
        statements.push(format!("CREATE TABLE {} ({})", table.name, defs.join(", ")));

        CreateTableSql {
            statements,
            inline_primary_key: false,
        }
    }

    fn render_rename_table(&self, old_name: &str, new_name: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", old_name, new_name)
    }

    fn render_drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", name)
    }

    fn render_add_column(&self, table: &str, name: &str, column: &Column) -> Vec<String> {
        let rendered = self.render_column(name, column);
        let mut statements = rendered.prelude;
        statements.push(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table, rendered.def
        ));
        statements
    }

    fn render_modify_column(&self, table: &str, name: &str, column: &Column) -> Vec<String> {
        let max_len = column
            .max_len
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();
        let default = self.render_default(column.default.as_deref());

        let mut statements = default.prelude;
        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}{}",
            table, name, column.data_type, max_len
        ));
        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            table,
            name,
            if column.nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            }
        ));
        if default.clause.is_empty() {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                table, name
            ));
        } else {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET {}",
                table, name, default.clause
            ));
        }
        statements
    }

    fn render_rename_column(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
        _column: &Column,
    ) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            table, old_name, new_name
        )]
    }

    fn render_drop_column(&self, table: &str, name: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", table, name)
    }

    fn render_drop_index(&self, table: &str, name: &str) -> Vec<String> {
        // Constraint-typed indexes drop via the constraint; plain indexes via
        // DROP INDEX. Both are issued, each guarded by IF EXISTS.
        vec![
            format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}", table, name),
            format!("DROP INDEX IF EXISTS {}", name),
        ]
    }

    fn render_drop_foreign_key(&self, table: &str, name: &str) -> String {
        format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}", table, name)
    }

    fn render_set_identity(&self, schema: &SchemaName, table: &str, token: &str) -> String {
        format!(
            "COMMENT ON TABLE {}.{} IS '{}'",
            schema.0,
            table,
            escape_literal(token)
        )
    }

    fn render_replace_routine(
        &self,
        schema: &SchemaName,
        name: &str,
        definition: &str,
    ) -> Vec<String> {
        // Routine definitions are stored unqualified; qualify both the name
        // and the definition for the configured schema.
        let qualified = format!("{}.{}", schema.0, name);
        let definition = definition.replace("FUNCTION ", &format!("FUNCTION {}.", schema.0));
        vec![
            format!("DROP FUNCTION IF EXISTS {}", qualified),
            definition,
        ]
    }
}

impl CatalogIntrospector for PostgresDialect {
    fn table_identities_sql(&self) -> &'static str {
        "SELECT relname::TEXT, obj_description(pg_class.oid) \
         FROM pg_class \
         LEFT JOIN pg_catalog.pg_tables ON tablename = relname \
         WHERE relkind = 'r' AND schemaname = $1 \
         ORDER BY obj_description(pg_class.oid)"
    }

    fn columns_sql(&self) -> &'static str {
        "SELECT column_name::TEXT, data_type::TEXT, character_maximum_length::INT8, \
                is_nullable::TEXT, column_default::TEXT \
         FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2"
    }

    fn parse_column(&self, row: &AnyRow, schema: &SchemaName) -> Result<(String, Column)> {
        let name: String = row.try_get(0)?;
        let data_type: String = row.try_get(1)?;
        let max_len: Option<i64> = row.try_get(2)?;
        let nullable = row.try_get::<String, _>(3)? == "YES";
        let mut default: Option<String> = row.try_get(4)?;

        // Defaults come back schema-qualified; strip so that the fingerprint
        // is stable across schemas.
        if let Some(d) = default.take() {
            default = Some(d.replace(&format!("{}.", schema.0), ""));
        }

        Ok((
            name,
            Column {
                data_type,
                nullable,
                default,
                max_len,
                key: None,
                extra: None,
            },
        ))
    }

    fn indexes_sql(&self) -> &'static str {
        "SELECT relname::TEXT AS constraint_name, attname::TEXT AS column_name, \
                indexdef, contype::TEXT \
         FROM pg_class \
         LEFT JOIN pg_attribute ON attrelid = oid \
         LEFT JOIN pg_indexes ON indexname = relname \
         LEFT JOIN pg_constraint ON conname = relname \
         WHERE schemaname = $1 AND tablename = $2 \
         GROUP BY relname, attname, indexdef, contype \
         ORDER BY constraint_name"
    }

    fn collect_indexes(
        &self,
        table: &str,
        schema: &SchemaName,
        rows: &[AnyRow],
    ) -> Result<BTreeMap<String, String>> {
        let mut indexes = BTreeMap::new();

        for row in rows {
            let name: String = row.try_get(0)?;
            let indexdef: Option<String> = row.try_get(2)?;
            let contype: Option<String> = row.try_get(3)?;
            let Some(indexdef) = indexdef else { continue };

            if let Some(def) =
                postgres_index_definition(table, schema, &name, &indexdef, contype.as_deref())
            {
                indexes.insert(name, def);
            }
        }
        Ok(indexes)
    }

    // Foreign keys surface through constraint-typed indexes (contype 'f');
    // introspecting them separately would emit each constraint twice.
    //
    // (postgres_index_definition below does the per-row mapping.)

    fn functions_sql(&self) -> Option<&'static str> {
        Some(
            "SELECT p.proname::TEXT AS name, pg_get_functiondef(p.oid) AS def \
             FROM pg_catalog.pg_proc p \
             JOIN pg_catalog.pg_roles u ON u.oid = p.proowner \
             LEFT JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
             WHERE pg_catalog.pg_function_is_visible(p.oid) \
             AND n.nspname = $1 AND u.rolname = current_user",
        )
    }

    fn parse_function(&self, row: &AnyRow) -> Result<(String, String)> {
        let name: String = row.try_get(0)?;
        let def: String = row.try_get(1)?;
        Ok((name, strip_function_qualifier(&def)))
    }
}

/// Map one pg_class/pg_constraint catalog row to its rendered definition.
///
/// Returns `None` for internal indexes (leading underscore) and unsupported
/// constraint types. Constraint-typed rows (`contype` f/p/u) render as
/// `ADD CONSTRAINT`; plain indexes keep their `indexdef` with the schema
/// qualifier stripped.
fn postgres_index_definition(
    table: &str,
    schema: &SchemaName,
    name: &str,
    indexdef: &str,
    contype: Option<&str>,
) -> Option<String> {
    // Internal indexes are marked with a leading underscore.
    if name.starts_with('_') {
        return None;
    }

    // The contype is sometimes wrong — require the UNIQUE keyword in the
    // index definition before treating it as a constraint.
    match contype {
        Some(ct) if indexdef.contains("UNIQUE") => {
            let kind = match ct {
                "f" => "FOREIGN KEY",
                "p" => "PRIMARY KEY",
                "u" => "UNIQUE",
                other => {
                    warn!(constraint = %name, contype = %other, "constraint type not supported, skipping");
                    return None;
                }
            };
            // The constraint's column list is the tail of indexdef.
            let cols = indexdef
                .rfind('(')
                .map(|pos| &indexdef[pos..])
                .unwrap_or("");
            Some(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {} {}",
                table, name, kind, cols
            ))
        }
        _ => Some(indexdef.replace(&format!("{}.", schema.0), "")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Escape a string for embedding as a single-quoted SQL literal.
pub(crate) fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Extract the sequence name from a `nextval('seq'::regclass)` default.
fn sequence_from_default(default: &str) -> Option<String> {
    let pos = default.find("nextval")?;
    // Skip past "nextval('".
    let rest = default.get(pos + 9..)?;
    let end = rest.find('\'')?;
    Some(rest[..end].trim_matches('"').to_string())
}

/// Normalize `FUNCTION schema.name` to `FUNCTION name` in a routine
/// definition, so definitions compare equal across schemas.
fn strip_function_qualifier(def: &str) -> String {
    const MARKER: &str = "FUNCTION ";
    let mut out = String::with_capacity(def.len());
    let mut rest = def;

    while let Some(pos) = rest.find(MARKER) {
        let after = &rest[pos + MARKER.len()..];
        out.push_str(&rest[..pos + MARKER.len()]);

        // A qualifier is a dot-terminated token with no whitespace.
        let qualifier_len = after
            .find('.')
            .filter(|&dot| !after[..dot].contains(char::is_whitespace) && dot > 0)
            .map(|dot| dot + 1)
            .unwrap_or(0);

        rest = &after[qualifier_len..];
    }
    out.push_str(rest);
    out
}

/// Read a column from an AnyRow as String, handling MySQL's habit of
/// returning information_schema string columns as BLOB to sqlx AnyRow.
pub(crate) fn blob_or_string(row: &AnyRow, idx: usize) -> Result<String> {
    opt_blob_or_string(row, idx)?
        .with_context(|| format!("unexpected NULL in catalog column {}", idx))
}

pub(crate) fn opt_blob_or_string(row: &AnyRow, idx: usize) -> Result<Option<String>> {
    let type_name = row.column(idx).type_info().name();
    if type_name == "BLOB" {
        let bytes: Option<Vec<u8>> = row.try_get(idx)?;
        Ok(bytes.map(|b| String::from_utf8(b).unwrap_or_default()))
    } else {
        Ok(row.try_get(idx)?)
    }
}

/// Read an integer catalog column, whatever width (or BLOB-wrapped string)
/// the driver hands back.
pub(crate) fn any_i64(row: &AnyRow, idx: usize) -> Result<i64> {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Ok(i64::from(v));
    }
    let s = blob_or_string(row, idx)?;
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("catalog column {} is not an integer: {}", idx, s))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: &str, nullable: bool, default: Option<&str>) -> Column {
        Column {
            data_type: data_type.to_string(),
            nullable,
            default: default.map(str::to_string),
            max_len: None,
            key: None,
            extra: None,
        }
    }

    fn schema() -> SchemaName {
        SchemaName("public".into())
    }

    // ── MySQL rendering ─────────────────────────────────────────────────────

    #[test]
    fn mysql_column_with_default() {
        let col = column("varchar(255)", false, Some("'pending'"));
        let r = MysqlDialect.render_column("status", &col);
        assert_eq!(r.def, "status varchar(255) NOT NULL DEFAULT 'pending'");
        assert!(!r.inline_primary_key);
        assert!(r.prelude.is_empty());
    }

    #[test]
    fn mysql_nullable_column_without_default() {
        let col = column("text", true, None);
        let r = MysqlDialect.render_column("bio", &col);
        assert_eq!(r.def, "bio text");
    }

    #[test]
    fn mysql_auto_increment_pk_renders_inline() {
        let mut col = column("int(11)", false, None);
        col.key = Some("PRI".into());
        col.extra = Some("auto_increment".into());
        let r = MysqlDialect.render_column("id", &col);
        assert_eq!(r.def, "id int(11) NOT NULL PRIMARY KEY AUTO_INCREMENT");
        assert!(r.inline_primary_key);
    }

    #[test]
    fn mysql_create_table_reports_inline_pk() {
        let mut columns = std::collections::BTreeMap::new();
        let mut id = column("int(11)", false, None);
        id.key = Some("PRI".into());
        id.extra = Some("auto_increment".into());
        columns.insert("id".to_string(), id);
        columns.insert("email".to_string(), column("varchar(255)", false, None));

        let table = Table {
            name: "users".into(),
            columns,
            indexes: Default::default(),
            foreign_keys: Default::default(),
        };

        let sql = MysqlDialect.render_create_table(&table, None);
        assert!(sql.inline_primary_key);
        assert_eq!(sql.statements.len(), 1);
        assert_eq!(
            sql.statements[0],
            "CREATE TABLE users (email varchar(255) NOT NULL, \
             id int(11) NOT NULL PRIMARY KEY AUTO_INCREMENT)"
        );
    }

    #[test]
    fn mysql_create_table_appends_collation() {
        let mut columns = std::collections::BTreeMap::new();
        columns.insert("id".to_string(), column("int(11)", false, None));
        let table = Table {
            name: "t".into(),
            columns,
            indexes: Default::default(),
            foreign_keys: Default::default(),
        };
        let collation = Collation::parse("utf8mb4_unicode_ci", None).unwrap();
        let sql = MysqlDialect.render_create_table(&table, Some(&collation));
        assert!(sql.statements[0]
            .ends_with("CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"));
    }

    #[test]
    fn mysql_modify_and_change() {
        let mut col = column("varchar(100)", false, Some("'x'"));
        col.extra = Some("on update CURRENT_TIMESTAMP".into());
        assert_eq!(
            MysqlDialect.render_modify_column("t", "c", &col),
            vec![
                "ALTER TABLE t MODIFY c varchar(100) NOT NULL DEFAULT 'x' \
                 on update CURRENT_TIMESTAMP"
                    .to_string()
            ]
        );
        assert_eq!(
            MysqlDialect.render_rename_column("t", "old", "new", &col),
            vec![
                "ALTER TABLE t CHANGE old new varchar(100) NOT NULL DEFAULT 'x' \
                 on update CURRENT_TIMESTAMP"
                    .to_string()
            ]
        );
    }

    #[test]
    fn mysql_drop_index_primary_uses_dedicated_form() {
        assert_eq!(
            MysqlDialect.render_drop_index("users", "PRIMARY"),
            vec!["ALTER TABLE users DROP PRIMARY KEY".to_string()]
        );
        assert_eq!(
            MysqlDialect.render_drop_index("users", "idx_email"),
            vec!["DROP INDEX idx_email ON users".to_string()]
        );
    }

    #[test]
    fn mysql_identity_statement_escapes_token() {
        let sql = MysqlDialect.render_set_identity(&schema(), "users", "it's");
        assert_eq!(sql, "ALTER TABLE users COMMENT 'it''s'");
    }

    #[test]
    fn mysql_rename_and_drop_table() {
        assert_eq!(
            MysqlDialect.render_rename_table("old", "new"),
            "ALTER TABLE old RENAME new"
        );
        assert_eq!(MysqlDialect.render_drop_table("t"), "DROP TABLE t");
        assert_eq!(
            MysqlDialect.render_drop_foreign_key("t", "fk_user"),
            "ALTER TABLE t DROP FOREIGN KEY fk_user"
        );
    }

    // ── PostgreSQL rendering ────────────────────────────────────────────────

    #[test]
    fn postgres_column_with_max_len() {
        let mut col = column("character varying", false, None);
        col.max_len = Some(255);
        let r = PostgresDialect.render_column("email", &col);
        assert_eq!(r.def, "email character varying (255) NOT NULL");
    }

    #[test]
    fn postgres_sequence_default_emits_prelude() {
        let col = column("integer", false, Some("nextval('users_id_seq'::regclass)"));
        let r = PostgresDialect.render_column("id", &col);
        assert_eq!(
            r.prelude,
            vec!["CREATE SEQUENCE IF NOT EXISTS users_id_seq".to_string()]
        );
        assert_eq!(
            r.def,
            "id integer NOT NULL DEFAULT nextval('users_id_seq'::regclass)"
        );
    }

    #[test]
    fn postgres_create_table_preludes_come_first() {
        let mut columns = std::collections::BTreeMap::new();
        columns.insert(
            "id".to_string(),
            column("integer", false, Some("nextval('t_id_seq'::regclass)")),
        );
        let table = Table {
            name: "t".into(),
            columns,
            indexes: Default::default(),
            foreign_keys: Default::default(),
        };
        let sql = PostgresDialect.render_create_table(&table, None);
        assert!(!sql.inline_primary_key);
        assert_eq!(sql.statements.len(), 2);
        assert_eq!(sql.statements[0], "CREATE SEQUENCE IF NOT EXISTS t_id_seq");
        assert!(sql.statements[1].starts_with("CREATE TABLE t ("));
    }

    #[test]
    fn postgres_modify_column_expands_to_alter_sequence() {
        let mut col = column("character varying", true, Some("'x'"));
        col.max_len = Some(64);
        let statements = PostgresDialect.render_modify_column("t", "c", &col);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE t ALTER COLUMN c TYPE character varying (64)".to_string(),
                "ALTER TABLE t ALTER COLUMN c DROP NOT NULL".to_string(),
                "ALTER TABLE t ALTER COLUMN c SET DEFAULT 'x'".to_string(),
            ]
        );
    }

    #[test]
    fn postgres_modify_column_drops_absent_default() {
        let col = column("integer", false, None);
        let statements = PostgresDialect.render_modify_column("t", "c", &col);
        assert_eq!(
            statements[2],
            "ALTER TABLE t ALTER COLUMN c DROP DEFAULT"
        );
        assert_eq!(statements[1], "ALTER TABLE t ALTER COLUMN c SET NOT NULL");
    }

    #[test]
    fn postgres_rename_column_is_pure_rename() {
        let col = column("integer", false, None);
        assert_eq!(
            PostgresDialect.render_rename_column("t", "a", "b", &col),
            vec!["ALTER TABLE t RENAME COLUMN a TO b".to_string()]
        );
    }

    #[test]
    fn postgres_drop_index_drops_constraint_and_index() {
        assert_eq!(
            PostgresDialect.render_drop_index("t", "t_pkey"),
            vec![
                "ALTER TABLE t DROP CONSTRAINT IF EXISTS t_pkey".to_string(),
                "DROP INDEX IF EXISTS t_pkey".to_string(),
            ]
        );
    }

    #[test]
    fn postgres_identity_statement_is_schema_qualified() {
        let sql = PostgresDialect.render_set_identity(&schema(), "users", "tok");
        assert_eq!(sql, "COMMENT ON TABLE public.users IS 'tok'");
    }

    #[test]
    fn postgres_replace_routine_qualifies_schema() {
        let statements = PostgresDialect.render_replace_routine(
            &schema(),
            "audit",
            "CREATE OR REPLACE FUNCTION audit() RETURNS trigger AS $$ … $$",
        );
        assert_eq!(statements[0], "DROP FUNCTION IF EXISTS public.audit");
        assert!(statements[1].starts_with("CREATE OR REPLACE FUNCTION public.audit()"));
    }

    #[test]
    fn postgres_rename_table_uses_rename_to() {
        assert_eq!(
            PostgresDialect.render_rename_table("a", "b"),
            "ALTER TABLE a RENAME TO b"
        );
    }

    // ── PostgreSQL index introspection ──────────────────────────────────────

    #[test]
    fn postgres_constraint_types_map_to_add_constraint() {
        let s = schema();
        assert_eq!(
            postgres_index_definition(
                "users",
                &s,
                "users_pkey",
                "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)",
                Some("p"),
            ),
            Some("ALTER TABLE users ADD CONSTRAINT users_pkey PRIMARY KEY (id)".to_string())
        );
        assert_eq!(
            postgres_index_definition(
                "users",
                &s,
                "users_email_key",
                "CREATE UNIQUE INDEX users_email_key ON public.users USING btree (email)",
                Some("u"),
            ),
            Some("ALTER TABLE users ADD CONSTRAINT users_email_key UNIQUE (email)".to_string())
        );
        assert_eq!(
            postgres_index_definition(
                "users",
                &s,
                "users_team_fkey",
                "CREATE UNIQUE INDEX users_team_fkey ON public.users USING btree (team_id)",
                Some("f"),
            ),
            Some(
                "ALTER TABLE users ADD CONSTRAINT users_team_fkey FOREIGN KEY (team_id)"
                    .to_string()
            )
        );
    }

    #[test]
    fn postgres_unsupported_constraint_type_is_skipped() {
        assert_eq!(
            postgres_index_definition(
                "users",
                &schema(),
                "users_excl",
                "CREATE UNIQUE INDEX users_excl ON public.users USING gist (slot)",
                Some("x"),
            ),
            None
        );
    }

    #[test]
    fn postgres_internal_index_is_skipped() {
        assert_eq!(
            postgres_index_definition(
                "users",
                &schema(),
                "_hidden_idx",
                "CREATE INDEX _hidden_idx ON public.users USING btree (email)",
                None,
            ),
            None
        );
    }

    #[test]
    fn postgres_plain_index_keeps_indexdef_without_schema_qualifier() {
        assert_eq!(
            postgres_index_definition(
                "users",
                &schema(),
                "idx_email",
                "CREATE INDEX idx_email ON public.users USING btree (email)",
                None,
            ),
            Some("CREATE INDEX idx_email ON users USING btree (email)".to_string())
        );
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    #[test]
    fn sequence_extraction() {
        assert_eq!(
            sequence_from_default("nextval('users_id_seq'::regclass)"),
            Some("users_id_seq".to_string())
        );
        assert_eq!(
            sequence_from_default("nextval('\"Quoted_seq\"'::regclass)"),
            Some("Quoted_seq".to_string())
        );
        assert_eq!(sequence_from_default("'pending'"), None);
    }

    #[test]
    fn function_qualifier_stripping() {
        assert_eq!(
            strip_function_qualifier("CREATE OR REPLACE FUNCTION public.audit()"),
            "CREATE OR REPLACE FUNCTION audit()"
        );
        assert_eq!(
            strip_function_qualifier("CREATE FUNCTION audit()"),
            "CREATE FUNCTION audit()"
        );
    }

    #[test]
    fn literal_escaping() {
        assert_eq!(escape_literal("plain"), "plain");
        assert_eq!(escape_literal("it's"), "it''s");
    }

    // ── Factory ─────────────────────────────────────────────────────────────

    #[test]
    fn from_driver_names() {
        assert_eq!(from_driver("mysql").name(), "mysql");
        assert_eq!(from_driver("postgres").name(), "postgres");
        assert_eq!(from_driver("unknown").name(), "postgres"); // default
    }

    #[test]
    fn primary_index_name_per_backend() {
        assert_eq!(MysqlDialect.primary_index_name(), Some("PRIMARY"));
        assert_eq!(PostgresDialect.primary_index_name(), None);
    }
}
