use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::error::DiffError;
use crate::domain::ports::SchemaRepository;
use crate::domain::schema::{Schema, Table};
use crate::domain::value_objects::{SchemaName, TableId};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{from_driver, opt_blob_or_string, Dialect};

pub struct SqlxSchemaRepository {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
}

/// Connect to the database described in `cfg` and return a `SqlxSchemaRepository`.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxSchemaRepository> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {} (driver: {})",
                cfg.dbname, cfg.driver
            )
        })?;

    debug!(
        "Connected to {}/{} via {} driver",
        cfg.host, cfg.dbname, cfg.driver
    );

    Ok(SqlxSchemaRepository {
        pool,
        dialect: Arc::from(from_driver(&cfg.driver)),
    })
}

impl SqlxSchemaRepository {
    async fn introspect_table(&self, schema: &SchemaName, name: &str) -> Result<Table> {
        // Columns
        let rows = sqlx::query(self.dialect.columns_sql())
            .bind(&schema.0)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch columns for {}.{}", schema.0, name))?;

        let mut columns = BTreeMap::new();
        for row in &rows {
            let (col_name, column) = self.dialect.parse_column(row, schema)?;
            columns.insert(col_name, column);
        }

        // Indexes
        let rows = sqlx::query(self.dialect.indexes_sql())
            .bind(&schema.0)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch indexes for {}.{}", schema.0, name))?;
        let indexes = self.dialect.collect_indexes(name, schema, &rows)?;

        // Foreign keys, where the backend introspects them directly
        let mut foreign_keys = BTreeMap::new();
        if let Some(sql) = self.dialect.foreign_keys_sql() {
            let rows = sqlx::query(sql)
                .bind(&schema.0)
                .bind(name)
                .fetch_all(&self.pool)
                .await
                .with_context(|| {
                    format!("Failed to fetch foreign keys for {}.{}", schema.0, name)
                })?;
            for row in &rows {
                let (fk_name, def) = self.dialect.parse_foreign_key(name, row)?;
                foreign_keys.insert(fk_name, def);
            }
        }

        Ok(Table {
            name: name.to_string(),
            columns,
            indexes,
            foreign_keys,
        })
    }

    async fn introspect_functions(
        &self,
        schema: &SchemaName,
    ) -> Result<BTreeMap<String, String>> {
        let Some(sql) = self.dialect.functions_sql() else {
            return Ok(BTreeMap::new());
        };

        let rows = sqlx::query(sql)
            .bind(&schema.0)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch routines in schema {}", schema.0))?;

        let mut functions = BTreeMap::new();
        for row in &rows {
            let (name, def) = self.dialect.parse_function(row)?;
            functions.insert(name, def);
        }
        Ok(functions)
    }
}

#[async_trait]
impl SchemaRepository for SqlxSchemaRepository {
    async fn identities(
        &self,
        schema: &SchemaName,
    ) -> Result<BTreeMap<String, Option<String>>> {
        let rows = sqlx::query(self.dialect.table_identities_sql())
            .bind(&schema.0)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list tables in schema {}", schema.0))?;

        let mut tables = BTreeMap::new();
        for row in &rows {
            let name = opt_blob_or_string(row, 0)?
                .context("catalog returned a NULL table name")?;
            let comment = opt_blob_or_string(row, 1)?.filter(|c| !c.is_empty());
            tables.insert(name, comment);
        }
        Ok(tables)
    }

    async fn ensure_identities(&self, schema: &SchemaName) -> Result<()> {
        for (table, identity) in self.identities(schema).await? {
            if identity.is_some() {
                continue;
            }

            // Self-healing write, executed eagerly — a deferred identity
            // would leave this run unable to match the table by rename.
            let token = Uuid::new_v4().simple().to_string();
            let sql = self.dialect.render_set_identity(schema, &table, &token);
            debug!("Executing: {}", sql);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|source| DiffError::IdentityPersistence {
                    table: table.clone(),
                    source,
                })?;
            info!(table = %table, "assigned identity token to untracked table");
        }
        Ok(())
    }

    async fn snapshot(&self, schema: &SchemaName) -> Result<Schema> {
        let mut tables = BTreeMap::new();
        for (name, identity) in self.identities(schema).await? {
            let identity = identity.with_context(|| {
                format!(
                    "table {} has no identity token; run ensure_identities first",
                    name
                )
            })?;
            let table = self.introspect_table(schema, &name).await?;
            tables.insert(TableId(identity), table);
        }

        Ok(Schema {
            tables,
            functions: self.introspect_functions(schema).await?,
        })
    }
}
