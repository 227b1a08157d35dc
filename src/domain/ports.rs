use std::collections::BTreeMap;

use crate::domain::changeset::Changeset;
use crate::domain::schema::Schema;
use crate::domain::value_objects::SchemaName;
use anyhow::Result;
use async_trait::async_trait;

/// Port: access to a live database's catalog (implemented by SqlxSchemaRepository)
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Live `table name → identity token` map for the schema. Tables whose
    /// identity comment is absent or empty report `None`.
    async fn identities(&self, schema: &SchemaName)
        -> Result<BTreeMap<String, Option<String>>>;

    /// Backfill identity tokens on tables that lack one.
    ///
    /// This is a self-healing side effect executed eagerly against the live
    /// database, never deferred to the changeset: an unidentified table
    /// would break rename detection on the next comparison. Failure is fatal.
    async fn ensure_identities(&self, schema: &SchemaName) -> Result<()>;

    /// Introspect the live database into a [`Schema`] snapshot.
    /// Assumes [`ensure_identities`](Self::ensure_identities) ran first.
    async fn snapshot(&self, schema: &SchemaName) -> Result<Schema>;
}

/// Port: output formatting (implemented by SqlWriter, JsonWriter)
pub trait OutputWriter: Send + Sync {
    /// Serializes the changeset to a string (SQL script, JSON, …)
    fn format(&self, changeset: &Changeset) -> Result<String>;
    /// Extension of the produced file (e.g. "sql", "json")
    fn extension(&self) -> &'static str;
}
