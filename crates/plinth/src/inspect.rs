//! Catalog inspection: what already exists in the live database.

use crate::{Connection, ConnectionExt, Result};
use std::collections::BTreeSet;

// pg_tables lists every table, information_schema only those the role may use.
const CURRENT_TABLES_SQL: &str = "SELECT tablename::text FROM pg_catalog.pg_tables \
     WHERE schemaname::text = $1 ORDER BY tablename";

pub(crate) const SCHEMA_EXISTS_SQL: &str =
    "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname::text = $1)";

pub(crate) const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables \
     WHERE schemaname::text = $1 AND tablename::text = $2)";

pub(crate) const CONSTRAINT_EXISTS_SQL: &str = "SELECT EXISTS (\
     SELECT 1 FROM pg_catalog.pg_constraint c \
     JOIN pg_catalog.pg_class t ON t.oid = c.conrelid \
     JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
     WHERE n.nspname::text = $1 AND t.relname::text = $2 AND c.conname::text = $3)";

// Owner (or member of the owning role) of an existing schema, CREATE on the
// database for a missing one; superusers always qualify.
const OWNS_SCHEMA_SQL: &str = "SELECT COALESCE(\
     (SELECT pg_catalog.pg_has_role(current_user, n.nspowner, 'USAGE') \
      FROM pg_catalog.pg_namespace n WHERE n.nspname::text = $1), \
     pg_catalog.has_database_privilege(current_database(), 'CREATE')) \
     OR (SELECT rolsuper FROM pg_catalog.pg_roles WHERE rolname = current_user)";

/// Reads the current state of one namespace from the Postgres catalog.
///
/// The inspector borrows whatever connection the caller holds, so the same
/// queries run standalone before planning and inside the executor's
/// transaction for existence guards.
pub struct SchemaInspector<'a, C: Connection> {
    conn: &'a C,
    schema: &'a str,
}

impl<'a, C: Connection> SchemaInspector<'a, C> {
    pub fn new(conn: &'a C, schema: &'a str) -> Self {
        Self { conn, schema }
    }

    /// Names of the tables currently in the namespace.
    ///
    /// Empty on a fresh database. Fails with
    /// [`Error::Connection`](crate::Error::Connection) if the connection is
    /// unavailable.
    pub async fn current_tables(&self) -> Result<BTreeSet<String>> {
        let rows = self
            .conn
            .traced()
            .query(CURRENT_TABLES_SQL, &[&self.schema])
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    pub async fn schema_exists(&self) -> Result<bool> {
        self.exists(SCHEMA_EXISTS_SQL, &[&self.schema]).await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.exists(TABLE_EXISTS_SQL, &[&self.schema, &table]).await
    }

    /// Whether `table` already carries a constraint called `name`.
    pub async fn constraint_exists(&self, table: &str, name: &str) -> Result<bool> {
        self.exists(CONSTRAINT_EXISTS_SQL, &[&self.schema, &table, &name])
            .await
    }

    /// Whether the current role may drop and recreate the namespace.
    pub async fn owns_schema(&self) -> Result<bool> {
        self.exists(OWNS_SCHEMA_SQL, &[&self.schema]).await
    }

    async fn exists(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<bool> {
        let row = self.conn.traced().query_one(sql, params).await?;
        Ok(row.get::<_, Option<bool>>(0).unwrap_or(false))
    }
}
