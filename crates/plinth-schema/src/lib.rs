//! Declarative schema types for plinth.
//!
//! A [`SchemaSpec`] describes the tables a database namespace should contain.
//! It is plain data: building one never touches a database, and the planner
//! in `plinth` consumes it read-only.
//!
//! # Naming Convention
//!
//! Table names use singular form (`user`, `article`, `vote`). Constraint names
//! default to the Postgres conventions (`user_pkey`, `vote_user_id_fkey`,
//! `user_email_key`) unless given explicitly.
//!
//! # Example
//!
//! ```
//! use plinth_schema::{ColumnSpec, ColumnType, ForeignKeySpec, SchemaSpec, TableSpec};
//!
//! let spec = SchemaSpec::new("public")
//!     .table(
//!         TableSpec::new("user")
//!             .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
//!             .primary_key(["id"]),
//!     )
//!     .table(
//!         TableSpec::new("vote")
//!             .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
//!             .column(ColumnSpec::new("user_id", ColumnType::Uuid).not_null())
//!             .primary_key(["id"])
//!             .foreign_key(ForeignKeySpec::new(["user_id"], "user", ["id"])),
//!     );
//!
//! assert_eq!(spec.tables.len(), 2);
//! ```

use std::fmt;

mod ddl;
pub use ddl::{add_constraint_sql, column_def_sql, constraint_def_sql, create_table_sql};

/// Postgres column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// NUMERIC (arbitrary precision)
    Numeric,
    /// BOOLEAN
    Boolean,
    /// TEXT
    Text,
    /// VARCHAR(n)
    Varchar(u32),
    /// BYTEA (binary)
    Bytea,
    /// DATE
    Date,
    /// TIME
    Time,
    /// TIMESTAMP (without time zone)
    Timestamp,
    /// TIMESTAMPTZ
    Timestamptz,
    /// UUID
    Uuid,
    /// JSONB
    Jsonb,
}

impl ColumnType {
    /// Whether a foreign key column of this type may reference a column of
    /// type `other`.
    ///
    /// Types must match exactly, except that `varchar` lengths are ignored.
    pub fn is_fk_compatible(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Varchar(_), ColumnType::Varchar(_)) => true,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Real => write!(f, "REAL"),
            ColumnType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            ColumnType::Numeric => write!(f, "NUMERIC"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Varchar(len) => write!(f, "VARCHAR({})", len),
            ColumnType::Bytea => write!(f, "BYTEA"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Time => write!(f, "TIME"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
            ColumnType::Timestamptz => write!(f, "TIMESTAMPTZ"),
            ColumnType::Uuid => write!(f, "UUID"),
            ColumnType::Jsonb => write!(f, "JSONB"),
        }
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Postgres type
    pub column_type: ColumnType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any), spliced verbatim into the DDL
    pub default: Option<String>,
}

impl ColumnSpec {
    /// A nullable column with no default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
        }
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set a default value expression, e.g. `current_timestamp`.
    pub fn default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeySpec {
    /// Explicit constraint name; `{table}_{cols}_fkey` when absent
    pub name: Option<String>,
    /// Column(s) in this table
    pub columns: Vec<String>,
    /// Referenced table (same namespace)
    pub references_table: String,
    /// Referenced column(s)
    pub references_columns: Vec<String>,
}

impl ForeignKeySpec {
    pub fn new<C, R>(columns: C, references_table: impl Into<String>, references_columns: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Give the constraint an explicit name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintSpec {
    /// PRIMARY KEY over one or more columns.
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    /// FOREIGN KEY referencing another table.
    ForeignKey(ForeignKeySpec),
    /// UNIQUE over one or more columns.
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
}

impl ConstraintSpec {
    /// The constraint name as it will appear in `pg_constraint`.
    pub fn name(&self, table: &str) -> String {
        match self {
            ConstraintSpec::PrimaryKey { name, .. } => name
                .as_deref()
                .map(plinth_sql::truncate_ident)
                .unwrap_or_else(|| plinth_sql::primary_key_name(table)),
            ConstraintSpec::ForeignKey(fk) => fk
                .name
                .as_deref()
                .map(plinth_sql::truncate_ident)
                .unwrap_or_else(|| plinth_sql::foreign_key_name(table, &fk.columns)),
            ConstraintSpec::Unique { name, columns } => name
                .as_deref()
                .map(plinth_sql::truncate_ident)
                .unwrap_or_else(|| plinth_sql::unique_name(table, columns)),
        }
    }

    /// Columns of the owning table covered by this constraint.
    pub fn columns(&self) -> &[String] {
        match self {
            ConstraintSpec::PrimaryKey { columns, .. } => columns,
            ConstraintSpec::ForeignKey(fk) => &fk.columns,
            ConstraintSpec::Unique { columns, .. } => columns,
        }
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKeySpec> {
        match self {
            ConstraintSpec::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name
    pub name: String,
    /// Columns, in declaration order
    pub columns: Vec<ColumnSpec>,
    /// Constraints, in declaration order
    pub constraints: Vec<ConstraintSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintSpec) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a primary key with the default `{table}_pkey` name.
    pub fn primary_key<C>(self, columns: C) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.constraint(ConstraintSpec::PrimaryKey {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    /// Add a unique constraint with the default `{table}_{cols}_key` name.
    pub fn unique<C>(self, columns: C) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.constraint(ConstraintSpec::Unique {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    pub fn foreign_key(self, fk: ForeignKeySpec) -> Self {
        self.constraint(ConstraintSpec::ForeignKey(fk))
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Iterate over the foreign keys of this table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKeySpec> {
        self.constraints.iter().filter_map(ConstraintSpec::as_foreign_key)
    }
}

/// A complete target schema: one namespace and its tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSpec {
    /// Postgres schema (namespace) the tables live in
    pub namespace: String,
    /// Tables, in declaration order
    pub tables: Vec<TableSpec>,
}

impl Default for SchemaSpec {
    fn default() -> Self {
        Self::new("public")
    }
}

impl SchemaSpec {
    /// Create a new empty schema for a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tables: Vec::new(),
        }
    }

    pub fn table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests;
