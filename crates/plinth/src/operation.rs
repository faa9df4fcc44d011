//! The unit of work the planner emits and the executor applies.

use plinth_schema::{ConstraintSpec, TableSpec, add_constraint_sql, create_table_sql};
use plinth_sql::quote_ident;
use std::fmt;

/// Who receives the schema-level privileges re-granted after a reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grantee {
    /// The `PUBLIC` pseudo-role (every role).
    Public,
    /// A named role.
    Role(String),
}

impl Grantee {
    /// Parse a grantee name; `public` (any case) is the pseudo-role.
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("public") {
            Grantee::Public
        } else {
            Grantee::Role(name.to_string())
        }
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // PUBLIC is a keyword, quoting it would name a role called "public"
            Grantee::Public => write!(f, "PUBLIC"),
            Grantee::Role(name) => write!(f, "{}", quote_ident(name)),
        }
    }
}

/// A single DDL step. Each renders to exactly one SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOperation {
    CreateSchema {
        schema: String,
    },
    DropSchema {
        schema: String,
    },
    GrantSchema {
        schema: String,
        grantee: Grantee,
    },
    /// Create a table with all of `table.constraints` inline.
    CreateTable {
        schema: String,
        table: TableSpec,
    },
    /// Add a constraint to an existing table.
    AddConstraint {
        schema: String,
        table: String,
        constraint: ConstraintSpec,
    },
}

impl MigrationOperation {
    /// The namespace this operation acts on.
    pub fn schema(&self) -> &str {
        match self {
            MigrationOperation::CreateSchema { schema }
            | MigrationOperation::DropSchema { schema }
            | MigrationOperation::GrantSchema { schema, .. }
            | MigrationOperation::CreateTable { schema, .. }
            | MigrationOperation::AddConstraint { schema, .. } => schema,
        }
    }

    /// The table this operation acts on, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            MigrationOperation::CreateTable { table, .. } => Some(&table.name),
            MigrationOperation::AddConstraint { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Generate the SQL statement for this operation.
    pub fn to_sql(&self) -> String {
        match self {
            MigrationOperation::CreateSchema { schema } => {
                format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema))
            }
            MigrationOperation::DropSchema { schema } => {
                format!("DROP SCHEMA IF EXISTS {} CASCADE;", quote_ident(schema))
            }
            MigrationOperation::GrantSchema { schema, grantee } => {
                format!("GRANT ALL ON SCHEMA {} TO {};", quote_ident(schema), grantee)
            }
            MigrationOperation::CreateTable { schema, table } => create_table_sql(schema, table),
            MigrationOperation::AddConstraint {
                schema,
                table,
                constraint,
            } => add_constraint_sql(schema, table, constraint),
        }
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationOperation::CreateSchema { schema } => write!(f, "create schema {}", schema),
            MigrationOperation::DropSchema { schema } => write!(f, "drop schema {}", schema),
            MigrationOperation::GrantSchema { schema, grantee } => {
                write!(f, "grant all on schema {} to {}", schema, grantee)
            }
            MigrationOperation::CreateTable { schema, table } => {
                write!(f, "create table {}.{}", schema, table.name)
            }
            MigrationOperation::AddConstraint {
                schema,
                table,
                constraint,
            } => write!(
                f,
                "add constraint {} on {}.{}",
                constraint.name(table),
                schema,
                table
            ),
        }
    }
}

/// Render a plan as an SQL script, one statement per operation.
pub fn render_sql(ops: &[MigrationOperation]) -> String {
    ops.iter()
        .map(|op| format!("-- {}\n{}", op, op.to_sql()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
