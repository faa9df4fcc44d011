use crate::ExecutionReport;
use plinth_schema::ColumnType;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot reach database: {0}")]
    Connection(#[source] tokio_postgres::Error),

    #[error("could not get a connection from the pool: {0}")]
    Pool(#[source] deadpool_postgres::PoolError),

    #[error("could not build connection pool: {0}")]
    PoolBuild(#[from] deadpool_postgres::BuildError),

    #[error("invalid schema: {0}")]
    Plan(#[from] PlanError),

    #[error("{operation} failed, transaction rolled back: {source}\n  statement: {statement}")]
    OperationFailure {
        /// Identity of the operation that failed, e.g. `create table public.vote`.
        operation: String,
        table: Option<String>,
        statement: String,
        #[source]
        source: tokio_postgres::Error,
        report: Box<ExecutionReport>,
    },

    #[error("connection lost during {operation}, transaction rolled back: {source}\n  statement: {statement}")]
    ConnectionLost {
        operation: String,
        table: Option<String>,
        statement: String,
        #[source]
        source: tokio_postgres::Error,
        report: Box<ExecutionReport>,
    },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("timed out after {after:?} during {operation}, transaction rolled back")]
    Timeout {
        after: Duration,
        operation: String,
        report: Box<ExecutionReport>,
    },

    #[error("postgres error: {0}")]
    Postgres(#[source] tokio_postgres::Error),
}

impl Error {
    /// The report of the aborted run, for errors raised by the executor.
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Error::OperationFailure { report, .. }
            | Error::ConnectionLost { report, .. }
            | Error::Timeout { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        if is_connection_error(&err) {
            Error::Connection(err)
        } else {
            Error::Postgres(err)
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => Error::Connection(e),
            other => Error::Pool(other),
        }
    }
}

/// Closed connections and socket-level failures carry no SQLSTATE. A backend
/// terminated by the server reports class 08 or 57P before hanging up.
fn is_connection_error(err: &tokio_postgres::Error) -> bool {
    if err.is_closed() {
        return true;
    }
    match err.code() {
        Some(code) => is_connection_state(code.code()),
        None => std::error::Error::source(err).is_some_and(|source| source.is::<std::io::Error>()),
    }
}

fn is_connection_state(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

/// Why a [`SchemaSpec`](plinth_schema::SchemaSpec) cannot be planned.
///
/// All of these are detected before any statement is sent to the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("identifier '{name}' is longer than {limit} bytes and would be truncated by Postgres")]
    IdentifierTooLong { name: String, limit: usize },

    #[error("table '{table}' is declared more than once")]
    DuplicateTable { table: String },

    #[error("column '{table}.{column}' is declared more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("constraint '{constraint}' on '{table}' has no columns")]
    EmptyConstraint { table: String, constraint: String },

    #[error("constraint '{constraint}' references unknown column '{table}.{column}'")]
    UnknownColumn {
        table: String,
        constraint: String,
        column: String,
    },

    #[error(
        "foreign key '{constraint}' on '{table}' references table '{target}', \
         which is neither declared nor present in the database"
    )]
    ForeignKeyTargetNotFound {
        table: String,
        constraint: String,
        target: String,
    },

    #[error("foreign key '{constraint}' on '{table}' references unknown columns {columns:?} of '{target}'")]
    ForeignKeyColumnsNotFound {
        table: String,
        constraint: String,
        target: String,
        columns: Vec<String>,
    },

    #[error(
        "foreign key '{constraint}' on '{table}' has {columns} column(s) but references {references}"
    )]
    ForeignKeyArity {
        table: String,
        constraint: String,
        columns: usize,
        references: usize,
    },

    #[error(
        "foreign key '{constraint}': '{table}.{column}' is {column_type} \
         but references '{target}.{target_column}' which is {target_type}"
    )]
    TypeMismatch {
        table: String,
        constraint: String,
        column: String,
        column_type: ColumnType,
        target: String,
        target_column: String,
        target_type: ColumnType,
    },

    #[error("foreign keys form a dependency cycle: {}", .tables.join(" -> "))]
    CyclicDependency { tables: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::error::SqlState;

    #[test]
    fn test_connection_states() {
        assert!(is_connection_state(SqlState::ADMIN_SHUTDOWN.code()));
        assert!(is_connection_state(SqlState::CRASH_SHUTDOWN.code()));
        assert!(is_connection_state(SqlState::CONNECTION_FAILURE.code()));
        assert!(!is_connection_state(SqlState::UNDEFINED_TABLE.code()));
        assert!(!is_connection_state(SqlState::INSUFFICIENT_PRIVILEGE.code()));
        assert!(!is_connection_state(SqlState::QUERY_CANCELED.code()));
    }
}
