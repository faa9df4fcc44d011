//! Declarative schema bootstrap for Postgres.
//!
//! Describe the tables you want with a [`SchemaSpec`], and plinth creates
//! whatever is missing, in an order that satisfies every foreign key, inside
//! a single transaction.
//!
//! # Flow
//!
//! ```text
//! SchemaInspector ──> plan() ──> MigrationExecutor
//!   (what exists)     (what to do)  (do it, all or nothing)
//! ```
//!
//! Optionally, a confirmed [`DestructiveReset`] runs first and wipes the
//! namespace.
//!
//! ```ignore
//! let pool = plinth::single_connection_pool(config)?;
//! let mut conn = plinth::acquire(&pool).await?;
//!
//! let current = SchemaInspector::new(&conn, &spec.namespace).current_tables().await?;
//! let ops = plinth::plan(&spec, &current)?;
//!
//! let report = MigrationExecutor::new(&mut conn).apply(&ops).await?;
//! println!("{} applied, {} skipped", report.applied(), report.skipped());
//! ```
//!
//! Re-running the same plan is safe: every operation is guarded by a catalog
//! check and reported as skipped when its object already exists.
//!
//! # What is not covered
//!
//! Plinth only creates. Tables that already exist are never altered, columns
//! are never compared, and no migration history is recorded.

mod error;
mod executor;
mod inspect;
mod operation;
pub mod planner;
pub mod pool;
mod reset;
mod traced;

pub use error::{Error, PlanError};
pub use executor::{ExecutionReport, ExecutionResult, MigrationExecutor, Outcome, SkipReason};
pub use inspect::SchemaInspector;
pub use operation::{Grantee, MigrationOperation, render_sql};
pub use planner::plan;
pub use pool::{acquire, single_connection_pool};
pub use reset::DestructiveReset;
pub use traced::{Connection, ConnectionExt, TracedConn};

// Re-export the schema model so callers need a single dependency
pub use plinth_schema::{
    ColumnSpec, ColumnType, ConstraintSpec, ForeignKeySpec, SchemaSpec, TableSpec,
};

/// Result type for plinth operations.
pub type Result<T> = std::result::Result<T, Error>;
