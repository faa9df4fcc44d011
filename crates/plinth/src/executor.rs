//! Transactional application of a plan.
//!
//! All operations of one [`MigrationExecutor::apply`] call run inside a single
//! transaction: either every operation takes effect or none does. Each
//! operation is guarded by a catalog check so that re-applying a plan is a
//! no-op.

use crate::{ConnectionExt, Error, MigrationOperation, Result, SchemaInspector, inspect};
use std::fmt;
use std::time::Duration;
use tokio_postgres::{Client, NoTls, Transaction};
use tracing::{error, info, warn};

/// Why an operation was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The object the operation creates is already there.
    AlreadyExists,
    /// The object the operation drops is not there.
    NotPresent,
    /// An earlier operation failed and the transaction was rolled back.
    Aborted,
}

/// What happened to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
    /// Executed, then undone when the transaction rolled back.
    RolledBack,
    Failed {
        reason: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::Skipped(SkipReason::AlreadyExists) => write!(f, "skipped (already exists)"),
            Outcome::Skipped(SkipReason::NotPresent) => write!(f, "skipped (not present)"),
            Outcome::Skipped(SkipReason::Aborted) => write!(f, "skipped (aborted)"),
            Outcome::RolledBack => write!(f, "rolled back"),
            Outcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub operation: MigrationOperation,
    pub outcome: Outcome,
}

/// Per-operation results of one run, in plan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    /// Whether the transaction was committed.
    pub committed: bool,
}

impl ExecutionReport {
    /// Number of operations that took effect.
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    /// Number of operations skipped by their existence guard.
    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                Outcome::Skipped(SkipReason::AlreadyExists | SkipReason::NotPresent)
            )
        })
    }

    /// Whether the run changed nothing (every operation was skipped).
    pub fn is_noop(&self) -> bool {
        self.applied() == 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Rewrite the outcomes after a rollback: everything applied so far is
    /// undone, the operation at `failed` gets `reason`, and the rest never ran.
    fn abort(
        ops: &[MigrationOperation],
        mut outcomes: Vec<Outcome>,
        failed: usize,
        reason: String,
    ) -> Self {
        for outcome in &mut outcomes {
            if *outcome == Outcome::Applied {
                *outcome = Outcome::RolledBack;
            }
        }
        outcomes.truncate(failed);
        if failed < ops.len() {
            outcomes.push(Outcome::Failed { reason });
        }
        while outcomes.len() < ops.len() {
            outcomes.push(Outcome::Skipped(SkipReason::Aborted));
        }
        Self::zip(ops, outcomes, false)
    }

    fn zip(ops: &[MigrationOperation], outcomes: Vec<Outcome>, committed: bool) -> Self {
        let results = ops
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(operation, outcome)| ExecutionResult { operation, outcome })
            .collect();
        Self { results, committed }
    }
}

/// Applies operations on one connection, one transaction per call.
pub struct MigrationExecutor<'a> {
    client: &'a mut Client,
    timeout: Option<Duration>,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Abort and roll back a run that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The underlying connection, for catalog queries outside a run.
    pub fn client(&self) -> &Client {
        self.client
    }

    /// Apply `ops` in order inside one transaction.
    ///
    /// Operations are awaited one at a time. On the first failure (or when the
    /// timeout elapses) the transaction is rolled back and the error carries
    /// the full report: earlier operations as rolled back, the failing one as
    /// failed, the rest as aborted.
    pub async fn apply(&mut self, ops: &[MigrationOperation]) -> Result<ExecutionReport> {
        let timeout = self.timeout;
        let cancel = self.client.cancel_token();
        let tx = self.client.transaction().await?;
        let mut outcomes = Vec::with_capacity(ops.len());

        let run = run_operations(&tx, ops, &mut outcomes);
        let aborted = match timeout {
            Some(after) => match tokio::time::timeout(after, run).await {
                Ok(result) => result.err().map(Abort::Failed),
                Err(_) => {
                    // The abandoned statement keeps running server-side and
                    // would hold up the rollback.
                    if let Err(err) = cancel.cancel_query(NoTls).await {
                        warn!(error = %err, "could not cancel the running statement");
                    }
                    Some(Abort::TimedOut(after))
                }
            },
            None => run.await.err().map(Abort::Failed),
        };

        let Some(abort) = aborted else {
            tx.commit().await?;
            let report = ExecutionReport::zip(ops, outcomes, true);
            info!(
                applied = report.applied(),
                skipped = report.skipped(),
                "transaction committed"
            );
            return Ok(report);
        };

        if let Err(err) = tx.rollback().await {
            warn!(error = %err, "rollback failed, the connection will discard the transaction");
        }

        // Outcomes hold one entry per finished operation; the next one is
        // where the run stopped.
        let index = outcomes.len();
        let operation = ops.get(index);
        let identity = operation.map(|op| op.to_string()).unwrap_or_default();

        match abort {
            Abort::TimedOut(after) => {
                let reason = format!("timed out after {:?}", after);
                let report = ExecutionReport::abort(ops, outcomes, index, reason);
                warn!(operation = %identity, "timed out, transaction rolled back");
                Err(Error::Timeout {
                    after,
                    operation: identity,
                    report: Box::new(report),
                })
            }
            Abort::Failed(Failure { statement, error }) => {
                let report = ExecutionReport::abort(ops, outcomes, index, error.to_string());
                error!(operation = %identity, %statement, error = %error, "transaction rolled back");
                Err(with_context(error, operation, statement, report))
            }
        }
    }
}

enum Abort {
    Failed(Failure),
    TimedOut(Duration),
}

/// An error raised mid-run, with the statement that raised it: the
/// operation's DDL or its catalog guard.
struct Failure {
    statement: String,
    error: Error,
}

/// Attach the failed operation, the statement and the report to a database
/// error.
fn with_context(
    error: Error,
    operation: Option<&MigrationOperation>,
    statement: String,
    report: ExecutionReport,
) -> Error {
    let identity = operation.map(|op| op.to_string()).unwrap_or_default();
    let table = operation.and_then(|op| op.table()).map(str::to_string);
    let report = Box::new(report);
    match error {
        Error::Postgres(source) => Error::OperationFailure {
            operation: identity,
            table,
            statement,
            source,
            report,
        },
        Error::Connection(source) => Error::ConnectionLost {
            operation: identity,
            table,
            statement,
            source,
            report,
        },
        other => other,
    }
}

/// Run each operation after its existence guard, recording one outcome per
/// finished operation.
async fn run_operations(
    tx: &Transaction<'_>,
    ops: &[MigrationOperation],
    outcomes: &mut Vec<Outcome>,
) -> std::result::Result<(), Failure> {
    for op in ops {
        let skip = guard(tx, op).await.map_err(|error| Failure {
            statement: guard_statement(op).unwrap_or_default().to_string(),
            error,
        })?;
        if let Some(reason) = skip {
            info!(operation = %op, ?reason, "skipped");
            outcomes.push(Outcome::Skipped(reason));
            continue;
        }

        let sql = op.to_sql();
        if let Err(err) = tx.traced().execute(&sql, &[]).await {
            return Err(Failure {
                statement: sql,
                error: err.into(),
            });
        }
        info!(operation = %op, "applied");
        outcomes.push(Outcome::Applied);
    }
    Ok(())
}

/// The catalog query [`guard`] runs for `op`, if any.
fn guard_statement(op: &MigrationOperation) -> Option<&'static str> {
    match op {
        MigrationOperation::CreateSchema { .. } | MigrationOperation::DropSchema { .. } => {
            Some(inspect::SCHEMA_EXISTS_SQL)
        }
        MigrationOperation::CreateTable { .. } => Some(inspect::TABLE_EXISTS_SQL),
        MigrationOperation::AddConstraint { .. } => Some(inspect::CONSTRAINT_EXISTS_SQL),
        MigrationOperation::GrantSchema { .. } => None,
    }
}

async fn guard(tx: &Transaction<'_>, op: &MigrationOperation) -> Result<Option<SkipReason>> {
    let inspector = SchemaInspector::new(tx, op.schema());
    let skip = match op {
        MigrationOperation::CreateSchema { .. } => inspector
            .schema_exists()
            .await?
            .then_some(SkipReason::AlreadyExists),
        MigrationOperation::DropSchema { .. } => (!inspector.schema_exists().await?)
            .then_some(SkipReason::NotPresent),
        MigrationOperation::CreateTable { table, .. } => inspector
            .table_exists(&table.name)
            .await?
            .then_some(SkipReason::AlreadyExists),
        MigrationOperation::AddConstraint {
            table, constraint, ..
        } => inspector
            .constraint_exists(table, &constraint.name(table))
            .await?
            .then_some(SkipReason::AlreadyExists),
        // Re-granting is harmless
        MigrationOperation::GrantSchema { .. } => None,
    };
    Ok(skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Grantee;

    fn ops() -> Vec<MigrationOperation> {
        vec![
            MigrationOperation::DropSchema {
                schema: "public".to_string(),
            },
            MigrationOperation::CreateSchema {
                schema: "public".to_string(),
            },
            MigrationOperation::GrantSchema {
                schema: "public".to_string(),
                grantee: Grantee::Public,
            },
            MigrationOperation::GrantSchema {
                schema: "public".to_string(),
                grantee: Grantee::parse("admin"),
            },
        ]
    }

    fn outcomes(report: &ExecutionReport) -> Vec<Outcome> {
        report.results.iter().map(|r| r.outcome.clone()).collect()
    }

    #[test]
    fn test_abort_marks_rolled_back_failed_and_aborted() {
        let ops = ops();
        let report = ExecutionReport::abort(
            &ops,
            vec![
                Outcome::Applied,
                Outcome::Skipped(SkipReason::AlreadyExists),
            ],
            2,
            "boom".to_string(),
        );

        assert!(!report.committed);
        assert_eq!(
            outcomes(&report),
            vec![
                Outcome::RolledBack,
                Outcome::Skipped(SkipReason::AlreadyExists),
                Outcome::Failed {
                    reason: "boom".to_string()
                },
                Outcome::Skipped(SkipReason::Aborted),
            ]
        );
        assert_eq!(report.applied(), 0);
        assert_eq!(report.results[3].operation, ops[3]);
    }

    #[test]
    fn test_abort_before_first_operation() {
        let ops = ops();
        let report = ExecutionReport::abort(&ops, vec![], 0, "connection lost".to_string());
        assert!(matches!(report.results[0].outcome, Outcome::Failed { .. }));
        assert!(
            report.results[1..]
                .iter()
                .all(|r| r.outcome == Outcome::Skipped(SkipReason::Aborted))
        );
    }

    #[test]
    fn test_counts() {
        let ops = ops();
        let report = ExecutionReport::zip(
            &ops,
            vec![
                Outcome::Skipped(SkipReason::NotPresent),
                Outcome::Applied,
                Outcome::Applied,
                Outcome::Applied,
            ],
            true,
        );
        assert_eq!(report.applied(), 3);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_noop());
        assert!(ExecutionReport::default().is_noop());
    }

    #[test]
    fn test_guard_failures_name_the_catalog_query() {
        let ops = ops();
        assert_eq!(guard_statement(&ops[0]), Some(inspect::SCHEMA_EXISTS_SQL));
        assert_eq!(guard_statement(&ops[1]), Some(inspect::SCHEMA_EXISTS_SQL));
        assert_eq!(guard_statement(&ops[2]), None);

        let create = MigrationOperation::CreateTable {
            schema: "public".to_string(),
            table: plinth_schema::TableSpec::new("vote"),
        };
        let statement = guard_statement(&create).unwrap();
        assert!(statement.contains("pg_catalog.pg_tables"));
        assert_ne!(statement, create.to_sql());
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let ops = ops();
        let report = ExecutionReport::abort(&ops, vec![], 0, "denied".to_string());
        let err = with_context(
            Error::Permission("denied".to_string()),
            ops.first(),
            ops[0].to_sql(),
            report,
        );
        assert!(matches!(err, Error::Permission(_)));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            Outcome::Skipped(SkipReason::AlreadyExists).to_string(),
            "skipped (already exists)"
        );
        assert_eq!(
            Outcome::Failed {
                reason: "relation \"vote\" already exists".to_string()
            }
            .to_string(),
            "failed: relation \"vote\" already exists"
        );
    }
}
