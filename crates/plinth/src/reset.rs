//! Wiping a namespace and starting over.

use crate::{
    Error, ExecutionReport, Grantee, MigrationExecutor, MigrationOperation, Result,
    SchemaInspector,
};
use tokio_postgres::error::SqlState;

/// Drops a namespace with everything in it, recreates it empty and re-grants
/// schema privileges.
///
/// Nothing runs unless the reset was explicitly confirmed:
///
/// ```ignore
/// let report = DestructiveReset::new("public")
///     .grant(Grantee::Public)
///     .confirm()
///     .reset(&mut executor)
///     .await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructiveReset {
    schema: String,
    grantees: Vec<Grantee>,
    confirmed: bool,
}

impl DestructiveReset {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            grantees: Vec::new(),
            confirmed: false,
        }
    }

    /// Re-grant `ALL` on the schema to `grantee` after recreating it.
    pub fn grant(mut self, grantee: Grantee) -> Self {
        self.grantees.push(grantee);
        self
    }

    /// Acknowledge that every object in the schema will be dropped.
    pub fn confirm(mut self) -> Self {
        self.confirmed = true;
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// The statements a confirmed reset runs, in order.
    pub fn operations(&self) -> Vec<MigrationOperation> {
        let mut ops = vec![
            MigrationOperation::DropSchema {
                schema: self.schema.clone(),
            },
            MigrationOperation::CreateSchema {
                schema: self.schema.clone(),
            },
        ];
        ops.extend(
            self.grantees
                .iter()
                .map(|grantee| MigrationOperation::GrantSchema {
                    schema: self.schema.clone(),
                    grantee: grantee.clone(),
                }),
        );
        ops
    }

    /// Run the reset as one transaction.
    ///
    /// Fails with [`Error::Permission`] before sending any DDL when the reset
    /// is unconfirmed or the current role does not own the schema, and when
    /// Postgres rejects a statement for lack of privilege.
    pub async fn reset(&self, executor: &mut MigrationExecutor<'_>) -> Result<ExecutionReport> {
        if !self.confirmed {
            return Err(Error::Permission(format!(
                "refusing to drop schema '{}' without confirmation",
                self.schema
            )));
        }

        let inspector = SchemaInspector::new(executor.client(), &self.schema);
        if !inspector.owns_schema().await? {
            return Err(Error::Permission(format!(
                "current role does not own schema '{}'",
                self.schema
            )));
        }

        tracing::warn!(schema = %self.schema, "dropping schema and all its objects");
        match executor.apply(&self.operations()).await {
            Err(Error::OperationFailure {
                operation, source, ..
            }) if source.code() == Some(&SqlState::INSUFFICIENT_PRIVILEGE) => {
                Err(Error::Permission(format!("{}: {}", operation, source)))
            }
            other => other,
        }
    }
}
