//! Migration planner: orders table creation so every statement will succeed.
//!
//! The planner validates a [`SchemaSpec`] against itself and the set of tables
//! that already exist, then orders tables by foreign-key dependency:
//!
//! ```text
//! -- This fails:
//! CREATE TABLE vote (... REFERENCES "user" (id));  -- "user" doesn't exist!
//! CREATE TABLE "user" (...);
//!
//! -- This works:
//! CREATE TABLE "user" (...);
//! CREATE TABLE vote (... REFERENCES "user" (id));
//! ```
//!
//! Independent tables keep their declaration order. A foreign key is created
//! inline with its table when the referenced table exists or is planned
//! earlier; otherwise it is deferred to an `AddConstraint` after every
//! `CreateTable`. Foreign-key cycles are rejected.

use crate::{MigrationOperation, PlanError};
use indexmap::IndexMap;
use plinth_schema::{ConstraintSpec, SchemaSpec, TableSpec};
use plinth_sql::PG_IDENT_MAX;
use std::collections::{BTreeSet, HashSet};

/// Compute the operations that bring the namespace from `current` to `spec`.
///
/// Tables already in `current` are left alone (their columns are not
/// compared). Fails before emitting anything if `spec` is invalid or its
/// foreign keys form a cycle.
pub fn plan(
    spec: &SchemaSpec,
    current: &BTreeSet<String>,
) -> Result<Vec<MigrationOperation>, PlanError> {
    let tables = validate(spec, current)?;
    let ordered = order_tables(&tables)?;

    let mut available: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut creates = Vec::new();
    let mut deferred = Vec::new();

    for table in ordered {
        if current.contains(&table.name) {
            // Existing tables only pick up foreign keys to tables this plan creates,
            // which cannot exist yet.
            for fk in table.foreign_keys() {
                if tables.contains_key(fk.references_table.as_str())
                    && !current.contains(&fk.references_table)
                {
                    let constraint = ConstraintSpec::ForeignKey(fk.clone());
                    deferred.push(add_constraint(spec, &table.name, constraint));
                }
            }
            continue;
        }

        let mut inline = table.clone();
        inline.constraints.clear();
        for constraint in &table.constraints {
            match constraint {
                ConstraintSpec::ForeignKey(fk)
                    if fk.references_table != table.name
                        && !available.contains(fk.references_table.as_str()) =>
                {
                    deferred.push(add_constraint(spec, &table.name, constraint.clone()));
                }
                _ => inline.constraints.push(constraint.clone()),
            }
        }

        available.insert(&table.name);
        creates.push(MigrationOperation::CreateTable {
            schema: spec.namespace.clone(),
            table: inline,
        });
    }

    let ops: Vec<MigrationOperation> = creates.into_iter().chain(deferred).collect();
    for op in &ops {
        tracing::debug!(operation = %op, "planned");
    }
    Ok(ops)
}

fn add_constraint(spec: &SchemaSpec, table: &str, constraint: ConstraintSpec) -> MigrationOperation {
    MigrationOperation::AddConstraint {
        schema: spec.namespace.clone(),
        table: table.to_string(),
        constraint,
    }
}

/// Check names, columns, foreign-key targets and types.
///
/// Returns the tables indexed by name, in declaration order.
fn validate<'s>(
    spec: &'s SchemaSpec,
    current: &BTreeSet<String>,
) -> Result<IndexMap<&'s str, &'s TableSpec>, PlanError> {
    check_identifier_lengths(spec)?;

    let mut tables: IndexMap<&str, &TableSpec> = IndexMap::new();
    for table in &spec.tables {
        if tables.insert(table.name.as_str(), table).is_some() {
            return Err(PlanError::DuplicateTable {
                table: table.name.clone(),
            });
        }
    }

    for table in &spec.tables {
        let mut seen = HashSet::new();
        for col in &table.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(PlanError::DuplicateColumn {
                    table: table.name.clone(),
                    column: col.name.clone(),
                });
            }
        }

        for constraint in &table.constraints {
            let constraint_name = constraint.name(&table.name);
            if constraint.columns().is_empty() {
                return Err(PlanError::EmptyConstraint {
                    table: table.name.clone(),
                    constraint: constraint_name,
                });
            }
            for column in constraint.columns() {
                if table.get_column(column).is_none() {
                    return Err(PlanError::UnknownColumn {
                        table: table.name.clone(),
                        constraint: constraint_name,
                        column: column.clone(),
                    });
                }
            }

            let Some(fk) = constraint.as_foreign_key() else {
                continue;
            };

            if fk.columns.len() != fk.references_columns.len() {
                return Err(PlanError::ForeignKeyArity {
                    table: table.name.clone(),
                    constraint: constraint_name,
                    columns: fk.columns.len(),
                    references: fk.references_columns.len(),
                });
            }

            let Some(target) = tables.get(fk.references_table.as_str()) else {
                if current.contains(&fk.references_table) {
                    // Declared elsewhere; its columns are not known here.
                    continue;
                }
                return Err(PlanError::ForeignKeyTargetNotFound {
                    table: table.name.clone(),
                    constraint: constraint_name,
                    target: fk.references_table.clone(),
                });
            };

            let missing: Vec<String> = fk
                .references_columns
                .iter()
                .filter(|c| target.get_column(c).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(PlanError::ForeignKeyColumnsNotFound {
                    table: table.name.clone(),
                    constraint: constraint_name,
                    target: target.name.clone(),
                    columns: missing,
                });
            }

            for (column, target_column) in fk.columns.iter().zip(&fk.references_columns) {
                let (Some(col), Some(target_col)) =
                    (table.get_column(column), target.get_column(target_column))
                else {
                    continue;
                };
                if !col.column_type.is_fk_compatible(&target_col.column_type) {
                    return Err(PlanError::TypeMismatch {
                        table: table.name.clone(),
                        constraint: constraint_name,
                        column: column.clone(),
                        column_type: col.column_type,
                        target: target.name.clone(),
                        target_column: target_column.clone(),
                        target_type: target_col.column_type,
                    });
                }
            }
        }
    }

    Ok(tables)
}

/// Schema, table and column names must fit in a Postgres identifier.
///
/// The server truncates longer names, after which the catalog no longer
/// matches the spec and every run would plan the same tables again.
/// Constraint names are truncated on our side instead.
fn check_identifier_lengths(spec: &SchemaSpec) -> Result<(), PlanError> {
    let check = |name: &str| {
        if name.len() > PG_IDENT_MAX {
            Err(PlanError::IdentifierTooLong {
                name: name.to_string(),
                limit: PG_IDENT_MAX,
            })
        } else {
            Ok(())
        }
    };

    check(&spec.namespace)?;
    for table in &spec.tables {
        check(&table.name)?;
        for col in &table.columns {
            check(&col.name)?;
        }
        for fk in table.foreign_keys() {
            check(&fk.references_table)?;
            for column in &fk.references_columns {
                check(column)?;
            }
        }
    }
    Ok(())
}

/// Topologically order tables by foreign-key dependency.
///
/// Among tables whose dependencies are all placed, the earliest declared goes
/// first. Self-references are not dependencies.
fn order_tables<'s>(
    tables: &IndexMap<&'s str, &'s TableSpec>,
) -> Result<Vec<&'s TableSpec>, PlanError> {
    let deps: Vec<Vec<usize>> = tables
        .values()
        .map(|table| {
            table
                .foreign_keys()
                .filter(|fk| fk.references_table != table.name)
                .filter_map(|fk| tables.get_index_of(fk.references_table.as_str()))
                .collect()
        })
        .collect();

    let mut placed = vec![false; tables.len()];
    let mut ordered = Vec::with_capacity(tables.len());

    while ordered.len() < tables.len() {
        let ready = (0..tables.len())
            .find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));

        match ready {
            Some(i) => {
                placed[i] = true;
                ordered.push(tables[i]);
            }
            None => {
                return Err(PlanError::CyclicDependency {
                    tables: find_cycle(tables, &deps, &placed),
                });
            }
        }
    }

    Ok(ordered)
}

/// Walk unplaced dependencies from the first unplaced table until a table
/// repeats. Every unplaced table has at least one unplaced dependency, so the
/// walk always closes a cycle.
fn find_cycle(tables: &IndexMap<&str, &TableSpec>, deps: &[Vec<usize>], placed: &[bool]) -> Vec<String> {
    let mut path: Vec<usize> = Vec::new();
    let mut current = placed.iter().position(|p| !p);

    while let Some(i) = current {
        if let Some(start) = path.iter().position(|&p| p == i) {
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&p| tables[p].name.clone())
                .collect();
            cycle.push(tables[i].name.clone());
            return cycle;
        }
        path.push(i);
        current = deps[i].iter().copied().find(|&d| !placed[d]);
    }

    path.iter().map(|&p| tables[p].name.clone()).collect()
}
