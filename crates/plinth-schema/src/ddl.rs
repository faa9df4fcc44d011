//! DDL rendering.

use crate::{ColumnSpec, ConstraintSpec, TableSpec};
use plinth_sql::{column_list, qualified, quote_ident};

/// Generate the column definition fragment: `"name" TYPE [NOT NULL] [DEFAULT expr]`.
pub fn column_def_sql(col: &ColumnSpec) -> String {
    let mut def = format!("{} {}", quote_ident(&col.name), col.column_type);
    if !col.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", default));
    }
    def
}

/// Generate the `CONSTRAINT ...` clause for a constraint of `table`.
///
/// Foreign keys reference tables in the same `namespace`.
pub fn constraint_def_sql(namespace: &str, table: &str, constraint: &ConstraintSpec) -> String {
    let name = quote_ident(&constraint.name(table));
    match constraint {
        ConstraintSpec::PrimaryKey { columns, .. } => {
            format!("CONSTRAINT {} PRIMARY KEY ({})", name, column_list(columns))
        }
        ConstraintSpec::Unique { columns, .. } => {
            format!("CONSTRAINT {} UNIQUE ({})", name, column_list(columns))
        }
        ConstraintSpec::ForeignKey(fk) => format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            name,
            column_list(&fk.columns),
            qualified(namespace, &fk.references_table),
            column_list(&fk.references_columns)
        ),
    }
}

/// Generate a `CREATE TABLE IF NOT EXISTS` statement.
///
/// Every constraint in `table.constraints` is rendered inline; callers that
/// need to defer a foreign key remove it from the table first.
pub fn create_table_sql(namespace: &str, table: &TableSpec) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n",
        qualified(namespace, &table.name)
    );

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| format!("    {}", column_def_sql(col)))
        .collect();

    for constraint in &table.constraints {
        parts.push(format!(
            "    {}",
            constraint_def_sql(namespace, &table.name, constraint)
        ));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");

    sql
}

/// Generate an `ALTER TABLE ... ADD CONSTRAINT` statement.
pub fn add_constraint_sql(namespace: &str, table: &str, constraint: &ConstraintSpec) -> String {
    format!(
        "ALTER TABLE {} ADD {};",
        qualified(namespace, table),
        constraint_def_sql(namespace, table, constraint)
    )
}
