//! The built-in schema: the forum's users, articles, votes and article
//! similarity reports.

use plinth_schema::{ColumnSpec, ColumnType, ForeignKeySpec, SchemaSpec, TableSpec};

/// The built-in tables, declared in `namespace`.
pub fn schema(namespace: &str) -> SchemaSpec {
    SchemaSpec::new(namespace)
        .table(user())
        .table(article())
        .table(vote())
        .table(similarity_report())
}

fn user() -> TableSpec {
    TableSpec::new("user")
        .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("firstname", ColumnType::Varchar(50)).not_null())
        .column(ColumnSpec::new("lastname", ColumnType::Varchar(50)))
        .column(ColumnSpec::new("email", ColumnType::Varchar(50)).not_null())
        .column(ColumnSpec::new("login", ColumnType::Varchar(50)))
        .column(ColumnSpec::new("password", ColumnType::Varchar(50)))
        .column(ColumnSpec::new("is_verified", ColumnType::Boolean).not_null())
        .column(ColumnSpec::new("secret_code", ColumnType::Varchar(50)))
        .column(ColumnSpec::new("thumbnail", ColumnType::Varchar(200)).not_null())
        .column(ColumnSpec::new("timestamp", ColumnType::Timestamp).default("current_timestamp"))
        .primary_key(["id"])
}

fn article() -> TableSpec {
    TableSpec::new("article")
        .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("title", ColumnType::Varchar(255)).not_null())
        .column(ColumnSpec::new("created_date", ColumnType::Date).not_null())
        .column(ColumnSpec::new("last_updated_date", ColumnType::Date))
        .column(ColumnSpec::new("domain", ColumnType::Varchar(255)).not_null())
        .column(ColumnSpec::new("author", ColumnType::Varchar(255)).not_null())
        .primary_key(["id"])
}

/// A user's pick between two articles.
fn vote() -> TableSpec {
    TableSpec::new("vote")
        .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("voted_article_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("created_date", ColumnType::Date).not_null())
        .column(ColumnSpec::new("article_a_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("article_b_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("user_id", ColumnType::Uuid).not_null())
        .primary_key(["id"])
        .foreign_key(ForeignKeySpec::new(["user_id"], "user", ["id"]).named("fk_user"))
        .foreign_key(ForeignKeySpec::new(["article_a_id"], "article", ["id"]).named("fk_article1"))
        .foreign_key(ForeignKeySpec::new(["article_b_id"], "article", ["id"]).named("fk_article2"))
}

fn similarity_report() -> TableSpec {
    TableSpec::new("similarity_report")
        .column(ColumnSpec::new("source_article_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("target_article_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("sim_score", ColumnType::Numeric))
        .column(ColumnSpec::new("updated_date", ColumnType::Date))
        // Existing databases already carry this spelling
        .column(ColumnSpec::new("revelant_degree", ColumnType::Varchar(255)))
        .primary_key(["source_article_id", "target_article_id"])
        .foreign_key(
            ForeignKeySpec::new(["source_article_id"], "article", ["id"]).named("fk_article_source"),
        )
        .foreign_key(
            ForeignKeySpec::new(["target_article_id"], "article", ["id"]).named("fk_article_target"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth::MigrationOperation;
    use std::collections::BTreeSet;

    #[test]
    fn test_builtin_schema_plans_in_declaration_order() {
        let ops = plinth::plan(&schema("public"), &BTreeSet::new()).unwrap();
        let order: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                MigrationOperation::CreateTable { table, .. } => table.name.as_str(),
                other => panic!("unexpected operation {}", other),
            })
            .collect();
        assert_eq!(order, vec!["user", "article", "vote", "similarity_report"]);
    }

    #[test]
    fn test_builtin_schema_respects_namespace() {
        let spec = schema("forum");
        assert_eq!(spec.namespace, "forum");
        assert_eq!(spec.tables.len(), 4);
    }

    #[test]
    fn snapshot_vote_ddl() {
        let spec = schema("public");
        let vote = spec.get_table("vote").unwrap();
        insta::assert_snapshot!(plinth_schema::create_table_sql(&spec.namespace, vote), @r#"
CREATE TABLE IF NOT EXISTS "public"."vote" (
    "id" UUID NOT NULL,
    "voted_article_id" UUID NOT NULL,
    "created_date" DATE NOT NULL,
    "article_a_id" UUID NOT NULL,
    "article_b_id" UUID NOT NULL,
    "user_id" UUID NOT NULL,
    CONSTRAINT "vote_pkey" PRIMARY KEY ("id"),
    CONSTRAINT "fk_user" FOREIGN KEY ("user_id") REFERENCES "public"."user" ("id"),
    CONSTRAINT "fk_article1" FOREIGN KEY ("article_a_id") REFERENCES "public"."article" ("id"),
    CONSTRAINT "fk_article2" FOREIGN KEY ("article_b_id") REFERENCES "public"."article" ("id")
);
"#);
    }
}
