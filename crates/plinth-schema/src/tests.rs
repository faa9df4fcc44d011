use super::*;

fn user_table() -> TableSpec {
    TableSpec::new("user")
        .column(ColumnSpec::new("id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("email", ColumnType::Varchar(50)).not_null())
        .column(ColumnSpec::new("lastname", ColumnType::Varchar(50)))
        .column(ColumnSpec::new("timestamp", ColumnType::Timestamp).default("current_timestamp"))
        .primary_key(["id"])
        .unique(["email"])
}

#[test]
fn test_column_def_sql() {
    let col = ColumnSpec::new("is_verified", ColumnType::Boolean).not_null();
    assert_eq!(column_def_sql(&col), "\"is_verified\" BOOLEAN NOT NULL");

    let col = ColumnSpec::new("sim_score", ColumnType::Numeric);
    assert_eq!(column_def_sql(&col), "\"sim_score\" NUMERIC");

    let col = ColumnSpec::new("created", ColumnType::Timestamptz)
        .not_null()
        .default("now()");
    assert_eq!(
        column_def_sql(&col),
        "\"created\" TIMESTAMPTZ NOT NULL DEFAULT now()"
    );
}

#[test]
fn test_default_constraint_names() {
    let table = user_table();
    let names: Vec<String> = table.constraints.iter().map(|c| c.name("user")).collect();
    assert_eq!(names, vec!["user_pkey", "user_email_key"]);

    let fk = ConstraintSpec::ForeignKey(ForeignKeySpec::new(["user_id"], "user", ["id"]));
    assert_eq!(fk.name("vote"), "vote_user_id_fkey");

    let named = ConstraintSpec::ForeignKey(
        ForeignKeySpec::new(["user_id"], "user", ["id"]).named("fk_user"),
    );
    assert_eq!(named.name("vote"), "fk_user");
}

#[test]
fn test_fk_compatibility() {
    assert!(ColumnType::Uuid.is_fk_compatible(&ColumnType::Uuid));
    assert!(ColumnType::Varchar(50).is_fk_compatible(&ColumnType::Varchar(255)));
    assert!(!ColumnType::Integer.is_fk_compatible(&ColumnType::Uuid));
    assert!(!ColumnType::Integer.is_fk_compatible(&ColumnType::BigInt));
    assert!(!ColumnType::Text.is_fk_compatible(&ColumnType::Varchar(10)));
}

#[test]
fn test_lookup_helpers() {
    let spec = SchemaSpec::default().table(user_table());
    assert_eq!(spec.namespace, "public");
    assert!(spec.get_table("user").is_some());
    assert!(spec.get_table("article").is_none());

    let table = spec.get_table("user").unwrap();
    assert_eq!(
        table.get_column("email").map(|c| c.column_type),
        Some(ColumnType::Varchar(50))
    );
    assert_eq!(table.foreign_keys().count(), 0);
}

#[test]
fn snapshot_create_table() {
    insta::assert_snapshot!(create_table_sql("public", &user_table()), @r#"
CREATE TABLE IF NOT EXISTS "public"."user" (
    "id" UUID NOT NULL,
    "email" VARCHAR(50) NOT NULL,
    "lastname" VARCHAR(50),
    "timestamp" TIMESTAMP DEFAULT current_timestamp,
    CONSTRAINT "user_pkey" PRIMARY KEY ("id"),
    CONSTRAINT "user_email_key" UNIQUE ("email")
);
"#);
}

#[test]
fn snapshot_create_table_with_foreign_keys() {
    let table = TableSpec::new("similarity_report")
        .column(ColumnSpec::new("source_article_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("target_article_id", ColumnType::Uuid).not_null())
        .column(ColumnSpec::new("sim_score", ColumnType::Numeric))
        .primary_key(["source_article_id", "target_article_id"])
        .foreign_key(
            ForeignKeySpec::new(["source_article_id"], "article", ["id"])
                .named("fk_article_source"),
        );

    insta::assert_snapshot!(create_table_sql("topdup", &table), @r#"
CREATE TABLE IF NOT EXISTS "topdup"."similarity_report" (
    "source_article_id" UUID NOT NULL,
    "target_article_id" UUID NOT NULL,
    "sim_score" NUMERIC,
    CONSTRAINT "similarity_report_pkey" PRIMARY KEY ("source_article_id", "target_article_id"),
    CONSTRAINT "fk_article_source" FOREIGN KEY ("source_article_id") REFERENCES "topdup"."article" ("id")
);
"#);
}

#[test]
fn test_add_constraint_sql() {
    let fk = ConstraintSpec::ForeignKey(ForeignKeySpec::new(["user_id"], "user", ["id"]));
    assert_eq!(
        add_constraint_sql("public", "vote", &fk),
        "ALTER TABLE \"public\".\"vote\" ADD CONSTRAINT \"vote_user_id_fkey\" \
         FOREIGN KEY (\"user_id\") REFERENCES \"public\".\"user\" (\"id\");"
    );
}
