//! SQL quoting and naming helpers.
//!
//! Everything that ends up spliced into DDL text goes through here: identifiers
//! are always double-quoted, and generated constraint names follow the
//! Postgres conventions (`{table}_pkey`, `{table}_{cols}_fkey`,
//! `{table}_{cols}_key`), truncated the same way Postgres truncates them.

use std::fmt;

/// Maximum identifier length in bytes (`NAMEDATALEN - 1`).
pub const PG_IDENT_MAX: usize = 63;

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use plinth_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `user`, `order`, `table`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Quote a schema-qualified name: `"schema"."name"`.
///
/// ```
/// assert_eq!(plinth_sql::qualified("public", "user"), "\"public\".\"user\"");
/// ```
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", Ident(schema), Ident(name))
}

/// Quote and join a list of column names: `"a", "b"`.
pub fn column_list(columns: &[impl AsRef<str>]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncate an identifier to [`PG_IDENT_MAX`] bytes without splitting a
/// UTF-8 character.
///
/// Postgres silently truncates longer names, so generated names must be
/// truncated the same way or later catalog lookups will miss them.
pub fn truncate_ident(name: &str) -> String {
    if name.len() <= PG_IDENT_MAX {
        return name.to_string();
    }
    let mut len = PG_IDENT_MAX;
    while len > 0 && !name.is_char_boundary(len) {
        len -= 1;
    }
    name[..len].to_string()
}

/// Default primary key constraint name.
///
/// ```
/// assert_eq!(plinth_sql::primary_key_name("user"), "user_pkey");
/// ```
pub fn primary_key_name(table: &str) -> String {
    truncate_ident(&format!("{}_pkey", table))
}

/// Default foreign key constraint name.
///
/// ```
/// assert_eq!(plinth_sql::foreign_key_name("vote", &["user_id"]), "vote_user_id_fkey");
/// ```
pub fn foreign_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    truncate_ident(&format!("{}_{}_fkey", table, cols.join("_")))
}

/// Default unique constraint name.
///
/// ```
/// assert_eq!(plinth_sql::unique_name("user", &["email"]), "user_email_key");
/// ```
pub fn unique_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    truncate_ident(&format!("{}_{}_key", table, cols.join("_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_reserved_words() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(qualified("my\"schema", "t"), "\"my\"\"schema\".\"t\"");
    }

    #[test]
    fn test_column_list() {
        assert_eq!(column_list(&["a", "b"]), "\"a\", \"b\"");
        assert_eq!(column_list(&[] as &[&str]), "");
    }

    #[test]
    fn test_truncate_ident_ascii() {
        let long = "a".repeat(80);
        assert_eq!(truncate_ident(&long).len(), PG_IDENT_MAX);
        assert_eq!(truncate_ident("short"), "short");
    }

    #[test]
    fn test_truncate_ident_multibyte() {
        // 62 ASCII bytes followed by a 2-byte character straddling the limit
        let name = format!("{}é", "a".repeat(62));
        let truncated = truncate_ident(&name);
        assert_eq!(truncated, "a".repeat(62));
    }

    #[test]
    fn test_generated_names_are_truncated() {
        let table = "similarity_report_with_a_rather_long_name";
        let name = foreign_key_name(table, &["source_article_id", "target_article_id"]);
        assert_eq!(name.len(), PG_IDENT_MAX);
        assert!(name.starts_with("similarity_report_with_a_rather_long_name_source"));
    }

    #[test]
    fn test_composite_names() {
        assert_eq!(
            unique_name("similarity_report", &["source_article_id", "target_article_id"]),
            "similarity_report_source_article_id_target_article_id_key"
        );
    }
}
