//! SQL identifier quoting, validation and column naming.

use crate::error::{ConfigErrorKind, Error, Result};
use heck::ToSnakeCase;
use regex::Regex;
use std::sync::OnceLock;

/// Reserved column name of the primary key.
pub const PRIMARY_KEY_COLUMN: &str = "_id";

/// Suffix appended to a table name to form a foreign-key column name.
pub const FOREIGN_KEY_SUFFIX: &str = "_id";

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// ```
/// use relgraph_core::quote_ident;
///
/// assert_eq!(quote_ident("author"), "\"author\"");
/// assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("identifier regex: {e}"))
    })
}

/// Is `name` a plain SQL identifier (letters, digits, underscore; no leading digit)?
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Reject table and forced column names that are not plain identifiers.
pub fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::InvalidIdentifier,
            format!("{what} name {name:?} is not a valid SQL identifier"),
        ))
    }
}

/// Derive a column name from a declared field name.
///
/// camelCase is converted to snake_case; leading underscores are kept so
/// that `_id` stays `_id`.
///
/// ```
/// use relgraph_core::column_name_for;
///
/// assert_eq!(column_name_for("firstName"), "first_name");
/// assert_eq!(column_name_for("_id"), "_id");
/// ```
pub fn column_name_for(field: &str) -> String {
    let trimmed = field.trim_start_matches('_');
    let prefix = &field[..field.len() - trimmed.len()];
    format!("{prefix}{}", trimmed.to_snake_case())
}

/// Foreign-key column name referencing `table`.
pub fn foreign_key_column(table: &str) -> String {
    format!("{table}{FOREIGN_KEY_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_simple_and_escaped() {
        assert_eq!(quote_ident("book"), "\"book\"");
        assert_eq!(quote_ident("select"), "\"select\"");
        assert_eq!(quote_ident("a\"b\"c"), "\"a\"\"b\"\"c\"");
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("author"));
        assert!(is_valid_identifier("_id"));
        assert!(is_valid_identifier("author_book2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("drop table;"));

        let err = validate_identifier("a-b", "table").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidIdentifier));
    }

    #[test]
    fn camel_case_to_snake_case() {
        assert_eq!(column_name_for("firstName"), "first_name");
        assert_eq!(column_name_for("title"), "title");
        assert_eq!(column_name_for("already_snake"), "already_snake");
        assert_eq!(column_name_for("_id"), "_id");
        assert_eq!(column_name_for("__internalFlag"), "__internal_flag");
    }

    #[test]
    fn foreign_key_naming() {
        assert_eq!(foreign_key_column("author"), "author_id");
    }
}
