//! SELECT and COUNT statements.
//!
//! Where, order and group clauses are raw SQL fragments; they are
//! concatenated as given and not validated.

use crate::statement::Statement;
use relgraph_core::{EntityModel, LinkTable, Result, Value, quote_ident};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Filtering, ordering and paging of a find.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Raw WHERE clause, without the keyword
    pub where_clause: Option<String>,
    /// Arguments bound to the `?` placeholders of the WHERE clause
    pub args: Vec<Value>,
    /// Raw ORDER BY clause, without the keyword
    pub order_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with a raw WHERE clause and its arguments.
    pub fn filter(
        mut self,
        clause: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args.into_iter().collect();
        self
    }

    /// Order by a raw ORDER BY clause.
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_sql(&self) -> Option<&str> {
        self.where_clause
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }
}

/// Raw table query bypassing object mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    /// Selected column expressions; empty selects `*`
    pub columns: Vec<String>,
    pub where_clause: Option<String>,
    pub args: Vec<Value>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(
        mut self,
        clause: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args.into_iter().collect();
        self
    }

    pub fn group_by(mut self, clause: impl Into<String>) -> Self {
        self.group_by = Some(clause.into());
        self
    }

    pub fn having(mut self, clause: impl Into<String>) -> Self {
        self.having = Some(clause.into());
        self
    }

    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn push_paging(sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
    match (limit, offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {}
    }
}

/// `SELECT * FROM "t" [WHERE ...] [ORDER BY ...] [LIMIT n [OFFSET m]]`.
pub fn select(table: &str, options: &FindOptions) -> Statement {
    let mut sql = format!("SELECT * FROM {}", quote_ident(table));
    if let Some(clause) = options.where_sql() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    if let Some(order) = options.order_by.as_deref().filter(|o| !o.trim().is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    push_paging(&mut sql, options.limit, options.offset);
    Statement::new(sql).bind_all(options.args.iter().cloned())
}

/// `SELECT COUNT(*) FROM "t" [WHERE ...]`.
pub fn count(table: &str, options: &FindOptions) -> Statement {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    if let Some(clause) = options.where_sql() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    Statement::new(sql).bind_all(options.args.iter().cloned())
}

/// Derive a by-example predicate from `instance`.
///
/// Every field whose value is not the default of its type contributes an
/// equality test; the tests are joined with `AND`. No such field yields an
/// empty clause.
pub fn sample_where(model: &EntityModel, instance: &dyn Any) -> Result<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for field in model.fields() {
        let value = field.access.read(instance)?;
        if value.is_default() {
            continue;
        }
        clauses.push(format!("{} = ?", quote_ident(&field.column.name)));
        args.push(value);
    }
    Ok((clauses.join(" AND "), args))
}

/// `FindOptions` filtering on the non-default fields of `instance`.
pub fn sample_options(model: &EntityModel, instance: &dyn Any) -> Result<FindOptions> {
    let (clause, args) = sample_where(model, instance)?;
    Ok(if clause.is_empty() {
        FindOptions::new()
    } else {
        FindOptions::new().filter(clause, args)
    })
}

/// Rows of a contained table owned by `parent_key`.
pub fn select_children(table: &str, through_column: &str, parent_key: Value) -> Statement {
    Statement::new(format!(
        "SELECT * FROM {} WHERE {} = ?",
        quote_ident(table),
        quote_ident(through_column)
    ))
    .bind(parent_key)
}

/// Keys of the rows of a contained table owned by `parent_key`.
pub fn select_child_keys(
    table: &str,
    key_column: &str,
    through_column: &str,
    parent_key: Value,
) -> Statement {
    Statement::new(format!(
        "SELECT {} FROM {} WHERE {} = ?",
        quote_ident(key_column),
        quote_ident(table),
        quote_ident(through_column)
    ))
    .bind(parent_key)
}

/// Rows of `table` linked to `local_key` through a join table.
pub fn select_linked(
    table: &str,
    key_column: &str,
    link: &LinkTable,
    local_key: Value,
) -> Statement {
    Statement::new(format!(
        "SELECT t.* FROM {} AS t JOIN {} AS l ON t.{} = l.{} WHERE l.{} = ?",
        quote_ident(table),
        quote_ident(&link.table_name),
        quote_ident(key_column),
        quote_ident(&link.remote_column),
        quote_ident(&link.local_column)
    ))
    .bind(local_key)
}

/// Does a row with this key exist?
pub fn key_exists(table: &str, key_column: &str, key: Value) -> Statement {
    Statement::new(format!(
        "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
        quote_ident(table),
        quote_ident(key_column)
    ))
    .bind(key)
}

/// Every key of a table.
pub fn select_keys(table: &str, key_column: &str) -> Statement {
    Statement::new(format!(
        "SELECT {} FROM {}",
        quote_ident(key_column),
        quote_ident(table)
    ))
}

/// Render a raw [`TableQuery`].
pub fn query_table(query: &TableQuery) -> Statement {
    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query.columns.join(", ")
    };
    let mut sql = format!("SELECT {columns} FROM {}", quote_ident(&query.table));
    let clauses = [
        (" WHERE ", &query.where_clause),
        (" GROUP BY ", &query.group_by),
        (" HAVING ", &query.having),
        (" ORDER BY ", &query.order_by),
    ];
    for (keyword, clause) in clauses {
        if let Some(clause) = clause.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push_str(keyword);
            sql.push_str(clause);
        }
    }
    push_paging(&mut sql, query.limit, None);
    Statement::new(sql).bind_all(query.args.iter().cloned())
}
