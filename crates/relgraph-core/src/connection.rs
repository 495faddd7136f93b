//! Database handle traits.
//!
//! - [`Connection`] executes statements and opens transactions
//! - [`TransactionOps`] executes statements inside a transaction, with savepoints
//! - [`IsolationLevel`] selects how a transaction acquires its locks
//!
//! All operations take an asupersync `Cx` and resolve to an `Outcome` so that
//! cancellation and panics are reported rather than swallowed.

use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Transaction isolation level.
///
/// SQLite serializes writers, so the level only controls when the write lock
/// is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Take locks lazily on first read or write.
    #[default]
    Deferred,
    /// Take the write lock immediately.
    Immediate,
    /// Take an exclusive lock, blocking readers in rollback-journal mode.
    Exclusive,
}

impl IsolationLevel {
    /// The `BEGIN` statement for this level.
    #[must_use]
    pub const fn begin_sql(&self) -> &'static str {
        match self {
            IsolationLevel::Deferred => "BEGIN DEFERRED",
            IsolationLevel::Immediate => "BEGIN IMMEDIATE",
            IsolationLevel::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// A database connection capable of executing parameterized SQL.
///
/// Placeholders are positional `?`. Implementations must be `Send + Sync`.
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM \"author\" WHERE \"_id\" = ?", &[Value::BigInt(1)]).await;
///
/// let tx = conn.begin(&cx).await?;
/// tx.insert(&cx, "INSERT INTO \"author\" (\"name\") VALUES (?)", &[Value::from("Ada")]).await?;
/// tx.commit(&cx).await?;
/// ```
pub trait Connection: Send + Sync {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE, DDL) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Execute an INSERT and return the generated row id.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// Begin a transaction with the default isolation level.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send {
        self.begin_with(cx, IsolationLevel::default())
    }

    /// Begin a transaction with a specific isolation level.
    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;
}

/// Operations available inside an open transaction.
///
/// Transactions must be explicitly committed or rolled back; dropping one
/// without either rolls it back.
///
/// ```rust,ignore
/// let tx = conn.begin(&cx).await?;
/// tx.savepoint(&cx, "element_0").await?;
/// tx.execute(&cx, "INSERT INTO \"book\" (\"title\") VALUES (?)", &[Value::from("Emma")]).await?;
/// tx.rollback_to(&cx, "element_0").await?;
/// tx.commit(&cx).await?;
/// ```
pub trait TransactionOps: Send {
    /// Execute a query within this transaction.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    /// Execute a statement within this transaction.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Execute an INSERT within this transaction and return the generated row id.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// Create a savepoint.
    fn savepoint(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Roll back to a savepoint. The transaction stays open.
    fn rollback_to(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Release a savepoint, folding its changes into the enclosing transaction.
    fn release(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Commit the transaction.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Roll back the transaction.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_default_is_deferred() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::Deferred);
    }

    #[test]
    fn isolation_begin_sql() {
        assert_eq!(IsolationLevel::Deferred.begin_sql(), "BEGIN DEFERRED");
        assert_eq!(IsolationLevel::Immediate.begin_sql(), "BEGIN IMMEDIATE");
        assert_eq!(IsolationLevel::Exclusive.begin_sql(), "BEGIN EXCLUSIVE");
    }
}
