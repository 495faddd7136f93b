//! Statement execution over either a connection or an open transaction.
//!
//! Graph walks issue reads and writes through [`Executor`] so the same code
//! serves plain finds (connection) and writes (transaction).

use relgraph_core::{Connection, Cx, Error, Outcome, Row, TransactionOps};
use relgraph_query::Statement;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the recursive graph walks.
pub(crate) type GraphFuture<'a, T> = Pin<Box<dyn Future<Output = Outcome<T, Error>> + 'a>>;

pub(crate) trait Executor {
    fn query(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<Vec<Row>, Error>>;

    fn execute(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<u64, Error>>;

    fn insert(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<i64, Error>>;
}

pub(crate) struct ConnExecutor<'a, C>(pub &'a C);

impl<C: Connection> Executor for ConnExecutor<'_, C> {
    fn query(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<Vec<Row>, Error>> {
        tracing::trace!(sql = %stmt.sql, "query");
        self.0.query(cx, &stmt.sql, &stmt.params)
    }

    fn execute(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<u64, Error>> {
        tracing::trace!(sql = %stmt.sql, "execute");
        self.0.execute(cx, &stmt.sql, &stmt.params)
    }

    fn insert(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<i64, Error>> {
        tracing::trace!(sql = %stmt.sql, "insert");
        self.0.insert(cx, &stmt.sql, &stmt.params)
    }
}

pub(crate) struct TxExecutor<'a, T>(pub &'a T);

impl<T: TransactionOps> Executor for TxExecutor<'_, T> {
    fn query(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<Vec<Row>, Error>> {
        tracing::trace!(sql = %stmt.sql, "query");
        self.0.query(cx, &stmt.sql, &stmt.params)
    }

    fn execute(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<u64, Error>> {
        tracing::trace!(sql = %stmt.sql, "execute");
        self.0.execute(cx, &stmt.sql, &stmt.params)
    }

    fn insert(&self, cx: &Cx, stmt: &Statement) -> impl Future<Output = Outcome<i64, Error>> {
        tracing::trace!(sql = %stmt.sql, "insert");
        self.0.insert(cx, &stmt.sql, &stmt.params)
    }
}

/// Commit on success; roll back on error, cancellation or panic.
pub(crate) async fn finish<Tx: TransactionOps, T>(
    cx: &Cx,
    tx: Tx,
    outcome: Outcome<T, Error>,
) -> Outcome<T, Error> {
    match outcome {
        Outcome::Ok(value) => match tx.commit(cx).await {
            Outcome::Ok(()) => Outcome::Ok(value),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        },
        failed => {
            if let Outcome::Err(err) = tx.rollback(cx).await {
                tracing::warn!(error = %err, "Rollback failed");
            }
            failed
        }
    }
}
