//! Graph persistence engine for relgraph.
//!
//! A [`Session`] stores, loads and deletes whole object graphs: an entity
//! together with its has-many children and its many-to-many partners.
//!
//! - **Writes** run inside one transaction per call; commit on success,
//!   rollback on error, cancellation or panic.
//! - **Reads** run on the connection and eagerly load every declared list,
//!   one query per instance and relation.
//! - **Type erasure**: the walks operate on `dyn Any` instances through the
//!   accessor tables held by the [`Registry`].
//!
//! ```ignore
//! let session = Session::new(conn, Arc::new(registry));
//! session.create_tables(&cx).await?;
//!
//! let mut author = Author { name: "Ada".into(), books: vec![book], ..Default::default() };
//! let id = session.store(&cx, &mut author).await?;
//!
//! let again: Option<Author> = session.find_by_key(&cx, id).await?;
//! ```

macro_rules! try_outcome {
    ($e:expr) => {
        match $e {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    };
}

macro_rules! try_result {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Outcome::Err(e),
        }
    };
}

pub mod config;
mod executor;
mod load;
mod persist;

pub use config::{DeletePolicy, SessionConfig};
pub use relgraph_query::{FindOptions, TableQuery};

use executor::{ConnExecutor, Executor};
use relgraph_core::{Connection, Cx, Entity, Error, Outcome, Registry, Row, Value};
use relgraph_query::{create_link_table, create_table, delete_all, query_table};
use std::sync::Arc;

/// Per-element report from a batch store.
#[derive(Debug)]
pub struct StoreProgress<'a> {
    /// Position of the element in the batch.
    pub index: usize,
    pub total: usize,
    /// Key of the stored element.
    pub key: Option<&'a Value>,
    /// Why the element was not stored.
    pub error: Option<&'a Error>,
}

impl StoreProgress<'_> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback receiving one [`StoreProgress`] after each element of a batch.
pub type ProgressListener<'l> = &'l mut dyn FnMut(&StoreProgress<'_>);

/// Stores and loads object graphs over a [`Connection`].
pub struct Session<C: Connection> {
    connection: C,
    registry: Arc<Registry>,
    config: SessionConfig,
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Session<C> {
    /// A session with the default configuration.
    pub fn new(connection: C, registry: Arc<Registry>) -> Self {
        Self::with_config(connection, registry, SessionConfig::default())
    }

    pub fn with_config(connection: C, registry: Arc<Registry>, config: SessionConfig) -> Self {
        Self {
            connection,
            registry,
            config,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give the connection back.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Create every registered table and join table that does not exist yet.
    ///
    /// Returns the number of statements executed.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn create_tables(&self, cx: &Cx) -> Outcome<usize, Error> {
        let mut statements = Vec::new();
        for model in self.registry.models() {
            let contained_in = self.registry.contained_in_of(model.entity_type_id());
            statements.push(create_table(model.object_type(), &contained_in));
        }
        for spec in self.registry.all_many_to_many() {
            statements.push(create_link_table(&spec));
        }

        for sql in &statements {
            tracing::debug!(sql = %sql, "Creating table");
            try_outcome!(self.connection.execute(cx, sql, &[]).await);
        }
        tracing::info!(count = statements.len(), "Schema created");
        Outcome::Ok(statements.len())
    }

    /// Delete every row of `T`'s table. Related tables are untouched.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn truncate<T: Entity>(&self, cx: &Cx) -> Outcome<u64, Error> {
        let model = try_result!(self.registry.model::<T>());
        let stmt = delete_all(model.table_name());
        let exec = ConnExecutor(&self.connection);
        exec.execute(cx, &stmt).await
    }

    /// Run raw SQL and return its rows. The text is passed through unchecked.
    pub async fn raw_query(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<Vec<Row>, Error> {
        tracing::debug!(sql = %sql, "Raw query");
        self.connection.query(cx, sql, args).await
    }

    /// Run a [`TableQuery`] and return its rows.
    pub async fn query_table(&self, cx: &Cx, query: &TableQuery) -> Outcome<Vec<Row>, Error> {
        let stmt = query_table(query);
        tracing::debug!(sql = %stmt.sql, "Table query");
        self.connection.query(cx, &stmt.sql, &stmt.params).await
    }
}

#[cfg(test)]
pub(crate) mod mock;
