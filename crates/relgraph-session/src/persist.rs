//! Storing and deleting object graphs.

use crate::config::DeletePolicy;
use crate::executor::{Executor, GraphFuture, TxExecutor, finish};
use crate::{ProgressListener, Session, StoreProgress};
use relgraph_core::{
    ConfigErrorKind, Connection, Cx, Entity, EntityModel, Error, Outcome, TransactionOps, Value,
};
use relgraph_query::{dml, select};
use std::any::Any;
use std::sync::Arc;

async fn row_exists<E: Executor>(
    cx: &Cx,
    exec: &E,
    model: &EntityModel,
    key: Value,
) -> Outcome<bool, Error> {
    let key_column = &try_result!(model.require_primary_key()).column.name;
    let stmt = select::key_exists(model.table_name(), key_column, key);
    let rows = try_outcome!(exec.query(cx, &stmt).await);
    Outcome::Ok(!rows.is_empty())
}

fn assigned_key(instance: &dyn Any, model: &EntityModel) -> Result<Option<Value>, Error> {
    Ok(model.key_of(instance)?.filter(|k| !k.is_default()))
}

impl<C: Connection> Session<C> {
    /// Store `instance` and everything reachable from its relation lists.
    ///
    /// Inserts the row, or updates it when the key is set and the row
    /// exists. A generated key is written back onto the instance. Returns
    /// the key, or `Value::Null` for a type without one.
    #[tracing::instrument(level = "debug", skip(self, cx, instance))]
    pub async fn store<T: Entity>(&self, cx: &Cx, instance: &mut T) -> Outcome<Value, Error> {
        let model = try_result!(self.registry.model::<T>());
        let tx = try_outcome!(self.connection.begin_with(cx, self.config.isolation).await);
        let exec = TxExecutor(&tx);
        let outcome = self.store_graph(cx, &exec, model, instance, Vec::new()).await;
        finish(cx, tx, outcome).await
    }

    /// [`Session::store`] for an optional instance; `None` stores nothing.
    pub async fn store_opt<T: Entity>(
        &self,
        cx: &Cx,
        instance: Option<&mut T>,
    ) -> Outcome<Option<Value>, Error> {
        match instance {
            Some(instance) => match self.store(cx, instance).await {
                Outcome::Ok(key) => Outcome::Ok(Some(key)),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            None => Outcome::Ok(None),
        }
    }

    /// Store each element, skipping the ones that fail.
    ///
    /// The batch shares one transaction; each element runs under its own
    /// savepoint so a failure only undoes that element. Failures are
    /// reported to `listener` and logged. Returns how many were stored.
    #[tracing::instrument(level = "debug", skip(self, cx, items, listener), fields(count = items.len()))]
    pub async fn store_collection<T: Entity>(
        &self,
        cx: &Cx,
        items: &mut [T],
        listener: Option<ProgressListener<'_>>,
    ) -> Outcome<usize, Error> {
        let model = try_result!(self.registry.model::<T>());
        let tx = try_outcome!(self.connection.begin_with(cx, self.config.isolation).await);
        let outcome = self.store_each(cx, &tx, &model, items, listener).await;
        finish(cx, tx, outcome).await
    }

    async fn store_each<Tx: TransactionOps, T: Entity>(
        &self,
        cx: &Cx,
        tx: &Tx,
        model: &Arc<EntityModel>,
        items: &mut [T],
        mut listener: Option<ProgressListener<'_>>,
    ) -> Outcome<usize, Error> {
        let exec = TxExecutor(tx);
        let total = items.len();
        let mut stored = 0;

        for (index, item) in items.iter_mut().enumerate() {
            let savepoint = format!("element_{index}");
            try_outcome!(tx.savepoint(cx, &savepoint).await);

            match self
                .store_graph(cx, &exec, Arc::clone(model), item, Vec::new())
                .await
            {
                Outcome::Ok(key) => {
                    try_outcome!(tx.release(cx, &savepoint).await);
                    stored += 1;
                    if let Some(listener) = listener.as_deref_mut() {
                        listener(&StoreProgress {
                            index,
                            total,
                            key: Some(&key),
                            error: None,
                        });
                    }
                }
                Outcome::Err(err) => {
                    tracing::warn!(index, error = %err, "Skipping element that failed to store");
                    try_outcome!(tx.rollback_to(cx, &savepoint).await);
                    try_outcome!(tx.release(cx, &savepoint).await);
                    if let Some(listener) = listener.as_deref_mut() {
                        listener(&StoreProgress {
                            index,
                            total,
                            key: None,
                            error: Some(&err),
                        });
                    }
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        tracing::info!(stored, total, "Stored collection");
        Outcome::Ok(stored)
    }

    /// Make the persisted rows of `T` exactly `items`.
    ///
    /// Elements whose key matches a row are updated, the rest inserted, and
    /// rows whose key is absent from `items` deleted together with their
    /// join rows. All or nothing. Requires a primary key.
    #[tracing::instrument(level = "debug", skip(self, cx, items, listener), fields(count = items.len()))]
    pub async fn store_unique_collection<T: Entity>(
        &self,
        cx: &Cx,
        items: &mut [T],
        listener: Option<ProgressListener<'_>>,
    ) -> Outcome<usize, Error> {
        let model = try_result!(self.registry.model::<T>());
        try_result!(model.require_primary_key());
        let tx = try_outcome!(self.connection.begin_with(cx, self.config.isolation).await);
        let outcome = self.replace_all(cx, &tx, &model, items, listener).await;
        finish(cx, tx, outcome).await
    }

    async fn replace_all<Tx: TransactionOps, T: Entity>(
        &self,
        cx: &Cx,
        tx: &Tx,
        model: &Arc<EntityModel>,
        items: &mut [T],
        mut listener: Option<ProgressListener<'_>>,
    ) -> Outcome<usize, Error> {
        let exec = TxExecutor(tx);
        let key_column = &try_result!(model.require_primary_key()).column.name;
        let stmt = select::select_keys(model.table_name(), key_column);
        let persisted: Vec<Value> = try_outcome!(exec.query(cx, &stmt).await)
            .iter()
            .filter_map(|row| row.get(0))
            .map(Value::normalized_key)
            .collect();

        let total = items.len();
        let mut kept = Vec::with_capacity(total);
        for (index, item) in items.iter_mut().enumerate() {
            let key = try_outcome!(
                self.store_graph(cx, &exec, Arc::clone(model), item, Vec::new())
                    .await
            );
            if let Some(listener) = listener.as_deref_mut() {
                listener(&StoreProgress {
                    index,
                    total,
                    key: Some(&key),
                    error: None,
                });
            }
            kept.push(key.normalized_key());
        }

        let mut removed = 0;
        for key in persisted.into_iter().filter(|k| !kept.contains(k)) {
            removed += try_outcome!(self.delete_graph(cx, &exec, Arc::clone(model), key).await);
        }

        tracing::info!(stored = total, removed, table = %model.table_name(), "Replaced collection");
        Outcome::Ok(total)
    }

    /// Delete the row of `instance` and its join rows.
    ///
    /// Has-many children follow the session's [`DeletePolicy`]. An instance
    /// whose key is unset deletes nothing. Returns the rows removed from
    /// `T`'s table.
    #[tracing::instrument(level = "debug", skip(self, cx, instance))]
    pub async fn delete<T: Entity>(&self, cx: &Cx, instance: &T) -> Outcome<u64, Error> {
        let model = try_result!(self.registry.model::<T>());
        try_result!(model.require_primary_key());
        let Some(key) = try_result!(assigned_key(instance, &model)) else {
            tracing::warn!(table = %model.table_name(), "Delete skipped: key is unset");
            return Outcome::Ok(0);
        };

        let tx = try_outcome!(self.connection.begin_with(cx, self.config.isolation).await);
        let exec = TxExecutor(&tx);
        let outcome = self.delete_graph(cx, &exec, model, key).await;
        finish(cx, tx, outcome).await
    }

    pub(crate) fn store_graph<'a, E: Executor + 'a>(
        &'a self,
        cx: &'a Cx,
        exec: &'a E,
        model: Arc<EntityModel>,
        instance: &'a mut dyn Any,
        extra: Vec<(String, Value)>,
    ) -> GraphFuture<'a, Value> {
        Box::pin(async move {
            let key = try_result!(assigned_key(&*instance, &model));
            let persisted = match &key {
                Some(key) => try_outcome!(row_exists(cx, exec, &model, key.clone()).await),
                None => false,
            };
            self.store_row(cx, exec, model, instance, extra, key, persisted)
                .await
        })
    }

    /// Write one row whose existence is already known, then its lists.
    #[allow(clippy::too_many_arguments)]
    fn store_row<'a, E: Executor + 'a>(
        &'a self,
        cx: &'a Cx,
        exec: &'a E,
        model: Arc<EntityModel>,
        instance: &'a mut dyn Any,
        extra: Vec<(String, Value)>,
        key: Option<Value>,
        persisted: bool,
    ) -> GraphFuture<'a, Value> {
        Box::pin(async move {
            if persisted {
                let stmt = try_result!(dml::update(&model, &*instance, &extra));
                try_outcome!(exec.execute(cx, &stmt).await);
            } else {
                let stmt = try_result!(dml::insert(&model, &*instance, &extra));
                let rowid = try_outcome!(exec.insert(cx, &stmt).await);
                if let Some(pk) = model.primary_key() {
                    if key.is_none() && pk.column.auto_increment {
                        try_result!(pk.access.write(&mut *instance, &Value::BigInt(rowid)));
                    }
                }
            }
            tracing::trace!(table = %model.table_name(), updated = persisted, "Stored row");

            let key = try_result!(model.key_of(&*instance)).unwrap_or(Value::Null);

            for list in model.has_many() {
                let len = try_result!(list.len(&*instance));
                if len == 0 {
                    continue;
                }
                try_result!(model.require_primary_key());
                let target = list.target().entity_type_id();
                let spec = try_result!(self.registry.has_many_spec(model.entity_type_id(), target));
                let child_model = try_result!(self.registry.lookup(target));

                for index in 0..len {
                    let element = try_result!(list.element_mut(&mut *instance, index));
                    let extra = match spec.through_field.and_then(|f| child_model.field_named(f)) {
                        Some(through) => {
                            try_result!(through.access.write(&mut *element, &key));
                            Vec::new()
                        }
                        None => vec![(spec.through_column.clone(), key.clone())],
                    };
                    try_outcome!(
                        self.store_graph(cx, exec, Arc::clone(&child_model), element, extra)
                            .await
                    );
                }
            }

            for list in model.many_to_many() {
                let len = try_result!(list.len(&*instance));
                if len == 0 {
                    continue;
                }
                try_result!(model.require_primary_key());
                let target = list.target().entity_type_id();
                let spec = try_result!(self.registry.many_to_many_spec(model.entity_type_id(), target));
                let Some(link) = spec.link_table_for(model.entity_type_id()) else {
                    return Outcome::Err(Error::config(
                        ConfigErrorKind::UnknownRelation,
                        format!("{} is not part of {}", model.type_name(), spec.join_table()),
                    ));
                };
                let child_model = try_result!(self.registry.lookup(target));
                try_result!(child_model.require_primary_key());

                for index in 0..len {
                    let element = try_result!(list.element_mut(&mut *instance, index));
                    let child_key = try_result!(assigned_key(&*element, &child_model));
                    let stored = match &child_key {
                        Some(k) => try_outcome!(row_exists(cx, exec, &child_model, k.clone()).await),
                        None => false,
                    };
                    let child_key = match child_key {
                        Some(child_key) if stored => child_key,
                        child_key => try_outcome!(
                            self.store_row(
                                cx,
                                exec,
                                Arc::clone(&child_model),
                                element,
                                Vec::new(),
                                child_key,
                                false,
                            )
                            .await
                        ),
                    };
                    let stmt = dml::link_insert(&link, key.clone(), child_key);
                    try_outcome!(exec.execute(cx, &stmt).await);
                }
            }

            Outcome::Ok(key)
        })
    }

    pub(crate) fn delete_graph<'a, E: Executor + 'a>(
        &'a self,
        cx: &'a Cx,
        exec: &'a E,
        model: Arc<EntityModel>,
        key: Value,
    ) -> GraphFuture<'a, u64> {
        Box::pin(async move {
            for spec in self.registry.many_to_many_of(model.entity_type_id()) {
                if let Some(link) = spec.link_table_for(model.entity_type_id()) {
                    let stmt = dml::unlink_all(&link, key.clone());
                    try_outcome!(exec.execute(cx, &stmt).await);
                }
            }

            if self.config.delete_policy == DeletePolicy::Cascade {
                for spec in self.registry.has_many_of(model.entity_type_id()) {
                    let child_model = try_result!(self.registry.lookup(spec.contained.entity_type_id()));
                    let Some(child_pk) = child_model.primary_key() else {
                        let stmt = dml::delete_children(
                            child_model.table_name(),
                            &spec.through_column,
                            key.clone(),
                        );
                        try_outcome!(exec.execute(cx, &stmt).await);
                        continue;
                    };
                    let stmt = select::select_child_keys(
                        child_model.table_name(),
                        &child_pk.column.name,
                        &spec.through_column,
                        key.clone(),
                    );
                    let rows = try_outcome!(exec.query(cx, &stmt).await);
                    for child_key in rows.iter().filter_map(|row| row.get(0)) {
                        try_outcome!(
                            self.delete_graph(cx, exec, Arc::clone(&child_model), child_key.clone())
                                .await
                        );
                    }
                }
            }

            let stmt = try_result!(dml::delete_by_key(&model, key));
            let removed = try_outcome!(exec.execute(cx, &stmt).await);
            tracing::trace!(table = %model.table_name(), removed, "Deleted row");
            Outcome::Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::{
        Author, Book, MockConnection, Node, block_on, registry, row, tag, unwrap_outcome,
    };
    use crate::{DeletePolicy, Session, SessionConfig, StoreProgress};
    use relgraph_core::{Cx, Outcome, Value};

    #[test]
    fn store_writes_the_graph_in_one_transaction() {
        let session = Session::new(MockConnection::new(), registry());
        let cx = Cx::for_testing();
        let mut author = Author {
            name: "Ada".into(),
            books: vec![
                Book {
                    title: "Notes".into(),
                    ..Book::default()
                },
                Book {
                    title: "Letters".into(),
                    ..Book::default()
                },
            ],
            tags: vec![tag("math")],
            ..Author::default()
        };

        let key = block_on(async { unwrap_outcome(session.store(&cx, &mut author).await) });

        assert_eq!(key, Value::BigInt(1));
        assert_eq!(author.id, 1);
        assert_eq!(author.books[0].id, 2);
        assert_eq!(author.books[1].id, 3);
        assert_eq!(
            session.connection().statements(),
            vec![
                "BEGIN DEFERRED",
                "INSERT INTO \"author\" (\"name\") VALUES (?)",
                "INSERT INTO \"book\" (\"title\", \"author_id\") VALUES (?, ?)",
                "INSERT INTO \"book\" (\"title\", \"author_id\") VALUES (?, ?)",
                "SELECT 1 FROM \"tag\" WHERE \"_id\" = ? LIMIT 1",
                "INSERT INTO \"tag\" (\"_id\") VALUES (?)",
                "INSERT OR IGNORE INTO \"author_tag\" (\"author_id\", \"tag_id\") VALUES (?, ?)",
                "COMMIT",
            ]
        );
        for params in session.connection().params_of("INSERT INTO \"book\"") {
            assert_eq!(params[1], Value::BigInt(1));
        }
        assert_eq!(
            session.connection().params_of("INSERT OR IGNORE")[0],
            vec![Value::BigInt(1), Value::Text("math".into())]
        );
    }

    #[test]
    fn stored_partner_is_linked_without_rewriting() {
        let conn = MockConnection::new().script(vec![row(&["1"], vec![Value::BigInt(1)])]);
        let session = Session::new(conn, registry());
        let cx = Cx::for_testing();
        let mut author = Author {
            name: "Ada".into(),
            tags: vec![tag("math")],
            ..Author::default()
        };

        block_on(async { unwrap_outcome(session.store(&cx, &mut author).await) });

        let statements = session.connection().statements();
        assert!(!statements.iter().any(|s| s.starts_with("INSERT INTO \"tag\"")));
        assert!(statements.iter().any(|s| s.starts_with("INSERT OR IGNORE")));
    }

    #[test]
    fn existing_row_is_updated() {
        let conn = MockConnection::new().script(vec![row(&["1"], vec![Value::BigInt(1)])]);
        let session = Session::new(conn, registry());
        let cx = Cx::for_testing();
        let mut author = Author {
            id: 5,
            name: "Ada".into(),
            ..Author::default()
        };

        let key = block_on(async { unwrap_outcome(session.store(&cx, &mut author).await) });

        assert_eq!(key, Value::BigInt(5));
        assert_eq!(
            session.connection().statements(),
            vec![
                "BEGIN DEFERRED",
                "SELECT 1 FROM \"author\" WHERE \"_id\" = ? LIMIT 1",
                "UPDATE \"author\" SET \"name\" = ? WHERE \"_id\" = ?",
                "COMMIT",
            ]
        );
    }

    #[test]
    fn failing_child_rolls_back_the_whole_graph() {
        let conn = MockConnection::new().failing_when(|sql, _| sql.contains("\"book\""));
        let session = Session::new(conn, registry());
        let cx = Cx::for_testing();
        let mut author = Author {
            name: "Ada".into(),
            books: vec![Book::default()],
            ..Author::default()
        };

        let outcome = block_on(session.store(&cx, &mut author));

        assert!(matches!(outcome, Outcome::Err(_)));
        let statements = session.connection().statements();
        assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!statements.iter().any(|s| s == "COMMIT"));
    }

    #[test]
    fn store_opt_none_is_a_no_op() {
        let session = Session::new(MockConnection::new(), registry());
        let cx = Cx::for_testing();
        let stored =
            block_on(async { unwrap_outcome(session.store_opt::<Author>(&cx, None).await) });
        assert_eq!(stored, None);
        assert!(session.connection().statements().is_empty());
    }

    #[test]
    fn store_collection_skips_failed_elements() {
        let conn = MockConnection::new().failing_when(|sql, params| {
            sql.starts_with("INSERT") && params.contains(&Value::Text("bad".into()))
        });
        let session = Session::new(conn, registry());
        let cx = Cx::for_testing();
        let mut tags = vec![
            tag("a"),
            tag("bad"),
            tag("c"),
        ];
        let mut reports = Vec::new();
        let mut listener = |progress: &StoreProgress<'_>| {
            reports.push((progress.index, progress.total, progress.is_ok()));
        };

        let stored = block_on(async {
            unwrap_outcome(
                session
                    .store_collection(&cx, &mut tags, Some(&mut listener))
                    .await,
            )
        });

        assert_eq!(stored, 2);
        assert_eq!(reports, vec![(0, 3, true), (1, 3, false), (2, 3, true)]);
        let statements = session.connection().statements();
        assert!(statements.contains(&"ROLLBACK TO element_1".to_string()));
        assert!(!statements.contains(&"ROLLBACK TO element_0".to_string()));
        assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
    }

    #[test]
    fn unique_collection_deletes_absent_rows() {
        let conn = MockConnection::new().script(vec![
            row(&["_id"], vec![Value::Text("a".into())]),
            row(&["_id"], vec![Value::Text("b".into())]),
        ]);
        let session = Session::new(conn, registry());
        let cx = Cx::for_testing();
        let mut tags = vec![tag("b"), tag("c")];

        let stored = block_on(async {
            unwrap_outcome(session.store_unique_collection(&cx, &mut tags, None).await)
        });

        assert_eq!(stored, 2);
        assert_eq!(
            session.connection().params_of("DELETE FROM \"tag\""),
            vec![vec![Value::Text("a".into())]]
        );
        assert_eq!(
            session.connection().params_of("DELETE FROM \"author_tag\""),
            vec![vec![Value::Text("a".into())]]
        );
    }

    #[test]
    fn delete_with_unset_key_does_nothing() {
        let session = Session::new(MockConnection::new(), registry());
        let cx = Cx::for_testing();
        let removed =
            block_on(async { unwrap_outcome(session.delete(&cx, &Author::default()).await) });
        assert_eq!(removed, 0);
        assert!(session.connection().statements().is_empty());
    }

    #[test]
    fn delete_leaves_children_by_default() {
        let session = Session::new(MockConnection::new(), registry());
        let cx = Cx::for_testing();
        let author = Author {
            id: 4,
            ..Author::default()
        };

        block_on(async { unwrap_outcome(session.delete(&cx, &author).await) });

        assert_eq!(
            session.connection().statements(),
            vec![
                "BEGIN DEFERRED",
                "DELETE FROM \"author_tag\" WHERE \"author_id\" = ?",
                "DELETE FROM \"author\" WHERE \"_id\" = ?",
                "COMMIT",
            ]
        );
    }

    #[test]
    fn cascade_deletes_children_first() {
        let conn = MockConnection::new().script(vec![row(&["_id"], vec![Value::BigInt(10)])]);
        let config = SessionConfig::new().delete_policy(DeletePolicy::Cascade);
        let session = Session::with_config(conn, registry(), config);
        let cx = Cx::for_testing();
        let author = Author {
            id: 4,
            ..Author::default()
        };

        block_on(async { unwrap_outcome(session.delete(&cx, &author).await) });

        assert_eq!(
            session.connection().statements(),
            vec![
                "BEGIN DEFERRED",
                "DELETE FROM \"author_tag\" WHERE \"author_id\" = ?",
                "SELECT \"_id\" FROM \"book\" WHERE \"author_id\" = ?",
                "DELETE FROM \"book\" WHERE \"_id\" = ?",
                "DELETE FROM \"author\" WHERE \"_id\" = ?",
                "COMMIT",
            ]
        );
        assert_eq!(
            session.connection().params_of("DELETE FROM \"book\""),
            vec![vec![Value::BigInt(10)]]
        );
    }

    #[test]
    fn tree_children_get_the_parent_id() {
        let session = Session::new(MockConnection::new(), registry());
        let cx = Cx::for_testing();
        let mut root = Node {
            children: vec![Node::default()],
            ..Node::default()
        };

        block_on(async { unwrap_outcome(session.store(&cx, &mut root).await) });

        assert_eq!(root.id, 1);
        assert_eq!(root.children[0].id, 2);
        assert_eq!(
            session.connection().params_of("INSERT INTO \"node\" (\"node_id\")"),
            vec![vec![Value::BigInt(1)]]
        );
    }
}
