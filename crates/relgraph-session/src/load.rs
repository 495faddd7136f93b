//! Finding and counting, with eager loading of relation lists.

use crate::Session;
use crate::executor::{ConnExecutor, Executor, GraphFuture};
use relgraph_core::{
    ConfigErrorKind, Connection, Cx, Entity, EntityModel, Error, Outcome, Row, Value, quote_ident,
};
use relgraph_query::{FindOptions, Statement, select};
use std::any::{Any, TypeId};
use std::sync::Arc;

impl<C: Connection> Session<C> {
    /// All instances of `T` matching `options`, with relation lists loaded.
    #[tracing::instrument(level = "debug", skip(self, cx, options))]
    pub async fn find_all<T: Entity>(
        &self,
        cx: &Cx,
        options: &FindOptions,
    ) -> Outcome<Vec<T>, Error> {
        let model = try_result!(self.registry.model::<T>());
        let stmt = select::select(model.table_name(), options);
        self.fetch(cx, model, stmt).await
    }

    /// The first instance of `T` matching `options`, if any.
    pub async fn find_first<T: Entity>(
        &self,
        cx: &Cx,
        options: &FindOptions,
    ) -> Outcome<Option<T>, Error> {
        let options = options.clone().limit(1);
        let found = try_outcome!(self.find_all::<T>(cx, &options).await);
        Outcome::Ok(found.into_iter().next())
    }

    /// All instances equal to `sample` on its non-default fields.
    pub async fn find_all_like<T: Entity>(&self, cx: &Cx, sample: &T) -> Outcome<Vec<T>, Error> {
        let model = try_result!(self.registry.model::<T>());
        let options = try_result!(select::sample_options(&model, sample));
        let stmt = select::select(model.table_name(), &options);
        self.fetch(cx, model, stmt).await
    }

    /// The first instance equal to `sample` on its non-default fields.
    pub async fn find_first_like<T: Entity>(
        &self,
        cx: &Cx,
        sample: &T,
    ) -> Outcome<Option<T>, Error> {
        let model = try_result!(self.registry.model::<T>());
        let options = try_result!(select::sample_options(&model, sample)).limit(1);
        let stmt = select::select(model.table_name(), &options);
        let found = try_outcome!(self.fetch::<T>(cx, model, stmt).await);
        Outcome::Ok(found.into_iter().next())
    }

    /// The instance of `T` with primary key `key`.
    pub async fn find_by_key<T: Entity>(
        &self,
        cx: &Cx,
        key: impl Into<Value>,
    ) -> Outcome<Option<T>, Error> {
        let model = try_result!(self.registry.model::<T>());
        let key_column = &try_result!(model.require_primary_key()).column.name;
        let key: Value = key.into();
        let options = FindOptions::new()
            .filter(format!("{} = ?", quote_ident(key_column)), [key])
            .limit(1);
        let stmt = select::select(model.table_name(), &options);
        let found = try_outcome!(self.fetch::<T>(cx, model, stmt).await);
        Outcome::Ok(found.into_iter().next())
    }

    /// Number of rows of `T` matching `options`. Limit and offset are ignored.
    pub async fn count<T: Entity>(&self, cx: &Cx, options: &FindOptions) -> Outcome<u64, Error> {
        let model = try_result!(self.registry.model::<T>());
        self.count_rows(cx, select::count(model.table_name(), options))
            .await
    }

    /// Number of rows equal to `sample` on its non-default fields.
    pub async fn count_like<T: Entity>(&self, cx: &Cx, sample: &T) -> Outcome<u64, Error> {
        let model = try_result!(self.registry.model::<T>());
        let options = try_result!(select::sample_options(&model, sample));
        self.count_rows(cx, select::count(model.table_name(), &options))
            .await
    }

    async fn count_rows(&self, cx: &Cx, stmt: Statement) -> Outcome<u64, Error> {
        tracing::debug!(sql = %stmt.sql, "count");
        let row = try_outcome!(
            self.connection
                .query_one(cx, &stmt.sql, &stmt.params)
                .await
        );
        let count = row
            .as_ref()
            .and_then(|r| r.get(0))
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        Outcome::Ok(count)
    }

    async fn fetch<T: Entity>(
        &self,
        cx: &Cx,
        model: Arc<EntityModel>,
        stmt: Statement,
    ) -> Outcome<Vec<T>, Error> {
        tracing::debug!(sql = %stmt.sql, "find");
        let exec = ConnExecutor(&self.connection);
        let rows = try_outcome!(exec.query(cx, &stmt).await);
        let mut path = Vec::new();
        let loaded = try_outcome!(self.load_rows(cx, &exec, model, rows, &mut path).await);

        let mut found = Vec::with_capacity(loaded.len());
        for instance in loaded {
            match instance.downcast::<T>() {
                Ok(instance) => found.push(*instance),
                Err(_) => {
                    return Outcome::Err(Error::config(
                        ConfigErrorKind::UnregisteredEntity,
                        format!("loaded rows are not {}", std::any::type_name::<T>()),
                    ));
                }
            }
        }
        Outcome::Ok(found)
    }

    /// Map rows onto fresh instances and load their relation lists.
    ///
    /// `path` holds the instances being loaded further up, as type and key.
    /// A list whose element type is on it stays empty, except a list of the
    /// instance's own type (a tree), which is followed until an instance
    /// repeats.
    pub(crate) fn load_rows<'a, E: Executor + 'a>(
        &'a self,
        cx: &'a Cx,
        exec: &'a E,
        model: Arc<EntityModel>,
        rows: Vec<Row>,
        path: &'a mut Vec<(TypeId, Value)>,
    ) -> GraphFuture<'a, Vec<Box<dyn Any>>> {
        Box::pin(async move {
            let own_type = model.entity_type_id();
            let mut loaded = Vec::with_capacity(rows.len());

            for row in &rows {
                let mut instance = model.new_instance();
                for field in model.fields() {
                    if let Some(value) = row.get_by_name(&field.column.name) {
                        try_result!(field.access.write(&mut *instance, value));
                    }
                }

                let key = try_result!(model.key_of(&*instance)).filter(|k| !k.is_default());
                let Some(key) = key else {
                    loaded.push(instance);
                    continue;
                };
                let visit = (own_type, key.normalized_key());
                if path.contains(&visit) {
                    loaded.push(instance);
                    continue;
                }
                path.push(visit);

                for list in model.has_many() {
                    let target = list.target().entity_type_id();
                    if target != own_type && path.iter().any(|(t, _)| *t == target) {
                        continue;
                    }
                    let spec = try_result!(self.registry.has_many_spec(own_type, target));
                    let child_model = try_result!(self.registry.lookup(target));
                    let stmt = select::select_children(
                        child_model.table_name(),
                        &spec.through_column,
                        key.clone(),
                    );
                    let child_rows = try_outcome!(exec.query(cx, &stmt).await);
                    let children = try_outcome!(
                        self.load_rows(cx, exec, child_model, child_rows, &mut *path)
                            .await
                    );
                    try_result!(list.replace(&mut *instance, children));
                }

                for list in model.many_to_many() {
                    let target = list.target().entity_type_id();
                    if path.iter().any(|(t, _)| *t == target) {
                        continue;
                    }
                    let spec = try_result!(self.registry.many_to_many_spec(own_type, target));
                    let Some(link) = spec.link_table_for(own_type) else {
                        continue;
                    };
                    let child_model = try_result!(self.registry.lookup(target));
                    let child_key = &try_result!(child_model.require_primary_key()).column.name;
                    let stmt = select::select_linked(
                        child_model.table_name(),
                        child_key,
                        &link,
                        key.clone(),
                    );
                    let child_rows = try_outcome!(exec.query(cx, &stmt).await);
                    let children = try_outcome!(
                        self.load_rows(cx, exec, Arc::clone(&child_model), child_rows, &mut *path)
                            .await
                    );
                    try_result!(list.replace(&mut *instance, children));
                }

                path.pop();
                loaded.push(instance);
            }

            Outcome::Ok(loaded)
        })
    }
}
