//! Recording connection and sample entities for unit tests.

use relgraph_core::{
    Connection, Cx, Entity, EntityDef, Error, Field, HasMany, IsolationLevel, ManyToMany, Outcome,
    QueryError, QueryErrorKind, Registry, Row, TransactionOps, Value,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

type FailWhen = Box<dyn Fn(&str, &[Value]) -> bool + Send + Sync>;

/// Records every statement; queries answer from a script, writes succeed
/// unless `fail_when` matches.
pub(crate) struct MockConnection {
    log: Mutex<Vec<(String, Vec<Value>)>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    fail_when: Option<FailWhen>,
    next_id: AtomicI64,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            fail_when: None,
            next_id: AtomicI64::new(1),
        }
    }

    pub(crate) fn failing_when(
        mut self,
        fail: impl Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Some(Box::new(fail));
        self
    }

    /// Queue the rows returned by the next query.
    pub(crate) fn script(self, rows: Vec<Row>) -> Self {
        self.results.lock().unwrap().push_back(rows);
        self
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub(crate) fn params_of(&self, prefix: &str) -> Vec<Vec<Value>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }

    fn query_sync(&self, sql: &str, params: &[Value]) -> Vec<Row> {
        self.record(sql, params);
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }

    fn write_sync(&self, sql: &str, params: &[Value]) -> Result<i64, Error> {
        self.record(sql, params);
        if self.fail_when.as_ref().is_some_and(|f| f(sql, params)) {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Constraint,
                sql: Some(sql.to_string()),
                message: "scripted failure".to_string(),
                source: None,
            }));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn ready<T: Send>(result: Result<T, Error>) -> impl Future<Output = Outcome<T, Error>> + Send {
    async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
}

pub(crate) struct MockTx<'conn> {
    conn: &'conn MockConnection,
}

impl Connection for MockConnection {
    type Tx<'conn>
        = MockTx<'conn>
    where
        Self: 'conn;

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        ready(Ok(self.query_sync(sql, params)))
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        ready(Ok(self.query_sync(sql, params).into_iter().next()))
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        ready(self.write_sync(sql, params).map(|_| 1))
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        ready(self.write_sync(sql, params))
    }

    fn begin_with(
        &self,
        _cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.record(isolation.begin_sql(), &[]);
        ready(Ok(MockTx { conn: self }))
    }
}

impl TransactionOps for MockTx<'_> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.conn.query(cx, sql, params)
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        self.conn.query_one(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.conn.execute(cx, sql, params)
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        self.conn.insert(cx, sql, params)
    }

    fn savepoint(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn.record(&format!("SAVEPOINT {name}"), &[]);
        ready(Ok(()))
    }

    fn rollback_to(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn.record(&format!("ROLLBACK TO {name}"), &[]);
        ready(Ok(()))
    }

    fn release(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn.record(&format!("RELEASE {name}"), &[]);
        ready(Ok(()))
    }

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn.record("COMMIT", &[]);
        ready(Ok(()))
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn.record("ROLLBACK", &[]);
        ready(Ok(()))
    }
}

pub(crate) fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(|c| (*c).to_string()).collect(), values)
}

pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
        .block_on(future)
}

pub(crate) fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Author {
    pub id: i64,
    pub name: String,
    pub books: Vec<Book>,
    pub tags: Vec<Tag>,
}

impl Entity for Author {
    fn entity() -> EntityDef<Self> {
        EntityDef::new("author")
            .field(Field::new("id", |a: &Author| &a.id, |a: &mut Author| &mut a.id).primary_key())
            .field(Field::new("name", |a: &Author| &a.name, |a: &mut Author| &mut a.name))
            .has_many(HasMany::new(
                "books",
                |a: &Author| &a.books,
                |a: &mut Author| &mut a.books,
            ))
            .many_to_many(ManyToMany::new(
                "tags",
                |a: &Author| &a.tags,
                |a: &mut Author| &mut a.tags,
            ))
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Book {
    pub id: i64,
    pub title: String,
}

impl Entity for Book {
    fn entity() -> EntityDef<Self> {
        EntityDef::new("book")
            .field(Field::new("id", |b: &Book| &b.id, |b: &mut Book| &mut b.id).primary_key())
            .field(Field::new("title", |b: &Book| &b.title, |b: &mut Book| &mut b.title))
            .belongs_to::<Author>()
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Tag {
    pub code: String,
    pub authors: Vec<Author>,
}

pub(crate) fn tag(code: &str) -> Tag {
    Tag {
        code: code.to_string(),
        ..Tag::default()
    }
}

impl Entity for Tag {
    fn entity() -> EntityDef<Self> {
        EntityDef::new("tag")
            .field(Field::new("code", |t: &Tag| &t.code, |t: &mut Tag| &mut t.code).primary_key())
            .many_to_many(ManyToMany::new(
                "authors",
                |t: &Tag| &t.authors,
                |t: &mut Tag| &mut t.authors,
            ))
    }
}

/// A tree: nodes contain nodes.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Node {
    pub id: i64,
    pub children: Vec<Node>,
}

impl Entity for Node {
    fn entity() -> EntityDef<Self> {
        EntityDef::new("node")
            .field(Field::new("id", |n: &Node| &n.id, |n: &mut Node| &mut n.id).primary_key())
            .has_many(HasMany::new(
                "children",
                |n: &Node| &n.children,
                |n: &mut Node| &mut n.children,
            ))
            .belongs_to::<Node>()
    }
}

pub(crate) fn registry() -> Arc<Registry> {
    let registry = Registry::builder()
        .register::<Author>()
        .register::<Node>()
        .build()
        .expect("sample entities register");
    Arc::new(registry)
}
