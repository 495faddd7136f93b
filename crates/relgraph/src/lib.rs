//! relgraph: relation-aware object mapping over embedded SQLite.
//!
//! Plain structs describe their columns and relation lists through the
//! [`Entity`] trait. A [`Registry`] validates the relation graph once, and a
//! [`Session`] stores and loads whole graphs:
//!
//! - has-many lists are persisted through a foreign-key column on the child
//! - many-to-many lists are persisted through a join table
//! - every graph write is one transaction
//!
//! # Quick Start
//!
//! ```ignore
//! use relgraph::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Author {
//!     id: i64,
//!     name: String,
//!     books: Vec<Book>,
//! }
//!
//! impl Entity for Author {
//!     fn entity() -> EntityDef<Self> {
//!         EntityDef::new("author")
//!             .field(Field::new("id", |a: &Author| &a.id, |a: &mut Author| &mut a.id).primary_key())
//!             .field(Field::new("name", |a: &Author| &a.name, |a: &mut Author| &mut a.name))
//!             .has_many(HasMany::new("books", |a: &Author| &a.books, |a: &mut Author| &mut a.books))
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct Book {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Entity for Book {
//!     fn entity() -> EntityDef<Self> {
//!         EntityDef::new("book")
//!             .field(Field::new("id", |b: &Book| &b.id, |b: &mut Book| &mut b.id).primary_key())
//!             .field(Field::new("title", |b: &Book| &b.title, |b: &mut Book| &mut b.title))
//!             .belongs_to::<Author>()
//!     }
//! }
//!
//! async fn example(cx: &Cx) -> Outcome<(), Error> {
//!     let registry = Registry::builder().register::<Author>().build()?;
//!     let session = Session::new(SqliteConnection::open_memory()?, Arc::new(registry));
//!     session.create_tables(cx).await?;
//!
//!     let mut author = Author { name: "Ada".into(), ..Default::default() };
//!     author.books.push(Book { title: "Notes".into(), ..Default::default() });
//!     let id = session.store(cx, &mut author).await?;
//!
//!     let loaded: Option<Author> = session.find_by_key(cx, id).await?;
//!     Outcome::Ok(())
//! }
//! ```

pub mod catalog;

pub use catalog::SpecCatalog;

pub use relgraph_core::{
    BelongsTo, Column, ConfigErrorKind, Connection, ConstraintErrorKind, Cx, Entity, EntityDef,
    EntityModel, EntityRef, Error, Field, FieldKind, FieldType, HasMany, HasManySpec,
    IsolationLevel, LinkTable, ManyToMany, ManyToManySpec, ObjectType, Outcome, QueryErrorKind,
    Registry, RegistryBuilder, Result, Row, SqlType, TransactionOps, Value,
};
pub use relgraph_query::{FindOptions, Statement, TableQuery};
pub use relgraph_session::{
    DeletePolicy, ProgressListener, Session, SessionConfig, StoreProgress,
};
pub use relgraph_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Everything needed to declare entities and run a session.
pub mod prelude {
    pub use crate::{
        Connection, Cx, DeletePolicy, Entity, EntityDef, Error, Field, FindOptions, HasMany,
        ManyToMany, Outcome, Registry, Result, Row, Session, SessionConfig, SpecCatalog,
        SqliteConnection, StoreProgress, TableQuery, Value,
    };
    pub use std::sync::Arc;
}
