//! Core types and traits for relgraph.
//!
//! - `Entity` trait and `EntityDef` builder for mapping structs to tables
//! - `Field` declarations and the column introspector
//! - `Registry` holding entity models and the validated relation graph
//! - `Connection` traits for the database handle
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod object_type;
pub mod registry;
pub mod relationship;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, IsolationLevel, TransactionOps};
pub use entity::{
    BelongsTo, Entity, EntityDef, EntityModel, EntityRef, HasMany, ListAccess, ManyToMany,
    MappedField,
};
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, ConstraintError,
    ConstraintErrorKind, Error, QueryError, QueryErrorKind, Result, TransactionError,
    TransactionErrorKind, TypeError,
};
pub use field::{Column, Field, FieldAccess, FieldAttrs, FieldType, describe_column};
pub use identifiers::{
    PRIMARY_KEY_COLUMN, column_name_for, foreign_key_column, is_valid_identifier, quote_ident,
    validate_identifier,
};
pub use object_type::ObjectType;
pub use registry::{Registry, RegistryBuilder};
pub use relationship::{HasManySpec, LinkTable, ManyToManySpec};
pub use row::{ColumnInfo, Row};
pub use types::{FieldKind, SqlType};
pub use value::Value;
