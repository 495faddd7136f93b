//! SQL statement builder for relgraph.
//!
//! Pure functions turning entity models and instances into statement text
//! plus bound parameters. Identifiers are double-quoted and parameters use
//! positional `?` placeholders. Nothing here touches a connection; the
//! session crate executes what these functions render.

pub mod ddl;
pub mod dml;
pub mod select;
pub mod statement;

pub use ddl::{create_link_table, create_table};
pub use dml::{
    delete_all, delete_by_key, delete_children, insert, link_insert, unlink_all, update,
};
pub use select::{
    FindOptions, TableQuery, count, key_exists, query_table, sample_options, sample_where, select,
    select_child_keys, select_children, select_keys, select_linked,
};
pub use statement::Statement;
