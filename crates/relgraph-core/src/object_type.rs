//! Per-type table descriptor.

use crate::field::Column;
use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Table name and columns of one entity type.
///
/// Two descriptors are equal iff they describe the same Rust type.
#[derive(Debug, Clone)]
pub struct ObjectType {
    table_name: String,
    columns: Vec<Column>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ObjectType {
    pub(crate) fn new(
        table_name: String,
        columns: Vec<Column>,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Self {
        Self {
            table_name,
            columns,
            type_id,
            type_name,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Declared columns, primary key first.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn entity_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The primary key column, if any.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.first().filter(|c| c.primary_key)
    }

    /// Look up a declared column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ObjectType {}

impl Hash for ObjectType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}
