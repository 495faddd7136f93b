//! Relation specs between entity types.
//!
//! - [`HasManySpec`]: container owns many contained rows, linked by a foreign
//!   key column on the contained table.
//! - [`ManyToManySpec`]: an unordered pair linked through a join table.

use crate::identifiers::foreign_key_column;
use crate::object_type::ObjectType;
use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A resolved has-many relation.
#[derive(Debug, Clone)]
pub struct HasManySpec {
    /// Owning type
    pub container: Arc<ObjectType>,
    /// Owned type
    pub contained: Arc<ObjectType>,
    /// List field on the container
    pub list_field: &'static str,
    /// Field on the contained type holding the container key, if declared
    pub through_field: Option<&'static str>,
    /// Foreign-key column on the contained table
    pub through_column: String,
}

impl HasManySpec {
    /// Whether the through column has no backing field and must be added to
    /// the contained table.
    pub fn is_implicit(&self) -> bool {
        self.through_field.is_none() && self.contained.column(&self.through_column).is_none()
    }

    /// Does this spec link `a` and `b`, in either direction?
    pub fn links(&self, a: TypeId, b: TypeId) -> bool {
        let (c, d) = (self.container.entity_type_id(), self.contained.entity_type_id());
        (c == a && d == b) || (c == b && d == a)
    }
}

/// A join table viewed from one side of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    /// Join table name, e.g. `"author_tag"`.
    pub table_name: String,
    /// Column holding the key of the local side, e.g. `"author_id"`.
    pub local_column: String,
    /// Column holding the key of the remote side, e.g. `"tag_id"`.
    pub remote_column: String,
}

/// An unordered many-to-many pair.
///
/// `(a, b)` and `(b, a)` compare and hash equal.
#[derive(Debug, Clone)]
pub struct ManyToManySpec {
    pub first: Arc<ObjectType>,
    pub second: Arc<ObjectType>,
}

impl ManyToManySpec {
    pub fn new(first: Arc<ObjectType>, second: Arc<ObjectType>) -> Self {
        Self { first, second }
    }

    fn ordered(&self) -> (&ObjectType, &ObjectType) {
        if self.first.table_name() <= self.second.table_name() {
            (&self.first, &self.second)
        } else {
            (&self.second, &self.first)
        }
    }

    /// `<lesser_table>_<greater_table>`, table names sorted lexicographically.
    pub fn join_table(&self) -> String {
        let (a, b) = self.ordered();
        format!("{}_{}", a.table_name(), b.table_name())
    }

    /// Join columns in table-name order.
    pub fn join_columns(&self) -> (String, String) {
        let (a, b) = self.ordered();
        (
            foreign_key_column(a.table_name()),
            foreign_key_column(b.table_name()),
        )
    }

    pub fn involves(&self, type_id: TypeId) -> bool {
        self.first.entity_type_id() == type_id || self.second.entity_type_id() == type_id
    }

    /// The side that is not `type_id`.
    pub fn other(&self, type_id: TypeId) -> Option<&Arc<ObjectType>> {
        if self.first.entity_type_id() == type_id {
            Some(&self.second)
        } else if self.second.entity_type_id() == type_id {
            Some(&self.first)
        } else {
            None
        }
    }

    /// The join table as seen from `type_id`.
    pub fn link_table_for(&self, type_id: TypeId) -> Option<LinkTable> {
        let remote = self.other(type_id)?;
        let local = if self.first.entity_type_id() == type_id {
            &self.first
        } else {
            &self.second
        };
        Some(LinkTable {
            table_name: self.join_table(),
            local_column: foreign_key_column(local.table_name()),
            remote_column: foreign_key_column(remote.table_name()),
        })
    }

    fn key(&self) -> (TypeId, TypeId) {
        let (a, b) = (self.first.entity_type_id(), self.second.entity_type_id());
        if a <= b { (a, b) } else { (b, a) }
    }
}

impl PartialEq for ManyToManySpec {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ManyToManySpec {}

impl Hash for ManyToManySpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
