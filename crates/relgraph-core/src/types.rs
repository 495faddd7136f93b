//! SQL storage classes and field kinds.

use serde::{Deserialize, Serialize};

/// SQLite storage class used for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

/// The value kind of a mapped Rust field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Text,
    Bytes,
    Json,
}

impl FieldKind {
    /// Integer kinds, including booleans.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::Bool
                | FieldKind::TinyInt
                | FieldKind::SmallInt
                | FieldKind::Int
                | FieldKind::BigInt
        )
    }

    /// Floating point kinds.
    pub const fn is_float(&self) -> bool {
        matches!(self, FieldKind::Float | FieldKind::Double)
    }

    /// The storage class used when the field is not designated as a blob.
    pub const fn default_sql_type(&self) -> SqlType {
        if self.is_integer() {
            SqlType::Integer
        } else if self.is_float() {
            SqlType::Real
        } else {
            SqlType::Text
        }
    }
}
