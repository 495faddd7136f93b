//! Field declarations and the column introspector.
//!
//! A [`Field`] pairs a declared field name with a typed getter and setter.
//! [`describe_column`] turns the declaration into a [`Column`], and the
//! [`FieldAccess`] trait erases the owning type so the engine can read and
//! write values on any registered entity.

use crate::error::{Error, Result, TypeError};
use crate::identifiers::{PRIMARY_KEY_COLUMN, column_name_for};
use crate::types::{FieldKind, SqlType};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// A Rust type that can be stored in a single column.
pub trait FieldType: Sized + 'static {
    /// Value kind, used to pick the storage class.
    const KIND: FieldKind;

    /// Whether `None`-like values are representable.
    const NULLABLE: bool = false;

    /// Convert to a dynamic value for binding.
    fn to_value(&self) -> Value;

    /// Convert from a value read back from the database.
    fn from_value(value: &Value) -> Result<Self>;
}

fn type_error(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| type_error("bool", value))
    }
}

macro_rules! impl_integer_field {
    ($($ty:ty => $kind:ident, $variant:ident;)*) => {
        $(
            impl FieldType for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: &Value) -> Result<Self> {
                    value
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| type_error(stringify!($ty), value))
                }
            }
        )*
    };
}

impl_integer_field! {
    i8 => TinyInt, TinyInt;
    i16 => SmallInt, SmallInt;
    i32 => Int, Int;
    i64 => BigInt, BigInt;
}

impl FieldType for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| type_error("f32", value))
    }
}

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| type_error("f64", value))
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Json(j) => Ok(j.to_string()),
            other => Err(type_error("String", other)),
        }
    }
}

impl FieldType for Vec<u8> {
    const KIND: FieldKind = FieldKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| type_error("Vec<u8>", value))
    }
}

impl FieldType for serde_json::Value {
    const KIND: FieldKind = FieldKind::Json;

    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                Error::Type(TypeError {
                    expected: "JSON document",
                    actual: e.to_string(),
                    column: None,
                })
            }),
            Value::Null => Ok(serde_json::Value::Null),
            other => Err(type_error("JSON document", other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Declared attributes of a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAttrs {
    /// Forced column name
    pub column: Option<String>,
    /// Explicitly marked as primary key
    pub primary_key: bool,
    /// Explicit auto-increment setting; `None` applies the default policy
    pub auto_increment: Option<bool>,
    /// Reject NULL on insert
    pub not_null: bool,
    /// Store as BLOB instead of TEXT
    pub blob: bool,
}

/// Column description derived from one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Declaring field; `None` for implicit through columns.
    pub field: Option<String>,
}

impl Column {
    /// A nullable foreign-key column with no backing field, typed like the
    /// key it references.
    pub fn implicit_foreign_key(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            primary_key: false,
            auto_increment: false,
            field: None,
        }
    }
}

/// Map a declared field to its column.
///
/// - Column name: forced name, else `_id` for an explicit primary key, else
///   the field name in snake_case.
/// - Primary key: explicitly marked, or the derived name is `_id`.
/// - Auto-increment: integer-kind keys only, on by default unless disabled
///   or the column name was forced.
pub fn describe_column(field: &str, kind: FieldKind, attrs: &FieldAttrs) -> Column {
    let name = match &attrs.column {
        Some(forced) => forced.clone(),
        None if attrs.primary_key => PRIMARY_KEY_COLUMN.to_string(),
        None => column_name_for(field),
    };
    let primary_key = attrs.primary_key || name == PRIMARY_KEY_COLUMN;
    let auto_increment = primary_key
        && kind.is_integer()
        && attrs.auto_increment.unwrap_or(attrs.column.is_none());
    let sql_type = if attrs.blob {
        SqlType::Blob
    } else {
        kind.default_sql_type()
    };

    Column {
        name,
        sql_type,
        not_null: attrs.not_null,
        primary_key,
        auto_increment,
        field: Some(field.to_string()),
    }
}

/// A typed field declaration on entity `T` holding a value of type `F`.
pub struct Field<T, F> {
    name: &'static str,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
    attrs: FieldAttrs,
}

impl<T: 'static, F: FieldType> Field<T, F> {
    /// Declare a field by name with its accessors.
    ///
    /// ```rust,ignore
    /// Field::new("firstName", |a: &Author| &a.first_name, |a: &mut Author| &mut a.first_name)
    /// ```
    pub fn new(name: &'static str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self {
            name,
            get,
            get_mut,
            attrs: FieldAttrs::default(),
        }
    }

    /// Mark this field as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.attrs.primary_key = true;
        self
    }

    /// Force the column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.attrs.column = Some(name.into());
        self
    }

    /// Enable or disable auto-increment for an integer primary key.
    pub fn auto_increment(mut self, enabled: bool) -> Self {
        self.attrs.auto_increment = Some(enabled);
        self
    }

    /// Reject NULL values for this column.
    pub fn not_null(mut self) -> Self {
        self.attrs.not_null = true;
        self
    }

    /// Store this field as a BLOB.
    pub fn blob(mut self) -> Self {
        self.attrs.blob = true;
        self
    }

    /// Declared field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared attributes.
    pub fn attrs(&self) -> &FieldAttrs {
        &self.attrs
    }
}

/// Type-erased read/write access to one field of an entity instance.
pub trait FieldAccess: Send + Sync {
    /// Declared field name.
    fn name(&self) -> &'static str;

    /// Value kind of the field.
    fn kind(&self) -> FieldKind;

    /// Declared attributes.
    fn attrs(&self) -> &FieldAttrs;

    /// Read the field from `instance`.
    fn read(&self, instance: &dyn Any) -> Result<Value>;

    /// Write `value` into the field of `instance`.
    fn write(&self, instance: &mut dyn Any, value: &Value) -> Result<()>;
}

pub(crate) fn wrong_instance<T>(field: &str) -> Error {
    Error::Custom(format!(
        "field {field} accessed on an instance that is not {}",
        std::any::type_name::<T>()
    ))
}

impl<T: 'static, F: FieldType> FieldAccess for Field<T, F> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FieldKind {
        F::KIND
    }

    fn attrs(&self) -> &FieldAttrs {
        &self.attrs
    }

    fn read(&self, instance: &dyn Any) -> Result<Value> {
        let instance = instance
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        Ok((self.get)(instance).to_value())
    }

    fn write(&self, instance: &mut dyn Any, value: &Value) -> Result<()> {
        let instance = instance
            .downcast_mut::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        let converted = F::from_value(value).map_err(|err| match err {
            Error::Type(mut te) => {
                te.column = Some(self.name.to_string());
                Error::Type(te)
            }
            other => other,
        })?;
        *(self.get_mut)(instance) = converted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Person {
        id: i64,
        first_name: String,
        nickname: Option<String>,
    }

    #[test]
    fn storage_class_precedence() {
        let attrs = FieldAttrs::default();
        assert_eq!(
            describe_column("flag", FieldKind::Bool, &attrs).sql_type,
            SqlType::Integer
        );
        assert_eq!(
            describe_column("ratio", FieldKind::Double, &attrs).sql_type,
            SqlType::Real
        );
        assert_eq!(
            describe_column("data", FieldKind::Bytes, &attrs).sql_type,
            SqlType::Text
        );
        let blob = FieldAttrs {
            blob: true,
            ..FieldAttrs::default()
        };
        assert_eq!(
            describe_column("data", FieldKind::Bytes, &blob).sql_type,
            SqlType::Blob
        );
    }

    #[test]
    fn primary_key_detection_and_naming() {
        let explicit = FieldAttrs {
            primary_key: true,
            ..FieldAttrs::default()
        };
        let col = describe_column("id", FieldKind::BigInt, &explicit);
        assert_eq!(col.name, "_id");
        assert!(col.primary_key);
        assert!(col.auto_increment);

        let implicit = describe_column("_id", FieldKind::BigInt, &FieldAttrs::default());
        assert!(implicit.primary_key);
        assert!(implicit.auto_increment);

        let plain = describe_column("firstName", FieldKind::Text, &FieldAttrs::default());
        assert_eq!(plain.name, "first_name");
        assert!(!plain.primary_key);
    }

    #[test]
    fn auto_increment_policy() {
        let forced = FieldAttrs {
            primary_key: true,
            column: Some("code".into()),
            ..FieldAttrs::default()
        };
        let col = describe_column("code", FieldKind::BigInt, &forced);
        assert_eq!(col.name, "code");
        assert!(!col.auto_increment);

        let disabled = FieldAttrs {
            primary_key: true,
            auto_increment: Some(false),
            ..FieldAttrs::default()
        };
        assert!(!describe_column("id", FieldKind::Int, &disabled).auto_increment);

        let text_key = FieldAttrs {
            primary_key: true,
            auto_increment: Some(true),
            ..FieldAttrs::default()
        };
        assert!(!describe_column("id", FieldKind::Text, &text_key).auto_increment);
    }

    #[test]
    fn erased_read_write() {
        let id = Field::new("id", |p: &Person| &p.id, |p: &mut Person| &mut p.id).primary_key();
        let name = Field::new(
            "firstName",
            |p: &Person| &p.first_name,
            |p: &mut Person| &mut p.first_name,
        );
        let nick = Field::new(
            "nickname",
            |p: &Person| &p.nickname,
            |p: &mut Person| &mut p.nickname,
        );

        let mut person = Person::default();
        id.write(&mut person, &Value::BigInt(9)).unwrap();
        name.write(&mut person, &Value::Text("Ada".into())).unwrap();
        nick.write(&mut person, &Value::Null).unwrap();

        assert_eq!(person.id, 9);
        assert_eq!(name.read(&person).unwrap(), Value::Text("Ada".into()));
        assert_eq!(nick.read(&person).unwrap(), Value::Null);
        assert_eq!(FieldAccess::kind(&nick), FieldKind::Text);
    }

    #[test]
    fn write_reports_column_on_type_mismatch() {
        let id = Field::new("id", |p: &Person| &p.id, |p: &mut Person| &mut p.id);
        let mut person = Person::default();
        let err = id
            .write(&mut person, &Value::Text("x".into()))
            .unwrap_err();
        match err {
            Error::Type(te) => assert_eq!(te.column.as_deref(), Some("id")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn integer_narrowing_is_checked() {
        assert_eq!(i8::from_value(&Value::BigInt(12)).unwrap(), 12);
        assert!(i8::from_value(&Value::BigInt(1000)).is_err());
        assert!(bool::from_value(&Value::BigInt(1)).unwrap());
    }

    #[test]
    fn json_round_trips_through_text() {
        let doc = serde_json::json!({"tags": ["a", "b"]});
        let text = Value::Text(doc.to_string());
        assert_eq!(serde_json::Value::from_value(&text).unwrap(), doc);
    }
}
