//! Entity declarations and the per-type accessor table.
//!
//! An entity is a plain struct implementing [`Entity`]. Its [`EntityDef`]
//! lists the table name, mapped fields and relation declarations:
//!
//! ```rust,ignore
//! impl Entity for Author {
//!     fn entity() -> EntityDef<Self> {
//!         EntityDef::new("author")
//!             .field(Field::new("id", |a: &Author| &a.id, |a: &mut Author| &mut a.id).primary_key())
//!             .field(Field::new("name", |a: &Author| &a.name, |a: &mut Author| &mut a.name))
//!             .has_many(HasMany::new("books", |a: &Author| &a.books, |a: &mut Author| &mut a.books))
//!     }
//! }
//! ```
//!
//! [`EntityModel::build`] turns the declaration into the erased accessor
//! table the engine works with.

use crate::error::{ConfigErrorKind, Error, Result};
use crate::field::{Column, Field, FieldAccess, FieldType, describe_column, wrong_instance};
use crate::identifiers::validate_identifier;
use crate::object_type::ObjectType;
use crate::value::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type mapped to a table.
pub trait Entity: Default + 'static {
    /// The mapping declaration for this type.
    fn entity() -> EntityDef<Self>;
}

/// Identity of an entity type plus a way to build its model on demand.
#[derive(Clone, Copy)]
pub struct EntityRef {
    type_id: TypeId,
    type_name: &'static str,
    build: fn() -> Result<EntityModel>,
}

impl EntityRef {
    /// Reference to entity type `T`.
    pub fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            build: EntityModel::build::<T>,
        }
    }

    pub fn entity_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Build the model of the referenced type.
    pub fn build(&self) -> Result<EntityModel> {
        (self.build)()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.type_name).finish()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityRef {}

/// Type-erased access to a `Vec` of related entities on an instance.
pub trait ListAccess: Send + Sync {
    /// Declared list field name.
    fn name(&self) -> &'static str;

    /// Element type.
    fn target(&self) -> EntityRef;

    /// Number of elements.
    fn len(&self, instance: &dyn Any) -> Result<usize>;

    /// Borrow element `index`.
    fn element<'a>(&self, instance: &'a dyn Any, index: usize) -> Result<&'a dyn Any>;

    /// Mutably borrow element `index`.
    fn element_mut<'a>(&self, instance: &'a mut dyn Any, index: usize) -> Result<&'a mut dyn Any>;

    /// Replace the whole list with freshly loaded elements.
    fn replace(&self, instance: &mut dyn Any, items: Vec<Box<dyn Any>>) -> Result<()>;
}

struct VecField<T, C> {
    name: &'static str,
    get: fn(&T) -> &Vec<C>,
    get_mut: fn(&mut T) -> &mut Vec<C>,
}

impl<T: 'static, C: Entity> ListAccess for VecField<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn target(&self) -> EntityRef {
        EntityRef::of::<C>()
    }

    fn len(&self, instance: &dyn Any) -> Result<usize> {
        let instance = instance
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        Ok((self.get)(instance).len())
    }

    fn element<'a>(&self, instance: &'a dyn Any, index: usize) -> Result<&'a dyn Any> {
        let instance = instance
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        (self.get)(instance)
            .get(index)
            .map(|c| c as &dyn Any)
            .ok_or_else(|| out_of_range(self.name, index))
    }

    fn element_mut<'a>(&self, instance: &'a mut dyn Any, index: usize) -> Result<&'a mut dyn Any> {
        let instance = instance
            .downcast_mut::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        (self.get_mut)(instance)
            .get_mut(index)
            .map(|c| c as &mut dyn Any)
            .ok_or_else(|| out_of_range(self.name, index))
    }

    fn replace(&self, instance: &mut dyn Any, items: Vec<Box<dyn Any>>) -> Result<()> {
        let instance = instance
            .downcast_mut::<T>()
            .ok_or_else(|| wrong_instance::<T>(self.name))?;
        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            let item = item
                .downcast::<C>()
                .map_err(|_| wrong_instance::<C>(self.name))?;
            elements.push(*item);
        }
        *(self.get_mut)(instance) = elements;
        Ok(())
    }
}

fn out_of_range(field: &str, index: usize) -> Error {
    Error::Custom(format!("index {index} out of range for list {field}"))
}

/// Has-many declaration: `T` owns a list of `C`, stored via a foreign key on `C`.
pub struct HasMany<T, C> {
    inner: VecField<T, C>,
}

impl<T: 'static, C: Entity> HasMany<T, C> {
    pub fn new(
        name: &'static str,
        get: fn(&T) -> &Vec<C>,
        get_mut: fn(&mut T) -> &mut Vec<C>,
    ) -> Self {
        Self {
            inner: VecField { name, get, get_mut },
        }
    }
}

/// Many-to-many declaration: `T` is linked to a list of `C` through a join table.
pub struct ManyToMany<T, C> {
    inner: VecField<T, C>,
}

impl<T: 'static, C: Entity> ManyToMany<T, C> {
    pub fn new(
        name: &'static str,
        get: fn(&T) -> &Vec<C>,
        get_mut: fn(&mut T) -> &mut Vec<C>,
    ) -> Self {
        Self {
            inner: VecField { name, get, get_mut },
        }
    }
}

/// Belongs-to declaration on the contained side of a has-many.
#[derive(Debug, Clone, Copy)]
pub struct BelongsTo {
    /// Container type
    pub target: EntityRef,
    /// Field holding the container's key; `None` uses an implicit column.
    pub through_field: Option<&'static str>,
}

/// Mapping declaration for entity `T`.
pub struct EntityDef<T> {
    table: String,
    fields: Vec<Box<dyn FieldAccess>>,
    has_many: Vec<Box<dyn ListAccess>>,
    many_to_many: Vec<Box<dyn ListAccess>>,
    belongs_to: Vec<BelongsTo>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Entity> EntityDef<T> {
    /// Start a declaration for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            has_many: Vec::new(),
            many_to_many: Vec::new(),
            belongs_to: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Map a field to a column.
    pub fn field<F: FieldType>(mut self, field: Field<T, F>) -> Self {
        self.fields.push(Box::new(field));
        self
    }

    /// Declare a has-many list.
    pub fn has_many<C: Entity>(mut self, relation: HasMany<T, C>) -> Self {
        self.has_many.push(Box::new(relation.inner));
        self
    }

    /// Declare a many-to-many list.
    pub fn many_to_many<C: Entity>(mut self, relation: ManyToMany<T, C>) -> Self {
        self.many_to_many.push(Box::new(relation.inner));
        self
    }

    /// Declare that `T` is contained by `P`, with the key stored in an
    /// implicit `<p_table>_id` column.
    pub fn belongs_to<P: Entity>(mut self) -> Self {
        self.belongs_to.push(BelongsTo {
            target: EntityRef::of::<P>(),
            through_field: None,
        });
        self
    }

    /// Declare that `T` is contained by `P`, with the key stored in the
    /// declared field `through_field`.
    pub fn belongs_to_via<P: Entity>(mut self, through_field: &'static str) -> Self {
        self.belongs_to.push(BelongsTo {
            target: EntityRef::of::<P>(),
            through_field: Some(through_field),
        });
        self
    }
}

/// A mapped field: its column and erased accessor.
pub struct MappedField {
    pub column: Column,
    pub access: Box<dyn FieldAccess>,
}

impl fmt::Debug for MappedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedField")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Erased accessor table for one entity type.
///
/// Fields are ordered with the primary key first, then in declared order.
pub struct EntityModel {
    object_type: Arc<ObjectType>,
    fields: Vec<MappedField>,
    has_many: Vec<Box<dyn ListAccess>>,
    many_to_many: Vec<Box<dyn ListAccess>>,
    belongs_to: Vec<BelongsTo>,
    new_instance: fn() -> Box<dyn Any>,
}

fn new_boxed<T: Entity>() -> Box<dyn Any> {
    Box::new(T::default())
}

impl EntityModel {
    /// Build and validate the model of `T`.
    pub fn build<T: Entity>() -> Result<Self> {
        let def = T::entity();
        let type_name = std::any::type_name::<T>();

        if def.table.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::MissingTableName,
                format!("entity {type_name} does not declare a table name"),
            ));
        }
        validate_identifier(&def.table, "table")?;

        let mut fields: Vec<MappedField> = Vec::with_capacity(def.fields.len());
        for access in def.fields {
            if let Some(forced) = &access.attrs().column {
                validate_identifier(forced, "column")?;
            }
            let column = describe_column(access.name(), access.kind(), access.attrs());
            fields.push(MappedField { column, access });
        }

        let keys = fields.iter().filter(|f| f.column.primary_key).count();
        if keys > 1 {
            return Err(Error::config(
                ConfigErrorKind::DuplicatePrimaryKey,
                format!("entity {type_name} declares {keys} primary key fields"),
            ));
        }
        if let Some(pos) = fields.iter().position(|f| f.column.primary_key) {
            let key = fields.remove(pos);
            fields.insert(0, key);
        }

        for belongs in &def.belongs_to {
            if let Some(through) = belongs.through_field {
                if !fields.iter().any(|f| f.access.name() == through) {
                    return Err(Error::config(
                        ConfigErrorKind::UnresolvedBelongsTo,
                        format!(
                            "entity {type_name} belongs to {} through {through}, which is not a declared field",
                            belongs.target.type_name()
                        ),
                    ));
                }
            }
        }

        let columns = fields.iter().map(|f| f.column.clone()).collect();
        let object_type = Arc::new(ObjectType::new(
            def.table,
            columns,
            TypeId::of::<T>(),
            type_name,
        ));

        tracing::debug!(
            entity = type_name,
            table = %object_type.table_name(),
            fields = fields.len(),
            "Built entity model"
        );

        Ok(Self {
            object_type,
            fields,
            has_many: def.has_many,
            many_to_many: def.many_to_many,
            belongs_to: def.belongs_to,
            new_instance: new_boxed::<T>,
        })
    }

    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.object_type
    }

    pub fn table_name(&self) -> &str {
        self.object_type.table_name()
    }

    pub fn entity_type_id(&self) -> TypeId {
        self.object_type.entity_type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.object_type.type_name()
    }

    /// Mapped fields, primary key first.
    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// The primary key field, if declared.
    pub fn primary_key(&self) -> Option<&MappedField> {
        self.fields.first().filter(|f| f.column.primary_key)
    }

    /// The primary key field, or a configuration error.
    pub fn require_primary_key(&self) -> Result<&MappedField> {
        self.primary_key().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::MissingPrimaryKey,
                format!("entity {} has no primary key", self.type_name()),
            )
        })
    }

    /// Look up a mapped field by declared field name.
    pub fn field_named(&self, name: &str) -> Option<&MappedField> {
        self.fields.iter().find(|f| f.access.name() == name)
    }

    /// Look up a mapped field by column name.
    pub fn field_for_column(&self, column: &str) -> Option<&MappedField> {
        self.fields.iter().find(|f| f.column.name == column)
    }

    pub fn has_many(&self) -> &[Box<dyn ListAccess>] {
        &self.has_many
    }

    pub fn many_to_many(&self) -> &[Box<dyn ListAccess>] {
        &self.many_to_many
    }

    pub fn belongs_to(&self) -> &[BelongsTo] {
        &self.belongs_to
    }

    /// Every entity type this one refers to.
    pub fn related(&self) -> Vec<EntityRef> {
        self.has_many
            .iter()
            .chain(self.many_to_many.iter())
            .map(|l| l.target())
            .chain(self.belongs_to.iter().map(|b| b.target))
            .collect()
    }

    /// A fresh default instance of the entity type.
    pub fn new_instance(&self) -> Box<dyn Any> {
        (self.new_instance)()
    }

    /// Read the primary key of `instance`; `None` when no key is declared.
    pub fn key_of(&self, instance: &dyn Any) -> Result<Option<Value>> {
        match self.primary_key() {
            Some(key) => key.access.read(instance).map(Some),
            None => Ok(None),
        }
    }

    /// Whether the key of `instance` holds a non-default value.
    pub fn has_key(&self, instance: &dyn Any) -> Result<bool> {
        Ok(self.key_of(instance)?.is_some_and(|k| !k.is_default()))
    }

    /// Write a key value onto `instance`.
    pub fn set_key(&self, instance: &mut dyn Any, key: &Value) -> Result<()> {
        self.require_primary_key()?.access.write(instance, key)
    }
}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("object_type", &self.object_type)
            .field("fields", &self.fields)
            .field(
                "has_many",
                &self.has_many.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .field(
                "many_to_many",
                &self.many_to_many.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    #[derive(Debug, Default, PartialEq)]
    struct Tag {
        id: i64,
        label: String,
        weight: f64,
    }

    impl Entity for Tag {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("tag")
                .field(Field::new(
                    "label",
                    |t: &Tag| &t.label,
                    |t: &mut Tag| &mut t.label,
                ))
                .field(Field::new("id", |t: &Tag| &t.id, |t: &mut Tag| &mut t.id).primary_key())
                .field(Field::new(
                    "weight",
                    |t: &Tag| &t.weight,
                    |t: &mut Tag| &mut t.weight,
                ))
        }
    }

    #[derive(Debug, Default)]
    struct TwoKeys {
        a: i64,
        b: i64,
    }

    impl Entity for TwoKeys {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("two_keys")
                .field(Field::new("a", |t: &TwoKeys| &t.a, |t: &mut TwoKeys| &mut t.a).primary_key())
                .field(Field::new("b", |t: &TwoKeys| &t.b, |t: &mut TwoKeys| &mut t.b).primary_key())
        }
    }

    #[derive(Debug, Default)]
    struct NoTable {
        x: i32,
    }

    impl Entity for NoTable {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("").field(Field::new("x", |t: &NoTable| &t.x, |t: &mut NoTable| &mut t.x))
        }
    }

    #[derive(Debug, Default)]
    struct BadTable;

    impl Entity for BadTable {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("bad table")
        }
    }

    #[test]
    fn primary_key_moves_first() {
        let model = EntityModel::build::<Tag>().unwrap();
        let names: Vec<_> = model.fields().iter().map(|f| f.column.name.as_str()).collect();
        assert_eq!(names, vec!["_id", "label", "weight"]);
        assert_eq!(model.fields()[2].column.sql_type, SqlType::Real);
        assert_eq!(model.table_name(), "tag");
        assert!(model.primary_key().is_some());
    }

    #[test]
    fn key_access() {
        let model = EntityModel::build::<Tag>().unwrap();
        let mut tag = Tag::default();
        assert!(!model.has_key(&tag).unwrap());
        model.set_key(&mut tag, &Value::BigInt(4)).unwrap();
        assert_eq!(tag.id, 4);
        assert_eq!(model.key_of(&tag).unwrap(), Some(Value::BigInt(4)));
    }

    #[test]
    fn rejects_two_primary_keys() {
        let err = EntityModel::build::<TwoKeys>().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::DuplicatePrimaryKey));
    }

    #[test]
    fn rejects_missing_and_invalid_table_names() {
        let err = EntityModel::build::<NoTable>().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingTableName));
        let err = EntityModel::build::<BadTable>().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidIdentifier));
    }

    #[test]
    fn model_reports_the_entity_type() {
        let tag = EntityModel::build::<Tag>().unwrap();
        assert_eq!(tag.entity_type_id(), TypeId::of::<Tag>());
        assert_eq!(tag.object_type().entity_type_id(), TypeId::of::<Tag>());
        assert_eq!(EntityRef::of::<Tag>().entity_type_id(), TypeId::of::<Tag>());

        let shared = Arc::new(tag);
        assert_eq!(shared.entity_type_id(), TypeId::of::<Tag>());
        assert_ne!(
            shared.entity_type_id(),
            EntityRef::of::<BadTable>().entity_type_id()
        );
    }

    #[test]
    fn new_instance_is_default() {
        let model = EntityModel::build::<Tag>().unwrap();
        let instance = model.new_instance();
        assert_eq!(instance.downcast_ref::<Tag>(), Some(&Tag::default()));
    }
}
