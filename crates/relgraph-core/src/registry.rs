//! Relation registry: entity models and the validated relation graph.
//!
//! Registering a type builds its model and the model of every type reachable
//! through its relation declarations, then validates all new relations
//! before anything becomes visible. A failed registration leaves the
//! registry unchanged.

use crate::entity::{Entity, EntityModel, EntityRef};
use crate::error::{ConfigErrorKind, Error, Result};
use crate::identifiers::foreign_key_column;
use crate::object_type::ObjectType;
use crate::relationship::{HasManySpec, ManyToManySpec};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct RegistryState {
    models: HashMap<TypeId, Arc<EntityModel>>,
    order: Vec<TypeId>,
    has_many: Vec<HasManySpec>,
    many_to_many: Vec<ManyToManySpec>,
}

/// Owns every entity model and relation spec for one database.
///
/// Shared between sessions through `Arc`. Models are built at most once per
/// type; readers observe either no model or a fully validated one.
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("entities", &state.order.len())
            .field("has_many", &state.has_many.len())
            .field("many_to_many", &state.many_to_many.len())
            .finish()
    }
}

/// Builder registering entity types up front.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<EntityRef>,
}

impl RegistryBuilder {
    /// Register entity type `T` (and everything it refers to).
    pub fn register<T: Entity>(mut self) -> Self {
        self.entities.push(EntityRef::of::<T>());
        self
    }

    /// Build the registry, validating every relation.
    pub fn build(self) -> Result<Registry> {
        let registry = Registry::new();
        for entity in self.entities {
            registry.register_ref(entity)?;
        }
        Ok(registry)
    }
}

fn resolve<'a>(
    staged: &'a [Arc<EntityModel>],
    models: &'a HashMap<TypeId, Arc<EntityModel>>,
    type_id: TypeId,
) -> Result<&'a Arc<EntityModel>> {
    staged
        .iter()
        .find(|m| m.entity_type_id() == type_id)
        .or_else(|| models.get(&type_id))
        .ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnregisteredEntity,
                format!("entity {type_id:?} is not registered"),
            )
        })
}

fn register_has_many(
    specs: &mut Vec<HasManySpec>,
    many_to_many: &[ManyToManySpec],
    container: &EntityModel,
    contained: &EntityModel,
    list_field: &'static str,
) -> Result<()> {
    let belongs = contained
        .belongs_to()
        .iter()
        .find(|b| b.target.entity_type_id() == container.entity_type_id());
    let Some(belongs) = belongs else {
        let declared: Vec<_> = contained
            .belongs_to()
            .iter()
            .map(|b| b.target.type_name())
            .collect();
        let detail = if declared.is_empty() {
            "declares no belongs-to".to_string()
        } else {
            format!("belongs to {}", declared.join(", "))
        };
        return Err(Error::config(
            ConfigErrorKind::UnresolvedBelongsTo,
            format!(
                "{}.{list_field} has many {}, but {} {detail}",
                container.type_name(),
                contained.type_name(),
                contained.type_name()
            ),
        ));
    };

    let through_column = match belongs.through_field {
        Some(field) => contained
            .field_named(field)
            .map(|f| f.column.name.clone())
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnresolvedBelongsTo,
                    format!("{} has no field {field}", contained.type_name()),
                )
            })?,
        None => foreign_key_column(container.table_name()),
    };

    let (a, b) = (container.entity_type_id(), contained.entity_type_id());
    if many_to_many.iter().any(|m| m.involves(a) && m.involves(b)) {
        return Err(Error::config(
            ConfigErrorKind::AmbiguousCardinality,
            format!(
                "{} and {} are declared both has-many and many-to-many",
                container.type_name(),
                contained.type_name()
            ),
        ));
    }

    for existing in specs.iter() {
        let same_direction =
            existing.container.entity_type_id() == a && existing.contained.entity_type_id() == b;
        if same_direction && existing.list_field != list_field {
            return Err(Error::config(
                ConfigErrorKind::DuplicateHasMany,
                format!(
                    "{} declares more than one has-many of {} ({} and {list_field})",
                    container.type_name(),
                    contained.type_name(),
                    existing.list_field
                ),
            ));
        }
        if a != b && existing.container.entity_type_id() == b && existing.contained.entity_type_id() == a {
            return Err(Error::config(
                ConfigErrorKind::CyclicHasMany,
                format!(
                    "{} and {} each declare has-many of the other",
                    container.type_name(),
                    contained.type_name()
                ),
            ));
        }
    }

    specs.push(HasManySpec {
        container: Arc::clone(container.object_type()),
        contained: Arc::clone(contained.object_type()),
        list_field,
        through_field: belongs.through_field,
        through_column,
    });
    Ok(())
}

fn register_many_to_many(
    specs: &mut Vec<ManyToManySpec>,
    has_many: &[HasManySpec],
    first: &EntityModel,
    second: &EntityModel,
) -> Result<()> {
    let (a, b) = (first.entity_type_id(), second.entity_type_id());
    if a == b {
        return Err(Error::config(
            ConfigErrorKind::SelfManyToMany,
            format!("{} cannot be many-to-many with itself", first.type_name()),
        ));
    }
    if has_many.iter().any(|h| h.links(a, b)) {
        return Err(Error::config(
            ConfigErrorKind::AmbiguousCardinality,
            format!(
                "{} and {} are declared both has-many and many-to-many",
                first.type_name(),
                second.type_name()
            ),
        ));
    }
    let spec = ManyToManySpec::new(
        Arc::clone(first.object_type()),
        Arc::clone(second.object_type()),
    );
    if !specs.contains(&spec) {
        specs.push(spec);
    }
    Ok(())
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register entity type `T`.
    pub fn register<T: Entity>(&self) -> Result<Arc<EntityModel>> {
        self.register_ref(EntityRef::of::<T>())
    }

    /// Register the referenced entity type, returning its model.
    pub fn register_ref(&self, root: EntityRef) -> Result<Arc<EntityModel>> {
        let mut state = self.lock();
        if let Some(model) = state.models.get(&root.entity_type_id()) {
            return Ok(Arc::clone(model));
        }

        let mut staged: Vec<Arc<EntityModel>> = Vec::new();
        let mut pending = vec![root];
        while let Some(next) = pending.pop() {
            let known = state.models.contains_key(&next.entity_type_id())
                || staged.iter().any(|m| m.entity_type_id() == next.entity_type_id());
            if known {
                continue;
            }
            let model = Arc::new(next.build()?);
            pending.extend(model.related().into_iter().rev());
            staged.push(model);
        }

        let mut has_many = state.has_many.clone();
        let mut many_to_many = state.many_to_many.clone();
        for model in &staged {
            for list in model.has_many() {
                let target = resolve(&staged, &state.models, list.target().entity_type_id())?;
                register_has_many(&mut has_many, &many_to_many, model, target, list.name())?;
            }
        }
        for model in &staged {
            for list in model.many_to_many() {
                let target = resolve(&staged, &state.models, list.target().entity_type_id())?;
                register_many_to_many(&mut many_to_many, &has_many, model, target)?;
            }
        }

        let root_model = Arc::clone(&staged[0]);
        for model in staged {
            tracing::debug!(
                entity = model.type_name(),
                table = %model.table_name(),
                "Registered entity"
            );
            state.order.push(model.entity_type_id());
            state.models.insert(model.entity_type_id(), model);
        }
        state.has_many = has_many;
        state.many_to_many = many_to_many;
        Ok(root_model)
    }

    /// Model of `T`, registering it on first use.
    pub fn model<T: Entity>(&self) -> Result<Arc<EntityModel>> {
        self.register::<T>()
    }

    /// Model of an already registered type.
    pub fn lookup(&self, type_id: TypeId) -> Result<Arc<EntityModel>> {
        self.lock().models.get(&type_id).cloned().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnregisteredEntity,
                format!("entity {type_id:?} is not registered"),
            )
        })
    }

    /// Descriptor of `T`, registering it on first use.
    pub fn object_type<T: Entity>(&self) -> Result<Arc<ObjectType>> {
        Ok(Arc::clone(self.model::<T>()?.object_type()))
    }

    /// Has-many specs where `T` is the container.
    pub fn has_many<T: Entity>(&self) -> Result<Vec<HasManySpec>> {
        let model = self.model::<T>()?;
        Ok(self.has_many_of(model.entity_type_id()))
    }

    /// Has-many specs where `type_id` is the container.
    pub fn has_many_of(&self, type_id: TypeId) -> Vec<HasManySpec> {
        self.lock()
            .has_many
            .iter()
            .filter(|h| h.container.entity_type_id() == type_id)
            .cloned()
            .collect()
    }

    /// The has-many spec from `T` to `C`; a configuration error when absent.
    pub fn has_many_between<T: Entity, C: Entity>(&self) -> Result<HasManySpec> {
        self.model::<T>()?;
        self.has_many_spec(TypeId::of::<T>(), TypeId::of::<C>())
    }

    /// Erased form of [`Registry::has_many_between`].
    pub fn has_many_spec(&self, container: TypeId, contained: TypeId) -> Result<HasManySpec> {
        self.lock()
            .has_many
            .iter()
            .find(|h| h.container.entity_type_id() == container && h.contained.entity_type_id() == contained)
            .cloned()
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnknownRelation,
                    format!("no has-many relation from {container:?} to {contained:?}"),
                )
            })
    }

    /// Has-many specs where `T` is the contained side.
    pub fn contained_in<T: Entity>(&self) -> Result<Vec<HasManySpec>> {
        let model = self.model::<T>()?;
        Ok(self.contained_in_of(model.entity_type_id()))
    }

    /// Has-many specs where `type_id` is the contained side.
    pub fn contained_in_of(&self, type_id: TypeId) -> Vec<HasManySpec> {
        self.lock()
            .has_many
            .iter()
            .filter(|h| h.contained.entity_type_id() == type_id)
            .cloned()
            .collect()
    }

    /// Many-to-many specs involving `T`.
    pub fn many_to_many<T: Entity>(&self) -> Result<Vec<ManyToManySpec>> {
        let model = self.model::<T>()?;
        Ok(self.many_to_many_of(model.entity_type_id()))
    }

    /// Many-to-many specs involving `type_id`.
    pub fn many_to_many_of(&self, type_id: TypeId) -> Vec<ManyToManySpec> {
        self.lock()
            .many_to_many
            .iter()
            .filter(|m| m.involves(type_id))
            .cloned()
            .collect()
    }

    /// The many-to-many spec linking `a` and `b`.
    pub fn many_to_many_spec(&self, a: TypeId, b: TypeId) -> Result<ManyToManySpec> {
        self.lock()
            .many_to_many
            .iter()
            .find(|m| m.involves(a) && m.involves(b))
            .cloned()
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnknownRelation,
                    format!("no many-to-many relation between {a:?} and {b:?}"),
                )
            })
    }

    /// Every registered model, in registration order.
    pub fn models(&self) -> Vec<Arc<EntityModel>> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.models.get(id).cloned())
            .collect()
    }

    /// Every registered many-to-many spec.
    pub fn all_many_to_many(&self) -> Vec<ManyToManySpec> {
        self.lock().many_to_many.clone()
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.lock().models.contains_key(&TypeId::of::<T>())
    }
}
