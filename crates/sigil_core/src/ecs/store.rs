//! # Component Store
//!
//! The facade owning every pool and the signature index.
//!
//! ## Lifecycle
//!
//! ```text
//! create_entity      -> signature {}        group {}
//! attach(e, Vel)     -> signature {Vel}     group {} -> {Vel}
//! attach(e, Tr)      -> signature {Vel,Tr}  group {Vel} -> {Vel,Tr}
//! detach::<Vel>(e)   -> signature {Tr}      group {Vel,Tr} -> {Tr}
//! destroy_entity(e)  -> dead                erased from {Tr}
//! ```
//!
//! Entity ids are allocated densely from zero and never reused. A
//! destroyed id stays allocated and every later operation on it fails
//! with [`StoreError::DestroyedEntity`].

use super::commands::Commands;
use super::component::{component_name, Component};
use super::entity::{ComponentTypeId, EntityId, SystemId};
use super::index::SignatureIndex;
use super::registry::TypeRegistry;
use super::signature::Signature;
use super::storage::{PoolTable, SparseSet};
use super::view::{Query, View};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Entities, their components and the signature index over them.
///
/// # Capacity
///
/// The entity capacity is fixed at creation. Every pool's sparse array is
/// allocated at that size when its type is registered.
///
/// # Example
///
/// ```rust
/// use sigil_core::Store;
///
/// #[derive(Debug, PartialEq)]
/// struct Health { hp: i32 }
///
/// let mut store = Store::with_capacity(128).unwrap();
/// store.register_component::<Health>().unwrap();
///
/// let e = store.create_entity().unwrap();
/// store.attach(e, Health { hp: 10 }).unwrap();
/// store.attach(e, Health { hp: 7 }).unwrap();
///
/// assert_eq!(store.get::<Health>(e).unwrap(), Some(&Health { hp: 7 }));
/// assert_eq!(store.pool::<Health>().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct Store {
    /// Capacities fixed at creation.
    config: StoreConfig,
    /// Type -> id table.
    registry: TypeRegistry,
    /// One pool per registered type.
    pools: PoolTable,
    /// Signature -> group, plus system signatures.
    index: SignatureIndex,
    /// Entity id -> current signature; `None` once destroyed.
    signatures: Vec<Option<Signature>>,
    /// Number of live entities.
    alive_count: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self::from_valid(StoreConfig::default())
    }
}

impl Store {
    /// Creates a store with the given capacities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the config does not
    /// validate.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Creates a store holding up to `max_entities` entities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if `max_entities` is zero.
    pub fn with_capacity(max_entities: u32) -> StoreResult<Self> {
        Self::new(StoreConfig::with_max_entities(max_entities))
    }

    fn from_valid(config: StoreConfig) -> Self {
        Self {
            registry: TypeRegistry::new(config.max_component_types),
            pools: PoolTable::default(),
            index: SignatureIndex::new(),
            signatures: Vec::new(),
            alive_count: 0,
            config,
        }
    }

    /// Returns the configuration this store was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the component type registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Returns the signature index.
    #[inline]
    #[must_use]
    pub fn index(&self) -> &SignatureIndex {
        &self.index
    }

    #[inline]
    pub(crate) fn pools(&self) -> &PoolTable {
        &self.pools
    }

    // =========================================================================
    // Component types
    // =========================================================================

    /// Registers `T`, allocating its pool.
    ///
    /// Registering an already registered type is a no-op returning the
    /// same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TooManyComponentTypes`] when the type limit is
    /// reached.
    pub fn register_component<T: Component>(&mut self) -> StoreResult<ComponentTypeId> {
        let id = self.registry.id_of::<T>()?;
        let created = self.pools.install::<T>(
            id,
            self.config.max_entities,
            self.config.dense_capacity_hint,
        );
        if created {
            tracing::debug!("Registered component type {} (id: {})", component_name::<T>(), id);
        }
        Ok(id)
    }

    /// Returns the id of `T`, assigning one if `T` was never referenced.
    ///
    /// Assigning an id does not allocate a pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TooManyComponentTypes`] when the type limit is
    /// reached.
    pub fn component_type_id<T: Component>(&mut self) -> StoreResult<ComponentTypeId> {
        self.registry.id_of::<T>()
    }

    /// Checks if `T` has a pool.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.registered_id::<T>().is_ok()
    }

    fn registered_id<T: Component>(&self) -> StoreResult<ComponentTypeId> {
        self.registry
            .get::<T>()
            .filter(|id| self.pools.is_registered(*id))
            .ok_or(StoreError::UnregisteredComponentType(component_name::<T>()))
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Allocates the next entity id with the empty signature.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] once `max_entities` ids have
    /// been allocated. Destroyed ids are not recycled.
    pub fn create_entity(&mut self) -> StoreResult<EntityId> {
        let next = u32::try_from(self.signatures.len())
            .ok()
            .filter(|next| *next < self.config.max_entities);
        let Some(next) = next else {
            tracing::warn!(
                "Entity capacity exhausted ({} entities)",
                self.config.max_entities
            );
            return Err(StoreError::CapacityExceeded {
                capacity: self.config.max_entities,
            });
        };

        let entity = EntityId::new(next);
        self.signatures.push(Some(Signature::EMPTY));
        self.index.insert(entity, Signature::EMPTY);
        self.alive_count += 1;
        Ok(entity)
    }

    /// Destroys `entity`: frees every pool slot it holds and erases it from
    /// its group. The id is never handed out again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] for an id never allocated and
    /// [`StoreError::DestroyedEntity`] if already destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> StoreResult<()> {
        let signature = self.live_signature(entity)?;

        // Every pool, not just the signature's: raw pool edits may have
        // left slots the signature does not claim
        for pool in self.pools.iter_mut() {
            pool.remove_entity(entity);
        }
        self.index.remove(entity, &signature);
        self.signatures[entity.index()] = None;
        self.alive_count -= 1;

        tracing::debug!(
            "Destroyed entity {} ({} components freed)",
            entity,
            signature.len()
        );
        Ok(())
    }

    /// Checks if `entity` was allocated and not destroyed.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        matches!(self.signatures.get(entity.index()), Some(Some(_)))
    }

    /// Number of ids allocated so far, destroyed ones included.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.signatures.len()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the current signature of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] or
    /// [`StoreError::DestroyedEntity`].
    pub fn signature_of(&self, entity: EntityId) -> StoreResult<Signature> {
        self.live_signature(entity)
    }

    fn live_signature(&self, entity: EntityId) -> StoreResult<Signature> {
        match self.signatures.get(entity.index()) {
            Some(Some(signature)) => Ok(*signature),
            Some(None) => Err(StoreError::DestroyedEntity(entity)),
            None => Err(StoreError::InvalidEntity {
                entity,
                bound: u32::try_from(self.signatures.len()).unwrap_or(u32::MAX),
            }),
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `value` to `entity`, replacing any existing `T`.
    ///
    /// A new component moves the entity to the group of its extended
    /// signature. Replacing an existing one writes in place and leaves the
    /// entity in its group.
    ///
    /// # Returns
    ///
    /// Mutable reference to the stored value, valid until the next call on
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`],
    /// [`StoreError::DestroyedEntity`] or
    /// [`StoreError::UnregisteredComponentType`].
    pub fn attach<T: Component>(&mut self, entity: EntityId, value: T) -> StoreResult<&mut T> {
        let current = self.live_signature(entity)?;
        let id = self.registered_id::<T>()?;

        let stored = self.pools.typed_mut::<T>(id)?.set(entity, value)?;

        // Raw pool edits may have diverged from the signature
        if !current.contains(id) {
            let next = current.with(id);
            self.index.move_entity(entity, &current, next);
            self.signatures[entity.index()] = Some(next);
        }
        Ok(stored)
    }

    /// Removes the `T` of `entity`, returning it.
    ///
    /// The entity moves to the group of its reduced signature. Detaching a
    /// component the entity does not have returns `Ok(None)`. If the
    /// signature still claims `T` after a raw pool removal, the entity is
    /// migrated anyway and `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Same as [`Store::attach`].
    pub fn detach<T: Component>(&mut self, entity: EntityId) -> StoreResult<Option<T>> {
        let current = self.live_signature(entity)?;
        let id = self.registered_id::<T>()?;

        let removed = self.pools.typed_mut::<T>(id)?.remove(entity)?;
        if current.contains(id) {
            let next = current.without(id);
            self.index.move_entity(entity, &current, next);
            self.signatures[entity.index()] = Some(next);
        }
        Ok(removed)
    }

    /// Gets the `T` of `entity`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the entity has no `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::attach`].
    pub fn get<T: Component>(&self, entity: EntityId) -> StoreResult<Option<&T>> {
        self.live_signature(entity)?;
        let id = self.registered_id::<T>()?;
        self.pools.typed::<T>(id)?.get(entity)
    }

    /// Gets the `T` of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`Store::attach`].
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> StoreResult<Option<&mut T>> {
        self.live_signature(entity)?;
        let id = self.registered_id::<T>()?;
        self.pools.typed_mut::<T>(id)?.get_mut(entity)
    }

    /// Checks if `entity` has a `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::attach`].
    pub fn has<T: Component>(&self, entity: EntityId) -> StoreResult<bool> {
        Ok(self.get::<T>(entity)?.is_some())
    }

    /// Returns the raw pool for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`].
    pub fn pool<T: Component>(&self) -> StoreResult<&SparseSet<T>> {
        let id = self.registered_id::<T>()?;
        self.pools.typed::<T>(id)
    }

    /// Returns the raw pool for `T` mutably.
    ///
    /// Edits made here bypass the signature index. Removing a value
    /// directly leaves the entity in a group that claims the component;
    /// views then report [`StoreError::ComponentAbsent`] for it. Use
    /// [`Store::detach`] to keep the two in step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`].
    pub fn pool_mut<T: Component>(&mut self) -> StoreResult<&mut SparseSet<T>> {
        let id = self.registered_id::<T>()?;
        self.pools.typed_mut::<T>(id)
    }

    // =========================================================================
    // Systems (runtime ids)
    // =========================================================================

    /// Stores the required signature of `system`, replacing any earlier
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownComponentTypeId`] for an id the
    /// registry never assigned.
    pub fn register_system(
        &mut self,
        system: SystemId,
        component_types: &[ComponentTypeId],
    ) -> StoreResult<Signature> {
        if let Some(unknown) = component_types
            .iter()
            .find(|id| !self.registry.is_assigned(**id))
        {
            return Err(StoreError::UnknownComponentTypeId(*unknown));
        }

        let required: Signature = component_types.iter().copied().collect();
        self.index.register_system(system, required);
        tracing::debug!(
            "Registered system {} requiring {} component types",
            system,
            required.len()
        );
        Ok(required)
    }

    /// Stores the signature of the query `Q` as the requirement of
    /// `system`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] or
    /// [`StoreError::DuplicateComponentType`].
    pub fn register_system_for<Q: Query>(&mut self, system: SystemId) -> StoreResult<Signature> {
        let ids = Q::component_types(&self.registry)?;
        self.register_system(system, &ids)
    }

    /// Returns the required signature of `system`.
    #[must_use]
    pub fn system_signature(&self, system: SystemId) -> Option<&Signature> {
        self.index.system_signature(system)
    }

    /// Checks if `entity` holds every component `system` requires.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownSystem`], [`StoreError::InvalidEntity`]
    /// or [`StoreError::DestroyedEntity`].
    pub fn matches_system(&self, entity: EntityId, system: SystemId) -> StoreResult<bool> {
        let signature = self.live_signature(entity)?;
        let required = self
            .index
            .system_signature(system)
            .ok_or(StoreError::UnknownSystem(system))?;
        Ok(signature.contains_all(required))
    }

    /// Linear scan for live entities whose signature is a superset of
    /// `target`, in id order.
    ///
    /// Visits every allocated id. Views answer the same question through
    /// the index; this is the slow path used to cross-check them.
    #[must_use]
    pub fn scan_matching(&self, target: &Signature) -> Vec<EntityId> {
        self.signatures
            .iter()
            .enumerate()
            .filter_map(|(index, signature)| match signature {
                Some(signature) if signature.contains_all(target) => {
                    u32::try_from(index).ok().map(EntityId::new)
                }
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Builds a view over the component types of `Q`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] or
    /// [`StoreError::DuplicateComponentType`].
    pub fn view<Q: Query>(&self) -> StoreResult<View<Q>> {
        View::new(self)
    }

    /// Builds a view over `Q` and runs one pass.
    ///
    /// # Errors
    ///
    /// Same as [`Store::view`] and [`View::for_each`].
    pub fn for_each<Q, F>(&mut self, f: F) -> StoreResult<()>
    where
        Q: Query,
        F: for<'a> FnMut(Q::Item<'a>),
    {
        let view = self.view::<Q>()?;
        view.for_each(self, f)
    }

    /// Walks every group matching `target` and calls `f` for each entity.
    pub(crate) fn run_query<Q, F>(
        &mut self,
        target: &Signature,
        ids: &[ComponentTypeId],
        mut f: F,
    ) -> StoreResult<()>
    where
        Q: Query,
        F: for<'a> FnMut(EntityId, Q::Item<'a>) -> StoreResult<()>,
    {
        let mut pools = Q::borrow_pools(&mut self.pools, ids)?;
        for (_, group) in self.index.matching_groups(target) {
            for &entity in group {
                let item = Q::fetch(&mut pools, entity)?;
                f(entity, item)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Deferred mutation
    // =========================================================================

    /// Creates an empty command queue whose reserved entity ids follow the
    /// ids allocated so far.
    #[must_use]
    pub fn commands(&self) -> Commands {
        Commands::new(self.signatures.len())
    }

    /// Applies queued commands in order, stopping at the first error.
    ///
    /// Commands before the failing one stay applied.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing command.
    pub fn apply(&mut self, commands: Commands) -> StoreResult<()> {
        commands.apply(self)
    }
}
