//! # Component Storage
//!
//! Sparse-set pools, one per component type.
//!
//! Each pool keeps three parallel structures:
//! - `sparse`: fixed-size array, entity id -> dense slot (or [`ABSENT`])
//! - `dense`: packed component values, iterated contiguously
//! - `dense_to_entity`: dense slot -> owning entity
//!
//! Insert, lookup and delete are all O(1). Delete swaps the last dense slot
//! into the hole, so at most one other entity changes slot.
//!
//! Slots are internal. Callers address components by entity id and resolve
//! them on demand; no reference handed out survives a later mutation.

use std::any::Any;

use super::component::{component_name, Component};
use super::entity::{ComponentTypeId, EntityId};
use crate::error::{StoreError, StoreResult};

/// Sparse entry meaning "no component for this entity".
const ABSENT: u32 = u32::MAX;

/// Pre-allocated sparse-set storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust
/// use sigil_core::{EntityId, SparseSet};
///
/// let mut pool: SparseSet<u32> = SparseSet::new(16);
/// pool.set(EntityId::new(3), 7).unwrap();
/// assert_eq!(pool.get(EntityId::new(3)).unwrap(), Some(&7));
/// ```
#[derive(Debug)]
pub struct SparseSet<C: Component> {
    /// Entity id -> dense slot. Length is the pool capacity.
    sparse: Box<[u32]>,
    /// Packed component values.
    dense: Vec<C>,
    /// Dense slot -> owning entity.
    dense_to_entity: Vec<EntityId>,
}

impl<C: Component> SparseSet<C> {
    /// Creates an empty pool addressing entity ids `0..capacity`.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self::with_dense_capacity(capacity, 0)
    }

    /// Creates an empty pool and reserves `dense_capacity` value slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_dense_capacity(capacity: u32, dense_capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            sparse: vec![ABSENT; capacity as usize].into_boxed_slice(),
            dense: Vec::with_capacity(dense_capacity),
            dense_to_entity: Vec::with_capacity(dense_capacity),
        }
    }

    /// Returns the number of entity ids this pool can address.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        // Built from a u32 in `with_dense_capacity`
        u32::try_from(self.sparse.len()).unwrap_or(u32::MAX)
    }

    /// Returns the number of stored components (dense size).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Looks up the sparse entry, rejecting ids outside the capacity.
    #[inline]
    fn slot_of(&self, entity: EntityId) -> StoreResult<Option<usize>> {
        match self.sparse.get(entity.index()) {
            Some(&ABSENT) => Ok(None),
            Some(&slot) => Ok(Some(slot as usize)),
            None => Err(StoreError::InvalidEntity {
                entity,
                bound: self.capacity(),
            }),
        }
    }

    /// Checks if `entity` has a component in this pool.
    ///
    /// Out-of-range ids simply report `false`.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        matches!(self.slot_of(entity), Ok(Some(_)))
    }

    /// Sets the component for `entity`.
    ///
    /// An existing value is overwritten in place (no new slot). Otherwise the
    /// value is appended to the dense array.
    ///
    /// # Returns
    ///
    /// Mutable reference to the stored value. The borrow ends before any
    /// further mutation of the pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] if the id is outside the
    /// pool's capacity.
    pub fn set(&mut self, entity: EntityId, value: C) -> StoreResult<&mut C> {
        if let Some(slot) = self.slot_of(entity)? {
            let stored = &mut self.dense[slot];
            *stored = value;
            return Ok(stored);
        }

        let slot = self.dense.len();
        // dense never outgrows sparse, which is u32-indexed
        self.sparse[entity.index()] = slot as u32;
        self.dense.push(value);
        self.dense_to_entity.push(entity);
        Ok(&mut self.dense[slot])
    }

    /// Gets the component for `entity`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the entity has no component in this pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] if the id is outside the
    /// pool's capacity.
    #[inline]
    pub fn get(&self, entity: EntityId) -> StoreResult<Option<&C>> {
        Ok(self.slot_of(entity)?.map(|slot| &self.dense[slot]))
    }

    /// Gets the component for `entity` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] if the id is outside the
    /// pool's capacity.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> StoreResult<Option<&mut C>> {
        Ok(self.slot_of(entity)?.map(|slot| &mut self.dense[slot]))
    }

    /// Resolves the component for an entity that is expected to hold one.
    ///
    /// Used by views, where group membership already implies presence; a
    /// miss means the index and the pool disagree and is reported rather
    /// than dereferenced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentAbsent`] if there is no component and
    /// [`StoreError::InvalidEntity`] if the id is out of range.
    #[inline]
    pub fn resolve_mut(&mut self, entity: EntityId) -> StoreResult<&mut C> {
        self.get_mut(entity)?.ok_or(StoreError::ComponentAbsent {
            entity,
            component: component_name::<C>(),
        })
    }

    /// Removes the component for `entity`, returning it.
    ///
    /// The last dense slot is swapped into the vacated position and its
    /// owner's sparse entry is repointed. Removing an absent component is a
    /// no-op returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntity`] if the id is outside the
    /// pool's capacity.
    pub fn remove(&mut self, entity: EntityId) -> StoreResult<Option<C>> {
        let Some(slot) = self.slot_of(entity)? else {
            return Ok(None);
        };

        let value = self.dense.swap_remove(slot);
        self.dense_to_entity.swap_remove(slot);
        self.sparse[entity.index()] = ABSENT;

        // Something was moved into the hole unless we removed the last slot
        if let Some(&moved) = self.dense_to_entity.get(slot) {
            self.sparse[moved.index()] = slot as u32;
        }

        Ok(Some(value))
    }

    /// Returns the owning entities in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.dense_to_entity
    }

    /// Returns the packed component values in dense order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.dense
    }

    /// Iterates over all components with their owners.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.dense_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Iterates mutably over all components with their owners.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.dense_to_entity.iter().copied().zip(self.dense.iter_mut())
    }
}

/// Object-safe view of a pool whose component type is erased.
///
/// The store keeps every pool behind this trait and recovers the concrete
/// `SparseSet<C>` with a checked [`Any`] downcast.
pub trait ErasedPool: Any {
    /// Upcast for downcasting to the concrete pool.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete pool.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Drops the component of `entity`, if present.
    ///
    /// Returns `true` if a component was removed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;

    /// Checks if `entity` has a component in this pool.
    fn contains_entity(&self, entity: EntityId) -> bool;

    /// Number of stored components.
    fn component_count(&self) -> usize;

    /// Name of the stored component type.
    fn component_name(&self) -> &'static str;
}

impl<C: Component> ErasedPool for SparseSet<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        matches!(self.remove(entity), Ok(Some(_)))
    }

    fn contains_entity(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }

    fn component_count(&self) -> usize {
        self.len()
    }

    fn component_name(&self) -> &'static str {
        component_name::<C>()
    }
}

/// All pools of a store, indexed by component type id.
///
/// A slot is `None` while its type has an id but no registered pool.
#[derive(Default)]
pub struct PoolTable {
    pools: Vec<Option<Box<dyn ErasedPool>>>,
}

impl PoolTable {
    /// Installs a pool for `C` under `id` unless one exists.
    ///
    /// Returns `true` if a new pool was created.
    pub(crate) fn install<C: Component>(
        &mut self,
        id: ComponentTypeId,
        capacity: u32,
        dense_capacity: usize,
    ) -> bool {
        if self.pools.len() <= id.index() {
            self.pools.resize_with(id.index() + 1, || None);
        }

        let slot = &mut self.pools[id.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(Box::new(SparseSet::<C>::with_dense_capacity(
            capacity,
            dense_capacity,
        )));
        true
    }

    /// Checks if a pool is installed under `id`.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, id: ComponentTypeId) -> bool {
        matches!(self.pools.get(id.index()), Some(Some(_)))
    }

    /// Gets the erased pool under `id`.
    #[inline]
    #[must_use]
    pub fn erased(&self, id: ComponentTypeId) -> Option<&dyn ErasedPool> {
        self.pools.get(id.index())?.as_deref()
    }

    /// Gets the erased pool under `id` mutably.
    #[inline]
    pub fn erased_mut(&mut self, id: ComponentTypeId) -> Option<&mut (dyn ErasedPool + 'static)> {
        match self.pools.get_mut(id.index()) {
            Some(Some(pool)) => Some(pool.as_mut()),
            _ => None,
        }
    }

    /// Gets the typed pool under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] if no pool of type
    /// `C` is installed under `id`.
    pub fn typed<C: Component>(&self, id: ComponentTypeId) -> StoreResult<&SparseSet<C>> {
        self.erased(id)
            .and_then(|pool| pool.as_any().downcast_ref::<SparseSet<C>>())
            .ok_or(StoreError::UnregisteredComponentType(component_name::<C>()))
    }

    /// Gets the typed pool under `id` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] if no pool of type
    /// `C` is installed under `id`.
    pub fn typed_mut<C: Component>(&mut self, id: ComponentTypeId) -> StoreResult<&mut SparseSet<C>> {
        self.erased_mut(id)
            .and_then(|pool| pool.as_any_mut().downcast_mut::<SparseSet<C>>())
            .ok_or(StoreError::UnregisteredComponentType(component_name::<C>()))
    }

    /// Borrows several distinct pools mutably at once.
    ///
    /// The result is in the order of `ids`; a slot is `None` when no pool
    /// is installed under that id. Ids must be pairwise distinct.
    pub fn disjoint_mut(
        &mut self,
        ids: &[ComponentTypeId],
    ) -> Vec<Option<&mut (dyn ErasedPool + 'static)>> {
        let mut borrowed: Vec<Option<&mut (dyn ErasedPool + 'static)>> = ids.iter().map(|_| None).collect();

        for (index, slot) in self.pools.iter_mut().enumerate() {
            let Some(pool) = slot else { continue };
            if let Some(position) = ids.iter().position(|id| id.index() == index) {
                borrowed[position] = Some(pool.as_mut());
            }
        }

        borrowed
    }

    /// Iterates every installed pool.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn ErasedPool + 'static)> + '_ {
        self.pools
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|pool| pool.as_mut()))
    }
}

impl std::fmt::Debug for PoolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.pools
                    .iter()
                    .flatten()
                    .map(|pool| (pool.component_name(), pool.component_count())),
            )
            .finish()
    }
}
