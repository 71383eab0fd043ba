//! # Views
//!
//! A view is a reusable query over a fixed list of component types. It
//! visits every entity whose signature is a superset of the view's
//! signature and hands the callback a mutable reference to each listed
//! component.
//!
//! ## Traversal
//!
//! ```text
//! for (signature, group) in index.matching_groups(view.signature) {
//!     for entity in group {
//!         callback(pool_1[entity], ..., pool_n[entity])
//!     }
//! }
//! ```
//!
//! ## Mutation during traversal
//!
//! A pass borrows the whole [`Store`] mutably, so the callback cannot
//! reach the store at all. Structural changes requested from inside a pass
//! go through [`View::for_each_with_commands`] and are applied once the
//! pass ends. Through a shared [`StoreHandle`](super::StoreHandle) the same
//! rule is checked at runtime and reported as
//! [`StoreError::MutationDuringIteration`].
//!
//! ## Example
//!
//! ```rust
//! use sigil_core::Store;
//!
//! struct Velocity { dx: f32, dy: f32 }
//! struct Transform { x: f32, y: f32 }
//!
//! let mut store = Store::default();
//! store.register_component::<Velocity>().unwrap();
//! store.register_component::<Transform>().unwrap();
//!
//! let e = store.create_entity().unwrap();
//! store.attach(e, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
//! store.attach(e, Transform { x: 0.0, y: 0.0 }).unwrap();
//!
//! let view = store.view::<(Velocity, Transform)>().unwrap();
//! view.for_each(&mut store, |(vel, tr): (&mut Velocity, &mut Transform)| {
//!     tr.x += vel.dx;
//!     tr.y += vel.dy;
//! })
//! .unwrap();
//!
//! assert_eq!(store.get::<Transform>(e).unwrap().map(|t| t.x), Some(1.0));
//! ```

use std::marker::PhantomData;

use super::commands::Commands;
use super::component::{component_name, Component};
use super::entity::{ComponentTypeId, EntityId};
use super::registry::TypeRegistry;
use super::signature::Signature;
use super::storage::{ErasedPool, PoolTable, SparseSet};
use super::store::Store;
use crate::error::{StoreError, StoreResult};

/// A compile-time list of component types that can be queried together.
///
/// Implemented for tuples of one to eight distinct component types. The
/// callback of a pass receives a tuple of `&mut` references in the same
/// order.
pub trait Query: 'static {
    /// Typed pools borrowed for the length of one pass.
    type Pools<'s>;

    /// What the callback receives for one entity.
    type Item<'a>;

    /// Resolves the component type ids, in tuple order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] if a type has no
    /// id, or [`StoreError::DuplicateComponentType`] if a type is listed
    /// twice.
    fn component_types(registry: &TypeRegistry) -> StoreResult<Vec<ComponentTypeId>>;

    /// Borrows the typed pool of every listed type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] if a pool is
    /// missing or holds another type.
    fn borrow_pools<'s>(pools: &'s mut PoolTable, ids: &[ComponentTypeId]) -> StoreResult<Self::Pools<'s>>;

    /// Resolves the components of one entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentAbsent`] if a pool has no value for
    /// the entity.
    fn fetch<'a, 's>(pools: &'a mut Self::Pools<'s>, entity: EntityId) -> StoreResult<Self::Item<'a>>;
}

/// Looks up the id of a query member that must already be registered.
fn registered_id<C: Component>(registry: &TypeRegistry) -> StoreResult<ComponentTypeId> {
    registry
        .get::<C>()
        .ok_or(StoreError::UnregisteredComponentType(component_name::<C>()))
}

/// Rejects a query that lists the same type twice.
fn ensure_distinct(registry: &TypeRegistry, ids: &[ComponentTypeId]) -> StoreResult<()> {
    for (position, id) in ids.iter().enumerate() {
        if ids[..position].contains(id) {
            return Err(StoreError::DuplicateComponentType(
                registry.name(*id).unwrap_or("<unnamed>"),
            ));
        }
    }
    Ok(())
}

/// Recovers the typed pool from an erased borrow.
fn downcast_pool<'p, C: Component>(
    pool: Option<&'p mut (dyn ErasedPool + 'static)>,
) -> StoreResult<&'p mut SparseSet<C>> {
    pool.and_then(|pool| pool.as_any_mut().downcast_mut::<SparseSet<C>>())
        .ok_or(StoreError::UnregisteredComponentType(component_name::<C>()))
}

macro_rules! impl_query {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Query for ($($name,)+) {
            type Pools<'s> = ($(&'s mut SparseSet<$name>,)+);
            type Item<'a> = ($(&'a mut $name,)+);

            fn component_types(registry: &TypeRegistry) -> StoreResult<Vec<ComponentTypeId>> {
                let ids = vec![$(registered_id::<$name>(registry)?),+];
                ensure_distinct(registry, &ids)?;
                Ok(ids)
            }

            fn borrow_pools<'s>(
                pools: &'s mut PoolTable,
                ids: &[ComponentTypeId],
            ) -> StoreResult<Self::Pools<'s>> {
                let mut borrowed = pools.disjoint_mut(ids).into_iter();
                Ok(($(downcast_pool::<$name>(borrowed.next().flatten())?,)+))
            }

            #[allow(non_snake_case)]
            fn fetch<'a, 's>(
                pools: &'a mut Self::Pools<'s>,
                entity: EntityId,
            ) -> StoreResult<Self::Item<'a>> {
                let ($($name,)+) = pools;
                Ok(($($name.resolve_mut(entity)?,)+))
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
impl_query!(A, B, C, D, E);
impl_query!(A, B, C, D, E, F);
impl_query!(A, B, C, D, E, F, G);
impl_query!(A, B, C, D, E, F, G, H);

/// Reusable query over the component types of `Q`.
///
/// Holds only the target signature and the component ids, never references
/// into the store, so it stays valid across any number of mutations and is
/// cheap to rebuild.
#[derive(Debug)]
pub struct View<Q: Query> {
    /// OR of the ids of every listed type.
    target: Signature,
    /// Ids in tuple order.
    ids: Vec<ComponentTypeId>,
    _query: PhantomData<fn() -> Q>,
}

impl<Q: Query> Clone for View<Q> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            ids: self.ids.clone(),
            _query: PhantomData,
        }
    }
}

impl<Q: Query> View<Q> {
    /// Builds a view against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredComponentType`] if a listed type
    /// has no pool, or [`StoreError::DuplicateComponentType`].
    pub fn new(store: &Store) -> StoreResult<Self> {
        let ids = Q::component_types(store.registry())?;
        if let Some(missing) = ids.iter().find(|id| !store.pools().is_registered(**id)) {
            return Err(StoreError::UnregisteredComponentType(
                store.registry().name(*missing).unwrap_or("<unnamed>"),
            ));
        }

        Ok(Self {
            target: ids.iter().copied().collect(),
            ids,
            _query: PhantomData,
        })
    }

    /// The signature every visited entity is a superset of.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.target
    }

    /// The component type ids, in tuple order.
    #[inline]
    #[must_use]
    pub fn component_types(&self) -> &[ComponentTypeId] {
        &self.ids
    }

    /// Fails if `store` assigns different ids to the view's types.
    fn ensure_built_for(&self, store: &Store) -> StoreResult<()> {
        if Q::component_types(store.registry())? == self.ids {
            Ok(())
        } else {
            Err(StoreError::ForeignView)
        }
    }

    /// Calls `f` with the components of every matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ForeignView`] if the view was built against a
    /// different store, or [`StoreError::ComponentAbsent`] if the index and
    /// a pool disagree (only possible after raw pool edits through
    /// [`Store::pool_mut`]).
    pub fn for_each<F>(&self, store: &mut Store, mut f: F) -> StoreResult<()>
    where
        F: for<'a> FnMut(Q::Item<'a>),
    {
        self.ensure_built_for(store)?;
        store.run_query::<Q, _>(&self.target, &self.ids, |_, item| {
            f(item);
            Ok(())
        })
    }

    /// Like [`View::for_each`], also passing the entity id.
    ///
    /// # Errors
    ///
    /// Same as [`View::for_each`].
    pub fn for_each_entity<F>(&self, store: &mut Store, mut f: F) -> StoreResult<()>
    where
        F: for<'a> FnMut(EntityId, Q::Item<'a>),
    {
        self.ensure_built_for(store)?;
        store.run_query::<Q, _>(&self.target, &self.ids, |entity, item| {
            f(entity, item);
            Ok(())
        })
    }

    /// Like [`View::for_each_entity`] with a fallible callback.
    ///
    /// The pass stops at the first error, which is returned.
    ///
    /// # Errors
    ///
    /// Same as [`View::for_each`], plus any error returned by `f`.
    pub fn try_for_each<F>(&self, store: &mut Store, f: F) -> StoreResult<()>
    where
        F: for<'a> FnMut(EntityId, Q::Item<'a>) -> StoreResult<()>,
    {
        self.ensure_built_for(store)?;
        store.run_query::<Q, _>(&self.target, &self.ids, f)
    }

    /// Runs a pass whose callback may queue structural changes.
    ///
    /// Queued commands are applied in order after the pass completes.
    ///
    /// # Errors
    ///
    /// Same as [`View::for_each`], plus the first error raised while
    /// applying the queued commands.
    pub fn for_each_with_commands<F>(&self, store: &mut Store, mut f: F) -> StoreResult<()>
    where
        F: for<'a> FnMut(EntityId, Q::Item<'a>, &mut Commands),
    {
        self.ensure_built_for(store)?;
        let mut commands = store.commands();
        store.run_query::<Q, _>(&self.target, &self.ids, |entity, item| {
            f(entity, item, &mut commands);
            Ok(())
        })?;
        store.apply(commands)
    }

    /// Returns the ids a pass would visit, in visiting order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ForeignView`] if the view was built against a
    /// different store.
    pub fn entities(&self, store: &Store) -> StoreResult<Vec<EntityId>> {
        self.ensure_built_for(store)?;
        Ok(store
            .index()
            .matching_groups(&self.target)
            .flat_map(|(_, group)| group.iter().copied())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Transform {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Health {
        hp: i32,
    }

    fn movement_store() -> Store {
        let mut store = Store::default();
        store.register_component::<Velocity>().unwrap();
        store.register_component::<Transform>().unwrap();
        store.register_component::<Health>().unwrap();
        store
    }

    #[test]
    fn test_single_pass_moves_transform() {
        let mut store = movement_store();
        let e0 = store.create_entity().unwrap();
        store.attach(e0, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
        store.attach(e0, Transform { x: 0.0, y: 0.0 }).unwrap();

        let view = store.view::<(Velocity, Transform)>().unwrap();
        view.for_each(&mut store, |(vel, tr): (&mut Velocity, &mut Transform)| {
            tr.x += vel.dx;
            tr.y += vel.dy;
        })
        .unwrap();

        assert_eq!(store.get::<Transform>(e0).unwrap(), Some(&Transform { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn test_view_skips_partial_entities() {
        let mut store = movement_store();
        let e0 = store.create_entity().unwrap();
        let e1 = store.create_entity().unwrap();
        store.attach(e0, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
        store.attach(e1, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
        store.attach(e1, Transform { x: 0.0, y: 0.0 }).unwrap();

        let view = store.view::<(Velocity, Transform)>().unwrap();
        let mut visited = Vec::new();
        view.for_each_entity(&mut store, |entity: EntityId, _: (&mut Velocity, &mut Transform)| {
            visited.push(entity);
        })
        .unwrap();

        assert_eq!(visited, vec![e1]);
        assert_eq!(view.entities(&store).unwrap(), vec![e1]);
    }

    #[test]
    fn test_view_matches_supersets() {
        let mut store = movement_store();
        let plain = store.create_entity().unwrap();
        let extra = store.create_entity().unwrap();
        for e in [plain, extra] {
            store.attach(e, Velocity { dx: 0.0, dy: 0.0 }).unwrap();
            store.attach(e, Transform { x: 0.0, y: 0.0 }).unwrap();
        }
        store.attach(extra, Health { hp: 3 }).unwrap();

        let view = store.view::<(Transform, Velocity)>().unwrap();
        let mut visited = view.entities(&store).unwrap();
        visited.sort();
        assert_eq!(visited, vec![plain, extra]);
    }

    #[test]
    fn test_view_rejects_unregistered_and_duplicates() {
        struct Unknown;
        let store = movement_store();

        assert!(matches!(
            store.view::<(Velocity, Unknown)>(),
            Err(StoreError::UnregisteredComponentType(_))
        ));
        assert!(matches!(
            store.view::<(Velocity, Velocity)>(),
            Err(StoreError::DuplicateComponentType(_))
        ));
    }

    #[test]
    fn test_borrow_pools_checks_each_slot() {
        let mut registry = TypeRegistry::new(8);
        let velocity = registry.id_of::<Velocity>().unwrap();
        let health = registry.id_of::<Health>().unwrap();
        let ids = <(Velocity, Health) as Query>::component_types(&registry).unwrap();
        assert_eq!(ids, vec![velocity, health]);

        // No pools installed yet
        let mut table = PoolTable::default();
        assert!(matches!(
            <(Velocity,) as Query>::borrow_pools(&mut table, &ids[..1]),
            Err(StoreError::UnregisteredComponentType(_))
        ));

        table.install::<Velocity>(velocity, 8, 0);
        table.install::<Health>(health, 8, 0);
        let (velocities, healths) =
            <(Velocity, Health) as Query>::borrow_pools(&mut table, &ids).unwrap();
        velocities.set(EntityId::new(1), Velocity { dx: 1.0, dy: 0.0 }).unwrap();
        assert!(healths.is_empty());

        // Pool of another type under the requested id
        assert!(matches!(
            <(Velocity,) as Query>::borrow_pools(&mut table, &[health]),
            Err(StoreError::UnregisteredComponentType(_))
        ));
    }

    #[test]
    fn test_view_signature_is_union() {
        let store = movement_store();
        let view = store.view::<(Health, Velocity)>().unwrap();
        let health = store.registry().get::<Health>().unwrap();
        let velocity = store.registry().get::<Velocity>().unwrap();

        assert_eq!(view.component_types(), &[health, velocity]);
        assert_eq!(view.signature().len(), 2);
        assert!(view.signature().contains(health));
        assert!(view.signature().contains(velocity));
    }

    #[test]
    fn test_foreign_view_is_rejected() {
        let mut first = Store::default();
        first.register_component::<Health>().unwrap();
        first.register_component::<Velocity>().unwrap();

        let mut second = Store::default();
        second.register_component::<Velocity>().unwrap();
        second.register_component::<Health>().unwrap();

        let view = first.view::<(Velocity,)>().unwrap();
        assert_eq!(
            view.for_each(&mut second, |_: (&mut Velocity,)| {}),
            Err(StoreError::ForeignView)
        );
    }

    #[test]
    fn test_try_for_each_stops_at_first_error() {
        let mut store = movement_store();
        for hp in 0..4 {
            let e = store.create_entity().unwrap();
            store.attach(e, Health { hp }).unwrap();
        }

        let view = store.view::<(Health,)>().unwrap();
        let mut calls = 0;
        let result = view.try_for_each(&mut store, |entity: EntityId, _: (&mut Health,)| {
            calls += 1;
            Err(StoreError::DestroyedEntity(entity))
        });

        assert!(matches!(result, Err(StoreError::DestroyedEntity(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_for_each_with_commands_defers_mutation() {
        let mut store = movement_store();
        let parent = store.create_entity().unwrap();
        store.attach(parent, Health { hp: 2 }).unwrap();

        let view = store.view::<(Health,)>().unwrap();
        view.for_each_with_commands(
            &mut store,
            |entity: EntityId, (health,): (&mut Health,), commands: &mut Commands| {
                health.hp -= 1;
                let child = commands.create_entity();
                commands.attach(child, Health { hp: health.hp });
                commands.attach(entity, Velocity { dx: 0.0, dy: 0.0 });
            },
        )
        .unwrap();

        assert_eq!(store.entity_count(), 2);
        assert_eq!(store.get::<Health>(EntityId::new(1)).unwrap(), Some(&Health { hp: 1 }));
        assert!(store.get::<Velocity>(parent).unwrap().is_some());
    }
}
