//! # Shared Store Handle
//!
//! A cloneable, single-threaded handle around a [`Store`].
//!
//! Code that only holds `&mut Store` cannot touch the store from inside a
//! view callback; the borrow checker rules it out. Application code that
//! shares the store between several owners (event callbacks, scripted
//! behaviours) goes through this handle instead, and the same rule is
//! checked at runtime:
//!
//! | Called during `for_each`        | Result                                 |
//! |---------------------------------|----------------------------------------|
//! | `create_entity`, `attach`, ...  | [`StoreError::MutationDuringIteration`] |
//! | `get`, `read`, nested `for_each` | [`StoreError::IterationInProgress`]   |
//!
//! The handle is `!Send` and `!Sync`.

use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::component::Component;
use super::entity::{ComponentTypeId, EntityId, SystemId};
use super::signature::Signature;
use super::store::Store;
use super::view::Query;
use crate::error::{StoreError, StoreResult};

struct Shared {
    store: RefCell<Store>,
    iterating: Cell<bool>,
}

/// Clears the iteration flag when a pass ends, including by panic.
struct IterationGuard<'h> {
    flag: &'h Cell<bool>,
}

impl<'h> IterationGuard<'h> {
    fn enter(flag: &'h Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for IterationGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Reference-counted handle to a store with an iteration guard.
///
/// # Example
///
/// ```rust
/// use sigil_core::{Store, StoreError, StoreHandle};
///
/// struct Health { hp: i32 }
///
/// let handle = StoreHandle::new(Store::default());
/// handle.register_component::<Health>().unwrap();
/// let e = handle.create_entity().unwrap();
/// handle.attach(e, Health { hp: 3 }).unwrap();
///
/// let inner = handle.clone();
/// handle
///     .for_each::<(Health,), _>(|(health,): (&mut Health,)| {
///         health.hp -= 1;
///         assert_eq!(inner.create_entity(), Err(StoreError::MutationDuringIteration));
///     })
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StoreHandle {
    shared: Rc<Shared>,
}

impl From<Store> for StoreHandle {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}

impl StoreHandle {
    /// Wraps `store` in a new handle.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            shared: Rc::new(Shared {
                store: RefCell::new(store),
                iterating: Cell::new(false),
            }),
        }
    }

    /// Checks if a `for_each` on this store is running.
    #[inline]
    #[must_use]
    pub fn is_iterating(&self) -> bool {
        self.shared.iterating.get()
    }

    /// Borrows the store for a structural change.
    fn structural(&self) -> StoreResult<RefMut<'_, Store>> {
        if self.is_iterating() {
            return Err(StoreError::MutationDuringIteration);
        }
        self.shared
            .store
            .try_borrow_mut()
            .map_err(|_| StoreError::IterationInProgress)
    }

    /// Runs `f` with shared access to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IterationInProgress`] while a pass (or a
    /// [`StoreHandle::write`]) holds the store.
    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> StoreResult<R> {
        let store = self
            .shared
            .store
            .try_borrow()
            .map_err(|_| StoreError::IterationInProgress)?;
        Ok(f(&store))
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MutationDuringIteration`] during a pass.
    pub fn write<R>(&self, f: impl FnOnce(&mut Store) -> R) -> StoreResult<R> {
        let mut store = self.structural()?;
        Ok(f(&mut store))
    }

    /// See [`Store::register_component`].
    ///
    /// # Errors
    ///
    /// As [`Store::register_component`], plus
    /// [`StoreError::MutationDuringIteration`].
    pub fn register_component<T: Component>(&self) -> StoreResult<ComponentTypeId> {
        self.structural()?.register_component::<T>()
    }

    /// See [`Store::register_system`].
    ///
    /// # Errors
    ///
    /// As [`Store::register_system`], plus
    /// [`StoreError::MutationDuringIteration`].
    pub fn register_system(
        &self,
        system: SystemId,
        component_types: &[ComponentTypeId],
    ) -> StoreResult<Signature> {
        self.structural()?.register_system(system, component_types)
    }

    /// See [`Store::create_entity`].
    ///
    /// # Errors
    ///
    /// As [`Store::create_entity`], plus
    /// [`StoreError::MutationDuringIteration`].
    pub fn create_entity(&self) -> StoreResult<EntityId> {
        self.structural()?.create_entity()
    }

    /// See [`Store::attach`]. The stored value stays inside the store.
    ///
    /// # Errors
    ///
    /// As [`Store::attach`], plus [`StoreError::MutationDuringIteration`].
    pub fn attach<T: Component>(&self, entity: EntityId, value: T) -> StoreResult<()> {
        self.structural()?.attach(entity, value).map(|_| ())
    }

    /// See [`Store::detach`].
    ///
    /// # Errors
    ///
    /// As [`Store::detach`], plus [`StoreError::MutationDuringIteration`].
    pub fn detach<T: Component>(&self, entity: EntityId) -> StoreResult<Option<T>> {
        self.structural()?.detach::<T>(entity)
    }

    /// See [`Store::destroy_entity`].
    ///
    /// # Errors
    ///
    /// As [`Store::destroy_entity`], plus
    /// [`StoreError::MutationDuringIteration`].
    pub fn destroy_entity(&self, entity: EntityId) -> StoreResult<()> {
        self.structural()?.destroy_entity(entity)
    }

    /// Returns a copy of the `T` of `entity`.
    ///
    /// # Errors
    ///
    /// As [`Store::get`], plus [`StoreError::IterationInProgress`].
    pub fn get<T: Component + Clone>(&self, entity: EntityId) -> StoreResult<Option<T>> {
        self.read(|store| store.get::<T>(entity).map(|value| value.cloned()))?
    }

    /// See [`Store::matches_system`].
    ///
    /// # Errors
    ///
    /// As [`Store::matches_system`], plus
    /// [`StoreError::IterationInProgress`].
    pub fn matches_system(&self, entity: EntityId, system: SystemId) -> StoreResult<bool> {
        self.read(|store| store.matches_system(entity, system))?
    }

    /// Runs one pass over `Q`, holding the iteration guard throughout.
    ///
    /// # Errors
    ///
    /// As [`View::for_each`](super::View::for_each), plus
    /// [`StoreError::IterationInProgress`] if called from inside another
    /// pass.
    pub fn for_each<Q, F>(&self, f: F) -> StoreResult<()>
    where
        Q: Query,
        F: for<'a> FnMut(Q::Item<'a>),
    {
        if self.is_iterating() {
            return Err(StoreError::IterationInProgress);
        }
        let mut store = self
            .shared
            .store
            .try_borrow_mut()
            .map_err(|_| StoreError::IterationInProgress)?;

        let _guard = IterationGuard::enter(&self.shared.iterating);
        store.for_each::<Q, F>(f)
    }

    /// Like [`StoreHandle::for_each`], also passing the entity id.
    ///
    /// # Errors
    ///
    /// Same as [`StoreHandle::for_each`].
    pub fn for_each_entity<Q, F>(&self, f: F) -> StoreResult<()>
    where
        Q: Query,
        F: for<'a> FnMut(EntityId, Q::Item<'a>),
    {
        if self.is_iterating() {
            return Err(StoreError::IterationInProgress);
        }
        let mut store = self
            .shared
            .store
            .try_borrow_mut()
            .map_err(|_| StoreError::IterationInProgress)?;

        let view = store.view::<Q>()?;
        let _guard = IterationGuard::enter(&self.shared.iterating);
        view.for_each_entity(&mut store, f)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("handles", &Rc::strong_count(&self.shared))
            .field("iterating", &self.is_iterating())
            .finish()
    }
}
