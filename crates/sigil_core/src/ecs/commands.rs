//! # Deferred Commands
//!
//! Structural changes recorded during a view pass and replayed afterwards.
//!
//! Entity creation hands out the id the store will allocate when the queue
//! is applied, so later commands in the same queue can target it.

use std::fmt;

use super::component::{component_name, Component};
use super::entity::EntityId;
use super::store::Store;
use crate::error::{StoreError, StoreResult};

/// One recorded change.
type Command = Box<dyn FnOnce(&mut Store) -> StoreResult<()>>;

/// Ordered queue of structural changes.
///
/// Obtained from [`Store::commands`] and applied with [`Store::apply`].
pub struct Commands {
    queue: Vec<Command>,
    /// Id the next queued creation will receive.
    next_entity: usize,
    /// Short description per command, for logs and `Debug`.
    labels: Vec<String>,
}

impl Commands {
    /// Creates an empty queue whose first reserved id is `next_entity`.
    pub(crate) fn new(next_entity: usize) -> Self {
        Self {
            queue: Vec::new(),
            next_entity,
            labels: Vec::new(),
        }
    }

    fn push(&mut self, label: String, command: Command) {
        self.labels.push(label);
        self.queue.push(command);
    }

    /// Queues creation of an entity and returns the id it will get.
    ///
    /// Applying fails with [`StoreError::CapacityExceeded`] if the store is
    /// full at that point, or [`StoreError::InvalidEntity`] if the store
    /// allocated other ids since this queue was created.
    pub fn create_entity(&mut self) -> EntityId {
        let reserved = EntityId::new(u32::try_from(self.next_entity).unwrap_or(u32::MAX));
        self.next_entity += 1;

        self.push(
            format!("create {reserved}"),
            Box::new(move |store: &mut Store| {
                // Rejected before anything is allocated
                let allocated = store.entity_count();
                if allocated != reserved.index() {
                    return Err(StoreError::InvalidEntity {
                        entity: reserved,
                        bound: u32::try_from(allocated).unwrap_or(u32::MAX),
                    });
                }
                store.create_entity().map(|_| ())
            }),
        );
        reserved
    }

    /// Queues attaching `value` to `entity`.
    pub fn attach<T: Component>(&mut self, entity: EntityId, value: T) {
        self.push(
            format!("attach {} to {entity}", component_name::<T>()),
            Box::new(move |store: &mut Store| store.attach(entity, value).map(|_| ())),
        );
    }

    /// Queues detaching the `T` of `entity`. The removed value is dropped.
    pub fn detach<T: Component>(&mut self, entity: EntityId) {
        self.push(
            format!("detach {} from {entity}", component_name::<T>()),
            Box::new(move |store: &mut Store| store.detach::<T>(entity).map(|_| ())),
        );
    }

    /// Queues destruction of `entity`.
    pub fn destroy_entity(&mut self, entity: EntityId) {
        self.push(
            format!("destroy {entity}"),
            Box::new(move |store: &mut Store| store.destroy_entity(entity)),
        );
    }

    /// Number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Checks if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Replays the queue against `store`, stopping at the first error.
    pub(crate) fn apply(self, store: &mut Store) -> StoreResult<()> {
        let total = self.queue.len();
        for (command, label) in self.queue.into_iter().zip(self.labels) {
            if let Err(error) = command(store) {
                tracing::warn!("Deferred command `{}` failed: {}", label, error);
                return Err(error);
            }
        }

        if total > 0 {
            tracing::debug!("Applied {} deferred commands", total);
        }
        Ok(())
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commands")
            .field("queue", &self.labels)
            .field("next_entity", &self.next_entity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Health {
        hp: i32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Shield;

    fn store() -> Store {
        let mut store = Store::with_capacity(8).unwrap();
        store.register_component::<Health>().unwrap();
        store.register_component::<Shield>().unwrap();
        store
    }

    #[test]
    fn test_reserved_ids_follow_store() {
        let mut store = store();
        store.create_entity().unwrap();

        let mut commands = store.commands();
        let a = commands.create_entity();
        let b = commands.create_entity();
        commands.attach(b, Health { hp: 4 });
        assert_eq!((a.raw(), b.raw()), (1, 2));
        assert_eq!(commands.len(), 3);

        store.apply(commands).unwrap();
        assert_eq!(store.entity_count(), 3);
        assert_eq!(store.get::<Health>(b).unwrap(), Some(&Health { hp: 4 }));
    }

    #[test]
    fn test_commands_apply_in_order() {
        let mut store = store();
        let e = store.create_entity().unwrap();

        let mut commands = store.commands();
        commands.attach(e, Shield);
        commands.attach(e, Health { hp: 1 });
        commands.detach::<Shield>(e);
        store.apply(commands).unwrap();

        assert!(!store.has::<Shield>(e).unwrap());
        assert_eq!(store.get::<Health>(e).unwrap(), Some(&Health { hp: 1 }));
    }

    #[test]
    fn test_apply_stops_at_first_error() {
        let mut store = store();
        let e = store.create_entity().unwrap();

        let mut commands = store.commands();
        commands.attach(e, Health { hp: 1 });
        commands.destroy_entity(e);
        commands.attach(e, Shield);
        commands.attach(EntityId::new(0), Health { hp: 9 });

        assert_eq!(store.apply(commands), Err(StoreError::DestroyedEntity(e)));
        assert!(!store.is_alive(e));
        assert_eq!(store.pool::<Shield>().unwrap().len(), 0);
    }

    #[test]
    fn test_stale_reservation_is_rejected() {
        let mut store = store();
        let mut commands = store.commands();
        let reserved = commands.create_entity();

        // Allocated behind the queue's back
        store.create_entity().unwrap();
        commands.attach(reserved, Health { hp: 1 });

        assert_eq!(
            store.apply(commands),
            Err(StoreError::InvalidEntity {
                entity: reserved,
                bound: 1
            })
        );
        // The failed creation allocated nothing
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.alive_count(), 1);
        assert!(store.pool::<Health>().unwrap().is_empty());
    }
}
