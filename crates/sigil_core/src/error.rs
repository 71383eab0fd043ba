//! # Store Error Types
//!
//! All errors that can occur while creating entities, attaching components
//! or running queries. Every condition is local and recoverable: it is
//! returned to the immediate caller and never retried.

use thiserror::Error;

use crate::ecs::{ComponentTypeId, EntityId, SystemId};

/// Errors that can occur in the component store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Entity id outside the valid range.
    ///
    /// At the store the range is every id allocated so far; at a raw pool it
    /// is the pool's sparse capacity.
    #[error("entity {entity} is outside the valid range 0..{bound}")]
    InvalidEntity {
        /// The offending entity.
        entity: EntityId,
        /// Exclusive upper bound of valid ids.
        bound: u32,
    },

    /// The entity existed but has been destroyed. Ids are never reused.
    #[error("entity {0} has been destroyed")]
    DestroyedEntity(EntityId),

    /// A typed operation named a component type that has no pool.
    #[error("component type `{0}` is not registered")]
    UnregisteredComponentType(&'static str),

    /// A runtime component id that the registry never assigned.
    #[error("component type id {0} was never assigned")]
    UnknownComponentTypeId(ComponentTypeId),

    /// Checked reference resolution found no component for the entity.
    #[error("entity {entity} has no `{component}` component")]
    ComponentAbsent {
        /// The entity that was looked up.
        entity: EntityId,
        /// Name of the missing component type.
        component: &'static str,
    },

    /// Structural mutation requested while an iteration holds the store.
    #[error("structural mutation attempted during view iteration")]
    MutationDuringIteration,

    /// Non-mutating access requested while an iteration holds the store.
    #[error("store is borrowed by an iteration in progress")]
    IterationInProgress,

    /// A view listed the same component type more than once.
    #[error("component type `{0}` appears more than once in a view")]
    DuplicateComponentType(&'static str),

    /// No more entity ids can be allocated.
    #[error("entity capacity exhausted: capacity {capacity}")]
    CapacityExceeded {
        /// Configured maximum number of entities.
        capacity: u32,
    },

    /// No more component type ids can be assigned.
    #[error("component type limit reached: limit {limit}")]
    TooManyComponentTypes {
        /// Configured maximum number of component types.
        limit: u16,
    },

    /// A system id that was never registered.
    #[error("system {0} is not registered")]
    UnknownSystem(SystemId),

    /// A view built against another store, whose registry assigned
    /// different ids to the view's component types.
    #[error("view was built against a different store")]
    ForeignView,

    /// Invalid configuration file or values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::InvalidEntity {
            entity: EntityId::new(12),
            bound: 4,
        };
        assert_eq!(err.to_string(), "entity 12 is outside the valid range 0..4");

        let err = StoreError::ComponentAbsent {
            entity: EntityId::new(3),
            component: "Health",
        };
        assert_eq!(err.to_string(), "entity 3 has no `Health` component");
    }
}
