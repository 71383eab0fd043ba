//! # Component Type Registry
//!
//! Assigns each component type a small, stable id the first time the type
//! is referenced. Ids come from a counter owned by the registry (one per
//! store), so two stores never share or collide on ids.

use std::any::TypeId;
use std::collections::HashMap;

use super::component::{component_name, Component};
use super::entity::ComponentTypeId;
use crate::error::{StoreError, StoreResult};

/// Type -> id table for one store.
#[derive(Debug)]
pub struct TypeRegistry {
    /// Assigned ids, keyed by Rust type identity.
    ids: HashMap<TypeId, ComponentTypeId>,
    /// Type names, indexed by id.
    names: Vec<&'static str>,
    /// Maximum number of ids this registry may assign.
    limit: u16,
}

impl TypeRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of component types (at most 512)
    #[must_use]
    pub fn new(limit: u16) -> Self {
        Self {
            ids: HashMap::new(),
            names: Vec::new(),
            limit,
        }
    }

    /// Returns the id for `C`, assigning the next one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TooManyComponentTypes`] once the limit is
    /// reached and `C` has no id yet.
    pub fn id_of<C: Component>(&mut self) -> StoreResult<ComponentTypeId> {
        if let Some(id) = self.get::<C>() {
            return Ok(id);
        }

        let next = u16::try_from(self.names.len())
            .ok()
            .filter(|next| *next < self.limit)
            .ok_or(StoreError::TooManyComponentTypes { limit: self.limit })?;

        let id = ComponentTypeId::new(next);
        self.ids.insert(TypeId::of::<C>(), id);
        self.names.push(component_name::<C>());
        Ok(id)
    }

    /// Returns the id for `C` without assigning one.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<ComponentTypeId> {
        self.ids.get(&TypeId::of::<C>()).copied()
    }

    /// Returns the type name registered under `id`.
    #[must_use]
    pub fn name(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Checks if `id` has been assigned.
    #[inline]
    #[must_use]
    pub fn is_assigned(&self, id: ComponentTypeId) -> bool {
        id.index() < self.names.len()
    }

    /// Number of ids assigned so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Checks if no id has been assigned.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Maximum number of component types.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u16 {
        self.limit
    }
}
