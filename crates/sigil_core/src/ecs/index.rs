//! # Signature Index
//!
//! Groups entities by their exact component signature.
//!
//! ```text
//! {}          -> [e4]
//! {Vel}       -> [e0]
//! {Vel, Tr}   -> [e1, e2]
//! {Vel, Tr, H}-> [e3]
//! ```
//!
//! A query for `{Vel, Tr}` visits every group whose key is a superset of
//! the query signature: here `{Vel, Tr}` and `{Vel, Tr, H}`.
//!
//! ## Invariant
//!
//! Every live entity appears in exactly one group, the one keyed by its
//! current signature. The store maintains this on every mutation.
//!
//! ## Ordering
//!
//! Groups live in a `HashMap`; the order of groups, and of entities across
//! groups, is unspecified.

use std::collections::HashMap;

use super::entity::{EntityId, SystemId};
use super::signature::Signature;

/// Exact-signature groups plus the required signature of each system.
#[derive(Debug)]
pub struct SignatureIndex {
    /// Signature -> entities currently holding exactly that signature.
    groups: HashMap<Signature, Vec<EntityId>>,
    /// System -> required signature.
    systems: HashMap<SystemId, Signature>,
}

impl Default for SignatureIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureIndex {
    /// Creates an index holding only the empty-signature group.
    #[must_use]
    pub fn new() -> Self {
        let mut groups = HashMap::new();
        groups.insert(Signature::EMPTY, Vec::new());
        Self {
            groups,
            systems: HashMap::new(),
        }
    }

    /// Creates an empty group for `signature` if absent.
    pub fn ensure_group(&mut self, signature: Signature) {
        self.groups.entry(signature).or_default();
    }

    /// Appends a newly created entity to the group for `signature`.
    pub(crate) fn insert(&mut self, entity: EntityId, signature: Signature) {
        self.groups.entry(signature).or_default().push(entity);
    }

    /// Erases `entity` from the group for `signature`.
    ///
    /// O(group size). Returns `false` if the entity was not in that group.
    pub(crate) fn remove(&mut self, entity: EntityId, signature: &Signature) -> bool {
        let Some(group) = self.groups.get_mut(signature) else {
            return false;
        };
        match group.iter().position(|e| *e == entity) {
            Some(position) => {
                group.remove(position);
                true
            }
            None => false,
        }
    }

    /// Moves `entity` from the `old` group to the `new` one.
    ///
    /// The destination group is created if needed.
    pub(crate) fn move_entity(&mut self, entity: EntityId, old: &Signature, new: Signature) {
        let found = self.remove(entity, old);
        debug_assert!(found, "entity {entity} missing from its signature group");
        self.insert(entity, new);

        tracing::trace!(
            entity = entity.raw(),
            from = old.len(),
            to = new.len(),
            "entity migrated between signature groups"
        );
    }

    /// Returns the entities holding exactly `signature`.
    #[must_use]
    pub fn group(&self, signature: &Signature) -> Option<&[EntityId]> {
        self.groups.get(signature).map(Vec::as_slice)
    }

    /// Iterates every group whose signature is a superset of `target`.
    pub fn matching_groups<'a>(
        &'a self,
        target: &'a Signature,
    ) -> impl Iterator<Item = (&'a Signature, &'a [EntityId])> + 'a {
        self.groups
            .iter()
            .filter(move |(signature, _)| signature.contains_all(target))
            .map(|(signature, entities)| (signature, entities.as_slice()))
    }

    /// Iterates every group, including empty ones.
    pub fn groups(&self) -> impl Iterator<Item = (&Signature, &[EntityId])> {
        self.groups
            .iter()
            .map(|(signature, entities)| (signature, entities.as_slice()))
    }

    /// Number of groups (empty groups included).
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Stores the required signature of `system`, replacing any earlier one.
    pub(crate) fn register_system(&mut self, system: SystemId, required: Signature) {
        self.systems.insert(system, required);
    }

    /// Returns the required signature of `system`.
    #[must_use]
    pub fn system_signature(&self, system: SystemId) -> Option<&Signature> {
        self.systems.get(&system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::ComponentTypeId;

    fn sig(ids: &[u16]) -> Signature {
        ids.iter().copied().map(ComponentTypeId::new).collect()
    }

    fn e(raw: u32) -> EntityId {
        EntityId::new(raw)
    }

    #[test]
    fn test_starts_with_empty_group() {
        let index = SignatureIndex::new();
        assert_eq!(index.group_count(), 1);
        assert_eq!(index.group(&Signature::EMPTY), Some(&[][..]));
    }

    #[test]
    fn test_move_entity() {
        let mut index = SignatureIndex::new();
        index.insert(e(0), Signature::EMPTY);
        index.insert(e(1), Signature::EMPTY);

        index.move_entity(e(0), &Signature::EMPTY, sig(&[0]));
        assert_eq!(index.group(&Signature::EMPTY), Some(&[e(1)][..]));
        assert_eq!(index.group(&sig(&[0])), Some(&[e(0)][..]));

        index.move_entity(e(0), &sig(&[0]), sig(&[0, 1]));
        // Source group persists, now empty
        assert_eq!(index.group(&sig(&[0])), Some(&[][..]));
        assert_eq!(index.group(&sig(&[0, 1])), Some(&[e(0)][..]));
    }

    #[test]
    fn test_matching_groups_are_supersets() {
        let mut index = SignatureIndex::new();
        index.insert(e(0), sig(&[0]));
        index.insert(e(1), sig(&[0, 1]));
        index.insert(e(2), sig(&[0, 1, 2]));
        index.insert(e(3), sig(&[1, 2]));

        let target = sig(&[0, 1]);
        let mut visited: Vec<EntityId> = index
            .matching_groups(&target)
            .flat_map(|(_, entities)| entities.iter().copied())
            .collect();
        visited.sort();
        assert_eq!(visited, vec![e(1), e(2)]);

        // Empty target matches every group
        let all: usize = index
            .matching_groups(&Signature::EMPTY)
            .map(|(_, entities)| entities.len())
            .sum();
        assert_eq!(all, 4);
    }

    #[test]
    fn test_remove_missing_entity() {
        let mut index = SignatureIndex::new();
        assert!(!index.remove(e(9), &Signature::EMPTY));
        assert!(!index.remove(e(9), &sig(&[3])));
    }

    #[test]
    fn test_system_signatures() {
        let mut index = SignatureIndex::new();
        index.register_system(SystemId(7), sig(&[1, 2]));
        assert_eq!(index.system_signature(SystemId(7)), Some(&sig(&[1, 2])));
        assert!(index.system_signature(SystemId(8)).is_none());
    }
}
