//! # Component Signatures
//!
//! A signature is a fixed-width bit set over component type ids. Every
//! entity carries one (the exact set of components it holds) and every
//! registered system carries one (the subset it requires).
//!
//! ## Performance
//!
//! - Set / clear / test: O(1), single word operation
//! - Superset test: 8 word comparisons
//! - Hashing: the raw words, so signatures key a `HashMap` directly

use super::entity::ComponentTypeId;

/// Hard upper bound on distinct component types per store.
pub const MAX_COMPONENT_TYPES: usize = 512;

/// Number of `u64` words backing a signature.
const SIGNATURE_WORDS: usize = MAX_COMPONENT_TYPES / 64;

/// Bit set of component type ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Packed bits, 64 component types per word.
    words: [u64; SIGNATURE_WORDS],
}

impl Signature {
    /// The empty signature (a freshly created entity).
    pub const EMPTY: Self = Self {
        words: [0; SIGNATURE_WORDS],
    };

    /// Splits an id into word index and bit mask.
    #[inline]
    const fn locate(id: ComponentTypeId) -> (usize, u64) {
        let index = id.index();
        (index / 64, 1u64 << (index % 64))
    }

    /// Sets the bit for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not below [`MAX_COMPONENT_TYPES`]. Registries never
    /// hand out such ids.
    #[inline]
    pub fn insert(&mut self, id: ComponentTypeId) {
        let (word, mask) = Self::locate(id);
        self.words[word] |= mask;
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn remove(&mut self, id: ComponentTypeId) {
        let (word, mask) = Self::locate(id);
        if let Some(bits) = self.words.get_mut(word) {
            *bits &= !mask;
        }
    }

    /// Returns a copy with `id` added.
    #[inline]
    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        self.insert(id);
        self
    }

    /// Returns a copy with `id` removed.
    #[inline]
    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        self.remove(id);
        self
    }

    /// Checks if `id` is in the set.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        let (word, mask) = Self::locate(id);
        self.words.get(word).is_some_and(|bits| bits & mask != 0)
    }

    /// Checks if every id in `required` is also in `self`.
    ///
    /// This is the query match: `self & required == required`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, required: &Self) -> bool {
        self.words
            .iter()
            .zip(required.words.iter())
            .all(|(have, need)| have & need == *need)
    }

    /// Number of component types in the set.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates the ids in the set in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let base = word_index * 64;
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                // base + bit < MAX_COMPONENT_TYPES, which fits u16
                u16::try_from(base + bit).ok().map(ComponentTypeId::new)
            })
        })
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        let mut signature = Self::EMPTY;
        for id in iter {
            signature.insert(id);
        }
        signature
    }
}
