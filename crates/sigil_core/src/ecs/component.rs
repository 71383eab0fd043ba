//! # Component Marker
//!
//! Components are plain data records supplied by the application. The
//! store never looks inside them; it only needs a stable type identity.

/// Marker trait for values that can be attached to entities.
///
/// Implemented for every `'static` type, so application records need no
/// derive or manual impl.
///
/// # Example
///
/// ```rust
/// use sigil_core::Store;
///
/// #[derive(Debug, PartialEq)]
/// struct Health {
///     hp: i32,
/// }
///
/// let mut store = Store::default();
/// store.register_component::<Health>().unwrap();
/// let e = store.create_entity().unwrap();
/// store.attach(e, Health { hp: 10 }).unwrap();
/// assert_eq!(store.get::<Health>(e).unwrap(), Some(&Health { hp: 10 }));
/// ```
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// Returns the human-readable name of a component type, used in errors.
#[inline]
#[must_use]
pub fn component_name<C: Component>() -> &'static str {
    std::any::type_name::<C>()
}
