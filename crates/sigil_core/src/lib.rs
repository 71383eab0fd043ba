//! # SIGIL Core
//!
//! In-memory entity-component store:
//! - Typed components attached to integer entity ids
//! - Sparse-set pools with O(1) insert, lookup and delete
//! - A signature index grouping entities by their exact component set
//! - Views that visit every entity holding at least a given set of types
//!
//! ## Architecture Rules
//!
//! 1. **No unsafe code** - type erasure goes through checked `Any` downcasts
//! 2. **No long-lived references** - components resolve by entity id on demand
//! 3. **No silent failure** - every precondition violation is a [`StoreError`]
//!
//! ## Example
//!
//! ```rust
//! use sigil_core::{Store, StoreConfig};
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//! #[derive(Debug, PartialEq)]
//! struct Transform { x: f32, y: f32 }
//!
//! let mut store = Store::new(StoreConfig::with_max_entities(10_000)).unwrap();
//! store.register_component::<Velocity>().unwrap();
//! store.register_component::<Transform>().unwrap();
//!
//! let e = store.create_entity().unwrap();
//! store.attach(e, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
//! store.attach(e, Transform { x: 0.0, y: 0.0 }).unwrap();
//!
//! store
//!     .for_each::<(Velocity, Transform), _>(|(vel, tr): (&mut Velocity, &mut Transform)| {
//!         tr.x += vel.dx;
//!         tr.y += vel.dy;
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.get::<Transform>(e).unwrap(), Some(&Transform { x: 1.0, y: 1.0 }));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::StoreConfig;
pub use ecs::{
    Commands, Component, ComponentTypeId, EntityId, ErasedPool, Query, Signature,
    SignatureIndex, SparseSet, Store, StoreHandle, SystemId, TypeRegistry, View,
};
pub use error::{StoreError, StoreResult};
