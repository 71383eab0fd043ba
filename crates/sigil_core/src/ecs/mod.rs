//! # Entity Component System
//!
//! A sparse-set component store with a signature-group index.
//!
//! ## Design Philosophy
//!
//! - One sparse-set pool per component type, allocated at registration
//! - Entities grouped by their exact signature, so queries skip whole groups
//! - Components are addressed by entity id, never by cached reference
//! - Type erasure only at the pool table, recovered by checked downcasts

mod commands;
mod component;
mod entity;
mod handle;
mod index;
mod registry;
mod signature;
mod storage;
mod store;
mod view;

pub use commands::Commands;
pub use component::{component_name, Component};
pub use entity::{ComponentTypeId, EntityId, SystemId};
pub use handle::StoreHandle;
pub use index::SignatureIndex;
pub use registry::TypeRegistry;
pub use signature::{Signature, MAX_COMPONENT_TYPES};
pub use storage::{ErasedPool, PoolTable, SparseSet};
pub use store::Store;
pub use view::{Query, View};
