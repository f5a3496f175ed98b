//! # GAMEDATA Core
//!
//! Entity-indexed component data storage engine:
//! - Generational slot tables that detect stale handles
//! - Dense storage with O(1) tombstone erase
//! - Sparse storage sharing archetype rows until first write
//! - Multi-column dense storage and named archetype instantiation
//!
//! ## Architecture Rules
//!
//! 1. **Single simulation thread** - No locking, one writer per tick
//! 2. **Explicit garbage collection** - Rows of dead entities are purged
//!    only when the owning system calls `garbage_collect`
//! 3. **Archetypes are never freed here** - Only privately copied rows are
//!    released by a storage
//!
//! ## Example
//!
//! ```rust
//! use gamedata_core::{ArchetypeRow, ComponentView, SparseStorage, World};
//!
//! let mut world = World::new();
//! let mut names: SparseStorage<String> = SparseStorage::new();
//! let goblin = ArchetypeRow::new(String::from("goblin"));
//!
//! let a = world.create_object();
//! let b = world.create_object();
//! names.instantiate(a, &goblin).unwrap();
//! names.instantiate(b, &goblin).unwrap();
//!
//! names.get_or_create(a).push_str(" chief");
//! assert_eq!(names.get(a).map(String::as_str), Some("goblin chief"));
//! assert_eq!(names.get(b).map(String::as_str), Some("goblin"));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::StorageConfig;
pub use ecs::{
    Archetype, ArchetypeRow, ArchetypeSeed, ArchetypeSheet, Columns, ComponentStorage,
    ComponentView, DenseRowAllocator, DenseStorage, EntityHandle, EntityIndex, ErasedStorage,
    FieldProjection, MultiStorage, ObjectLiveness, RowAllocator, RowState, SparseRow,
    SparseRowAllocator, SparseStorage, StorageRegistry, Strategy, StridedView, World,
};
pub use error::{StorageError, StorageResult};
pub use memory::{RowHandle, RowType, SlotTable};
