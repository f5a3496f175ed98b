//! # Entity-Indexed Storage
//!
//! Maps generational entity handles to component rows.
//!
//! ## Design Philosophy
//!
//! - The world owns liveness, storages only consult it during garbage collection
//! - Strategies are type parameters, so hot loops never go through a vtable
//! - Archetype rows are shared read-only until an entity writes to its copy
//! - Dynamic dispatch is confined to the [`StorageRegistry`]
//! - Columns read together can share one index through [`MultiStorage`]

mod allocator;
mod archetype;
mod dense;
mod entity;
mod index;
mod multi;
mod registry;
mod sparse;
mod storage;
mod strided;
mod view;
mod world;

pub use allocator::{RowAllocator, Strategy};
pub use archetype::{Archetype, ArchetypeSeed, ArchetypeSheet};
pub use dense::DenseRowAllocator;
pub use entity::EntityHandle;
pub use index::EntityIndex;
pub use multi::{Columns, MultiStorage};
pub use registry::{ErasedStorage, StorageRegistry};
pub use sparse::{ArchetypeRow, RowState, SparseRow, SparseRowAllocator};
pub use storage::{ComponentStorage, DenseStorage, SparseStorage};
pub use strided::{FieldProjection, StridedView};
pub use view::ComponentView;
pub use world::{ObjectLiveness, World};
