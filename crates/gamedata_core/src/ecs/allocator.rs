//! # Row Allocators
//!
//! A row allocator couples an [`EntityIndex`] to row storage and defines the
//! slot lifecycle shared by every strategy:
//!
//! ```text
//! allocate_slot(handle) ──► slot ──► row / row_mut ──► erase_slot(slot)
//!                                                         ▲
//!                     garbage_collect(world) ─────────────┘
//! ```
//!
//! Garbage collection is the only place where rows of dead entities are
//! purged. It is not automatic: the owning system runs it once per tick.

use super::entity::EntityHandle;
use super::index::EntityIndex;
use super::world::ObjectLiveness;
use crate::error::{StorageError, StorageResult};

/// Allocation strategy of a storage, known at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One row per entity, tombstone erase.
    Dense,
    /// Copy-on-write rows shared from archetypes, swap-remove erase.
    Sparse,
}

impl Strategy {
    /// Short lowercase name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

/// Slot lifecycle contract shared by the dense and sparse strategies.
pub trait RowAllocator {
    /// Row type stored per slot.
    type Row;

    /// Strategy implemented by this allocator.
    const STRATEGY: Strategy;

    /// The entity/slot index.
    fn index(&self) -> &EntityIndex;

    /// Returns the slot bound to `handle`, if any. O(1).
    #[inline]
    fn slot(&self, handle: EntityHandle) -> Option<u32> {
        self.index().slot(handle)
    }

    /// Returns the number of bound entities.
    #[inline]
    fn len(&self) -> usize {
        self.index().len()
    }

    /// Checks if no entity is bound.
    #[inline]
    fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    /// Binds `handle` to a new slot and returns the slot.
    ///
    /// # Errors
    ///
    /// - [`StorageError::DoubleAllocation`](crate::StorageError::DoubleAllocation)
    ///   if `handle` is already bound
    /// - [`StorageError::InvalidHandle`](crate::StorageError::InvalidHandle)
    ///   if `handle` is unassigned
    fn allocate_slot(&mut self, handle: EntityHandle) -> StorageResult<u32>;

    /// Erases a slot, releasing its row and both index entries.
    ///
    /// Erasing a slot that holds no entity is a no-op.
    fn erase_slot(&mut self, slot: u32);

    /// Read access to the row of a slot. Never copies.
    fn row(&self, slot: u32) -> Option<&Self::Row>;

    /// Write access to the row of a slot.
    ///
    /// For copy-on-write strategies this is where a shared row is cloned.
    fn row_mut(&mut self, slot: u32) -> Option<&mut Self::Row>;

    /// Erases every slot whose entity the world reports as invalid.
    ///
    /// # Returns
    ///
    /// The number of slots erased.
    fn garbage_collect<W>(&mut self, world: &W) -> usize
    where
        W: ObjectLiveness + ?Sized;

    /// Erases every slot and empties the backing storage.
    fn clear(&mut self);

    /// Visits every `(handle, row)` pair currently bound. Never copies.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(EntityHandle, &Self::Row);

    /// Visits every `(handle, row)` pair currently bound, with write access.
    fn for_each_mut<F>(&mut self, f: F)
    where
        F: FnMut(EntityHandle, &mut Self::Row);
}

/// Checks that `handle` can be bound to a new slot of `index`.
pub(crate) fn check_bindable(index: &EntityIndex, handle: EntityHandle) -> StorageResult<()> {
    if !handle.is_assigned() {
        return Err(StorageError::InvalidHandle {
            index: handle.id(),
            generation: handle.generation(),
        });
    }
    if index.contains(handle) {
        tracing::warn!("Rejected second slot allocation for entity {}", handle);
        return Err(StorageError::DoubleAllocation(handle));
    }
    Ok(())
}
