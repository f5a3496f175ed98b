//! # Component Views
//!
//! Typed read/write facade over an allocator, hiding the allocation
//! strategy from call sites.
//!
//! Views are resolved at compile time: dense and sparse allocators implement
//! [`ComponentView`] directly, strided views implement it by projecting
//! through their owning dense storage.

use super::entity::EntityHandle;

/// Typed per-entity access shared by every storage strategy.
pub trait ComponentView<T> {
    /// Read access to the entity's row, `None` if it has no entry.
    fn get(&self, handle: EntityHandle) -> Option<&T>;

    /// Write access to the entity's row, `None` if it has no entry.
    ///
    /// This is the copy-on-write trigger point for sparse storage.
    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut T>;

    /// Write access to the entity's row, creating a default row first if
    /// the entity has no entry yet.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is [`EntityHandle::NONE`] or otherwise unassigned
    /// and not bound yet. There is no error channel here: use
    /// [`RowAllocator::allocate_slot`](super::RowAllocator::allocate_slot)
    /// first when the handle is untrusted.
    fn get_or_create(&mut self, handle: EntityHandle) -> &mut T;

    /// Read access meant to be taken right before [`ComponentView::erase`].
    ///
    /// Never copies, so archetype-shared rows are returned as they are.
    fn get_data_for_deletion(&self, handle: EntityHandle) -> Option<&T>;

    /// Frees the entity's row.
    ///
    /// # Returns
    ///
    /// `true` if a row was erased, `false` if the entity had no entry.
    fn erase(&mut self, handle: EntityHandle) -> bool;

    /// Checks if the entity has an entry.
    ///
    /// A sparse slot bound without an archetype holds no row until its first
    /// write, so it reports `false` here even though the entity is bound
    /// (it still counts in `len` and can be erased).
    #[inline]
    fn has_entry(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }
}
