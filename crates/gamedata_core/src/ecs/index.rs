//! # Entity Index
//!
//! Per-storage bidirectional map between entity handles and slot numbers.
//!
//! Invariant: for every occupied slot `s`, `handle_of_slot[s]` is assigned
//! and `slot_of[handle_of_slot[s]] == s`. Unoccupied slots (holes) hold
//! [`EntityHandle::NONE`].

use std::collections::HashMap;

use super::entity::EntityHandle;

/// Bidirectional entity/slot map shared by every allocation strategy.
#[derive(Debug, Default)]
pub struct EntityIndex {
    /// Handle to slot, unique keys.
    slot_of: HashMap<EntityHandle, u32>,
    /// Slot to handle, `NONE` for holes.
    handle_of_slot: Vec<EntityHandle>,
}

impl EntityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slot_of: HashMap::with_capacity(capacity),
            handle_of_slot: Vec::with_capacity(capacity),
        }
    }

    /// Returns the slot bound to `handle`, if any.
    #[inline]
    #[must_use]
    pub fn slot(&self, handle: EntityHandle) -> Option<u32> {
        self.slot_of.get(&handle).copied()
    }

    /// Returns the handle bound to `slot`, or `None` for holes and
    /// out-of-range slots.
    #[inline]
    #[must_use]
    pub fn handle(&self, slot: u32) -> Option<EntityHandle> {
        self.handle_of_slot
            .get(slot as usize)
            .copied()
            .filter(|handle| handle.is_assigned())
    }

    /// Checks if `handle` is bound to a slot.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.slot_of.contains_key(&handle)
    }

    /// Returns the number of slots, holes included.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.handle_of_slot.len()
    }

    /// Returns the number of bound handles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slot_of.len()
    }

    /// Checks if no handle is bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot_of.is_empty()
    }

    /// Raw slot to handle table, holes included.
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[EntityHandle] {
        &self.handle_of_slot
    }

    /// Iterates over `(slot, handle)` pairs of occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (u32, EntityHandle)> + '_ {
        self.handle_of_slot
            .iter()
            .enumerate()
            .filter(|(_, handle)| handle.is_assigned())
            .map(|(slot, handle)| (slot as u32, *handle))
    }

    /// Binds `handle` to an explicit slot, growing the table with holes.
    ///
    /// The caller guarantees that `handle` is unbound and `slot` is a hole.
    pub(crate) fn bind(&mut self, handle: EntityHandle, slot: u32) {
        debug_assert!(!self.contains(handle), "handle {handle} bound twice");
        let index = slot as usize;
        if index >= self.handle_of_slot.len() {
            self.handle_of_slot.resize(index + 1, EntityHandle::NONE);
        }
        debug_assert!(
            !self.handle_of_slot[index].is_assigned(),
            "slot {slot} is not a hole"
        );
        self.handle_of_slot[index] = handle;
        self.slot_of.insert(handle, slot);
    }

    /// Binds `handle` to a new slot at the end of the table.
    pub(crate) fn push(&mut self, handle: EntityHandle) -> u32 {
        let slot = u32::try_from(self.handle_of_slot.len())
            .expect("entity index exceeded u32::MAX slots");
        self.bind(handle, slot);
        slot
    }

    /// Unbinds the handle at `slot`, leaving a hole.
    pub(crate) fn unbind(&mut self, slot: u32) -> Option<EntityHandle> {
        let handle = self.handle(slot)?;
        self.handle_of_slot[slot as usize] = EntityHandle::NONE;
        self.slot_of.remove(&handle);
        Some(handle)
    }

    /// Unbinds the handle at `slot` and moves the last slot into its place.
    ///
    /// The table shrinks by one. The moved handle is re-pointed at `slot`.
    pub(crate) fn swap_remove(&mut self, slot: u32) -> Option<EntityHandle> {
        let index = slot as usize;
        if index >= self.handle_of_slot.len() {
            return None;
        }

        let handle = self.handle_of_slot.swap_remove(index);
        if let Some(moved) = self.handle_of_slot.get(index).copied() {
            self.slot_of.insert(moved, slot);
        }
        self.slot_of.remove(&handle);
        Some(handle)
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.slot_of.clear();
        self.handle_of_slot.clear();
    }
}
