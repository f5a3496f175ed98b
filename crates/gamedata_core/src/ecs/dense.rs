//! # Dense Row Allocator
//!
//! One row per entity, optimized for iteration speed over compactness.
//!
//! ```text
//! slot:            0     1     2     3
//! handle_of_slot: [e1]  [--]  [e3]  [e4]     <- hole left by an erase
//! rows:           [r0]  [  ]  [r2]  [r3]     <- slot n always uses row n
//! ```
//!
//! Erase leaves a tombstone instead of compacting: O(1), but the arrays never
//! shrink and iteration skips holes. The next allocation fills the lowest
//! hole before growing.

use super::allocator::{check_bindable, RowAllocator, Strategy};
use super::archetype::ArchetypeSeed;
use super::entity::EntityHandle;
use super::index::EntityIndex;
use super::sparse::ArchetypeRow;
use super::view::ComponentView;
use super::world::ObjectLiveness;
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::memory::{RowHandle, SlotTable};

/// Dense, tombstone-erasing row allocator.
pub struct DenseRowAllocator<T> {
    /// Entity/slot index, may contain holes.
    index: EntityIndex,
    /// Row arena. Row index equals slot.
    rows: SlotTable<T>,
    /// Row handle per slot, `NULL` for holes.
    row_of_slot: Vec<RowHandle>,
}

impl<T> DenseRowAllocator<T> {
    /// Creates an empty allocator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Creates an empty allocator sized by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero. Run
    /// [`StorageConfig::validate`] on hand-built configurations.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            index: EntityIndex::with_capacity(config.initial_capacity),
            rows: SlotTable::with_config(config),
            row_of_slot: Vec::with_capacity(config.initial_capacity),
        }
    }

    /// Returns the row handle backing `slot`, `None` for holes.
    #[inline]
    #[must_use]
    pub fn row_handle(&self, slot: u32) -> Option<RowHandle> {
        self.row_of_slot
            .get(slot as usize)
            .copied()
            .filter(|row| !row.is_null())
    }

    /// The backing row arena.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &SlotTable<T> {
        &self.rows
    }

    /// Iterates over bound `(handle, row)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> {
        self.row_of_slot
            .iter()
            .zip(self.index.handles())
            .filter(|(row, _)| !row.is_null())
            .filter_map(|(row, handle)| self.rows.get(*row).map(|value| (*handle, value)))
    }

    /// Split access for walkers that pair the index with raw row pages.
    pub(crate) fn parts_mut(&mut self) -> (&EntityIndex, &mut SlotTable<T>) {
        (&self.index, &mut self.rows)
    }

    fn bind(&mut self, handle: EntityHandle) -> u32
    where
        T: Default,
    {
        assert!(handle.is_assigned(), "cannot bind the unassigned handle");

        let row = self.rows.alloc();
        let slot = row.index();
        self.index.bind(handle, slot);

        let position = slot as usize;
        if position >= self.row_of_slot.len() {
            self.row_of_slot.resize(position + 1, RowHandle::NULL);
        }
        self.row_of_slot[position] = row;

        tracing::trace!("Bound entity {} to dense slot {}", handle, slot);
        slot
    }
}

impl<T> Default for DenseRowAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> RowAllocator for DenseRowAllocator<T> {
    type Row = T;

    const STRATEGY: Strategy = Strategy::Dense;

    #[inline]
    fn index(&self) -> &EntityIndex {
        &self.index
    }

    fn allocate_slot(&mut self, handle: EntityHandle) -> StorageResult<u32> {
        check_bindable(&self.index, handle)?;
        Ok(self.bind(handle))
    }

    fn erase_slot(&mut self, slot: u32) {
        let Some(row) = self.row_handle(slot) else {
            return;
        };

        if let Err(err) = self.rows.release(row) {
            tracing::error!("Dense slot {} pointed at a dead row: {}", slot, err);
        }
        self.row_of_slot[slot as usize] = RowHandle::NULL;
        if let Some(handle) = self.index.unbind(slot) {
            tracing::trace!("Erased entity {} from dense slot {}", handle, slot);
        }
    }

    #[inline]
    fn row(&self, slot: u32) -> Option<&T> {
        self.rows.get(self.row_handle(slot)?)
    }

    #[inline]
    fn row_mut(&mut self, slot: u32) -> Option<&mut T> {
        let row = self.row_handle(slot)?;
        self.rows.get_mut(row)
    }

    fn garbage_collect<W>(&mut self, world: &W) -> usize
    where
        W: ObjectLiveness + ?Sized,
    {
        let mut erased = 0;
        for slot in 0..self.index.slot_count() as u32 {
            let Some(handle) = self.index.handle(slot) else {
                continue;
            };
            if world.is_object_valid(handle) {
                continue;
            }

            self.erase_slot(slot);
            erased += 1;
        }

        erased
    }

    fn clear(&mut self) {
        self.index.clear();
        self.rows.clear();
        self.row_of_slot.clear();
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(EntityHandle, &T),
    {
        for (handle, value) in self.iter() {
            f(handle, value);
        }
    }

    fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(EntityHandle, &mut T),
    {
        let Self {
            index,
            rows,
            row_of_slot,
        } = self;

        for (row, handle) in row_of_slot.iter().zip(index.handles()) {
            if let Some(value) = rows.get_mut(*row) {
                f(*handle, value);
            }
        }
    }
}

impl<T: Default> ComponentView<T> for DenseRowAllocator<T> {
    #[inline]
    fn get(&self, handle: EntityHandle) -> Option<&T> {
        self.row(self.slot(handle)?)
    }

    #[inline]
    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut T> {
        let slot = self.slot(handle)?;
        self.row_mut(slot)
    }

    fn get_or_create(&mut self, handle: EntityHandle) -> &mut T {
        let slot = match self.slot(handle) {
            Some(slot) => slot,
            None => self.bind(handle),
        };
        let row = self.row_of_slot[slot as usize];
        &mut self.rows[row]
    }

    #[inline]
    fn get_data_for_deletion(&self, handle: EntityHandle) -> Option<&T> {
        self.get(handle)
    }

    fn erase(&mut self, handle: EntityHandle) -> bool {
        match self.slot(handle) {
            Some(slot) => {
                self.erase_slot(slot);
                true
            }
            None => false,
        }
    }
}

/// Dense rows never share: seeding copies the template into the row.
impl<T: Clone + Default> ArchetypeSeed<T> for DenseRowAllocator<T> {
    fn seed(&mut self, handle: EntityHandle, archetype: &ArchetypeRow<T>) -> StorageResult<u32> {
        let slot = match self.slot(handle) {
            Some(slot) => slot,
            None => self.allocate_slot(handle)?,
        };
        if let Some(row) = self.row_mut(slot) {
            row.clone_from(archetype.get());
        }
        Ok(slot)
    }

    fn forget(&mut self, _archetype: &ArchetypeRow<T>) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use crate::StorageError;

    fn spawn(world: &mut World, count: usize) -> Vec<EntityHandle> {
        (0..count).map(|_| world.create_object()).collect()
    }

    #[test]
    fn test_slot_maps_to_allocated_row() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();

        for handle in spawn(&mut world, 4) {
            let slot = alloc.allocate_slot(handle).unwrap();
            assert_eq!(alloc.slot(handle), Some(slot));
            let row = alloc.row_handle(slot).unwrap();
            assert_eq!(row.index(), slot);
            assert!(alloc.rows().is_valid(row));
        }
        assert_eq!(alloc.len(), 4);
    }

    #[test]
    fn test_double_allocation_rejected() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let handle = world.create_object();

        alloc.allocate_slot(handle).unwrap();
        assert_eq!(
            alloc.allocate_slot(handle),
            Err(StorageError::DoubleAllocation(handle))
        );
        assert_eq!(alloc.len(), 1);
    }

    #[test]
    fn test_erase_leaves_hole_then_reuses_it() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let handles = spawn(&mut world, 4);
        for handle in &handles {
            alloc.allocate_slot(*handle).unwrap();
        }

        alloc.erase_slot(1);
        assert_eq!(alloc.index().slot_count(), 4);
        assert_eq!(alloc.index().handles()[1], EntityHandle::NONE);
        assert_eq!(alloc.slot(handles[1]), None);
        assert!(alloc.row(1).is_none());

        let late = world.create_object();
        assert_eq!(alloc.allocate_slot(late).unwrap(), 1);
        assert_eq!(alloc.index().slot_count(), 4);

        let later = world.create_object();
        assert_eq!(alloc.allocate_slot(later).unwrap(), 4);
    }

    #[test]
    fn test_erase_on_empty_is_noop() {
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        alloc.erase_slot(3);
        assert!(alloc.is_empty());
        assert!(!alloc.erase(EntityHandle::new(0, 1)));
    }

    #[test]
    fn test_garbage_collect_precision() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let handles = spawn(&mut world, 5);
        for (i, handle) in handles.iter().enumerate() {
            *alloc.get_or_create(*handle) = i as u32;
        }

        world.delete_object(handles[2]);
        assert_eq!(alloc.garbage_collect(&world), 1);

        assert_eq!(alloc.slot(handles[2]), None);
        assert_eq!(alloc.index().handles()[2], EntityHandle::NONE);
        for i in [0, 1, 3, 4] {
            assert_eq!(alloc.get(handles[i]), Some(&(i as u32)));
        }
        assert_eq!(alloc.garbage_collect(&world), 0);
    }

    #[test]
    fn test_iterate_skips_holes() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let handles = spawn(&mut world, 3);
        for (i, handle) in handles.iter().enumerate() {
            *alloc.get_or_create(*handle) = i as u32 * 10;
        }
        assert!(alloc.erase(handles[0]));

        let mut seen = Vec::new();
        alloc.for_each(|handle, value| seen.push((handle, *value)));
        assert_eq!(seen, vec![(handles[1], 10), (handles[2], 20)]);

        alloc.for_each_mut(|_, value| *value += 1);
        assert_eq!(alloc.get(handles[2]), Some(&21));
    }

    #[test]
    fn test_get_or_create_is_upsert() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<String> = DenseRowAllocator::new();
        let handle = world.create_object();

        assert!(!alloc.has_entry(handle));
        alloc.get_or_create(handle).push_str("hello");
        alloc.get_or_create(handle).push_str(" world");
        assert_eq!(alloc.get(handle).map(String::as_str), Some("hello world"));
        assert_eq!(alloc.len(), 1);

        if let Some(value) = alloc.get_mut(handle) {
            value.clear();
        }
        assert_eq!(alloc.get_data_for_deletion(handle).map(String::len), Some(0));
    }

    #[test]
    fn test_seed_copies_template() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<String> = DenseRowAllocator::new();
        let archetype = ArchetypeRow::new(String::from("crate"));
        let handle = world.create_object();

        let slot = alloc.seed(handle, &archetype).unwrap();
        alloc.get_or_create(handle).push_str(" lid");
        assert_eq!(archetype.share_count(), 1);
        assert_eq!(archetype.get(), "crate");

        // Re-seeding overwrites the row in place
        assert_eq!(alloc.seed(handle, &archetype), Ok(slot));
        assert_eq!(alloc.get(handle).map(String::as_str), Some("crate"));
        assert_eq!(alloc.forget(&archetype), 0);
        assert!(matches!(
            alloc.seed(EntityHandle::NONE, &archetype),
            Err(StorageError::InvalidHandle { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "unassigned handle")]
    fn test_get_or_create_unassigned_panics() {
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let _ = alloc.get_or_create(EntityHandle::NONE);
    }

    #[test]
    #[should_panic(expected = "Page size must be greater than zero")]
    fn test_zero_page_size_panics() {
        let _ = DenseRowAllocator::<u32>::with_config(&StorageConfig {
            initial_capacity: 0,
            page_size: 0,
        });
    }

    #[test]
    fn test_clear() {
        let mut world = World::new();
        let mut alloc: DenseRowAllocator<u32> = DenseRowAllocator::new();
        let handles = spawn(&mut world, 3);
        for handle in &handles {
            alloc.allocate_slot(*handle).unwrap();
        }

        alloc.clear();
        assert!(alloc.is_empty());
        assert!(alloc.rows().is_empty());
        assert_eq!(alloc.index().slot_count(), 0);
        assert_eq!(alloc.allocate_slot(handles[0]).unwrap(), 0);
    }
}
