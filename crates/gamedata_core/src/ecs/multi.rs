//! # Multi-Column Storage
//!
//! Several dense columns sharing one entity index and one slot lifecycle.
//!
//! ```text
//! slot:      0     1     2
//! handles:  [e1]  [--]  [e3]
//! column 0: [a0]  [  ]  [a2]     <- SlotTable<A>
//! column 1: [b0]  [  ]  [b2]     <- SlotTable<B>
//! ```
//!
//! Every column allocates and releases in lockstep, so one slot number is
//! the row index in every column. Erase leaves a hole in all of them at
//! once, exactly like the single-column dense allocator.
//!
//! Column sets are tuples of one to six row types:
//!
//! ```rust
//! use gamedata_core::{MultiStorage, World};
//!
//! let mut world = World::new();
//! let mut bodies: MultiStorage<(f32, [f32; 3])> = MultiStorage::new();
//!
//! let rock = world.create_object();
//! let (mass, velocity) = bodies.get_or_create(rock);
//! *mass = 12.0;
//! velocity[1] = -9.8;
//!
//! assert_eq!(bodies.get(rock), Some((&12.0, &[0.0, -9.8, 0.0])));
//! ```

use std::any;
use std::fmt;

use super::allocator::{check_bindable, Strategy};
use super::entity::EntityHandle;
use super::index::EntityIndex;
use super::world::ObjectLiveness;
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::memory::{RowHandle, SlotTable};

/// A tuple of row types stored column by column.
///
/// Implemented for tuples of one to six `Default` row types.
pub trait Columns {
    /// One [`SlotTable`] per column.
    type Tables;

    /// Number of columns.
    const COUNT: usize;

    /// Creates every column table sized by `config`.
    fn tables(config: &StorageConfig) -> Self::Tables;

    /// Allocates one default row in every column and returns the shared handle.
    fn alloc(tables: &mut Self::Tables) -> RowHandle;

    /// Releases the row at `row` in every column.
    ///
    /// # Errors
    ///
    /// Returns the first column's release error. Columns before it have
    /// already released their row.
    fn release(tables: &mut Self::Tables, row: RowHandle) -> StorageResult<()>;

    /// Empties every column.
    fn clear(tables: &mut Self::Tables);
}

/// Dense storage of a tuple of columns bound to one entity index.
pub struct MultiStorage<C: Columns> {
    /// Entity/slot index shared by every column, may contain holes.
    index: EntityIndex,
    /// Row handle per slot, `NULL` for holes. Valid in every column.
    row_of_slot: Vec<RowHandle>,
    /// Column tables.
    tables: C::Tables,
}

impl<C: Columns> MultiStorage<C> {
    /// Creates an empty storage with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Creates an empty storage sized by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            index: EntityIndex::with_capacity(config.initial_capacity),
            row_of_slot: Vec::with_capacity(config.initial_capacity),
            tables: C::tables(config),
        }
    }

    /// Allocation strategy, always dense.
    #[inline]
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        Strategy::Dense
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn column_count(&self) -> usize {
        C::COUNT
    }

    /// The shared entity/slot index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> &EntityIndex {
        &self.index
    }

    /// Returns the slot bound to `handle`, if any.
    #[inline]
    #[must_use]
    pub fn slot(&self, handle: EntityHandle) -> Option<u32> {
        self.index.slot(handle)
    }

    /// Returns the number of bound entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Checks if no entity is bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Binds `handle` to a new slot with a default row in every column.
    ///
    /// # Errors
    ///
    /// - [`StorageError::DoubleAllocation`](crate::StorageError::DoubleAllocation)
    ///   if `handle` is already bound
    /// - [`StorageError::InvalidHandle`](crate::StorageError::InvalidHandle)
    ///   if `handle` is unassigned
    pub fn allocate_slot(&mut self, handle: EntityHandle) -> StorageResult<u32> {
        check_bindable(&self.index, handle)?;
        Ok(self.bind(handle))
    }

    /// Erases a slot from every column. Erasing a hole is a no-op.
    pub fn erase_slot(&mut self, slot: u32) {
        let Some(row) = self.row_handle(slot) else {
            return;
        };

        if let Err(err) = C::release(&mut self.tables, row) {
            tracing::error!("Multi slot {} pointed at a dead row: {}", slot, err);
        }
        self.row_of_slot[slot as usize] = RowHandle::NULL;
        if let Some(handle) = self.index.unbind(slot) {
            tracing::trace!("Erased entity {} from multi slot {}", handle, slot);
        }
    }

    /// Erases the entity's rows from every column.
    ///
    /// # Returns
    ///
    /// `true` if the entity had rows.
    pub fn erase(&mut self, handle: EntityHandle) -> bool {
        match self.slot(handle) {
            Some(slot) => {
                self.erase_slot(slot);
                true
            }
            None => false,
        }
    }

    /// Erases every slot whose entity the world reports as invalid.
    ///
    /// # Returns
    ///
    /// The number of slots erased.
    pub fn garbage_collect<W>(&mut self, world: &W) -> usize
    where
        W: ObjectLiveness + ?Sized,
    {
        let mut erased = 0;
        for slot in 0..self.index.slot_count() as u32 {
            match self.index.handle(slot) {
                Some(handle) if !world.is_object_valid(handle) => {
                    self.erase_slot(slot);
                    erased += 1;
                }
                _ => {}
            }
        }

        if erased > 0 {
            tracing::debug!(
                "Garbage collected {} multi rows over {} columns, {} remaining",
                erased,
                C::COUNT,
                self.len()
            );
        }
        erased
    }

    /// Erases every slot and empties every column.
    pub fn clear(&mut self) {
        self.index.clear();
        self.row_of_slot.clear();
        C::clear(&mut self.tables);
    }

    fn row_handle(&self, slot: u32) -> Option<RowHandle> {
        self.row_of_slot
            .get(slot as usize)
            .copied()
            .filter(|row| !row.is_null())
    }

    fn bind(&mut self, handle: EntityHandle) -> u32 {
        assert!(handle.is_assigned(), "cannot bind the unassigned handle");

        let row = C::alloc(&mut self.tables);
        let slot = row.index();
        self.index.bind(handle, slot);

        let position = slot as usize;
        if position >= self.row_of_slot.len() {
            self.row_of_slot.resize(position + 1, RowHandle::NULL);
        }
        self.row_of_slot[position] = row;

        tracing::trace!("Bound entity {} to multi slot {}", handle, slot);
        slot
    }

    fn slot_or_bind(&mut self, handle: EntityHandle) -> RowHandle {
        let slot = match self.slot(handle) {
            Some(slot) => slot,
            None => self.bind(handle),
        };
        self.row_of_slot[slot as usize]
    }
}

impl<C: Columns> Default for MultiStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Columns> fmt::Debug for MultiStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStorage")
            .field("columns", &any::type_name::<C>())
            .field("len", &self.len())
            .finish()
    }
}

macro_rules! impl_columns {
    ($count:literal => $($column:ident $index:tt),+) => {
        impl<$($column: Default),+> Columns for ($($column,)+) {
            type Tables = ($(SlotTable<$column>,)+);

            const COUNT: usize = $count;

            fn tables(config: &StorageConfig) -> Self::Tables {
                ($(SlotTable::<$column>::with_config(config),)+)
            }

            fn alloc(tables: &mut Self::Tables) -> RowHandle {
                let rows = [$(tables.$index.alloc()),+];
                debug_assert!(
                    rows.iter().all(|row| *row == rows[0]),
                    "column tables out of lockstep: {rows:?}"
                );
                rows[0]
            }

            fn release(tables: &mut Self::Tables, row: RowHandle) -> StorageResult<()> {
                $(tables.$index.release(row)?;)+
                Ok(())
            }

            fn clear(tables: &mut Self::Tables) {
                $(tables.$index.clear();)+
            }
        }

        impl<$($column: Default),+> MultiStorage<($($column,)+)> {
            /// Read access to every column of the entity's row.
            #[must_use]
            pub fn get(&self, handle: EntityHandle) -> Option<($(&$column,)+)> {
                let row = self.row_handle(self.slot(handle)?)?;
                Self::columns(&self.tables, row)
            }

            /// Write access to every column of the entity's row.
            pub fn get_mut(&mut self, handle: EntityHandle) -> Option<($(&mut $column,)+)> {
                let row = self.row_handle(self.slot(handle)?)?;
                Self::columns_mut(&mut self.tables, row)
            }

            /// Write access to every column, binding a default row first if
            /// the entity has none.
            ///
            /// # Panics
            ///
            /// Panics if `handle` is unassigned and not bound yet.
            pub fn get_or_create(&mut self, handle: EntityHandle) -> ($(&mut $column,)+) {
                let row = self.slot_or_bind(handle);
                ($(&mut self.tables.$index[row],)+)
            }

            /// Read access meant to be taken right before [`MultiStorage::erase`].
            #[must_use]
            pub fn get_data_for_deletion(&self, handle: EntityHandle) -> Option<($(&$column,)+)> {
                self.get(handle)
            }

            /// Visits every bound entity with all of its columns, in slot order.
            pub fn for_each<F>(&self, mut f: F)
            where
                F: FnMut(EntityHandle, ($(&$column,)+)),
            {
                for (row, handle) in self.row_of_slot.iter().zip(self.index.handles()) {
                    if let Some(values) = Self::columns(&self.tables, *row) {
                        f(*handle, values);
                    }
                }
            }

            /// Visits every bound entity with write access to all of its columns.
            pub fn for_each_mut<F>(&mut self, mut f: F)
            where
                F: FnMut(EntityHandle, ($(&mut $column,)+)),
            {
                let Self {
                    index,
                    row_of_slot,
                    tables,
                } = self;

                for (row, handle) in row_of_slot.iter().zip(index.handles()) {
                    if let Some(values) = Self::columns_mut(tables, *row) {
                        f(*handle, values);
                    }
                }
            }

            fn columns(
                tables: &($(SlotTable<$column>,)+),
                row: RowHandle,
            ) -> Option<($(&$column,)+)> {
                Some(($(tables.$index.get(row)?,)+))
            }

            fn columns_mut(
                tables: &mut ($(SlotTable<$column>,)+),
                row: RowHandle,
            ) -> Option<($(&mut $column,)+)> {
                Some(($(tables.$index.get_mut(row)?,)+))
            }
        }
    };
}

impl_columns!(1 => T0 0);
impl_columns!(2 => T0 0, T1 1);
impl_columns!(3 => T0 0, T1 1, T2 2);
impl_columns!(4 => T0 0, T1 1, T2 2, T3 3);
impl_columns!(5 => T0 0, T1 1, T2 2, T3 3, T4 4);
impl_columns!(6 => T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use crate::StorageError;

    type Bodies = MultiStorage<(u32, String, [f32; 2])>;

    #[test]
    fn test_columns_share_one_slot() {
        let mut world = World::new();
        let mut bodies = Bodies::new();
        let handles: Vec<_> = (0..3).map(|_| world.create_object()).collect();

        for (i, handle) in handles.iter().enumerate() {
            let slot = bodies.allocate_slot(*handle).unwrap();
            assert_eq!(slot, i as u32);
            let row = bodies.row_handle(slot).unwrap();
            assert_eq!(row.index(), slot);
            assert!(bodies.tables.0.is_valid(row));
            assert!(bodies.tables.1.is_valid(row));
            assert!(bodies.tables.2.is_valid(row));
        }

        assert_eq!(bodies.column_count(), 3);
        assert_eq!(bodies.len(), 3);
        assert_eq!(
            bodies.allocate_slot(handles[0]),
            Err(StorageError::DoubleAllocation(handles[0]))
        );
        assert_eq!(
            bodies.get(handles[1]),
            Some((&0, &String::new(), &[0.0, 0.0]))
        );
    }

    #[test]
    fn test_get_or_create_writes_every_column() {
        let mut world = World::new();
        let mut bodies = Bodies::new();
        let handle = world.create_object();

        assert!(bodies.get(handle).is_none());
        let (id, name, position) = bodies.get_or_create(handle);
        *id = 7;
        name.push_str("crate");
        position[0] = 1.5;

        if let Some((id, _, _)) = bodies.get_mut(handle) {
            *id += 1;
        }
        let (_, name, _) = bodies.get_or_create(handle);
        name.push_str("s");

        assert_eq!(bodies.len(), 1);
        assert_eq!(
            bodies.get_data_for_deletion(handle),
            Some((&8, &String::from("crates"), &[1.5, 0.0]))
        );
    }

    #[test]
    fn test_erase_leaves_hole_in_every_column() {
        let mut world = World::new();
        let mut bodies = Bodies::new();
        let handles: Vec<_> = (0..3).map(|_| world.create_object()).collect();
        for handle in &handles {
            bodies.allocate_slot(*handle).unwrap();
        }

        assert!(bodies.erase(handles[1]));
        assert!(!bodies.erase(handles[1]));
        assert_eq!(bodies.index().slot_count(), 3);
        assert_eq!(bodies.tables.0.len(), 2);
        assert_eq!(bodies.tables.1.len(), 2);
        assert_eq!(bodies.tables.2.len(), 2);

        let late = world.create_object();
        assert_eq!(bodies.allocate_slot(late).unwrap(), 1);
        assert_eq!(bodies.index().slot_count(), 3);
    }

    #[test]
    fn test_garbage_collect_across_columns() {
        let mut world = World::new();
        let mut bodies = Bodies::new();
        let handles: Vec<_> = (0..5).map(|_| world.create_object()).collect();
        for (i, handle) in handles.iter().enumerate() {
            let (id, name, _) = bodies.get_or_create(*handle);
            *id = i as u32;
            *name = format!("body {i}");
        }

        world.delete_object(handles[0]);
        world.delete_object(handles[3]);
        assert_eq!(bodies.garbage_collect(&world), 2);
        assert_eq!(bodies.garbage_collect(&world), 0);

        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies.tables.1.len(), 3);
        assert!(bodies.get(handles[0]).is_none());
        assert!(bodies.get(handles[3]).is_none());
        assert_eq!(
            bodies.get(handles[4]).map(|(id, name, _)| (*id, name.as_str())),
            Some((4, "body 4"))
        );
    }

    #[test]
    fn test_iterate_columns_in_lockstep() {
        let mut world = World::new();
        let mut bodies: MultiStorage<(u32, u64)> = MultiStorage::with_config(&StorageConfig {
            initial_capacity: 0,
            page_size: 2,
        });
        let handles: Vec<_> = (0..5).map(|_| world.create_object()).collect();
        for (i, handle) in handles.iter().enumerate() {
            *bodies.get_or_create(*handle).0 = i as u32;
        }
        bodies.erase(handles[2]);

        bodies.for_each_mut(|_, (a, b)| *b = u64::from(*a) * 10);

        let mut seen = Vec::new();
        bodies.for_each(|handle, (a, b)| seen.push((handle, *a, *b)));
        assert_eq!(
            seen,
            vec![
                (handles[0], 0, 0),
                (handles[1], 1, 10),
                (handles[3], 3, 30),
                (handles[4], 4, 40),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut world = World::new();
        let mut bodies: MultiStorage<(u8,)> = MultiStorage::new();
        let handle = world.create_object();
        *bodies.get_or_create(handle).0 = 3;

        bodies.clear();
        assert!(bodies.is_empty());
        assert!(bodies.tables.0.is_empty());
        assert_eq!(bodies.allocate_slot(handle).unwrap(), 0);
        assert_eq!(bodies.get(handle), Some((&0,)));
    }

    #[test]
    #[should_panic(expected = "unassigned handle")]
    fn test_get_or_create_unassigned_panics() {
        let mut bodies: MultiStorage<(u8, u8)> = MultiStorage::new();
        let _ = bodies.get_or_create(EntityHandle::NONE);
    }
}
