//! # Sparse Row Allocator
//!
//! Copy-on-write rows for entities instantiated from an archetype.
//!
//! Every slot starts either empty or sharing a read-only archetype row. The
//! first mutable access clones the archetype into a private row owned by
//! this allocator; later mutable accesses return that same private row.
//!
//! ```text
//! Empty ──────────► Private { row, archetype: None }
//!          row_mut
//! Shared(A) ──────► Private { row = copy of A, archetype: Some(A) }
//! ```
//!
//! The slot arrays are always compact: erase is a swap-remove.

use std::any::Any;
use std::fmt;
use std::mem;
use std::sync::Arc;

use super::allocator::{check_bindable, RowAllocator, Strategy};
use super::archetype::ArchetypeSeed;
use super::entity::EntityHandle;
use super::index::EntityIndex;
use super::view::ComponentView;
use super::world::ObjectLiveness;
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::memory::{RowHandle, RowType, SlotTable};

/// Shared, read-only archetype template row.
///
/// Cloning is cheap and never copies the row. The storage engine only ever
/// drops its references; the row itself belongs to whoever created it.
pub struct ArchetypeRow<T>(Arc<T>);

impl<T> ArchetypeRow<T> {
    /// Wraps a template row.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Read access to the template.
    #[inline]
    #[must_use]
    pub fn get(&self) -> &T {
        &self.0
    }

    /// Checks if both references name the same template.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live references to the template, this one included.
    #[inline]
    #[must_use]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T> Clone for ArchetypeRow<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for ArchetypeRow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArchetypeRow").field(self.get()).finish()
    }
}

/// Copy-on-write state of one sparse slot.
#[derive(Debug)]
pub enum SparseRow<T> {
    /// No archetype and no private row yet.
    Empty,
    /// Reads go to the archetype row.
    Shared(ArchetypeRow<T>),
    /// The slot owns a row in the allocator's slot table.
    Private {
        /// The private row.
        row: RowHandle,
        /// Archetype the row was copied from, if any.
        archetype: Option<ArchetypeRow<T>>,
    },
}

impl<T> SparseRow<T> {
    /// Returns the state tag.
    #[must_use]
    pub const fn state(&self) -> RowState {
        match self {
            Self::Empty => RowState::Empty,
            Self::Shared(_) => RowState::Shared,
            Self::Private { .. } => RowState::Private,
        }
    }

    /// Returns the archetype this slot was seeded with.
    #[must_use]
    pub fn archetype(&self) -> Option<&ArchetypeRow<T>> {
        match self {
            Self::Empty => None,
            Self::Shared(archetype) => Some(archetype),
            Self::Private { archetype, .. } => archetype.as_ref(),
        }
    }

    /// Read-only resolution: the private row if any, else the archetype.
    fn resolve<'a>(&'a self, table: &'a SlotTable<T>) -> Option<&'a T> {
        match self {
            Self::Empty => None,
            Self::Shared(archetype) => Some(archetype.get()),
            Self::Private { row, .. } => table.get(*row),
        }
    }
}

/// State tag of a sparse slot, see [`SparseRow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowState {
    /// Neither archetype nor private row.
    Empty,
    /// Still reading the archetype row.
    Shared,
    /// Owns a private copy.
    Private,
}

/// Compact, copy-on-write row allocator.
pub struct SparseRowAllocator<T> {
    /// Entity/slot index, always compact.
    index: EntityIndex,
    /// Per-slot copy-on-write state, parallel to the index.
    rows: Vec<SparseRow<T>>,
    /// Private rows owned by this allocator.
    table: SlotTable<T>,
    /// Copy capability used to clone archetype rows.
    row_type: RowType,
}

impl<T: Clone + Any> SparseRowAllocator<T> {
    /// Creates an empty allocator copying rows with `Clone`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Creates an empty allocator sized by `config`, copying rows with `Clone`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::build(config, RowType::of::<T>())
    }
}

impl<T: Clone + Any> Default for SparseRowAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> SparseRowAllocator<T> {
    /// Creates an empty allocator copying rows through `row_type`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TypeMismatch`](crate::StorageError::TypeMismatch)
    /// if `row_type` does not describe `T`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    pub fn with_row_type(row_type: RowType, config: &StorageConfig) -> StorageResult<Self> {
        row_type.expect_row::<T>()?;
        Ok(Self::build(config, row_type))
    }

    fn build(config: &StorageConfig, row_type: RowType) -> Self {
        Self {
            index: EntityIndex::with_capacity(config.initial_capacity),
            rows: Vec::with_capacity(config.initial_capacity),
            table: SlotTable::with_config(config),
            row_type,
        }
    }

    /// The copy capability used for copy-on-write.
    #[inline]
    #[must_use]
    pub const fn row_type(&self) -> &RowType {
        &self.row_type
    }

    /// Returns the copy-on-write state of a slot.
    #[inline]
    #[must_use]
    pub fn row_state(&self, slot: u32) -> Option<RowState> {
        self.rows.get(slot as usize).map(SparseRow::state)
    }

    /// Returns the raw copy-on-write entry of a slot.
    #[inline]
    #[must_use]
    pub fn sparse_row(&self, slot: u32) -> Option<&SparseRow<T>> {
        self.rows.get(slot as usize)
    }

    /// Returns the number of private rows currently owned.
    #[inline]
    #[must_use]
    pub const fn private_rows(&self) -> usize {
        self.table.len()
    }

    /// Binds `handle` to a new slot sharing `archetype`.
    ///
    /// No row is copied until the first mutable access.
    ///
    /// # Errors
    ///
    /// Same as [`RowAllocator::allocate_slot`].
    pub fn allocate_slot_with_archetype(
        &mut self,
        handle: EntityHandle,
        archetype: ArchetypeRow<T>,
    ) -> StorageResult<u32> {
        check_bindable(&self.index, handle)?;
        Ok(self.push(handle, SparseRow::Shared(archetype)))
    }

    /// Iterates over bound `(handle, row)` pairs without copying.
    ///
    /// Empty slots are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> {
        self.index
            .handles()
            .iter()
            .zip(&self.rows)
            .filter_map(|(handle, row)| row.resolve(&self.table).map(|value| (*handle, value)))
    }

    fn push(&mut self, handle: EntityHandle, row: SparseRow<T>) -> u32 {
        let slot = self.index.push(handle);
        self.rows.push(row);
        tracing::trace!("Bound entity {} to sparse slot {}", handle, slot);
        slot
    }

    /// Makes the row of an in-range slot private, copying its archetype on
    /// first call.
    fn make_private(&mut self, slot: u32) -> RowHandle
    where
        T: Default,
    {
        let entry = &mut self.rows[slot as usize];
        if let SparseRow::Private { row, .. } = *entry {
            return row;
        }

        let archetype = match mem::replace(entry, SparseRow::Empty) {
            SparseRow::Shared(archetype) => Some(archetype),
            _ => None,
        };

        let row = self.table.alloc();
        if let (Some(archetype), Some(dst)) = (&archetype, self.table.get_mut(row)) {
            match self.row_type.copy(archetype.get(), dst) {
                Ok(()) => tracing::trace!(
                    "Copied archetype into private row {:?} for sparse slot {}",
                    row,
                    slot
                ),
                Err(err) => tracing::error!(
                    "Copy-on-write for sparse slot {} failed, row left default: {}",
                    slot,
                    err
                ),
            }
        }

        *entry = SparseRow::Private { row, archetype };
        row
    }
}

impl<T: Default + Any> RowAllocator for SparseRowAllocator<T> {
    type Row = T;

    const STRATEGY: Strategy = Strategy::Sparse;

    #[inline]
    fn index(&self) -> &EntityIndex {
        &self.index
    }

    fn allocate_slot(&mut self, handle: EntityHandle) -> StorageResult<u32> {
        check_bindable(&self.index, handle)?;
        Ok(self.push(handle, SparseRow::Empty))
    }

    fn erase_slot(&mut self, slot: u32) {
        let position = slot as usize;
        if position >= self.rows.len() {
            return;
        }

        let removed = self.rows.swap_remove(position);
        let handle = self.index.swap_remove(slot);

        // Archetype rows are never released here
        if let SparseRow::Private { row, .. } = removed {
            if let Err(err) = self.table.release(row) {
                tracing::error!("Sparse slot {} pointed at a dead row: {}", slot, err);
            }
        }

        if let Some(handle) = handle {
            tracing::trace!("Erased entity {} from sparse slot {}", handle, slot);
        }
    }

    #[inline]
    fn row(&self, slot: u32) -> Option<&T> {
        self.rows.get(slot as usize)?.resolve(&self.table)
    }

    fn row_mut(&mut self, slot: u32) -> Option<&mut T> {
        if slot as usize >= self.rows.len() {
            return None;
        }
        let row = self.make_private(slot);
        self.table.get_mut(row)
    }

    fn garbage_collect<W>(&mut self, world: &W) -> usize
    where
        W: ObjectLiveness + ?Sized,
    {
        let mut erased = 0;
        let mut slot = 0u32;
        while (slot as usize) < self.rows.len() {
            match self.index.handle(slot) {
                // Re-test the same slot: the swap moved another entity in
                Some(handle) if !world.is_object_valid(handle) => {
                    self.erase_slot(slot);
                    erased += 1;
                }
                _ => slot += 1,
            }
        }

        erased
    }

    fn clear(&mut self) {
        self.index.clear();
        self.rows.clear();
        self.table.clear();
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
        for slot in 0..self.rows.len() as u32 {
            let handle = self.index.handles()[slot as usize];
            if let Some(value) = self.row_mut(slot) {
                f(handle, value);
            }
        }
    }
}

impl<T: Default + Any> ComponentView<T> for SparseRowAllocator<T> {
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
        let row = match self.slot(handle) {
            Some(slot) => self.make_private(slot),
            None => {
                assert!(handle.is_assigned(), "cannot bind the unassigned handle");
                let row = self.table.alloc();
                self.push(
                    handle,
                    SparseRow::Private {
                        row,
                        archetype: None,
                    },
                );
                row
            }
        };
        &mut self.table[row]
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

impl<T: Default + Any> ArchetypeSeed<T> for SparseRowAllocator<T> {
    fn seed(&mut self, handle: EntityHandle, archetype: &ArchetypeRow<T>) -> StorageResult<u32> {
        let Some(slot) = self.slot(handle) else {
            return self.allocate_slot_with_archetype(handle, archetype.clone());
        };

        let previous = mem::replace(
            &mut self.rows[slot as usize],
            SparseRow::Shared(archetype.clone()),
        );
        if let SparseRow::Private { row, .. } = previous {
            if let Err(err) = self.table.release(row) {
                tracing::error!("Sparse slot {} pointed at a dead row: {}", slot, err);
            }
        }
        tracing::trace!("Re-seeded sparse slot {} of entity {}", slot, handle);
        Ok(slot)
    }

    fn forget(&mut self, archetype: &ArchetypeRow<T>) -> usize {
        let mut detached = 0;
        for slot in 0..self.rows.len() as u32 {
            let shared = match &mut self.rows[slot as usize] {
                SparseRow::Shared(seed) => seed.ptr_eq(archetype),
                SparseRow::Private { archetype: seed, .. } => {
                    if seed.as_ref().is_some_and(|seed| seed.ptr_eq(archetype)) {
                        *seed = None;
                    }
                    false
                }
                SparseRow::Empty => false,
            };
            if !shared {
                continue;
            }

            self.make_private(slot);
            if let SparseRow::Private { archetype: seed, .. } = &mut self.rows[slot as usize] {
                *seed = None;
            }
            detached += 1;
        }

        if detached > 0 {
            tracing::debug!("Detached {} sparse slots from a forgotten archetype", detached);
        }
        detached
    }
}
