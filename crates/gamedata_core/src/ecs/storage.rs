//! # Component Storage
//!
//! Composition root binding one row allocator behind a single typed API.
//!
//! The allocation strategy is a type parameter, so every call, iteration
//! included, is resolved at compile time:
//!
//! ```rust
//! use gamedata_core::{ComponentView, DenseStorage, World};
//!
//! let mut world = World::new();
//! let mut health: DenseStorage<u32> = DenseStorage::new();
//!
//! let unit = world.create_object();
//! *health.get_or_create(unit) = 100;
//! assert_eq!(health.get(unit), Some(&100));
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use super::allocator::{RowAllocator, Strategy};
use super::dense::DenseRowAllocator;
use super::entity::EntityHandle;
use super::sparse::{ArchetypeRow, RowState, SparseRowAllocator};
use super::strided::{FieldProjection, StridedView};
use super::view::ComponentView;
use super::world::ObjectLiveness;
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::memory::RowType;

/// Typed storage of `T` rows using allocator `A`.
pub struct ComponentStorage<T, A> {
    allocator: A,
    _row: PhantomData<fn() -> T>,
}

/// Dense storage: one row per entity, tombstone erase.
pub type DenseStorage<T> = ComponentStorage<T, DenseRowAllocator<T>>;

/// Sparse storage: copy-on-write rows, swap-remove erase.
pub type SparseStorage<T> = ComponentStorage<T, SparseRowAllocator<T>>;

impl<T, A> ComponentStorage<T, A>
where
    A: RowAllocator<Row = T> + ComponentView<T>,
{
    /// Wraps an existing allocator.
    #[must_use]
    pub const fn from_allocator(allocator: A) -> Self {
        Self {
            allocator,
            _row: PhantomData,
        }
    }

    /// The underlying allocator.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    pub(crate) fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// Allocation strategy of this storage.
    #[inline]
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        A::STRATEGY
    }

    /// Returns the number of entities with a row.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    /// Checks if no entity has a row.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocator.is_empty()
    }

    /// Returns the slot of `handle`, if bound.
    #[inline]
    #[must_use]
    pub fn slot(&self, handle: EntityHandle) -> Option<u32> {
        self.allocator.slot(handle)
    }

    /// Erases the rows of every entity the world reports as invalid.
    ///
    /// Must be run once per tick by the owning system: until then, rows of
    /// dead entities stay physically present.
    ///
    /// # Returns
    ///
    /// The number of rows erased.
    pub fn garbage_collect<W>(&mut self, world: &W) -> usize
    where
        W: ObjectLiveness + ?Sized,
    {
        let erased = self.allocator.garbage_collect(world);
        if erased > 0 {
            tracing::debug!(
                "Garbage collected {} {} rows, {} remaining",
                erased,
                A::STRATEGY.name(),
                self.allocator.len()
            );
        }
        erased
    }

    /// Erases every row.
    pub fn clear(&mut self) {
        self.allocator.clear();
    }

    /// Visits every `(handle, row)` pair. Never copies shared rows.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(EntityHandle, &T),
    {
        self.allocator.for_each(f);
    }

    /// Visits every `(handle, row)` pair with write access.
    ///
    /// Sparse storage makes every visited row private.
    pub fn for_each_mut<F>(&mut self, f: F)
    where
        F: FnMut(EntityHandle, &mut T),
    {
        self.allocator.for_each_mut(f);
    }
}

impl<T, A> ComponentView<T> for ComponentStorage<T, A>
where
    A: RowAllocator<Row = T> + ComponentView<T>,
{
    #[inline]
    fn get(&self, handle: EntityHandle) -> Option<&T> {
        self.allocator.get(handle)
    }

    #[inline]
    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut T> {
        self.allocator.get_mut(handle)
    }

    #[inline]
    fn get_or_create(&mut self, handle: EntityHandle) -> &mut T {
        self.allocator.get_or_create(handle)
    }

    #[inline]
    fn get_data_for_deletion(&self, handle: EntityHandle) -> Option<&T> {
        self.allocator.get_data_for_deletion(handle)
    }

    #[inline]
    fn erase(&mut self, handle: EntityHandle) -> bool {
        self.allocator.erase(handle)
    }
}

impl<T, A> fmt::Debug for ComponentStorage<T, A>
where
    A: RowAllocator<Row = T> + ComponentView<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStorage")
            .field("row", &std::any::type_name::<T>())
            .field("strategy", &A::STRATEGY)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Default> DenseStorage<T> {
    /// Creates an empty dense storage.
    #[must_use]
    pub fn new() -> Self {
        Self::from_allocator(DenseRowAllocator::new())
    }

    /// Creates an empty dense storage sized by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero. Configurations read through
    /// [`StorageConfig::load`] are already validated.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::from_allocator(DenseRowAllocator::with_config(config))
    }

    /// Views one field of the stored struct as its own component store.
    pub fn strided<F>(&mut self, field: FieldProjection<T, F>) -> StridedView<'_, T, F> {
        StridedView::new(&mut self.allocator, field)
    }

    /// Iterates over `(handle, row)` pairs, skipping holes.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> {
        self.allocator.iter()
    }
}

impl<T: Default> Default for DenseStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default + Any> SparseStorage<T> {
    /// Creates an empty sparse storage copying rows with `Clone`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_allocator(SparseRowAllocator::new())
    }

    /// Creates an empty sparse storage sized by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::from_allocator(SparseRowAllocator::with_config(config))
    }
}

impl<T: Clone + Default + Any> Default for SparseStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Any> SparseStorage<T> {
    /// Creates an empty sparse storage copying rows through `row_type`.
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
        SparseRowAllocator::with_row_type(row_type, config).map(Self::from_allocator)
    }

    /// Binds `handle` to `archetype` without copying it.
    ///
    /// # Errors
    ///
    /// Same as [`RowAllocator::allocate_slot`].
    pub fn instantiate(
        &mut self,
        handle: EntityHandle,
        archetype: &ArchetypeRow<T>,
    ) -> StorageResult<u32> {
        self.allocator
            .allocate_slot_with_archetype(handle, archetype.clone())
    }

    /// Returns the copy-on-write state of the entity's row.
    #[must_use]
    pub fn row_state(&self, handle: EntityHandle) -> Option<RowState> {
        self.allocator.row_state(self.slot(handle)?)
    }

    /// Iterates over `(handle, row)` pairs without copying.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> {
        self.allocator.iter()
    }
}
