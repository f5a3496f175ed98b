//! # Slot Table
//!
//! Generational arena for rows of a single type, independent of any entity
//! semantics.
//!
//! Rows live in fixed-size pages. Each physical slot carries a generation
//! counter that is bumped whenever the slot is allocated or released, so a
//! [`RowHandle`] taken before a release can never reach the row that later
//! reuses the slot.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Handle to a row inside a [`SlotTable`].
///
/// Lower 32 bits: slot index. Upper 32 bits: generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RowHandle(u64);

impl RowHandle {
    /// Handle that never refers to a row.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a row handle from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this handle is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    fn invalid(self) -> StorageError {
        StorageError::InvalidHandle {
            index: self.index(),
            generation: self.generation(),
        }
    }
}

impl Default for RowHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("RowHandle(null)")
        } else {
            write!(f, "RowHandle({}v{})", self.index(), self.generation())
        }
    }
}

/// One physical slot of a slot table.
pub(crate) struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Slot<T> {
    #[inline]
    pub(crate) fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[inline]
    pub(crate) fn value_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }
}

/// Paged generational arena.
///
/// - `alloc` reuses the lowest released slot before growing
/// - `release` bumps the slot generation, invalidating every older handle
/// - growth appends a page, existing pages never move
///
/// # Example
///
/// ```rust
/// use gamedata_core::SlotTable;
///
/// let mut table: SlotTable<u32> = SlotTable::new();
/// let row = table.alloc();
/// table[row] = 42;
/// assert_eq!(table.release(row), Ok(42));
/// assert!(!table.is_valid(row));
/// ```
pub struct SlotTable<T> {
    /// Row pages, each holding at most `page_size` slots.
    pages: Vec<Vec<Slot<T>>>,
    /// Released slot indices, smallest first.
    free: BinaryHeap<Reverse<u32>>,
    /// Slots per page.
    page_size: usize,
    /// Total number of slots ever created.
    slot_count: usize,
    /// Number of occupied slots.
    len: usize,
}

impl<T> SlotTable<T> {
    /// Creates an empty table with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Creates an empty table, reserving `initial_capacity` rows as whole pages.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        assert!(config.page_size > 0, "Page size must be greater than zero");

        let page_count = config.initial_capacity.div_ceil(config.page_size);
        let pages = (0..page_count)
            .map(|_| Vec::with_capacity(config.page_size))
            .collect();

        Self {
            pages,
            free: BinaryHeap::new(),
            page_size: config.page_size,
            slot_count: 0,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of physical slots, occupied or free.
    #[inline]
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Returns the number of rows per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Allocates a default-constructed row and returns its handle.
    ///
    /// Never fails: the table grows by one page when every slot is taken.
    pub fn alloc(&mut self) -> RowHandle
    where
        T: Default,
    {
        self.insert(T::default())
    }

    /// Stores `value` in a free slot and returns its handle.
    pub fn insert(&mut self, value: T) -> RowHandle {
        let index = match self.free.pop() {
            Some(Reverse(index)) => index,
            None => self.grow(),
        };

        let slot = self.slot_at_mut(index);
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = Some(value);
        let generation = slot.generation;
        self.len += 1;

        RowHandle::new(index, generation)
    }

    /// Releases a row, returning its value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHandle`] if the handle is stale, null
    /// or out of range.
    pub fn release(&mut self, handle: RowHandle) -> StorageResult<T> {
        if !self.is_valid(handle) {
            return Err(handle.invalid());
        }

        let index = handle.index();
        let slot = self.slot_at_mut(index);
        let value = slot.value.take().ok_or_else(|| handle.invalid())?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(Reverse(index));
        self.len -= 1;

        Ok(value)
    }

    /// Checks that the handle refers to a live row.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: RowHandle) -> bool {
        self.slot_at(handle.index()).is_some_and(|slot| {
            slot.generation == handle.generation() && slot.value.is_some()
        })
    }

    /// Gets a row by handle.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: RowHandle) -> Option<&T> {
        self.slot_at(handle.index())
            .filter(|slot| slot.generation == handle.generation())?
            .value
            .as_ref()
    }

    /// Gets a mutable row by handle.
    #[inline]
    pub fn get_mut(&mut self, handle: RowHandle) -> Option<&mut T> {
        let (page, offset) = self.locate(handle.index())?;
        self.pages
            .get_mut(page)?
            .get_mut(offset)
            .filter(|slot| slot.generation == handle.generation())?
            .value
            .as_mut()
    }

    /// Iterates over occupied rows in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (RowHandle, &T)> {
        let page_size = self.page_size;
        self.pages.iter().enumerate().flat_map(move |(page, slots)| {
            slots.iter().enumerate().filter_map(move |(offset, slot)| {
                let index = (page * page_size + offset) as u32;
                slot.value
                    .as_ref()
                    .map(|value| (RowHandle::new(index, slot.generation), value))
            })
        })
    }

    /// Iterates mutably over occupied rows in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RowHandle, &mut T)> {
        let page_size = self.page_size;
        self.pages.iter_mut().enumerate().flat_map(move |(page, slots)| {
            slots.iter_mut().enumerate().filter_map(move |(offset, slot)| {
                let index = (page * page_size + offset) as u32;
                let generation = slot.generation;
                slot.value
                    .as_mut()
                    .map(|value| (RowHandle::new(index, generation), value))
            })
        })
    }

    /// Releases every row.
    ///
    /// Slots and pages are kept, and every generation is bumped, so handles
    /// issued before the clear stay invalid.
    pub fn clear(&mut self) {
        self.free.clear();
        let mut index = 0u32;
        for page in &mut self.pages {
            for slot in page.iter_mut() {
                if slot.value.take().is_some() {
                    slot.generation = slot.generation.wrapping_add(1);
                }
                self.free.push(Reverse(index));
                index += 1;
            }
        }
        self.len = 0;
    }

    /// Raw page access for walkers that bypass per-handle lookups.
    pub(crate) fn pages(&self) -> impl Iterator<Item = &[Slot<T>]> {
        self.pages.iter().map(Vec::as_slice)
    }

    /// Mutable raw page access.
    pub(crate) fn pages_mut(&mut self) -> impl Iterator<Item = &mut [Slot<T>]> {
        self.pages.iter_mut().map(Vec::as_mut_slice)
    }

    #[inline]
    fn locate(&self, index: u32) -> Option<(usize, usize)> {
        let index = index as usize;
        (index < self.slot_count).then(|| (index / self.page_size, index % self.page_size))
    }

    #[inline]
    fn slot_at(&self, index: u32) -> Option<&Slot<T>> {
        let (page, offset) = self.locate(index)?;
        self.pages.get(page)?.get(offset)
    }

    #[inline]
    fn slot_at_mut(&mut self, index: u32) -> &mut Slot<T> {
        let index = index as usize;
        &mut self.pages[index / self.page_size][index % self.page_size]
    }

    /// Appends a fresh slot, opening a new page when the last one is full.
    fn grow(&mut self) -> u32 {
        let page = self.slot_count / self.page_size;
        if page == self.pages.len() {
            self.pages.push(Vec::with_capacity(self.page_size));
        }
        self.pages[page].push(Slot {
            generation: 0,
            value: None,
        });

        let index = self.slot_count;
        self.slot_count += 1;
        u32::try_from(index).expect("slot table exceeded u32::MAX rows")
    }
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<RowHandle> for SlotTable<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if the handle is not valid.
    fn index(&self, handle: RowHandle) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("{}", handle.invalid()),
        }
    }
}

impl<T> IndexMut<RowHandle> for SlotTable<T> {
    /// # Panics
    ///
    /// Panics if the handle is not valid.
    fn index_mut(&mut self, handle: RowHandle) -> &mut T {
        let error = handle.invalid();
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("{error}"),
        }
    }
}
