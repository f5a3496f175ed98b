//! # Storage Registry
//!
//! Type-erased set of component storages so that a tick can garbage collect
//! every storage and a destroyed object can lose all of its rows in one call.
//!
//! Storages are found either by their concrete type or by a sheet name.
//! Named sheets are what [`Archetype`]s refer to:
//!
//! ```text
//! "health" ──► DenseStorage<u32>       seed = copy template
//! "name"   ──► SparseStorage<String>   seed = share template until write
//! ```
//!
//! This is the only place the engine uses dynamic dispatch. Typed access goes
//! back through a downcast.

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::allocator::{RowAllocator, Strategy};
use super::archetype::{Archetype, ArchetypeSeed, ArchetypeSheet};
use super::entity::EntityHandle;
use super::multi::{Columns, MultiStorage};
use super::storage::{ComponentStorage, DenseStorage, SparseStorage};
use super::view::ComponentView;
use super::world::ObjectLiveness;
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Object-safe surface of a component storage.
pub trait ErasedStorage: Any {
    /// Row type name, for logs.
    fn name(&self) -> &'static str;

    /// Allocation strategy.
    fn strategy(&self) -> Strategy;

    /// Number of entities with a row.
    fn len(&self) -> usize;

    /// Checks if no entity has a row.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Erases rows of every entity the world reports as invalid.
    fn garbage_collect(&mut self, world: &dyn ObjectLiveness) -> usize;

    /// Erases the row of one entity.
    fn erase(&mut self, handle: EntityHandle) -> bool;

    /// Erases every row.
    fn clear(&mut self);

    /// Seeds the object's row from one archetype sheet.
    ///
    /// # Errors
    ///
    /// - [`StorageError::TypeMismatch`] if the template is not a row of
    ///   this storage
    /// - [`StorageError::InvalidHandle`] if `handle` is unassigned
    fn instantiate(&mut self, handle: EntityHandle, sheet: &ArchetypeSheet) -> StorageResult<u32>;

    /// Detaches every row still sharing the sheet's template.
    ///
    /// # Returns
    ///
    /// The number of rows that had to copy the template.
    fn forget(&mut self, sheet: &ArchetypeSheet) -> usize;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T, A> ErasedStorage for ComponentStorage<T, A>
where
    T: 'static,
    A: RowAllocator<Row = T> + ComponentView<T> + ArchetypeSeed<T> + 'static,
{
    fn name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn strategy(&self) -> Strategy {
        A::STRATEGY
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn garbage_collect(&mut self, world: &dyn ObjectLiveness) -> usize {
        ComponentStorage::garbage_collect(self, world)
    }

    fn erase(&mut self, handle: EntityHandle) -> bool {
        ComponentView::erase(self, handle)
    }

    fn clear(&mut self) {
        ComponentStorage::clear(self);
    }

    fn instantiate(&mut self, handle: EntityHandle, sheet: &ArchetypeSheet) -> StorageResult<u32> {
        self.allocator_mut().seed(handle, sheet.row::<T>()?)
    }

    fn forget(&mut self, sheet: &ArchetypeSheet) -> usize {
        sheet
            .row::<T>()
            .map_or(0, |archetype| self.allocator_mut().forget(archetype))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<C> ErasedStorage for MultiStorage<C>
where
    C: Columns + 'static,
{
    fn name(&self) -> &'static str {
        any::type_name::<C>()
    }

    fn strategy(&self) -> Strategy {
        Strategy::Dense
    }

    fn len(&self) -> usize {
        MultiStorage::len(self)
    }

    fn garbage_collect(&mut self, world: &dyn ObjectLiveness) -> usize {
        MultiStorage::garbage_collect(self, world)
    }

    fn erase(&mut self, handle: EntityHandle) -> bool {
        MultiStorage::erase(self, handle)
    }

    fn clear(&mut self) {
        MultiStorage::clear(self);
    }

    /// Column sets have no single-row template.
    fn instantiate(
        &mut self,
        _handle: EntityHandle,
        sheet: &ArchetypeSheet,
    ) -> StorageResult<u32> {
        Err(StorageError::TypeMismatch {
            expected: any::type_name::<C>(),
            found: sheet.type_name(),
        })
    }

    fn forget(&mut self, _sheet: &ArchetypeSheet) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Component storages keyed by their concrete storage type.
///
/// # Example
///
/// ```rust
/// use gamedata_core::{ComponentView, DenseStorage, StorageRegistry, World};
///
/// let mut world = World::new();
/// let mut registry = StorageRegistry::new();
/// registry.register(DenseStorage::<u32>::new());
///
/// let unit = world.create_object();
/// if let Some(health) = registry.get_mut::<DenseStorage<u32>>() {
///     *health.get_or_create(unit) = 10;
/// }
///
/// world.delete_object(unit);
/// assert_eq!(registry.garbage_collect(&world), 1);
/// ```
#[derive(Default)]
pub struct StorageRegistry {
    /// Storages in registration order.
    storages: Vec<Box<dyn ErasedStorage>>,
    /// Storage type to position in `storages`, for unnamed registrations.
    positions: HashMap<TypeId, usize>,
    /// Sheet name to position in `storages`.
    names: HashMap<String, usize>,
}

impl StorageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a storage, replacing any storage of the same type.
    ///
    /// # Returns
    ///
    /// `true` if the storage type was not registered before.
    pub fn register<S: ErasedStorage>(&mut self, storage: S) -> bool {
        let type_id = TypeId::of::<S>();
        tracing::debug!(
            "Registered {} storage for {}",
            storage.strategy().name(),
            storage.name()
        );

        if let Some(&position) = self.positions.get(&type_id) {
            self.storages[position] = Box::new(storage);
            return false;
        }

        self.positions.insert(type_id, self.storages.len());
        self.storages.push(Box::new(storage));
        true
    }

    /// Registers a storage under a sheet name, replacing any storage already
    /// registered under that name.
    ///
    /// Named storages are found by name only, so several storages of the
    /// same type can coexist under different names.
    ///
    /// # Returns
    ///
    /// `true` if the name was not registered before.
    pub fn register_named<S: ErasedStorage>(
        &mut self,
        name: impl Into<String>,
        storage: S,
    ) -> bool {
        let name = name.into();
        tracing::debug!(
            "Registered {} sheet {} for {}",
            storage.strategy().name(),
            name,
            storage.name()
        );

        if let Some(&position) = self.names.get(&name) {
            self.storages[position] = Box::new(storage);
            return false;
        }

        self.names.insert(name, self.storages.len());
        self.storages.push(Box::new(storage));
        true
    }

    /// Registers a `T` sheet with the chosen allocation strategy.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is zero.
    pub fn register_sheet<T>(
        &mut self,
        name: impl Into<String>,
        strategy: Strategy,
        config: &StorageConfig,
    ) -> bool
    where
        T: Clone + Default + 'static,
    {
        match strategy {
            Strategy::Dense => self.register_named(name, DenseStorage::<T>::with_config(config)),
            Strategy::Sparse => self.register_named(name, SparseStorage::<T>::with_config(config)),
        }
    }

    /// Typed access to a registered storage.
    #[must_use]
    pub fn get<S: ErasedStorage>(&self) -> Option<&S> {
        let position = *self.positions.get(&TypeId::of::<S>())?;
        self.storages[position].as_any().downcast_ref()
    }

    /// Typed mutable access to a registered storage.
    pub fn get_mut<S: ErasedStorage>(&mut self) -> Option<&mut S> {
        let position = *self.positions.get(&TypeId::of::<S>())?;
        self.storages[position].as_any_mut().downcast_mut()
    }

    /// Typed access to a named storage.
    #[must_use]
    pub fn get_named<S: ErasedStorage>(&self, name: &str) -> Option<&S> {
        self.named(name)?.as_any().downcast_ref()
    }

    /// Typed mutable access to a named storage.
    pub fn get_named_mut<S: ErasedStorage>(&mut self, name: &str) -> Option<&mut S> {
        self.named_mut(name)?.as_any_mut().downcast_mut()
    }

    /// Strategy-agnostic view of a named `T` sheet.
    ///
    /// Returns `None` if the name is unknown or its rows are not `T`.
    #[must_use]
    pub fn view<T: Default + 'static>(&self, name: &str) -> Option<&dyn ComponentView<T>> {
        let storage = self.named(name)?.as_any();
        if let Some(dense) = storage.downcast_ref::<DenseStorage<T>>() {
            return Some(dense);
        }
        storage
            .downcast_ref::<SparseStorage<T>>()
            .map(|sparse| -> &dyn ComponentView<T> { sparse })
    }

    /// Strategy-agnostic mutable view of a named `T` sheet.
    pub fn view_mut<T: Default + 'static>(
        &mut self,
        name: &str,
    ) -> Option<&mut dyn ComponentView<T>> {
        let storage = self.named_mut(name)?.as_any_mut();
        if storage.is::<DenseStorage<T>>() {
            return storage
                .downcast_mut::<DenseStorage<T>>()
                .map(|dense| -> &mut dyn ComponentView<T> { dense });
        }
        storage
            .downcast_mut::<SparseStorage<T>>()
            .map(|sparse| -> &mut dyn ComponentView<T> { sparse })
    }

    /// Checks if a sheet name is registered.
    #[must_use]
    pub fn contains_named(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Registered sheet names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Seeds every sheet listed by `archetype` for one object.
    ///
    /// Sheets the registry does not know are skipped with a warning. A
    /// sheet that fails stops the call; sheets before it stay seeded.
    ///
    /// # Errors
    ///
    /// - [`StorageError::InvalidHandle`] if `handle` is unassigned
    /// - [`StorageError::TypeMismatch`] if a template does not match the
    ///   rows of its sheet
    ///
    /// # Returns
    ///
    /// The number of sheets seeded.
    pub fn instantiate_archetype(
        &mut self,
        handle: EntityHandle,
        archetype: &Archetype,
    ) -> StorageResult<usize> {
        let mut seeded = 0;
        for (name, sheet) in archetype.sheets() {
            let Some(&position) = self.names.get(name) else {
                tracing::warn!(
                    "Archetype {} lists unregistered sheet {}",
                    archetype.name(),
                    name
                );
                continue;
            };

            self.storages[position].instantiate(handle, sheet)?;
            seeded += 1;
        }

        tracing::trace!(
            "Instantiated archetype {} on entity {} ({} sheets)",
            archetype.name(),
            handle,
            seeded
        );
        Ok(seeded)
    }

    /// Detaches every object still sharing one of the archetype's templates.
    ///
    /// Afterwards no named sheet holds a reference to any of its templates.
    ///
    /// # Returns
    ///
    /// The number of rows that had to copy a template.
    pub fn forget_archetype(&mut self, archetype: &Archetype) -> usize {
        let detached: usize = archetype
            .sheets()
            .filter_map(|(name, sheet)| Some((*self.names.get(name)?, sheet)))
            .map(|(position, sheet)| self.storages[position].forget(sheet))
            .sum();
        tracing::debug!(
            "Forgot archetype {}, {} rows detached",
            archetype.name(),
            detached
        );
        detached
    }

    /// Checks if a storage of type `S` is registered.
    #[must_use]
    pub fn contains<S: ErasedStorage>(&self) -> bool {
        self.positions.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered storages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Checks if no storage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    /// Iterates over the registered storages in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ErasedStorage> {
        self.storages
            .iter()
            .map(|storage| -> &dyn ErasedStorage { storage.as_ref() })
    }

    /// Garbage collects every storage against `world`.
    ///
    /// # Returns
    ///
    /// The total number of rows erased.
    pub fn garbage_collect(&mut self, world: &dyn ObjectLiveness) -> usize {
        self.storages
            .iter_mut()
            .map(|storage| storage.garbage_collect(world))
            .sum()
    }

    /// Erases the rows of one object from every storage.
    ///
    /// # Returns
    ///
    /// The number of storages that held a row for the object.
    pub fn erase_object(&mut self, handle: EntityHandle) -> usize {
        let erased: usize = self
            .storages
            .iter_mut()
            .map(|storage| usize::from(storage.erase(handle)))
            .sum();
        tracing::trace!("Erased entity {} from {} storages", handle, erased);
        erased
    }

    /// Erases every row of every storage. Registrations are kept.
    pub fn clear(&mut self) {
        for storage in &mut self.storages {
            storage.clear();
        }
    }
}

impl StorageRegistry {
    fn named(&self, name: &str) -> Option<&dyn ErasedStorage> {
        let position = *self.names.get(name)?;
        Some(&*self.storages[position])
    }

    fn named_mut(&mut self, name: &str) -> Option<&mut dyn ErasedStorage> {
        let position = *self.names.get(name)?;
        Some(&mut *self.storages[position])
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.storages.iter().map(|storage| storage.name()))
            .finish()
    }
}
