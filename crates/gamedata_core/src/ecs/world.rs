//! # World
//!
//! The liveness oracle consulted by garbage collection, and a reference
//! world object table implementing it.
//!
//! Deleting an object is two-phase: [`World::delete_object`] makes the
//! handle invalid at once and marks it as being destroyed, then
//! [`World::flush_deletions`] recycles the id. Component storages only learn
//! about the deletion at their next garbage collection.

use super::entity::EntityHandle;

/// Answers whether a world object is still alive.
///
/// This is the only surface of the world the storage engine consumes.
pub trait ObjectLiveness {
    /// Returns `true` if the handle names a live object.
    fn is_object_valid(&self, handle: EntityHandle) -> bool;

    /// Returns `true` if the object was deleted but its deletion has not
    /// been flushed yet.
    fn is_object_being_destroyed(&self, _handle: EntityHandle) -> bool {
        false
    }
}

/// Lifecycle state of a world object slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjectState {
    /// Never used or recycled.
    Free,
    /// Live object.
    Alive,
    /// Deleted, waiting for `flush_deletions`.
    BeingDestroyed,
}

/// One world object slot.
#[derive(Clone, Copy, Debug)]
struct ObjectSlot {
    generation: u32,
    state: ObjectState,
}

/// Reference world object table.
///
/// # Example
///
/// ```rust
/// use gamedata_core::{ObjectLiveness, World};
///
/// let mut world = World::new();
/// let object = world.create_object();
/// assert!(world.is_object_valid(object));
///
/// world.delete_object(object);
/// assert!(!world.is_object_valid(object));
/// assert!(world.is_object_being_destroyed(object));
///
/// world.flush_deletions();
/// assert!(!world.is_object_being_destroyed(object));
/// ```
#[derive(Debug, Default)]
pub struct World {
    /// All object slots.
    objects: Vec<ObjectSlot>,
    /// Free list of object ids for reuse.
    free_ids: Vec<u32>,
    /// Objects deleted since the last flush.
    pending_deletions: Vec<EntityHandle>,
    /// Number of currently alive objects.
    alive_count: usize,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty world with room for `capacity` objects.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Returns the number of currently alive objects.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Creates a new object, returning its handle.
    ///
    /// Recycled ids come back with a bumped generation.
    ///
    /// # Panics
    ///
    /// Panics if the world exceeds `u32::MAX - 1` object slots.
    pub fn create_object(&mut self) -> EntityHandle {
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = u32::try_from(self.objects.len())
                    .ok()
                    .filter(|id| *id != EntityHandle::NONE_ID)
                    .expect("world object table is full");
                self.objects.push(ObjectSlot {
                    generation: 0,
                    state: ObjectState::Free,
                });
                id
            }
        };

        let slot = &mut self.objects[id as usize];
        // Increment generation to invalidate old references
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = ObjectState::Alive;
        self.alive_count += 1;

        EntityHandle::new(id, slot.generation)
    }

    /// Deletes an object.
    ///
    /// The handle stops being valid immediately; the id is recycled by the
    /// next [`World::flush_deletions`].
    ///
    /// # Returns
    ///
    /// `true` if the object was deleted, `false` if it was already dead
    /// or the handle was stale.
    pub fn delete_object(&mut self, handle: EntityHandle) -> bool {
        if !self.is_object_valid(handle) {
            return false;
        }

        self.objects[handle.id() as usize].state = ObjectState::BeingDestroyed;
        self.pending_deletions.push(handle);
        self.alive_count -= 1;
        true
    }

    /// Finalizes pending deletions and recycles their ids.
    ///
    /// # Returns
    ///
    /// The number of objects finalized.
    pub fn flush_deletions(&mut self) -> usize {
        let count = self.pending_deletions.len();
        for handle in self.pending_deletions.drain(..) {
            self.objects[handle.id() as usize].state = ObjectState::Free;
            self.free_ids.push(handle.id());
        }
        count
    }

    /// Iterates over all alive objects.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.objects.iter().enumerate().filter_map(|(id, slot)| {
            (slot.state == ObjectState::Alive)
                .then(|| EntityHandle::new(id as u32, slot.generation))
        })
    }

    fn slot(&self, handle: EntityHandle) -> Option<&ObjectSlot> {
        if !handle.is_assigned() {
            return None;
        }
        self.objects
            .get(handle.id() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl ObjectLiveness for World {
    #[inline]
    fn is_object_valid(&self, handle: EntityHandle) -> bool {
        self.slot(handle)
            .is_some_and(|slot| slot.state == ObjectState::Alive)
    }

    #[inline]
    fn is_object_being_destroyed(&self, handle: EntityHandle) -> bool {
        self.slot(handle)
            .is_some_and(|slot| slot.state == ObjectState::BeingDestroyed)
    }
}
