//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - An id naming a world object slot
//! - A generation counter for safe reuse
//!
//! A handle carries no data and owns nothing. Whether it still names a live
//! object is decided by the world (see [`ObjectLiveness`](super::ObjectLiveness)).

use std::fmt;

/// Generation-tagged identifier for a world object.
///
/// The handle is split into two parts:
/// - Lower 32 bits: object id
/// - Upper 32 bits: generation counter for detecting stale references
///
/// Two handles are equal iff both id and generation match.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityHandle(u64);

impl EntityHandle {
    /// Id reserved for the unassigned handle.
    pub const NONE_ID: u32 = u32::MAX;

    /// The unassigned handle.
    pub const NONE: Self = Self::new(Self::NONE_ID, 0);

    /// Creates a handle from id and generation.
    ///
    /// # Arguments
    ///
    /// * `id` - The object id (0 to 2^32-2)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(id: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (id as u64))
    }

    /// Returns the id portion of the handle.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if the handle names an object at all.
    ///
    /// This says nothing about liveness.
    #[inline]
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.id() != Self::NONE_ID
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_assigned() {
            write!(f, "{}v{}", self.id(), self.generation())
        } else {
            f.write_str("none")
        }
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_roundtrip() {
        let handle = EntityHandle::new(12345, 67890);
        assert_eq!(handle.id(), 12345);
        assert_eq!(handle.generation(), 67890);
        assert!(handle.is_assigned());
    }

    #[test]
    fn test_equality_needs_both_parts() {
        assert_eq!(EntityHandle::new(1, 1), EntityHandle::new(1, 1));
        assert_ne!(EntityHandle::new(1, 1), EntityHandle::new(1, 2));
        assert_ne!(EntityHandle::new(1, 1), EntityHandle::new(2, 1));
    }

    #[test]
    fn test_unassigned() {
        assert!(!EntityHandle::NONE.is_assigned());
        assert!(!EntityHandle::default().is_assigned());
        assert!(!EntityHandle::new(EntityHandle::NONE_ID, 9).is_assigned());
        assert_eq!(EntityHandle::NONE.to_string(), "none");
        assert_eq!(EntityHandle::new(7, 3).to_string(), "7v3");
    }
}
