//! # Storage Error Types
//!
//! Failures that cross the storage API boundary.
//!
//! Ordinary absence is not an error: a component lookup on an entity without
//! a row returns `None`, and erasing an entity without a row is a no-op.

use thiserror::Error;

use crate::ecs::EntityHandle;

/// Errors that can occur in the storage engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A stale or unassigned handle was passed where a live one is required.
    #[error("invalid handle: index {index}, generation {generation}")]
    InvalidHandle {
        /// Index (slot id) carried by the handle.
        index: u32,
        /// Generation carried by the handle.
        generation: u32,
    },

    /// The entity is already bound to a slot of this storage.
    #[error("entity {0} already has a slot in this storage")]
    DoubleAllocation(EntityHandle),

    /// A row type capability does not match the rows it is applied to.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the capability describes.
        expected: &'static str,
        /// The type it was applied to.
        found: &'static str,
    },

    /// A sheet name is neither registered nor listed where it was looked up.
    #[error("unknown sheet: {0}")]
    UnknownSheet(String),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StorageError::InvalidHandle {
            index: 3,
            generation: 7,
        };
        assert_eq!(err.to_string(), "invalid handle: index 3, generation 7");

        let err = StorageError::DoubleAllocation(EntityHandle::new(4, 2));
        assert_eq!(
            err.to_string(),
            "entity 4v2 already has a slot in this storage"
        );

        let err = StorageError::UnknownSheet(String::from("health"));
        assert_eq!(err.to_string(), "unknown sheet: health");
    }
}
