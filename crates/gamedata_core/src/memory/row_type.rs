//! # Row Types
//!
//! The narrow "copy a row of known size" capability used by copy-on-write
//! storage. A [`RowType`] is captured once, when a storage is registered,
//! and carries a plain function pointer instead of a global type registry.

use std::any::{self, Any, TypeId};
use std::fmt;
use std::mem;

use bytemuck::Pod;

use crate::error::{StorageError, StorageResult};

/// Copies `src` into `dst`, returning `false` if either is not the row type.
type CopyFn = fn(&dyn Any, &mut dyn Any) -> bool;

/// Size, identity and copy function of a row type.
#[derive(Clone, Copy)]
pub struct RowType {
    name: &'static str,
    type_id: TypeId,
    size: usize,
    copy: CopyFn,
}

impl RowType {
    /// Row type copied through `Clone::clone_from`.
    #[must_use]
    pub fn of<T: Clone + Any>() -> Self {
        Self {
            name: any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: mem::size_of::<T>(),
            copy: clone_row::<T>,
        }
    }

    /// Row type copied byte for byte.
    #[must_use]
    pub fn pod<T: Pod>() -> Self {
        Self {
            name: any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: mem::size_of::<T>(),
            copy: copy_bytes::<T>,
        }
    }

    /// Returns the type name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the row size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Checks that this row type describes `T`.
    #[inline]
    #[must_use]
    pub fn describes<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Checks that this row type describes `T`, as an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TypeMismatch`] if it describes another type.
    pub fn expect_row<T: Any>(&self) -> StorageResult<()> {
        if self.describes::<T>() {
            Ok(())
        } else {
            Err(StorageError::TypeMismatch {
                expected: self.name,
                found: any::type_name::<T>(),
            })
        }
    }

    /// Copies one row into another.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TypeMismatch`] if `src` or `dst` is not a row
    /// of this type. `dst` is left untouched in that case.
    pub fn copy(&self, src: &dyn Any, dst: &mut dyn Any) -> StorageResult<()> {
        if (self.copy)(src, dst) {
            Ok(())
        } else {
            Err(StorageError::TypeMismatch {
                expected: self.name,
                found: "a different row type",
            })
        }
    }
}

impl fmt::Debug for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowType")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn clone_row<T: Clone + Any>(src: &dyn Any, dst: &mut dyn Any) -> bool {
    match (src.downcast_ref::<T>(), dst.downcast_mut::<T>()) {
        (Some(src), Some(dst)) => {
            dst.clone_from(src);
            true
        }
        _ => false,
    }
}

fn copy_bytes<T: Pod>(src: &dyn Any, dst: &mut dyn Any) -> bool {
    match (src.downcast_ref::<T>(), dst.downcast_mut::<T>()) {
        (Some(src), Some(dst)) => {
            bytemuck::bytes_of_mut(dst).copy_from_slice(bytemuck::bytes_of(src));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Vec3 {
        x: f32,
        y: f32,
        z: f32,
    }

    #[test]
    fn test_clone_copy() {
        let row_type = RowType::of::<String>();
        let src = String::from("archetype");
        let mut dst = String::new();

        row_type.copy(&src, &mut dst).unwrap();
        assert_eq!(dst, "archetype");
        assert!(row_type.describes::<String>());
        assert_eq!(row_type.size(), std::mem::size_of::<String>());
    }

    #[test]
    fn test_pod_copy() {
        let row_type = RowType::pod::<Vec3>();
        let src = Vec3 {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        };
        let mut dst = Vec3::default();

        row_type.copy(&src, &mut dst).unwrap();
        assert_eq!(dst, src);
        assert_eq!(row_type.size(), 12);
    }

    #[test]
    fn test_type_mismatch() {
        let row_type = RowType::pod::<Vec3>();
        let src = 5u32;
        let mut dst = Vec3::default();

        let err = row_type.copy(&src, &mut dst).unwrap_err();
        assert!(matches!(err, StorageError::TypeMismatch { .. }));
        assert_eq!(dst, Vec3::default());

        assert!(row_type.expect_row::<u32>().is_err());
        assert!(row_type.expect_row::<Vec3>().is_ok());
    }
}
