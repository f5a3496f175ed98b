//! # Archetypes
//!
//! An [`Archetype`] is a named set of template rows, one per named storage
//! ("sheet") of a [`StorageRegistry`](super::StorageRegistry). Instantiating
//! it seeds every listed sheet for one object in a single call:
//!
//! - sparse sheets share the template until the object's first write,
//! - dense sheets receive a copy right away.
//!
//! Forgetting an archetype detaches every sparse slot still sharing one of
//! its templates, so the templates can be dropped by their owner.

use std::any::{self, Any};
use std::collections::BTreeMap;
use std::fmt;

use super::entity::EntityHandle;
use super::sparse::ArchetypeRow;
use crate::error::{StorageError, StorageResult};

/// Seeding of an allocator from an archetype template.
pub trait ArchetypeSeed<T> {
    /// Gives `handle` the template row, binding a slot first if needed.
    ///
    /// A slot that already holds a row is re-seeded: its previous content
    /// is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHandle`] if `handle` is unassigned.
    fn seed(&mut self, handle: EntityHandle, archetype: &ArchetypeRow<T>) -> StorageResult<u32>;

    /// Detaches every slot that still references `archetype`.
    ///
    /// # Returns
    ///
    /// The number of slots that had to copy the template to keep reading it.
    fn forget(&mut self, archetype: &ArchetypeRow<T>) -> usize;
}

/// Type-erased template row of one sheet.
pub struct ArchetypeSheet {
    row: Box<dyn Any>,
    type_name: &'static str,
}

impl ArchetypeSheet {
    fn new<T: 'static>(row: ArchetypeRow<T>) -> Self {
        Self {
            row: Box::new(row),
            type_name: any::type_name::<T>(),
        }
    }

    /// Row type name of the template.
    #[inline]
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Typed access to the template.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TypeMismatch`] if the template is not a `T` row.
    pub fn row<T: 'static>(&self) -> StorageResult<&ArchetypeRow<T>> {
        self.row
            .downcast_ref()
            .ok_or(StorageError::TypeMismatch {
                expected: any::type_name::<T>(),
                found: self.type_name,
            })
    }
}

impl fmt::Debug for ArchetypeSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArchetypeSheet").field(&self.type_name).finish()
    }
}

/// Named set of template rows keyed by sheet name.
///
/// # Example
///
/// ```rust
/// use gamedata_core::{Archetype, ArchetypeRow};
///
/// let goblin = Archetype::new("goblin")
///     .with("health", ArchetypeRow::new(30u32))
///     .with("name", ArchetypeRow::new(String::from("goblin")));
///
/// assert_eq!(goblin.len(), 2);
/// assert_eq!(goblin.row::<u32>("health").map(|row| *row.get()), Ok(30));
/// assert!(goblin.row::<u64>("health").is_err());
/// ```
#[derive(Debug)]
pub struct Archetype {
    name: String,
    sheets: BTreeMap<String, ArchetypeSheet>,
}

impl Archetype {
    /// Creates an archetype without sheets.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: BTreeMap::new(),
        }
    }

    /// Adds a template row for `sheet`, builder style.
    #[must_use]
    pub fn with<T: 'static>(mut self, sheet: impl Into<String>, row: ArchetypeRow<T>) -> Self {
        self.insert(sheet, row);
        self
    }

    /// Sets the template row of `sheet`.
    ///
    /// # Returns
    ///
    /// `true` if the sheet had no template before.
    pub fn insert<T: 'static>(&mut self, sheet: impl Into<String>, row: ArchetypeRow<T>) -> bool {
        self.sheets
            .insert(sheet.into(), ArchetypeSheet::new(row))
            .is_none()
    }

    /// Archetype name, for logs.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed template of `sheet`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownSheet`] if the sheet is not listed and
    /// [`StorageError::TypeMismatch`] if its template is not a `T` row.
    pub fn row<T: 'static>(&self, sheet: &str) -> StorageResult<&ArchetypeRow<T>> {
        self.sheets
            .get(sheet)
            .ok_or_else(|| StorageError::UnknownSheet(sheet.to_string()))?
            .row()
    }

    /// Number of sheets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Checks if the archetype lists no sheet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Iterates over `(sheet name, template)` pairs in name order.
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &ArchetypeSheet)> {
        self.sheets
            .iter()
            .map(|(name, sheet)| (name.as_str(), sheet))
    }
}
