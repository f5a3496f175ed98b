//! # Strided Views
//!
//! Exposes one field of a dense-stored struct as if it were its own
//! component store, without duplicating storage.
//!
//! ```text
//! rows:   [ pos | vel | hp ] [ pos | vel | hp ] [ pos | vel | hp ]
//! view:           ^^^                ^^^                ^^^
//!                 stride = size_of::<Row>()
//! ```
//!
//! The field is addressed through a [`FieldProjection`] built by
//! [`field_projection!`](crate::field_projection), a pair of accessor
//! functions resolved at compile time.

use std::fmt;

use super::allocator::RowAllocator;
use super::dense::DenseRowAllocator;
use super::entity::EntityHandle;
use super::view::ComponentView;
use super::world::ObjectLiveness;

/// Accessor pair projecting a row of type `S` onto its field of type `F`.
pub struct FieldProjection<S, F> {
    name: &'static str,
    get: fn(&S) -> &F,
    get_mut: fn(&mut S) -> &mut F,
}

impl<S, F> FieldProjection<S, F> {
    /// Creates a projection from its accessors.
    ///
    /// Prefer [`field_projection!`](crate::field_projection).
    #[must_use]
    pub const fn new(name: &'static str, get: fn(&S) -> &F, get_mut: fn(&mut S) -> &mut F) -> Self {
        Self { name, get, get_mut }
    }

    /// Returns the field name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Projects a row onto the field.
    #[inline]
    pub fn project<'r>(&self, row: &'r S) -> &'r F {
        (self.get)(row)
    }

    /// Projects a mutable row onto the field.
    #[inline]
    pub fn project_mut<'r>(&self, row: &'r mut S) -> &'r mut F {
        (self.get_mut)(row)
    }
}

impl<S, F> Clone for FieldProjection<S, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, F> Copy for FieldProjection<S, F> {}

impl<S, F> fmt::Debug for FieldProjection<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProjection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builds a [`FieldProjection`] for a named field of a struct.
///
/// # Example
///
/// ```rust
/// use gamedata_core::field_projection;
///
/// #[derive(Default)]
/// struct Unit {
///     health: u32,
/// }
///
/// let health = field_projection!(Unit, health);
/// let unit = Unit { health: 7 };
/// assert_eq!(*health.project(&unit), 7);
/// assert_eq!(health.name(), "health");
/// ```
#[macro_export]
macro_rules! field_projection {
    ($owner:ty, $field:ident) => {
        $crate::FieldProjection::<$owner, _>::new(
            stringify!($field),
            |row: &$owner| &row.$field,
            |row: &mut $owner| &mut row.$field,
        )
    };
}

/// View of one field across a dense storage.
///
/// Per-handle access delegates to the owning dense allocator. The
/// `for_each_live` walkers instead read the row pages directly and
/// re-validate every entry against the world, so rows of entities that died
/// since the last garbage collection are skipped too.
pub struct StridedView<'a, S, F> {
    owner: &'a mut DenseRowAllocator<S>,
    field: FieldProjection<S, F>,
}

impl<'a, S: Default, F> StridedView<'a, S, F> {
    /// Creates a view of `field` over `owner`.
    #[must_use]
    pub fn new(owner: &'a mut DenseRowAllocator<S>, field: FieldProjection<S, F>) -> Self {
        Self { owner, field }
    }

    /// The projected field.
    #[inline]
    #[must_use]
    pub const fn field(&self) -> &FieldProjection<S, F> {
        &self.field
    }

    /// Visits the field of every row whose entity the world reports alive.
    pub fn for_each_live<W, G>(&self, world: &W, mut f: G)
    where
        W: ObjectLiveness + ?Sized,
        G: FnMut(EntityHandle, &F),
    {
        let slots = self.owner.rows().pages().flatten();
        for (handle, slot) in self.owner.index().handles().iter().zip(slots) {
            if !world.is_object_valid(*handle) {
                continue;
            }
            if let Some(row) = slot.value() {
                f(*handle, self.field.project(row));
            }
        }
    }

    /// Visits the field of every row whose entity the world reports alive,
    /// with write access.
    pub fn for_each_live_mut<W, G>(&mut self, world: &W, mut f: G)
    where
        W: ObjectLiveness + ?Sized,
        G: FnMut(EntityHandle, &mut F),
    {
        let field = self.field;
        let (index, rows) = self.owner.parts_mut();
        for (handle, slot) in index.handles().iter().zip(rows.pages_mut().flatten()) {
            if !world.is_object_valid(*handle) {
                continue;
            }
            if let Some(row) = slot.value_mut() {
                f(*handle, field.project_mut(row));
            }
        }
    }
}

impl<S: Default, F> ComponentView<F> for StridedView<'_, S, F> {
    #[inline]
    fn get(&self, handle: EntityHandle) -> Option<&F> {
        self.owner.get(handle).map(|row| self.field.project(row))
    }

    #[inline]
    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut F> {
        let field = self.field;
        self.owner.get_mut(handle).map(|row| field.project_mut(row))
    }

    fn get_or_create(&mut self, handle: EntityHandle) -> &mut F {
        let field = self.field;
        field.project_mut(self.owner.get_or_create(handle))
    }

    #[inline]
    fn get_data_for_deletion(&self, handle: EntityHandle) -> Option<&F> {
        self.get(handle)
    }

    /// Erases the whole owning row.
    fn erase(&mut self, handle: EntityHandle) -> bool {
        self.owner.erase(handle)
    }
}
