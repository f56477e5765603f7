//! Generational handles shared by the parameter, entity, and constraint
//! tables.
//!
//! A [`Handle<Tag>`] is a plain `(index, generation)` pair, phantom-typed so
//! that a [`ParamHandle`] and an [`EntityHandle`] cannot be swapped by
//! accident even though they carry identical bits. Equality is the
//! structural `(index, generation)` comparison described in spec §3/§6.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Reserved index used by [`Handle::INVALID`]. Never assigned to a live slot.
pub const INVALID_INDEX: u16 = 0xFFFF;

/// A generational handle into a [`crate::slotmap::SlotTable`].
///
/// `Tag` is a zero-sized marker type (see [`ParamTag`], [`EntityTag`],
/// [`ConstraintTag`]) that keeps handles from different tables from being
/// interchangeable at the type level.
pub struct Handle<Tag> {
    pub(crate) index: u16,
    pub(crate) generation: u32,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> Handle<Tag> {
    /// The reserved handle that never matches any slot: `(0xFFFF, 0)`.
    pub const INVALID: Self = Self::new(INVALID_INDEX, 0);

    pub(crate) const fn new(index: u16, generation: u32) -> Self {
        Self {
            index,
            generation,
            _tag: PhantomData,
        }
    }

    /// `true` unless this is exactly [`Handle::INVALID`]'s bit pattern.
    ///
    /// This is a cheap structural check only — it does not consult a table,
    /// so it cannot tell a stale handle from a live one. Use
    /// [`crate::slotmap::SlotTable::alive`] for that.
    pub fn is_invalid(&self) -> bool {
        self.index == INVALID_INDEX
    }
}

impl<Tag> Clone for Handle<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Handle<Tag> {}

impl<Tag> PartialEq for Handle<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<Tag> Eq for Handle<Tag> {}

impl<Tag> Default for Handle<Tag> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<Tag> fmt::Debug for Handle<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

// `derive(Serialize, Deserialize)` would require `Tag: Serialize`, which
// none of the marker types need to be. Implement by hand over the two plain
// fields instead.
impl<Tag> Serialize for Handle<Tag> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.index)?;
        tup.serialize_element(&self.generation)?;
        tup.end()
    }
}

impl<'de, Tag> Deserialize<'de> for Handle<Tag> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (index, generation) = <(u16, u32)>::deserialize(deserializer)?;
        Ok(Self::new(index, generation))
    }
}

/// Marker tag for [`crate::param::ParamHandle`].
#[derive(Debug, Clone, Copy)]
pub struct ParamTag;

/// Marker tag for [`crate::entity::EntityHandle`].
#[derive(Debug, Clone, Copy)]
pub struct EntityTag;

/// Marker tag for [`crate::constraint::ConstraintHandle`].
#[derive(Debug, Clone, Copy)]
pub struct ConstraintTag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_is_invalid() {
        let h: Handle<ParamTag> = Handle::INVALID;
        assert!(h.is_invalid());
        assert_eq!(h, Handle::default());
    }

    #[test]
    fn equality_is_structural() {
        let a: Handle<ParamTag> = Handle::new(3, 1);
        let b: Handle<ParamTag> = Handle::new(3, 1);
        let c: Handle<ParamTag> = Handle::new(3, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
