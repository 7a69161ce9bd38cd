//! Component identifiers and opaque component values.
//!
//! A component here is only ever a type, not data: an opaque, externally
//! assigned identifier. The data a component carries for a given entity is
//! stored as a [`Value`] — a type-erased, reference-counted handle a typed
//! layer built on top of this crate can downcast. Callers (generated or
//! hand-written) own the mapping from logical component types to ids; this
//! crate only requires that the id for a given logical component stays
//! stable for the engine's lifetime.

use std::any::Any;
use std::sync::Arc;

/// An opaque component-type identifier.
///
/// Two components are equal iff their identifiers are equal. Identifiers are
/// assigned externally (by a code generator or by hand) and are ordered so
/// that [`crate::ecs::signature::Signature`] can keep its component list
/// sorted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component(u32);

impl Component {
    /// Construct a component identifier from a raw id.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// Get the index of this component if it were to live in indexable
    /// storage (e.g. a `Vec`).
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Component {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// An opaque component value.
///
/// `Arc` (rather than `Box`) lets [`crate::ecs::engine::Engine::get_component`]
/// return an owned handle without holding the storage lock open; a typed
/// wrapper built on this crate downcasts via `Any::downcast_ref`.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value as an opaque component [`Value`].
#[inline]
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}
