//! The sorted, duplicate-free component-id sequence that identifies an
//! archetype.

use crate::ecs::component::Component;
use crate::ecs::error::{Error, Result};

/// An archetype key: a sorted, duplicate-free sequence of component ids.
///
/// Two signatures are equal iff their identifier sequences are elementwise
/// equal. [`Signature::hash`] gives a stable, content-addressable identity
/// that does not depend on which pathway (`with`/`without` chain) built the
/// signature, suitable as a `HashMap` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    ids: Vec<Component>,
}

impl Signature {
    /// The signature of the empty archetype — the table that holds freshly
    /// committed entities before any component is attached.
    pub const EMPTY: Self = Self { ids: Vec::new() };

    /// Construct a signature from already-sorted, duplicate-free ids.
    ///
    /// Used internally once `with`/`without` have done the sorted insertion;
    /// exposed so tests and callers who already hold a sorted set can skip
    /// the sort.
    pub(crate) fn from_sorted(ids: Vec<Component>) -> Self {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must be sorted and unique");
        Self { ids }
    }

    /// The component ids in this signature, in sorted order.
    #[inline]
    pub fn ids(&self) -> &[Component] {
        &self.ids
    }

    /// The number of components in this signature.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether this is the empty signature.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Binary search for `c`. Constant comparisons on the component count.
    #[inline]
    pub fn contains(&self, c: Component) -> bool {
        self.ids.binary_search(&c).is_ok()
    }

    /// The sorted position of `c`, or `None` if it is not present.
    #[inline]
    pub fn index_of(&self, c: Component) -> Option<usize> {
        self.ids.binary_search(&c).ok()
    }

    /// A new signature with `c` inserted at its sort position.
    ///
    /// # Errors
    /// [`Error::DuplicateSignatureComponent`] if `c` is already present.
    pub fn with(&self, c: Component) -> Result<Self> {
        match self.ids.binary_search(&c) {
            Ok(_) => Err(Error::DuplicateSignatureComponent(c)),
            Err(at) => {
                let mut ids = self.ids.clone();
                ids.insert(at, c);
                Ok(Self { ids })
            }
        }
    }

    /// A new signature with `c` removed.
    ///
    /// # Errors
    /// [`Error::MissingSignatureComponent`] if `c` is not present.
    pub fn without(&self, c: Component) -> Result<Self> {
        match self.ids.binary_search(&c) {
            Ok(at) => {
                let mut ids = self.ids.clone();
                ids.remove(at);
                Ok(Self { ids })
            }
            Err(_) => Err(Error::MissingSignatureComponent(c)),
        }
    }

    /// A deterministic, process-stable content hash of this signature.
    ///
    /// FNV-1a over the little-endian bytes of each id, rather than `std`'s
    /// randomized `HashMap` hasher, so equal signatures hash identically
    /// across calls and across however they were constructed.
    pub fn hash(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut h = FNV_OFFSET;
        for c in &self.ids {
            for byte in c.id().to_le_bytes() {
                h ^= byte as u64;
                h = h.wrapping_mul(FNV_PRIME);
            }
        }
        h
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u32) -> Component {
        Component::new(id)
    }

    #[test]
    fn empty_signature_is_empty() {
        assert!(Signature::EMPTY.is_empty());
        assert_eq!(Signature::EMPTY.len(), 0);
    }

    #[test]
    fn with_inserts_sorted() {
        let sig = Signature::EMPTY.with(c(3)).unwrap().with(c(1)).unwrap().with(c(2)).unwrap();
        assert_eq!(sig.ids(), &[c(1), c(2), c(3)]);
    }

    #[test]
    fn with_duplicate_fails() {
        let sig = Signature::EMPTY.with(c(1)).unwrap();
        assert!(matches!(sig.with(c(1)), Err(Error::DuplicateSignatureComponent(_))));
    }

    #[test]
    fn without_missing_fails() {
        assert!(matches!(Signature::EMPTY.without(c(1)), Err(Error::MissingSignatureComponent(_))));
    }

    #[test]
    fn with_then_without_is_identity() {
        let sig = Signature::EMPTY.with(c(5)).unwrap().with(c(9)).unwrap();
        let back = sig.with(c(7)).unwrap().without(c(7)).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn with_is_commutative_as_content() {
        let a = Signature::EMPTY.with(c(1)).unwrap().with(c(2)).unwrap();
        let b = Signature::EMPTY.with(c(2)).unwrap().with(c(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_is_a_function_of_content() {
        let a = Signature::from_sorted(vec![c(1), c(2), c(3)]);
        let b = Signature::from_sorted(vec![c(1), c(2), c(3)]);
        assert_eq!(a.hash(), b.hash());

        let different = Signature::from_sorted(vec![c(1), c(2)]);
        assert_ne!(a.hash(), different.hash());
    }

    #[test]
    fn index_of_and_contains() {
        let sig = Signature::from_sorted(vec![c(1), c(4), c(12)]);
        assert_eq!(sig.index_of(c(4)), Some(1));
        assert_eq!(sig.index_of(c(99)), None);
        assert!(sig.contains(c(12)));
        assert!(!sig.contains(c(13)));
    }
}
