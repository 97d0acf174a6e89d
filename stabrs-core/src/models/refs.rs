use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fxhash::FxHashSet;

/// Shared handle to a caller-supplied interval.
///
/// Collections store and yield these; the interval value itself is never
/// mutated by an index. Identity is the handle, not the bounds: two handles
/// to interval-equal values are distinct members.
pub type IntervalRef<I> = Arc<I>;

/// Reference identity of two handles.
#[inline]
pub fn same_ref<I>(a: &IntervalRef<I>, b: &IntervalRef<I>) -> bool {
    Arc::ptr_eq(a, b)
}

/// An interval handle hashed and compared by pointer.
pub struct ByRef<I>(pub IntervalRef<I>);

impl<I> Clone for ByRef<I> {
    fn clone(&self) -> Self {
        ByRef(Arc::clone(&self.0))
    }
}

impl<I> PartialEq for ByRef<I> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<I> Eq for ByRef<I> {}

impl<I> Hash for ByRef<I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl<I: fmt::Debug> fmt::Debug for ByRef<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A set of interval handles with reference-equality semantics.
///
/// Backs the per-node interval sets of the endpoint-keyed trees. The union,
/// difference and intersection helpers are the only set arithmetic the
/// structures need; they are invoked when rotations migrate sets between
/// nodes.
pub struct RefSet<I> {
    inner: FxHashSet<ByRef<I>>,
}

impl<I> Clone for RefSet<I> {
    fn clone(&self) -> Self {
        RefSet {
            inner: self.inner.clone(),
        }
    }
}

impl<I> Default for RefSet<I> {
    fn default() -> Self {
        RefSet {
            inner: FxHashSet::default(),
        }
    }
}

impl<I> RefSet<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert a handle; `false` when already present.
    pub fn insert(&mut self, interval: &IntervalRef<I>) -> bool {
        self.inner.insert(ByRef(Arc::clone(interval)))
    }

    /// Remove a handle; `false` when absent.
    pub fn remove(&mut self, interval: &IntervalRef<I>) -> bool {
        self.inner.remove(&ByRef(Arc::clone(interval)))
    }

    pub fn contains(&self, interval: &IntervalRef<I>) -> bool {
        self.inner.contains(&ByRef(Arc::clone(interval)))
    }

    pub fn iter(&self) -> RefSetIter<'_, I> {
        RefSetIter(self.inner.iter())
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// In-place union.
    pub fn extend_from(&mut self, other: &RefSet<I>) {
        for interval in other.iter() {
            self.insert(interval);
        }
    }

    /// In-place difference.
    pub fn remove_all(&mut self, other: &RefSet<I>) {
        for interval in other.iter() {
            self.remove(interval);
        }
    }

    pub fn intersection(&self, other: &RefSet<I>) -> RefSet<I> {
        let mut out = RefSet::new();
        for interval in self.iter() {
            if other.contains(interval) {
                out.insert(interval);
            }
        }
        out
    }

    pub fn difference(&self, other: &RefSet<I>) -> RefSet<I> {
        let mut out = RefSet::new();
        for interval in self.iter() {
            if !other.contains(interval) {
                out.insert(interval);
            }
        }
        out
    }
}

impl<I: fmt::Debug> fmt::Debug for RefSet<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.iter()).finish()
    }
}

/// Borrowing iterator over a [`RefSet`].
pub struct RefSetIter<'a, I>(std::collections::hash_set::Iter<'a, ByRef<I>>);

impl<'a, I> Iterator for RefSetIter<'a, I> {
    type Item = &'a IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|by_ref| &by_ref.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn identity_is_by_pointer_not_value() {
        let a: IntervalRef<i32> = Arc::new(7);
        let b: IntervalRef<i32> = Arc::new(7);

        let mut set = RefSet::new();
        assert!(set.insert(&a));
        assert!(!set.insert(&a));
        assert!(set.insert(&b));
        assert_eq!(set.len(), 2);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert!(set.contains(&b));
    }

    #[test]
    fn set_arithmetic() {
        let refs: Vec<IntervalRef<i32>> = (0..4).map(Arc::new).collect();
        let mut left = RefSet::new();
        let mut right = RefSet::new();
        for r in &refs[..3] {
            left.insert(r);
        }
        for r in &refs[1..] {
            right.insert(r);
        }

        assert_eq!(left.intersection(&right).len(), 2);
        assert_eq!(left.difference(&right).len(), 1);

        let mut union = left.clone();
        union.extend_from(&right);
        assert_eq!(union.len(), 4);

        left.remove_all(&right);
        assert_eq!(left.len(), 1);
        assert!(left.contains(&refs[0]));
    }
}
