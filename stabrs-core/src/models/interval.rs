use std::cmp::Ordering;
use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::errors::IntervalError;

/// The interval capability every index structure is parameterized over.
///
/// An interval is a pair of endpoints over a totally ordered domain, each
/// endpoint either included or excluded. Implement this for your own record
/// types to store them directly in the collections; the crate ships
/// [`Interval`] as a ready-made implementation.
///
/// Validity: `low < high`, or `low == high` with both endpoints included
/// (a point interval). The collections validate on construction via
/// [`IntervalBounds::validate`].
pub trait IntervalBounds {
    /// The endpoint domain. Only a total order is required.
    type Endpoint: Ord + Clone;

    fn low(&self) -> &Self::Endpoint;

    fn high(&self) -> &Self::Endpoint;

    fn low_included(&self) -> bool;

    fn high_included(&self) -> bool;

    /// Check the interval invariant.
    fn validate(&self) -> Result<(), IntervalError> {
        match self.low().cmp(self.high()) {
            Ordering::Greater => Err(IntervalError::LowAboveHigh),
            Ordering::Equal if !(self.low_included() && self.high_included()) => {
                Err(IntervalError::DegeneratePoint)
            }
            _ => Ok(()),
        }
    }

    /// `true` for a single-point interval.
    fn is_point(&self) -> bool {
        self.low() == self.high()
    }

    /// Compare low endpoints. On equal values an included low precedes an
    /// excluded one.
    fn cmp_lows<O>(&self, other: &O) -> Ordering
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        match self.low().cmp(other.low()) {
            Ordering::Equal => match (self.low_included(), other.low_included()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            ord => ord,
        }
    }

    /// Compare high endpoints. On equal values an excluded high precedes an
    /// included one.
    fn cmp_highs<O>(&self, other: &O) -> Ordering
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        match self.high().cmp(other.high()) {
            Ordering::Equal => match (self.high_included(), other.high_included()) {
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            ord => ord,
        }
    }

    /// Compare `self.low` against `other.high`. Equal values compare equal
    /// only when both sides are included (the intervals touch); otherwise
    /// the low lies after the high.
    fn cmp_low_high<O>(&self, other: &O) -> Ordering
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        match self.low().cmp(other.high()) {
            Ordering::Equal => {
                if self.low_included() && other.high_included() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            ord => ord,
        }
    }

    /// Compare `self.high` against `other.low`. Equal values compare equal
    /// only when both sides are included; otherwise the high lies before.
    fn cmp_high_low<O>(&self, other: &O) -> Ordering
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        match self.high().cmp(other.low()) {
            Ordering::Equal => {
                if self.high_included() && other.low_included() {
                    Ordering::Equal
                } else {
                    Ordering::Less
                }
            }
            ord => ord,
        }
    }

    /// The canonical sort order: by low endpoint, ties broken shortest
    /// first.
    fn cmp_bounds<O>(&self, other: &O) -> Ordering
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        self.cmp_lows(other).then_with(|| self.cmp_highs(other))
    }

    /// Non-empty intersection, including touching at a shared included
    /// endpoint.
    fn overlaps<O>(&self, other: &O) -> bool
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        self.cmp_low_high(other) != Ordering::Greater
            && other.cmp_low_high(self) != Ordering::Greater
    }

    /// `true` when the point lies inside the interval.
    fn overlaps_point(&self, point: &Self::Endpoint) -> bool {
        let above_low = match self.low().cmp(point) {
            Ordering::Less => true,
            Ordering::Equal => self.low_included(),
            Ordering::Greater => false,
        };
        let below_high = match point.cmp(self.high()) {
            Ordering::Less => true,
            Ordering::Equal => self.high_included(),
            Ordering::Greater => false,
        };
        above_low && below_high
    }

    /// Every point of `other` lies inside `self`, endpoints may be shared.
    fn contains_interval<O>(&self, other: &O) -> bool
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        self.cmp_lows(other) != Ordering::Greater && other.cmp_highs(self) != Ordering::Greater
    }

    /// Containment without shared endpoints on either side.
    fn strictly_contains<O>(&self, other: &O) -> bool
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        self.cmp_lows(other) == Ordering::Less && other.cmp_highs(self) == Ordering::Less
    }

    /// Endpoint-wise equality, inclusion flags included.
    fn same_bounds<O>(&self, other: &O) -> bool
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        self.cmp_lows(other) == Ordering::Equal && self.cmp_highs(other) == Ordering::Equal
    }

    /// The smallest interval containing both `self` and `other`.
    fn join<O>(&self, other: &O) -> Interval<Self::Endpoint>
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        let (low, low_included) = if self.cmp_lows(other) != Ordering::Greater {
            (self.low().clone(), self.low_included())
        } else {
            (other.low().clone(), other.low_included())
        };
        let (high, high_included) = if self.cmp_highs(other) != Ordering::Less {
            (self.high().clone(), self.high_included())
        } else {
            (other.high().clone(), other.high_included())
        };
        Interval {
            low,
            high,
            low_included,
            high_included,
        }
    }

    /// The interval strictly between `self` and `other`, with inclusion
    /// flags inverted from the flanking endpoints. `None` when the two
    /// overlap or touch without leaving room for a gap.
    fn gap_between<O>(&self, other: &O) -> Option<Interval<Self::Endpoint>>
    where
        O: IntervalBounds<Endpoint = Self::Endpoint> + ?Sized,
    {
        if self.cmp_high_low(other) == Ordering::Less {
            Interval::new(
                self.high().clone(),
                other.low().clone(),
                !self.high_included(),
                !other.low_included(),
            )
            .ok()
        } else if other.cmp_high_low(self) == Ordering::Less {
            Interval::new(
                other.high().clone(),
                self.low().clone(),
                !other.high_included(),
                !self.low_included(),
            )
            .ok()
        } else {
            None
        }
    }
}

impl<I: IntervalBounds + ?Sized> IntervalBounds for &I {
    type Endpoint = I::Endpoint;

    fn low(&self) -> &Self::Endpoint {
        (**self).low()
    }

    fn high(&self) -> &Self::Endpoint {
        (**self).high()
    }

    fn low_included(&self) -> bool {
        (**self).low_included()
    }

    fn high_included(&self) -> bool {
        (**self).high_included()
    }
}

impl<I: IntervalBounds + ?Sized> IntervalBounds for std::sync::Arc<I> {
    type Endpoint = I::Endpoint;

    fn low(&self) -> &Self::Endpoint {
        (**self).low()
    }

    fn high(&self) -> &Self::Endpoint {
        (**self).high()
    }

    fn low_included(&self) -> bool {
        (**self).low_included()
    }

    fn high_included(&self) -> bool {
        (**self).high_included()
    }
}

/// A concrete interval over any ordered endpoint domain.
///
/// Constructors validate the bounds, so a value of this type always holds a
/// well-formed interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval<T: Ord + Clone> {
    low: T,
    high: T,
    low_included: bool,
    high_included: bool,
}

impl<T: Ord + Clone> Interval<T> {
    pub fn new(
        low: T,
        high: T,
        low_included: bool,
        high_included: bool,
    ) -> Result<Self, IntervalError> {
        let interval = Interval {
            low,
            high,
            low_included,
            high_included,
        };
        interval.validate()?;
        Ok(interval)
    }

    /// `[low, high]`
    pub fn closed(low: T, high: T) -> Result<Self, IntervalError> {
        Self::new(low, high, true, true)
    }

    /// `(low, high)`
    pub fn open(low: T, high: T) -> Result<Self, IntervalError> {
        Self::new(low, high, false, false)
    }

    /// `[low, high)`
    pub fn closed_open(low: T, high: T) -> Result<Self, IntervalError> {
        Self::new(low, high, true, false)
    }

    /// `(low, high]`
    pub fn open_closed(low: T, high: T) -> Result<Self, IntervalError> {
        Self::new(low, high, false, true)
    }

    /// The degenerate interval `[at, at]`.
    pub fn point(at: T) -> Self {
        Interval {
            low: at.clone(),
            high: at,
            low_included: true,
            high_included: true,
        }
    }

    /// Construction bypassing validation, for endpoints already known to be
    /// ordered.
    pub(crate) fn unchecked(low: T, high: T, low_included: bool, high_included: bool) -> Self {
        debug_assert!(low <= high);
        Interval {
            low,
            high,
            low_included,
            high_included,
        }
    }

    pub fn into_bounds(self) -> (T, T, bool, bool) {
        (self.low, self.high, self.low_included, self.high_included)
    }
}

impl<T: Ord + Clone> IntervalBounds for Interval<T> {
    type Endpoint = T;

    fn low(&self) -> &T {
        &self.low
    }

    fn high(&self) -> &T {
        &self.high
    }

    fn low_included(&self) -> bool {
        self.low_included
    }

    fn high_included(&self) -> bool {
        self.high_included
    }
}

impl<T: Ord + Clone> TryFrom<Range<T>> for Interval<T> {
    type Error = IntervalError;

    fn try_from(range: Range<T>) -> Result<Self, IntervalError> {
        Interval::closed_open(range.start, range.end)
    }
}

impl<T: Ord + Clone> TryFrom<RangeInclusive<T>> for Interval<T> {
    type Error = IntervalError;

    fn try_from(range: RangeInclusive<T>) -> Result<Self, IntervalError> {
        let (start, end) = range.into_inner();
        Interval::closed(start, end)
    }
}

impl<T: Ord + Clone + fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low_included { '[' } else { '(' };
        let close = if self.high_included { ']' } else { ')' };
        write!(f, "{}{}, {}{}", open, self.low, self.high, close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn iv(low: i32, high: i32, li: bool, hi: bool) -> Interval<i32> {
        Interval::new(low, high, li, hi).unwrap()
    }

    #[test]
    fn construction_validates() {
        assert_eq!(Interval::closed(5, 1).unwrap_err(), IntervalError::LowAboveHigh);
        assert_eq!(
            Interval::closed_open(3, 3).unwrap_err(),
            IntervalError::DegeneratePoint
        );
        assert_eq!(Interval::open(3, 3).unwrap_err(), IntervalError::DegeneratePoint);
        assert!(Interval::closed(3, 3).is_ok());
        assert!(Interval::point(3).is_point());
    }

    #[rstest]
    // touching at a shared included endpoint overlaps
    #[case(iv(1, 5, true, true), iv(5, 7, true, true), true)]
    // touching with the shared endpoint excluded on either side does not
    #[case(iv(1, 5, true, false), iv(5, 7, true, true), false)]
    #[case(iv(1, 5, true, true), iv(5, 7, false, true), false)]
    #[case(iv(1, 5, true, true), iv(2, 6, true, false), true)]
    #[case(iv(1, 2, true, true), iv(3, 4, true, true), false)]
    fn overlap_cases(
        #[case] a: Interval<i32>,
        #[case] b: Interval<i32>,
        #[case] expected: bool,
    ) {
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }

    #[test]
    fn point_membership_respects_inclusion() {
        let half_open = iv(2, 6, true, false);
        assert!(half_open.overlaps_point(&2));
        assert!(half_open.overlaps_point(&5));
        assert!(!half_open.overlaps_point(&6));

        let open = iv(3, 4, false, false);
        assert!(!open.overlaps_point(&3));
        assert!(!open.overlaps_point(&4));

        assert!(Interval::point(3).overlaps_point(&3));
    }

    #[test]
    fn containment() {
        let outer = iv(0, 10, true, true);
        let inner = iv(2, 8, true, true);
        assert!(outer.contains_interval(&inner));
        assert!(outer.strictly_contains(&inner));
        assert!(outer.contains_interval(&outer));
        assert!(!outer.strictly_contains(&outer));

        // shared low blocks strict containment
        let flush = iv(0, 8, true, true);
        assert!(outer.contains_interval(&flush));
        assert!(!outer.strictly_contains(&flush));

        // same values, excluded low of the inner one makes it strict
        let shaved = iv(0, 8, false, true);
        assert!(outer.strictly_contains(&shaved));
    }

    #[test]
    fn canonical_order_is_low_then_shortest() {
        let a = iv(1, 3, true, true);
        let b = iv(1, 10, true, true);
        let c = iv(2, 3, true, true);
        assert_eq!(a.cmp_bounds(&b), Ordering::Less);
        assert_eq!(b.cmp_bounds(&c), Ordering::Less);
        // included low precedes excluded low at the same value
        let d = iv(1, 3, false, true);
        assert_eq!(a.cmp_bounds(&d), Ordering::Less);
    }

    #[test]
    fn join_covers_both() {
        let a = iv(1, 5, true, false);
        let b = iv(3, 9, false, true);
        let joined = a.join(&b);
        assert!(joined.same_bounds(&iv(1, 9, true, true)));
    }

    #[test]
    fn gap_between_inverts_inclusions() {
        let a = iv(1, 2, true, true);
        let b = iv(3, 4, true, true);
        let gap = a.gap_between(&b).unwrap();
        assert!(gap.same_bounds(&iv(2, 3, false, false)));
        // symmetric in argument order
        let gap = b.gap_between(&a).unwrap();
        assert!(gap.same_bounds(&iv(2, 3, false, false)));

        // both ends excluded at the same value leaves a point gap
        let a = iv(1, 2, true, false);
        let b = iv(2, 3, false, true);
        let gap = a.gap_between(&b).unwrap();
        assert!(gap.is_point());
        assert!(gap.same_bounds(&Interval::point(2)));

        // an included flank absorbs the point
        let a = iv(1, 2, true, true);
        assert_eq!(a.gap_between(&b), None);

        // overlap leaves no gap
        let a = iv(1, 3, true, true);
        assert_eq!(a.gap_between(&b), None);
    }

    #[test]
    fn algebra_laws_hold_on_random_pairs() {
        use rand::Rng;

        fn random_interval(rng: &mut impl Rng) -> Interval<i32> {
            let low = rng.random_range(0..50);
            let len = rng.random_range(0..20);
            if len == 0 {
                Interval::point(low)
            } else {
                iv(low, low + len, rng.random_bool(0.5), rng.random_bool(0.5))
            }
        }

        let mut rng = rand::rng();

        for _ in 0..500 {
            let a = random_interval(&mut rng);
            let b = random_interval(&mut rng);
            assert_eq!(a.overlaps(&b), b.overlaps(&a));
            assert!(a.contains_interval(&a));
            assert!(!a.strictly_contains(&a));
            assert_eq!(a.cmp_bounds(&b), b.cmp_bounds(&a).reverse());
            if a.contains_interval(&b) && b.contains_interval(&a) {
                assert!(a.same_bounds(&b));
            }
            if let Some(gap) = a.gap_between(&b) {
                assert!(gap.validate().is_ok());
                assert!(!gap.overlaps(&a));
                assert!(!gap.overlaps(&b));
            }
        }
    }
}
