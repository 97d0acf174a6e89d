use std::cmp::Ordering;
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{Interval, IntervalBounds, IntervalRef};

use crate::traits::{BoxedIter, IntervalCollection};

/// Read-only flat array over a pairwise disjoint interval set.
///
/// Because the members never overlap, sorting by `cmp_bounds` also sorts the
/// high endpoints, so every query is a binary search over one array. The
/// cheapest structure when the input is disjoint and static; construction
/// rejects overlapping input.
#[derive(Debug, Clone)]
pub struct SortedIntervalList<I: IntervalBounds> {
    intervals: Vec<IntervalRef<I>>,
}

impl<I: IntervalBounds> SortedIntervalList<I> {
    pub fn build<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        let mut intervals: Vec<IntervalRef<I>> =
            intervals.into_iter().map(Into::into).collect();
        for interval in &intervals {
            interval.validate()?;
        }
        intervals.sort_by(|a, b| a.cmp_bounds(b));
        for pair in intervals.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(CollectionError::Overlapping);
            }
        }
        Ok(SortedIntervalList { intervals })
    }

    /// The contiguous run of members overlapping `query`.
    fn run(&self, query: &Interval<I::Endpoint>) -> (usize, usize) {
        let first = self
            .intervals
            .partition_point(|interval| interval.cmp_high_low(query) == Ordering::Less);
        let end = self
            .intervals
            .partition_point(|interval| interval.cmp_low_high(query) != Ordering::Greater);
        (first, end.max(first))
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for SortedIntervalList<I> {
    fn len(&self) -> usize {
        self.intervals.len()
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(self.intervals.iter().cloned())
    }

    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        let first = self.intervals.first().ok_or(CollectionError::Empty)?;
        let last = self.intervals.last().ok_or(CollectionError::Empty)?;
        Ok(first.join(last))
    }

    fn highest(&self) -> Result<IntervalRef<I>, CollectionError> {
        self.intervals
            .last()
            .cloned()
            .ok_or(CollectionError::Empty)
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        let (first, end) = self.run(query);
        Box::new(self.intervals[first..end].iter().cloned())
    }

    fn find_overlap_at(&self, point: &I::Endpoint) -> Option<IntervalRef<I>> {
        // disjointness leaves at most one candidate
        let slot = self
            .intervals
            .partition_point(|interval| match interval.high().cmp(point) {
                Ordering::Less => true,
                Ordering::Equal => !interval.high_included(),
                Ordering::Greater => false,
            });
        self.intervals
            .get(slot)
            .filter(|interval| interval.overlaps_point(point))
            .map(Arc::clone)
    }

    fn count_overlaps(&self, query: &Interval<I::Endpoint>) -> usize {
        let (first, end) = self.run(query);
        end - first
    }

    fn maximum_depth(&self) -> usize {
        usize::from(!self.intervals.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    type Iv = Interval<i32>;

    #[fixture]
    fn disjoint() -> Vec<Iv> {
        vec![
            Interval::closed(7, 9).unwrap(),
            Interval::closed(1, 2).unwrap(),
            Interval::closed(3, 4).unwrap(),
        ]
    }

    #[rstest]
    fn build_sorts_and_rejects_overlap(disjoint: Vec<Iv>) {
        let list = SortedIntervalList::build(disjoint.clone()).unwrap();
        assert_eq!(list.len(), 3);
        let lows: Vec<i32> = list.sorted().map(|iv| *iv.low()).collect();
        assert_eq!(lows, vec![1, 3, 7]);

        let mut overlapping = disjoint;
        overlapping.push(Interval::closed(8, 11).unwrap());
        assert_eq!(
            SortedIntervalList::build(overlapping).unwrap_err(),
            CollectionError::Overlapping
        );
    }

    #[rstest]
    fn queries_by_binary_search(disjoint: Vec<Iv>) {
        let list = SortedIntervalList::build(disjoint).unwrap();

        let hits: Vec<_> = list
            .find_overlaps(&Interval::closed(2, 8).unwrap())
            .collect();
        assert_eq!(hits.len(), 3);
        assert_eq!(list.count_overlaps(&Interval::closed(2, 8).unwrap()), 3);
        assert_eq!(list.count_overlaps(&Interval::closed(5, 6).unwrap()), 0);

        assert!(list.find_overlap_at(&3).is_some());
        assert!(list.find_overlap_at(&5).is_none());
        assert_eq!(*list.find_overlap_at(&9).unwrap().low(), 7);
    }

    #[rstest]
    fn span_and_gaps(disjoint: Vec<Iv>) {
        let list = SortedIntervalList::build(disjoint).unwrap();
        assert!(list.span().unwrap().same_bounds(&Interval::closed(1, 9).unwrap()));

        let gaps: Vec<_> = list.gaps().collect();
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0].same_bounds(&Interval::open(2, 3).unwrap()));
        assert!(gaps[1].same_bounds(&Interval::open(4, 7).unwrap()));
    }

    #[test]
    fn mutators_report_read_only() {
        let mut list: SortedIntervalList<Iv> = SortedIntervalList::build(Vec::<Iv>::new()).unwrap();
        assert!(list.is_read_only());
        assert_eq!(
            list.add(Arc::new(Interval::closed(0, 1).unwrap())).unwrap_err(),
            CollectionError::ReadOnly
        );
        assert_eq!(list.clear().unwrap_err(), CollectionError::ReadOnly);
        assert_eq!(list.choose().unwrap_err(), CollectionError::Empty);
    }
}
