//! Cross-cutting interval sweeps shared by the index structures: maximum
//! depth, gap enumeration and collapse partitioning. Everything here works
//! on streams already sorted by [`IntervalBounds::cmp_bounds`], which is the
//! order every collection's `sorted` enumeration guarantees.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::models::endpoint::Endpoint;
use crate::models::interval::{Interval, IntervalBounds};
use crate::models::refs::IntervalRef;

/// The largest number of intervals stacked over any single point, computed
/// by a sweep with a min-heap keyed on high endpoints.
///
/// `sorted` must be ordered by low endpoint ([`IntervalBounds::cmp_lows`]);
/// the canonical `cmp_bounds` order qualifies.
pub fn maximum_depth<B, It>(sorted: It) -> usize
where
    B: IntervalBounds,
    It: IntoIterator<Item = B>,
{
    let mut ends: BinaryHeap<Reverse<Endpoint<B::Endpoint>>> = BinaryHeap::new();
    let mut deepest = 0;
    for interval in sorted {
        let low_cut = Endpoint::low_cut(&interval);
        while let Some(Reverse(top)) = ends.peek() {
            if *top <= low_cut {
                ends.pop();
            } else {
                break;
            }
        }
        ends.push(Reverse(Endpoint::high_cut(&interval)));
        deepest = deepest.max(ends.len());
    }
    deepest
}

/// Lazily yields the uncovered stretches between intervals of a
/// `cmp_bounds`-sorted stream. Inclusion flags of a gap are inverted from
/// the flanking endpoints; degenerate gaps (a point absorbed by an included
/// flank) are skipped.
pub struct Gaps<B: IntervalBounds, It> {
    inner: It,
    frontier: Option<B>,
}

pub fn gaps<B, It>(sorted: It) -> Gaps<B, It::IntoIter>
where
    B: IntervalBounds,
    It: IntoIterator<Item = B>,
{
    Gaps {
        inner: sorted.into_iter(),
        frontier: None,
    }
}

impl<B, It> Iterator for Gaps<B, It>
where
    B: IntervalBounds,
    It: Iterator<Item = B>,
{
    type Item = Interval<B::Endpoint>;

    fn next(&mut self) -> Option<Self::Item> {
        for next in self.inner.by_ref() {
            match &mut self.frontier {
                None => self.frontier = Some(next),
                Some(frontier) => {
                    let gap = frontier.gap_between(&next);
                    if frontier.cmp_highs(&next) == Ordering::Less {
                        *frontier = next;
                    }
                    if gap.is_some() {
                        return gap;
                    }
                }
            }
        }
        None
    }
}

/// The complement of a covered query interval: every stretch of `query` not
/// covered by the (sorted, query-overlapping) input stream, leading and
/// trailing stretches included.
pub struct GapsWithin<B: IntervalBounds, It> {
    inner: It,
    /// Coverage reached so far, as a cut position.
    reached: Endpoint<B::Endpoint>,
    query_high: B::Endpoint,
    query_high_included: bool,
    done: bool,
}

pub fn gaps_within<B, Q, It>(query: &Q, sorted_overlapping: It) -> GapsWithin<B, It::IntoIter>
where
    B: IntervalBounds,
    Q: IntervalBounds<Endpoint = B::Endpoint> + ?Sized,
    It: IntoIterator<Item = B>,
{
    GapsWithin {
        inner: sorted_overlapping.into_iter(),
        reached: Endpoint {
            value: query.low().clone(),
            after: !query.low_included(),
        },
        query_high: query.high().clone(),
        query_high_included: query.high_included(),
        done: false,
    }
}

impl<B, It> Iterator for GapsWithin<B, It>
where
    B: IntervalBounds,
    It: Iterator<Item = B>,
{
    type Item = Interval<B::Endpoint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for interval in self.inner.by_ref() {
            let gap = Interval::new(
                self.reached.value.clone(),
                interval.low().clone(),
                !self.reached.after,
                !interval.low_included(),
            )
            .ok();
            let end = Endpoint::high_cut(&interval);
            if self.reached < end {
                self.reached = end;
            }
            if gap.is_some() {
                return gap;
            }
        }
        self.done = true;
        Interval::new(
            self.reached.value.clone(),
            self.query_high.clone(),
            !self.reached.after,
            self.query_high_included,
        )
        .ok()
    }
}

/// Partition of the covered domain into elementary segments, each paired
/// with the intervals covering it. Uncovered stretches are skipped.
///
/// Construction sorts the cut points; segments are produced lazily. The
/// covering sets are emitted in `cmp_bounds` order.
pub struct Collapse<I: IntervalBounds> {
    cuts: Vec<Endpoint<I::Endpoint>>,
    /// Intervals ordered by low cut, pending admission to the active set.
    pending: Vec<IntervalRef<I>>,
    cut_index: usize,
    pending_index: usize,
    active: Vec<IntervalRef<I>>,
}

pub fn collapse<I, It>(sorted: It) -> Collapse<I>
where
    I: IntervalBounds,
    It: IntoIterator<Item = IntervalRef<I>>,
{
    let pending: Vec<IntervalRef<I>> = sorted.into_iter().collect();
    let mut cuts = Vec::with_capacity(pending.len() * 2);
    for interval in &pending {
        cuts.push(Endpoint::low_cut(interval.as_ref()));
        cuts.push(Endpoint::high_cut(interval.as_ref()));
    }
    cuts.sort();
    cuts.dedup();
    Collapse {
        cuts,
        pending,
        cut_index: 0,
        pending_index: 0,
        active: Vec::new(),
    }
}

impl<I: IntervalBounds> Iterator for Collapse<I> {
    type Item = (Interval<I::Endpoint>, Vec<IntervalRef<I>>);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cut_index + 1 < self.cuts.len() {
            let from = self.cuts[self.cut_index].clone();
            let to = &self.cuts[self.cut_index + 1];
            self.cut_index += 1;

            while self.pending_index < self.pending.len()
                && Endpoint::low_cut(self.pending[self.pending_index].as_ref()) <= from
            {
                self.active.push(Arc::clone(&self.pending[self.pending_index]));
                self.pending_index += 1;
            }
            self.active
                .retain(|interval| Endpoint::high_cut(interval.as_ref()) > from);

            if self.active.is_empty() {
                continue;
            }
            let segment =
                Interval::unchecked(from.value, to.value.clone(), !from.after, to.after);
            let mut covering = self.active.clone();
            covering.sort_by(|a, b| a.cmp_bounds(b));
            return Some((segment, covering));
        }
        None
    }
}
