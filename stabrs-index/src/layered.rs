use std::cmp::Ordering;
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{Interval, IntervalBounds, IntervalRef};
use stabrs_core::utils;

use crate::traits::{BoxedIter, IntervalCollection};

/// An entry of one layer: the interval plus the index in the next layer at
/// which its strictly contained children start. The entry appended after it
/// closes the range.
#[derive(Debug, Clone)]
struct Entry<I: IntervalBounds> {
    interval: IntervalRef<I>,
    next_from: usize,
}

/// One contiguous slice of a layer still being drained by a query.
#[derive(Debug, Clone, Copy)]
struct Run {
    depth: usize,
    pos: usize,
    end: usize,
}

/// Static Layered Containment List.
///
/// Intervals sorted by `cmp_bounds` are partitioned into layers: each
/// interval lands in the shallowest layer whose last interval does not
/// strictly contain it. Within a layer both lows and highs ascend, so one
/// binary search pair per layer finds the contiguous run overlapping a
/// query, and the `next_from` pointers of the run boundaries bound the run
/// one layer deeper. Queries merge the runs and therefore yield overlaps in
/// `cmp_bounds` order.
///
/// With `galloping` enabled each in-range binary search is preceded by an
/// exponential probe from the range start; useful when runs sit close to
/// the range start, and only ever a constant-factor change.
#[derive(Debug, Clone)]
pub struct LayeredList<I: IntervalBounds> {
    layers: Vec<Vec<Entry<I>>>,
    galloping: bool,
    len: usize,
}

impl<I: IntervalBounds> LayeredList<I> {
    pub fn build<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        Self::build_inner(intervals, false)
    }

    /// Build with galloping run searches.
    pub fn build_galloping<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        Self::build_inner(intervals, true)
    }

    fn build_inner<It, R>(intervals: It, galloping: bool) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        let mut sorted: Vec<IntervalRef<I>> = intervals.into_iter().map(Into::into).collect();
        for interval in &sorted {
            interval.validate()?;
        }
        sorted.sort_by(|a, b| a.cmp_bounds(b));

        let len = sorted.len();
        let mut layers: Vec<Vec<Entry<I>>> = Vec::new();
        for interval in sorted {
            // shallowest layer whose frontier does not strictly contain the
            // interval; the frontier highs descend with depth, so the
            // predicate is monotone over the layers
            let mut lo = 0;
            let mut hi = layers.len();
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let frontier = &layers[mid]
                    .last()
                    .expect("layers never stay empty")
                    .interval;
                if frontier.strictly_contains(&interval) {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            if lo == layers.len() {
                layers.push(Vec::new());
            }
            let next_from = layers.get(lo + 1).map_or(0, Vec::len);
            layers[lo].push(Entry {
                interval,
                next_from,
            });
        }
        Ok(LayeredList {
            layers,
            galloping,
            len,
        })
    }

    pub fn is_galloping(&self) -> bool {
        self.galloping
    }

    /// First index in `[lo, hi)` of `layer` where `still_before` flips to
    /// false; optionally entered by exponential probing.
    fn lower_bound<F>(&self, layer: &[Entry<I>], mut lo: usize, mut hi: usize, still_before: F) -> usize
    where
        F: Fn(&Entry<I>) -> bool,
    {
        if self.galloping && lo < hi {
            let mut prev = lo;
            let mut cursor = lo;
            let mut step = 1;
            while cursor < hi && still_before(&layer[cursor]) {
                prev = cursor + 1;
                cursor += step;
                step <<= 1;
            }
            lo = prev;
            hi = hi.min(cursor + 1).max(lo);
        }
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if still_before(&layer[mid]) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// One overlap run per layer, top down. Stops at the first layer with
    /// an empty run, which cannot have children below it.
    fn overlap_runs(&self, query: &Interval<I::Endpoint>) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut from = 0;
        let mut to = self.layers.first().map_or(0, Vec::len);
        for (depth, layer) in self.layers.iter().enumerate() {
            if from >= to {
                break;
            }
            let first = self.lower_bound(layer, from, to, |entry| {
                entry.interval.cmp_high_low(query) == Ordering::Less
            });
            let end = self.lower_bound(layer, first, to, |entry| {
                entry.interval.cmp_low_high(query) != Ordering::Greater
            });
            if first >= end {
                break;
            }
            from = layer[first].next_from;
            to = if end < layer.len() {
                layer[end].next_from
            } else {
                self.layers.get(depth + 1).map_or(0, Vec::len)
            };
            runs.push(Run {
                depth,
                pos: first,
                end,
            });
        }
        runs
    }

    fn full_runs(&self) -> Vec<Run> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| !layer.is_empty())
            .map(|(depth, layer)| Run {
                depth,
                pos: 0,
                end: layer.len(),
            })
            .collect()
    }
}

/// Merges per-layer runs in `cmp_bounds` order.
pub struct LayeredIter<'a, I: IntervalBounds> {
    layers: &'a [Vec<Entry<I>>],
    runs: Vec<Run>,
}

impl<'a, I: IntervalBounds> Iterator for LayeredIter<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut best: Option<usize> = None;
        for (index, run) in self.runs.iter().enumerate() {
            let head = &self.layers[run.depth][run.pos].interval;
            match best {
                Some(current)
                    if head
                        .cmp_bounds(&self.layers[self.runs[current].depth][self.runs[current].pos].interval)
                        != Ordering::Less => {}
                _ => best = Some(index),
            }
        }
        let best = best?;
        let run = &mut self.runs[best];
        let head = Arc::clone(&self.layers[run.depth][run.pos].interval);
        run.pos += 1;
        if run.pos == run.end {
            self.runs.remove(best);
        }
        Some(head)
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for LayeredList<I> {
    fn len(&self) -> usize {
        self.len
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(LayeredIter {
            layers: &self.layers,
            runs: self.full_runs(),
        })
    }

    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        // the top layer holds both the lowest low and the highest high
        let top = self.layers.first().ok_or(CollectionError::Empty)?;
        let first = top.first().ok_or(CollectionError::Empty)?;
        let last = top.last().ok_or(CollectionError::Empty)?;
        Ok(first.interval.join(&last.interval))
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(LayeredIter {
            layers: &self.layers,
            runs: self.overlap_runs(query),
        })
    }

    fn count_overlaps(&self, query: &Interval<I::Endpoint>) -> usize {
        self.overlap_runs(query)
            .iter()
            .map(|run| run.end - run.pos)
            .sum()
    }

    fn find_gaps<'a>(&'a self, query: &Interval<I::Endpoint>) -> BoxedIter<'a, Interval<I::Endpoint>>
    where
        I: 'a,
    {
        // overlaps are already sorted here
        Box::new(utils::gaps_within(query, self.find_overlaps(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    type Iv = Interval<i32>;

    fn closed(low: i32, high: i32) -> Iv {
        Interval::closed(low, high).unwrap()
    }

    // a three-layer containment chain, at 10x scale so 6.5 becomes 65
    #[fixture]
    fn nested() -> Vec<Iv> {
        vec![
            closed(0, 100),
            closed(10, 20),
            closed(30, 40),
            closed(50, 90),
            closed(60, 70),
        ]
    }

    #[rstest]
    fn layers_follow_strict_containment(nested: Vec<Iv>) {
        let list = LayeredList::build(nested).unwrap();
        let shape: Vec<Vec<i32>> = list
            .layers
            .iter()
            .map(|layer| layer.iter().map(|e| *e.interval.low()).collect())
            .collect();
        assert_eq!(shape, vec![vec![0], vec![10, 30, 50], vec![60]]);

        // every deeper interval is strictly contained in something above,
        // and the layer-last highs descend
        for depth in 1..list.layers.len() {
            for entry in &list.layers[depth] {
                assert!(list.layers[depth - 1]
                    .iter()
                    .any(|above| above.interval.strictly_contains(&entry.interval)));
            }
            let above_last = &list.layers[depth - 1].last().unwrap().interval;
            let last = &list.layers[depth].last().unwrap().interval;
            assert_eq!(last.cmp_highs(above_last), Ordering::Less);
        }
    }

    #[rstest]
    fn stabbing_yields_sorted_overlaps(nested: Vec<Iv>) {
        let list = LayeredList::build(nested).unwrap();
        let hits: Vec<i32> = list.find_overlaps_at(&65).map(|iv| *iv.low()).collect();
        assert_eq!(hits, vec![0, 50, 60]);
        assert_eq!(list.count_overlaps_at(&35), 2);
    }

    #[rstest]
    fn interval_queries(nested: Vec<Iv>) {
        let list = LayeredList::build(nested).unwrap();
        let hits: Vec<i32> = list
            .find_overlaps(&closed(15, 35))
            .map(|iv| *iv.low())
            .collect();
        assert_eq!(hits, vec![0, 10, 30]);
        assert_eq!(list.count_overlaps(&closed(15, 35)), 3);
        assert_eq!(list.count_overlaps(&closed(101, 110)), 0);
    }

    #[rstest]
    fn sorted_matches_input_order(nested: Vec<Iv>) {
        let mut expected = nested.clone();
        expected.sort_by(|a, b| a.cmp_bounds(b));
        let list = LayeredList::build(nested).unwrap();
        let enumerated: Vec<i32> = list.sorted().map(|iv| *iv.low()).collect();
        let expected: Vec<i32> = expected.iter().map(|iv| *iv.low()).collect();
        assert_eq!(enumerated, expected);
        assert!(list.span().unwrap().same_bounds(&closed(0, 100)));
    }

    #[test]
    fn galloping_changes_nothing_but_constants() {
        use rand::Rng;

        let mut rng = rand::rng();
        let intervals: Vec<Iv> = (0..200)
            .map(|_| {
                let low = rng.random_range(0..500);
                closed(low, low + rng.random_range(1..80))
            })
            .collect();

        let plain = LayeredList::build(intervals.clone()).unwrap();
        let galloping = LayeredList::build_galloping(intervals).unwrap();
        assert!(galloping.is_galloping());

        for _ in 0..100 {
            let low = rng.random_range(0..500);
            let query = closed(low, low + rng.random_range(1..120));
            let a: Vec<i32> = plain.find_overlaps(&query).map(|iv| *iv.low()).collect();
            let b: Vec<i32> = galloping.find_overlaps(&query).map(|iv| *iv.low()).collect();
            assert_eq!(a, b);
            assert_eq!(plain.count_overlaps(&query), b.len());
        }
    }

    #[test]
    fn maximum_depth_uses_the_sweep() {
        let list = LayeredList::build(vec![
            closed(0, 10),
            closed(2, 8),
            closed(4, 6),
            closed(20, 30),
        ])
        .unwrap();
        assert_eq!(list.maximum_depth(), 3);
    }
}
