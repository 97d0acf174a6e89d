use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{Interval, IntervalBounds, IntervalRef};
use stabrs_core::utils;

use crate::traits::{BoxedIter, IntervalCollection};

/// Static Nested Containment List.
///
/// The strict-containment forest of the input is materialized: every list
/// (the top-level one and each interval's sublist of strictly contained
/// children) is stored as one contiguous slice of a single flat vector.
/// Within a list no interval strictly contains another, so lows and highs
/// both ascend and an overlap run is a pair of binary searches; queries
/// drain runs through a heap keyed on `cmp_bounds`, so results come out
/// sorted.
#[derive(Debug, Clone)]
pub struct NestedList<I: IntervalBounds> {
    intervals: Vec<IntervalRef<I>>,
    /// Sublist slice of the element at the same index; `(0, 0)` when none.
    children: Vec<(usize, usize)>,
    /// The top-level list occupies `0..top`.
    top: usize,
}

impl<I: IntervalBounds> NestedList<I> {
    pub fn build<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        let mut sorted: Vec<IntervalRef<I>> = intervals.into_iter().map(Into::into).collect();
        for interval in &sorted {
            interval.validate()?;
        }
        sorted.sort_by(|a, b| a.cmp_bounds(b));

        // innermost strict container of each interval, by a stack pass
        let mut roots = Vec::new();
        let mut child_lists: Vec<Vec<usize>> = vec![Vec::new(); sorted.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (index, interval) in sorted.iter().enumerate() {
            while let Some(&parent) = stack.last() {
                if sorted[parent].strictly_contains(interval) {
                    break;
                }
                stack.pop();
            }
            match stack.last() {
                Some(&parent) => child_lists[parent].push(index),
                None => roots.push(index),
            }
            stack.push(index);
        }

        // flatten list-major: every list becomes one contiguous slice
        let top = roots.len();
        let mut intervals_out = Vec::with_capacity(sorted.len());
        let mut children = vec![(0, 0); sorted.len()];
        let mut queue: VecDeque<(Option<usize>, Vec<usize>)> = VecDeque::new();
        queue.push_back((None, roots));
        while let Some((owner, list)) = queue.pop_front() {
            let start = intervals_out.len();
            for index in list {
                let position = intervals_out.len();
                intervals_out.push(Arc::clone(&sorted[index]));
                if !child_lists[index].is_empty() {
                    queue.push_back((Some(position), std::mem::take(&mut child_lists[index])));
                }
            }
            if let Some(owner) = owner {
                children[owner] = (start, intervals_out.len());
            }
        }

        Ok(NestedList {
            intervals: intervals_out,
            children,
            top,
        })
    }

    /// The overlap run inside the list slice `[from, to)`; the whole slice
    /// when there is no query.
    fn run_in(
        &self,
        from: usize,
        to: usize,
        query: Option<&Interval<I::Endpoint>>,
    ) -> (usize, usize) {
        let Some(query) = query else {
            return (from, to);
        };
        let slice = &self.intervals[from..to];
        let first = from
            + slice.partition_point(|interval| interval.cmp_high_low(query) == Ordering::Less);
        let end = from
            + slice.partition_point(|interval| interval.cmp_low_high(query) != Ordering::Greater);
        (first, end.max(first))
    }
}

struct HeapRun<I: IntervalBounds> {
    head: IntervalRef<I>,
    pos: usize,
    end: usize,
}

impl<I: IntervalBounds> PartialEq for HeapRun<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: IntervalBounds> Eq for HeapRun<I> {}

impl<I: IntervalBounds> PartialOrd for HeapRun<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: IntervalBounds> Ord for HeapRun<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the lowest head first
        self.head.cmp_bounds(&other.head).reverse()
    }
}

/// Drains overlap runs in `cmp_bounds` order, discovering an element's
/// sublist run when the element itself is yielded.
pub struct NestedIter<'a, I: IntervalBounds> {
    list: &'a NestedList<I>,
    query: Option<Interval<I::Endpoint>>,
    heap: BinaryHeap<HeapRun<I>>,
}

impl<'a, I: IntervalBounds> NestedIter<'a, I> {
    fn new(list: &'a NestedList<I>, query: Option<Interval<I::Endpoint>>) -> Self {
        let mut iter = NestedIter {
            list,
            query,
            heap: BinaryHeap::new(),
        };
        iter.push_run(0, list.top);
        iter
    }

    fn push_run(&mut self, from: usize, to: usize) {
        let (pos, end) = self.list.run_in(from, to, self.query.as_ref());
        if pos < end {
            self.heap.push(HeapRun {
                head: Arc::clone(&self.list.intervals[pos]),
                pos,
                end,
            });
        }
    }
}

impl<'a, I: IntervalBounds> Iterator for NestedIter<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.heap.pop()?;
        let (sub_from, sub_to) = self.list.children[run.pos];
        if sub_from < sub_to {
            self.push_run(sub_from, sub_to);
        }
        if run.pos + 1 < run.end {
            self.heap.push(HeapRun {
                head: Arc::clone(&self.list.intervals[run.pos + 1]),
                pos: run.pos + 1,
                end: run.end,
            });
        }
        Some(run.head)
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for NestedList<I> {
    fn len(&self) -> usize {
        self.intervals.len()
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(NestedIter::new(self, None))
    }

    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        if self.top == 0 {
            return Err(CollectionError::Empty);
        }
        Ok(self.intervals[0].join(&self.intervals[self.top - 1]))
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(NestedIter::new(self, Some(query.clone())))
    }

    fn count_overlaps(&self, query: &Interval<I::Endpoint>) -> usize {
        // runs are counted whole; no need to order them
        let mut count = 0;
        let mut pending = vec![self.run_in(0, self.top, Some(query))];
        while let Some((from, to)) = pending.pop() {
            count += to - from;
            for index in from..to {
                let (sub_from, sub_to) = self.children[index];
                if sub_from < sub_to {
                    pending.push(self.run_in(sub_from, sub_to, Some(query)));
                }
            }
        }
        count
    }

    fn find_gaps<'a>(&'a self, query: &Interval<I::Endpoint>) -> BoxedIter<'a, Interval<I::Endpoint>>
    where
        I: 'a,
    {
        Box::new(utils::gaps_within(query, self.find_overlaps(query)))
    }
}
