use std::cmp::Ordering;
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{same_ref, Interval, IntervalBounds, IntervalRef};

use crate::avl::{self, AvlNode, Link};
use crate::traits::{BoxedIter, IntervalCollection};

const HEAD: usize = 0;
const TAIL: usize = 1;
const NIL: usize = usize::MAX;

/// A slot of the in-order doubly-linked list. Slots 0 and 1 are the head
/// and tail sentinels and never hold an interval.
#[derive(Debug)]
struct Cell<I> {
    interval: Option<IntervalRef<I>>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
struct FiniteNode<I: IntervalBounds> {
    interval: IntervalRef<I>,
    cell: usize,
    height: u8,
    left: Link<FiniteNode<I>>,
    right: Link<FiniteNode<I>>,
}

impl<I: IntervalBounds> FiniteNode<I> {
    fn new(interval: IntervalRef<I>, cell: usize) -> Self {
        FiniteNode {
            interval,
            cell,
            height: 1,
            left: None,
            right: None,
        }
    }
}

impl<I: IntervalBounds> AvlNode for FiniteNode<I> {
    fn left(&self) -> &Link<Self> {
        &self.left
    }

    fn right(&self) -> &Link<Self> {
        &self.right
    }

    fn left_mut(&mut self) -> &mut Link<Self> {
        &mut self.left
    }

    fn right_mut(&mut self) -> &mut Link<Self> {
        &mut self.right
    }

    fn height(&self) -> u8 {
        self.height
    }

    fn set_height(&mut self, height: u8) {
        self.height = height;
    }

    fn update(&mut self) {
        self.update_height();
    }
}

/// Dynamic tree over a pairwise disjoint interval set, with the members
/// threaded through a doubly-linked list in `cmp_bounds` order.
///
/// The AVL tree gives the O(log n) position lookups; the list gives O(1)
/// neighbor access at an insertion point and the forward walk that
/// [`FiniteIntervalTree::force_add`] resolves conflicts along. For an empty
/// collection the head sentinel links straight to the tail sentinel.
#[derive(Debug)]
pub struct FiniteIntervalTree<I: IntervalBounds> {
    root: Link<FiniteNode<I>>,
    cells: Vec<Cell<I>>,
    free: Vec<usize>,
    len: usize,
}

impl<I: IntervalBounds> Default for FiniteIntervalTree<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IntervalBounds> FiniteIntervalTree<I> {
    pub fn new() -> Self {
        FiniteIntervalTree {
            root: None,
            cells: vec![
                Cell {
                    interval: None,
                    prev: NIL,
                    next: TAIL,
                },
                Cell {
                    interval: None,
                    prev: HEAD,
                    next: NIL,
                },
            ],
            free: Vec::new(),
            len: 0,
        }
    }

    /// Build from a sequence; any rejected member (overlap or duplicate
    /// handle) fails the whole construction.
    pub fn build<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        let mut tree = Self::new();
        for interval in intervals {
            if !tree.add(interval.into())? {
                return Err(CollectionError::Overlapping);
            }
        }
        Ok(tree)
    }

    fn alloc_cell(
        cells: &mut Vec<Cell<I>>,
        free: &mut Vec<usize>,
        interval: &IntervalRef<I>,
        prev: usize,
        next: usize,
    ) -> usize {
        let id = match free.pop() {
            Some(id) => {
                cells[id] = Cell {
                    interval: Some(Arc::clone(interval)),
                    prev,
                    next,
                };
                id
            }
            None => {
                cells.push(Cell {
                    interval: Some(Arc::clone(interval)),
                    prev,
                    next,
                });
                cells.len() - 1
            }
        };
        cells[prev].next = id;
        cells[next].prev = id;
        id
    }

    fn unlink_cell(cells: &mut [Cell<I>], free: &mut Vec<usize>, id: usize) {
        let prev = cells[id].prev;
        let next = cells[id].next;
        cells[prev].next = next;
        cells[next].prev = prev;
        cells[id].interval = None;
        free.push(id);
    }

    fn cell_interval(&self, id: usize) -> &IntervalRef<I> {
        self.cells[id]
            .interval
            .as_ref()
            .expect("sentinels never enter a list walk")
    }

    /// Insert rejecting neighbor overlaps; `pred`/`succ` carry the nearest
    /// list cells on either side of the descent.
    fn insert_checked(
        link: &mut Link<FiniteNode<I>>,
        cells: &mut Vec<Cell<I>>,
        free: &mut Vec<usize>,
        interval: &IntervalRef<I>,
        pred: usize,
        succ: usize,
    ) -> bool {
        let Some(node) = link else {
            if pred != HEAD {
                let neighbor = cells[pred].interval.as_ref().expect("pred is not a sentinel");
                if neighbor.overlaps(interval) {
                    return false;
                }
            }
            if succ != TAIL {
                let neighbor = cells[succ].interval.as_ref().expect("succ is not a sentinel");
                if neighbor.overlaps(interval) {
                    return false;
                }
            }
            let cell = Self::alloc_cell(cells, free, interval, pred, succ);
            *link = Some(Box::new(FiniteNode::new(Arc::clone(interval), cell)));
            return true;
        };
        let added = match interval.cmp_bounds(&node.interval) {
            // equal bounds always overlap, same handle or not
            Ordering::Equal => false,
            Ordering::Less => {
                let succ = node.cell;
                Self::insert_checked(&mut node.left, cells, free, interval, pred, succ)
            }
            Ordering::Greater => {
                let pred = node.cell;
                Self::insert_checked(&mut node.right, cells, free, interval, pred, succ)
            }
        };
        if added {
            avl::rebalance_link(link);
        }
        added
    }

    /// Insert without any disjointness check; equal bounds tie to the
    /// right. Returns the new list cell.
    fn insert_forced(
        link: &mut Link<FiniteNode<I>>,
        cells: &mut Vec<Cell<I>>,
        free: &mut Vec<usize>,
        interval: &IntervalRef<I>,
        pred: usize,
        succ: usize,
    ) -> usize {
        let Some(node) = link else {
            let cell = Self::alloc_cell(cells, free, interval, pred, succ);
            *link = Some(Box::new(FiniteNode::new(Arc::clone(interval), cell)));
            return cell;
        };
        let cell = match interval.cmp_bounds(&node.interval) {
            Ordering::Less => {
                let succ = node.cell;
                Self::insert_forced(&mut node.left, cells, free, interval, pred, succ)
            }
            _ => {
                let pred = node.cell;
                Self::insert_forced(&mut node.right, cells, free, interval, pred, succ)
            }
        };
        avl::rebalance_link(link);
        cell
    }

    fn remove_node(
        link: &mut Link<FiniteNode<I>>,
        cells: &mut Vec<Cell<I>>,
        free: &mut Vec<usize>,
        interval: &IntervalRef<I>,
    ) -> bool {
        let Some(node) = link else {
            return false;
        };
        let removed = match interval.cmp_bounds(&node.interval) {
            Ordering::Less => Self::remove_node(&mut node.left, cells, free, interval),
            Ordering::Greater => Self::remove_node(&mut node.right, cells, free, interval),
            Ordering::Equal => {
                if !same_ref(&node.interval, interval) {
                    // forced inserts tie equal bounds to the right
                    Self::remove_node(&mut node.right, cells, free, interval)
                } else {
                    Self::unlink_cell(cells, free, node.cell);
                    let mut taken = link.take().expect("node was just matched");
                    *link = match (taken.left.take(), taken.right.take()) {
                        (None, right) => right,
                        (left, None) => left,
                        (Some(left), Some(right)) => {
                            let mut remainder = Some(right);
                            let mut successor = avl::detach_min(&mut remainder);
                            *successor.left_mut() = Some(left);
                            *successor.right_mut() = remainder;
                            Some(avl::rebalance(successor))
                        }
                    };
                    return true;
                }
            }
        };
        if removed {
            avl::rebalance_link(link);
        }
        removed
    }

    fn contains_ref(&self, interval: &IntervalRef<I>) -> bool {
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            match interval.cmp_bounds(&node.interval) {
                Ordering::Less => cursor = &node.left,
                Ordering::Greater => cursor = &node.right,
                Ordering::Equal => {
                    if same_ref(&node.interval, interval) {
                        return true;
                    }
                    cursor = &node.right;
                }
            }
        }
        false
    }

    /// Leftmost member whose high does not end before `query` starts.
    fn first_candidate(&self, query: &Interval<I::Endpoint>) -> usize {
        let mut found = TAIL;
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            if node.interval.cmp_high_low(query) == Ordering::Less {
                cursor = &node.right;
            } else {
                found = node.cell;
                cursor = &node.left;
            }
        }
        found
    }

    fn swap_with_prev(&mut self, cell: usize) {
        let prev = self.cells[cell].prev;
        let before = self.cells[prev].prev;
        let after = self.cells[cell].next;
        self.cells[before].next = cell;
        self.cells[cell].prev = before;
        self.cells[cell].next = prev;
        self.cells[prev].prev = cell;
        self.cells[prev].next = after;
        self.cells[after].prev = prev;
    }

    /// Insert unconditionally, then resolve conflicts forward along the
    /// list: every conflicting `(current, next)` pair is offered to
    /// `resolve`, which either orders the successor removed (`true`) or
    /// vouches that it has cleared the overlap itself (`false`).
    ///
    /// Equivalent to [`FiniteIntervalTree::force_add_with`] with a
    /// walk-to-the-end continuation and predecessor repositioning on.
    pub fn force_add<R, F>(&mut self, interval: R, resolve: F) -> Result<bool, CollectionError>
    where
        R: Into<IntervalRef<I>>,
        F: FnMut(&IntervalRef<I>, &IntervalRef<I>) -> bool,
    {
        self.force_add_with(interval, resolve, || true, true)
    }

    /// The fully parameterized forced insertion.
    ///
    /// `continue_when_no_conflict` is consulted at every non-conflicting
    /// pair and decides whether the walk keeps going; the walk always stops
    /// at the tail sentinel. With `force_position` the inserted member is
    /// first swapped in front of any list predecessor it overlaps, so the
    /// forward walk sees those conflicts too.
    pub fn force_add_with<R, F, C>(
        &mut self,
        interval: R,
        mut resolve: F,
        mut continue_when_no_conflict: C,
        force_position: bool,
    ) -> Result<bool, CollectionError>
    where
        R: Into<IntervalRef<I>>,
        F: FnMut(&IntervalRef<I>, &IntervalRef<I>) -> bool,
        C: FnMut() -> bool,
    {
        let interval = interval.into();
        interval.validate()?;
        if self.contains_ref(&interval) {
            return Ok(false);
        }
        let cell = Self::insert_forced(
            &mut self.root,
            &mut self.cells,
            &mut self.free,
            &interval,
            HEAD,
            TAIL,
        );
        self.len += 1;

        if force_position {
            loop {
                let prev = self.cells[cell].prev;
                if prev == HEAD || !self.cell_interval(prev).overlaps(&interval) {
                    break;
                }
                self.swap_with_prev(cell);
            }
        }

        let mut cursor = cell;
        loop {
            let next = self.cells[cursor].next;
            if next == TAIL {
                break;
            }
            let current_iv = Arc::clone(self.cell_interval(cursor));
            let next_iv = Arc::clone(self.cell_interval(next));
            let conflict = current_iv.overlaps(&next_iv);
            if !conflict && !continue_when_no_conflict() {
                break;
            }
            if resolve(&current_iv, &next_iv) {
                let removed =
                    Self::remove_node(&mut self.root, &mut self.cells, &mut self.free, &next_iv);
                assert!(removed, "conflict walk lost track of the successor");
                self.len -= 1;
            } else {
                if conflict {
                    assert!(
                        !current_iv.overlaps(&next_iv),
                        "conflict resolver must clear the overlap it declines to resolve"
                    );
                }
                cursor = next;
            }
        }
        Ok(true)
    }
}

/// Forward walk over the linked list.
pub struct ListIter<'a, I: IntervalBounds> {
    cells: &'a [Cell<I>],
    cursor: usize,
}

impl<'a, I: IntervalBounds> Iterator for ListIter<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let cell = &self.cells[self.cursor];
        self.cursor = cell.next;
        cell.interval.as_ref().map(Arc::clone)
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for FiniteIntervalTree<I> {
    fn len(&self) -> usize {
        self.len
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(ListIter {
            cells: &self.cells,
            cursor: self.cells[HEAD].next,
        })
    }

    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        if self.len == 0 {
            return Err(CollectionError::Empty);
        }
        let first = self.cell_interval(self.cells[HEAD].next);
        let last = self.cell_interval(self.cells[TAIL].prev);
        Ok(first.join(last))
    }

    fn lowest(&self) -> Result<IntervalRef<I>, CollectionError> {
        if self.len == 0 {
            return Err(CollectionError::Empty);
        }
        Ok(Arc::clone(self.cell_interval(self.cells[HEAD].next)))
    }

    fn highest(&self) -> Result<IntervalRef<I>, CollectionError> {
        if self.len == 0 {
            return Err(CollectionError::Empty);
        }
        Ok(Arc::clone(self.cell_interval(self.cells[TAIL].prev)))
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        let start = self.first_candidate(query);
        let query = query.clone();
        Box::new(
            ListIter {
                cells: &self.cells,
                cursor: start,
            }
            .take_while(move |interval| interval.cmp_low_high(&query) != Ordering::Greater),
        )
    }

    fn find_overlap_at(&self, point: &I::Endpoint) -> Option<IntervalRef<I>> {
        // at most one member can contain the point
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            if node.interval.overlaps_point(point) {
                return Some(Arc::clone(&node.interval));
            }
            let before_member = match point.cmp(node.interval.low()) {
                Ordering::Less => true,
                Ordering::Equal => !node.interval.low_included(),
                Ordering::Greater => false,
            };
            cursor = if before_member { &node.left } else { &node.right };
        }
        None
    }

    fn maximum_depth(&self) -> usize {
        usize::from(self.len > 0)
    }

    fn add(&mut self, interval: IntervalRef<I>) -> Result<bool, CollectionError> {
        interval.validate()?;
        let added = Self::insert_checked(
            &mut self.root,
            &mut self.cells,
            &mut self.free,
            &interval,
            HEAD,
            TAIL,
        );
        if added {
            self.len += 1;
        }
        Ok(added)
    }

    fn remove(&mut self, interval: &IntervalRef<I>) -> Result<bool, CollectionError> {
        let removed = Self::remove_node(&mut self.root, &mut self.cells, &mut self.free, interval);
        if removed {
            self.len -= 1;
        }
        Ok(removed)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        *self = Self::new();
        Ok(())
    }
}
