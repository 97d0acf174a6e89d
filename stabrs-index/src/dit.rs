use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{same_ref, Interval, IntervalBounds, IntervalRef};

use crate::avl::{self, AvlNode, Link};
use crate::traits::{BoxedIter, IntervalCollection};

struct DitNode<I: IntervalBounds> {
    /// A low endpoint value; pure high-endpoint markers keep empty lists.
    key: I::Endpoint,
    /// Members starting here with the low included, sorted by `cmp_highs`
    /// descending. Reference-equal duplicates sit in adjacent slots.
    included: Vec<IntervalRef<I>>,
    /// Same, for members with the low excluded.
    excluded: Vec<IntervalRef<I>>,
    /// Smallest interval covering every member starting here.
    local_span: Option<Interval<I::Endpoint>>,
    /// Smallest interval covering the local span and both child spans.
    span: Option<Interval<I::Endpoint>>,
    /// Members whose high endpoint equals this key.
    high_anchors: usize,
    delta_at: i32,
    delta_after: i32,
    sum: i32,
    max: i32,
    height: u8,
    left: Link<DitNode<I>>,
    right: Link<DitNode<I>>,
}

impl<I: IntervalBounds> DitNode<I> {
    fn new(key: I::Endpoint) -> Self {
        DitNode {
            key,
            included: Vec::new(),
            excluded: Vec::new(),
            local_span: None,
            span: None,
            high_anchors: 0,
            delta_at: 0,
            delta_after: 0,
            sum: 0,
            max: 0,
            height: 1,
            left: None,
            right: None,
        }
    }

    fn insert_sorted(list: &mut Vec<IntervalRef<I>>, interval: &IntervalRef<I>) {
        let at = list.partition_point(|member| member.cmp_highs(interval) == Ordering::Greater);
        list.insert(at, Arc::clone(interval));
    }

    fn remove_one(list: &mut Vec<IntervalRef<I>>, interval: &IntervalRef<I>) -> bool {
        match list.iter().position(|member| same_ref(member, interval)) {
            Some(at) => {
                list.remove(at);
                true
            }
            None => false,
        }
    }

    fn refresh_local_span(&mut self) {
        self.local_span = match (self.included.first(), self.excluded.first()) {
            (None, None) => None,
            (Some(widest), None) | (None, Some(widest)) => Some(widest.join(widest)),
            (Some(a), Some(b)) => Some(a.join(b)),
        };
    }

    fn anchor_low(&mut self, interval: &IntervalRef<I>) {
        if interval.low_included() {
            Self::insert_sorted(&mut self.included, interval);
            self.delta_at += 1;
        } else {
            Self::insert_sorted(&mut self.excluded, interval);
            self.delta_after += 1;
        }
        self.refresh_local_span();
    }

    fn unanchor_low(&mut self, interval: &IntervalRef<I>) {
        if interval.low_included() {
            if Self::remove_one(&mut self.included, interval) {
                self.delta_at -= 1;
            }
        } else if Self::remove_one(&mut self.excluded, interval) {
            self.delta_after -= 1;
        }
        self.refresh_local_span();
    }

    fn anchor_high(&mut self, interval: &IntervalRef<I>) {
        self.high_anchors += 1;
        if interval.high_included() {
            self.delta_after -= 1;
        } else {
            self.delta_at -= 1;
        }
    }

    fn unanchor_high(&mut self, interval: &IntervalRef<I>) {
        self.high_anchors -= 1;
        if interval.high_included() {
            self.delta_after += 1;
        } else {
            self.delta_at += 1;
        }
    }

    fn is_unused(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty() && self.high_anchors == 0
    }
}

fn sum_max<I: IntervalBounds>(link: &Link<DitNode<I>>) -> (i32, i32) {
    link.as_ref().map_or((0, 0), |node| (node.sum, node.max))
}

impl<I: IntervalBounds> AvlNode for DitNode<I> {
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
        let (left_sum, left_max) = sum_max(&self.left);
        let (right_sum, right_max) = sum_max(&self.right);
        self.sum = left_sum + self.delta_at + self.delta_after + right_sum;
        let at = left_sum + self.delta_at;
        let after = at + self.delta_after;
        self.max = left_max.max(at).max(after).max(after + right_max);

        let mut span = self.local_span.clone();
        for child in [&self.left, &self.right] {
            if let Some(child_span) = child.as_ref().and_then(|node| node.span.as_ref()) {
                span = Some(match span {
                    Some(current) => current.join(child_span),
                    None => child_span.clone(),
                });
            }
        }
        self.span = span;
    }
}

/// Dynamic Interval Tree: an AVL tree keyed on low endpoint values, with
/// per-node and per-subtree spans for pruning and the same depth
/// augmentation as the endpoint-keyed tree.
///
/// Nodes persist while any member starts at their key or ends there (high
/// markers carry the ending depth deltas). Reference-equal duplicates are
/// accepted only when the tree is built with
/// [`DynamicIntervalTree::allowing_reference_duplicates`]; `remove` always
/// drops a single copy. Query results carry no order guarantee.
pub struct DynamicIntervalTree<I: IntervalBounds> {
    root: Link<DitNode<I>>,
    len: usize,
    allow_duplicates: bool,
}

impl<I: IntervalBounds> Default for DynamicIntervalTree<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> fmt::Debug for DynamicIntervalTree<I>
where
    I: IntervalBounds,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicIntervalTree")
            .field("len", &self.len)
            .field("allow_duplicates", &self.allow_duplicates)
            .finish_non_exhaustive()
    }
}

impl<I: IntervalBounds> DynamicIntervalTree<I> {
    pub fn new() -> Self {
        DynamicIntervalTree {
            root: None,
            len: 0,
            allow_duplicates: false,
        }
    }

    /// A tree that stores every copy of a reference-equal handle.
    pub fn allowing_reference_duplicates() -> Self {
        DynamicIntervalTree {
            allow_duplicates: true,
            ..Self::new()
        }
    }

    pub fn build<It, R>(intervals: It) -> Result<Self, CollectionError>
    where
        It: IntoIterator<Item = R>,
        R: Into<IntervalRef<I>>,
    {
        let mut tree = Self::new();
        for interval in intervals {
            tree.add(interval.into())?;
        }
        Ok(tree)
    }

    fn contains_ref(&self, interval: &IntervalRef<I>) -> bool {
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            match interval.low().cmp(&node.key) {
                Ordering::Less => cursor = &node.left,
                Ordering::Greater => cursor = &node.right,
                Ordering::Equal => {
                    let list = if interval.low_included() {
                        &node.included
                    } else {
                        &node.excluded
                    };
                    return list.iter().any(|member| same_ref(member, interval));
                }
            }
        }
        false
    }

    fn add_low(link: &mut Link<DitNode<I>>, interval: &IntervalRef<I>) {
        let Some(node) = link else {
            let mut node = DitNode::new(interval.low().clone());
            node.anchor_low(interval);
            node.update();
            *link = Some(Box::new(node));
            return;
        };
        match interval.low().cmp(&node.key) {
            Ordering::Less => Self::add_low(&mut node.left, interval),
            Ordering::Greater => Self::add_low(&mut node.right, interval),
            Ordering::Equal => node.anchor_low(interval),
        }
        avl::rebalance_link(link);
    }

    fn add_high(link: &mut Link<DitNode<I>>, interval: &IntervalRef<I>) {
        let Some(node) = link else {
            let mut node = DitNode::new(interval.high().clone());
            node.anchor_high(interval);
            node.update();
            *link = Some(Box::new(node));
            return;
        };
        match interval.high().cmp(&node.key) {
            Ordering::Less => Self::add_high(&mut node.left, interval),
            Ordering::Greater => Self::add_high(&mut node.right, interval),
            Ordering::Equal => node.anchor_high(interval),
        }
        avl::rebalance_link(link);
    }

    /// Replace the node under `link` by its children, moving the in-order
    /// successor up when both are present.
    fn splice(link: &mut Link<DitNode<I>>) {
        let mut taken = link.take().expect("splice on an empty link");
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
    }

    fn remove_low(link: &mut Link<DitNode<I>>, interval: &IntervalRef<I>) {
        let Some(node) = link else {
            return;
        };
        match interval.low().cmp(&node.key) {
            Ordering::Less => Self::remove_low(&mut node.left, interval),
            Ordering::Greater => Self::remove_low(&mut node.right, interval),
            Ordering::Equal => {
                node.unanchor_low(interval);
                if node.is_unused() {
                    Self::splice(link);
                    return;
                }
            }
        }
        avl::rebalance_link(link);
    }

    fn remove_high(link: &mut Link<DitNode<I>>, interval: &IntervalRef<I>) {
        let Some(node) = link else {
            return;
        };
        match interval.high().cmp(&node.key) {
            Ordering::Less => Self::remove_high(&mut node.left, interval),
            Ordering::Greater => Self::remove_high(&mut node.right, interval),
            Ordering::Equal => {
                node.unanchor_high(interval);
                if node.is_unused() {
                    Self::splice(link);
                    return;
                }
            }
        }
        avl::rebalance_link(link);
    }
}

fn low_fits<E: Ord + Clone>(key: &E, included: bool, query: &Interval<E>) -> bool {
    match key.cmp(query.high()) {
        Ordering::Less => true,
        Ordering::Equal => included && query.high_included(),
        Ordering::Greater => false,
    }
}

struct NodeScan<'a, I: IntervalBounds> {
    node: &'a DitNode<I>,
    in_included: bool,
    pos: usize,
}

impl<'a, I: IntervalBounds> NodeScan<'a, I> {
    /// Members start at the node key, so one low check per list suffices;
    /// the scan stops at the first high falling short of the query.
    fn next_member(&mut self, query: &Interval<I::Endpoint>) -> Option<IntervalRef<I>> {
        loop {
            let (list, low_ok) = if self.in_included {
                (&self.node.included, low_fits(&self.node.key, true, query))
            } else {
                (&self.node.excluded, low_fits(&self.node.key, false, query))
            };
            if low_ok && self.pos < list.len() {
                let member = &list[self.pos];
                if member.cmp_high_low(query) != Ordering::Less {
                    self.pos += 1;
                    return Some(Arc::clone(member));
                }
            }
            if self.in_included {
                self.in_included = false;
                self.pos = 0;
            } else {
                return None;
            }
        }
    }
}

/// Iterative descent pruned by subtree spans.
pub struct DitOverlaps<'a, I: IntervalBounds> {
    stack: Vec<&'a DitNode<I>>,
    query: Interval<I::Endpoint>,
    current: Option<NodeScan<'a, I>>,
}

impl<'a, I: IntervalBounds> Iterator for DitOverlaps<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(scan) = &mut self.current {
                if let Some(member) = scan.next_member(&self.query) {
                    return Some(member);
                }
                self.current = None;
            }
            let node = self.stack.pop()?;
            if !node
                .span
                .as_ref()
                .is_some_and(|span| span.overlaps(&self.query))
            {
                continue;
            }
            if let Some(child) = node.left.as_deref() {
                self.stack.push(child);
            }
            if let Some(child) = node.right.as_deref() {
                self.stack.push(child);
            }
            if node
                .local_span
                .as_ref()
                .is_some_and(|span| span.overlaps(&self.query))
            {
                self.current = Some(NodeScan {
                    node,
                    in_included: true,
                    pos: 0,
                });
            }
        }
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for DynamicIntervalTree<I> {
    fn len(&self) -> usize {
        self.len
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn allows_reference_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(avl::InOrder::new(&self.root).flat_map(|node| {
            node.included
                .iter()
                .rev()
                .chain(node.excluded.iter().rev())
                .cloned()
        }))
    }

    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        self.root
            .as_ref()
            .and_then(|root| root.span.clone())
            .ok_or(CollectionError::Empty)
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(DitOverlaps {
            stack: self.root.as_deref().into_iter().collect(),
            query: query.clone(),
            current: None,
        })
    }

    fn maximum_depth(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.max.max(0) as usize)
    }

    fn add(&mut self, interval: IntervalRef<I>) -> Result<bool, CollectionError> {
        interval.validate()?;
        if !self.allow_duplicates && self.contains_ref(&interval) {
            return Ok(false);
        }
        Self::add_low(&mut self.root, &interval);
        Self::add_high(&mut self.root, &interval);
        self.len += 1;
        Ok(true)
    }

    fn remove(&mut self, interval: &IntervalRef<I>) -> Result<bool, CollectionError> {
        if !self.contains_ref(interval) {
            return Ok(false);
        }
        Self::remove_low(&mut self.root, interval);
        Self::remove_high(&mut self.root, interval);
        self.len -= 1;
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        self.root = None;
        self.len = 0;
        Ok(())
    }
}
