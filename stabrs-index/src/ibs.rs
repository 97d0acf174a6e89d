use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use stabrs_core::errors::CollectionError;
use stabrs_core::models::{Interval, IntervalBounds, IntervalRef, RefSet, RefSetIter};

use crate::avl::{self, AvlNode, Link};
use crate::traits::{BoxedIter, IntervalCollection};

struct IbsNode<I: IntervalBounds> {
    key: I::Endpoint,
    /// Intervals covering the whole open gap between the nearest left-spine
    /// ancestor key and this key.
    less: RefSet<I>,
    /// Intervals containing this key.
    equal: RefSet<I>,
    /// Intervals covering the whole open gap between this key and the
    /// nearest right-spine ancestor key.
    greater: RefSet<I>,
    /// Members with an endpoint at this key; the node lives while this is
    /// non-empty.
    endpoints_here: RefSet<I>,
    /// Depth change exactly at the key.
    delta_at: i32,
    /// Depth change just past the key.
    delta_after: i32,
    /// Sum of deltas across the subtree; zero at the root by construction.
    sum: i32,
    /// Maximum prefix depth within the subtree.
    max: i32,
    height: u8,
    left: Link<IbsNode<I>>,
    right: Link<IbsNode<I>>,
}

impl<I: IntervalBounds> IbsNode<I> {
    fn new(key: I::Endpoint) -> Self {
        IbsNode {
            key,
            less: RefSet::new(),
            equal: RefSet::new(),
            greater: RefSet::new(),
            endpoints_here: RefSet::new(),
            delta_at: 0,
            delta_after: 0,
            sum: 0,
            max: 0,
            height: 1,
            left: None,
            right: None,
        }
    }
}

fn sum_max<I: IntervalBounds>(link: &Link<IbsNode<I>>) -> (i32, i32) {
    link.as_ref().map_or((0, 0), |node| (node.sum, node.max))
}

impl<I: IntervalBounds> AvlNode for IbsNode<I> {
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
    }

    /// `root` moves down-right, `pivot` (its left child, smaller key) up.
    /// The gap below `root` splits at `pivot`'s key, and the gaps right of
    /// `pivot` and right of `root` merge when an interval covers both.
    fn before_rotate_right(root: &mut Self, pivot: &mut Self) {
        let old_root_less = root.less.clone();
        let merged = pivot.greater.intersection(&root.greater);
        let moved_down = pivot.greater.difference(&merged);
        pivot.greater = merged;
        root.greater.remove_all(&pivot.greater);
        root.equal.remove_all(&pivot.greater);
        root.less.extend_from(&moved_down);
        pivot.less.extend_from(&old_root_less);
        pivot.equal.extend_from(&old_root_less);
    }

    /// Mirror image of [`IbsNode::before_rotate_right`].
    fn before_rotate_left(root: &mut Self, pivot: &mut Self) {
        let old_root_greater = root.greater.clone();
        let merged = pivot.less.intersection(&root.less);
        let moved_down = pivot.less.difference(&merged);
        pivot.less = merged;
        root.less.remove_all(&pivot.less);
        root.equal.remove_all(&pivot.less);
        root.greater.extend_from(&moved_down);
        pivot.greater.extend_from(&old_root_greater);
        pivot.equal.extend_from(&old_root_greater);
    }
}

/// Interval Binary Search Tree: an AVL tree over the endpoint values of the
/// stored intervals, answering stabbing queries from the sets hanging off
/// the search path.
///
/// Every node carries the intervals covering its key and the open gaps
/// toward its spine ancestors, each interval stored once per segment of its
/// unique decomposition along the search paths of its endpoints. Rotations
/// migrate the sets with the set arithmetic in the rotation hooks. The
/// `delta`/`sum`/`max` augmentation makes the maximum depth an O(1) read at
/// the root; the total delta sum over the tree is structurally zero.
///
/// Duplicate handles are rejected; stabbing results carry no order
/// guarantee beyond yielding each member once.
pub struct IntervalBinarySearchTree<I: IntervalBounds> {
    root: Link<IbsNode<I>>,
    len: usize,
}

impl<I: IntervalBounds> Default for IntervalBinarySearchTree<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> fmt::Debug for IntervalBinarySearchTree<I>
where
    I: IntervalBounds,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalBinarySearchTree")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<I: IntervalBounds> IntervalBinarySearchTree<I> {
    pub fn new() -> Self {
        IntervalBinarySearchTree { root: None, len: 0 }
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
                Ordering::Equal => return node.endpoints_here.contains(interval),
            }
        }
        false
    }

    /// Anchor the low endpoint at a node whose key equals it.
    fn place_low(node: &mut IbsNode<I>, interval: &IntervalRef<I>, right_up: Option<&I::Endpoint>) {
        if interval.low_included() {
            node.equal.insert(interval);
        }
        if right_up.is_some_and(|key| *key <= *interval.high()) {
            node.greater.insert(interval);
        }
        node.endpoints_here.insert(interval);
        if interval.low_included() {
            node.delta_at += 1;
        } else {
            node.delta_after += 1;
        }
    }

    fn unplace_low(
        node: &mut IbsNode<I>,
        interval: &IntervalRef<I>,
        right_up: Option<&I::Endpoint>,
    ) {
        if interval.low_included() {
            node.equal.remove(interval);
        }
        if right_up.is_some_and(|key| *key <= *interval.high()) {
            node.greater.remove(interval);
        }
        node.endpoints_here.remove(interval);
        if interval.low_included() {
            node.delta_at -= 1;
        } else {
            node.delta_after -= 1;
        }
    }

    fn place_high(node: &mut IbsNode<I>, interval: &IntervalRef<I>, left_up: Option<&I::Endpoint>) {
        if interval.high_included() {
            node.equal.insert(interval);
        }
        if left_up.is_some_and(|key| *key >= *interval.low()) {
            node.less.insert(interval);
        }
        node.endpoints_here.insert(interval);
        if interval.high_included() {
            node.delta_after -= 1;
        } else {
            node.delta_at -= 1;
        }
    }

    fn unplace_high(
        node: &mut IbsNode<I>,
        interval: &IntervalRef<I>,
        left_up: Option<&I::Endpoint>,
    ) {
        if interval.high_included() {
            node.equal.remove(interval);
        }
        if left_up.is_some_and(|key| *key >= *interval.low()) {
            node.less.remove(interval);
        }
        node.endpoints_here.remove(interval);
        if interval.high_included() {
            node.delta_after += 1;
        } else {
            node.delta_at += 1;
        }
    }

    /// Descend toward the low endpoint, storing the interval on every
    /// segment it fully covers along the way.
    fn add_low(
        link: &mut Link<IbsNode<I>>,
        interval: &IntervalRef<I>,
        right_up: Option<I::Endpoint>,
    ) {
        let Some(node) = link else {
            let mut node = IbsNode::new(interval.low().clone());
            Self::place_low(&mut node, interval, right_up.as_ref());
            node.update();
            *link = Some(Box::new(node));
            return;
        };
        match interval.low().cmp(&node.key) {
            Ordering::Less => {
                if node.key < *interval.high() {
                    node.equal.insert(interval);
                }
                if right_up.as_ref().is_some_and(|key| *key <= *interval.high()) {
                    node.greater.insert(interval);
                }
                let next_right_up = Some(node.key.clone());
                Self::add_low(&mut node.left, interval, next_right_up);
            }
            Ordering::Greater => Self::add_low(&mut node.right, interval, right_up),
            Ordering::Equal => Self::place_low(node, interval, right_up.as_ref()),
        }
        avl::rebalance_link(link);
    }

    fn add_high(
        link: &mut Link<IbsNode<I>>,
        interval: &IntervalRef<I>,
        left_up: Option<I::Endpoint>,
    ) {
        let Some(node) = link else {
            let mut node = IbsNode::new(interval.high().clone());
            Self::place_high(&mut node, interval, left_up.as_ref());
            node.update();
            *link = Some(Box::new(node));
            return;
        };
        match interval.high().cmp(&node.key) {
            Ordering::Greater => {
                if node.key > *interval.low() {
                    node.equal.insert(interval);
                }
                if left_up.as_ref().is_some_and(|key| *key >= *interval.low()) {
                    node.less.insert(interval);
                }
                let next_left_up = Some(node.key.clone());
                Self::add_high(&mut node.right, interval, next_left_up);
            }
            Ordering::Less => Self::add_high(&mut node.left, interval, left_up),
            Ordering::Equal => Self::place_high(node, interval, left_up.as_ref()),
        }
        avl::rebalance_link(link);
    }

    /// Exact dual of [`IntervalBinarySearchTree::add_low`]: the canonical
    /// placement is recomputed against the current shape, which rotations
    /// keep canonical, so the descent removes precisely the stored entries.
    fn remove_low(
        link: &mut Link<IbsNode<I>>,
        interval: &IntervalRef<I>,
        right_up: Option<I::Endpoint>,
    ) {
        let Some(node) = link else {
            return;
        };
        match interval.low().cmp(&node.key) {
            Ordering::Less => {
                if node.key < *interval.high() {
                    node.equal.remove(interval);
                }
                if right_up.as_ref().is_some_and(|key| *key <= *interval.high()) {
                    node.greater.remove(interval);
                }
                let next_right_up = Some(node.key.clone());
                Self::remove_low(&mut node.left, interval, next_right_up);
            }
            Ordering::Greater => Self::remove_low(&mut node.right, interval, right_up),
            Ordering::Equal => Self::unplace_low(node, interval, right_up.as_ref()),
        }
        avl::rebalance_link(link);
    }

    fn remove_high(
        link: &mut Link<IbsNode<I>>,
        interval: &IntervalRef<I>,
        left_up: Option<I::Endpoint>,
    ) {
        let Some(node) = link else {
            return;
        };
        match interval.high().cmp(&node.key) {
            Ordering::Greater => {
                if node.key > *interval.low() {
                    node.equal.remove(interval);
                }
                if left_up.as_ref().is_some_and(|key| *key >= *interval.low()) {
                    node.less.remove(interval);
                }
                let next_left_up = Some(node.key.clone());
                Self::remove_high(&mut node.right, interval, next_left_up);
            }
            Ordering::Less => Self::remove_high(&mut node.left, interval, left_up),
            Ordering::Equal => Self::unplace_high(node, interval, left_up.as_ref()),
        }
        avl::rebalance_link(link);
    }

    /// Members anchored at the in-order successor of `key`, when the key's
    /// node has two children and deletion will move that successor.
    fn successor_anchored(&self, key: &I::Endpoint) -> Vec<IntervalRef<I>> {
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            match key.cmp(&node.key) {
                Ordering::Less => cursor = &node.left,
                Ordering::Greater => cursor = &node.right,
                Ordering::Equal => {
                    if node.left.is_none() || node.right.is_none() {
                        return Vec::new();
                    }
                    let mut min = &node.right;
                    while let Some(next) = min {
                        if next.left.is_some() {
                            min = &next.left;
                        } else {
                            return next.endpoints_here.iter().cloned().collect();
                        }
                    }
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    /// Drop the node of a key that anchors no interval anymore.
    ///
    /// Callers displace every interval whose storage references the key
    /// first, so the node is an empty husk by the time the links move.
    fn delete_key(link: &mut Link<IbsNode<I>>, key: &I::Endpoint) {
        let Some(node) = link else {
            return;
        };
        match key.cmp(&node.key) {
            Ordering::Less => Self::delete_key(&mut node.left, key),
            Ordering::Greater => Self::delete_key(&mut node.right, key),
            Ordering::Equal => {
                debug_assert!(
                    node.endpoints_here.is_empty()
                        && node.less.is_empty()
                        && node.equal.is_empty()
                        && node.greater.is_empty()
                        && node.delta_at == 0
                        && node.delta_after == 0,
                    "deleting a node that still stores intervals"
                );
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
                return;
            }
        }
        avl::rebalance_link(link);
    }

    /// Remove the endpoint node of `key` if nothing is anchored there.
    ///
    /// Every set entry that references the vanishing boundary belongs to an
    /// interval spanning the key, or to one anchored at the in-order
    /// successor whose position the deletion reuses. Those members are
    /// displaced, the shape fixed, and the members stored back against the
    /// new shape.
    fn prune_key(&mut self, key: I::Endpoint) {
        let prune = {
            let mut cursor = &self.root;
            let mut prune = false;
            while let Some(node) = cursor {
                match key.cmp(&node.key) {
                    Ordering::Less => cursor = &node.left,
                    Ordering::Greater => cursor = &node.right,
                    Ordering::Equal => {
                        prune = node.endpoints_here.is_empty();
                        break;
                    }
                }
            }
            prune
        };
        if !prune {
            return;
        }

        let mut displaced: Vec<IntervalRef<I>> = Vec::new();
        let mut seen: RefSet<I> = RefSet::new();
        for interval in self
            .find_overlaps_at(&key)
            .collect::<Vec<_>>()
            .into_iter()
            .chain(self.successor_anchored(&key))
        {
            if seen.insert(&interval) {
                displaced.push(interval);
            }
        }
        for interval in &displaced {
            Self::remove_low(&mut self.root, interval, None);
            Self::remove_high(&mut self.root, interval, None);
        }
        Self::delete_key(&mut self.root, &key);
        for interval in &displaced {
            Self::add_low(&mut self.root, interval, None);
            Self::add_high(&mut self.root, interval, None);
        }
    }

    /// Sets whose segment can meet the query, gathered along the search
    /// paths of both query endpoints. Only those paths can store an
    /// overlapping interval.
    fn collect_query_sets<'a>(&'a self, query: &Interval<I::Endpoint>) -> Vec<&'a RefSet<I>> {
        let mut sets = Vec::new();
        for target in [query.low(), query.high()] {
            let mut cursor = self.root.as_deref();
            let mut left_up: Option<&'a I::Endpoint> = None;
            let mut right_up: Option<&'a I::Endpoint> = None;
            while let Some(node) = cursor {
                if query.overlaps_point(&node.key) {
                    sets.push(&node.equal);
                }
                if *query.low() < node.key && left_up.is_none_or(|up| *up < *query.high()) {
                    sets.push(&node.less);
                }
                if node.key < *query.high() && right_up.is_none_or(|up| *query.low() < *up) {
                    sets.push(&node.greater);
                }
                match target.cmp(&node.key) {
                    Ordering::Less => {
                        right_up = Some(&node.key);
                        cursor = node.left.as_deref();
                    }
                    Ordering::Greater => {
                        left_up = Some(&node.key);
                        cursor = node.right.as_deref();
                    }
                    Ordering::Equal => break,
                }
            }
        }
        sets
    }
}

/// Stabbing query: one side-set per node along the search path.
pub struct StabIter<'a, I: IntervalBounds> {
    cursor: Option<&'a IbsNode<I>>,
    point: I::Endpoint,
    set_iter: Option<RefSetIter<'a, I>>,
}

impl<'a, I: IntervalBounds> Iterator for StabIter<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.set_iter {
                if let Some(interval) = iter.next() {
                    return Some(Arc::clone(interval));
                }
            }
            let node = self.cursor?;
            match self.point.cmp(&node.key) {
                Ordering::Less => {
                    self.set_iter = Some(node.less.iter());
                    self.cursor = node.left.as_deref();
                }
                Ordering::Greater => {
                    self.set_iter = Some(node.greater.iter());
                    self.cursor = node.right.as_deref();
                }
                Ordering::Equal => {
                    self.set_iter = Some(node.equal.iter());
                    self.cursor = None;
                }
            }
        }
    }
}

/// Interval query: drains the path sets, suppressing the duplicates an
/// interval stored on several qualifying segments would produce.
pub struct IbsOverlaps<'a, I: IntervalBounds> {
    sets: Vec<&'a RefSet<I>>,
    next_set: usize,
    current: Option<RefSetIter<'a, I>>,
    seen: RefSet<I>,
}

impl<'a, I: IntervalBounds> Iterator for IbsOverlaps<'a, I> {
    type Item = IntervalRef<I>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.current {
                for interval in iter {
                    if self.seen.insert(interval) {
                        return Some(Arc::clone(interval));
                    }
                }
            }
            let set = self.sets.get(self.next_set)?;
            self.current = Some(set.iter());
            self.next_set += 1;
        }
    }
}

impl<I: IntervalBounds> IntervalCollection<I> for IntervalBinarySearchTree<I> {
    fn len(&self) -> usize {
        self.len
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(avl::InOrder::new(&self.root).flat_map(|node| {
            let mut starting: Vec<IntervalRef<I>> = node
                .endpoints_here
                .iter()
                .filter(|interval| *interval.low() == node.key)
                .cloned()
                .collect();
            starting.sort_by(|a, b| a.cmp_bounds(b));
            starting.into_iter()
        }))
    }

    fn find_overlaps_at(&self, point: &I::Endpoint) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(StabIter {
            cursor: self.root.as_deref(),
            point: point.clone(),
            set_iter: None,
        })
    }

    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>> {
        Box::new(IbsOverlaps {
            sets: self.collect_query_sets(query),
            next_set: 0,
            current: None,
            seen: RefSet::new(),
        })
    }

    fn maximum_depth(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.max.max(0) as usize)
    }

    fn add(&mut self, interval: IntervalRef<I>) -> Result<bool, CollectionError> {
        interval.validate()?;
        if self.contains_ref(&interval) {
            return Ok(false);
        }
        Self::add_low(&mut self.root, &interval, None);
        Self::add_high(&mut self.root, &interval, None);
        self.len += 1;
        Ok(true)
    }

    fn remove(&mut self, interval: &IntervalRef<I>) -> Result<bool, CollectionError> {
        if !self.contains_ref(interval) {
            return Ok(false);
        }
        Self::remove_low(&mut self.root, interval, None);
        Self::remove_high(&mut self.root, interval, None);
        self.len -= 1;
        self.prune_key(interval.low().clone());
        self.prune_key(interval.high().clone());
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        self.root = None;
        self.len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avl::assert_balanced;
    use stabrs_core::utils;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    type Iv = Interval<i32>;

    fn arc(interval: Result<Iv, stabrs_core::errors::IntervalError>) -> Arc<Iv> {
        Arc::new(interval.unwrap())
    }

    #[fixture]
    fn stabbing() -> IntervalBinarySearchTree<Iv> {
        IntervalBinarySearchTree::build(vec![
            arc(Interval::closed(1, 5)),
            arc(Interval::closed_open(2, 6)),
            arc(Interval::open_closed(3, 4)),
            arc(Interval::closed(5, 7)),
        ])
        .unwrap()
    }

    fn assert_augmentation(tree: &IntervalBinarySearchTree<Iv>) {
        if let Some(root) = &tree.root {
            assert_eq!(root.sum, 0, "the delta sum over the tree must vanish");
        }
        assert_balanced(&tree.root);
        let mut members: Vec<_> = tree.sorted().collect();
        members.sort_by(|a, b| a.cmp_bounds(b));
        assert_eq!(tree.maximum_depth(), utils::maximum_depth(members.iter()));
    }

    fn lows_at(tree: &IntervalBinarySearchTree<Iv>, point: i32) -> Vec<i32> {
        let mut lows: Vec<i32> = tree.find_overlaps_at(&point).map(|iv| *iv.low()).collect();
        lows.sort();
        lows
    }

    #[rstest]
    fn stabbing_scenario(stabbing: IntervalBinarySearchTree<Iv>) {
        assert_eq!(lows_at(&stabbing, 5), vec![1, 5]);
        assert_eq!(lows_at(&stabbing, 6), vec![5]);
        assert_eq!(lows_at(&stabbing, 4), vec![1, 2, 3]);
        assert_eq!(stabbing.count_overlaps_at(&5), 2);
        // the stack is deepest just below 4
        assert_eq!(stabbing.maximum_depth(), 3);
        assert_augmentation(&stabbing);
    }

    #[rstest]
    fn interval_queries_dedupe(stabbing: IntervalBinarySearchTree<Iv>) {
        let mut lows: Vec<i32> = stabbing
            .find_overlaps(&Interval::closed(4, 5).unwrap())
            .map(|iv| *iv.low())
            .collect();
        lows.sort();
        assert_eq!(lows, vec![1, 2, 3, 5]);
        assert_eq!(stabbing.count_overlaps(&Interval::closed(4, 5).unwrap()), 4);
        assert_eq!(stabbing.count_overlaps(&Interval::closed(8, 9).unwrap()), 0);
    }

    #[rstest]
    fn sorted_and_span(stabbing: IntervalBinarySearchTree<Iv>) {
        let lows: Vec<i32> = stabbing.sorted().map(|iv| *iv.low()).collect();
        assert_eq!(lows, vec![1, 2, 3, 5]);
        assert!(stabbing
            .span()
            .unwrap()
            .same_bounds(&Interval::closed(1, 7).unwrap()));
    }

    #[rstest]
    fn add_and_remove_are_idempotent_per_handle(mut stabbing: IntervalBinarySearchTree<Iv>) {
        let interval = arc(Interval::closed(0, 10));
        assert!(stabbing.add(Arc::clone(&interval)).unwrap());
        assert!(!stabbing.add(Arc::clone(&interval)).unwrap());
        assert_eq!(stabbing.len(), 5);
        assert_augmentation(&stabbing);

        assert!(stabbing.remove(&interval).unwrap());
        assert!(!stabbing.remove(&interval).unwrap());
        assert_eq!(stabbing.len(), 4);
        assert_augmentation(&stabbing);

        // an interval-equal but distinct handle is a separate member
        let twin = arc(Interval::closed(1, 5));
        assert!(stabbing.add(twin).unwrap());
        assert_eq!(stabbing.count_overlaps_at(&5), 3);
        assert_augmentation(&stabbing);
    }

    #[rstest]
    fn removal_prunes_orphan_endpoint_nodes(mut stabbing: IntervalBinarySearchTree<Iv>) {
        let members: Vec<_> = stabbing.sorted().collect();
        for member in &members {
            assert!(stabbing.remove(member).unwrap());
            assert_augmentation(&stabbing);
        }
        assert!(stabbing.is_empty());
        assert!(stabbing.root.is_none(), "all endpoint nodes must be pruned");
    }

    #[test]
    fn randomized_against_naive_scan() {
        use rand::Rng;

        let mut rng = rand::rng();
        let mut tree: IntervalBinarySearchTree<Iv> = IntervalBinarySearchTree::new();
        let mut members: Vec<Arc<Iv>> = Vec::new();

        for round in 0..300 {
            if members.is_empty() || rng.random_bool(0.7) {
                let low = rng.random_range(0..60);
                let length = rng.random_range(0..15);
                let interval = if length == 0 {
                    Arc::new(Interval::point(low))
                } else {
                    Arc::new(
                        Interval::new(
                            low,
                            low + length,
                            rng.random_bool(0.5),
                            rng.random_bool(0.5),
                        )
                        .unwrap(),
                    )
                };
                assert!(tree.add(Arc::clone(&interval)).unwrap());
                members.push(interval);
            } else {
                let victim = members.swap_remove(rng.random_range(0..members.len()));
                assert!(tree.remove(&victim).unwrap());
            }

            if round % 10 == 0 {
                assert_augmentation(&tree);
                for point in [0, 7, 13, 30, 59, 74] {
                    let mut expected: Vec<i32> = members
                        .iter()
                        .filter(|iv| iv.overlaps_point(&point))
                        .map(|iv| *iv.low())
                        .collect();
                    expected.sort();
                    assert_eq!(lows_at(&tree, point), expected, "stab at {point}");
                }
                let query = Interval::closed(10, 25).unwrap();
                let expected = members.iter().filter(|iv| iv.overlaps(&query)).count();
                assert_eq!(tree.count_overlaps(&query), expected);
            }
        }

        for member in members {
            assert!(tree.remove(&member).unwrap());
        }
        assert!(tree.root.is_none());
    }
}
