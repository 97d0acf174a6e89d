use stabrs_core::errors::CollectionError;
use stabrs_core::models::{Interval, IntervalBounds, IntervalRef};
use stabrs_core::utils;

/// Boxed lazy sequence, the return shape of every query.
pub type BoxedIter<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

/// The surface every interval index exposes.
///
/// Implementors are parameterized by a caller-supplied interval type `I`;
/// members are shared handles ([`IntervalRef`]) and identity is by
/// reference, never by bounds equality. Reads are pure; queries return lazy
/// sequences that must not outlive a mutation of the collection.
///
/// Mutators have read-only defaults: a static structure simply inherits
/// them and reports [`CollectionError::ReadOnly`]. Dynamic structures
/// override `add`, `remove` and `clear`.
///
/// Ordering guarantees: `sorted` is ascending by
/// [`IntervalBounds::cmp_bounds`]; the layered and sorted-list structures
/// also yield overlap queries in that order, the tree-based structures only
/// guarantee that each stored handle appears once.
pub trait IntervalCollection<I: IntervalBounds> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the mutators are usable at all.
    fn is_read_only(&self) -> bool {
        true
    }

    /// Whether the same handle may be stored more than once.
    fn allows_reference_duplicates(&self) -> bool {
        false
    }

    /// All members, ascending by `cmp_bounds`.
    fn sorted(&self) -> BoxedIter<'_, IntervalRef<I>>;

    /// An arbitrary member.
    fn choose(&self) -> Result<IntervalRef<I>, CollectionError> {
        self.sorted().next().ok_or(CollectionError::Empty)
    }

    /// The smallest interval containing every member.
    fn span(&self) -> Result<Interval<I::Endpoint>, CollectionError> {
        let mut members = self.sorted();
        let first = members.next().ok_or(CollectionError::Empty)?;
        let mut span = first.join(&first);
        for interval in members {
            span = span.join(&interval);
        }
        Ok(span)
    }

    /// The first member in `cmp_bounds` order.
    fn lowest(&self) -> Result<IntervalRef<I>, CollectionError> {
        self.sorted().next().ok_or(CollectionError::Empty)
    }

    /// Every member tied with [`IntervalCollection::lowest`] by endpoint
    /// equality.
    fn lowests<'a>(&'a self) -> BoxedIter<'a, IntervalRef<I>>
    where
        I: 'a,
    {
        let mut members = self.sorted().peekable();
        let lowest = match members.peek() {
            Some(first) => first.join(first),
            None => return Box::new(std::iter::empty()),
        };
        Box::new(members.take_while(move |interval| interval.same_bounds(&lowest)))
    }

    /// The member with the highest high endpoint.
    fn highest(&self) -> Result<IntervalRef<I>, CollectionError> {
        let mut best: Option<IntervalRef<I>> = None;
        for interval in self.sorted() {
            match &best {
                Some(current) if interval.cmp_highs(current) != std::cmp::Ordering::Greater => {}
                _ => best = Some(interval),
            }
        }
        best.ok_or(CollectionError::Empty)
    }

    /// Returns every member whose high endpoint ties with the highest.
    ///
    /// Ties are by endpoint equality: a member belongs to the result when
    /// its `cmp_highs` against [`IntervalCollection::highest`] is `Equal`,
    /// which requires both the same high value and the same inclusion flag.
    ///
    /// # Returns
    ///
    /// A lazy sequence of the tied members, in `cmp_bounds` order. Empty
    /// when the collection is empty.
    fn highests<'a>(&'a self) -> BoxedIter<'a, IntervalRef<I>>
    where
        I: 'a,
    {
        match self.highest() {
            Ok(highest) => Box::new(
                self.sorted()
                    .filter(move |interval| interval.cmp_highs(&highest) == std::cmp::Ordering::Equal),
            ),
            Err(_) => Box::new(std::iter::empty()),
        }
    }

    /// Finds all members containing the given point.
    ///
    /// # Arguments
    ///
    /// * `point` - The endpoint value to stab. A member contains the point
    ///   when it lies strictly between the bounds, or sits on an included
    ///   endpoint.
    ///
    /// # Returns
    ///
    /// A lazy sequence of the stabbed members, with the same ordering
    /// guarantee as [`IntervalCollection::find_overlaps`]. Equivalent to
    /// querying with the point interval `[point, point]`.
    fn find_overlaps_at(&self, point: &I::Endpoint) -> BoxedIter<'_, IntervalRef<I>> {
        self.find_overlaps(&Interval::point(point.clone()))
    }

    /// Finds all members overlapping the query interval.
    ///
    /// Two intervals overlap when their intersection is non-empty,
    /// including touching at a shared endpoint that both sides include.
    ///
    /// # Arguments
    ///
    /// * `query` - The interval to search with. It is not retained; the
    ///   returned sequence borrows only the collection.
    ///
    /// # Returns
    ///
    /// A lazy sequence of the overlapping members. The sorted-list and
    /// layered structures yield them ascending by `cmp_bounds`; the
    /// tree-based structures guarantee only that every stored handle
    /// appears exactly once.
    ///
    /// # Performance
    ///
    /// For large result sets prefer this or the counting variant over
    /// collecting: production is on demand and abandoning the sequence is
    /// free.
    fn find_overlaps(&self, query: &Interval<I::Endpoint>) -> BoxedIter<'_, IntervalRef<I>>;

    fn find_overlap_at(&self, point: &I::Endpoint) -> Option<IntervalRef<I>> {
        self.find_overlaps_at(point).next()
    }

    fn find_overlap(&self, query: &Interval<I::Endpoint>) -> Option<IntervalRef<I>> {
        self.find_overlaps(query).next()
    }

    fn count_overlaps_at(&self, point: &I::Endpoint) -> usize {
        self.find_overlaps_at(point).count()
    }

    fn count_overlaps(&self, query: &Interval<I::Endpoint>) -> usize {
        self.find_overlaps(query).count()
    }

    /// The largest number of members stacked over any single point. The
    /// endpoint-keyed trees answer this in O(1) from their root; the
    /// default sweeps the sorted enumeration.
    fn maximum_depth(&self) -> usize {
        utils::maximum_depth(self.sorted())
    }

    /// The uncovered stretches between members, within the collection span.
    fn gaps<'a>(&'a self) -> BoxedIter<'a, Interval<I::Endpoint>>
    where
        I: 'a,
    {
        Box::new(utils::gaps(self.sorted()))
    }

    /// Finds the complement of the coverage within `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - The interval whose uncovered stretches are wanted,
    ///   including a leading or trailing stretch no member reaches.
    ///
    /// # Returns
    ///
    /// A lazy sequence of gap intervals ascending by `cmp_bounds`. Gap
    /// inclusion flags are inverted from the flanking member endpoints and
    /// clamped to the query's own flags at its edges; a degenerate point
    /// gap appears exactly when both flanks exclude the shared value.
    fn find_gaps<'a>(&'a self, query: &Interval<I::Endpoint>) -> BoxedIter<'a, Interval<I::Endpoint>>
    where
        I: 'a,
    {
        let filter_query = query.clone();
        Box::new(utils::gaps_within(
            query,
            self.sorted()
                .filter(move |interval| interval.overlaps(&filter_query)),
        ))
    }

    /// Inserts a shared handle into the collection.
    ///
    /// # Arguments
    ///
    /// * `interval` - The handle to store. The pointed-to value is shared
    ///   with the caller and never mutated by the collection; its bounds
    ///   are validated before anything is stored.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the member was stored. `Ok(false)` when the
    /// structure rejects it: the same handle is already present (unless the
    /// structure allows reference duplicates), or storing it would violate
    /// a disjointness requirement. Adding the same handle twice is
    /// idempotent. `Err(ReadOnly)` from static structures, `Err(Interval)`
    /// on invalid bounds.
    fn add(&mut self, _interval: IntervalRef<I>) -> Result<bool, CollectionError> {
        Err(CollectionError::ReadOnly)
    }

    /// Removes one stored copy of the given handle.
    ///
    /// # Arguments
    ///
    /// * `interval` - The handle to drop. Membership is decided by
    ///   reference identity, never by bounds equality: an interval-equal
    ///   but distinct handle removes nothing.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when a copy was removed, `Ok(false)` when the handle is
    /// not a member (including a second removal of the same handle).
    /// `Err(ReadOnly)` from static structures.
    fn remove(&mut self, _interval: &IntervalRef<I>) -> Result<bool, CollectionError> {
        Err(CollectionError::ReadOnly)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        Err(CollectionError::ReadOnly)
    }
}
