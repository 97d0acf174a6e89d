//! Cross-structure agreement: every index built from the same input must
//! answer every read-only operation identically.

use std::sync::Arc;

use rand::Rng;

use stabrs_core::models::{Interval, IntervalBounds, IntervalRef};
use stabrs_index::{
    DynamicIntervalTree, FiniteIntervalTree, IntervalBinarySearchTree, IntervalCollection,
    LayeredList, NestedList, SortedIntervalList,
};

type Iv = Interval<i32>;

fn random_intervals(count: usize, domain: i32, max_len: i32) -> Vec<IntervalRef<Iv>> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let low = rng.random_range(0..domain);
            let length = rng.random_range(0..max_len);
            let interval = if length == 0 {
                Interval::point(low)
            } else {
                Interval::new(low, low + length, rng.random_bool(0.5), rng.random_bool(0.5))
                    .unwrap()
            };
            Arc::new(interval)
        })
        .collect()
}

fn bounds(intervals: impl Iterator<Item = IntervalRef<Iv>>) -> Vec<(i32, i32, bool, bool)> {
    intervals
        .map(|iv| (*iv.low(), *iv.high(), iv.low_included(), iv.high_included()))
        .collect()
}

fn assert_collections_agree(collections: &[&dyn IntervalCollection<Iv>]) {
    let mut rng = rand::rng();
    let reference = collections[0];
    let reference_sorted = bounds(reference.sorted());

    for other in &collections[1..] {
        assert_eq!(reference.len(), other.len());
        assert_eq!(bounds(other.sorted()), reference_sorted);
        assert_eq!(reference.maximum_depth(), other.maximum_depth());
        assert!(reference
            .span()
            .unwrap()
            .same_bounds(&other.span().unwrap()));
        assert!(reference
            .lowest()
            .unwrap()
            .same_bounds(&other.lowest().unwrap()));
        assert!(reference
            .highest()
            .unwrap()
            .same_bounds(&other.highest().unwrap()));
    }

    for _ in 0..60 {
        let low = rng.random_range(-5..110);
        let query = Interval::closed(low, low + rng.random_range(0..25)).unwrap();
        let point = rng.random_range(-5..110);
        let expected_count = reference.count_overlaps(&query);
        let expected_at = reference.count_overlaps_at(&point);
        let expected_gaps: Vec<_> = reference.find_gaps(&query).collect();
        for other in &collections[1..] {
            assert_eq!(other.count_overlaps(&query), expected_count, "query {query}");
            assert_eq!(other.count_overlaps_at(&point), expected_at, "point {point}");
            let gaps: Vec<_> = other.find_gaps(&query).collect();
            assert_eq!(gaps.len(), expected_gaps.len());
            for (a, b) in gaps.iter().zip(&expected_gaps) {
                assert!(a.same_bounds(b));
            }
        }
    }
}

#[test]
fn all_structures_agree_on_overlapping_input() {
    let intervals = random_intervals(120, 100, 15);

    let layered = LayeredList::build(intervals.clone()).unwrap();
    let galloping = LayeredList::build_galloping(intervals.clone()).unwrap();
    let nested = NestedList::build(intervals.clone()).unwrap();
    let ibs = IntervalBinarySearchTree::build(intervals.clone()).unwrap();
    let dit = DynamicIntervalTree::build(intervals.clone()).unwrap();

    assert_collections_agree(&[&layered, &galloping, &nested, &ibs, &dit]);
}

#[test]
fn all_structures_agree_on_disjoint_input() {
    // carve a disjoint set out of random intervals with the finite tree
    let mut finite: FiniteIntervalTree<Iv> = FiniteIntervalTree::new();
    for interval in random_intervals(120, 100, 10) {
        let _ = finite.add(interval).unwrap();
    }
    let disjoint: Vec<IntervalRef<Iv>> = finite.sorted().collect();

    let sorted_list = SortedIntervalList::build(disjoint.clone()).unwrap();
    let layered = LayeredList::build(disjoint.clone()).unwrap();
    let nested = NestedList::build(disjoint.clone()).unwrap();
    let ibs = IntervalBinarySearchTree::build(disjoint.clone()).unwrap();
    let dit = DynamicIntervalTree::build(disjoint).unwrap();

    assert_collections_agree(&[&sorted_list, &finite, &layered, &nested, &ibs, &dit]);
}

#[test]
fn construction_round_trips_the_sorted_order() {
    let intervals = random_intervals(80, 60, 12);
    let mut expected = intervals.clone();
    expected.sort_by(|a, b| a.cmp_bounds(b));

    let nested = NestedList::build(intervals.clone()).unwrap();
    assert_eq!(bounds(nested.sorted()), bounds(expected.iter().cloned()));

    let ibs = IntervalBinarySearchTree::build(intervals).unwrap();
    assert_eq!(bounds(ibs.sorted()), bounds(expected.into_iter()));
}

#[test]
fn gap_scenario_holds_for_every_structure() {
    let disjoint = vec![
        Interval::closed(1, 2).unwrap(),
        Interval::closed(3, 4).unwrap(),
        Interval::closed(7, 9).unwrap(),
    ];

    let collections: Vec<Box<dyn IntervalCollection<Iv>>> = vec![
        Box::new(SortedIntervalList::build(disjoint.clone()).unwrap()),
        Box::new(FiniteIntervalTree::build(disjoint.clone()).unwrap()),
        Box::new(LayeredList::build(disjoint.clone()).unwrap()),
        Box::new(NestedList::build(disjoint.clone()).unwrap()),
        Box::new(IntervalBinarySearchTree::build(disjoint.clone()).unwrap()),
        Box::new(DynamicIntervalTree::build(disjoint).unwrap()),
    ];

    for collection in &collections {
        let gaps: Vec<_> = collection.gaps().collect();
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0].same_bounds(&Interval::open(2, 3).unwrap()));
        assert!(gaps[1].same_bounds(&Interval::open(4, 7).unwrap()));

        // complement within a query reaches the query edges
        let inside: Vec<_> = collection
            .find_gaps(&Interval::closed(0, 10).unwrap())
            .collect();
        assert_eq!(inside.len(), 4);
        assert!(inside[0].same_bounds(&Interval::closed_open(0, 1).unwrap()));
        assert!(inside[3].same_bounds(&Interval::open_closed(9, 10).unwrap()));
    }
}

#[test]
fn lazy_producers_are_restartable() {
    let intervals = random_intervals(40, 50, 8);
    let ibs: IntervalBinarySearchTree<Iv> = IntervalBinarySearchTree::build(intervals).unwrap();
    let query = Interval::closed(10, 30).unwrap();

    let mut first = ibs.find_overlaps(&query);
    let head = first.next();
    drop(first);

    // abandoning a producer and starting over yields the full answer again
    let restarted = ibs.find_overlaps(&query).count();
    assert_eq!(restarted, ibs.count_overlaps(&query));
    if let Some(head) = head {
        assert!(head.overlaps(&query));
    }
}
