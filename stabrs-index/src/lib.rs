//! # stabrs-index
//!
//! Interval-indexing collections: stabbing queries, overlap queries, overlap
//! counts, gaps, spans, and (for the dynamic trees) insertion and removal.
//!
//! ## Purpose
//!
//! This crate holds every index structure of the stabrs workspace behind the
//! single [`IntervalCollection`] trait. The structures differ in what they
//! assume about the input and what they pay per operation; the endpoint
//! algebra they all share lives in `stabrs-core`.
//!
//! ## Main components
//!
//! - **[`SortedIntervalList`]**: static flat array over disjoint intervals,
//!   everything by binary search
//! - **[`LayeredList`]** / **[`NestedList`]**: static containment-layered
//!   structures with sorted overlap enumeration
//! - **[`FiniteIntervalTree`]**: dynamic disjoint set with an in-order
//!   linked list and conflict-resolving forced insertion
//! - **[`IntervalBinarySearchTree`]**: dynamic endpoint-keyed tree for
//!   O(log n + k) stabbing and O(1) maximum depth
//! - **[`DynamicIntervalTree`]**: dynamic low-keyed tree with subtree spans
//!   and optional reference duplicates
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stabrs_core::models::Interval;
//! use stabrs_index::{IntervalBinarySearchTree, IntervalCollection};
//!
//! let mut tree = IntervalBinarySearchTree::new();
//! tree.add(Arc::new(Interval::closed(1, 5).unwrap())).unwrap();
//! tree.add(Arc::new(Interval::closed_open(2, 6).unwrap())).unwrap();
//!
//! assert_eq!(tree.count_overlaps_at(&3), 2);
//! assert_eq!(tree.maximum_depth(), 2);
//! ```

pub mod dit;
pub mod finite;
pub mod ibs;
pub mod layered;
pub mod nested;
pub mod sorted_list;
pub mod traits;

pub(crate) mod avl;

// re-exports
pub use self::dit::DynamicIntervalTree;
pub use self::finite::FiniteIntervalTree;
pub use self::ibs::IntervalBinarySearchTree;
pub use self::layered::LayeredList;
pub use self::nested::NestedList;
pub use self::sorted_list::SortedIntervalList;
pub use self::traits::{BoxedIter, IntervalCollection};
