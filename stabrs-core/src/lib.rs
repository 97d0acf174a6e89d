//! # stabrs-core
//!
//! Core infrastructure for the stabrs interval-indexing collections.
//!
//! This crate holds the pieces every index structure builds on: the
//! [`models::IntervalBounds`] capability with its endpoint algebra, the
//! concrete [`models::Interval`] record, reference-identity handles and
//! sets, the error enumerations, and the cross-cutting sweeps (maximum
//! depth, gaps, collapse) in [`utils`].
//!
//! The index structures themselves live in `stabrs-index`.

pub mod errors;
pub mod models;
pub mod utils;
