pub mod endpoint;
pub mod interval;
pub mod refs;

// re-export for cleaner imports
pub use self::endpoint::{unique_endpoints, Endpoint};
pub use self::interval::{Interval, IntervalBounds};
pub use self::refs::{same_ref, ByRef, IntervalRef, RefSet, RefSetIter};
