use thiserror::Error;

/// Rejections raised while validating interval bounds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("invalid interval: low endpoint is above the high endpoint")]
    LowAboveHigh,

    #[error("invalid interval: a point interval must include both endpoints")]
    DegeneratePoint,
}

/// Errors surfaced by the collection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("no such item: the collection is empty")]
    Empty,

    #[error("collection is read-only")]
    ReadOnly,

    #[error("intervals overlap: the collection holds pairwise disjoint intervals")]
    Overlapping,
}
