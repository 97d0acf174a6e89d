//! Facade over the stabrs workspace crates.

#[cfg(feature = "core")]
#[doc(inline)]
pub use stabrs_core as core;

#[cfg(feature = "index")]
#[doc(inline)]
pub use stabrs_index as index;
