//! Analysis modules.
//!
//! Date resolution and the content insights aggregation built on it.

pub mod aggregator;
pub mod dates;

pub use aggregator::*;
