//! ICAR guideline computations on test-day records.

pub mod test_interval;

pub use test_interval::{TestDay, test_interval_method};
