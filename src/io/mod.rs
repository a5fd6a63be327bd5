//! Input/output helpers.
//!
//! - CSV ingest + validation of test-day tables (`ingest`)
//! - result exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
