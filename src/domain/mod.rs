//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - closed identifier sets (`ModelKind`, `Characteristic`, `PersistencyMethod`, ...)
//! - the validated observation series (`LactationRecord`)
//! - fit and integration outputs (`FittedParameters`, `TestIntervalResult`)

pub mod types;

pub use types::*;
