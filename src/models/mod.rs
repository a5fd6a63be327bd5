//! Lactation curve model library.
//!
//! Models are implemented as small, pure functions so that fitting and
//! characteristic code can stay generic. Each model also has a symbolic
//! formula, and both are reachable through the static [`registry`].

pub mod formula;
pub mod heuristics;
pub mod model;
pub mod registry;

pub use model::*;
pub use registry::{FitProfile, ModelSpec, all_specs, spec};
