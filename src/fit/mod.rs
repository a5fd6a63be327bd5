//! Frequentist curve fitting.
//!
//! Responsibilities:
//!
//! - fit one of the fittable models by bounded nonlinear least squares
//! - the MilkBot constrained least-squares variant with descriptive names
//! - predicted curves over the lactation horizon

pub mod fitter;
pub mod milkbot;

pub use fitter::*;
pub use milkbot::*;
