//! Numerical building blocks: linear least squares, bounded Levenberg–Marquardt
//! and quadrature.

pub mod lm;
pub mod ols;
pub mod quadrature;

pub use lm::*;
pub use ols::*;
pub use quadrature::*;
