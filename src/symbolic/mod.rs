//! Symbolic calculus behind a narrow interface.
//!
//! The characteristic engine only needs four operations: differentiate,
//! solve `dy/dt = 0`, integrate over an interval and compile to a fast
//! evaluator. [`ClosedFormEngine`] implements them over our own expression
//! trees; [`NumericOnly`] refuses every derivation so callers exercise the
//! numeric paths (useful for tests and for environments that want to skip the
//! symbolic step entirely).
//!
//! Why not a general CAS? Lactation models are products of powers of `t` and
//! exponentials (or short sums of them). The exponential-polynomial normal
//! form in `normal_form` covers the closed forms that actually occur, and
//! every miss is recovered by the numeric fallback.

pub mod compile;
pub mod expr;
pub mod normal_form;
pub mod solve;

pub use compile::Program;
pub use expr::Expr;

use crate::error::{LactationError, Result};
use normal_form::ExpSum;

pub trait SymbolicEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn differentiate(&self, expr: &Expr) -> Result<Expr>;

    /// Candidate solutions of `d expr / dt = 0`.
    fn stationary_points(&self, expr: &Expr) -> Result<Vec<Expr>>;

    /// `∫_lower^upper expr dt` as a time-free expression.
    fn definite_integral(&self, expr: &Expr, lower: f64, upper: f64) -> Result<Expr>;

    fn compile(&self, expr: &Expr) -> Program {
        Program::compile(expr)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedFormEngine;

impl SymbolicEngine for ClosedFormEngine {
    fn name(&self) -> &'static str {
        "closed-form"
    }

    fn differentiate(&self, expr: &Expr) -> Result<Expr> {
        Ok(expr.diff())
    }

    fn stationary_points(&self, expr: &Expr) -> Result<Vec<Expr>> {
        solve::stationary_points(expr)
    }

    fn definite_integral(&self, expr: &Expr, lower: f64, upper: f64) -> Result<Expr> {
        let antiderivative = ExpSum::from_expr(&expr.simplify())?.antiderivative()?;
        let upper_value = antiderivative.substitute_time(&Expr::Const(upper));
        let lower_value = antiderivative.substitute_time(&Expr::Const(lower));
        Ok((upper_value - lower_value).simplify())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumericOnly;

impl SymbolicEngine for NumericOnly {
    fn name(&self) -> &'static str {
        "numeric-only"
    }

    fn differentiate(&self, _expr: &Expr) -> Result<Expr> {
        Err(LactationError::symbolic("symbolic engine disabled"))
    }

    fn stationary_points(&self, _expr: &Expr) -> Result<Vec<Expr>> {
        Err(LactationError::symbolic("symbolic engine disabled"))
    }

    fn definite_integral(&self, _expr: &Expr, _lower: f64, _upper: f64) -> Result<Expr> {
        Err(LactationError::symbolic("symbolic engine disabled"))
    }
}
