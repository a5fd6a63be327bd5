//! Bounded nonlinear least squares (projected Levenberg–Marquardt).
//!
//! Minimizes `Σ r_i(x)²` subject to box constraints `lower ≤ x ≤ upper`.
//!
//! Each iteration:
//! - builds a forward-difference Jacobian `J` (backward at an upper bound)
//! - solves the damped system `[J; √λ·D] δ = [−r; 0]` with the SVD
//!   least-squares routine, where `D` is Marquardt's column scaling
//! - projects `x + δ` back into the box and accepts the step only if the
//!   cost decreases; otherwise `λ` grows and the step is retried
//!
//! The cost therefore never increases relative to the (clamped) starting
//! point.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LactationError, Result};
use crate::math::solve_least_squares;

/// Closed interval constraint for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub const fn new(lower: f64, upper: f64) -> Self {
        Bounds { lower, upper }
    }

    /// A degenerate interval pinning the parameter to `value`.
    pub const fn fixed(value: f64) -> Self {
        Bounds {
            lower: value,
            upper: value,
        }
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.lower).min(self.upper)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iterations: usize,
    /// Relative cost reduction below which an accepted step counts as converged.
    pub ftol: f64,
    /// Relative step size below which an accepted step counts as converged.
    pub xtol: f64,
    /// Projected gradient norm below which the current point is optimal.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostReduction,
    StepSize,
    Gradient,
    /// No damping produces a decrease; the point is a minimum to working precision.
    Stalled,
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub x: Vec<f64>,
    pub cost: f64,
    pub initial_cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

const MAX_LAMBDA: f64 = 1e16;
const MIN_LAMBDA: f64 = 1e-12;

/// Minimize the sum of squared residuals within `bounds`.
///
/// `residuals(x)` must return the same number of residuals for every `x`.
pub fn minimize_bounded<F>(residuals: F, x0: &[f64], bounds: &[Bounds], settings: &LmSettings) -> Result<LmReport>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    if x0.len() != bounds.len() {
        return Err(LactationError::fit(format!(
            "{} starting values for {} bounds",
            x0.len(),
            bounds.len()
        )));
    }
    if let Some(b) = bounds.iter().find(|b| b.lower > b.upper) {
        return Err(LactationError::fit(format!(
            "empty bounds [{}, {}]",
            b.lower, b.upper
        )));
    }

    let mut x: Vec<f64> = x0.iter().zip(bounds).map(|(v, b)| b.clamp(*v)).collect();
    let mut r = residuals(&x);
    if r.iter().any(|v| !v.is_finite()) {
        return Err(LactationError::fit("non-finite residuals at the initial guess"));
    }
    let n = x.len();
    let m = r.len();
    // Fixed parameters take no degrees of freedom.
    let free = bounds.iter().filter(|b| b.lower < b.upper).count();
    if m < free {
        return Err(LactationError::fit(format!(
            "{m} residuals cannot determine {free} free parameters"
        )));
    }

    let initial_cost = sum_of_squares(&r);
    let mut cost = initial_cost;
    let mut lambda = settings.initial_lambda;

    for iteration in 1..=settings.max_iterations {
        let jac = jacobian(&residuals, &x, &r, bounds);
        let gradient = jac.transpose() * DVector::from_column_slice(&r);

        let projected = projected_gradient_norm(&x, gradient.as_slice(), bounds);
        if projected <= settings.gtol {
            return Ok(finish(x, cost, initial_cost, iteration, Termination::Gradient));
        }

        let scale: Vec<f64> = (0..n)
            .map(|j| jac.column(j).norm_squared().max(1e-12))
            .collect();

        loop {
            let Some(delta) = damped_step(&jac, &r, &scale, lambda) else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return Ok(finish(x, cost, initial_cost, iteration, Termination::Stalled));
                }
                continue;
            };

            let candidate: Vec<f64> = x
                .iter()
                .zip(delta.iter())
                .zip(bounds)
                .map(|((xi, di), b)| b.clamp(xi + di))
                .collect();
            let r_new = residuals(&candidate);
            let cost_new = sum_of_squares(&r_new);

            if cost_new.is_finite() && cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                let step = distance(&candidate, &x);
                let size = norm(&candidate);

                x = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(MIN_LAMBDA);

                if reduction <= settings.ftol {
                    return Ok(finish(x, cost, initial_cost, iteration, Termination::CostReduction));
                }
                if step <= settings.xtol * (settings.xtol + size) {
                    return Ok(finish(x, cost, initial_cost, iteration, Termination::StepSize));
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                return Ok(finish(x, cost, initial_cost, iteration, Termination::Stalled));
            }
        }
    }

    Err(LactationError::fit(format!(
        "optimizer did not converge within {} iterations",
        settings.max_iterations
    )))
}

fn finish(x: Vec<f64>, cost: f64, initial_cost: f64, iterations: usize, termination: Termination) -> LmReport {
    debug!(iterations, cost, initial_cost, ?termination, "levenberg-marquardt finished");
    LmReport {
        x,
        cost,
        initial_cost,
        iterations,
        termination,
    }
}

fn jacobian<F>(residuals: &F, x: &[f64], r: &[f64], bounds: &[Bounds]) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r.len();
    let mut jac = DMatrix::<f64>::zeros(m, x.len());
    let mut probe = x.to_vec();
    for j in 0..x.len() {
        if bounds[j].lower == bounds[j].upper {
            continue;
        }
        let mut h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
        if x[j] + h > bounds[j].upper {
            h = -h;
        }
        probe[j] = x[j] + h;
        let shifted = residuals(&probe);
        probe[j] = x[j];
        for i in 0..m {
            let derivative = (shifted.get(i).copied().unwrap_or(f64::NAN) - r[i]) / h;
            jac[(i, j)] = if derivative.is_finite() { derivative } else { 0.0 };
        }
    }
    jac
}

fn damped_step(jac: &DMatrix<f64>, r: &[f64], scale: &[f64], lambda: f64) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jac);
    for j in 0..n {
        a[(m + j, j)] = (lambda * scale[j]).sqrt();
    }
    let mut rhs = DVector::<f64>::zeros(m + n);
    for (i, v) in r.iter().enumerate() {
        rhs[i] = -v;
    }
    solve_least_squares(&a, &rhs)
}

/// Norm of the gradient with components that push against an active bound removed.
fn projected_gradient_norm(x: &[f64], gradient: &[f64], bounds: &[Bounds]) -> f64 {
    x.iter()
        .zip(gradient)
        .zip(bounds)
        .map(|((xi, gi), b)| {
            let blocked_low = *xi <= b.lower && *gi > 0.0;
            let blocked_high = *xi >= b.upper && *gi < 0.0;
            if blocked_low || blocked_high { 0.0 } else { gi * gi }
        })
        .sum::<f64>()
        .sqrt()
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn norm(x: &[f64]) -> f64 {
    sum_of_squares(x).sqrt()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}
