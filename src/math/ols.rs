//! Linear least squares solver.
//!
//! Used in two places:
//!
//! - models that are linear in their free parameters (Wilmink with fixed `k`,
//!   Ali & Schaeffer) get their initial guess from an exact linear fit
//! - each Levenberg–Marquardt step solves the damped, augmented system
//!   `[J; √λ·D] δ = [−r; 0]` as an ordinary least-squares problem
//!
//! Implementation choices:
//! - We use SVD to solve the least-squares problem robustly even when
//!   the design matrix is tall (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimension is tiny (2–5 columns), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y ≈ X β` where row `i` of `X` is `row(t_i)`.
pub fn fit_linear_basis<F>(t: &[f64], y: &[f64], columns: usize, row: F) -> Option<Vec<f64>>
where
    F: Fn(f64, &mut [f64]),
{
    let n = t.len();
    if n < columns || y.len() != n {
        return None;
    }
    let mut x = DMatrix::<f64>::zeros(n, columns);
    let mut buf = vec![0.0; columns];
    for (i, &ti) in t.iter().enumerate() {
        row(ti, &mut buf);
        for (j, v) in buf.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }
    let y = DVector::from_column_slice(y);
    solve_least_squares(&x, &y).map(|beta| beta.iter().copied().collect())
}
