//! Stationary points of a model formula.
//!
//! The equation `dy/dt = 0` is first reduced through the logarithmic
//! derivative. For `y = K · f^p · Π exp(g_i) · t^e`, and with `f ≠ 0`,
//!
//! ```text
//! y' = 0  ⇔  p·f' + f·(Σ g_i' + e/t) = 0
//! ```
//!
//! which removes the positive factors that would otherwise hide the root. The
//! reduced equation is expanded into the exponential-polynomial normal form
//! and solved when it is either
//!
//! - a polynomial in `t` of degree ≤ 2 (one common exponential rate), or
//! - a two-rate sum `A·e^(p·t) + B·e^(q·t)` with a common power of `t`.
//!
//! Everything else is reported as a `SymbolicDerivation` error so the caller
//! can fall back to a grid search.

use crate::error::{LactationError, Result};
use crate::symbolic::Expr;
use crate::symbolic::normal_form::{ExpSum, Term};

/// Candidate roots of `dy/dt = 0`, as time-free expressions.
///
/// Candidates are not filtered: admissibility (`0 < t ≤ L`, `y'' < 0`) depends
/// on parameter values and is checked at evaluation time.
pub fn stationary_points(formula: &Expr) -> Result<Vec<Expr>> {
    let equation = stationary_equation(&formula.simplify())?;
    let sum = ExpSum::from_expr(&equation)?;
    if sum.terms.is_empty() {
        return Err(LactationError::symbolic("derivative vanishes identically"));
    }
    let roots = solve_normal_form(&sum)?;
    Ok(roots.into_iter().map(|r| r.simplify()).collect())
}

fn stationary_equation(formula: &Expr) -> Result<Expr> {
    let factors: Vec<Expr> = match formula {
        Expr::Mul(xs) => xs.clone(),
        other => vec![other.clone()],
    };

    let mut log_terms = Vec::new();
    let mut others: Vec<(Expr, Expr)> = Vec::new();
    for factor in factors.into_iter().filter(Expr::depends_on_time) {
        match factor {
            Expr::Exp(g) => log_terms.push(g.diff()),
            Expr::Time => log_terms.push(Expr::t().recip()),
            Expr::Pow(base, exponent) if !exponent.depends_on_time() => {
                if *base == Expr::Time {
                    log_terms.push(*exponent * Expr::t().recip());
                } else {
                    others.push((*base, *exponent));
                }
            }
            other => others.push((other, Expr::Const(1.0))),
        }
    }

    let log_sum = Expr::Add(log_terms);
    match others.as_slice() {
        [] => Ok(log_sum.simplify()),
        [(f, p)] => Ok((p.clone() * f.diff() + f.clone() * log_sum).simplify()),
        _ => Err(LactationError::symbolic(
            "more than one non-exponential factor depends on t",
        )),
    }
}

fn solve_normal_form(sum: &ExpSum) -> Result<Vec<Expr>> {
    let mut rate_groups: Vec<(String, Vec<&Term>)> = Vec::new();
    for term in &sum.terms {
        if term.log_pow != 0 {
            return Err(LactationError::symbolic("logarithmic terms in the stationary equation"));
        }
        let key = term.rate_key();
        match rate_groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, terms)) => terms.push(term),
            None => rate_groups.push((key, vec![term])),
        }
    }

    match rate_groups.as_slice() {
        [(_, terms)] => solve_polynomial(terms),
        [(_, first), (_, second)] => solve_two_rates(first, second),
        _ => Err(LactationError::symbolic(format!(
            "{} distinct exponential rates",
            rate_groups.len()
        ))),
    }
}

/// Roots of Σ c_n t^n after dividing out the common exponential factor.
fn solve_polynomial(terms: &[&Term]) -> Result<Vec<Expr>> {
    let min_pow = terms.iter().map(|t| t.t_pow).min().unwrap_or(0);
    let max_pow = terms.iter().map(|t| t.t_pow).max().unwrap_or(0);
    let coefficient = |power: i32| -> Expr {
        let coefs: Vec<Expr> = terms
            .iter()
            .filter(|t| t.t_pow == power)
            .map(|t| t.coef.clone())
            .collect();
        Expr::Add(coefs).simplify()
    };

    match max_pow - min_pow {
        0 => Err(LactationError::symbolic("no stationary point (derivative never vanishes)")),
        1 => {
            let c0 = coefficient(min_pow);
            let c1 = coefficient(min_pow + 1);
            Ok(vec![-c0 / c1])
        }
        2 => {
            let c = coefficient(min_pow);
            let b = coefficient(min_pow + 1);
            let a = coefficient(min_pow + 2);
            let disc = (b.clone().powi(2) - 4.0 * a.clone() * c).sqrt();
            let denom = 2.0 * a;
            Ok(vec![
                (-b.clone() + disc.clone()) / denom.clone(),
                (-b - disc) / denom,
            ])
        }
        degree => Err(LactationError::symbolic(format!(
            "polynomial stationary equation of degree {degree}"
        ))),
    }
}

/// `A·e^(p t) + B·e^(q t) = 0` ⇒ `t = ln(−A/B) / (q − p)`.
fn solve_two_rates(first: &[&Term], second: &[&Term]) -> Result<Vec<Expr>> {
    let t_pow = first[0].t_pow;
    if first.iter().chain(second).any(|t| t.t_pow != t_pow) {
        return Err(LactationError::symbolic("mixed powers of t across exponential rates"));
    }
    let a = Expr::Add(first.iter().map(|t| t.coef.clone()).collect()).simplify();
    let b = Expr::Add(second.iter().map(|t| t.coef.clone()).collect()).simplify();
    let p = first[0].rate_or_zero();
    let q = second[0].rate_or_zero();
    Ok(vec![(-a / b).ln() / (q - p)])
}
