//! Exponential-polynomial normal form.
//!
//! Every closed form we can solve or integrate is a finite sum of terms
//!
//! ```text
//! c · t^n · ln(t)^m · exp(r·t)
//! ```
//!
//! where `c` and `r` are time-free expressions, `n` is an integer and `m` a
//! small natural number. Expansion into this form is where "no closed form"
//! is detected: anything that does not fit (a symbolic power of `t`, the
//! reciprocal of a sum, a non-linear exponent) is rejected with
//! `SymbolicDerivation`.

use crate::error::{LactationError, Result};
use crate::symbolic::Expr;

/// Largest integer power expanded by repeated multiplication.
const MAX_EXPANDED_POWER: f64 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub coef: Expr,
    pub t_pow: i32,
    pub log_pow: u32,
    /// Exponential rate; `None` means `exp(0·t)`.
    pub rate: Option<Expr>,
}

impl Term {
    fn constant(coef: Expr) -> Term {
        Term {
            coef,
            t_pow: 0,
            log_pow: 0,
            rate: None,
        }
    }

    fn mul(&self, other: &Term) -> Term {
        Term {
            coef: Expr::Mul(vec![self.coef.clone(), other.coef.clone()]).simplify(),
            t_pow: self.t_pow + other.t_pow,
            log_pow: self.log_pow + other.log_pow,
            rate: add_rates(self.rate.as_ref(), other.rate.as_ref()),
        }
    }

    fn powi(&self, n: i32) -> Option<Term> {
        if n < 0 && self.log_pow != 0 {
            return None;
        }
        Some(Term {
            coef: self.coef.clone().powi(n).simplify(),
            t_pow: self.t_pow * n,
            log_pow: self.log_pow * n.unsigned_abs(),
            rate: self
                .rate
                .as_ref()
                .map(|r| Expr::Mul(vec![Expr::Const(n as f64), r.clone()]).simplify()),
        })
    }

    /// Grouping key: terms with equal keys differ only in their coefficient.
    fn key(&self) -> (i32, u32, String) {
        let rate = self.rate.as_ref().map(|r| r.to_string()).unwrap_or_default();
        (self.t_pow, self.log_pow, rate)
    }

    pub fn rate_key(&self) -> String {
        self.key().2
    }

    pub fn rate_or_zero(&self) -> Expr {
        self.rate.clone().unwrap_or(Expr::Const(0.0))
    }

    pub fn to_expr(&self) -> Expr {
        let mut factors = vec![self.coef.clone()];
        if self.t_pow != 0 {
            factors.push(Expr::t().powi(self.t_pow));
        }
        if self.log_pow != 0 {
            factors.push(Expr::t().ln().powi(self.log_pow as i32));
        }
        if let Some(rate) = &self.rate {
            factors.push((rate.clone() * Expr::t()).exp());
        }
        Expr::Mul(factors).simplify()
    }
}

fn add_rates(a: Option<&Expr>, b: Option<&Expr>) -> Option<Expr> {
    let sum = match (a, b) {
        (None, None) => return None,
        (Some(r), None) | (None, Some(r)) => r.clone(),
        (Some(x), Some(y)) => Expr::Add(vec![x.clone(), y.clone()]).simplify(),
    };
    if sum.is_const(0.0) { None } else { Some(sum) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpSum {
    pub terms: Vec<Term>,
}

impl ExpSum {
    fn one() -> ExpSum {
        ExpSum {
            terms: vec![Term::constant(Expr::Const(1.0))],
        }
    }

    fn single(term: Term) -> ExpSum {
        ExpSum { terms: vec![term] }
    }

    /// Expand `expr` into the normal form, with like terms collected.
    pub fn from_expr(expr: &Expr) -> Result<ExpSum> {
        Ok(Self::expand(expr)?.collect())
    }

    fn expand(expr: &Expr) -> Result<ExpSum> {
        if !expr.depends_on_time() {
            return Ok(Self::single(Term::constant(expr.clone())));
        }
        match expr {
            Expr::Time => Ok(Self::single(Term {
                coef: Expr::Const(1.0),
                t_pow: 1,
                log_pow: 0,
                rate: None,
            })),
            Expr::Add(xs) => {
                let mut terms = Vec::new();
                for x in xs {
                    terms.extend(Self::expand(x)?.terms);
                }
                Ok(ExpSum { terms })
            }
            Expr::Mul(xs) => {
                let mut acc = Self::one();
                for x in xs {
                    acc = acc.mul(&Self::expand(x)?);
                }
                Ok(acc)
            }
            Expr::Pow(base, exponent) => {
                let n = exponent
                    .as_const()
                    .filter(|v| v.fract() == 0.0 && v.abs() <= MAX_EXPANDED_POWER)
                    .ok_or_else(|| LactationError::symbolic(format!("non-integer power in {expr}")))?
                    as i32;
                if **base == Expr::Time {
                    return Ok(Self::single(Term {
                        coef: Expr::Const(1.0),
                        t_pow: n,
                        log_pow: 0,
                        rate: None,
                    }));
                }
                let inner = Self::from_expr(base)?;
                if n >= 0 {
                    let mut acc = Self::one();
                    for _ in 0..n {
                        acc = acc.mul(&inner);
                    }
                    return Ok(acc);
                }
                match inner.terms.as_slice() {
                    [term] => term
                        .powi(n)
                        .map(Self::single)
                        .ok_or_else(|| LactationError::symbolic(format!("reciprocal of a logarithm in {expr}"))),
                    _ => Err(LactationError::symbolic(format!("reciprocal of a sum in {expr}"))),
                }
            }
            Expr::Exp(arg) => {
                let inner = Self::from_expr(arg)?;
                let (alpha, beta) = inner
                    .linear_parts()
                    .ok_or_else(|| LactationError::symbolic(format!("exponent is not linear in t: {arg}")))?;
                Ok(Self::single(Term {
                    coef: beta.exp().simplify(),
                    t_pow: 0,
                    log_pow: 0,
                    rate: if alpha.is_const(0.0) { None } else { Some(alpha) },
                }))
            }
            Expr::Ln(arg) => {
                let inner = Self::from_expr(arg)?;
                let [term] = inner.terms.as_slice() else {
                    return Err(LactationError::symbolic(format!("logarithm of a sum: {arg}")));
                };
                if term.log_pow != 0 {
                    return Err(LactationError::symbolic(format!("nested logarithm: {arg}")));
                }
                // ln(c·t^n·e^(r·t)) = ln c + n·ln t + r·t
                let mut terms = vec![Term::constant(term.coef.clone().ln().simplify())];
                if term.t_pow != 0 {
                    terms.push(Term {
                        coef: Expr::Const(term.t_pow as f64),
                        t_pow: 0,
                        log_pow: 1,
                        rate: None,
                    });
                }
                if let Some(rate) = &term.rate {
                    terms.push(Term {
                        coef: rate.clone(),
                        t_pow: 1,
                        log_pow: 0,
                        rate: None,
                    });
                }
                Ok(ExpSum { terms })
            }
            Expr::Const(_) | Expr::Param(_) => Ok(Self::single(Term::constant(expr.clone()))),
        }
    }

    fn mul(&self, other: &ExpSum) -> ExpSum {
        let mut terms = Vec::with_capacity(self.terms.len() * other.terms.len());
        for a in &self.terms {
            for b in &other.terms {
                terms.push(a.mul(b));
            }
        }
        ExpSum { terms }
    }

    /// Merge terms with equal `(t_pow, log_pow, rate)`; drop zero coefficients.
    fn collect(self) -> ExpSum {
        let mut groups: Vec<((i32, u32, String), Term, Vec<Expr>)> = Vec::new();
        for term in self.terms {
            let key = term.key();
            match groups.iter_mut().find(|(k, _, _)| *k == key) {
                Some((_, _, coefs)) => coefs.push(term.coef),
                None => {
                    let coef = term.coef.clone();
                    groups.push((key, term, vec![coef]));
                }
            }
        }
        let terms = groups
            .into_iter()
            .filter_map(|(_, mut term, coefs)| {
                term.coef = Expr::Add(coefs).simplify();
                (!term.coef.is_const(0.0)).then_some(term)
            })
            .collect();
        ExpSum { terms }
    }

    /// `(α, β)` when the sum is exactly `α·t + β`.
    fn linear_parts(&self) -> Option<(Expr, Expr)> {
        let mut alpha = Vec::new();
        let mut beta = Vec::new();
        for term in &self.terms {
            if term.rate.is_some() || term.log_pow != 0 {
                return None;
            }
            match term.t_pow {
                0 => beta.push(term.coef.clone()),
                1 => alpha.push(term.coef.clone()),
                _ => return None,
            }
        }
        Some((Expr::Add(alpha).simplify(), Expr::Add(beta).simplify()))
    }

    pub fn to_expr(&self) -> Expr {
        Expr::Add(self.terms.iter().map(Term::to_expr).collect()).simplify()
    }

    /// Antiderivative with respect to time (integration constant omitted).
    pub fn antiderivative(&self) -> Result<Expr> {
        let parts = self
            .terms
            .iter()
            .map(integrate_term)
            .collect::<Result<Vec<_>>>()?;
        Ok(Expr::Add(parts).simplify())
    }
}

fn integrate_term(term: &Term) -> Result<Expr> {
    let t = Expr::t;
    let c = term.coef.clone();
    let n = term.t_pow;
    let unsupported = || {
        LactationError::symbolic(format!(
            "no closed antiderivative for t^{n}·ln(t)^{}·exp(r·t)",
            term.log_pow
        ))
    };

    let body = match (&term.rate, term.log_pow) {
        (None, 0) if n == -1 => t().ln(),
        (None, 0) => t().powi(n + 1) / f64::from(n + 1),
        (None, 1) if n == -1 => t().ln().powi(2) * 0.5,
        (None, 1) => {
            // ∫ t^n ln t = t^k ln t / k − t^k / k², k = n + 1
            let k = f64::from(n + 1);
            t().powi(n + 1) * t().ln() / k - t().powi(n + 1) / (k * k)
        }
        (None, 2) if n == -1 => t().ln().powi(3) / 3.0,
        (None, 2) if n == 0 => t() * t().ln().powi(2) - 2.0 * t() * t().ln() + 2.0 * t(),
        (Some(r), 0) if n >= 0 => {
            // ∫ t^n e^(r t) = e^(r t) Σ_k (-1)^k n!/(n-k)! t^(n-k) / r^(k+1)
            let mut sum = Vec::new();
            let mut falling = 1.0;
            for k in 0..=n {
                if k > 0 {
                    falling *= f64::from(n - k + 1);
                }
                let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                sum.push(sign * falling * t().powi(n - k) * r.clone().powi(-(k + 1)));
            }
            Expr::Add(sum) * (r.clone() * t()).exp()
        }
        _ => return Err(unsupported()),
    };
    Ok((c * body).simplify())
}
