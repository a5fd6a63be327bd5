//! Symbolic formulas of the lactation models.
//!
//! Each builder returns the same curve as its numeric twin in
//! [`crate::models::model`], with `Param(i)` standing for the i-th parameter
//! in canonical order. Formulas are written as products where the model is a
//! product, which is what the stationary-point solver keys on.

use crate::models::model::ALI_SCHAEFFER_DAYS;
use crate::symbolic::Expr;

fn t() -> Expr {
    Expr::t()
}

fn p(i: usize) -> Expr {
    Expr::param(i)
}

pub fn wood() -> Expr {
    p(0) * t().pow(p(1)) * (-(p(2) * t())).exp()
}

pub fn wilmink() -> Expr {
    p(0) + p(1) * t() + p(2) * (p(3) * t()).exp()
}

pub fn ali_schaeffer() -> Expr {
    let s = t() / ALI_SCHAEFFER_DAYS;
    let l = (ALI_SCHAEFFER_DAYS / t()).ln();
    p(0) + p(1) * s.clone() + p(2) * s.powi(2) + p(3) * l.clone() + p(4) * l.powi(2)
}

pub fn fischer() -> Expr {
    p(0) - p(1) * t() - p(0) * (-(p(2) * t())).exp()
}

pub fn milkbot() -> Expr {
    p(0) * (1.0 - 0.5 * ((p(2) - t()) / p(1)).exp()) * (-(p(3) * t())).exp()
}

pub fn brody() -> Expr {
    p(0) * (-(p(1) * t())).exp()
}

pub fn sikka() -> Expr {
    p(0) * (p(1) * t() - p(2) * t().powi(2)).exp()
}

pub fn nelder() -> Expr {
    t() / (p(0) + p(1) * t() + p(2) * t().powi(2))
}

pub fn dhanoa() -> Expr {
    p(0) * t().pow(p(1) * p(2)) * (-(p(2) * t())).exp()
}

pub fn emmans() -> Expr {
    p(0) * (-(p(3) - p(1) * t()).exp()).exp() * (-(p(2) * t())).exp()
}

pub fn hayashi() -> Expr {
    p(1) * ((-t() / p(2)).exp() - (-t() / (p(0) * p(2))).exp())
}

pub fn rook() -> Expr {
    p(0) / (1.0 + p(1) / (p(2) + t())) * (-(p(3) * t())).exp()
}

pub fn dijkstra() -> Expr {
    p(0) * (p(1) * (1.0 - (-(p(2) * t())).exp()) / p(2) - p(3) * t()).exp()
}

pub fn prasad() -> Expr {
    p(0) + p(1) * t() + p(2) * t().powi(2) + p(3) / t()
}
