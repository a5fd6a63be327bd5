//! Expression trees over one time symbol and indexed parameter symbols.
//!
//! Subtraction, negation and division are encoded with `Add`, `Mul` and `Pow`
//! (`a - b = a + (-1)·b`, `a / b = a·b^-1`) so that differentiation and
//! simplification only deal with five node kinds.

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// Day in milk.
    Time,
    /// Index into the model's ordered parameter list.
    Param(usize),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Exp(Box<Expr>),
    Ln(Box<Expr>),
}

impl Expr {
    pub fn t() -> Expr {
        Expr::Time
    }

    pub fn param(index: usize) -> Expr {
        Expr::Param(index)
    }

    pub fn constant(value: f64) -> Expr {
        Expr::Const(value)
    }

    pub fn exp(self) -> Expr {
        Expr::Exp(Box::new(self))
    }

    pub fn ln(self) -> Expr {
        Expr::Ln(Box::new(self))
    }

    pub fn pow(self, exponent: Expr) -> Expr {
        Expr::Pow(Box::new(self), Box::new(exponent))
    }

    pub fn powi(self, n: i32) -> Expr {
        self.pow(Expr::Const(n as f64))
    }

    pub fn recip(self) -> Expr {
        self.powi(-1)
    }

    pub fn sqrt(self) -> Expr {
        self.pow(Expr::Const(0.5))
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_const(&self, value: f64) -> bool {
        self.as_const() == Some(value)
    }

    pub fn depends_on_time(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) => false,
            Expr::Time => true,
            Expr::Add(xs) | Expr::Mul(xs) => xs.iter().any(Expr::depends_on_time),
            Expr::Pow(b, e) => b.depends_on_time() || e.depends_on_time(),
            Expr::Exp(x) | Expr::Ln(x) => x.depends_on_time(),
        }
    }

    /// Parameter indices referenced by the expression, ascending.
    pub fn params(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expr::Const(_) | Expr::Time => {}
            Expr::Param(i) => {
                out.insert(*i);
            }
            Expr::Add(xs) | Expr::Mul(xs) => xs.iter().for_each(|x| x.collect_params(out)),
            Expr::Pow(b, e) => {
                b.collect_params(out);
                e.collect_params(out);
            }
            Expr::Exp(x) | Expr::Ln(x) => x.collect_params(out),
        }
    }

    /// Tree-walking evaluation. Missing parameters evaluate to NaN.
    pub fn eval(&self, t: f64, params: &[f64]) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Time => t,
            Expr::Param(i) => params.get(*i).copied().unwrap_or(f64::NAN),
            Expr::Add(xs) => xs.iter().map(|x| x.eval(t, params)).sum(),
            Expr::Mul(xs) => xs.iter().map(|x| x.eval(t, params)).product(),
            Expr::Pow(b, e) => b.eval(t, params).powf(e.eval(t, params)),
            Expr::Exp(x) => x.eval(t, params).exp(),
            Expr::Ln(x) => x.eval(t, params).ln(),
        }
    }

    /// Replace every occurrence of the time symbol with `value`.
    pub fn substitute_time(&self, value: &Expr) -> Expr {
        match self {
            Expr::Time => value.clone(),
            Expr::Const(_) | Expr::Param(_) => self.clone(),
            Expr::Add(xs) => Expr::Add(xs.iter().map(|x| x.substitute_time(value)).collect()),
            Expr::Mul(xs) => Expr::Mul(xs.iter().map(|x| x.substitute_time(value)).collect()),
            Expr::Pow(b, e) => b.substitute_time(value).pow(e.substitute_time(value)),
            Expr::Exp(x) => x.substitute_time(value).exp(),
            Expr::Ln(x) => x.substitute_time(value).ln(),
        }
    }

    /// Derivative with respect to time, simplified.
    pub fn diff(&self) -> Expr {
        self.diff_raw().simplify()
    }

    fn diff_raw(&self) -> Expr {
        if !self.depends_on_time() {
            return Expr::Const(0.0);
        }
        match self {
            Expr::Const(_) | Expr::Param(_) => Expr::Const(0.0),
            Expr::Time => Expr::Const(1.0),
            Expr::Add(xs) => Expr::Add(xs.iter().map(Expr::diff_raw).collect()),
            Expr::Mul(xs) => {
                // Product rule: Σ_i f_i' Π_{j≠i} f_j
                let terms = xs
                    .iter()
                    .enumerate()
                    .filter(|(_, x)| x.depends_on_time())
                    .map(|(i, x)| {
                        let mut factors = Vec::with_capacity(xs.len());
                        factors.push(x.diff_raw());
                        factors.extend(xs.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, f)| f.clone()));
                        Expr::Mul(factors)
                    })
                    .collect();
                Expr::Add(terms)
            }
            Expr::Pow(b, e) => {
                let (b, e) = (b.as_ref(), e.as_ref());
                if !e.depends_on_time() {
                    // e·b^(e-1)·b'
                    Expr::Mul(vec![
                        e.clone(),
                        b.clone().pow(Expr::Add(vec![e.clone(), Expr::Const(-1.0)])),
                        b.diff_raw(),
                    ])
                } else if !b.depends_on_time() {
                    Expr::Mul(vec![self.clone(), b.clone().ln(), e.diff_raw()])
                } else {
                    // b^e·(e'·ln b + e·b'/b)
                    Expr::Mul(vec![
                        self.clone(),
                        Expr::Add(vec![
                            Expr::Mul(vec![e.diff_raw(), b.clone().ln()]),
                            Expr::Mul(vec![e.clone(), b.diff_raw(), b.clone().recip()]),
                        ]),
                    ])
                }
            }
            Expr::Exp(x) => Expr::Mul(vec![self.clone(), x.diff_raw()]),
            Expr::Ln(x) => Expr::Mul(vec![x.diff_raw(), x.as_ref().clone().recip()]),
        }
    }

    /// Algebraic clean-up: flattening, constant folding, like-term and
    /// like-base collection, and the `exp`/`ln` identities.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Time | Expr::Param(_) => self.clone(),
            Expr::Add(xs) => simplify_add(xs.iter().map(Expr::simplify).collect()),
            Expr::Mul(xs) => simplify_mul(xs.iter().map(Expr::simplify).collect()),
            Expr::Pow(b, e) => simplify_pow(b.simplify(), e.simplify()),
            Expr::Exp(x) => match x.simplify() {
                Expr::Const(v) => Expr::Const(v.exp()),
                Expr::Ln(inner) => *inner,
                other => other.exp(),
            },
            Expr::Ln(x) => match x.simplify() {
                Expr::Const(v) if v > 0.0 => Expr::Const(v.ln()),
                Expr::Exp(inner) => *inner,
                other => other.ln(),
            },
        }
    }

    /// Render with the given parameter names (falls back to `p{i}`).
    pub fn render(&self, names: &[&str]) -> String {
        let mut out = String::new();
        self.write_into(&mut out, names);
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_) => 1,
            Expr::Mul(_) => 2,
            Expr::Pow(..) => 3,
            Expr::Const(v) if *v < 0.0 => 1,
            _ => 4,
        }
    }

    fn write_child(&self, out: &mut String, names: &[&str], min_prec: u8) {
        if self.precedence() < min_prec {
            out.push('(');
            self.write_into(out, names);
            out.push(')');
        } else {
            self.write_into(out, names);
        }
    }

    fn write_into(&self, out: &mut String, names: &[&str]) {
        match self {
            Expr::Const(v) => out.push_str(&format!("{v}")),
            Expr::Time => out.push('t'),
            Expr::Param(i) => match names.get(*i) {
                Some(name) => out.push_str(name),
                None => out.push_str(&format!("p{i}")),
            },
            Expr::Add(xs) => {
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" + ");
                    }
                    x.write_child(out, names, 1);
                }
            }
            Expr::Mul(xs) => {
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        out.push('*');
                    }
                    x.write_child(out, names, 3);
                }
            }
            Expr::Pow(b, e) => {
                b.write_child(out, names, 4);
                out.push('^');
                e.write_child(out, names, 4);
            }
            Expr::Exp(x) => {
                out.push_str("exp(");
                x.write_into(out, names);
                out.push(')');
            }
            Expr::Ln(x) => {
                out.push_str("ln(");
                x.write_into(out, names);
                out.push(')');
            }
        }
    }
}

fn split_coefficient(term: Expr) -> (f64, Expr) {
    match term {
        Expr::Const(v) => (v, Expr::Const(1.0)),
        Expr::Mul(mut xs) if matches!(xs.first(), Some(Expr::Const(_))) => {
            let c = xs.remove(0).as_const().unwrap_or(1.0);
            let rest = if xs.len() == 1 { xs.remove(0) } else { Expr::Mul(xs) };
            (c, rest)
        }
        other => (1.0, other),
    }
}

fn with_coefficient(c: f64, rest: Expr) -> Expr {
    if rest.is_const(1.0) {
        return Expr::Const(c);
    }
    if c == 1.0 {
        return rest;
    }
    match rest {
        Expr::Mul(mut xs) => {
            xs.insert(0, Expr::Const(c));
            Expr::Mul(xs)
        }
        other => Expr::Mul(vec![Expr::Const(c), other]),
    }
}

fn simplify_add(xs: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(xs.len());
    for x in xs {
        match x {
            Expr::Add(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut constant = 0.0;
    let mut collected: Vec<(Expr, f64)> = Vec::new();
    for term in flat {
        if let Expr::Const(v) = term {
            constant += v;
            continue;
        }
        let (c, rest) = split_coefficient(term);
        match collected.iter_mut().find(|(r, _)| *r == rest) {
            Some((_, acc)) => *acc += c,
            None => collected.push((rest, c)),
        }
    }

    let mut out: Vec<Expr> = collected
        .into_iter()
        .filter(|(_, c)| *c != 0.0)
        .map(|(rest, c)| with_coefficient(c, rest))
        .collect();
    if constant != 0.0 {
        out.push(Expr::Const(constant));
    }
    match out.len() {
        0 => Expr::Const(0.0),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

fn simplify_mul(xs: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(xs.len());
    for x in xs {
        match x {
            Expr::Mul(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut coefficient = 1.0;
    let mut bases: Vec<(Expr, Vec<Expr>)> = Vec::new();
    for factor in flat {
        let (base, exponent) = match factor {
            Expr::Const(v) => {
                coefficient *= v;
                continue;
            }
            Expr::Pow(b, e) => (*b, *e),
            other => (other, Expr::Const(1.0)),
        };
        match bases.iter_mut().find(|(b, _)| *b == base) {
            Some((_, exps)) => exps.push(exponent),
            None => bases.push((base, vec![exponent])),
        }
    }

    if coefficient == 0.0 {
        return Expr::Const(0.0);
    }

    let mut out = Vec::with_capacity(bases.len() + 1);
    for (base, exps) in bases {
        let exponent = if exps.len() == 1 {
            exps.into_iter().next().unwrap_or(Expr::Const(1.0))
        } else {
            simplify_add(exps)
        };
        match simplify_pow(base, exponent) {
            Expr::Const(v) => coefficient *= v,
            Expr::Mul(inner) => out.extend(inner),
            other => out.push(other),
        }
    }

    if coefficient != 1.0 || out.is_empty() {
        out.insert(0, Expr::Const(coefficient));
    }
    match out.len() {
        1 => out.remove(0),
        _ => Expr::Mul(out),
    }
}

fn simplify_pow(base: Expr, exponent: Expr) -> Expr {
    if exponent.is_const(0.0) || base.is_const(1.0) {
        return Expr::Const(1.0);
    }
    if exponent.is_const(1.0) {
        return base;
    }
    match (base, exponent) {
        (Expr::Const(b), Expr::Const(e)) => Expr::Const(b.powf(e)),
        (Expr::Exp(x), e) => simplify_mul(vec![*x, e]).exp().simplify(),
        (Expr::Pow(inner, e1), Expr::Const(e2)) if e2.fract() == 0.0 => {
            simplify_pow(*inner, simplify_mul(vec![*e1, Expr::Const(e2)]))
        }
        (b, e) => b.pow(e),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&[]))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl<R: Into<Expr>> ops::Add<R> for Expr {
    type Output = Expr;
    fn add(self, rhs: R) -> Expr {
        Expr::Add(vec![self, rhs.into()])
    }
}

impl<R: Into<Expr>> ops::Sub<R> for Expr {
    type Output = Expr;
    fn sub(self, rhs: R) -> Expr {
        Expr::Add(vec![self, -rhs.into()])
    }
}

impl<R: Into<Expr>> ops::Mul<R> for Expr {
    type Output = Expr;
    fn mul(self, rhs: R) -> Expr {
        Expr::Mul(vec![self, rhs.into()])
    }
}

impl<R: Into<Expr>> ops::Div<R> for Expr {
    type Output = Expr;
    fn div(self, rhs: R) -> Expr {
        Expr::Mul(vec![self, rhs.into().recip()])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Mul(vec![Expr::Const(-1.0), self])
    }
}

impl ops::Add<Expr> for f64 {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::Const(self) + rhs
    }
}

impl ops::Sub<Expr> for f64 {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::Const(self) - rhs
    }
}

impl ops::Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::Const(self) * rhs
    }
}

impl ops::Div<Expr> for f64 {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::Const(self) / rhs
    }
}
