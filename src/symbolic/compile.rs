//! Flattened stack programs for fast repeated evaluation of an [`Expr`].

use crate::symbolic::Expr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Const(f64),
    Time,
    Param(usize),
    Add(usize),
    Mul(usize),
    Pow,
    Exp,
    Ln,
}

/// Postfix program compiled from an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
    arity: usize,
}

impl Program {
    pub fn compile(expr: &Expr) -> Program {
        let mut ops = Vec::new();
        emit(expr, &mut ops);
        let arity = expr.params().iter().next_back().map_or(0, |i| i + 1);
        Program { ops, arity }
    }

    /// Number of parameters the program reads (highest index + 1).
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn eval(&self, t: f64, params: &[f64]) -> f64 {
        let mut stack: Vec<f64> = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let value = match *op {
                Op::Const(v) => v,
                Op::Time => t,
                Op::Param(i) => params.get(i).copied().unwrap_or(f64::NAN),
                Op::Add(n) => {
                    let start = stack.len().saturating_sub(n);
                    stack.drain(start..).sum()
                }
                Op::Mul(n) => {
                    let start = stack.len().saturating_sub(n);
                    stack.drain(start..).product()
                }
                Op::Pow => {
                    let e = stack.pop().unwrap_or(f64::NAN);
                    let b = stack.pop().unwrap_or(f64::NAN);
                    b.powf(e)
                }
                Op::Exp => stack.pop().unwrap_or(f64::NAN).exp(),
                Op::Ln => stack.pop().unwrap_or(f64::NAN).ln(),
            };
            stack.push(value);
        }
        stack.pop().unwrap_or(f64::NAN)
    }

    /// Evaluate a time-free program.
    pub fn eval_params(&self, params: &[f64]) -> f64 {
        self.eval(f64::NAN, params)
    }
}

fn emit(expr: &Expr, ops: &mut Vec<Op>) {
    match expr {
        Expr::Const(v) => ops.push(Op::Const(*v)),
        Expr::Time => ops.push(Op::Time),
        Expr::Param(i) => ops.push(Op::Param(*i)),
        Expr::Add(xs) => {
            xs.iter().for_each(|x| emit(x, ops));
            ops.push(Op::Add(xs.len()));
        }
        Expr::Mul(xs) => {
            xs.iter().for_each(|x| emit(x, ops));
            ops.push(Op::Mul(xs.len()));
        }
        Expr::Pow(b, e) => {
            emit(b, ops);
            emit(e, ops);
            ops.push(Op::Pow);
        }
        Expr::Exp(x) => {
            emit(x, ops);
            ops.push(Op::Exp);
        }
        Expr::Ln(x) => {
            emit(x, ops);
            ops.push(Op::Ln);
        }
    }
}
