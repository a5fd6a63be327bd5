//! Static registry of model descriptors.
//!
//! The registry is indexed by [`ModelKind`] discriminant and never mutated.

use crate::domain::{LactationRecord, ModelKind};
use crate::math::Bounds;
use crate::models::{formula, heuristics, model};
use crate::symbolic::Expr;

/// How a model is fitted by the frequentist fitter.
#[derive(Debug, Clone, Copy)]
pub struct FitProfile {
    pub initial_guess: fn(&LactationRecord) -> Vec<f64>,
    /// Box constraints; a degenerate interval holds the parameter fixed.
    pub bounds: fn(&LactationRecord) -> Vec<Bounds>,
}

/// Immutable description of one lactation model.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// Parameter names in canonical order.
    pub params: &'static [&'static str],
    pub function: fn(f64, &[f64]) -> f64,
    pub formula: fn() -> Expr,
    pub fitting: Option<FitProfile>,
}

impl ModelSpec {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn evaluate(&self, t: f64, params: &[f64]) -> f64 {
        (self.function)(t, params)
    }

    pub fn build_formula(&self) -> Expr {
        (self.formula)()
    }

    pub fn is_fittable(&self) -> bool {
        self.fitting.is_some()
    }
}

const fn profile(
    initial_guess: fn(&LactationRecord) -> Vec<f64>,
    bounds: fn(&LactationRecord) -> Vec<Bounds>,
) -> Option<FitProfile> {
    Some(FitProfile { initial_guess, bounds })
}

static REGISTRY: [ModelSpec; 14] = [
    ModelSpec {
        kind: ModelKind::Wood,
        params: &["a", "b", "c"],
        function: model::wood,
        formula: formula::wood,
        fitting: profile(heuristics::wood_guess, heuristics::wood_bounds),
    },
    ModelSpec {
        kind: ModelKind::Wilmink,
        params: &["a", "b", "c", "k"],
        function: model::wilmink,
        formula: formula::wilmink,
        fitting: profile(heuristics::wilmink_guess, heuristics::wilmink_bounds),
    },
    ModelSpec {
        kind: ModelKind::AliSchaeffer,
        params: &["a", "b", "c", "d", "k"],
        function: model::ali_schaeffer,
        formula: formula::ali_schaeffer,
        fitting: profile(heuristics::ali_schaeffer_guess, heuristics::ali_schaeffer_bounds),
    },
    ModelSpec {
        kind: ModelKind::Fischer,
        params: &["a", "b", "c"],
        function: model::fischer,
        formula: formula::fischer,
        fitting: profile(heuristics::fischer_guess, heuristics::fischer_bounds),
    },
    ModelSpec {
        kind: ModelKind::Milkbot,
        params: &["a", "b", "c", "d"],
        function: model::milkbot,
        formula: formula::milkbot,
        fitting: profile(heuristics::milkbot_guess, heuristics::milkbot_bounds),
    },
    ModelSpec {
        kind: ModelKind::Brody,
        params: &["a", "k"],
        function: model::brody,
        formula: formula::brody,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Sikka,
        params: &["a", "b", "c"],
        function: model::sikka,
        formula: formula::sikka,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Nelder,
        params: &["a", "b", "c"],
        function: model::nelder,
        formula: formula::nelder,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Dhanoa,
        params: &["a", "b", "c"],
        function: model::dhanoa,
        formula: formula::dhanoa,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Emmans,
        params: &["a", "b", "c", "d"],
        function: model::emmans,
        formula: formula::emmans,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Hayashi,
        params: &["a", "b", "c"],
        function: model::hayashi,
        formula: formula::hayashi,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Rook,
        params: &["a", "b", "c", "d"],
        function: model::rook,
        formula: formula::rook,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Dijkstra,
        params: &["a", "b", "c", "d"],
        function: model::dijkstra,
        formula: formula::dijkstra,
        fitting: None,
    },
    ModelSpec {
        kind: ModelKind::Prasad,
        params: &["a", "b", "c", "d"],
        function: model::prasad,
        formula: formula::prasad,
        fitting: None,
    },
];

/// Descriptor for `kind`.
pub fn spec(kind: ModelKind) -> &'static ModelSpec {
    &REGISTRY[kind as usize]
}

pub fn all_specs() -> &'static [ModelSpec] {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typical_params(kind: ModelKind) -> Vec<f64> {
        match kind {
            ModelKind::Wood => vec![30.0, 0.2, 0.003],
            ModelKind::Wilmink => vec![35.0, -0.05, -15.0, model::WILMINK_K],
            ModelKind::AliSchaeffer => vec![30.0, -10.0, 2.0, 3.0, -1.0],
            ModelKind::Fischer => vec![35.0, 0.05, 0.1],
            ModelKind::Milkbot => vec![40.0, 20.0, -0.7, 0.003],
            ModelKind::Brody => vec![35.0, 0.002],
            ModelKind::Sikka => vec![20.0, 0.01, 3e-5],
            ModelKind::Nelder => vec![0.5, 0.03, 1e-4],
            ModelKind::Dhanoa => vec![20.0, 30.0, 0.005],
            ModelKind::Emmans => vec![40.0, 0.1, 0.002, 1.0],
            ModelKind::Hayashi => vec![0.2, 40.0, 300.0],
            ModelKind::Rook => vec![40.0, 5.0, 2.0, 0.002],
            ModelKind::Dijkstra => vec![20.0, 0.05, 0.05, 0.003],
            ModelKind::Prasad => vec![20.0, 0.1, -3e-4, -5.0],
        }
    }

    #[test]
    fn registry_is_indexed_by_kind() {
        for kind in ModelKind::ALL {
            assert_eq!(spec(kind).kind, kind);
        }
        assert_eq!(all_specs().len(), ModelKind::ALL.len());
    }

    #[test]
    fn fittable_flags_agree_with_kind() {
        for s in all_specs() {
            assert_eq!(s.is_fittable(), s.kind.is_fittable(), "{}", s.kind);
        }
    }

    #[test]
    fn formula_matches_function_for_every_model() {
        for s in all_specs() {
            let params = typical_params(s.kind);
            assert_eq!(params.len(), s.arity());
            let formula = s.build_formula();
            for day in [1.0, 17.0, 60.0, 150.0, 305.0] {
                let numeric = s.evaluate(day, &params);
                let symbolic = formula.eval(day, &params);
                assert!(
                    (numeric - symbolic).abs() <= 1e-9 * numeric.abs().max(1.0),
                    "{} at {day}: {numeric} vs {symbolic}",
                    s.kind
                );
                assert_eq!(numeric, model::evaluate(s.kind, day, &params));
            }
        }
    }

    #[test]
    fn formula_params_match_arity() {
        for s in all_specs() {
            let used = s.build_formula().params();
            assert_eq!(used.len(), s.arity(), "{}", s.kind);
        }
    }
}
