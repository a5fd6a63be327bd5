//! Frequentist fitting of a single lactation model.
//!
//! Given a validated [`LactationRecord`] and a fittable [`ModelKind`] we:
//! - build the initial guess and bounds from the model's fit profile
//! - clamp the guess into the box
//! - minimize the sum of squared residuals with bounded Levenberg–Marquardt
//!
//! and return the parameters in canonical order together with fit statistics.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{FittedParameters, LactationRecord, ModelKind};
use crate::error::{LactationError, Result};
use crate::math::{Bounds, LmSettings, minimize_bounded};
use crate::models::{self, ModelSpec, spec};

/// Optimizer options shared by every fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Iteration cap; running out is a fit error.
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        let solver = LmSettings::default();
        Self {
            max_iterations: solver.max_iterations,
            ftol: solver.ftol,
            xtol: solver.xtol,
            gtol: solver.gtol,
        }
    }
}

impl FitOptions {
    pub fn solver_settings(&self) -> LmSettings {
        LmSettings {
            max_iterations: self.max_iterations,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            ..LmSettings::default()
        }
    }
}

/// Best fit for a single model kind.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub params: FittedParameters,
    pub sse: f64,
    /// SSE at the clamped initial guess.
    pub initial_sse: f64,
    pub rmse: f64,
    pub iterations: usize,
}

/// Fit `model` with default options and return its parameters.
pub fn fit(record: &LactationRecord, model: ModelKind) -> Result<FittedParameters> {
    fit_model(record, model, &FitOptions::default()).map(|f| f.params)
}

/// Fit `model` and keep the fit statistics.
pub fn fit_model(record: &LactationRecord, model: ModelKind, opts: &FitOptions) -> Result<ModelFit> {
    let spec = spec(model);
    let Some(profile) = spec.fitting else {
        return Err(LactationError::validation(format!(
            "Model '{}' cannot be fitted; choose one of: {}",
            model.name(),
            fittable_names()
        )));
    };

    let guess = (profile.initial_guess)(record);
    let bounds = (profile.bounds)(record);
    fit_bounded(spec, spec.params, record, &guess, &bounds, opts)
}

/// Fit several models against the same record in parallel.
///
/// Results keep the order of `models`.
pub fn fit_many(record: &LactationRecord, models: &[ModelKind], opts: &FitOptions) -> Vec<(ModelKind, Result<ModelFit>)> {
    models
        .par_iter()
        .map(|&model| (model, fit_model(record, model, opts)))
        .collect()
}

/// Fit and evaluate the curve on days `1..=max(305, max observed day)`.
pub fn predict(record: &LactationRecord, model: ModelKind) -> Result<Vec<f64>> {
    predict_with(record, model, &FitOptions::default())
}

pub fn predict_with(record: &LactationRecord, model: ModelKind, opts: &FitOptions) -> Result<Vec<f64>> {
    let fit = fit_model(record, model, opts)?;
    Ok(models::evaluate_days(model, record.horizon(), &fit.params.values()))
}

/// `Σ (y(t_i) − y_i)²` for the given parameter vector.
pub fn residual_sum_of_squares(model: ModelKind, record: &LactationRecord, params: &[f64]) -> f64 {
    let f = spec(model).function;
    record
        .days()
        .iter()
        .zip(record.yields())
        .map(|(&d, &y)| {
            let r = f(d as f64, params) - y;
            r * r
        })
        .sum()
}

/// Shared driver: bounded LM from `guess`, naming the result with `names`.
pub(crate) fn fit_bounded(
    spec: &ModelSpec,
    names: &[&str],
    record: &LactationRecord,
    guess: &[f64],
    bounds: &[Bounds],
    opts: &FitOptions,
) -> Result<ModelFit> {
    let model = spec.kind;
    let free = bounds.iter().filter(|b| b.lower < b.upper).count();
    let n = record.len();
    if n < free {
        return Err(LactationError::fit(format!(
            "{} needs at least {free} observations, got {n}",
            model.display_name()
        )));
    }

    let days = record.days_f64();
    let yields = record.yields();
    let f = spec.function;
    let residuals = |x: &[f64]| -> Vec<f64> {
        days.iter().zip(yields).map(|(&t, &y)| f(t, x) - y).collect()
    };

    let report = minimize_bounded(residuals, guess, bounds, &opts.solver_settings())
        .map_err(|e| LactationError::fit(format!("{}: {e}", model.display_name())))?;

    debug!(
        model = model.name(),
        sse = report.cost,
        initial_sse = report.initial_cost,
        iterations = report.iterations,
        "model fitted"
    );

    Ok(ModelFit {
        model,
        params: FittedParameters::new(model, names.iter().copied(), &report.x)?,
        sse: report.cost,
        initial_sse: report.initial_cost,
        rmse: (report.cost / n as f64).sqrt(),
        iterations: report.iterations,
    })
}

fn fittable_names() -> String {
    ModelKind::FITTABLE
        .iter()
        .map(|m| m.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sampled_days() -> Vec<u32> {
        (0..10).map(|i| 5 + 30 * i).collect()
    }

    fn exact_record(model: ModelKind, params: &[f64]) -> LactationRecord {
        let days = sampled_days();
        let yields = days.iter().map(|&d| models::evaluate(model, d as f64, params)).collect();
        LactationRecord::new(days, yields).unwrap()
    }

    fn noisy_record(seed: u64) -> LactationRecord {
        let mut rng = StdRng::seed_from_u64(seed);
        let days = sampled_days();
        let yields = days
            .iter()
            .map(|&d| (models::milkbot(d as f64, &[40.0, 20.0, -0.7, 0.003]) + rng.gen_range(-1.0..1.0)).max(0.0))
            .collect();
        LactationRecord::new(days, yields).unwrap()
    }

    #[test]
    fn wood_fit_reproduces_exact_data() {
        let record = exact_record(ModelKind::Wood, &[30.0, 0.2, 0.003]);
        let fit = fit_model(&record, ModelKind::Wood, &FitOptions::default()).unwrap();
        assert!(fit.sse < 1e-6, "sse = {}", fit.sse);
        assert_eq!(fit.params.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn every_fittable_model_improves_on_its_guess() {
        let record = noisy_record(7);
        for (model, result) in fit_many(&record, &ModelKind::FITTABLE, &FitOptions::default()) {
            let fit = result.unwrap();
            assert_eq!(fit.model, model);
            assert!(fit.sse <= fit.initial_sse, "{model}");
            assert!(fit.rmse.is_finite());
            assert_eq!(fit.params.len(), spec(model).arity());
        }
    }

    #[test]
    fn wilmink_keeps_k_fixed() {
        let params = fit(&noisy_record(3), ModelKind::Wilmink).unwrap();
        assert_eq!(params.get("k"), Some(models::WILMINK_K));
    }

    #[test]
    fn wilmink_fits_three_points_exactly() {
        let record = LactationRecord::new(vec![20, 120, 250], vec![30.0, 32.0, 20.0]).unwrap();
        let fit = fit_model(&record, ModelKind::Wilmink, &FitOptions::default()).unwrap();
        assert!(fit.sse < 1e-8, "sse = {}", fit.sse);
        assert_eq!(fit.params.get("k"), Some(models::WILMINK_K));
        assert_eq!(predict(&record, ModelKind::Wilmink).unwrap().len(), 305);
    }

    #[test]
    fn milkbot_fit_is_close_to_truth_rmse() {
        let fit = fit_model(&noisy_record(11), ModelKind::Milkbot, &FitOptions::default()).unwrap();
        // Uniform noise on [-1, 1] has RMS ≈ 0.58.
        assert!(fit.rmse < 1.5, "rmse = {}", fit.rmse);
    }

    #[test]
    fn predict_covers_horizon_and_matches_model() {
        let record = noisy_record(5);
        let params = fit(&record, ModelKind::Wood).unwrap();
        let curve = predict(&record, ModelKind::Wood).unwrap();
        assert_eq!(curve.len(), 305);
        assert_eq!(curve[99], models::wood(100.0, &params.values()));
    }

    #[test]
    fn predict_extends_past_standard_length() {
        let record = LactationRecord::new(vec![10, 100, 200, 330], vec![25.0, 30.0, 22.0, 15.0]).unwrap();
        assert_eq!(predict(&record, ModelKind::Fischer).unwrap().len(), 330);
    }

    #[test]
    fn non_fittable_model_is_a_validation_error() {
        let err = fit(&noisy_record(1), ModelKind::Brody).unwrap_err();
        assert!(matches!(err, LactationError::Validation(_)));
        assert!(err.to_string().contains("wood"));
    }

    #[test]
    fn too_few_points_is_a_fit_error() {
        let record = LactationRecord::new(vec![10, 60], vec![25.0, 30.0]).unwrap();
        let err = fit(&record, ModelKind::Milkbot).unwrap_err();
        assert!(matches!(err, LactationError::Fit(_)));
    }

    #[test]
    fn rss_is_zero_at_generating_parameters() {
        let truth = [30.0, 0.2, 0.003];
        let record = exact_record(ModelKind::Wood, &truth);
        assert!(residual_sum_of_squares(ModelKind::Wood, &record, &truth) < 1e-20);
    }
}
