//! Characteristic derivation and evaluation.
//!
//! For each `(model, characteristic, lactation length)` the engine derives an
//! evaluator once, through the injected [`SymbolicEngine`], and stores it in
//! the shared [`CharacteristicCache`]:
//!
//! ```text
//! UNRESOLVED ──derive ok──▶ SYMBOLIC_DERIVED ──▶ CACHED
//!      └──derive failed──▶ NUMERIC_FALLBACK ──▶ CACHED
//! ```
//!
//! A symbolic entry can still fall back at evaluation time when the closed
//! form is non-finite or no stationary point is admissible for the given
//! parameters.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bayes::{BayesianFitter, BayesianRequest};
use crate::characteristics::cache::{CacheEntry, CacheKey, CharacteristicCache, Evaluator, Origin};
use crate::characteristics::numeric::{cumulative_yield, grid_time_to_peak};
use crate::characteristics::persistency;
use crate::domain::{Characteristic, FittedParameters, LactationLength, LactationRecord, ModelKind, PersistencyMethod};
use crate::error::{LactationError, Result};
use crate::fit::{FitOptions, fit_model};
use crate::models::{ModelSpec, spec};
use crate::symbolic::{ClosedFormEngine, Expr, Program, SymbolicEngine};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacteristicOptions {
    pub lactation_length: LactationLength,
    pub persistency_method: PersistencyMethod,
    /// Simpson intervals per day for the numeric cumulative yield.
    pub quadrature_steps_per_day: usize,
}

impl Default for CharacteristicOptions {
    fn default() -> Self {
        Self {
            lactation_length: LactationLength::default(),
            persistency_method: PersistencyMethod::default(),
            quadrature_steps_per_day: 20,
        }
    }
}

/// Where the curve parameters come from.
#[derive(Clone, Copy)]
pub enum ParameterSource<'a> {
    /// Fit the record with the frequentist fitter.
    Frequentist,
    Supplied(&'a FittedParameters),
    /// MilkBot only.
    Bayesian {
        fitter: &'a dyn BayesianFitter,
        request: &'a BayesianRequest,
    },
}

#[derive(Clone)]
pub struct CharacteristicEngine {
    cache: Arc<CharacteristicCache>,
    symbolic: Arc<dyn SymbolicEngine>,
    fit_options: FitOptions,
}

impl fmt::Debug for CharacteristicEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacteristicEngine")
            .field("symbolic", &self.symbolic.name())
            .field("cached", &self.cache.len())
            .field("fit_options", &self.fit_options)
            .finish()
    }
}

impl Default for CharacteristicEngine {
    fn default() -> Self {
        Self::new(Arc::new(CharacteristicCache::new()), Arc::new(ClosedFormEngine))
    }
}

impl CharacteristicEngine {
    pub fn new(cache: Arc<CharacteristicCache>, symbolic: Arc<dyn SymbolicEngine>) -> Self {
        CharacteristicEngine {
            cache,
            symbolic,
            fit_options: FitOptions::default(),
        }
    }

    pub fn with_fit_options(mut self, fit_options: FitOptions) -> Self {
        self.fit_options = fit_options;
        self
    }

    pub fn cache(&self) -> &Arc<CharacteristicCache> {
        &self.cache
    }

    /// Derived (or cached) evaluator for a characteristic.
    pub fn entry(
        &self,
        model: ModelKind,
        characteristic: Characteristic,
        method: PersistencyMethod,
        lactation_length: u32,
    ) -> Result<Arc<CacheEntry>> {
        let key = CacheKey::new(model, characteristic, method, lactation_length);
        self.cache.get_or_compute(key, || self.derive(key))
    }

    /// Evaluate a characteristic for known parameters.
    ///
    /// `options.lactation_length` must be a fixed number of days here; use
    /// [`Self::calculate_characteristic`] to resolve `max` against a record.
    pub fn evaluate(
        &self,
        model: ModelKind,
        characteristic: Characteristic,
        params: &[f64],
        options: &CharacteristicOptions,
    ) -> Result<f64> {
        let length = options.lactation_length.fixed_days()?;
        self.evaluate_at(model, characteristic, params, length, options)
    }

    /// Obtain parameters from `source`, then evaluate the characteristic.
    pub fn calculate_characteristic(
        &self,
        record: &LactationRecord,
        model: ModelKind,
        characteristic: Characteristic,
        source: ParameterSource<'_>,
        options: &CharacteristicOptions,
    ) -> Result<f64> {
        let length = options.lactation_length.resolve(record)?;
        let params = match source {
            ParameterSource::Frequentist => fit_model(record, model, &self.fit_options)?.params,
            ParameterSource::Supplied(params) => {
                if params.model != model {
                    return Err(LactationError::validation(format!(
                        "Parameters were fitted for {}, not {}",
                        params.model.name(),
                        model.name()
                    )));
                }
                params.clone()
            }
            ParameterSource::Bayesian { fitter, request } => {
                if model != ModelKind::Milkbot {
                    return Err(LactationError::validation(format!(
                        "Bayesian fitting is only available for milkbot, not {}",
                        model.name()
                    )));
                }
                fitter.fit(request)?.into_parameters()?
            }
        };
        self.evaluate_at(model, characteristic, &params.values(), length, options)
    }

    fn evaluate_at(
        &self,
        model: ModelKind,
        characteristic: Characteristic,
        params: &[f64],
        length: u32,
        options: &CharacteristicOptions,
    ) -> Result<f64> {
        let spec = spec(model);
        check_params(spec, params)?;
        let entry = self.entry(model, characteristic, options.persistency_method, length)?;
        let curve = |t: f64| spec.evaluate(t, params);

        match characteristic {
            Characteristic::TimeToPeak => Ok(peak(model, &entry, &curve, params, length).0),
            Characteristic::PeakYield => Ok(peak(model, &entry, &curve, params, length).1),
            Characteristic::CumulativeMilkYield => {
                if let Evaluator::Closed(program) = &entry.evaluator {
                    let value = program.eval_params(params);
                    if value.is_finite() {
                        return Ok(value);
                    }
                    warn!(model = model.name(), value, "closed-form cumulative yield is not finite; integrating numerically");
                }
                Ok(cumulative_yield(curve, length, options.quadrature_steps_per_day))
            }
            Characteristic::Persistency => match options.persistency_method {
                PersistencyMethod::Literature => {
                    persistency::check_literature_params(model, params)?;
                    let Evaluator::Closed(program) = &entry.evaluator else {
                        return Err(LactationError::unsupported(format!(
                            "No literature persistency for {}",
                            model.name()
                        )));
                    };
                    let value = program.eval_params(params);
                    if !value.is_finite() {
                        return Err(LactationError::validation(format!(
                            "Literature persistency of {} is undefined for parameters {params:?}",
                            model.name()
                        )));
                    }
                    Ok(value)
                }
                PersistencyMethod::Derived => persistency::derived(curve, length),
            },
        }
    }

    fn derive(&self, key: CacheKey) -> Result<CacheEntry> {
        let spec = spec(key.model);
        let formula = spec.build_formula();
        match key.characteristic {
            Characteristic::TimeToPeak | Characteristic::PeakYield => {
                let with_values = key.characteristic == Characteristic::PeakYield;
                absorb(key, spec, self.stationary(spec, &formula, with_values))
            }
            Characteristic::CumulativeMilkYield => {
                let integral = self
                    .symbolic
                    .definite_integral(&formula, 1.0, key.lactation_length as f64)
                    .map(|value| self.closed(spec, value));
                absorb(key, spec, integral)
            }
            Characteristic::Persistency => match key.method.unwrap_or_default() {
                PersistencyMethod::Literature => {
                    let formula = persistency::literature_formula(key.model)?;
                    Ok(self.closed(spec, formula))
                }
                PersistencyMethod::Derived => Ok(CacheEntry::numeric(spec.params)),
            },
        }
    }

    fn stationary(&self, spec: &ModelSpec, formula: &Expr, with_values: bool) -> Result<CacheEntry> {
        let roots = self.symbolic.stationary_points(formula)?;
        if roots.is_empty() {
            return Err(LactationError::symbolic("no stationary points"));
        }
        let first = self.symbolic.differentiate(formula)?;
        let second = self.symbolic.differentiate(&first)?;
        let values: Option<Vec<Expr>> = with_values.then(|| {
            roots
                .iter()
                .map(|root| formula.substitute_time(root).simplify())
                .collect()
        });

        let compile_all = |exprs: &[Expr]| -> Vec<Program> { exprs.iter().map(|e| self.symbolic.compile(e)).collect() };
        let evaluator = Evaluator::Stationary {
            roots: compile_all(&roots),
            curvature: self.symbolic.compile(&second),
            values: values.as_deref().map(compile_all),
        };
        Ok(CacheEntry {
            expressions: Some(values.unwrap_or(roots)),
            params: spec.params,
            evaluator,
            origin: Origin::Symbolic,
        })
    }

    fn closed(&self, spec: &ModelSpec, expr: Expr) -> CacheEntry {
        CacheEntry {
            evaluator: Evaluator::Closed(self.symbolic.compile(&expr)),
            expressions: Some(vec![expr]),
            params: spec.params,
            origin: Origin::Symbolic,
        }
    }
}

/// Turn a symbolic failure into a numeric entry; other errors propagate.
fn absorb(key: CacheKey, spec: &ModelSpec, derived: Result<CacheEntry>) -> Result<CacheEntry> {
    match derived {
        Ok(entry) => {
            debug!(
                model = key.model.name(),
                characteristic = key.characteristic.name(),
                expressions = ?entry.expressions.as_ref().map(|e| e.iter().map(|x| x.render(spec.params)).collect::<Vec<_>>()),
                "symbolic derivation succeeded"
            );
            Ok(entry)
        }
        Err(LactationError::SymbolicDerivation(reason)) => {
            debug!(
                model = key.model.name(),
                characteristic = key.characteristic.name(),
                reason = %reason,
                "symbolic derivation failed; using numeric fallback"
            );
            Ok(CacheEntry::numeric(spec.params))
        }
        Err(other) => Err(other),
    }
}

fn check_params(spec: &ModelSpec, params: &[f64]) -> Result<()> {
    if params.len() != spec.arity() {
        return Err(LactationError::validation(format!(
            "{} expects {} parameters ({}), got {}",
            spec.kind.name(),
            spec.arity(),
            spec.params.join(", "),
            params.len()
        )));
    }
    if params.iter().any(|p| !p.is_finite()) {
        return Err(LactationError::validation(format!(
            "{} parameters must be finite, got {params:?}",
            spec.kind.name()
        )));
    }
    Ok(())
}

/// Time to peak and peak yield: smallest admissible local maximum, else the
/// first arg-max on the day grid.
fn peak<F: Fn(f64) -> f64>(model: ModelKind, entry: &CacheEntry, curve: &F, params: &[f64], length: u32) -> (f64, f64) {
    if let Evaluator::Stationary { roots, curvature, values } = &entry.evaluator {
        let admissible = roots
            .iter()
            .enumerate()
            .map(|(i, root)| (i, root.eval_params(params)))
            .filter(|&(_, t)| t.is_finite() && t > 0.0 && t <= length as f64 && curvature.eval(t, params) < 0.0)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((i, t)) = admissible {
            let y = match values.as_ref().and_then(|v| v.get(i)) {
                Some(value) => value.eval_params(params),
                None => curve(t),
            };
            if y.is_finite() {
                return (t, y);
            }
        }
        warn!(model = model.name(), "no admissible stationary point; searching the day grid");
    }
    let (day, y) = grid_time_to_peak(curve, length);
    (day as f64, y)
}
