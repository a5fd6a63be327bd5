//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - validated once at the boundary (`LactationRecord`)
//! - passed through fitting and characteristic evaluation without copying
//! - exported to JSON/CSV by the embedding application

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{LactationError, Result};

/// Standard lactation horizon used for predictions and ICAR totals.
pub const STANDARD_LACTATION_DAYS: u32 = 305;

/// Closed set of lactation curve models.
///
/// Names are parsed case-insensitively (`"Wood"`, `" ali_schaeffer "`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelKind {
    Wood,
    Wilmink,
    AliSchaeffer,
    Fischer,
    Milkbot,
    Brody,
    Sikka,
    Nelder,
    Dhanoa,
    Emmans,
    Hayashi,
    Rook,
    Dijkstra,
    Prasad,
}

impl ModelKind {
    pub const ALL: [ModelKind; 14] = [
        ModelKind::Wood,
        ModelKind::Wilmink,
        ModelKind::AliSchaeffer,
        ModelKind::Fischer,
        ModelKind::Milkbot,
        ModelKind::Brody,
        ModelKind::Sikka,
        ModelKind::Nelder,
        ModelKind::Dhanoa,
        ModelKind::Emmans,
        ModelKind::Hayashi,
        ModelKind::Rook,
        ModelKind::Dijkstra,
        ModelKind::Prasad,
    ];

    /// Models the frequentist fitter supports.
    pub const FITTABLE: [ModelKind; 5] = [
        ModelKind::Wood,
        ModelKind::Wilmink,
        ModelKind::AliSchaeffer,
        ModelKind::Fischer,
        ModelKind::Milkbot,
    ];

    /// Parse a model name, ignoring surrounding whitespace and case.
    pub fn parse(name: &str) -> Result<Self> {
        parse_value_enum(name, "model")
    }

    /// Canonical lowercase identifier (`"ali_schaeffer"`).
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Wood => "wood",
            ModelKind::Wilmink => "wilmink",
            ModelKind::AliSchaeffer => "ali_schaeffer",
            ModelKind::Fischer => "fischer",
            ModelKind::Milkbot => "milkbot",
            ModelKind::Brody => "brody",
            ModelKind::Sikka => "sikka",
            ModelKind::Nelder => "nelder",
            ModelKind::Dhanoa => "dhanoa",
            ModelKind::Emmans => "emmans",
            ModelKind::Hayashi => "hayashi",
            ModelKind::Rook => "rook",
            ModelKind::Dijkstra => "dijkstra",
            ModelKind::Prasad => "prasad",
        }
    }

    /// Human-readable label.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Wood => "Wood",
            ModelKind::Wilmink => "Wilmink",
            ModelKind::AliSchaeffer => "Ali & Schaeffer",
            ModelKind::Fischer => "Fischer",
            ModelKind::Milkbot => "MilkBot",
            ModelKind::Brody => "Brody",
            ModelKind::Sikka => "Sikka",
            ModelKind::Nelder => "Nelder",
            ModelKind::Dhanoa => "Dhanoa",
            ModelKind::Emmans => "Emmans",
            ModelKind::Hayashi => "Hayashi",
            ModelKind::Rook => "Rook",
            ModelKind::Dijkstra => "Dijkstra",
            ModelKind::Prasad => "Prasad",
        }
    }

    pub fn is_fittable(self) -> bool {
        Self::FITTABLE.contains(&self)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lactation curve characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Characteristic {
    TimeToPeak,
    PeakYield,
    CumulativeMilkYield,
    Persistency,
}

impl Characteristic {
    pub fn parse(name: &str) -> Result<Self> {
        parse_value_enum(name, "characteristic")
    }

    pub fn name(self) -> &'static str {
        match self {
            Characteristic::TimeToPeak => "time_to_peak",
            Characteristic::PeakYield => "peak_yield",
            Characteristic::CumulativeMilkYield => "cumulative_milk_yield",
            Characteristic::Persistency => "persistency",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How persistency is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PersistencyMethod {
    /// Average slope from the peak to the end of lactation (any model).
    #[default]
    Derived,
    /// Published closed forms (Wood and MilkBot only).
    Literature,
}

impl PersistencyMethod {
    pub fn parse(name: &str) -> Result<Self> {
        parse_value_enum(name, "persistency method")
    }
}

/// Horizon over which endpoint-dependent characteristics are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LactationLengthRepr", into = "LactationLengthRepr")]
pub enum LactationLength {
    Days(u32),
    /// Use the last observed day in milk.
    MaxObserved,
}

impl Default for LactationLength {
    fn default() -> Self {
        LactationLength::Days(STANDARD_LACTATION_DAYS)
    }
}

impl LactationLength {
    /// Resolve to a concrete number of days for `record`.
    pub fn resolve(self, record: &LactationRecord) -> Result<u32> {
        let days = match self {
            LactationLength::Days(days) => days,
            LactationLength::MaxObserved => record.max_day(),
        };
        check_length(days)
    }

    /// Resolve without observations; `MaxObserved` is rejected.
    pub fn fixed_days(self) -> Result<u32> {
        match self {
            LactationLength::Days(days) => check_length(days),
            LactationLength::MaxObserved => Err(LactationError::validation(
                "lactation_length 'max' needs observed data",
            )),
        }
    }
}

fn check_length(days: u32) -> Result<u32> {
    if days < 2 {
        return Err(LactationError::validation(format!(
            "lactation_length must be at least 2 days (got {days})"
        )));
    }
    Ok(days)
}

impl FromStr for LactationLength {
    type Err = LactationError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            return Ok(LactationLength::MaxObserved);
        }
        s.parse::<u32>().map(LactationLength::Days).map_err(|_| {
            LactationError::validation(format!(
                "lactation_length must be a positive integer or 'max' (got '{s}')"
            ))
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LactationLengthRepr {
    Days(u32),
    Keyword(String),
}

impl TryFrom<LactationLengthRepr> for LactationLength {
    type Error = LactationError;

    fn try_from(repr: LactationLengthRepr) -> Result<Self> {
        match repr {
            LactationLengthRepr::Days(days) => Ok(LactationLength::Days(days)),
            LactationLengthRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<LactationLength> for LactationLengthRepr {
    fn from(length: LactationLength) -> Self {
        match length {
            LactationLength::Days(days) => LactationLengthRepr::Days(days),
            LactationLength::MaxObserved => LactationLengthRepr::Keyword("max".to_string()),
        }
    }
}

/// Cow breed accepted by the Bayesian collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Breed {
    /// Holstein.
    #[default]
    #[serde(rename = "H")]
    #[value(name = "h")]
    Holstein,
    /// Jersey.
    #[serde(rename = "J")]
    #[value(name = "j")]
    Jersey,
}

impl Breed {
    pub fn parse(name: &str) -> Result<Self> {
        parse_value_enum(name, "breed")
    }

    pub fn code(self) -> &'static str {
        match self {
            Breed::Holstein => "H",
            Breed::Jersey => "J",
        }
    }
}

/// Prior family / server region for the Bayesian collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Continent {
    #[default]
    Usa,
    Eu,
    /// Chen et al. published priors, served by the USA endpoint.
    Chen,
}

impl Continent {
    pub fn parse(name: &str) -> Result<Self> {
        parse_value_enum(name, "continent")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MilkUnit {
    #[default]
    Kg,
    Lb,
}

impl MilkUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            MilkUnit::Kg => "kg",
            MilkUnit::Lb => "lb",
        }
    }
}

fn parse_value_enum<T: ValueEnum>(name: &str, what: &str) -> Result<T> {
    let trimmed = name.trim();
    T::from_str(trimmed, true).map_err(|_| {
        let options: Vec<String> = T::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value().map(|p| p.get_name().to_string()))
            .collect();
        LactationError::validation(format!(
            "Unknown {what}: '{trimmed}' (expected one of: {})",
            options.join(", ")
        ))
    })
}

/// Observed test-day series for one animal-lactation.
///
/// Invariants (checked on construction):
/// - at least two observations
/// - days in milk are positive and strictly increasing
/// - yields are finite and non-negative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LactationRecord {
    days: Vec<u32>,
    yields: Vec<f64>,
}

impl LactationRecord {
    pub fn new(days: Vec<u32>, yields: Vec<f64>) -> Result<Self> {
        if days.len() != yields.len() {
            return Err(LactationError::validation(format!(
                "days in milk and yields must have the same length ({} vs {})",
                days.len(),
                yields.len()
            )));
        }
        if days.len() < 2 {
            return Err(LactationError::validation(
                "At least two non missing points are required to fit a lactation curve",
            ));
        }
        if let Some(pos) = days.iter().position(|&d| d == 0) {
            return Err(LactationError::validation(format!(
                "day in milk must be >= 1 (observation {pos} is day 0)"
            )));
        }
        if let Some(pos) = days.windows(2).position(|w| w[1] <= w[0]) {
            return Err(LactationError::validation(format!(
                "days in milk must be strictly increasing (day {} follows day {})",
                days[pos + 1],
                days[pos]
            )));
        }
        if let Some(&bad) = yields.iter().find(|y| !y.is_finite() || **y < 0.0) {
            return Err(LactationError::validation(format!(
                "yields must be finite and non-negative (got {bad})"
            )));
        }
        Ok(Self { days, yields })
    }

    /// Build a record from raw numeric sequences.
    ///
    /// Pairs where either value is missing (non-finite) are dropped first, the
    /// remaining days must be whole positive numbers.
    pub fn from_observations(days: &[f64], yields: &[f64]) -> Result<Self> {
        if days.len() != yields.len() {
            return Err(LactationError::validation(format!(
                "days in milk and yields must have the same length ({} vs {})",
                days.len(),
                yields.len()
            )));
        }
        let mut kept_days = Vec::with_capacity(days.len());
        let mut kept_yields = Vec::with_capacity(yields.len());
        for (&d, &y) in days.iter().zip(yields) {
            if !(d.is_finite() && y.is_finite()) {
                continue;
            }
            if d < 1.0 || d.fract() != 0.0 || d > u32::MAX as f64 {
                return Err(LactationError::validation(format!(
                    "day in milk must be a positive whole number (got {d})"
                )));
            }
            kept_days.push(d as u32);
            kept_yields.push(y);
        }
        Self::new(kept_days, kept_yields)
    }

    pub fn days(&self) -> &[u32] {
        &self.days
    }

    pub fn yields(&self) -> &[f64] {
        &self.yields
    }

    /// Days as `f64`, the time axis used by the model functions.
    pub fn days_f64(&self) -> Vec<f64> {
        self.days.iter().map(|&d| d as f64).collect()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn max_day(&self) -> u32 {
        self.days.last().copied().unwrap_or(0)
    }

    pub fn max_yield(&self) -> f64 {
        self.yields.iter().copied().fold(0.0, f64::max)
    }

    /// Prediction horizon: `max(305, last observed day)`.
    pub fn horizon(&self) -> u32 {
        self.max_day().max(STANDARD_LACTATION_DAYS)
    }
}

/// Parameters produced by a single fit, in the model's documented order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParameters {
    pub model: ModelKind,
    entries: Vec<(String, f64)>,
}

impl FittedParameters {
    pub fn new<S: Into<String>>(model: ModelKind, names: impl IntoIterator<Item = S>, values: &[f64]) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != values.len() {
            return Err(LactationError::validation(format!(
                "{} parameter names do not match {} values",
                names.len(),
                values.len()
            )));
        }
        let entries = names.into_iter().zip(values.iter().copied()).collect();
        Ok(Self { model, entries })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Values in positional order, as consumed by the model functions.
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// ICAR Test Interval Method total for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestIntervalResult {
    #[serde(rename = "TestId")]
    pub test_id: String,
    #[serde(rename = "Total305Yield")]
    pub total_305_yield: f64,
}
