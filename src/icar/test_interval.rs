//! ICAR Test Interval Method (305-day yield from test-day records).
//!
//! Per group, sorted by day in milk:
//!
//! ```text
//! start        = d₁ · y₁
//! intermediate = Σ (dᵢ₊₁ − dᵢ) · (yᵢ + yᵢ₊₁) / 2
//! end          = (306 − dₙ) · yₙ
//! ```
//!
//! Records past day 305 are dropped before grouping.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{STANDARD_LACTATION_DAYS, TestIntervalResult};
use crate::error::{LactationError, Result};

/// Exclusive upper day of the standard lactation.
const END_DAY: f64 = STANDARD_LACTATION_DAYS as f64 + 1.0;

/// One test-day measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDay {
    pub test_id: String,
    pub days_in_milk: f64,
    pub milk_yield: f64,
}

impl TestDay {
    pub fn new(test_id: impl Into<String>, days_in_milk: f64, milk_yield: f64) -> Self {
        TestDay {
            test_id: test_id.into(),
            days_in_milk,
            milk_yield,
        }
    }
}

/// Total 305-day yield per group, in order of first appearance.
pub fn test_interval_method(rows: &[TestDay]) -> Result<Vec<TestIntervalResult>> {
    if let Some(bad) = rows
        .iter()
        .find(|r| !r.days_in_milk.is_finite() || r.days_in_milk < 0.0 || !r.milk_yield.is_finite() || r.milk_yield < 0.0)
    {
        return Err(LactationError::validation(format!(
            "Invalid test day for '{}': day {} yield {}",
            bad.test_id, bad.days_in_milk, bad.milk_yield
        )));
    }

    let groups = group_rows(rows);
    let results = groups
        .par_iter()
        .map(|(test_id, points)| TestIntervalResult {
            test_id: (*test_id).to_string(),
            total_305_yield: group_total(test_id, points),
        })
        .collect();
    Ok(results)
}

fn group_rows(rows: &[TestDay]) -> Vec<(&str, Vec<(f64, f64)>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<(f64, f64)>)> = Vec::new();
    for row in rows.iter().filter(|r| r.days_in_milk <= STANDARD_LACTATION_DAYS as f64) {
        let slot = *index.entry(row.test_id.as_str()).or_insert_with(|| {
            groups.push((row.test_id.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((row.days_in_milk, row.milk_yield));
    }
    groups
}

fn group_total(test_id: &str, points: &[(f64, f64)]) -> f64 {
    let mut points = points.to_vec();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (first_day, first_yield) = points[0];
    let (last_day, last_yield) = points[points.len() - 1];
    if points.len() == 1 {
        warn!(test_id, day = first_day, "single test day; 305-day yield is pure extrapolation");
    }

    let start = first_day * first_yield;
    let intermediate: f64 = points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum();
    let end = (END_DAY - last_day) * last_yield;
    start + intermediate + end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(id: &str, days: &[f64], yields: &[f64]) -> Vec<TestDay> {
        days.iter().zip(yields).map(|(&d, &y)| TestDay::new(id, d, y)).collect()
    }

    fn single_total(days: &[f64], yields: &[f64]) -> f64 {
        let result = test_interval_method(&rows("1", days, yields)).unwrap();
        assert_eq!(result.len(), 1);
        result[0].total_305_yield
    }

    #[test]
    fn reference_totals() {
        assert!((single_total(&[10.0, 40.0], &[30.0, 25.0]) - 7775.0).abs() < 1e-9);
        assert!((single_total(&[5.0, 35.0, 65.0], &[25.0, 30.0, 28.0]) - 8568.0).abs() < 1e-9);
        assert!((single_total(&[10.0, 305.0], &[30.0, 20.0]) - 7695.0).abs() < 1e-9);
        assert!((single_total(&[50.0, 150.0, 250.0], &[20.0, 25.0, 15.0]) - 6090.0).abs() < 1e-9);
    }

    #[test]
    fn calving_day_contributes_nothing_at_start() {
        assert!((single_total(&[0.0, 30.0], &[20.0, 25.0]) - 7575.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_is_extrapolated() {
        assert!((single_total(&[100.0], &[20.0]) - 306.0 * 20.0).abs() < 1e-9);
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let sorted = single_total(&[5.0, 35.0, 65.0], &[25.0, 30.0, 28.0]);
        let shuffled = single_total(&[65.0, 5.0, 35.0], &[28.0, 25.0, 30.0]);
        assert_eq!(sorted, shuffled);
    }

    #[test]
    fn days_past_305_are_dropped() {
        let with_tail = single_total(&[10.0, 40.0, 320.0], &[30.0, 25.0, 5.0]);
        assert!((with_tail - 7775.0).abs() < 1e-9);
    }

    #[test]
    fn group_with_only_late_days_disappears() {
        let result = test_interval_method(&rows("late", &[310.0, 320.0], &[10.0, 9.0])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn zero_yields_give_zero() {
        assert_eq!(single_total(&[10.0, 100.0, 200.0], &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn duplicate_days_add_a_zero_width_interval() {
        let total = single_total(&[10.0, 40.0, 40.0], &[30.0, 25.0, 25.0]);
        assert!((total - 7775.0).abs() < 1e-9);
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let mut input = rows("b", &[10.0, 40.0], &[30.0, 25.0]);
        input.extend(rows("a", &[50.0, 150.0, 250.0], &[20.0, 25.0, 15.0]));
        input.push(TestDay::new("b", 305.0, 0.0));

        let result = test_interval_method(&input).unwrap();
        let ids: Vec<&str> = result.iter().map(|r| r.test_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!((result[1].total_305_yield - 6090.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(test_interval_method(&[]).unwrap().is_empty());
    }

    #[test]
    fn negative_yield_is_rejected() {
        let err = test_interval_method(&rows("1", &[10.0, 40.0], &[30.0, -1.0])).unwrap_err();
        assert!(matches!(err, LactationError::Validation(_)));
    }
}
