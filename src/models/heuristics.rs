//! Initial guesses and parameter bounds for the fittable models.
//!
//! Guesses are built from a handful of record statistics (peak, first/last
//! observation, late decline). Bounds widen the scale parameter relative to
//! the observed maximum; shape parameters use fixed physiological ranges.
//! The fitter clamps every guess into its bounds before optimizing.

use crate::domain::LactationRecord;
use crate::math::{Bounds, fit_linear_basis};
use crate::models::model::{ALI_SCHAEFFER_DAYS, WILMINK_K};

/// Summary statistics that drive the heuristics.
#[derive(Debug, Clone, Copy)]
pub struct RecordStats {
    pub peak_day: f64,
    pub peak_yield: f64,
    pub first_day: f64,
    pub first_yield: f64,
    pub last_day: f64,
    pub last_yield: f64,
    /// Least-squares slope of yield against day over the points at or after the peak.
    pub late_slope: f64,
}

impl RecordStats {
    pub fn from_record(record: &LactationRecord) -> Self {
        let days = record.days_f64();
        let yields = record.yields();
        let peak = yields
            .iter()
            .enumerate()
            .fold(0, |best, (i, &y)| if y > yields[best] { i } else { best });
        let last = days.len() - 1;

        RecordStats {
            peak_day: days[peak],
            peak_yield: yields[peak],
            first_day: days[0],
            first_yield: yields[0],
            last_day: days[last],
            last_yield: yields[last],
            late_slope: slope(&days[peak..], &yields[peak..]),
        }
    }

    /// Scale upper bound shared by the multiplicative models.
    fn scale_ceiling(&self) -> f64 {
        (10.0 * self.peak_yield).max(100.0)
    }

    /// Exponential decay rate implied by the peak and the last observation.
    fn late_decay(&self) -> f64 {
        if self.last_day <= self.peak_day || self.last_yield <= 0.0 || self.peak_yield <= 0.0 {
            return 0.0;
        }
        (self.peak_yield / self.last_yield).ln() / (self.last_day - self.peak_day)
    }
}

fn slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.len() < 2 {
        return 0.0;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let sxx: f64 = x.iter().map(|a| (a - mx) * (a - mx)).sum();
    if sxx > 0.0 { sxy / sxx } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Wood: a·t^b·e^(−c·t)
// ---------------------------------------------------------------------------

pub fn wood_guess(record: &LactationRecord) -> Vec<f64> {
    let stats = RecordStats::from_record(record);
    let b = 0.2;
    let c = (b / stats.peak_day).clamp(1e-4, 0.1);
    let tp = b / c;
    let a = stats.peak_yield / (tp.powf(b) * (-b).exp());
    vec![a, b, c]
}

pub fn wood_bounds(record: &LactationRecord) -> Vec<Bounds> {
    let stats = RecordStats::from_record(record);
    vec![
        Bounds::new(1e-6, stats.scale_ceiling()),
        Bounds::new(0.01, 1.5),
        Bounds::new(1e-4, 0.1),
    ]
}

// ---------------------------------------------------------------------------
// Wilmink: a + b·t + c·e^(k·t), k fixed
// ---------------------------------------------------------------------------

pub fn wilmink_guess(record: &LactationRecord) -> Vec<f64> {
    let days = record.days_f64();
    let linear = fit_linear_basis(&days, record.yields(), 3, |t, row| {
        row[0] = 1.0;
        row[1] = t;
        row[2] = (WILMINK_K * t).exp();
    });
    match linear {
        Some(beta) => vec![beta[0], beta[1], beta[2], WILMINK_K],
        None => {
            let stats = RecordStats::from_record(record);
            vec![stats.peak_yield, stats.late_slope, -stats.peak_yield / 2.0, WILMINK_K]
        }
    }
}

pub fn wilmink_bounds(_record: &LactationRecord) -> Vec<Bounds> {
    vec![
        Bounds::UNBOUNDED,
        Bounds::UNBOUNDED,
        Bounds::UNBOUNDED,
        Bounds::fixed(WILMINK_K),
    ]
}

// ---------------------------------------------------------------------------
// Ali & Schaeffer: linear in all five parameters
// ---------------------------------------------------------------------------

pub fn ali_schaeffer_guess(record: &LactationRecord) -> Vec<f64> {
    let days = record.days_f64();
    let linear = fit_linear_basis(&days, record.yields(), 5, |t, row| {
        let s = t / ALI_SCHAEFFER_DAYS;
        let l = (ALI_SCHAEFFER_DAYS / t).ln();
        row[0] = 1.0;
        row[1] = s;
        row[2] = s * s;
        row[3] = l;
        row[4] = l * l;
    });
    linear.unwrap_or_else(|| {
        let mean = record.yields().iter().sum::<f64>() / record.len() as f64;
        vec![mean, 0.0, 0.0, 0.0, 0.0]
    })
}

pub fn ali_schaeffer_bounds(_record: &LactationRecord) -> Vec<Bounds> {
    vec![Bounds::UNBOUNDED; 5]
}

// ---------------------------------------------------------------------------
// Fischer: a − b·t − a·e^(−c·t)
// ---------------------------------------------------------------------------

pub fn fischer_guess(record: &LactationRecord) -> Vec<f64> {
    let stats = RecordStats::from_record(record);
    let a = stats.peak_yield;
    let b = (-stats.late_slope).clamp(0.0, 1.0);
    let early = if stats.peak_day > stats.first_day {
        (stats.peak_yield - stats.first_yield) / (stats.peak_day - stats.first_day)
    } else {
        0.1 * a
    };
    let c = if a > 0.0 { (early / a).clamp(1e-4, 1.0) } else { 0.1 };
    vec![a, b, c]
}

pub fn fischer_bounds(record: &LactationRecord) -> Vec<Bounds> {
    let stats = RecordStats::from_record(record);
    vec![
        Bounds::new(0.0, stats.scale_ceiling()),
        Bounds::new(0.0, 1.0),
        Bounds::new(1e-4, 1.0),
    ]
}

// ---------------------------------------------------------------------------
// MilkBot: a·(1 − e^((c−t)/b)/2)·e^(−d·t)
// ---------------------------------------------------------------------------

pub fn milkbot_guess(record: &LactationRecord) -> Vec<f64> {
    let stats = RecordStats::from_record(record);
    vec![stats.peak_yield, 20.0, -0.7, stats.late_decay().clamp(1e-4, 0.1)]
}

pub fn milkbot_bounds(record: &LactationRecord) -> Vec<Bounds> {
    let stats = RecordStats::from_record(record);
    vec![
        Bounds::new(1.0, stats.scale_ceiling()),
        Bounds::new(1.0, 100.0),
        Bounds::new(-600.0, 300.0),
        Bounds::new(1e-4, 0.1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::model;

    fn record_from(f: impl Fn(f64) -> f64) -> LactationRecord {
        let days: Vec<u32> = (0..10).map(|i| 5 + 30 * i).collect();
        let yields = days.iter().map(|&d| f(d as f64)).collect();
        LactationRecord::new(days, yields).unwrap()
    }

    #[test]
    fn stats_find_peak_and_decline() {
        let record = LactationRecord::new(vec![5, 50, 100, 200], vec![20.0, 35.0, 30.0, 20.0]).unwrap();
        let stats = RecordStats::from_record(&record);
        assert_eq!(stats.peak_day, 50.0);
        assert_eq!(stats.peak_yield, 35.0);
        assert!(stats.late_slope < 0.0);
        assert!(stats.late_decay() > 0.0);
    }

    #[test]
    fn wood_guess_peaks_at_observed_maximum() {
        let record = record_from(|t| model::wood(t, &[30.0, 0.2, 0.003]));
        let guess = wood_guess(&record);
        let stats = RecordStats::from_record(&record);
        let tp = guess[1] / guess[2];
        assert!((model::wood(tp, &guess) - stats.peak_yield).abs() < 1e-9);
    }

    #[test]
    fn linear_models_guess_exactly() {
        let truth = [35.0, -0.05, -15.0, WILMINK_K];
        let record = record_from(|t| model::wilmink(t, &truth));
        let guess = wilmink_guess(&record);
        for (g, e) in guess.iter().zip(truth) {
            assert!((g - e).abs() < 1e-6);
        }
    }

    #[test]
    fn bounds_cover_their_guesses() {
        let record = record_from(|t| model::milkbot(t, &[40.0, 20.0, -0.7, 0.003]));
        let guesses = [milkbot_guess(&record), fischer_guess(&record), wood_guess(&record)];
        let bounds = [milkbot_bounds(&record), fischer_bounds(&record), wood_bounds(&record)];
        for (guess, bounds) in guesses.iter().zip(&bounds) {
            assert_eq!(guess.len(), bounds.len());
            assert!(guess.iter().zip(bounds).all(|(g, b)| b.contains(*g)));
        }
    }
}
