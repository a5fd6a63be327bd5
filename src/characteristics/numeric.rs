//! Grid and quadrature fallbacks used when no closed form is available.

use crate::math::simpson;

/// First arg-max of `f` over the integer days `1..=length`.
///
/// Non-finite values never win; if every value is non-finite the result is
/// `(1, f(1))`.
pub fn grid_time_to_peak<F: Fn(f64) -> f64>(f: F, length: u32) -> (u32, f64) {
    let mut best_day = 1;
    let mut best = f(1.0);
    for day in 2..=length {
        let y = f(day as f64);
        if y.is_finite() && (!best.is_finite() || y > best) {
            best_day = day;
            best = y;
        }
    }
    (best_day, best)
}

/// `∫_1^length f` by composite Simpson with `steps_per_day` intervals per day.
pub fn cumulative_yield<F: Fn(f64) -> f64>(f: F, length: u32, steps_per_day: usize) -> f64 {
    let span = length.saturating_sub(1) as usize;
    simpson(f, 1.0, length as f64, span * steps_per_day.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_maximum_wins_on_plateau() {
        let (day, value) = grid_time_to_peak(|t| if (10.0..=20.0).contains(&t) { 5.0 } else { 1.0 }, 305);
        assert_eq!(day, 10);
        assert_eq!(value, 5.0);
    }

    #[test]
    fn nan_values_are_skipped() {
        let (day, _) = grid_time_to_peak(|t| if t < 3.0 { f64::NAN } else { -t }, 10);
        assert_eq!(day, 3);
    }

    #[test]
    fn cumulative_of_constant_curve() {
        assert!((cumulative_yield(|_| 20.0, 305, 20) - 20.0 * 304.0).abs() < 1e-9);
    }
}
