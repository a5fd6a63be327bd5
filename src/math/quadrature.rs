//! Numeric integration over day grids.

/// Trapezoid rule over equally spaced samples `y` with spacing `dx`.
pub fn trapezoid(y: &[f64], dx: f64) -> f64 {
    match y.len() {
        0 | 1 => 0.0,
        n => {
            let inner: f64 = y[1..n - 1].iter().sum();
            dx * (0.5 * (y[0] + y[n - 1]) + inner)
        }
    }
}

/// Composite Simpson rule for `∫_a^b f`, using `intervals` subintervals
/// (rounded up to an even number).
pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> f64 {
    if b == a {
        return 0.0;
    }
    let n = intervals.max(2).next_multiple_of(2);
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + h * i as f64);
    }
    sum * h / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_is_exact_for_lines() {
        let y: Vec<f64> = (0..11).map(|i| 2.0 * i as f64 + 1.0).collect();
        // ∫_0^10 (2x + 1) = 110
        assert!((trapezoid(&y, 1.0) - 110.0).abs() < 1e-12);
        assert_eq!(trapezoid(&[5.0], 1.0), 0.0);
    }

    #[test]
    fn simpson_is_exact_for_cubics() {
        let v = simpson(|x| x * x * x - x, 1.0, 3.0, 4);
        // [x^4/4 - x^2/2]_1^3 = (81/4 - 9/2) - (1/4 - 1/2) = 16
        assert!((v - 16.0).abs() < 1e-12);
    }

    #[test]
    fn simpson_rounds_odd_interval_counts() {
        let v = simpson(f64::exp, 0.0, 1.0, 101);
        assert!((v - (1f64.exp() - 1.0)).abs() < 1e-10);
    }
}
