//! Numeric evaluation of the lactation models.
//!
//! Every model is a small, pure function of the day in milk `t` and a
//! parameter slice in canonical order (see [`crate::models::spec`]). A slice
//! of the wrong length evaluates to `NaN` rather than panicking, so the
//! optimizer and the characteristic fallbacks can treat it like any other
//! non-finite value.

use crate::domain::ModelKind;

/// Rate of the exponential term in Wilmink's model when fitted.
pub const WILMINK_K: f64 = -0.05;

/// Scaling constant (days) of the Ali & Schaeffer polynomial-log model.
pub const ALI_SCHAEFFER_DAYS: f64 = 340.0;

/// Evaluate `y(t)` for the given model.
pub fn evaluate(model: ModelKind, t: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::Wood => wood(t, params),
        ModelKind::Wilmink => wilmink(t, params),
        ModelKind::AliSchaeffer => ali_schaeffer(t, params),
        ModelKind::Fischer => fischer(t, params),
        ModelKind::Milkbot => milkbot(t, params),
        ModelKind::Brody => brody(t, params),
        ModelKind::Sikka => sikka(t, params),
        ModelKind::Nelder => nelder(t, params),
        ModelKind::Dhanoa => dhanoa(t, params),
        ModelKind::Emmans => emmans(t, params),
        ModelKind::Hayashi => hayashi(t, params),
        ModelKind::Rook => rook(t, params),
        ModelKind::Dijkstra => dijkstra(t, params),
        ModelKind::Prasad => prasad(t, params),
    }
}

/// Evaluate the model at each of `days`.
pub fn evaluate_many(model: ModelKind, days: &[f64], params: &[f64]) -> Vec<f64> {
    days.iter().map(|&t| evaluate(model, t, params)).collect()
}

/// Evaluate the model on the integer grid `1..=horizon`.
pub fn evaluate_days(model: ModelKind, horizon: u32, params: &[f64]) -> Vec<f64> {
    (1..=horizon).map(|d| evaluate(model, d as f64, params)).collect()
}

pub fn wood(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    a * t.powf(b) * (-c * t).exp()
}

pub fn wilmink(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, k] = p else { return f64::NAN };
    a + b * t + c * (k * t).exp()
}

pub fn ali_schaeffer(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d, k] = p else { return f64::NAN };
    let s = t / ALI_SCHAEFFER_DAYS;
    let l = (ALI_SCHAEFFER_DAYS / t).ln();
    a + b * s + c * s * s + d * l + k * l * l
}

pub fn fischer(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    a - b * t - a * (-c * t).exp()
}

pub fn milkbot(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d] = p else { return f64::NAN };
    a * (1.0 - ((c - t) / b).exp() / 2.0) * (-d * t).exp()
}

pub fn brody(t: f64, p: &[f64]) -> f64 {
    let &[a, k] = p else { return f64::NAN };
    a * (-k * t).exp()
}

pub fn sikka(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    a * (b * t - c * t * t).exp()
}

pub fn nelder(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    t / (a + b * t + c * t * t)
}

pub fn dhanoa(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    a * t.powf(b * c) * (-c * t).exp()
}

pub fn emmans(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d] = p else { return f64::NAN };
    a * (-(d - b * t).exp()).exp() * (-c * t).exp()
}

pub fn hayashi(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c] = p else { return f64::NAN };
    b * ((-t / c).exp() - (-t / (a * c)).exp())
}

pub fn rook(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d] = p else { return f64::NAN };
    a / (1.0 + b / (c + t)) * (-d * t).exp()
}

pub fn dijkstra(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d] = p else { return f64::NAN };
    a * (b * (1.0 - (-c * t).exp()) / c - d * t).exp()
}

pub fn prasad(t: f64, p: &[f64]) -> f64 {
    let &[a, b, c, d] = p else { return f64::NAN };
    a + b * t + c * t * t + d / t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wood_known_value() {
        // 30 * 50^0.2 * e^-0.15
        let y = wood(50.0, &[30.0, 0.2, 0.003]);
        assert_relative_eq!(y, 30.0 * 50f64.powf(0.2) * (-0.15f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn milkbot_half_ramp_at_offset() {
        // At t = c the ramp term is exactly 1/2.
        let y = milkbot(10.0, &[40.0, 20.0, 10.0, 0.0]);
        assert_relative_eq!(y, 20.0, max_relative = 1e-12);
    }

    #[test]
    fn ali_schaeffer_at_scaling_day() {
        // ln(340/340) = 0 and t/340 = 1
        let y = ali_schaeffer(ALI_SCHAEFFER_DAYS, &[10.0, 2.0, 3.0, 100.0, 100.0]);
        assert_relative_eq!(y, 15.0, max_relative = 1e-12);
    }

    #[test]
    fn wrong_arity_is_nan() {
        assert!(wood(10.0, &[1.0, 2.0]).is_nan());
        assert!(evaluate(ModelKind::Brody, 10.0, &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn evaluate_days_covers_horizon() {
        let ys = evaluate_days(ModelKind::Prasad, 305, &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(ys.len(), 305);
        assert!(ys.iter().all(|&y| y == 1.0));
    }

    #[test]
    fn every_model_is_finite_at_typical_parameters() {
        let cases: [(ModelKind, &[f64]); 14] = [
            (ModelKind::Wood, &[30.0, 0.2, 0.003]),
            (ModelKind::Wilmink, &[35.0, -0.05, -15.0, WILMINK_K]),
            (ModelKind::AliSchaeffer, &[30.0, -10.0, 2.0, 3.0, -1.0]),
            (ModelKind::Fischer, &[35.0, 0.05, 0.1]),
            (ModelKind::Milkbot, &[40.0, 20.0, -0.7, 0.003]),
            (ModelKind::Brody, &[35.0, 0.002]),
            (ModelKind::Sikka, &[20.0, 0.01, 3e-5]),
            (ModelKind::Nelder, &[0.5, 0.03, 1e-4]),
            (ModelKind::Dhanoa, &[20.0, 30.0, 0.005]),
            (ModelKind::Emmans, &[40.0, 0.1, 0.002, 1.0]),
            (ModelKind::Hayashi, &[0.2, 40.0, 300.0]),
            (ModelKind::Rook, &[40.0, 5.0, 2.0, 0.002]),
            (ModelKind::Dijkstra, &[20.0, 0.05, 0.05, 0.003]),
            (ModelKind::Prasad, &[20.0, 0.1, -3e-4, -5.0]),
        ];
        for (model, params) in cases {
            let ys = evaluate_many(model, &[1.0, 60.0, 305.0], params);
            assert!(ys.iter().all(|y| y.is_finite()), "{model}: {ys:?}");
        }
    }
}
