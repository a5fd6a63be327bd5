//! Persistency: how well production is sustained after the peak.

use crate::characteristics::numeric::grid_time_to_peak;
use crate::domain::ModelKind;
use crate::error::{LactationError, Result};
use crate::symbolic::Expr;

/// Published closed form, as an expression over the model parameters.
///
/// - Wood: `−(b + 1)·ln(c)`
/// - MilkBot: `0.693 / d` (days from peak to half production)
pub fn literature_formula(model: ModelKind) -> Result<Expr> {
    match model {
        ModelKind::Wood => Ok(-(Expr::param(1) + 1.0) * Expr::param(2).ln()),
        ModelKind::Milkbot => Ok(0.693 / Expr::param(3)),
        other => Err(LactationError::unsupported(format!(
            "Literature persistency is only defined for wood and milkbot, not {}",
            other.name()
        ))),
    }
}

/// Parameter checks the closed forms cannot express.
pub fn check_literature_params(model: ModelKind, params: &[f64]) -> Result<()> {
    if model == ModelKind::Milkbot && params.get(3).is_some_and(|d| *d == 0.0) {
        return Err(LactationError::validation(
            "MilkBot decay parameter d is zero; literature persistency is undefined",
        ));
    }
    Ok(())
}

/// Average slope from the grid peak to the end of lactation.
pub fn derived<F: Fn(f64) -> f64>(f: F, length: u32) -> Result<f64> {
    let (peak_day, peak_yield) = grid_time_to_peak(&f, length);
    if peak_day >= length {
        return Err(LactationError::validation(format!(
            "Peak (day {peak_day}) is not before the end of lactation (day {length}); persistency is undefined"
        )));
    }
    let end_yield = f(length as f64);
    Ok((end_yield - peak_yield) / (length - peak_day) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn wood_literature_value() {
        let e = literature_formula(ModelKind::Wood).unwrap();
        let v = e.eval(f64::NAN, &[30.0, 0.2, 0.003]);
        assert!((v - (-(1.2) * 0.003f64.ln())).abs() < 1e-12);
        assert!(v > 0.0);
    }

    #[test]
    fn milkbot_zero_decay_is_rejected() {
        let err = check_literature_params(ModelKind::Milkbot, &[40.0, 20.0, -0.7, 0.0]).unwrap_err();
        assert!(matches!(err, LactationError::Validation(_)));
        assert!(check_literature_params(ModelKind::Milkbot, &[40.0, 20.0, -0.7, 0.003]).is_ok());
    }

    #[test]
    fn other_models_are_unsupported() {
        let err = literature_formula(ModelKind::Wilmink).unwrap_err();
        assert!(matches!(err, LactationError::UnsupportedCharacteristic(_)));
    }

    #[test]
    fn derived_is_negative_after_peak() {
        let p = [30.0, 0.2, 0.003];
        let v = derived(|t| models::wood(t, &p), 305).unwrap();
        assert!(v < 0.0);
    }

    #[test]
    fn derived_rejects_peak_at_end() {
        let err = derived(|t| t, 305).unwrap_err();
        assert!(matches!(err, LactationError::Validation(_)));
    }
}
