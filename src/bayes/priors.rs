//! MilkBot prior distributions.

use serde::{Deserialize, Serialize};

use crate::domain::MilkUnit;

/// Normal prior for one MilkBot parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorParam {
    pub mean: f64,
    pub sd: f64,
}

impl PriorParam {
    pub const fn new(mean: f64, sd: f64) -> Self {
        PriorParam { mean, sd }
    }
}

/// Priors in the MilkBot wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkBotPriors {
    pub scale: PriorParam,
    pub ramp: PriorParam,
    pub decay: PriorParam,
    pub offset: PriorParam,
    /// Standard error of a single milk measurement.
    pub se_milk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milk_unit: Option<MilkUnit>,
}

impl MilkBotPriors {
    /// Published priors of Chen et al. for parity 1, 2 and 3+.
    pub fn chen(parity: u32) -> Self {
        let (scale, ramp, decay, offset) = match parity {
            0 | 1 => (
                PriorParam::new(34.11, 7.0),
                PriorParam::new(29.96, 3.0),
                PriorParam::new(0.001835, 0.000738),
                PriorParam::new(-0.5, 0.02),
            ),
            2 => (
                PriorParam::new(44.26, 9.57),
                PriorParam::new(22.52, 3.0),
                PriorParam::new(0.002745, 0.000979),
                PriorParam::new(-0.78, 0.07),
            ),
            _ => (
                PriorParam::new(48.41, 10.66),
                PriorParam::new(22.54, 8.724),
                PriorParam::new(0.002997, 0.000972),
                PriorParam::new(0.0, 0.03),
            ),
        };
        MilkBotPriors {
            scale,
            ramp,
            decay,
            offset,
            se_milk: 4.0,
            milk_unit: Some(MilkUnit::Kg),
        }
    }

    /// Custom priors; the unit is left to the request's preferred unit.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        scale_mean: f64,
        scale_sd: f64,
        ramp_mean: f64,
        ramp_sd: f64,
        decay_mean: f64,
        decay_sd: f64,
        offset_mean: f64,
        offset_sd: f64,
        se_milk: f64,
    ) -> Self {
        MilkBotPriors {
            scale: PriorParam::new(scale_mean, scale_sd),
            ramp: PriorParam::new(ramp_mean, ramp_sd),
            decay: PriorParam::new(decay_mean, decay_sd),
            offset: PriorParam::new(offset_mean, offset_sd),
            se_milk,
            milk_unit: None,
        }
    }
}

/// Which priors, if any, accompany a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PriorChoice {
    /// Let the service use its own priors for the continent.
    #[default]
    Service,
    Chen,
    Custom(MilkBotPriors),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chen_priors_per_parity() {
        assert_eq!(MilkBotPriors::chen(1).scale.mean, 34.11);
        assert_eq!(MilkBotPriors::chen(2).offset, PriorParam::new(-0.78, 0.07));
        assert_eq!(MilkBotPriors::chen(3), MilkBotPriors::chen(7));
        assert_eq!(MilkBotPriors::chen(4).ramp.sd, 8.724);
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let value = serde_json::to_value(MilkBotPriors::chen(1)).unwrap();
        assert_eq!(value["seMilk"], json!(4.0));
        assert_eq!(value["milkUnit"], json!("kg"));
        assert_eq!(value["decay"]["sd"], json!(0.000738));

        let custom = serde_json::to_value(MilkBotPriors::build(40.0, 5.0, 25.0, 3.0, 0.002, 0.001, -1.0, 0.1, 3.0)).unwrap();
        assert!(custom.get("milkUnit").is_none());
        assert_eq!(custom["scale"], json!({"mean": 40.0, "sd": 5.0}));
    }
}
