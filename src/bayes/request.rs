//! MilkBot fitting request and response shapes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::bayes::priors::{MilkBotPriors, PriorChoice};
use crate::domain::{Breed, Continent, FittedParameters, LactationRecord, MilkUnit, ModelKind};
use crate::error::{LactationError, Result};

pub const USA_BASE_URL: &str = "https://milkbot.com";
pub const EU_BASE_URL: &str = "https://europe-west1-numeric-analogy-337601.cloudfunctions.net/milkBot-fitter";
pub const CREDENTIAL_ENV: &str = "MILKBOT_KEY";

const LACTATION_KEY: &str = "single_lactation_fit";

/// API key for the fitting service. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(LactationError::configuration("MilkBot API key is empty."));
        }
        Ok(Credential(key))
    }

    /// Load `MILKBOT_KEY`, reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let key = std::env::var(CREDENTIAL_ENV).map_err(|_| {
            LactationError::configuration(format!("Missing {CREDENTIAL_ENV} in environment (.env)."))
        })?;
        Credential::new(key)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Everything the service needs to fit one lactation.
#[derive(Debug, Clone)]
pub struct BayesianRequest {
    pub record: LactationRecord,
    pub breed: Breed,
    pub parity: u32,
    pub continent: Continent,
    pub priors: PriorChoice,
    pub milk_unit: MilkUnit,
}

impl BayesianRequest {
    pub fn new(record: LactationRecord) -> Self {
        BayesianRequest {
            record,
            breed: Breed::default(),
            parity: 3,
            continent: Continent::default(),
            priors: PriorChoice::default(),
            milk_unit: MilkUnit::default(),
        }
    }

    /// Priors sent with the request; the CHEN continent implies Chen priors.
    pub fn effective_priors(&self) -> Option<MilkBotPriors> {
        match (&self.priors, self.continent) {
            (PriorChoice::Custom(priors), _) => Some(priors.clone()),
            (PriorChoice::Chen, _) | (PriorChoice::Service, Continent::Chen) => Some(MilkBotPriors::chen(self.parity)),
            (PriorChoice::Service, _) => None,
        }
    }

    pub fn endpoint(&self) -> String {
        let base = match self.continent {
            Continent::Eu => EU_BASE_URL,
            Continent::Usa | Continent::Chen => USA_BASE_URL,
        };
        format!("{base}/fitLactation")
    }

    pub fn headers(&self, credential: &Credential) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_string()),
            ("X-API-KEY", credential.expose().to_string()),
        ]
    }

    /// JSON body, with points sorted by day in milk.
    pub fn payload(&self) -> Value {
        let mut points: Vec<(u32, f64)> = self
            .record
            .days()
            .iter()
            .copied()
            .zip(self.record.yields().iter().copied())
            .collect();
        points.sort_by_key(|(dim, _)| *dim);
        let points: Vec<Value> = points
            .into_iter()
            .map(|(dim, milk)| json!({ "dim": dim, "milk": milk }))
            .collect();

        let mut body = json!({
            "lactation": {
                "lacKey": LACTATION_KEY,
                "breed": self.breed.code(),
                "parity": self.parity,
                "points": points,
            },
            "options": {
                "returnInputData": false,
                "returnPath": false,
                "returnDiscriminatorPath": false,
                "preferredMilkUnit": self.milk_unit.as_str(),
            },
        });
        if let Some(priors) = self.effective_priors() {
            body["priors"] = json!(priors);
        }
        body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilkBotParams {
    pub scale: f64,
    pub ramp: f64,
    pub decay: f64,
    pub offset: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitResponse {
    fitted_params: Option<MilkBotParams>,
    params: Option<MilkBotParams>,
}

/// Normalized service result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BayesianFit {
    #[serde(flatten)]
    pub params: MilkBotParams,
    #[serde(rename = "nPoints")]
    pub n_points: usize,
}

impl BayesianFit {
    /// Accept either response flavour (`fittedParams` or `params`).
    pub fn from_response(body: &Value, n_points: usize) -> Result<Self> {
        let response: FitResponse = serde_json::from_value(body.clone())
            .map_err(|e| LactationError::external(format!("Failed to parse MilkBot response: {e}")))?;
        let params = response
            .fitted_params
            .or(response.params)
            .ok_or_else(|| LactationError::external(format!("Unexpected MilkBot response format: {body}")))?;
        Ok(BayesianFit { params, n_points })
    }

    /// MilkBot parameters in canonical `a, b, c, d` order.
    pub fn into_parameters(self) -> Result<FittedParameters> {
        let p = self.params;
        FittedParameters::new(
            ModelKind::Milkbot,
            ["a", "b", "c", "d"],
            &[p.scale, p.ramp, p.offset, p.decay],
        )
    }
}

/// Transport to the Bayesian fitting service, implemented outside this crate.
pub trait BayesianFitter: Send + Sync {
    fn fit(&self, request: &BayesianRequest) -> Result<BayesianFit>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BayesianRequest {
        let record = LactationRecord::new(vec![10, 40, 100], vec![25.0, 32.0, 28.0]).unwrap();
        BayesianRequest::new(record)
    }

    #[test]
    fn payload_shape() {
        let body = request().payload();
        assert_eq!(body["lactation"]["lacKey"], "single_lactation_fit");
        assert_eq!(body["lactation"]["breed"], "H");
        assert_eq!(body["lactation"]["parity"], 3);
        assert_eq!(body["lactation"]["points"][1], json!({"dim": 40, "milk": 32.0}));
        assert_eq!(body["options"]["preferredMilkUnit"], "kg");
        assert_eq!(body["options"]["returnInputData"], false);
        assert!(body.get("priors").is_none());
    }

    #[test]
    fn chen_continent_implies_chen_priors_and_usa_endpoint() {
        let mut req = request();
        req.continent = Continent::Chen;
        req.parity = 2;
        let body = req.payload();
        assert_eq!(body["priors"]["scale"]["mean"], 44.26);
        assert_eq!(req.endpoint(), "https://milkbot.com/fitLactation");
    }

    #[test]
    fn custom_priors_override_continent() {
        let mut req = request();
        req.continent = Continent::Chen;
        req.priors = PriorChoice::Custom(MilkBotPriors::build(1.0, 1.0, 2.0, 1.0, 0.003, 0.001, 0.0, 1.0, 4.0));
        assert_eq!(req.payload()["priors"]["scale"]["mean"], 1.0);
    }

    #[test]
    fn eu_uses_its_own_endpoint() {
        let mut req = request();
        req.continent = Continent::Eu;
        assert!(req.endpoint().starts_with(EU_BASE_URL));
        assert!(req.endpoint().ends_with("/fitLactation"));
    }

    #[test]
    fn both_response_flavours_are_accepted() {
        let usa = json!({"fittedParams": {"scale": 1.0, "ramp": 2.0, "decay": 3.0, "offset": 4.0}});
        let eu = json!({"params": {"scale": 1.0, "ramp": 2.0, "decay": 3.0, "offset": 4.0}});
        let a = BayesianFit::from_response(&usa, 3).unwrap();
        let b = BayesianFit::from_response(&eu, 3).unwrap();
        assert_eq!(a, b);
        let params = a.into_parameters().unwrap();
        assert_eq!(params.values(), vec![1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn unexpected_response_is_external_error() {
        let err = BayesianFit::from_response(&json!({"status": "error"}), 3).unwrap_err();
        assert!(matches!(err, LactationError::ExternalService(_)));
    }

    #[test]
    fn credential_is_redacted() {
        let c = Credential::new("secret-key").unwrap();
        assert_eq!(format!("{c:?}"), "Credential(***)");
        assert!(Credential::new("  ").is_err());
        let headers = request().headers(&c);
        assert_eq!(headers[1], ("X-API-KEY", "secret-key".to_string()));
    }

    #[test]
    fn credential_from_environment() {
        // No other test touches this variable.
        unsafe { std::env::remove_var(CREDENTIAL_ENV) };
        let err = Credential::from_env().unwrap_err();
        assert!(matches!(err, LactationError::Configuration(_)));
        assert!(err.to_string().contains(CREDENTIAL_ENV));

        unsafe { std::env::set_var(CREDENTIAL_ENV, "from-env") };
        assert_eq!(Credential::from_env().unwrap().expose(), "from-env");
        unsafe { std::env::remove_var(CREDENTIAL_ENV) };
    }
}
