//! Library settings.
//!
//! Every section falls back to its defaults, so a settings file only needs the
//! keys it changes:
//!
//! ```json
//! { "characteristics": { "lactation_length": "max" },
//!   "columns": { "milk_yield": "CorrectedYield" } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::characteristics::{CharacteristicEngine, CharacteristicOptions};
use crate::error::{LactationError, Result};
use crate::fit::FitOptions;
use crate::io::ColumnOverrides;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub fit: FitOptions,
    pub characteristics: CharacteristicOptions,
    pub columns: ColumnOverrides,
}

impl Settings {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LactationError::configuration(format!("Invalid settings: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            LactationError::configuration(format!("Failed to read settings '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Characteristic engine using these fit options and the default symbolic engine.
    pub fn engine(&self) -> CharacteristicEngine {
        CharacteristicEngine::default().with_fit_options(self.fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LactationLength, PersistencyMethod};

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(Settings::from_json_str("{}").unwrap(), Settings::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_json_str(
            r#"{
                "fit": { "max_iterations": 50 },
                "characteristics": { "lactation_length": "max", "persistency_method": "literature" },
                "columns": { "test_id": "Cow" }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.fit.max_iterations, 50);
        assert_eq!(settings.fit.gtol, FitOptions::default().gtol);
        assert_eq!(settings.characteristics.lactation_length, LactationLength::MaxObserved);
        assert_eq!(settings.characteristics.persistency_method, PersistencyMethod::Literature);
        assert_eq!(settings.characteristics.quadrature_steps_per_day, 20);
        assert_eq!(settings.columns.test_id.as_deref(), Some("Cow"));
        assert_eq!(settings.columns.default_test_id, "0");
    }

    #[test]
    fn numeric_lactation_length() {
        let settings = Settings::from_json_str(r#"{"characteristics": {"lactation_length": 250}}"#).unwrap();
        assert_eq!(settings.characteristics.lactation_length, LactationLength::Days(250));
    }

    #[test]
    fn bad_settings_are_configuration_errors() {
        for text in [
            "not json",
            r#"{"characteristics": {"lactation_length": "forever"}}"#,
            r#"{"unknown_section": {}}"#,
        ] {
            let err = Settings::from_json_str(text).unwrap_err();
            assert!(matches!(err, LactationError::Configuration(_)), "{text}");
        }
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = Settings::load(Path::new("/nonexistent/lactation-settings.json")).unwrap_err();
        assert!(matches!(err, LactationError::Configuration(_)));
    }
}
