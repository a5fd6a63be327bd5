//! Error taxonomy shared by every module.
//!
//! Each variant carries a human-readable message that is specific enough to be
//! surfaced as-is. `SymbolicDerivation` is internal: the characteristic engine
//! absorbs it by falling back to numeric evaluation.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LactationError {
    /// Insufficient or malformed input, unknown names, non-monotonic days.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Optimizer non-convergence or a degenerate fit.
    #[error("fit failed: {0}")]
    Fit(String),
    #[error("symbolic derivation failed: {0}")]
    SymbolicDerivation(String),
    /// The characteristic has no formula for the requested model.
    #[error("unsupported characteristic: {0}")]
    UnsupportedCharacteristic(String),
    /// Missing table columns or unreadable settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The Bayesian collaborator was unreachable or returned an unexpected payload.
    #[error("external service error: {0}")]
    ExternalService(String),
}

impl LactationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::Fit(message.into())
    }

    pub fn symbolic(message: impl Into<String>) -> Self {
        Self::SymbolicDerivation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedCharacteristic(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService(message.into())
    }

    /// Process exit code for embedding applications.
    ///
    /// - `2`: bad input or configuration
    /// - `3`: the fit itself failed
    /// - `4`: no way to compute the requested characteristic
    /// - `5`: the external fitting service failed
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Configuration(_) => 2,
            Self::Fit(_) => 3,
            Self::SymbolicDerivation(_) | Self::UnsupportedCharacteristic(_) => 4,
            Self::ExternalService(_) => 5,
        }
    }
}

pub type Result<T, E = LactationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_family() {
        assert_eq!(LactationError::validation("x").exit_code(), 2);
        assert_eq!(LactationError::configuration("x").exit_code(), 2);
        assert_eq!(LactationError::fit("x").exit_code(), 3);
        assert_eq!(LactationError::unsupported("x").exit_code(), 4);
        assert_eq!(LactationError::external("x").exit_code(), 5);
    }

    #[test]
    fn display_includes_message() {
        let err = LactationError::configuration("No DaysInMilk column found.");
        assert_eq!(err.to_string(), "configuration error: No DaysInMilk column found.");
    }
}
