//! Gatekeeper configuration

use crate::GatekeeperError;
use serde::{Deserialize, Serialize};

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Require `date` to parse with `date_format`
    pub validate_date_format: bool,

    /// chrono format string for `date`
    pub date_format: String,

    /// Reject a negative `tax_amount` when one is present
    pub validate_tax_amount: bool,

    /// Reject a provider-reported `confidence` outside [0.0, 1.0]
    pub validate_confidence_range: bool,

    /// Confidence subtracted when the document class contradicts the transaction type
    pub semantics_penalty: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_date_format: true,
            date_format: "%Y-%m-%d".to_string(),
            validate_tax_amount: true,
            validate_confidence_range: true,
            semantics_penalty: 0.2,
        }
    }
}

impl ValidationConfig {
    /// Only the required-field contract
    pub fn permissive() -> Self {
        Self {
            validate_date_format: false,
            validate_tax_amount: false,
            validate_confidence_range: false,
            semantics_penalty: 0.1,
            ..Self::default()
        }
    }

    /// Every optional check, heavier penalty on class mismatches
    pub fn strict() -> Self {
        Self {
            semantics_penalty: 0.35,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), GatekeeperError> {
        if !(0.0..=1.0).contains(&self.semantics_penalty) {
            return Err(GatekeeperError::Config(format!(
                "semantics_penalty {} out of range [0.0, 1.0]",
                self.semantics_penalty
            )));
        }
        if self.validate_date_format && self.date_format.trim().is_empty() {
            return Err(GatekeeperError::Config(
                "date_format must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
