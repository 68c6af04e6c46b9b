//! Structural validation of extracted fields

use crate::ValidationConfig;
use chrono::NaiveDate;
use std::fmt;
use tally_domain::{fields, parse_amount, ExtractedFields, TransactionType, REQUIRED_FIELDS};

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Offending field
    pub field: String,
    /// What is wrong with it
    pub reason: String,
}

impl Violation {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Result of validating a field map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every constraint holds
    Valid,

    /// At least one constraint failed
    Invalid(Vec<Violation>),
}

impl ValidationOutcome {
    /// Whether the field map passed
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// Violated constraints (empty when valid)
    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationOutcome::Valid => &[],
            ValidationOutcome::Invalid(v) => v,
        }
    }

    /// One-line description of every violation
    pub fn summary(&self) -> String {
        self.violations()
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The ResponseValidator checks a field map against the transaction contract
///
/// Pure: no I/O, no state beyond its configuration.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    config: ValidationConfig,
}

impl ResponseValidator {
    /// Create a new validator with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create a validator with default configuration
    pub fn default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate extracted fields
    ///
    /// Checks, in order:
    /// 1. every required field is present
    /// 2. `type` is `income` or `expense`
    /// 3. `amount` parses as a non-negative number
    /// 4. `category` is non-empty
    /// 5. optional checks from [`ValidationConfig`]
    pub fn validate(&self, extracted: &ExtractedFields) -> ValidationOutcome {
        let mut violations = Vec::new();

        // 1. Presence
        for field in REQUIRED_FIELDS {
            if !extracted.contains(field) {
                violations.push(Violation::new(field, "missing required field"));
            }
        }

        // 2. Transaction type
        if let Some(value) = extracted.get(fields::TYPE).filter(|v| !v.is_null()) {
            let parsed = value.as_str().and_then(TransactionType::parse);
            if parsed.is_none() {
                violations.push(Violation::new(
                    fields::TYPE,
                    format!("expected 'income' or 'expense', got {}", value),
                ));
            }
        }

        // 3. Amount
        if let Some(value) = extracted.get(fields::AMOUNT).filter(|v| !v.is_null()) {
            match parse_amount(value) {
                None => violations.push(Violation::new(
                    fields::AMOUNT,
                    format!("not a numeric value: {}", value),
                )),
                Some(amount) if amount < 0.0 => violations.push(Violation::new(
                    fields::AMOUNT,
                    format!("must be non-negative, got {}", amount),
                )),
                Some(_) => {}
            }
        }

        // 4. Category
        if extracted.contains(fields::CATEGORY) && extracted.text(fields::CATEGORY).is_none() {
            violations.push(Violation::new(fields::CATEGORY, "must be a non-empty string"));
        }

        // 5. Optional checks
        if self.config.validate_date_format {
            if let Some(value) = extracted.get(fields::DATE).filter(|v| !v.is_null()) {
                let parses = value
                    .as_str()
                    .map(|s| NaiveDate::parse_from_str(s.trim(), &self.config.date_format).is_ok())
                    .unwrap_or(false);
                if !parses {
                    violations.push(Violation::new(
                        fields::DATE,
                        format!("does not match format '{}': {}", self.config.date_format, value),
                    ));
                }
            }
        }

        if self.config.validate_tax_amount {
            if let Some(value) = extracted.get(fields::TAX_AMOUNT).filter(|v| !v.is_null()) {
                match parse_amount(value) {
                    Some(tax) if tax >= 0.0 => {}
                    _ => violations.push(Violation::new(
                        fields::TAX_AMOUNT,
                        format!("must be a non-negative number, got {}", value),
                    )),
                }
            }
        }

        if self.config.validate_confidence_range {
            if let Some(value) = extracted.get(fields::CONFIDENCE).filter(|v| !v.is_null()) {
                match value.as_f64() {
                    Some(c) if (0.0..=1.0).contains(&c) => {}
                    _ => violations.push(Violation::new(
                        fields::CONFIDENCE,
                        format!("must be within [0.0, 1.0], got {}", value),
                    )),
                }
            }
        }

        if violations.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(violations)
        }
    }
}
