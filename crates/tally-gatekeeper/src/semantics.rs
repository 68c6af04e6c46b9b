//! Document-semantics cross-check
//!
//! Invoices imply income and receipts imply expenses. Document classification
//! is heuristic, so a contradiction lowers confidence and asks for review
//! instead of rejecting the extraction.

use crate::ValidationConfig;
use tally_domain::{DocumentClass, ExtractedFields};
use tracing::debug;

/// Verdict of the cross-check
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticsVerdict {
    /// Whether class and transaction type agree (or nothing can be said)
    pub consistent: bool,
    /// Confidence to subtract from the result
    pub penalty: f64,
    /// Reviewer-facing explanation when inconsistent
    pub note: Option<String>,
}

impl SemanticsVerdict {
    fn consistent() -> Self {
        Self {
            consistent: true,
            penalty: 0.0,
            note: None,
        }
    }
}

/// Compares a document's class against the extracted transaction type
#[derive(Debug, Clone)]
pub struct SemanticsCheck {
    penalty: f64,
}

impl SemanticsCheck {
    /// Create a check that subtracts `penalty` on mismatch
    pub fn new(penalty: f64) -> Self {
        Self {
            penalty: penalty.clamp(0.0, 1.0),
        }
    }

    /// Build from a validation config
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.semantics_penalty)
    }

    /// Cross-check `class` against the `type` field
    pub fn cross_check(&self, class: DocumentClass, extracted: &ExtractedFields) -> SemanticsVerdict {
        let (Some(expected), Some(actual)) =
            (class.implied_transaction_type(), extracted.transaction_type())
        else {
            return SemanticsVerdict::consistent();
        };

        if expected == actual {
            return SemanticsVerdict::consistent();
        }

        debug!(
            class = class.as_str(),
            actual = actual.as_str(),
            "Document class contradicts transaction type"
        );

        SemanticsVerdict {
            consistent: false,
            penalty: self.penalty,
            note: Some(format!(
                "document classified as {} implies {} but was extracted as {}",
                class.as_str(),
                expected.as_str(),
                actual.as_str()
            )),
        }
    }
}

impl Default for SemanticsCheck {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::fields;

    fn with_type(t: &str) -> ExtractedFields {
        ExtractedFields::new().with(fields::TYPE, t)
    }

    #[test]
    fn test_invoice_income_is_consistent() {
        let verdict = SemanticsCheck::default().cross_check(DocumentClass::Invoice, &with_type("income"));
        assert!(verdict.consistent);
        assert_eq!(verdict.penalty, 0.0);
        assert!(verdict.note.is_none());
    }

    #[test]
    fn test_invoice_expense_is_penalized() {
        let verdict = SemanticsCheck::new(0.25).cross_check(DocumentClass::Invoice, &with_type("expense"));
        assert!(!verdict.consistent);
        assert_eq!(verdict.penalty, 0.25);
        assert!(verdict.note.unwrap().contains("invoice"));
    }

    #[test]
    fn test_receipt_income_is_penalized() {
        let verdict = SemanticsCheck::default().cross_check(DocumentClass::Receipt, &with_type("income"));
        assert!(!verdict.consistent);
        assert_eq!(verdict.penalty, 0.2);
    }

    #[test]
    fn test_other_class_says_nothing() {
        let verdict = SemanticsCheck::default().cross_check(DocumentClass::Other, &with_type("income"));
        assert!(verdict.consistent);
    }

    #[test]
    fn test_missing_type_says_nothing() {
        let verdict = SemanticsCheck::default().cross_check(DocumentClass::Receipt, &ExtractedFields::new());
        assert!(verdict.consistent);
    }
}
