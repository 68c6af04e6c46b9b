//! Extracted transaction fields
//!
//! Providers return a loosely-typed field map; the accessors here give the
//! rest of the pipeline typed views without trusting the map's shape.

use crate::extraction::{DocumentClass, TransactionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Transaction date, expected as `YYYY-MM-DD`
pub const DATE: &str = "date";
/// Transaction direction (`income` or `expense`)
pub const TYPE: &str = "type";
/// Category from the caller's whitelist
pub const CATEGORY: &str = "category";
/// Total amount
pub const AMOUNT: &str = "amount";
/// Tax portion of the amount
pub const TAX_AMOUNT: &str = "tax_amount";
/// Vendor for expenses
pub const VENDOR: &str = "vendor";
/// Customer for income
pub const CUSTOMER: &str = "customer";
/// Free-text description
pub const DESCRIPTION: &str = "description";
/// Provider's classification of the document (`invoice`, `receipt`, `other`)
pub const DOCUMENT_TYPE: &str = "document_type";
/// Provider's self-reported confidence
pub const CONFIDENCE: &str = "confidence";

/// Fields every successful extraction must carry
pub const REQUIRED_FIELDS: [&str; 4] = [DATE, TYPE, CATEGORY, AMOUNT];

/// Ordered map of extracted field name to JSON value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields(BTreeMap<String, Value>);

impl ExtractedFields {
    /// Create an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object
    pub fn from_object(object: serde_json::Map<String, Value>) -> Self {
        Self(object.into_iter().collect())
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the field is present and not JSON `null`
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(v) if !v.is_null())
    }

    /// Trimmed, non-empty string value of a field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Parsed `amount`
    pub fn amount(&self) -> Option<f64> {
        self.0.get(AMOUNT).and_then(parse_amount)
    }

    /// Parsed `tax_amount`
    pub fn tax_amount(&self) -> Option<f64> {
        self.0.get(TAX_AMOUNT).and_then(parse_amount)
    }

    /// Parsed `type`
    pub fn transaction_type(&self) -> Option<TransactionType> {
        self.text(TYPE).and_then(TransactionType::parse)
    }

    /// Parsed `document_type`
    pub fn document_class(&self) -> Option<DocumentClass> {
        self.text(DOCUMENT_TYPE).and_then(DocumentClass::parse)
    }

    /// Provider-reported confidence, if numeric
    pub fn confidence(&self) -> Option<f64> {
        self.0.get(CONFIDENCE).and_then(Value::as_f64)
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse a monetary value from a JSON number or a numeric string
///
/// Strings may carry currency symbols, thousands separators and whitespace.
/// A parenthesised amount is read as negative.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tally_domain::parse_amount;
///
/// assert_eq!(parse_amount(&json!(45.99)), Some(45.99));
/// assert_eq!(parse_amount(&json!("$1,234.50")), Some(1234.50));
/// assert_eq!(parse_amount(&json!("(12.00)")), Some(-12.0));
/// assert_eq!(parse_amount(&json!("n/a")), None);
/// ```
pub fn parse_amount(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let (negative, body) = match trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => (true, inner),
                None => (false, trimmed),
            };
            let cleaned: String = body
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | ' ' | '\u{a0}'))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned
                .parse::<f64>()
                .ok()
                .map(|v| if negative { -v } else { v })
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample() -> ExtractedFields {
        ExtractedFields::new()
            .with(DATE, "2025-01-15")
            .with(TYPE, "expense")
            .with(CATEGORY, "Office Supplies")
            .with(AMOUNT, 45.99)
    }

    #[test]
    fn test_typed_accessors() {
        let fields = sample().with(DOCUMENT_TYPE, "Receipt");
        assert_eq!(fields.amount(), Some(45.99));
        assert_eq!(fields.transaction_type(), Some(TransactionType::Expense));
        assert_eq!(fields.document_class(), Some(DocumentClass::Receipt));
        assert_eq!(fields.text(CATEGORY), Some("Office Supplies"));
    }

    #[test]
    fn test_blank_text_is_absent() {
        let fields = sample().with(CATEGORY, "   ");
        assert_eq!(fields.text(CATEGORY), None);
        assert!(fields.contains(CATEGORY));
    }

    #[test]
    fn test_null_is_not_contained() {
        let fields = sample().with(TAX_AMOUNT, Value::Null);
        assert!(!fields.contains(TAX_AMOUNT));
        assert_eq!(fields.tax_amount(), None);
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        assert_eq!(parse_amount(&json!(true)), None);
        assert_eq!(parse_amount(&json!("")), None);
        assert_eq!(parse_amount(&json!("$")), None);
        assert_eq!(parse_amount(&json!(["1"])), None);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["amount"], json!(45.99));
        assert_eq!(value["type"], json!("expense"));
    }

    proptest! {
        #[test]
        fn prop_formatted_amounts_parse_back(cents in 0u64..1_000_000_000) {
            let value = cents as f64 / 100.0;
            let formatted = format!("${:.2}", value);
            let parsed = parse_amount(&Value::String(formatted)).unwrap();
            prop_assert!((parsed - value).abs() < 0.005);
        }

        #[test]
        fn prop_numbers_parse_verbatim(value in -1.0e9f64..1.0e9) {
            prop_assert_eq!(parse_amount(&json!(value)), Some(value));
        }
    }
}
