//! The provider boundary: requests, results and the error taxonomy

use crate::document::DocumentKind;
use crate::fields::ExtractedFields;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of an extraction failure
///
/// Drives retry decisions: only `Transient` failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Network timeout, rate limiting, 5xx
    Transient,

    /// Authentication failure, malformed request, unsupported content
    Permanent,

    /// Response failed validation
    Invalid,

    /// Corrupt or unsupported input, rejected before any provider call
    Unprocessable,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Unprocessable => "unprocessable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried inside a failed [`ExtractionResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
}

impl ExtractionError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a `Transient` error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Shorthand for a `Permanent` error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    /// Shorthand for an `Invalid` error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    /// Shorthand for an `Unprocessable` error
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, message)
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExtractionError {}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money received
    Income,
    /// Money spent
    Expense,
}

impl TransactionType {
    /// Parse from a provider string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }

    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

/// Business classification of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentClass {
    /// Issued to a customer; implies income
    Invoice,
    /// Proof of a purchase; implies expense
    Receipt,
    /// Anything else
    Other,
}

impl DocumentClass {
    /// Parse from a provider string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "invoice" => Some(DocumentClass::Invoice),
            "receipt" => Some(DocumentClass::Receipt),
            "other" | "unknown" => Some(DocumentClass::Other),
            _ => None,
        }
    }

    /// Transaction type this class implies, if any
    pub fn implied_transaction_type(&self) -> Option<TransactionType> {
        match self {
            DocumentClass::Invoice => Some(TransactionType::Income),
            DocumentClass::Receipt => Some(TransactionType::Expense),
            DocumentClass::Other => None,
        }
    }

    /// Get the class name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClass::Invoice => "invoice",
            DocumentClass::Receipt => "receipt",
            DocumentClass::Other => "other",
        }
    }
}

/// Input to a single provider call
///
/// Built by the processor from a preprocessed source document and discarded
/// once the call returns.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Original file name, used as prompt context
    pub file_name: String,

    /// Preprocessed content bytes (normalized image or raw PDF)
    pub content: Vec<u8>,

    /// Kind of the content
    pub kind: DocumentKind,

    /// MIME type of `content`
    pub mime_type: String,

    /// Embedded text pulled out of a PDF, when there is enough of it
    pub text: Option<String>,

    /// Valid transaction categories supplied by the caller
    pub categories: Vec<String>,
}

/// Outcome of an extraction attempt, as returned across the provider boundary
///
/// Invariant: `success` ⇔ `fields.is_some()` ⇔ `error.is_none()`. Build
/// and transform results through the constructors to keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Whether extraction succeeded
    pub success: bool,

    /// Extracted fields (present iff `success`)
    pub fields: Option<ExtractedFields>,

    /// Confidence score in [0.0, 1.0]
    pub confidence: f64,

    /// Name of the provider that produced the result
    pub provider: String,

    /// Wall-clock time spent, in milliseconds
    pub elapsed_ms: u64,

    /// Classified failure (present iff not `success`)
    pub error: Option<ExtractionError>,

    /// Number of provider calls that led to this result
    pub attempts: u32,
}

impl ExtractionResult {
    /// A successful result
    pub fn succeeded(
        provider: impl Into<String>,
        fields: ExtractedFields,
        confidence: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: true,
            fields: Some(fields),
            confidence: confidence.clamp(0.0, 1.0),
            provider: provider.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            error: None,
            attempts: 1,
        }
    }

    /// A failed result
    pub fn failed(provider: impl Into<String>, error: ExtractionError, elapsed: Duration) -> Self {
        Self {
            success: false,
            fields: None,
            confidence: 0.0,
            provider: provider.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            error: Some(error),
            attempts: 1,
        }
    }

    /// Kind of the failure, `None` on success
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Set the number of attempts
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Replace the elapsed time
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    /// Lower the confidence by `penalty`, clamped to [0.0, 1.0]
    pub fn with_confidence_penalty(mut self, penalty: f64) -> Self {
        self.confidence = (self.confidence - penalty).clamp(0.0, 1.0);
        self
    }

    /// Turn a success into a failure with the given error, dropping the fields
    pub fn into_failure(self, error: ExtractionError) -> Self {
        Self {
            success: false,
            fields: None,
            confidence: 0.0,
            error: Some(error),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{self, ExtractedFields};

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Permanent.is_retryable());
        assert!(!ErrorKind::Invalid.is_retryable());
        assert!(!ErrorKind::Unprocessable.is_retryable());
    }

    #[test]
    fn test_success_invariant() {
        let fields = ExtractedFields::new().with(fields::AMOUNT, 1.0);
        let result = ExtractionResult::succeeded("mock", fields, 1.7, Duration::from_millis(5));
        assert!(result.success);
        assert!(result.fields.is_some());
        assert!(result.error.is_none());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_failure_invariant() {
        let result = ExtractionResult::failed(
            "mock",
            ExtractionError::permanent("bad key"),
            Duration::ZERO,
        );
        assert!(!result.success);
        assert!(result.fields.is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::Permanent));
    }

    #[test]
    fn test_into_failure_drops_fields() {
        let fields = ExtractedFields::new().with(fields::AMOUNT, -1.0);
        let result = ExtractionResult::succeeded("mock", fields, 0.9, Duration::ZERO)
            .into_failure(ExtractionError::invalid("amount is negative"));
        assert!(!result.success);
        assert!(result.fields.is_none());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.provider, "mock");
    }

    #[test]
    fn test_confidence_penalty_clamps() {
        let result = ExtractionResult::succeeded("mock", ExtractedFields::new(), 0.1, Duration::ZERO)
            .with_confidence_penalty(0.2);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_document_class_implications() {
        assert_eq!(
            DocumentClass::Invoice.implied_transaction_type(),
            Some(TransactionType::Income)
        );
        assert_eq!(
            DocumentClass::Receipt.implied_transaction_type(),
            Some(TransactionType::Expense)
        );
        assert_eq!(DocumentClass::Other.implied_transaction_type(), None);
        assert_eq!(DocumentClass::parse(" INVOICE "), Some(DocumentClass::Invoice));
    }

    #[test]
    fn test_error_display() {
        let err = ExtractionError::transient("HTTP 503");
        assert_eq!(err.to_string(), "transient: HTTP 503");
    }
}
