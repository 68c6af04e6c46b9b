//! Tally Vision Provider Layer
//!
//! Pluggable vision-capable language-model backends behind a single
//! capability contract, plus the retry executor that wraps every call.
//!
//! # Architecture
//!
//! ```text
//! ExtractionRequest → RetryExecutor → ExtractionProvider → ExtractionResult
//! ```
//!
//! Providers never retry by themselves and never return `Err` for ordinary
//! failures: every outcome is an [`ExtractionResult`] whose error carries an
//! [`ErrorKind`]. The executor retries `Transient` failures only.
//!
//! # Providers
//!
//! - `OpenAiProvider`: chat completions with image / file parts
//! - `AnthropicProvider`: messages API with image / document blocks
//! - `GeminiProvider`: `generateContent` with inline data
//! - `OllamaProvider`: local Ollama chat API
//! - `MockProvider`: deterministic scripted responses for testing
//!
//! # Examples
//!
//! ```
//! use tally_domain::{DocumentKind, ExtractionRequest};
//! use tally_llm::{ExtractionProvider, MockProvider};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = MockProvider::new(
//!     r#"{"date":"2025-01-15","type":"expense","category":"Office Supplies","amount":45.99}"#,
//! );
//! let request = ExtractionRequest {
//!     file_name: "receipt.jpg".to_string(),
//!     content: vec![0xFF, 0xD8],
//!     kind: DocumentKind::Image,
//!     mime_type: "image/jpeg".to_string(),
//!     text: None,
//!     categories: vec!["Office Supplies".to_string()],
//! };
//!
//! let result = provider.extract(&request).await;
//! assert!(result.success);
//! # }
//! ```

#![warn(missing_docs)]

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod ollama;
pub mod openai;
mod parser;
mod prompt;
pub mod retry;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tally_domain::{ErrorKind, ExtractedFields, ExtractionError, ExtractionRequest, ExtractionResult};
use tally_gatekeeper::{ResponseValidator, ValidationOutcome};
use thiserror::Error;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, build_provider_with_key, ProviderConfig, ProviderKind};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use parser::parse_fields;
pub use prompt::PromptBuilder;
pub use retry::{RetryExecutor, RetryPolicy};

/// Errors that can occur while constructing a provider
///
/// Failures during extraction are never reported through this type; they are
/// encoded in [`ExtractionResult`].
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key available for a provider that needs one
    #[error("Missing API key for {provider}: set {env_var}")]
    MissingApiKey {
        /// Provider name
        provider: String,
        /// Environment variable that was consulted
        env_var: String,
    },

    /// API key present but malformed
    #[error("Invalid API key for {0}")]
    InvalidApiKey(String),

    /// Unknown provider name in configuration
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Invalid provider configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be created
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Capability contract every vision backend implements
///
/// Implementations serialize the request, authenticate, parse the response
/// and classify their own failures. They must not retry.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Provider name recorded in results
    fn name(&self) -> &str;

    /// Extract transaction fields from a document
    async fn extract(&self, request: &ExtractionRequest) -> ExtractionResult;

    /// Self-check run before reporting success
    fn validate_response(&self, extracted: &ExtractedFields) -> ValidationOutcome {
        ResponseValidator::default_config().validate(extracted)
    }
}

/// Scripted response for [`MockProvider`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Raw model output, parsed and validated like a real provider's
    Json(String),

    /// A classified failure
    Failure(ErrorKind, String),
}

/// Mock provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls.
/// Scripted responses are consumed first, then the default response repeats.
/// Clones share the script, call counter and request log.
///
/// # Examples
///
/// ```
/// use tally_domain::ErrorKind;
/// use tally_llm::{MockProvider, MockResponse};
///
/// let provider = MockProvider::failing(ErrorKind::Permanent, "unauthorized");
/// provider.push_response(MockResponse::Failure(ErrorKind::Transient, "503".into()));
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    default_response: MockResponse,
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<ExtractionRequest>>>,
    delay: Option<Duration>,
    validator: ResponseValidator,
}

impl MockProvider {
    /// Create a MockProvider that answers every call with `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_default(MockResponse::Json(response.into()))
    }

    /// Create a MockProvider that fails every call
    pub fn failing(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_default(MockResponse::Failure(kind, message.into()))
    }

    fn with_default(default_response: MockResponse) -> Self {
        Self {
            name: "mock".to_string(),
            default_response,
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            validator: ResponseValidator::default_config(),
        }
    }

    /// Override the provider name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep for `delay` inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Use a specific validator for the self-check
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Queue a response ahead of the default
    pub fn push_response(&self, response: MockResponse) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Get the number of times extract was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) = 0;
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_response(&self) -> MockResponse {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, request: &ExtractionRequest) -> ExtractionResult {
        let started = Instant::now();
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let raw = match self.next_response() {
            MockResponse::Json(text) => Ok(text),
            MockResponse::Failure(kind, message) => Err(ExtractionError::new(kind, message)),
        };
        parser::finish(self, started, raw)
    }

    fn validate_response(&self, extracted: &ExtractedFields) -> ValidationOutcome {
        self.validator.validate(extracted)
    }
}
