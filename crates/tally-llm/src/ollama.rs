//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local chat API, for running vision
//! models such as `llava` without sending documents off the machine.
//!
//! Images travel in the message's `images` list. Ollama cannot read PDFs, so
//! a PDF without embedded text is reported as unsupported content.
//!
//! # Examples
//!
//! ```no_run
//! use tally_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llava").unwrap();
//! ```

use crate::factory::{ProviderConfig, ProviderKind, ProviderSettings};
use crate::prompt::{attachment, Attachment, PromptBuilder};
use crate::{http, parser, ExtractionProvider, LlmError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tally_domain::{ExtractedFields, ExtractionError, ExtractionRequest, ExtractionResult};
use tally_gatekeeper::{ResponseValidator, ValidationOutcome};
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama API provider for local inference
pub struct OllamaProvider {
    settings: ProviderSettings,
    client: Client,
    validator: ResponseValidator,
}

/// Request body for Ollama chat API
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from Ollama chat API
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[allow(dead_code)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Vision model to use (e.g., "llava", "llama3.2-vision")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let config = ProviderConfig {
            endpoint: Some(endpoint.into()),
            model: Some(model.into()),
            ..ProviderConfig::for_kind(ProviderKind::Ollama)
        };
        Self::from_config(&config)
    }

    /// Create a provider from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self, LlmError> {
        let settings = ProviderSettings::resolve(config, None)?;
        let client = http::build_client(settings.timeout)?;
        Ok(Self {
            settings,
            client,
            validator: ResponseValidator::default_config(),
        })
    }

    /// Use a specific validator for the self-check
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    fn build_body(&self, request: &ExtractionRequest) -> Result<OllamaChatRequest, ExtractionError> {
        let images = match attachment(request) {
            Attachment::None => Vec::new(),
            Attachment::Image { data, .. } => vec![data],
            Attachment::Pdf { .. } => {
                return Err(ExtractionError::permanent(format!(
                    "Ollama cannot read PDF attachments and {} has no extractable text",
                    request.file_name
                )))
            }
        };

        Ok(OllamaChatRequest {
            model: self.settings.model.clone(),
            messages: vec![OllamaMessage {
                role: "user",
                content: PromptBuilder::for_request(request).build(),
                images,
            }],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        })
    }

    async fn complete(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let url = format!("{}/api/chat", self.settings.endpoint);
        let body = self.build_body(request)?;
        debug!(provider = "ollama", model = %self.settings.model, file = %request.file_name, "Sending request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(http::from_request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ExtractionError::permanent(format!(
                "Model not available: {}",
                self.settings.model
            )));
        }
        if !response.status().is_success() {
            return Err(http::from_response(response).await);
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::invalid(format!("Failed to parse response: {}", e)))?;
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl ExtractionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn extract(&self, request: &ExtractionRequest) -> ExtractionResult {
        let started = Instant::now();
        let raw = self.complete(request).await;
        parser::finish(self, started, raw)
    }

    fn validate_response(&self, extracted: &ExtractedFields) -> ValidationOutcome {
        self.validator.validate(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::{DocumentKind, ErrorKind};

    fn request(kind: DocumentKind, text: Option<&str>) -> ExtractionRequest {
        ExtractionRequest {
            file_name: "scan.pdf".to_string(),
            content: vec![1, 2, 3],
            kind,
            mime_type: "image/png".to_string(),
            text: text.map(str::to_string),
            categories: vec![],
        }
    }

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new(DEFAULT_ENDPOINT, "llava").unwrap();
        assert_eq!(provider.settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(provider.settings.model, "llava");
    }

    #[test]
    fn test_image_goes_in_images() {
        let provider = OllamaProvider::new(DEFAULT_ENDPOINT, "llava").unwrap();
        let body = serde_json::to_value(provider.build_body(&request(DocumentKind::Image, None)).unwrap())
            .unwrap();
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["images"][0], "AQID");
    }

    #[test]
    fn test_pdf_with_text_has_no_images() {
        let provider = OllamaProvider::new(DEFAULT_ENDPOINT, "llava").unwrap();
        let body = serde_json::to_value(
            provider
                .build_body(&request(DocumentKind::Pdf, Some("Invoice 7")))
                .unwrap(),
        )
        .unwrap();
        assert!(body["messages"][0].get("images").is_none());
    }

    #[tokio::test]
    async fn test_pdf_without_text_is_permanent() {
        let provider = OllamaProvider::new(DEFAULT_ENDPOINT, "llava").unwrap();
        let result = provider.extract(&request(DocumentKind::Pdf, None)).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Permanent));
    }

    #[tokio::test]
    async fn test_ollama_error_handling() {
        // Nothing listens on the discard port
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llava").unwrap();
        let result = provider.extract(&request(DocumentKind::Image, None)).await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::Transient));
    }

    // Integration tests (requires running Ollama)
    #[tokio::test]
    #[ignore]
    async fn test_ollama_extract_integration() {
        let provider = OllamaProvider::new(DEFAULT_ENDPOINT, "llava").unwrap();
        let result = provider.extract(&request(DocumentKind::Pdf, Some("Coffee 4.50 2025-01-15"))).await;
        assert_eq!(result.provider, "ollama");
    }
}
