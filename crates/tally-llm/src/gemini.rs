//! Gemini Provider Implementation
//!
//! `generateContent` with the document as `inline_data` and JSON output
//! requested through the generation config.

use crate::factory::{ProviderConfig, ProviderSettings};
use crate::prompt::{attachment, Attachment, PromptBuilder};
use crate::{http, parser, ExtractionProvider, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tally_domain::{ExtractedFields, ExtractionError, ExtractionRequest, ExtractionResult};
use tally_gatekeeper::{ResponseValidator, ValidationOutcome};
use tracing::debug;

/// Google Gemini provider
pub struct GeminiProvider {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    validator: ResponseValidator,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiProvider {
    /// Create a provider from configuration and an API key
    pub fn from_config(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        let settings = ProviderSettings::resolve(config, api_key)?;
        let api_key = settings.require_key(config.kind, config.api_key_env())?;
        let client = http::build_client(settings.timeout)?;
        Ok(Self {
            settings,
            api_key,
            client,
            validator: ResponseValidator::default_config(),
        })
    }

    /// Use a specific validator for the self-check
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    fn build_body(&self, request: &ExtractionRequest) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: PromptBuilder::for_request(request).build(),
        }];
        let inline = match attachment(request) {
            Attachment::None => None,
            Attachment::Image { mime, data } => Some(InlineData {
                mime_type: mime.to_string(),
                data,
            }),
            Attachment::Pdf { data } => Some(InlineData {
                mime_type: "application/pdf".to_string(),
                data,
            }),
        };
        if let Some(inline_data) = inline {
            parts.push(Part::InlineData { inline_data });
        }

        GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
                response_mime_type: "application/json",
            },
        }
    }

    async fn complete(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint, self.settings.model
        );
        debug!(provider = "gemini", model = %self.settings.model, file = %request.file_name, "Sending request");

        let response: GenerateResponse = http::send_json(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&self.build_body(request)),
        )
        .await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            // Safety blocks come back as a candidate without content
            return Err(ExtractionError::invalid("Response contained no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExtractionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
    use crate::ProviderKind;
    use tally_domain::DocumentKind;

    #[test]
    fn test_body_shape() {
        let provider = GeminiProvider::from_config(
            &ProviderConfig::for_kind(ProviderKind::Gemini),
            Some("AIza-test".to_string()),
        )
        .unwrap();
        let request = ExtractionRequest {
            file_name: "receipt.jpg".to_string(),
            content: vec![1, 2, 3],
            kind: DocumentKind::Image,
            mime_type: "image/jpeg".to_string(),
            text: None,
            categories: vec![],
        };

        let body = serde_json::to_value(provider.build_body(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert!(parts[0]["text"].is_string());
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_missing_key() {
        let result = GeminiProvider::from_config(&ProviderConfig::for_kind(ProviderKind::Gemini), None);
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }
}
