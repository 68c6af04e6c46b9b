//! Anthropic Provider Implementation
//!
//! Messages API with the document sent as a base64 `image` or `document`
//! block ahead of the prompt text.

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

/// API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages provider
pub struct AnthropicProvider {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    validator: ResponseValidator,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: Base64Source },
    Document { source: Base64Source },
}

#[derive(Debug, Serialize)]
struct Base64Source {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

impl Base64Source {
    fn new(media_type: impl Into<String>, data: String) -> Self {
        Self {
            kind: "base64",
            media_type: media_type.into(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
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

    fn build_body(&self, request: &ExtractionRequest) -> MessagesRequest {
        let mut content = Vec::with_capacity(2);
        match attachment(request) {
            Attachment::None => {}
            Attachment::Image { mime, data } => content.push(ContentBlock::Image {
                source: Base64Source::new(mime, data),
            }),
            Attachment::Pdf { data } => content.push(ContentBlock::Document {
                source: Base64Source::new("application/pdf", data),
            }),
        }
        content.push(ContentBlock::Text {
            text: PromptBuilder::for_request(request).build(),
        });

        MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Message {
                role: "user",
                content,
            }],
        }
    }

    async fn complete(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let url = format!("{}/messages", self.settings.endpoint);
        debug!(provider = "anthropic", model = %self.settings.model, file = %request.file_name, "Sending request");

        let response: MessagesResponse = http::send_json(
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&self.build_body(request)),
        )
        .await?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(ExtractionError::invalid("Response contained no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExtractionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
