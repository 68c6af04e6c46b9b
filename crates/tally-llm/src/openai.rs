//! OpenAI Provider Implementation
//!
//! Chat completions with the document attached as an `image_url` data URL
//! or, for PDFs without embedded text, as a `file` part. JSON output mode is
//! requested so the reply is a bare object.
//!
//! # Examples
//!
//! ```no_run
//! use tally_llm::{OpenAiProvider, ProviderConfig, ProviderKind};
//!
//! let config = ProviderConfig::for_kind(ProviderKind::OpenAi);
//! let provider = OpenAiProvider::from_config(&config, Some("sk-...".to_string())).unwrap();
//! ```

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

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    validator: ResponseValidator,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct FileData {
    filename: String,
    file_data: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a provider from configuration and an API key
    ///
    /// # Errors
    ///
    /// Fails when the key is missing or unusable, or the configuration is
    /// invalid.
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

    fn build_body(&self, request: &ExtractionRequest) -> ChatRequest {
        let mut content = vec![ContentPart::Text {
            text: PromptBuilder::for_request(request).build(),
        }];
        match attachment(request) {
            Attachment::None => {}
            Attachment::Image { mime, data } => content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", mime, data),
                },
            }),
            Attachment::Pdf { data } => content.push(ContentPart::File {
                file: FileData {
                    filename: request.file_name.clone(),
                    file_data: format!("data:application/pdf;base64,{}", data),
                },
            }),
        }

        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    async fn complete(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let url = format!("{}/chat/completions", self.settings.endpoint);
        debug!(provider = "openai", model = %self.settings.model, file = %request.file_name, "Sending request");

        let response: ChatResponse = http::send_json(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&self.build_body(request)),
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::invalid("Response contained no message content"))
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
