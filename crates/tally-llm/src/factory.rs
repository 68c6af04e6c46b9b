//! Provider selection from configuration

use crate::{
    AnthropicProvider, ExtractionProvider, GeminiProvider, LlmError, OllamaProvider,
    OpenAiProvider,
};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tally_gatekeeper::ResponseValidator;
use tracing::info;

/// The closed set of backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::Ollama => "llava",
        }
    }

    /// API base URL used when none is configured
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variable holding the API key, if the backend needs one
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

/// Provider section of the application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which backend to use
    pub kind: ProviderKind,

    /// Model name (backend default when unset)
    pub model: Option<String>,

    /// API base URL (backend default when unset)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key (backend default when unset)
    pub api_key_env: Option<String>,

    /// Whole-request HTTP timeout in seconds
    pub request_timeout_secs: u64,

    /// Completion token limit
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            model: None,
            endpoint: None,
            api_key_env: None,
            request_timeout_secs: 60,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl ProviderConfig {
    /// Default configuration for a given backend
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Effective model name
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Effective base URL, without a trailing slash
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
            .trim_end_matches('/')
    }

    /// Effective API key variable name
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the API key from the environment
    ///
    /// Returns `Ok(None)` for backends that need no key.
    pub fn resolve_api_key(&self) -> Result<Option<String>, LlmError> {
        let Some(var) = self.api_key_env() else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
            _ if self.kind == ProviderKind::Ollama => Ok(None),
            _ => Err(LlmError::MissingApiKey {
                provider: self.kind.to_string(),
                env_var: var.to_string(),
            }),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model().trim().is_empty() {
            return Err(LlmError::Config("model must not be empty".to_string()));
        }
        let endpoint = self.endpoint();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(LlmError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(LlmError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(LlmError::Config(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::Config(format!(
                "temperature {} out of range [0.0, 2.0]",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Resolved settings shared by the HTTP adapters
#[derive(Debug, Clone)]
pub(crate) struct ProviderSettings {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Resolve settings, rejecting keys that cannot travel in a header
    pub fn resolve(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        config.validate()?;
        if let Some(key) = &api_key {
            if key.is_empty() || HeaderValue::from_str(key).is_err() {
                return Err(LlmError::InvalidApiKey(config.kind.to_string()));
            }
        }
        Ok(Self {
            model: config.model().to_string(),
            endpoint: config.endpoint().to_string(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.request_timeout(),
        })
    }

    /// Key for a backend that cannot work without one
    pub fn require_key(&self, kind: ProviderKind, env_var: Option<&str>) -> Result<String, LlmError> {
        self.api_key.clone().ok_or_else(|| LlmError::MissingApiKey {
            provider: kind.to_string(),
            env_var: env_var.unwrap_or("<unset>").to_string(),
        })
    }
}

/// Build the configured provider, reading its API key from the environment
pub fn build_provider(
    config: &ProviderConfig,
    validator: ResponseValidator,
) -> Result<Arc<dyn ExtractionProvider>, LlmError> {
    let api_key = config.resolve_api_key()?;
    build_provider_with_key(config, api_key, validator)
}

/// Build the configured provider with an explicit API key
pub fn build_provider_with_key(
    config: &ProviderConfig,
    api_key: Option<String>,
    validator: ResponseValidator,
) -> Result<Arc<dyn ExtractionProvider>, LlmError> {
    let provider: Arc<dyn ExtractionProvider> = match config.kind {
        ProviderKind::OpenAi => {
            Arc::new(OpenAiProvider::from_config(config, api_key)?.with_validator(validator))
        }
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::from_config(config, api_key)?.with_validator(validator))
        }
        ProviderKind::Gemini => {
            Arc::new(GeminiProvider::from_config(config, api_key)?.with_validator(validator))
        }
        ProviderKind::Ollama => {
            Arc::new(OllamaProvider::from_config(config)?.with_validator(validator))
        }
    };

    info!(
        provider = provider.name(),
        model = config.model(),
        "Extraction provider ready"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let config = ProviderConfig::for_kind(ProviderKind::Anthropic);
        assert_eq!(config.endpoint(), "https://api.anthropic.com/v1");
        assert_eq!(config.api_key_env(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(ProviderConfig::for_kind(ProviderKind::Ollama).api_key_env(), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!(matches!(
            "watson".parse::<ProviderKind>(),
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_kind_deserializes_lowercase() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"kind": "openai", "model": "gpt-4o"}"#).unwrap();
        assert_eq!(config.kind, ProviderKind::OpenAi);
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let config = ProviderConfig {
            endpoint: Some("http://localhost:8080/v1/".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(config.endpoint(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_missing_api_key_fails_construction() {
        let config = ProviderConfig {
            api_key_env: Some("TALLY_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ProviderConfig::for_kind(ProviderKind::Gemini)
        };
        match build_provider(&config, ResponseValidator::default_config()) {
            Err(LlmError::MissingApiKey { provider, env_var }) => {
                assert_eq!(provider, "gemini");
                assert_eq!(env_var, "TALLY_TEST_KEY_THAT_IS_NEVER_SET");
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("expected a missing key error"),
        }
    }

    #[test]
    fn test_explicit_key_builds_each_provider() {
        for kind in [ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::Gemini] {
            let provider = build_provider_with_key(
                &ProviderConfig::for_kind(kind),
                Some("sk-test".to_string()),
                ResponseValidator::default_config(),
            )
            .unwrap();
            assert_eq!(provider.name(), kind.as_str());
        }
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = build_provider(
            &ProviderConfig::for_kind(ProviderKind::Ollama),
            ResponseValidator::default_config(),
        )
        .unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_key_with_newline_is_rejected() {
        let result = build_provider_with_key(
            &ProviderConfig::default(),
            Some("sk-\nbroken".to_string()),
            ResponseValidator::default_config(),
        );
        assert!(matches!(result, Err(LlmError::InvalidApiKey(_))));
    }

    #[test]
    fn test_invalid_config() {
        let config = ProviderConfig {
            endpoint: Some("ftp://example.com".to_string()),
            ..ProviderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ProviderConfig {
            temperature: 3.0,
            ..ProviderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
