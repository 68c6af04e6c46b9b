//! Configuration for the Document Processor

use crate::ProcessorError;
use serde::{Deserialize, Serialize};
use tally_gatekeeper::ValidationConfig;
use tally_llm::RetryPolicy;

/// Configuration for the Document Processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Images wider or taller than this are downscaled (pixels)
    pub max_image_dimension: u32,

    /// JPEG re-encoding quality (1-100)
    pub jpeg_quality: u8,

    /// Files larger than this are rejected as unprocessable (bytes)
    pub max_file_bytes: u64,

    /// Embedded PDF text shorter than this is ignored and the PDF is attached instead
    pub min_pdf_text_chars: usize,

    /// Successful extractions below this confidence are flagged for review
    pub review_confidence_threshold: f64,

    /// Retry behaviour for provider calls
    pub retry: RetryPolicy,

    /// Response validation rules
    pub validation: ValidationConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 4096,
            jpeg_quality: 90,
            max_file_bytes: 20 * 1024 * 1024,
            min_pdf_text_chars: 20,
            review_confidence_threshold: 0.5,
            retry: RetryPolicy::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Strict preset: every validation rule, more records sent to review
    pub fn strict() -> Self {
        Self {
            review_confidence_threshold: 0.7,
            validation: ValidationConfig::strict(),
            ..Self::default()
        }
    }

    /// Lenient preset: required fields only, fewer review flags
    pub fn lenient() -> Self {
        Self {
            review_confidence_threshold: 0.3,
            validation: ValidationConfig::permissive(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.max_image_dimension < 16 {
            return Err(ProcessorError::Config(
                "max_image_dimension must be at least 16".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ProcessorError::Config(format!(
                "jpeg_quality {} out of range [1, 100]",
                self.jpeg_quality
            )));
        }
        if self.max_file_bytes == 0 {
            return Err(ProcessorError::Config(
                "max_file_bytes must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.review_confidence_threshold) {
            return Err(ProcessorError::Config(format!(
                "review_confidence_threshold {} out of range [0.0, 1.0]",
                self.review_confidence_threshold
            )));
        }
        self.retry.validate()?;
        self.validation.validate()?;
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ProcessorError> {
        toml::from_str(toml_str)
            .map_err(|e| ProcessorError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ProcessorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ProcessorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}
