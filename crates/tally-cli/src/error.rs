//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider construction error
    #[error(transparent)]
    Llm(#[from] tally_llm::LlmError),

    /// Processor error
    #[error(transparent)]
    Processor(#[from] tally_processor::ProcessorError),

    /// Monitor error
    #[error(transparent)]
    Monitor(#[from] tally_monitor::MonitorError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A one-shot extraction did not succeed
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}
