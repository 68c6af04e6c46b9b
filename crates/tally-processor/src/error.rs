//! Error types for the Document Processor

use tally_gatekeeper::GatekeeperError;
use tally_llm::LlmError;
use thiserror::Error;

/// Errors raised while setting up a processor
///
/// Processing itself never fails: every outcome becomes a review record.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Invalid processor settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid retry or provider settings
    #[error("Provider error: {0}")]
    Llm(#[from] LlmError),

    /// Invalid validation settings
    #[error("Validation error: {0}")]
    Validation(#[from] GatekeeperError),
}
