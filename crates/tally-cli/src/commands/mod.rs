//! Command implementations.

pub mod check;
pub mod process;
pub mod watch;

pub use self::check::execute_check_config;
pub use self::process::execute_process;
pub use self::watch::execute_watch;

use crate::config::AppConfig;
use crate::error::Result;
use tally_gatekeeper::ResponseValidator;
use tally_llm::build_provider;
use tally_processor::DocumentProcessor;

/// Build the configured provider and a processor around it.
pub(crate) fn build_processor(config: &AppConfig) -> Result<DocumentProcessor> {
    let validator = ResponseValidator::new(config.processor.validation.clone());
    let provider = build_provider(&config.provider, validator)?;
    Ok(DocumentProcessor::new(provider, config.processor.clone())?)
}
