//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur while configuring the gatekeeper
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
