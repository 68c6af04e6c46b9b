//! Tally Gatekeeper
//!
//! Checks extracted transaction data before it becomes a review record.
//!
//! The Gatekeeper provides:
//! - Structural validation of the field contract (required fields, types, amounts)
//! - A document-semantics cross-check (invoice ⇒ income, receipt ⇒ expense)
//!
//! Providers run the validator as a self-check before reporting success, and
//! the processor runs it again before emitting a record.
//!
//! # Examples
//!
//! ```
//! use tally_domain::{fields, ExtractedFields};
//! use tally_gatekeeper::ResponseValidator;
//!
//! let validator = ResponseValidator::default_config();
//! let extracted = ExtractedFields::new()
//!     .with(fields::DATE, "2025-01-15")
//!     .with(fields::TYPE, "expense")
//!     .with(fields::CATEGORY, "Office Supplies")
//!     .with(fields::AMOUNT, 45.99);
//!
//! assert!(validator.validate(&extracted).is_valid());
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod semantics;
mod validator;

pub use config::ValidationConfig;
pub use error::GatekeeperError;
pub use semantics::{SemanticsCheck, SemanticsVerdict};
pub use validator::{ResponseValidator, ValidationOutcome, Violation};
