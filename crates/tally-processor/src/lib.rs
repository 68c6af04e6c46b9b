//! Tally Document Processor
//!
//! Turns one source document into one review record.
//!
//! # Architecture
//!
//! ```text
//! SourceDocument → detect kind → preprocess → RetryExecutor → provider
//!               → ResponseValidator → SemanticsCheck → ReviewRecord
//! ```
//!
//! # Key Features
//!
//! - **Fail fast**: unsupported extensions and empty, unreadable or corrupt
//!   files become `Unprocessable` records without any provider call
//! - **PDF text**: embedded text is pulled out and sent in the prompt; PDFs
//!   without usable text are attached as files
//! - **Image normalization**: downscale, RGB8, re-encode
//! - **Defense in depth**: the processor re-validates every provider success
//! - **Review flags**: document-class contradictions, categories outside the
//!   whitelist and low confidence send a record to review without rejecting it
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_llm::MockProvider;
//! use tally_processor::{DocumentProcessor, ProcessorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(MockProvider::new(
//!     r#"{"date":"2025-01-15","type":"expense","category":"Office Supplies","amount":45.99}"#,
//! ));
//! let processor = DocumentProcessor::new(provider, ProcessorConfig::default())?;
//!
//! let categories = vec!["Office Supplies".to_string()];
//! let record = processor.process_path("inbox/receipt.jpg", &categories).await;
//! println!("success: {}, needs review: {}", record.is_success(), record.needs_review);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod classify;
mod config;
mod error;
pub mod preprocess;
mod processor;

pub use classify::classify_document;
pub use config::ProcessorConfig;
pub use error::ProcessorError;
pub use preprocess::PreparedDocument;
pub use processor::DocumentProcessor;
