//! Tally Domain Layer
//!
//! Core data model for the document ingestion pipeline. This crate performs
//! no network or watch-directory I/O; it defines the value objects that flow
//! between the monitor, the processor and the provider family, plus the trait
//! seams towards the external review store.
//!
//! ## Key Concepts
//!
//! - **SourceDocument**: a file discovered in the watch directory, with its lifecycle state
//! - **ExtractionRequest**: immutable input to a single provider call
//! - **ExtractionResult**: the provider boundary contract (fields or a classified error)
//! - **ReviewRecord**: the terminal hand-off object for human review
//! - **Fingerprint**: path + size + mtime, the at-most-once processing key

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod extraction;
pub mod fields;
pub mod review;
pub mod traits;

// Re-exports for convenience
pub use document::{DocumentKind, DocumentState, Fingerprint, InvalidTransition, SourceDocument};
pub use extraction::{
    DocumentClass, ErrorKind, ExtractionError, ExtractionRequest, ExtractionResult,
    TransactionType,
};
pub use fields::{parse_amount, ExtractedFields, REQUIRED_FIELDS};
pub use review::{RecordId, ReviewRecord};
pub use traits::{CategorySource, MemorySink, ReviewSink};
