//! Trait definitions for external collaborators
//!
//! These traits define the boundary between the ingestion pipeline and the
//! review store that owns categories and persisted records.

use crate::ReviewRecord;
use std::sync::Mutex;

/// Receiver of terminal review records
///
/// Implemented by the external store or UI layer.
pub trait ReviewSink {
    /// Error type for sink operations
    type Error;

    /// Hand a finished record to the store
    fn submit(&self, record: ReviewRecord) -> Result<(), Self::Error>;
}

/// Supplier of the valid transaction categories
///
/// Queried on every processing call; the pipeline never caches the list.
pub trait CategorySource {
    /// Current category whitelist
    fn categories(&self) -> Vec<String>;
}

impl CategorySource for Vec<String> {
    fn categories(&self) -> Vec<String> {
        self.clone()
    }
}

/// In-memory sink that keeps every record, for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ReviewRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records received so far
    pub fn records(&self) -> Vec<ReviewRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of records received so far
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether no record has been received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReviewSink for MemorySink {
    type Error = String;

    fn submit(&self, record: ReviewRecord) -> Result<(), Self::Error> {
        self.records
            .lock()
            .map_err(|e| format!("Sink lock poisoned: {}", e))?
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentClass, ExtractionError, ExtractionResult};
    use std::time::Duration;

    #[test]
    fn test_memory_sink_collects_records() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        let result = ExtractionResult::failed("mock", ExtractionError::invalid("x"), Duration::ZERO);
        sink.submit(ReviewRecord::new("/a.pdf", None, DocumentClass::Other, result))
            .unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].source_path.to_str(), Some("/a.pdf"));
    }

    #[test]
    fn test_vec_is_a_category_source() {
        let categories = vec!["Travel".to_string(), "Meals".to_string()];
        assert_eq!(categories.categories(), categories);
    }
}
