//! Review records - the terminal hand-off to the external store

use crate::document::DocumentKind;
use crate::extraction::{DocumentClass, ExtractionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a review record based on UUIDv7
///
/// UUIDv7 keeps records chronologically sortable in the downstream store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Generate a new UUIDv7-based RecordId
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_domain::RecordId;
    ///
    /// let a = RecordId::new();
    /// let b = RecordId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse a RecordId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid record id: {}", e))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of processing one source document
///
/// Created exactly once per processing attempt and never mutated by the
/// pipeline afterwards; retention is owned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Record identifier
    pub id: RecordId,

    /// Path of the originating document in the watch directory
    pub source_path: PathBuf,

    /// Detected document kind, `None` for unsupported files
    pub document_kind: Option<DocumentKind>,

    /// Invoice / receipt classification used for the semantics check
    pub document_class: DocumentClass,

    /// Provider outcome after validation and penalties
    pub result: ExtractionResult,

    /// Whether a human should look at this record before accepting it
    pub needs_review: bool,

    /// Reasons behind `needs_review`
    pub review_notes: Vec<String>,

    /// Creation timestamp (seconds since Unix epoch)
    pub created_at: u64,
}

impl ReviewRecord {
    /// Create a record for `source_path`
    pub fn new(
        source_path: impl Into<PathBuf>,
        document_kind: Option<DocumentKind>,
        document_class: DocumentClass,
        result: ExtractionResult,
    ) -> Self {
        Self {
            id: RecordId::new(),
            source_path: source_path.into(),
            document_kind,
            document_class,
            result,
            needs_review: false,
            review_notes: Vec::new(),
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Flag the record for review with a note
    pub fn flag(mut self, note: impl Into<String>) -> Self {
        self.needs_review = true;
        self.review_notes.push(note.into());
        self
    }

    /// Whether extraction succeeded
    pub fn is_success(&self) -> bool {
        self.result.success
    }
}
