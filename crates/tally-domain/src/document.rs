//! Source documents and their lifecycle in the watch directory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Kind of a source document, derived from its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Portable Document Format (`.pdf`)
    Pdf,

    /// Raster image (`.png`, `.jpg`, `.jpeg`)
    Image,
}

impl DocumentKind {
    /// Detect the kind from a path's extension (case-insensitive)
    ///
    /// Returns `None` for every extension the pipeline does not ingest.
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_domain::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::from_path("scan.PDF"), Some(DocumentKind::Pdf));
    /// assert_eq!(DocumentKind::from_path("receipt.jpeg"), Some(DocumentKind::Image));
    /// assert_eq!(DocumentKind::from_path("notes.txt"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" => Some(DocumentKind::Image),
            _ => None,
        }
    }

    /// MIME type for a path of this kind
    pub fn mime_type(&self, path: impl AsRef<Path>) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Image => {
                let is_png = path
                    .as_ref()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("png"))
                    .unwrap_or(false);
                if is_png {
                    "image/png"
                } else {
                    "image/jpeg"
                }
            }
        }
    }

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a source document
///
/// ```text
/// Detected → Stabilizing → Queued → Processing → {Succeeded | Failed} → Archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// A filesystem event fired for the path
    Detected,

    /// Waiting for size and mtime to stop changing
    Stabilizing,

    /// Waiting in the processing queue
    Queued,

    /// Handed to the document processor
    Processing,

    /// Extraction produced a successful review record
    Succeeded,

    /// Extraction produced a failed review record
    Failed,

    /// Original moved out of the watch directory
    Archived,
}

impl DocumentState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        use DocumentState::*;
        matches!(
            (self, next),
            (Detected, Stabilizing)
                | (Stabilizing, Queued)
                | (Queued, Processing)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, Archived)
                | (Failed, Archived)
        )
    }

    /// Whether extraction has finished for this document
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentState::Succeeded | DocumentState::Failed | DocumentState::Archived
        )
    }
}

/// Error returned when a lifecycle transition is not allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    /// State the document was in
    pub from: DocumentState,
    /// State that was requested
    pub to: DocumentState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid document transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Duplicate-detection key: canonical path plus size and modification time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Canonical path of the file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, if the platform reports one
    pub modified: Option<SystemTime>,
}

impl Fingerprint {
    /// Build a fingerprint from already-fetched metadata
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        Self {
            path: path.into(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    /// Canonicalize `path` and read its metadata
    pub fn of(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let canonical = path.as_ref().canonicalize()?;
        let metadata = std::fs::metadata(&canonical)?;
        Ok(Self::from_metadata(canonical, &metadata))
    }
}

/// A file discovered for processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Absolute path in the watch directory
    pub path: PathBuf,

    /// Detected kind, `None` for unsupported extensions
    pub kind: Option<DocumentKind>,

    /// When the monitor first saw the file
    pub detected_at: SystemTime,

    /// Current lifecycle state
    pub state: DocumentState,

    /// Fingerprint recorded when the document was queued
    pub fingerprint: Option<Fingerprint>,
}

impl SourceDocument {
    /// Create a freshly detected document
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            kind: DocumentKind::from_path(&path),
            path,
            detected_at: SystemTime::now(),
            state: DocumentState::Detected,
            fingerprint: None,
        }
    }

    /// Attach the fingerprint used for at-most-once processing
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// File name component, lossily converted
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Move to `next` if the transition is legal
    pub fn transition(&mut self, next: DocumentState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path("a.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path("a.Pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path("a.PNG"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_path("a.JpG"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_path("a.gif"), None);
        assert_eq!(DocumentKind::from_path("no_extension"), None);
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(DocumentKind::Pdf.mime_type("x.pdf"), "application/pdf");
        assert_eq!(DocumentKind::Image.mime_type("x.PNG"), "image/png");
        assert_eq!(DocumentKind::Image.mime_type("x.jpeg"), "image/jpeg");
    }

    #[test]
    fn test_full_lifecycle() {
        let mut doc = SourceDocument::new("/watch/receipt.jpg");
        assert_eq!(doc.state, DocumentState::Detected);

        for next in [
            DocumentState::Stabilizing,
            DocumentState::Queued,
            DocumentState::Processing,
            DocumentState::Failed,
            DocumentState::Archived,
        ] {
            doc.transition(next).unwrap();
        }
        assert_eq!(doc.state, DocumentState::Archived);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut doc = SourceDocument::new("/watch/receipt.jpg");
        let err = doc.transition(DocumentState::Processing).unwrap_err();
        assert_eq!(err.from, DocumentState::Detected);
        assert_eq!(err.to, DocumentState::Processing);

        assert!(!DocumentState::Archived.can_transition_to(DocumentState::Queued));
        assert!(!DocumentState::Succeeded.can_transition_to(DocumentState::Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(DocumentState::Succeeded.is_terminal());
        assert!(DocumentState::Failed.is_terminal());
        assert!(!DocumentState::Processing.is_terminal());
    }

    #[test]
    fn test_unsupported_document_has_no_kind() {
        let doc = SourceDocument::new("/watch/readme.txt");
        assert!(doc.kind.is_none());
        assert_eq!(doc.file_name(), "readme.txt");
    }
}
