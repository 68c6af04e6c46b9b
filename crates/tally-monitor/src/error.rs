//! Error types for monitor operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the document monitor
///
/// Processing failures never appear here; they become review records.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The watch directory does not exist or is not a directory
    #[error("Watch directory not found: {}", .0.display())]
    WatchDirMissing(PathBuf),

    /// The filesystem watcher could not be created or attached
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Filesystem error outside of archiving
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Moving a processed document into the archive failed
    #[error("Failed to archive {}: {source}", path.display())]
    Archive {
        /// Document that stayed in the watch directory
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
