//! Configuration for the document monitor
//!
//! Directories, debounce timing and worker pool size.

use crate::MonitorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the document monitor
///
/// # Examples
///
/// ```
/// use tally_monitor::MonitorConfig;
///
/// let config = MonitorConfig::new("inbox", "inbox/archive");
/// assert_eq!(config.debounce_ms, 1000);
/// assert_eq!(config.workers, 1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory watched for new documents (not recursive)
    pub watch_dir: PathBuf,

    /// Where originals are moved after processing
    pub archive_dir: PathBuf,

    /// How long size and mtime must stay unchanged before a file is queued
    /// Default: 1000 ms
    pub debounce_ms: u64,

    /// How often pending files are re-sampled
    /// Default: 250 ms
    pub poll_interval_ms: u64,

    /// Number of concurrent processing workers
    /// Default: 1 (first-detected order)
    pub workers: usize,

    /// Capacity of the channel between the watcher thread and the event loop
    /// Default: 256
    pub event_channel_capacity: usize,

    /// Queue files already present in the watch directory on start
    /// Default: true
    pub scan_existing: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("inbox"),
            archive_dir: PathBuf::from("archive"),
            debounce_ms: 1000,
            poll_interval_ms: 250,
            workers: 1,
            event_channel_capacity: 256,
            scan_existing: true,
        }
    }
}

impl MonitorConfig {
    /// Default timing with the given directories
    pub fn new(watch_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            archive_dir: archive_dir.into(),
            ..Self::default()
        }
    }

    /// Debounce window as a `Duration`
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.watch_dir.as_os_str().is_empty() {
            return Err(MonitorError::Config("watch_dir must be set".to_string()));
        }
        if self.archive_dir.as_os_str().is_empty() {
            return Err(MonitorError::Config("archive_dir must be set".to_string()));
        }
        if self.watch_dir == self.archive_dir {
            return Err(MonitorError::Config(
                "archive_dir must differ from watch_dir".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(MonitorError::Config(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(MonitorError::Config("workers must be >= 1".to_string()));
        }
        if self.event_channel_capacity == 0 {
            return Err(MonitorError::Config(
                "event_channel_capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
