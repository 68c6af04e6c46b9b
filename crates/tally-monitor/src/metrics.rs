//! Metrics for monitor operations
//!
//! Counters for detection, queueing, processing outcomes and archiving.

use serde::{Deserialize, Serialize};

/// Counters collected while the monitor runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorMetrics {
    /// Supported files seen for the first time
    pub detected: u64,

    /// Events ignored (unsupported extension, hidden or temporary file)
    pub ignored: u64,

    /// Stable files already queued or in flight
    pub duplicates: u64,

    /// Files that vanished before they stabilized
    pub dropped: u64,

    /// Documents pushed onto the processing queue
    pub queued: u64,

    /// Documents whose review record reports success
    pub succeeded: u64,

    /// Documents whose review record reports failure
    pub failed: u64,

    /// Originals moved into the archive
    pub archived: u64,

    /// Originals that could not be archived
    pub archive_failures: u64,

    /// Records the review sink rejected
    pub sink_failures: u64,
}

impl MonitorMetrics {
    /// Create new metrics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly detected file
    pub fn record_detected(&mut self) {
        self.detected += 1;
    }

    /// Record an ignored event
    pub fn record_ignored(&mut self) {
        self.ignored += 1;
    }

    /// Record a duplicate suppressed by the fingerprint guard
    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    /// Record a file that vanished while stabilizing
    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Record a queued document
    pub fn record_queued(&mut self) {
        self.queued += 1;
    }

    /// Record a processing outcome
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Record a successful archive move
    pub fn record_archived(&mut self) {
        self.archived += 1;
    }

    /// Record a failed archive move
    pub fn record_archive_failure(&mut self) {
        self.archive_failures += 1;
    }

    /// Record a record rejected by the review sink
    pub fn record_sink_failure(&mut self) {
        self.sink_failures += 1;
    }

    /// Documents that finished processing
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Success rate over processed documents (0.0 when none)
    pub fn success_rate(&self) -> f64 {
        match self.processed() {
            0 => 0.0,
            n => self.succeeded as f64 / n as f64,
        }
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        format!(
            "Monitor Metrics:\n\
             - Detected: {}\n\
             - Ignored: {}\n\
             - Duplicates: {}\n\
             - Dropped: {}\n\
             - Queued: {}\n\
             - Succeeded: {}\n\
             - Failed: {}\n\
             - Success rate: {:.1}%\n\
             - Archived: {}\n\
             - Archive failures: {}\n\
             - Sink failures: {}",
            self.detected,
            self.ignored,
            self.duplicates,
            self.dropped,
            self.queued,
            self.succeeded,
            self.failed,
            self.success_rate() * 100.0,
            self.archived,
            self.archive_failures,
            self.sink_failures
        )
    }
}
