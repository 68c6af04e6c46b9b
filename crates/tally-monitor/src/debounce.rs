//! Stability tracking for files that may still be written
//!
//! A path is ready once its size and modification time have not changed for
//! the whole debounce window. Every filesystem event for the path restarts
//! the window. The tracker owns each document from first detection until it
//! is ready, so `detected_at` is the time the first event arrived.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tally_domain::{DocumentState, SourceDocument};
use tracing::warn;

/// Size and mtime observed for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSample {
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: Option<SystemTime>,
}

impl FileSample {
    /// Sample a file from the filesystem
    pub fn read(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
        }
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct Pending {
    order: u64,
    document: SourceDocument,
    sample: Option<FileSample>,
    stable_since: Instant,
}

/// Result of one polling round
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Documents that stayed unchanged for the window, in first-detected order
    pub ready: Vec<SourceDocument>,
    /// Paths that disappeared or stopped being regular files
    pub vanished: Vec<PathBuf>,
}

/// Tracks files waiting to become stable
#[derive(Debug)]
pub struct StabilityTracker {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
    next_order: u64,
}

impl StabilityTracker {
    /// Create a tracker with the given debounce window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            next_order: 0,
        }
    }

    /// Note an event for `path`
    ///
    /// Returns `true` if the path was not already pending.
    pub fn observe(&mut self, path: PathBuf, now: Instant) -> bool {
        if let Some(pending) = self.pending.get_mut(&path) {
            pending.sample = None;
            pending.stable_since = now;
            return false;
        }

        let mut document = SourceDocument::new(path.clone());
        if let Err(e) = document.transition(DocumentState::Stabilizing) {
            warn!(path = %path.display(), "{}", e);
        }

        let order = self.next_order;
        self.next_order += 1;
        self.pending.insert(
            path,
            Pending {
                order,
                document,
                sample: None,
                stable_since: now,
            },
        );
        true
    }

    /// Re-sample every pending path
    ///
    /// A path whose sample differs from the last one restarts its window.
    /// Ready and vanished paths stop being tracked.
    pub fn poll<F>(&mut self, now: Instant, mut sample: F) -> PollOutcome
    where
        F: FnMut(&Path) -> io::Result<FileSample>,
    {
        let mut ready = Vec::new();
        let mut vanished = Vec::new();

        for (path, pending) in self.pending.iter_mut() {
            let current = match sample(path) {
                Ok(current) => current,
                Err(_) => {
                    vanished.push((pending.order, path.clone()));
                    continue;
                }
            };

            if pending.sample != Some(current) {
                pending.sample = Some(current);
                pending.stable_since = now;
            } else if now.duration_since(pending.stable_since) >= self.window {
                ready.push((pending.order, path.clone()));
            }
        }

        ready.sort_by_key(|(order, _)| *order);
        vanished.sort_by_key(|(order, _)| *order);
        for (_, path) in &vanished {
            self.pending.remove(path);
        }

        PollOutcome {
            ready: ready
                .into_iter()
                .filter_map(|(_, path)| self.pending.remove(&path))
                .map(|pending| pending.document)
                .collect(),
            vanished: vanished.into_iter().map(|(_, p)| p).collect(),
        }
    }

    /// Forget every pending path, returning how many were dropped
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Whether `path` is waiting to stabilize
    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    /// Number of pending paths
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
