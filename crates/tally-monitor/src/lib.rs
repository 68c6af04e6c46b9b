//! Tally Document Monitor
//!
//! Watches an inbox directory, waits for new files to stop changing, runs
//! them through the document processor and archives the originals.
//!
//! # Overview
//!
//! The monitor is responsible for:
//! - **Detection**: filesystem events from `notify`, plus a scan of files
//!   already present on start
//! - **Filtering**: unsupported extensions, hidden files and partial
//!   downloads are ignored and left in place
//! - **Debounce**: a file is queued only after its size and modification
//!   time stay unchanged for the debounce window
//! - **At-most-once**: a fingerprint (path, size, mtime) guards against
//!   duplicate events
//! - **Archiving**: every processed original moves to the archive
//!   directory with a timestamp suffix, success or not
//!
//! ## Document lifecycle
//!
//! | State | Entered when |
//! |-------|--------------|
//! | **Detected** | a create/modify event arrives |
//! | **Stabilizing** | size and mtime are being sampled |
//! | **Queued** | unchanged for the debounce window |
//! | **Processing** | a worker picks it up |
//! | **Succeeded / Failed** | the review record is produced |
//! | **Archived** | the original is moved out of the watch directory |
//!
//! A failed archive move leaves the file in place; it is logged at error
//! level and listed by [`DocumentMonitor::unarchived`].
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_domain::MemorySink;
//! use tally_llm::MockProvider;
//! use tally_monitor::{DocumentMonitor, MonitorConfig};
//! use tally_processor::{DocumentProcessor, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(MockProvider::new("{}"));
//!     let processor = Arc::new(DocumentProcessor::new(provider, ProcessorConfig::default())?);
//!     let categories = Arc::new(vec!["Travel".to_string()]);
//!
//!     let monitor = DocumentMonitor::new(
//!         MonitorConfig::new("inbox", "archive"),
//!         processor,
//!         Arc::new(MemorySink::new()),
//!         categories,
//!     )?;
//!
//!     monitor.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     monitor.stop().await;
//!     println!("{}", monitor.metrics().summary());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod archive;
mod config;
pub mod debounce;
mod error;
mod metrics;
mod monitor;
pub mod queue;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use metrics::MonitorMetrics;
pub use monitor::DocumentMonitor;
