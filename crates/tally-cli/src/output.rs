//! Review record output for the CLI.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tally_domain::{ReviewRecord, ReviewSink};

/// Review sink that writes one JSON object per line.
///
/// Stands in for the review store when running from the command line.
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    /// Write records to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Append records to a file, creating it if needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Write records to any writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl ReviewSink for JsonLinesSink {
    type Error = io::Error;

    fn submit(&self, record: ReviewRecord) -> std::result::Result<(), Self::Error> {
        let line = serde_json::to_string(&record)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()
    }
}

/// Render a record for the `process` command.
pub fn format_record(record: &ReviewRecord, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(record)?
    } else {
        serde_json::to_string_pretty(record)?
    };
    Ok(json)
}
