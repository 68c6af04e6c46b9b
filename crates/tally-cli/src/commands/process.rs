//! Process command implementation.

use super::build_processor;
use crate::cli::ProcessArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::format_record;

/// Execute the process command.
///
/// Prints the review record and fails when extraction did not succeed.
pub async fn execute_process(args: ProcessArgs, config: &AppConfig) -> Result<()> {
    if !args.file.is_file() {
        return Err(CliError::InvalidInput(format!(
            "{} is not a file",
            args.file.display()
        )));
    }

    let processor = build_processor(config)?;
    let record = processor
        .process_path(&args.file, &config.category_list())
        .await;

    println!("{}", format_record(&record, args.compact)?);

    match &record.result.error {
        Some(error) => Err(CliError::ExtractionFailed(format!(
            "{} ({})",
            error.message,
            error.kind.as_str()
        ))),
        None => Ok(()),
    }
}
