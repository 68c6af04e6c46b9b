//! Watch command implementation.

use super::build_processor;
use crate::cli::WatchArgs;
use crate::config::AppConfig;
use crate::error::Result;
use crate::output::JsonLinesSink;
use std::sync::Arc;
use tally_monitor::{DocumentMonitor, MonitorConfig};
use tracing::info;

/// Execute the watch command.
///
/// Runs until Ctrl+C, then stops accepting new files and drains the queue.
pub async fn execute_watch(args: WatchArgs, config: &AppConfig) -> Result<()> {
    let monitor_config = apply_overrides(config.monitor.clone(), &args);
    monitor_config.validate()?;

    let processor = Arc::new(build_processor(config)?);
    let sink = Arc::new(match &args.output {
        Some(path) => JsonLinesSink::append_to(path)?,
        None => JsonLinesSink::stdout(),
    });
    let categories = Arc::new(config.category_list());

    let monitor = DocumentMonitor::new(monitor_config, processor, sink, categories)?;
    monitor.start().await?;
    eprintln!(
        "Watching {} (Ctrl+C to stop)",
        monitor.config().watch_dir.display()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    monitor.stop().await;

    eprintln!("{}", monitor.metrics().summary());
    let unarchived = monitor.unarchived();
    if !unarchived.is_empty() {
        eprintln!("Documents left in the watch directory after archive failures:");
        for path in unarchived {
            eprintln!("  {}", path.display());
        }
    }
    Ok(())
}

/// Command-line flags take precedence over the configuration file.
fn apply_overrides(mut config: MonitorConfig, args: &WatchArgs) -> MonitorConfig {
    if let Some(dir) = &args.watch_dir {
        config.watch_dir = dir.clone();
    }
    if let Some(dir) = &args.archive_dir {
        config.archive_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_overrides() {
        let args = WatchArgs {
            output: None,
            watch_dir: Some(PathBuf::from("/tmp/in")),
            archive_dir: None,
            workers: Some(4),
        };
        let config = apply_overrides(MonitorConfig::default(), &args);
        assert_eq!(config.watch_dir, PathBuf::from("/tmp/in"));
        assert_eq!(config.archive_dir, MonitorConfig::default().archive_dir);
        assert_eq!(config.workers, 4);
    }
}
