//! Tally CLI - financial document ingestion from the command line.

use clap::Parser;
use tally_cli::commands;
use tally_cli::{AppConfig, Cli, Command};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> tally_cli::Result<()> {
    let cli = Cli::parse();
    tally_cli::init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Watch(args) => commands::execute_watch(args, &config).await?,
        Command::Process(args) => commands::execute_process(args, &config).await?,
        Command::CheckConfig => commands::execute_check_config(&config)?,
    }

    Ok(())
}
