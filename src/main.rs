//! Quarry - mirror cache for GitHub repository archives
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use quarry::cli::{Cli, Commands};
use quarry::config::ConfigManager;
use quarry::error::QuarryResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> QuarryResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("quarry=warn"),
        1 => EnvFilter::new("quarry=info"),
        _ => EnvFilter::new("quarry=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    // Dispatch to command
    match cli.command {
        Commands::Serve(args) => quarry::cli::commands::serve(args, &config).await,
        Commands::Fetch(args) => quarry::cli::commands::fetch(args, &config).await,
        Commands::Get(args) => quarry::cli::commands::get(args, &config).await,
        Commands::List(args) => quarry::cli::commands::list(args, &config).await,
        Commands::Delete(args) => quarry::cli::commands::delete(args, &config).await,
        Commands::Clean(args) => quarry::cli::commands::clean(args, &config).await,
    }
}
