//! Clean command - run one janitor sweep now

use super::build_storage;
use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::error::QuarryResult;
use std::time::Duration;

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> QuarryResult<()> {
    let retention = match args.days {
        Some(days) => Duration::from_secs(days * 24 * 3600),
        None => config.cache.retention(),
    };

    let storage = build_storage(config)?;
    let evicted = tokio::task::spawn_blocking(move || storage.cleanup_expired(retention))
        .await
        .map_err(|e| crate::error::QuarryError::Internal(e.to_string()))??;

    println!(
        "Evicted {} expired entr{}.",
        evicted,
        if evicted == 1 { "y" } else { "ies" }
    );
    Ok(())
}
