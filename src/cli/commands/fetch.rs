//! Fetch command - cache a repository archive

use super::build_storage;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::QuarryResult;
use crate::storage::commit_sidecar;
use console::style;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> QuarryResult<()> {
    let storage = build_storage(config)?;
    let path = storage
        .ensure_repo(
            args.user.as_deref().unwrap_or(""),
            &args.repo,
            args.branch.as_deref(),
            &config.github.token,
            args.force,
        )
        .await?;

    if let Ok(commit) = std::fs::read_to_string(commit_sidecar(&path)) {
        eprintln!(
            "{} {} at {}",
            style("Cached").green().bold(),
            args.repo,
            commit.trim()
        );
    }
    println!("{}", path.display());
    Ok(())
}
