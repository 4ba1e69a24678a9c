//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Quarry - mirror cache for GitHub repository archives
///
/// Fetches repository snapshots and package files once, stores them under a
/// per-user namespace, and serves them from disk until the remote moves on.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the API server and the janitor loop
    Serve(ServeArgs),

    /// Cache a repository archive and print its path
    Fetch(FetchArgs),

    /// Cache a package file from a URL and print its path
    Get(GetArgs),

    /// List cache entries under a relative path
    List(ListArgs),

    /// Delete a cache entry or directory
    Delete(DeleteArgs),

    /// Evict cache entries past the retention window
    Clean(CleanArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding the configured one
    #[arg(short, long)]
    pub listen: Option<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Repository as owner/name
    pub repo: String,

    /// Branch to cache (defaults to the remote's default branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Cache namespace
    #[arg(short, long)]
    pub user: Option<String>,

    /// Refetch even if the cached copy is fresh
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Package URL to cache
    pub url: String,

    /// Cache namespace
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Cache-root-relative path (defaults to the root)
    #[arg(default_value = "")]
    pub path: String,
}

/// Arguments for the delete command
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Cache-root-relative path to delete
    pub path: String,

    /// Delete directories and their contents
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Retention window in days, overriding the configured one
    #[arg(long)]
    pub days: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_parses_flags() {
        let cli = Cli::parse_from(["quarry", "fetch", "octo/tool", "--branch", "dev", "--force"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.repo, "octo/tool");
                assert_eq!(args.branch.as_deref(), Some("dev"));
                assert!(args.force);
            }
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn list_defaults_to_root() {
        let cli = Cli::parse_from(["quarry", "list"]);
        match cli.command {
            Commands::List(args) => assert_eq!(args.path, ""),
            other => panic!("expected list, got {other:?}"),
        }
    }
}
