//! Get command - cache a package file

use super::build_storage;
use crate::cli::args::GetArgs;
use crate::config::Config;
use crate::error::QuarryResult;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> QuarryResult<()> {
    let storage = build_storage(config)?;
    let path = storage
        .ensure_package(args.user.as_deref().unwrap_or(""), &args.url)
        .await?;
    println!("{}", path.display());
    Ok(())
}
