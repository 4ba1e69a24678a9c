//! List command - show cache entries under a relative path

use super::build_storage;
use crate::cli::args::ListArgs;
use crate::config::Config;
use crate::error::{QuarryError, QuarryResult};

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> QuarryResult<()> {
    let storage = build_storage(config)?;
    let entries = match storage.list(&args.path) {
        Ok(entries) => entries,
        Err(QuarryError::NotFound(_)) => {
            println!("No cache entries found.");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if entries.is_empty() {
        println!("No cache entries found.");
        return Ok(());
    }

    println!("{:<40} {:<6} {:>12}", "NAME", "TYPE", "SIZE");
    println!("{}", "-".repeat(60));
    for entry in &entries {
        let kind = if entry.is_dir { "dir" } else { "file" };
        println!("{:<40} {:<6} {:>12}", entry.name, kind, entry.size);
    }
    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    Ok(())
}
