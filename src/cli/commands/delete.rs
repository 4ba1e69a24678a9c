//! Delete command - remove a cache entry or directory

use super::build_storage;
use crate::cli::args::DeleteArgs;
use crate::config::Config;
use crate::error::QuarryResult;
use console::style;
use std::io::{self, BufRead, Write};

/// Execute the delete command
pub async fn execute(args: DeleteArgs, config: &Config) -> QuarryResult<()> {
    if args.recursive && !args.yes && !confirm(&args.path)? {
        println!("Aborted.");
        return Ok(());
    }

    let storage = build_storage(config)?;
    storage.delete(&args.path, args.recursive)?;
    eprintln!("{} {}", style("Deleted").green().bold(), args.path);
    Ok(())
}

fn confirm(path: &str) -> QuarryResult<bool> {
    print!("Recursively delete '{path}' and everything beneath it? [y/N] ");
    io::stdout()
        .flush()
        .map_err(|e| crate::error::QuarryError::io("flushing stdout", e))?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| crate::error::QuarryError::io("reading confirmation", e))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
