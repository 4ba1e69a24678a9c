//! Command implementations

mod clean;
mod delete;
mod fetch;
mod get;
mod list;
mod serve;

pub use clean::execute as clean;
pub use delete::execute as delete;
pub use fetch::execute as fetch;
pub use get::execute as get;
pub use list::execute as list;
pub use serve::execute as serve;

use crate::config::Config;
use crate::error::{QuarryError, QuarryResult};
use crate::remote::GitHubRemote;
use crate::storage::Storage;
use std::sync::Arc;

/// Build the engine from configuration: one HTTP client shared by the
/// GitHub remote and the package fetcher, cache root created up front.
pub(crate) fn build_storage(config: &Config) -> QuarryResult<Arc<Storage>> {
    let root = config.cache.root_dir();
    std::fs::create_dir_all(&root)
        .map_err(|e| QuarryError::io(format!("creating cache root {}", root.display()), e))?;

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.github.request_timeout() {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| QuarryError::network("building HTTP client", e))?;

    let remote = GitHubRemote::new(
        client.clone(),
        &config.github.api_base,
        &config.github.archive_base,
    );
    let storage = Storage::with_client(root, Arc::new(remote), client)
        .with_slow_download(config.github.slow_download());
    Ok(Arc::new(storage))
}
