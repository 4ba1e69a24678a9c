//! Serve command - run the API server and the janitor loop

use super::build_storage;
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::QuarryResult;
use crate::server::{self, AppState};
use tracing::info;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> QuarryResult<()> {
    let storage = build_storage(config)?;
    info!(root = %storage.root().display(), "cache root ready");

    let janitor = server::spawn_janitor(
        storage.clone(),
        config.cache.janitor_interval(),
        config.cache.retention(),
    );

    let state = AppState {
        storage,
        token: config.github.token.clone(),
        default_user: config.server.default_user.clone(),
    };
    let listen = args
        .listen
        .as_deref()
        .unwrap_or(&config.server.listen)
        .to_string();

    let result = server::serve(state, &listen).await;
    janitor.abort();
    result
}
