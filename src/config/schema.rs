//! Configuration schema for Quarry
//!
//! Configuration is stored at `~/.config/quarry/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Cache root and retention settings
    pub cache: CacheConfig,

    /// GitHub API settings
    pub github: GitHubConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the API server
    pub listen: String,

    /// Namespace used when a request carries no user header
    pub default_user: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8731".to_string(),
            default_user: "default".to_string(),
        }
    }
}

/// Cache root and retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory. Empty means `<state_dir>/cache`.
    pub root: String,

    /// Entries untouched for this many days are evicted
    pub retention_days: u64,

    /// Seconds between janitor sweeps
    pub janitor_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            retention_days: 30,
            janitor_interval_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// Resolve the configured cache root, falling back to the state dir.
    pub fn root_dir(&self) -> PathBuf {
        if self.root.trim().is_empty() {
            super::ConfigManager::state_dir().join("cache")
        } else {
            PathBuf::from(self.root.trim())
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 3600)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }
}

/// GitHub API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Bearer token. Blank means anonymous, rate-limited access.
    pub token: String,

    /// REST API base URL
    pub api_base: String,

    /// Archive download base URL
    pub archive_base: String,

    /// Client-level request timeout in seconds. 0 disables it; callers can
    /// still cancel individual requests.
    pub request_timeout_secs: u64,

    /// Stretch every download to this many milliseconds. Debug aid; 0
    /// disables throttling.
    pub slow_download_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: crate::remote::GitHubRemote::DEFAULT_API_BASE.to_string(),
            archive_base: crate::remote::GitHubRemote::DEFAULT_ARCHIVE_BASE.to_string(),
            request_timeout_secs: 0,
            slow_download_ms: 0,
        }
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn slow_download(&self) -> Option<Duration> {
        (self.slow_download_ms > 0).then(|| Duration::from_millis(self.slow_download_ms))
    }
}
