//! On-disk mirror cache engine.
//!
//! All state lives under a single cache root; the filesystem is the source
//! of truth, there is no in-memory index. Repository archives are keyed by
//! `(user, owner/repo, branch)` and carry sidecar metadata recording the
//! remote revision they were cut from; package files are keyed by a short
//! hash of their source URL. Every replacement of a cache entry goes
//! through a same-directory temp file and an atomic rename, so readers
//! never observe a half-written artifact.
//!
//! Layout under the root:
//!
//! ```text
//! users/<user>/repos/<owner>/<name>/<branch>.zip
//! users/<user>/repos/<owner>/<name>/<branch>.zip.meta      full revision id
//! users/<user>/repos/<owner>/<name>/<branch>.commit.txt    short revision prefix
//! users/<user>/packages/<sha256(url)[:20]>/<filename>
//! ```

pub(crate) mod fetch;
mod janitor;
mod locks;
mod paths;

pub use paths::{package_hash, DEFAULT_USER};

use crate::error::{QuarryError, QuarryResult};
use crate::remote::RemoteHost;
use fetch::FetchRequest;
use filetime::FileTime;
use locks::KeyLocks;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A single listing entry under the cache root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Sidecar holding the full revision id an archive was cut from.
pub fn meta_sidecar(archive: &Path) -> PathBuf {
    let mut os = archive.as_os_str().to_owned();
    os.push(".meta");
    PathBuf::from(os)
}

/// Sidecar holding the short human-readable revision prefix.
pub fn commit_sidecar(archive: &Path) -> PathBuf {
    archive.with_extension("commit.txt")
}

/// The cache engine.
pub struct Storage {
    root: PathBuf,
    remote: Arc<dyn RemoteHost>,
    client: reqwest::Client,
    slow_download: Option<Duration>,
    locks: KeyLocks,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, remote: Arc<dyn RemoteHost>) -> Self {
        Self::with_client(root, remote, reqwest::Client::new())
    }

    /// Use a preconfigured HTTP client (timeouts, proxies) for package
    /// downloads.
    pub fn with_client(
        root: impl Into<PathBuf>,
        remote: Arc<dyn RemoteHost>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            root: root.into(),
            remote,
            client,
            slow_download: None,
            locks: KeyLocks::default(),
        }
    }

    /// Stretch every download to roughly this duration. Debug aid for
    /// exercising backpressure and cancellation behavior.
    pub fn with_slow_download(mut self, target: Option<Duration>) -> Self {
        self.slow_download = target;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the archive for `owner_repo` at `branch` is cached and fresh,
    /// returning its path.
    ///
    /// With `branch = None` the remote's default branch is resolved first
    /// (fatal if that fails). The freshness check compares the remote's
    /// current revision id against the `.meta` sidecar; an unreachable
    /// remote degrades to serving the cached copy rather than failing, and
    /// `force` skips reuse entirely.
    pub async fn ensure_repo(
        &self,
        user: &str,
        owner_repo: &str,
        branch: Option<&str>,
        token: &str,
        force: bool,
    ) -> QuarryResult<PathBuf> {
        let user = paths::repo_user(user)?;
        let (owner, name) = paths::split_owner_repo(owner_repo)?;
        let owner_repo = format!("{owner}/{name}");

        let branch = match branch.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => b.to_string(),
            None => {
                let resolved = self.remote.default_branch(&owner_repo, token).await?;
                info!(repo = %owner_repo, branch = %resolved, "resolved default branch");
                resolved
            }
        };
        paths::validate_branch(&branch)?;

        let archive_path = self
            .root
            .join("users")
            .join(&user)
            .join("repos")
            .join(&owner)
            .join(&name)
            .join(format!("{branch}.zip"));
        let meta_path = meta_sidecar(&archive_path);

        let lock = self.locks.entry(&user, &owner_repo, &branch);
        let _guard = lock.lock().await;

        let remote_revision = match self.remote.branch_revision(&owner_repo, &branch, token).await {
            Ok(revision) => Some(revision),
            Err(err) => {
                warn!(repo = %owner_repo, branch = %branch, error = %err,
                    "could not resolve remote revision");
                None
            }
        };

        let cached = is_file(&archive_path).await;
        if !force && cached {
            let local_revision = read_sidecar(&meta_path).await;
            match (&remote_revision, &local_revision) {
                (Some(remote), Some(local)) if remote == local => {
                    debug!(path = %archive_path.display(), "cache hit");
                    self.bump_mtime(&archive_path);
                    return Ok(archive_path);
                }
                (None, Some(_)) => {
                    // Remote unreachable but we hold a pinned revision:
                    // a stale answer beats no answer.
                    warn!(path = %archive_path.display(),
                        "remote freshness unknown, serving cached archive");
                    self.bump_mtime(&archive_path);
                    return Ok(archive_path);
                }
                _ => {}
            }
        }

        match self
            .remote
            .fetch_archive(&owner_repo, &branch, token, &archive_path, self.slow_download)
            .await
        {
            Ok(()) => {}
            Err(err) if !force && cached => {
                warn!(path = %archive_path.display(), error = %err,
                    "refetch failed, serving stale cached archive");
                self.bump_mtime(&archive_path);
                return Ok(archive_path);
            }
            Err(err) => return Err(err),
        }

        match &remote_revision {
            Some(revision) => {
                let revision = revision.trim();
                write_sidecar(&meta_path, revision).await;
                let short = &revision[..revision.len().min(7)];
                write_sidecar(&commit_sidecar(&archive_path), short).await;
            }
            None => {
                // Freshness unknown: drop the pin so the next request
                // refetches. A pre-existing commit file stays.
                remove_sidecar(&meta_path).await;
            }
        }
        self.bump_mtime(&archive_path);
        info!(repo = %owner_repo, branch = %branch, path = %archive_path.display(),
            "cached repository archive");
        Ok(archive_path)
    }

    /// Ensure the file at `package_url` is cached, returning its path.
    ///
    /// Packages are keyed by a content-addressed hash of the URL and treated
    /// as immutable: once a local copy exists it is reused until deleted or
    /// evicted.
    pub async fn ensure_package(&self, user: &str, package_url: &str) -> QuarryResult<PathBuf> {
        let user = paths::package_user(user)?;
        let filename = paths::package_filename(package_url);
        let hash = package_hash(package_url);
        let package_path = self
            .root
            .join("users")
            .join(&user)
            .join("packages")
            .join(&hash)
            .join(&filename);

        if is_file(&package_path).await {
            debug!(path = %package_path.display(), "package cache hit");
            self.bump_mtime(&package_path);
            return Ok(package_path);
        }

        fetch::download(
            &self.client,
            FetchRequest {
                url: package_url,
                token: "",
                accept: None,
                context: "downloading package",
            },
            &package_path,
            self.slow_download,
        )
        .await?;
        self.bump_mtime(&package_path);
        info!(url = package_url, path = %package_path.display(), "cached package");
        Ok(package_path)
    }

    /// List the immediate children of a cache-root-relative path.
    ///
    /// `.meta` sidecars are cache-internal and filtered out. A missing
    /// directory is `NotFound`; other I/O errors propagate unchanged.
    pub fn list(&self, rel: &str) -> QuarryResult<Vec<Entry>> {
        let abs = paths::safe_join(&self.root, rel)?;
        let read = match std::fs::read_dir(&abs) {
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuarryError::NotFound(PathBuf::from(rel)));
            }
            Err(err) => return Err(QuarryError::io(format!("listing {}", abs.display()), err)),
        };

        let prefix = rel.trim_matches('/');
        let prefix = if prefix == "." { "" } else { prefix };
        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| QuarryError::io("reading directory entry", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".meta") {
                continue;
            }
            let metadata = entry.metadata().ok();
            let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            let size = metadata.map(|m| m.len()).unwrap_or(0);
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            entries.push(Entry {
                name,
                path,
                is_dir,
                size,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Delete a cache-root-relative path. Without `recursive`, a directory
    /// must already be empty.
    pub fn delete(&self, rel: &str, recursive: bool) -> QuarryResult<()> {
        let abs = paths::safe_join(&self.root, rel)?;
        let removing = || format!("removing {}", abs.display());
        let metadata = match std::fs::symlink_metadata(&abs) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && recursive => return Ok(()),
            Err(err) => return Err(QuarryError::io(removing(), err)),
        };
        let result = if metadata.is_dir() {
            if recursive {
                std::fs::remove_dir_all(&abs)
            } else {
                std::fs::remove_dir(&abs)
            }
        } else {
            std::fs::remove_file(&abs)
        };
        result.map_err(|e| QuarryError::io(removing(), e))
    }

    /// Best-effort modification-time bump for a cache-root-relative path.
    /// A missing path is a no-op; an escaping path still fails.
    pub fn touch(&self, rel: &str) -> QuarryResult<()> {
        let abs = paths::safe_join(&self.root, rel)?;
        if std::fs::symlink_metadata(&abs).is_err() {
            return Ok(());
        }
        let now = FileTime::now();
        filetime::set_file_times(&abs, now, now)
            .map_err(|e| QuarryError::io(format!("touching {}", abs.display()), e))
    }

    fn bump_mtime(&self, abs: &Path) {
        let now = FileTime::now();
        if let Err(err) = filetime::set_file_times(abs, now, now) {
            warn!(path = %abs.display(), error = %err, "failed to bump mtime");
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Read a trimmed sidecar value; missing and unreadable look the same
/// ("freshness unknown").
async fn read_sidecar(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
}

async fn write_sidecar(path: &Path, value: &str) {
    if let Err(err) = tokio::fs::write(path, value).await {
        warn!(path = %path.display(), error = %err, "failed to write sidecar");
    }
}

async fn remove_sidecar(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove sidecar");
        }
    }
}
