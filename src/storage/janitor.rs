//! Retention sweep over the cache tree.
//!
//! The janitor cooperates with request-driven mutation instead of locking
//! against it: promotion is rename-based, so a concurrent sweep observes
//! either the old or the new file, never a partial one. The narrow race
//! where an entry is evicted right after a reuse touched it just costs the
//! next request a refetch.

use super::{commit_sidecar, meta_sidecar, Storage};
use crate::error::QuarryResult;
use std::path::{Component, Path};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use walkdir::WalkDir;

impl Storage {
    /// Remove cache entries whose modification time is older than
    /// `retention`, pruning directories emptied by the removals.
    ///
    /// Under `repos/` only `.zip` archives are candidates (their sidecars go
    /// with them); under `packages/` every file is. Unreadable entries are
    /// skipped; a single bad path never aborts the sweep.
    pub fn cleanup_expired(&self, retention: Duration) -> QuarryResult<usize> {
        let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
            return Ok(0);
        };
        let users_root = self.root().join("users");
        if !users_root.exists() {
            return Ok(0);
        }

        let mut evicted = 0usize;
        for entry in WalkDir::new(&users_root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(self.root()) else {
                continue;
            };
            let parts: Vec<&str> = rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(os) => os.to_str(),
                    _ => None,
                })
                .collect();
            // users/<user>/{repos,packages}/...
            if parts.len() < 3 || parts[0] != "users" {
                continue;
            }
            match parts[2] {
                "repos" => {
                    // users/<user>/repos/<owner>/<name>/<branch>.zip
                    if parts.len() < 6 || path.extension().is_none_or(|e| e != "zip") {
                        continue;
                    }
                    if expired(path, cutoff) {
                        debug!(path = %path.display(), "evicting expired archive");
                        let _ = std::fs::remove_file(path);
                        let _ = std::fs::remove_file(meta_sidecar(path));
                        let _ = std::fs::remove_file(commit_sidecar(path));
                        evicted += 1;
                        if let Some(dir) = path.parent() {
                            prune_empty(dir, &users_root);
                        }
                    }
                }
                "packages" => {
                    if expired(path, cutoff) {
                        debug!(path = %path.display(), "evicting expired package");
                        let _ = std::fs::remove_file(path);
                        evicted += 1;
                        if let Some(dir) = path.parent() {
                            prune_empty(dir, &users_root);
                        }
                    }
                }
                _ => {}
            }
        }
        if evicted > 0 {
            info!(evicted, "janitor evicted expired cache entries");
        }
        Ok(evicted)
    }
}

fn expired(path: &Path, cutoff: SystemTime) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|mtime| mtime < cutoff)
        .unwrap_or(false)
}

/// Remove now-empty directories from `dir` upward, stopping at (and never
/// removing) `stop`.
fn prune_empty(mut dir: &Path, stop: &Path) {
    while dir != stop {
        if std::fs::remove_dir(dir).is_err() {
            // Non-empty or already gone; either way the pruning stops here.
            return;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;
    use filetime::FileTime;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn storage() -> (Storage, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path(), Arc::new(FakeRemote::new("abc")));
        (storage, temp)
    }

    fn write(root: &Path, rel: &str, age_secs: i64) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"data").unwrap();
        let then = FileTime::from_unix_time(FileTime::now().unix_seconds() - age_secs, 0);
        filetime::set_file_times(&path, then, then).unwrap();
        path
    }

    #[test]
    fn empty_root_is_fine() {
        let (storage, _temp) = storage();
        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 0);
    }

    #[test]
    fn evicts_old_archive_with_sidecars_and_prunes() {
        let (storage, temp) = storage();
        let zip = write(
            temp.path(),
            "users/alice/repos/octo/tool/main.zip",
            7 * 24 * 3600,
        );
        write(
            temp.path(),
            "users/alice/repos/octo/tool/main.zip.meta",
            7 * 24 * 3600,
        );
        write(
            temp.path(),
            "users/alice/repos/octo/tool/main.commit.txt",
            7 * 24 * 3600,
        );

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 1);

        assert!(!zip.exists());
        assert!(!zip.with_extension("zip.meta").exists());
        // Emptied directories are pruned all the way up to users/.
        assert!(!temp.path().join("users/alice").exists());
        assert!(temp.path().join("users").exists());
    }

    #[test]
    fn keeps_fresh_archive() {
        let (storage, temp) = storage();
        let zip = write(temp.path(), "users/alice/repos/octo/tool/main.zip", 60);

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 0);
        assert!(zip.exists());
    }

    #[test]
    fn pruning_stops_at_non_empty_directory() {
        let (storage, temp) = storage();
        write(
            temp.path(),
            "users/alice/repos/octo/tool/old.zip",
            7 * 24 * 3600,
        );
        let fresh = write(temp.path(), "users/alice/repos/octo/tool/new.zip", 60);

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 1);
        assert!(fresh.exists());
        assert!(temp.path().join("users/alice/repos/octo/tool").exists());
    }

    #[test]
    fn non_zip_files_under_repos_are_left_alone() {
        let (storage, temp) = storage();
        let stray = write(
            temp.path(),
            "users/alice/repos/octo/tool/notes.txt",
            7 * 24 * 3600,
        );

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 0);
        assert!(stray.exists());
    }

    #[test]
    fn every_package_file_is_a_candidate() {
        let (storage, temp) = storage();
        let old = write(
            temp.path(),
            "users/alice/packages/0123456789abcdef0123/tool.tar.gz",
            7 * 24 * 3600,
        );
        let fresh = write(
            temp.path(),
            "users/bob/packages/fedcba98765432100123/other.bin",
            60,
        );

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 1);
        assert!(!old.exists());
        assert!(!temp.path().join("users/alice").exists());
        assert!(fresh.exists());
    }

    #[test]
    fn nested_branch_archives_are_pruned_upward() {
        let (storage, temp) = storage();
        write(
            temp.path(),
            "users/alice/repos/octo/tool/feat/slow-reader.zip",
            7 * 24 * 3600,
        );

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 1);
        assert!(!temp.path().join("users/alice").exists());
    }

    #[test]
    fn files_outside_known_layout_survive() {
        let (storage, temp) = storage();
        let stray = write(temp.path(), "users/alice/scratch/notes.zip", 7 * 24 * 3600);

        assert_eq!(storage.cleanup_expired(DAY).unwrap(), 0);
        assert!(stray.exists());
    }
}
