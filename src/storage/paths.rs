//! Path derivation and sandboxing for the cache root.
//!
//! Everything user-supplied that ends up in a filesystem path goes through
//! this module: user namespaces, owner/repo pairs, branch names, listing
//! paths and package URLs. The fetch paths are built from validated
//! components; the list/delete/touch paths go through [`safe_join`].

use crate::error::{QuarryError, QuarryResult};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Namespace used when the caller does not supply one.
pub const DEFAULT_USER: &str = "default";

/// Fallback filename for package URLs without a usable path segment.
pub(crate) const PACKAGE_FALLBACK_NAME: &str = "package.bin";

/// Replace path separators in a user-supplied name.
pub(crate) fn sanitize_name(v: &str) -> String {
    v.trim().replace(['\\', '/'], "-")
}

/// Validate and default the user namespace for repo operations.
///
/// Separators are rejected outright here: a repo request naming a user with
/// a slash in it is a malformed request, not one to silently rewrite.
pub(crate) fn repo_user(user: &str) -> QuarryResult<String> {
    let user = user.trim_matches(|c| c == '/' || c == ' ');
    if user.is_empty() {
        return Ok(DEFAULT_USER.to_string());
    }
    if user.contains('/') || user.contains('\\') {
        return Err(QuarryError::BadPath(format!("invalid user: {user}")));
    }
    check_user(user)?;
    Ok(user.to_string())
}

/// Normalize the user namespace for package operations, replacing separators.
pub(crate) fn package_user(user: &str) -> QuarryResult<String> {
    let user = sanitize_name(user.trim_matches(|c| c == '/' || c == ' '));
    if user.is_empty() {
        return Ok(DEFAULT_USER.to_string());
    }
    check_user(&user)?;
    Ok(user)
}

fn check_user(user: &str) -> QuarryResult<()> {
    if user == "." || user.contains("..") {
        return Err(QuarryError::BadPath(format!("invalid user: {user}")));
    }
    Ok(())
}

/// Split and validate an `owner/name` pair.
pub(crate) fn split_owner_repo(owner_repo: &str) -> QuarryResult<(String, String)> {
    let trimmed = owner_repo.trim_matches('/');
    let (owner, name) = trimmed
        .split_once('/')
        .ok_or_else(|| QuarryError::BadPath(format!("owner/repo expected: {owner_repo}")))?;
    if name.contains('/') {
        return Err(QuarryError::BadPath(format!(
            "owner/repo expected: {owner_repo}"
        )));
    }
    for part in [owner, name] {
        if part.is_empty() || part == "." || part.contains("..") || part.contains('\\') {
            return Err(QuarryError::BadPath(format!(
                "owner/repo expected: {owner_repo}"
            )));
        }
    }
    Ok((owner.to_string(), name.to_string()))
}

/// Validate a branch name before it becomes part of an archive path.
///
/// Branches may contain `/` (they nest directories on disk), but no segment
/// may be empty, `.` or `..`.
pub(crate) fn validate_branch(branch: &str) -> QuarryResult<()> {
    if branch.is_empty() || branch.contains('\\') {
        return Err(QuarryError::BadPath(format!("invalid branch: {branch}")));
    }
    for segment in branch.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(QuarryError::BadPath(format!("invalid branch: {branch}")));
        }
    }
    Ok(())
}

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding components where possible. No filesystem access.
pub(crate) fn lexical_clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// Join a cache-root-relative path to `root`, guaranteeing the result stays
/// inside the root. Empty input means the root itself.
pub(crate) fn safe_join(root: &Path, rel: &str) -> QuarryResult<PathBuf> {
    // A leading separator is tolerated and treated as root-relative.
    let rel = rel.trim_start_matches('/');
    let rel = if rel.is_empty() { "." } else { rel };
    let cleaned = lexical_clean(Path::new(rel));
    let abs = lexical_clean(&root.join(cleaned));
    let root = lexical_clean(root);
    if abs == root || abs.starts_with(&root) {
        Ok(abs)
    } else {
        Err(QuarryError::BadPath(rel.to_string()))
    }
}

/// Short content-addressed hash for a package URL.
///
/// The first 20 hex characters of the SHA-256 are plenty for a cache
/// directory name; this is a naming convention, not a cryptographic claim.
pub fn package_hash(package_url: &str) -> String {
    let digest = Sha256::digest(package_url.as_bytes());
    hex::encode(digest)[..20].to_string()
}

/// Derive the on-disk filename for a package URL.
///
/// Last non-empty path segment of the parsed URL, then of the raw string,
/// then a fixed fallback.
pub(crate) fn package_filename(package_url: &str) -> String {
    let from_url = Url::parse(package_url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|segments| segments.rev().find(|s| !s.is_empty()).map(str::to_string))
    });
    let candidate = from_url.or_else(|| {
        package_url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .map(str::to_string)
    });
    match candidate {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => PACKAGE_FALLBACK_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- user namespace tests ----

    #[test]
    fn repo_user_defaults_when_blank() {
        assert_eq!(repo_user("").unwrap(), "default");
        assert_eq!(repo_user("  / ").unwrap(), "default");
    }

    #[test]
    fn repo_user_rejects_separators() {
        assert!(repo_user("a/b").is_err());
        assert!(repo_user("a\\b").is_err());
    }

    #[test]
    fn repo_user_rejects_traversal() {
        assert!(repo_user("..").is_err());
        assert!(repo_user("a..b").is_err());
    }

    #[test]
    fn package_user_replaces_separators() {
        assert_eq!(package_user("a/b").unwrap(), "a-b");
        assert_eq!(package_user("a\\b").unwrap(), "a-b");
    }

    #[test]
    fn package_user_rejects_dot() {
        assert!(package_user(".").is_err());
    }

    // ---- owner/repo tests ----

    #[test]
    fn owner_repo_valid() {
        let (owner, name) = split_owner_repo("octo/tool").unwrap();
        assert_eq!(owner, "octo");
        assert_eq!(name, "tool");
    }

    #[test]
    fn owner_repo_trims_slashes() {
        let (owner, name) = split_owner_repo("/octo/tool/").unwrap();
        assert_eq!((owner.as_str(), name.as_str()), ("octo", "tool"));
    }

    #[test]
    fn owner_repo_rejects_malformed() {
        assert!(split_owner_repo("").is_err());
        assert!(split_owner_repo("noslash").is_err());
        assert!(split_owner_repo("a/b/c").is_err());
        assert!(split_owner_repo("a/").is_err());
        assert!(split_owner_repo("/b").is_err());
        assert!(split_owner_repo("../b").is_err());
        assert!(split_owner_repo("a/..").is_err());
    }

    // ---- branch tests ----

    #[test]
    fn branch_plain_and_nested() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("feat/slow-reader").is_ok());
    }

    #[test]
    fn branch_rejects_traversal() {
        assert!(validate_branch("").is_err());
        assert!(validate_branch("..").is_err());
        assert!(validate_branch("feat/../../../etc").is_err());
        assert!(validate_branch("feat//x").is_err());
    }

    // ---- sandbox tests ----

    #[test]
    fn safe_join_empty_is_root() {
        let root = Path::new("/srv/cache");
        assert_eq!(safe_join(root, "").unwrap(), PathBuf::from("/srv/cache"));
        assert_eq!(safe_join(root, "/").unwrap(), PathBuf::from("/srv/cache"));
    }

    #[test]
    fn safe_join_nested() {
        let root = Path::new("/srv/cache");
        assert_eq!(
            safe_join(root, "users/alice").unwrap(),
            PathBuf::from("/srv/cache/users/alice")
        );
    }

    #[test]
    fn safe_join_normalizes_inside() {
        let root = Path::new("/srv/cache");
        assert_eq!(
            safe_join(root, "users/./alice/../bob").unwrap(),
            PathBuf::from("/srv/cache/users/bob")
        );
    }

    #[test]
    fn safe_join_rejects_escape() {
        let root = Path::new("/srv/cache");
        assert!(safe_join(root, "../../etc").is_err());
        assert!(safe_join(root, "users/../../etc/passwd").is_err());
        assert!(safe_join(root, "..").is_err());
    }

    #[test]
    fn safe_join_rejects_sibling_prefix() {
        // "/srv/cache2" starts with the string "/srv/cache" but is outside it.
        let root = Path::new("/srv/cache");
        assert!(safe_join(root, "../cache2/x").is_err());
    }

    #[test]
    fn lexical_clean_keeps_leading_parent() {
        assert_eq!(lexical_clean(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(lexical_clean(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(lexical_clean(Path::new("a/./b")), PathBuf::from("a/b"));
    }

    // ---- package hash / filename tests ----

    #[test]
    fn package_hash_is_deterministic() {
        let a = package_hash("https://example.com/pkg.tar.gz");
        let b = package_hash("https://example.com/pkg.tar.gz");
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn package_hash_distinct_urls() {
        assert_ne!(
            package_hash("https://example.com/a"),
            package_hash("https://example.com/b")
        );
    }

    #[test]
    fn package_filename_from_path() {
        assert_eq!(
            package_filename("https://example.com/dl/tool-1.2.3.tar.gz?sig=abc"),
            "tool-1.2.3.tar.gz"
        );
    }

    #[test]
    fn package_filename_trailing_slash() {
        assert_eq!(package_filename("https://example.com/dl/pkg/"), "pkg");
    }

    #[test]
    fn package_filename_host_only_uses_host() {
        // No path segment: the host is the last usable piece of the raw URL.
        assert_eq!(package_filename("https://example.com"), "example.com");
    }

    #[test]
    fn package_filename_fallback() {
        assert_eq!(package_filename(""), "package.bin");
        assert_eq!(package_filename("/"), "package.bin");
    }

    #[test]
    fn package_filename_unparseable_url() {
        assert_eq!(package_filename("not a url/file.bin"), "file.bin");
    }
}
