//! The hosting side of the cache: branch metadata and archive bytes.
//!
//! `Storage` only ever sees the [`RemoteHost`] trait, so the engine can be
//! exercised against an in-process fake. [`GitHubRemote`] is the real
//! implementation, speaking the GitHub REST API with optional bearer
//! authentication (blank token means anonymous, rate-limited access).

use crate::error::{QuarryError, QuarryResult};
use crate::storage::fetch::{self, FetchRequest};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Remote operations the cache engine depends on.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Resolve the repository's default branch name.
    async fn default_branch(&self, owner_repo: &str, token: &str) -> QuarryResult<String>;

    /// Resolve the current revision id of a branch.
    async fn branch_revision(
        &self,
        owner_repo: &str,
        branch: &str,
        token: &str,
    ) -> QuarryResult<String>;

    /// Stream the archive for `owner_repo` at `branch` into `dest`,
    /// replacing any existing file atomically.
    async fn fetch_archive(
        &self,
        owner_repo: &str,
        branch: &str,
        token: &str,
        dest: &Path,
        throttle: Option<Duration>,
    ) -> QuarryResult<()>;
}

const GITHUB_JSON: &str = "application/vnd.github+json";

/// GitHub implementation of [`RemoteHost`].
pub struct GitHubRemote {
    client: Client,
    api_base: String,
    archive_base: String,
}

impl GitHubRemote {
    /// Default API and archive hosts.
    pub const DEFAULT_API_BASE: &'static str = "https://api.github.com";
    pub const DEFAULT_ARCHIVE_BASE: &'static str = "https://codeload.github.com";

    pub fn new(client: Client, api_base: &str, archive_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            archive_base: archive_base.trim_end_matches('/').to_string(),
        }
    }

    /// Build a URL under `base`; each segment is escaped individually, so a
    /// branch name containing `/` becomes a single `%2F`-encoded segment.
    fn endpoint(&self, base: &str, segments: &[&str], context: &str) -> QuarryResult<Url> {
        let mut url = Url::parse(base).map_err(|e| QuarryError::UpstreamInvalid {
            context: context.to_string(),
            reason: format!("invalid base url {base}: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| QuarryError::UpstreamInvalid {
                context: context.to_string(),
                reason: format!("invalid base url {base}"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_api(&self, url: Url, token: &str, context: &str) -> QuarryResult<reqwest::Response> {
        let mut request = self.client.get(url).header(ACCEPT, GITHUB_JSON);
        if !token.trim().is_empty() {
            request = request.bearer_auth(token.trim());
        }
        let resp = request
            .send()
            .await
            .map_err(|e| QuarryError::network(context, e))?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(QuarryError::UpstreamStatus {
                context: context.to_string(),
                status: status.as_u16(),
                body: fetch::body_snippet(resp).await,
            });
        }
        Ok(resp)
    }
}

fn split(owner_repo: &str) -> QuarryResult<(&str, &str)> {
    owner_repo
        .split_once('/')
        .ok_or_else(|| QuarryError::BadPath(format!("owner/repo expected: {owner_repo}")))
}

#[derive(Deserialize)]
struct RepoInfo {
    #[serde(default)]
    default_branch: String,
}

#[derive(Deserialize)]
struct BranchInfo {
    #[serde(default)]
    commit: CommitInfo,
}

#[derive(Deserialize, Default)]
struct CommitInfo {
    #[serde(default)]
    sha: String,
}

#[async_trait]
impl RemoteHost for GitHubRemote {
    async fn default_branch(&self, owner_repo: &str, token: &str) -> QuarryResult<String> {
        let context = format!("fetching repository info for {owner_repo}");
        let (owner, name) = split(owner_repo)?;
        let url = self.endpoint(&self.api_base, &["repos", owner, name], &context)?;
        let resp = self.get_api(url, token, &context).await?;
        let info: RepoInfo = resp
            .json()
            .await
            .map_err(|e| QuarryError::network(context.clone(), e))?;
        let branch = info.default_branch.trim();
        if branch.is_empty() {
            return Err(QuarryError::UpstreamInvalid {
                context,
                reason: "empty default branch".to_string(),
            });
        }
        Ok(branch.to_string())
    }

    async fn branch_revision(
        &self,
        owner_repo: &str,
        branch: &str,
        token: &str,
    ) -> QuarryResult<String> {
        let context = format!("fetching branch revision for {owner_repo}@{branch}");
        let (owner, name) = split(owner_repo)?;
        let url = self.endpoint(
            &self.api_base,
            &["repos", owner, name, "branches", branch],
            &context,
        )?;
        let resp = self.get_api(url, token, &context).await?;
        let info: BranchInfo = resp
            .json()
            .await
            .map_err(|e| QuarryError::network(context.clone(), e))?;
        let sha = info.commit.sha.trim();
        if sha.is_empty() {
            return Err(QuarryError::UpstreamInvalid {
                context,
                reason: "empty revision id".to_string(),
            });
        }
        Ok(sha.to_string())
    }

    async fn fetch_archive(
        &self,
        owner_repo: &str,
        branch: &str,
        token: &str,
        dest: &Path,
        throttle: Option<Duration>,
    ) -> QuarryResult<()> {
        let context = format!("downloading archive for {owner_repo}@{branch}");
        let (owner, name) = split(owner_repo)?;
        let url = self.endpoint(&self.archive_base, &[owner, name, "zip", branch], &context)?;
        fetch::download(
            &self.client,
            FetchRequest {
                url: url.as_str(),
                token,
                accept: Some("application/zip"),
                context: &context,
            },
            dest,
            throttle,
        )
        .await
    }
}
