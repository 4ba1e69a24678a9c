//! Route handlers: HTTP in, engine calls out.

use super::AppState;
use crate::error::QuarryError;
use crate::storage::{commit_sidecar, Entry};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

/// Header naming the caller's cache namespace.
pub const USER_HEADER: &str = "x-quarry-user";

/// Response header carrying the short revision of a served archive.
pub const COMMIT_HEADER: &str = "x-quarry-commit";

/// Engine error wrapped for HTTP status mapping.
pub struct ApiError(QuarryError);

impl From<QuarryError> for ApiError {
    fn from(err: QuarryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QuarryError::BadPath(_) => StatusCode::BAD_REQUEST,
            QuarryError::NotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

fn caller_user(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.default_user.clone())
}

async fn read_commit(archive: &Path) -> Option<String> {
    tokio::fs::read_to_string(commit_sidecar(archive))
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Stream a cached file back to the client.
async fn stream_file(
    path: &Path,
    content_type: &str,
    commit: Option<&str>,
) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| QuarryError::io(format!("opening {}", path.display()), e))?;
    let len = file.metadata().await.ok().map(|m| m.len());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(len) = len {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }
    if let Some(commit) = commit {
        builder = builder.header(COMMIT_HEADER, commit);
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError(QuarryError::Internal(e.to_string())))
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    repo: String,
    branch: Option<String>,
    #[serde(default)]
    force: bool,
}

pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let user = caller_user(&headers, &state);
    let path = state
        .storage
        .ensure_repo(
            &user,
            &query.repo,
            query.branch.as_deref(),
            &state.token,
            query.force,
        )
        .await?;
    let commit = read_commit(&path).await;
    stream_file(&path, "application/zip", commit.as_deref()).await
}

pub async fn download_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let user = caller_user(&headers, &state);
    let path = state
        .storage
        .ensure_repo(
            &user,
            &query.repo,
            query.branch.as_deref(),
            &state.token,
            query.force,
        )
        .await?;
    let commit = read_commit(&path)
        .await
        .ok_or_else(|| QuarryError::NotFound(commit_sidecar(&path)))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        commit,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct BranchSwitchRequest {
    repo: String,
    branch: String,
}

#[derive(Serialize)]
pub struct BranchSwitchResponse {
    path: PathBuf,
    commit: Option<String>,
}

pub async fn branch_switch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BranchSwitchRequest>,
) -> Result<Json<BranchSwitchResponse>, ApiError> {
    let user = caller_user(&headers, &state);
    let path = state
        .storage
        .ensure_repo(
            &user,
            &request.repo,
            Some(&request.branch),
            &state.token,
            false,
        )
        .await?;
    let commit = read_commit(&path).await;
    Ok(Json(BranchSwitchResponse { path, commit }))
}

#[derive(Deserialize)]
pub struct PackageQuery {
    url: String,
}

pub async fn package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PackageQuery>,
) -> Result<Response, ApiError> {
    let user = caller_user(&headers, &state);
    let path = state.storage.ensure_package(&user, &query.url).await?;
    stream_file(&path, "application/octet-stream", None).await
}

#[derive(Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    path: String,
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    Ok(Json(state.storage.list(&query.path)?))
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    path: String,
    #[serde(default)]
    recursive: bool,
}

pub async fn delete_files(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete(&query.path, query.recursive)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct TouchQuery {
    path: String,
}

pub async fn touch_file(
    State(state): State<AppState>,
    Query(query): Query<TouchQuery>,
) -> Result<StatusCode, ApiError> {
    state.storage.touch(&query.path)?;
    Ok(StatusCode::NO_CONTENT)
}
