//! Streaming downloads with atomic promotion.
//!
//! Bytes stream into a temp file created next to the destination, so the
//! final rename stays on one filesystem and replaces the old copy in a
//! single step. Any failure (or a dropped future) removes the temp file and
//! leaves the destination untouched.

use crate::error::{QuarryError, QuarryResult};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Upper bound on the error-body snippet captured from a failed response.
const ERROR_BODY_LIMIT: usize = 1 << 20;

/// Assumed chunk count when stretching a transfer of unknown length.
const UNKNOWN_LENGTH_CHUNKS: u32 = 2000;

/// A download request: where from, and how to describe it in errors.
pub(crate) struct FetchRequest<'a> {
    pub url: &'a str,
    pub token: &'a str,
    pub accept: Option<&'a str>,
    pub context: &'a str,
}

/// Download `req.url` into `dest`, replacing any existing file atomically.
pub(crate) async fn download(
    client: &Client,
    req: FetchRequest<'_>,
    dest: &Path,
    throttle: Option<Duration>,
) -> QuarryResult<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| QuarryError::BadPath(dest.display().to_string()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| QuarryError::io(format!("creating {}", parent.display()), e))?;

    let mut request = client.get(req.url);
    if !req.token.trim().is_empty() {
        request = request.bearer_auth(req.token.trim());
    }
    if let Some(accept) = req.accept {
        request = request.header(ACCEPT, accept);
    }
    let resp = request
        .send()
        .await
        .map_err(|e| QuarryError::network(req.context, e))?;
    let resp = check_status(resp, req.context).await?;

    let tmp = tempfile::Builder::new()
        .prefix(".tmp-download-")
        .tempfile_in(parent)
        .map_err(|e| QuarryError::io(format!("creating temp file in {}", parent.display()), e))?;
    let std_file = tmp
        .reopen()
        .map_err(|e| QuarryError::io("opening temp file", e))?;
    let mut out = tokio::fs::File::from_std(std_file);

    let mut pacer = throttle
        .filter(|d| !d.is_zero())
        .map(|target| Throttle::new(target, resp.content_length()));
    if pacer.is_some() {
        debug!(
            url = req.url,
            content_length = ?resp.content_length(),
            "throttling download"
        );
    }

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| QuarryError::network(req.context, e))?;
        out.write_all(&chunk)
            .await
            .map_err(|e| QuarryError::io("writing download chunk", e))?;
        if let Some(pacer) = pacer.as_mut() {
            pacer.pace(chunk.len()).await;
        }
    }
    out.flush()
        .await
        .map_err(|e| QuarryError::io("flushing download", e))?;
    drop(out);

    tmp.persist(dest)
        .map_err(|e| QuarryError::io(format!("promoting download into {}", dest.display()), e.error))?;
    Ok(())
}

/// Pass a 2xx response through; render anything else into an error carrying
/// a bounded snippet of the body.
async fn check_status(resp: Response, context: &str) -> QuarryResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(QuarryError::UpstreamStatus {
        context: context.to_string(),
        status: status.as_u16(),
        body: body_snippet(resp).await,
    })
}

/// Read at most 1 MiB of a response body for error reporting.
pub(crate) async fn body_snippet(resp: Response) -> String {
    let mut out: Vec<u8> = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(Ok(chunk)) = stream.next().await {
        let remaining = ERROR_BODY_LIMIT - out.len();
        out.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        if out.len() >= ERROR_BODY_LIMIT {
            break;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Stretches a transfer to roughly a target total duration.
///
/// With a known content length the delay tracks observed progress against
/// the target; without one, each chunk gets a fixed slice of the target.
/// Every sleep is an await, so a cancelled caller stops mid-delay.
struct Throttle {
    target: Duration,
    content_length: Option<u64>,
    started: Instant,
    received: u64,
}

impl Throttle {
    fn new(target: Duration, content_length: Option<u64>) -> Self {
        Self {
            target,
            content_length,
            started: Instant::now(),
            received: 0,
        }
    }

    async fn pace(&mut self, just_read: usize) {
        self.received += just_read as u64;
        let delay = match self.content_length {
            Some(total) if total > 0 => {
                let progress = (self.received as f64 / total as f64).min(1.0);
                self.target
                    .mul_f64(progress)
                    .saturating_sub(self.started.elapsed())
            }
            _ => std::cmp::max(self.target / UNKNOWN_LENGTH_CHUNKS, Duration::from_millis(1)),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
