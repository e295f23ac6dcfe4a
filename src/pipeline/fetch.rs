//! Bounded-retry image download: the only stage with network I/O.
//!
//! ## Retry strategy
//!
//! Image CDNs fail transiently all the time — connection resets, 5xx under
//! load, the occasional 404 that resolves once a cache warms up. Every
//! attempt-level failure is therefore treated the same way: wait, retry,
//! and only after `max_retries` total attempts record a
//! [`FailureRecord`]. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`)
//! keeps the wait sequence monotonically non-decreasing; with a 500 ms base
//! and 3 attempts the sequence is 500 ms → 1 s, under 2 s of waiting per
//! dead URL.
//!
//! ## The HTML-error-page trap
//!
//! Many hosts answer a missing image with HTTP 200 and a small HTML error
//! page. Saving that under `figure_3.png` silently corrupts the blog's image
//! set. A response is only accepted when its Content-Type mentions `image`
//! **or** its body is at least `min_image_bytes` long; everything else counts
//! as a failed attempt. A partial or rejected file never survives on disk.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::manifest::{DownloadRecord, FailureRecord, ImageReference};
use futures::StreamExt;
use reqwest::header;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Result of one reference's download: success and failure are both ordinary
/// outcomes of a run, distinct from the fatal [`HarvestError`] level.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The image landed on disk under the planned filename.
    Downloaded(DownloadRecord),
    /// All attempts failed; no file remains on disk.
    Failed(FailureRecord),
}

/// An attempt either fails retryably (network, status, validation) or hits a
/// local filesystem problem that makes further progress pointless.
enum AttemptError {
    Retryable(String),
    Fatal(HarvestError),
}

/// Delay before retry number `attempt` (1-based), doubling each time.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
}

/// Download one reference to `dest` with bounded retries.
///
/// Returns `Ok(DownloadOutcome)` for both success and exhausted retries —
/// per-image failure never aborts the batch. Returns `Err(HarvestError)` only
/// when the local filesystem refuses the write.
///
/// Side effect contract: exactly one file on success; zero files on failure
/// (partial writes are removed before each retry and before returning).
pub async fn download(
    client: &reqwest::Client,
    reference: &ImageReference,
    filename: &str,
    dest: &Path,
    config: &HarvestConfig,
) -> Result<DownloadOutcome, HarvestError> {
    let alt_text = reference.alt_text.clone().unwrap_or_default();
    let mut last_err = String::from("no attempt made");

    for attempt in 1..=config.max_retries {
        if attempt > 1 {
            let delay = backoff_delay(config.retry_backoff_ms, attempt - 1);
            warn!(
                "{}: retry {}/{} after {:?}",
                reference.url, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        match attempt_download(client, &reference.url, dest, config).await {
            Ok(size_bytes) => {
                debug!("{} -> {} ({} bytes)", reference.url, filename, size_bytes);
                return Ok(DownloadOutcome::Downloaded(DownloadRecord {
                    filename: filename.to_string(),
                    original_url: reference.url.clone(),
                    alt_text,
                    size_bytes,
                }));
            }
            Err(AttemptError::Retryable(reason)) => {
                warn!(
                    "{}: attempt {}/{} failed — {}",
                    reference.url, attempt, config.max_retries, reason
                );
                last_err = reason;
            }
            Err(AttemptError::Fatal(e)) => {
                remove_partial(dest).await;
                return Err(e);
            }
        }
    }

    Ok(DownloadOutcome::Failed(FailureRecord {
        url: reference.url.clone(),
        alt_text,
        error: last_err,
    }))
}

/// One GET attempt: stream the body to `dest`, then validate it.
///
/// On every failure path the partially written file is removed before
/// returning, so the caller never has to clean up.
async fn attempt_download(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    config: &HarvestConfig,
) -> Result<u64, AttemptError> {
    let mut request = client.get(url);
    if let Some(ref referer) = config.referer {
        request = request.header(header::REFERER, referer);
    }

    let response = request
        .send()
        .await
        .map_err(|e| AttemptError::Retryable(describe_request_error(&e, config.timeout_secs)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError::Retryable(format!("HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    // Stream to disk rather than buffering: some blog figures are multi-MB
    // PNGs and there is no reason to hold them in memory.
    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        AttemptError::Fatal(HarvestError::FileWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
    })?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                drop(file);
                remove_partial(dest).await;
                return Err(AttemptError::Retryable(format!("body read failed: {e}")));
            }
        };
        if let Err(e) = file.write_all(&bytes).await {
            drop(file);
            remove_partial(dest).await;
            return Err(AttemptError::Fatal(HarvestError::FileWriteFailed {
                path: dest.to_path_buf(),
                source: e,
            }));
        }
        written += bytes.len() as u64;
    }

    if let Err(e) = file.flush().await {
        drop(file);
        remove_partial(dest).await;
        return Err(AttemptError::Fatal(HarvestError::FileWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        }));
    }
    drop(file);

    if is_plausible_image(&content_type, written, config.min_image_bytes) {
        Ok(written)
    } else {
        remove_partial(dest).await;
        Err(AttemptError::Retryable(format!(
            "not an image: content-type '{content_type}', {written} bytes"
        )))
    }
}

/// Accept when the server says it's an image, or when the body is big enough
/// that an HTML error page is implausible.
fn is_plausible_image(content_type: &str, size_bytes: u64, min_image_bytes: u64) -> bool {
    content_type.contains("image") || size_bytes >= min_image_bytes
}

/// Best-effort removal of a partial download; the file may not exist.
async fn remove_partial(dest: &Path) {
    let _ = tokio::fs::remove_file(dest).await;
}

fn describe_request_error(e: &reqwest::Error, timeout_secs: u64) -> String {
    if e.is_timeout() {
        format!("timed out after {timeout_secs}s")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
