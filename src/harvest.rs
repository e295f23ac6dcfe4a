//! Harvest entry points: run a source (or a bare reference list) to completion.
//!
//! ## Why strictly sequential?
//!
//! A blog post carries tens of images, not thousands, and the hosts being
//! scraped are other people's blogs. One request in flight at a time plus a
//! small courtesy delay keeps the crate a polite citizen; the wall-clock cost
//! is seconds. A parallel downloader would additionally have to synchronise
//! the filename-uniqueness set, for no practical gain at this scale.
//!
//! ## Failure policy
//!
//! A run always completes and always writes `images.json`. Individual
//! download failures are recorded in the manifest, never propagated.
//! Only filesystem problems (output directory, file writes, manifest write)
//! abort the run, because nothing useful can happen after them.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::manifest::{ImageReference, Manifest};
use crate::pipeline::fetch::{self, DownloadOutcome};
use crate::pipeline::name::NamePlanner;
use crate::pipeline::source::ImageSource;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Extract references from `source`, then download them all.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(Manifest)` on success, even if some or all downloads failed
/// (check `manifest.total_failed`).
///
/// # Errors
/// Returns `Err(HarvestError)` only for fatal errors: the source page could
/// not be fetched, or the local filesystem refused a write.
pub async fn run_source<S: ImageSource>(
    source: &S,
    config: &HarvestConfig,
) -> Result<Manifest, HarvestError> {
    let client = config.http_client()?;
    let references = source.references(&client, config).await?;
    run_with_client(&client, source.label(), references, config).await
}

/// Download an already-extracted reference list.
///
/// `source_label` is recorded in the manifest so downstream tooling can tell
/// which page or list a directory of images came from.
pub async fn run_references(
    source_label: &str,
    references: Vec<ImageReference>,
    config: &HarvestConfig,
) -> Result<Manifest, HarvestError> {
    let client = config.http_client()?;
    run_with_client(&client, source_label, references, config).await
}

async fn run_with_client(
    client: &reqwest::Client,
    source_label: &str,
    references: Vec<ImageReference>,
    config: &HarvestConfig,
) -> Result<Manifest, HarvestError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| HarvestError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    // References without a URL are malformed input, dropped before counting.
    let skipped = references.iter().filter(|r| r.url.trim().is_empty()).count();
    if skipped > 0 {
        warn!("Dropping {skipped} reference(s) with an empty URL");
    }
    let references: Vec<ImageReference> = references
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .collect();

    let total = references.len();
    let mut manifest = Manifest::new(source_label);
    manifest.total_found = total;

    info!(
        "Harvesting {} image(s) from {} into {}",
        total,
        source_label,
        config.output_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut planner = NamePlanner::new(&config.output_dir, config.default_extension.clone());

    for (i, reference) in references.iter().enumerate() {
        let index = i + 1;
        let filename = planner.assign(reference, index);
        let dest = config.output_dir.join(&filename);

        if let Some(ref cb) = config.progress_callback {
            cb.on_image_start(index, total, &reference.url);
        }
        debug!("[{index}/{total}] {} -> {filename}", reference.url);

        match fetch::download(client, reference, &filename, &dest, config).await? {
            DownloadOutcome::Downloaded(record) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_complete(index, total, &record.filename, record.size_bytes);
                }
                manifest.push_success(record);
            }
            DownloadOutcome::Failed(record) => {
                warn!("[{index}/{total}] failed: {} — {}", record.url, record.error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_error(index, total, &record.url, &record.error);
                }
                manifest.push_failure(record);
            }
        }

        // Courtesy throttling between requests; pointless after the last one.
        if config.courtesy_delay_ms > 0 && index < total {
            sleep(Duration::from_millis(config.courtesy_delay_ms)).await;
        }
    }

    manifest.write(&config.output_dir).await?;

    info!(
        "Harvest complete: {}/{} downloaded, {} failed",
        manifest.total_downloaded, manifest.total_found, manifest.total_failed
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(manifest.total_downloaded, manifest.total_failed);
    }

    Ok(manifest)
}

/// Synchronous wrapper around [`run_source`].
///
/// Creates a temporary tokio runtime internally, for callers that are not
/// already async.
pub fn run_source_sync<S: ImageSource>(
    source: &S,
    config: &HarvestConfig,
) -> Result<Manifest, HarvestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HarvestError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run_source(source, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Network-free invariants only; download behaviour against a live socket
    // is covered in tests/e2e.rs.

    fn config_in(dir: &std::path::Path) -> HarvestConfig {
        HarvestConfig::builder()
            .output_dir(dir)
            .max_retries(1)
            .retry_backoff_ms(1)
            .courtesy_delay_ms(0)
            .timeout_secs(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_reference_list_still_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let manifest = run_references("empty", Vec::new(), &config).await.unwrap();
        assert_eq!(manifest.total_found, 0);
        assert!(dir.path().join("images.json").exists());
    }

    #[tokio::test]
    async fn malformed_references_are_dropped_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let refs = vec![
            ImageReference::new("", Some("no url")),
            ImageReference::new("   ", None),
        ];
        let manifest = run_references("bad-input", refs, &config).await.unwrap();
        assert_eq!(manifest.total_found, 0);
        assert_eq!(manifest.total_downloaded, 0);
        assert_eq!(manifest.total_failed, 0);
    }

    #[tokio::test]
    async fn unreachable_host_recorded_as_failure_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        // Reserved TEST-NET-1 address: connections fail fast and reliably.
        let refs = vec![ImageReference::new("http://192.0.2.1/x.png", None)];
        let manifest = run_references("dead-host", refs, &config).await.unwrap();

        assert_eq!(manifest.total_found, 1);
        assert_eq!(manifest.total_failed, 1);
        assert!(manifest.images.is_empty());
        // No file left behind for the failed reference.
        assert!(!dir.path().join("x.png").exists());
    }

    #[tokio::test]
    async fn output_dir_created_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let config = HarvestConfig::builder()
            .output_dir(&nested)
            .courtesy_delay_ms(0)
            .build()
            .unwrap();

        run_references("nested", Vec::new(), &config).await.unwrap();
        assert!(nested.join("images.json").exists());
    }
}
