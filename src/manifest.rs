//! The manifest: the durable record of a harvest run.
//!
//! Every run produces exactly one `images.json` in the output directory,
//! overwriting whatever a previous run left there. The manifest is the
//! contract with downstream blog tooling: it maps each downloaded file back
//! to its original URL and alt text, and lists every reference that could
//! not be fetched together with the reason.
//!
//! The write is atomic (temp file + rename) so a crash mid-serialisation
//! never leaves a truncated JSON document next to the images.

use crate::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed manifest filename inside the output directory.
pub const MANIFEST_FILENAME: &str = "images.json";

/// A candidate image extracted from a source, prior to download.
///
/// Produced by an [`crate::pipeline::source::ImageSource`]. URLs need not be
/// unique and ordering is whatever the source yielded; order only affects
/// filename tie-break numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Absolute URL of the image.
    pub url: String,
    /// Descriptive text (typically the `alt` attribute), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl ImageReference {
    /// Convenience constructor for hard-coded lists and tests.
    pub fn new(url: impl Into<String>, alt_text: Option<&str>) -> Self {
        Self {
            url: url.into(),
            alt_text: alt_text.map(|s| s.to_string()),
        }
    }
}

/// A successfully downloaded image. Immutable once written to the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Final sanitized filename inside the output directory.
    pub filename: String,
    /// The URL the bytes came from.
    pub original_url: String,
    /// Alt text carried over from the reference (empty string when absent).
    pub alt_text: String,
    /// Size of the written file in bytes.
    pub size_bytes: u64,
}

/// A reference that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The URL that could not be downloaded.
    pub url: String,
    /// Alt text carried over from the reference (empty string when absent).
    pub alt_text: String,
    /// Human-readable reason from the last attempt.
    pub error: String,
}

/// Summary of a single harvest run, persisted as `images.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Label of the source the references came from (page URL, list name…).
    pub source: String,
    /// Valid references found (malformed entries are dropped, not counted).
    pub total_found: usize,
    /// References downloaded successfully.
    pub total_downloaded: usize,
    /// References that exhausted their retries.
    pub total_failed: usize,
    /// One entry per downloaded file.
    pub images: Vec<DownloadRecord>,
    /// One entry per failed reference.
    pub failed: Vec<FailureRecord>,
}

impl Manifest {
    /// An empty manifest for the given source label.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            total_found: 0,
            total_downloaded: 0,
            total_failed: 0,
            images: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Record a successful download.
    pub fn push_success(&mut self, record: DownloadRecord) {
        self.total_downloaded += 1;
        self.images.push(record);
    }

    /// Record an exhausted-retries failure.
    pub fn push_failure(&mut self, record: FailureRecord) {
        self.total_failed += 1;
        self.failed.push(record);
    }

    /// Write the manifest as pretty-printed JSON into `output_dir`.
    ///
    /// Overwrites any previous `images.json`. Atomic: serialises to
    /// `images.json.tmp` first, then renames into place.
    pub async fn write(&self, output_dir: &Path) -> Result<(), HarvestError> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| HarvestError::Internal(format!("manifest serialisation: {e}")))?;

        let tmp_path = output_dir.join(format!("{MANIFEST_FILENAME}.tmp"));
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| HarvestError::ManifestWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| HarvestError::ManifestWriteFailed { path, source: e })
    }

    /// Read a manifest back from `output_dir`, if one exists.
    ///
    /// Useful for tooling that post-processes a prior run.
    pub async fn read(output_dir: &Path) -> Result<Option<Self>, HarvestError> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HarvestError::Internal(format!(
                    "reading manifest '{}': {e}",
                    path.display()
                )))
            }
        };
        let manifest = serde_json::from_slice(&bytes)
            .map_err(|e| HarvestError::Internal(format!("parsing manifest: {e}")))?;
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_pushes() {
        let mut m = Manifest::new("https://example.com/post");
        m.total_found = 2;
        m.push_success(DownloadRecord {
            filename: "plot.png".into(),
            original_url: "https://example.com/plot.png".into(),
            alt_text: "Plot".into(),
            size_bytes: 2048,
        });
        m.push_failure(FailureRecord {
            url: "https://example.com/gone.png".into(),
            alt_text: String::new(),
            error: "HTTP 404".into(),
        });

        assert_eq!(m.total_downloaded, 1);
        assert_eq!(m.total_failed, 1);
        assert_eq!(m.images.len() + m.failed.len(), m.total_found);
    }

    #[test]
    fn manifest_json_shape() {
        let mut m = Manifest::new("hardcoded");
        m.total_found = 1;
        m.push_success(DownloadRecord {
            filename: "gradient_norm_plot.png".into(),
            original_url: "http://x/a.png".into(),
            alt_text: "Gradient Norm Plot".into(),
            size_bytes: 2048,
        });

        let v: serde_json::Value = serde_json::to_value(&m).unwrap();
        assert_eq!(v["total_found"], 1);
        assert_eq!(v["total_downloaded"], 1);
        assert_eq!(v["total_failed"], 0);
        assert_eq!(v["images"][0]["filename"], "gradient_norm_plot.png");
        assert_eq!(v["images"][0]["size_bytes"], 2048);
        assert_eq!(v["images"][0]["alt_text"], "Gradient Norm Plot");
        assert!(v["failed"].as_array().unwrap().is_empty());
    }

    #[test]
    fn reference_roundtrip_with_missing_alt() {
        let r: ImageReference = serde_json::from_str(r#"{"url":"http://x/a.png"}"#).unwrap();
        assert_eq!(r.url, "http://x/a.png");
        assert!(r.alt_text.is_none());
    }

    #[tokio::test]
    async fn write_overwrites_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = Manifest::new("run-1");
        first.total_found = 3;
        first.write(dir.path()).await.unwrap();

        let second = Manifest::new("run-2");
        second.write(dir.path()).await.unwrap();

        let read_back = Manifest::read(dir.path()).await.unwrap().unwrap();
        assert_eq!(read_back.source, "run-2");
        assert_eq!(read_back.total_found, 0);
        // No stray temp file left behind.
        assert!(!dir.path().join("images.json.tmp").exists());
    }

    #[tokio::test]
    async fn read_missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Manifest::read(dir.path()).await.unwrap().is_none());
    }
}
