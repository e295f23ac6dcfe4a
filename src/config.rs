//! Configuration for a harvest run.
//!
//! All behaviour is controlled through [`HarvestConfig`], built via its
//! [`HarvestConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across runs, log them, and diff two runs to understand why
//! their manifests differ.
//!
//! # Design choice: builder over constructor
//! The scripts this crate replaces hardcoded absolute output paths and
//! machine-specific settings in top-level code. Here every environment-specific
//! value (output directory, user agent, referer) is an explicit field with a
//! documented default, and nothing reads the process working directory.

use crate::error::HarvestError;
use crate::progress::HarvestProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Browser-like User-Agent sent with every request.
///
/// Several image CDNs (Notion, Medium) reject the default `reqwest` agent
/// with 403, so a mainstream browser string is the safer default.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Configuration for an image harvest run.
///
/// Built via [`HarvestConfig::builder()`] or [`HarvestConfig::default()`].
///
/// # Example
/// ```rust
/// use imgharvest::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .output_dir("blog/attention-post")
///     .max_retries(5)
///     .courtesy_delay_ms(250)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Directory that receives the image files and `images.json`.
    /// Created recursively if missing. Default: `"images"`.
    pub output_dir: PathBuf,

    /// Total download attempts per image. Default: 3.
    ///
    /// Image CDNs throw transient 5xx and connection resets often enough that
    /// a single attempt loses real images; three attempts catches the vast
    /// majority without stalling the run on a permanently dead URL.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s. The delay sequence is
    /// monotonically non-decreasing, which is all the retry contract requires.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds (page fetch and image GET). Default: 30.
    pub timeout_secs: u64,

    /// Pause between successive downloads in milliseconds. Default: 500.
    ///
    /// Courtesy throttling, not a correctness requirement: the run is strictly
    /// sequential (one request in flight) precisely to avoid hammering the
    /// source server, and the delay spaces requests out further. Set to 0 to
    /// disable. The delay is skipped after the final reference.
    pub courtesy_delay_ms: u64,

    /// Minimum byte length for a response with a non-image Content-Type to be
    /// accepted as an image. Default: 100.
    ///
    /// Guards against saving an HTML error page under an image filename: a
    /// 50-byte `text/html` body is rejected and retried, while a large body
    /// with a missing or generic Content-Type is still accepted.
    pub min_image_bytes: u64,

    /// Extension used when the URL path carries none of the known image
    /// extensions. Default: `".jpg"`. Notion-style pipelines prefer `".png"`.
    pub default_extension: String,

    /// User-Agent header. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Optional Referer header sent with image requests.
    ///
    /// Some hosts (notably Notion's S3 signed URLs) only serve images when the
    /// request appears to come from their own pages.
    pub referer: Option<String>,

    /// Optional per-image progress callback.
    pub progress_callback: Option<Arc<dyn HarvestProgressCallback>>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("images"),
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 30,
            courtesy_delay_ms: 500,
            min_image_bytes: 100,
            default_extension: ".jpg".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("output_dir", &self.output_dir)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("timeout_secs", &self.timeout_secs)
            .field("courtesy_delay_ms", &self.courtesy_delay_ms)
            .field("min_image_bytes", &self.min_image_bytes)
            .field("default_extension", &self.default_extension)
            .field("user_agent", &self.user_agent)
            .field("referer", &self.referer)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HarvestProgressCallback>"),
            )
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build the shared HTTP client used for the whole run.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, HarvestError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| HarvestError::Internal(format!("HTTP client: {e}")))
    }
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    pub fn courtesy_delay_ms(mut self, ms: u64) -> Self {
        self.config.courtesy_delay_ms = ms;
        self
    }

    pub fn min_image_bytes(mut self, n: u64) -> Self {
        self.config.min_image_bytes = n;
        self
    }

    /// Set the fallback extension; a missing leading dot is added.
    pub fn default_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.config.default_extension = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.config.referer = Some(referer.into());
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn HarvestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(HarvestError::InvalidConfig("max_retries must be ≥ 1".into()));
        }
        if c.default_extension == "." || c.default_extension.is_empty() {
            return Err(HarvestError::InvalidConfig(format!(
                "default_extension must name an extension, got '{}'",
                c.default_extension
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(HarvestError::InvalidConfig("output_dir must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let c = HarvestConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.timeout_secs, 30);
        assert_eq!(c.min_image_bytes, 100);
        assert_eq!(c.default_extension, ".jpg");
        assert_eq!(c.courtesy_delay_ms, 500);
    }

    #[test]
    fn builder_normalises_extension() {
        let c = HarvestConfig::builder()
            .default_extension("png")
            .build()
            .unwrap();
        assert_eq!(c.default_extension, ".png");
    }

    #[test]
    fn builder_rejects_empty_output_dir() {
        let err = HarvestConfig::builder().output_dir("").build();
        assert!(matches!(err, Err(HarvestError::InvalidConfig(_))));
    }

    #[test]
    fn max_retries_floor_is_one() {
        let c = HarvestConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(c.max_retries, 1);
    }
}
