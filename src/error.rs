//! Error types for the imgharvest library.
//!
//! Two distinct failure modes get two distinct representations:
//!
//! * [`HarvestError`] — **Fatal**: the run cannot proceed at all (output
//!   directory cannot be created, the source page cannot be fetched, the
//!   manifest cannot be written). Returned as `Err(HarvestError)` from the
//!   top-level `run_*` functions.
//!
//! * [`crate::manifest::FailureRecord`] — **Non-fatal**: a single image
//!   exhausted its retries but every other reference is fine. Stored inside
//!   [`crate::manifest::Manifest::failed`] so callers can inspect partial
//!   success rather than losing the whole batch to one dead URL.
//!
//! The separation is the propagation policy: per-item errors never abort the
//! batch; batch-level filesystem errors abort immediately since no further
//! progress is possible.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the imgharvest library.
///
/// Per-image download failures are *not* represented here — they are recorded
/// in [`crate::manifest::Manifest::failed`] and the run completes normally.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The source string is not a valid HTTP/HTTPS URL.
    #[error("Invalid source URL '{input}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { input: String },

    /// The source page was unreachable or returned a non-2xx status.
    #[error("Failed to fetch page '{url}': {reason}\nCheck the URL and your internet connection.")]
    FetchPageFailed { url: String, reason: String },

    /// Fetching the source page exceeded the configured timeout.
    #[error("Fetching '{url}' timed out after {secs}s\nIncrease --timeout.")]
    FetchPageTimeout { url: String, secs: u64 },

    /// A reference list file exists but could not be read or parsed.
    #[error("Failed to read reference list '{path}': {reason}")]
    RefListFailed { path: PathBuf, reason: String },

    // ── Filesystem errors ─────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A downloaded file could not be opened for writing.
    ///
    /// Distinct from a failed download: the network side succeeded but the
    /// local disk did not, so continuing with later references is pointless.
    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `images.json` manifest could not be written.
    #[error("Failed to write manifest '{path}': {source}")]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
