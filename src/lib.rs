//! # imgharvest
//!
//! Harvest images from blog articles into sanitized files plus a JSON manifest.
//!
//! ## Why this crate?
//!
//! Saving the figures out of a blog post or paper sounds trivial until you do
//! it twenty times: alt texts full of non-breaking spaces become broken
//! filenames, two figures want the same name, a CDN answers a missing image
//! with an HTTP 200 HTML error page, and a flaky host drops every third
//! connection. This crate deduplicates that recurring loop into one pipeline:
//! extract candidate URLs, plan safe unique filenames, download with bounded
//! retries and image validation, and record every outcome in `images.json`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source (URL or list)
//!  │
//!  ├─ 1. Extract   img / picture tags via scraper, or a hard-coded list
//!  ├─ 2. Name      sanitise alt text or URL basename; resolve collisions
//!  ├─ 3. Fetch     sequential GETs, bounded retries, exponential backoff
//!  ├─ 4. Validate  Content-Type contains "image" or body ≥ min size
//!  └─ 5. Manifest  images.json: counts + per-file records + failures
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgharvest::{run_source, HarvestConfig, HtmlPageSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HtmlPageSource::new("https://blog.example.com/attention");
//!     let config = HarvestConfig::builder()
//!         .output_dir("blog/attention")
//!         .build()?;
//!     let manifest = run_source(&source, &config).await?;
//!     println!(
//!         "{}/{} downloaded, {} failed",
//!         manifest.total_downloaded, manifest.total_found, manifest.total_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgharvest` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! imgharvest = { version = "0.3", default-features = false }
//! ```
//!
//! ## Guarantees
//!
//! - A run always completes and always writes a manifest; per-image failures
//!   are recorded, never propagated. Only filesystem errors are fatal.
//! - Every filename in the output directory is unique and free of whitespace,
//!   control characters, and characters invalid on common filesystems.
//! - A failed download leaves no partial file behind.
//! - Requests are strictly sequential with an optional courtesy delay, so the
//!   source host never sees more than one connection from a run.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod harvest;
pub mod manifest;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HarvestConfig, HarvestConfigBuilder, DEFAULT_USER_AGENT};
pub use error::HarvestError;
pub use harvest::{run_references, run_source, run_source_sync};
pub use manifest::{
    DownloadRecord, FailureRecord, ImageReference, Manifest, MANIFEST_FILENAME,
};
pub use pipeline::name::sanitize;
pub use pipeline::source::{HtmlPageSource, ImageSource, StaticListSource};
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
