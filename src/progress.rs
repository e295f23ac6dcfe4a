//! Progress-callback trait for per-image harvest events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::HarvestConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the reference list.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log file, or a terminal progress bar without
//! the library knowing anything about how the host application communicates.
//! The trait is `Send + Sync` so a future parallel downloader can keep using it
//! unchanged, even though the current pipeline is strictly sequential.

use std::sync::Arc;

/// Called by the harvest pipeline as it processes each reference.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Indices are 1-based, matching the per-item log lines
/// the original scripts printed.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once after extraction, before any download starts.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the GET for a reference is issued.
    fn on_image_start(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called when an image lands on disk.
    fn on_image_complete(&self, index: usize, total: usize, filename: &str, size_bytes: u64) {
        let _ = (index, total, filename, size_bytes);
    }

    /// Called when a reference exhausts its retries.
    fn on_image_error(&self, index: usize, total: usize, url: &str, error: &str) {
        let _ = (index, total, url, error);
    }

    /// Called once after the manifest is written.
    fn on_run_complete(&self, downloaded: usize, failed: usize) {
        let _ = (downloaded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HarvestConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl HarvestProgressCallback for TrackingCallback {
        fn on_image_start(&self, _index: usize, _total: usize, _url: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_complete(&self, _i: usize, _t: usize, _f: &str, _b: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_error(&self, _i: usize, _t: usize, _u: &str, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_image_start(1, 5, "http://x/a.png");
        cb.on_image_complete(1, 5, "a.png", 42);
        cb.on_image_error(2, 5, "http://x/b.png", "HTTP 404");
        cb.on_run_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        t.on_image_start(1, 2, "http://x/a.png");
        t.on_image_complete(1, 2, "a.png", 100);
        t.on_image_start(2, 2, "http://x/b.png");
        t.on_image_error(2, 2, "http://x/b.png", "timeout");

        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn HarvestProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_image_complete(1, 10, "x.png", 512);
    }
}
