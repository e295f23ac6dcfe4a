//! Pipeline stages for image harvesting.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap an extraction
//! strategy without touching naming or download logic.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ name ──▶ fetch ──▶ manifest
//! (extract)  (plan)   (GET+retry)  (images.json)
//! ```
//!
//! 1. [`source`] — produce an ordered list of `ImageReference`s from an HTML
//!    page or a hard-coded list
//! 2. [`name`]   — sanitise alt text / URL basenames into unique,
//!    filesystem-safe filenames
//! 3. [`fetch`]  — download each reference with bounded retries; the only
//!    stage with network I/O on the image URLs
//!
//! Each reference transitions exactly once, `pending → downloaded | failed`;
//! there is no further state to track.

pub mod fetch;
pub mod name;
pub mod source;
