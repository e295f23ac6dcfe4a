//! Filename sanitisation and unique-name planning.
//!
//! ## Why a planner and not a pure function?
//!
//! A filename is only correct relative to every name already taken — by an
//! earlier reference in this run or by a file already sitting in the output
//! directory. [`NamePlanner`] owns that set, so name generation stays a
//! single-owner operation with no global state. If downloads are ever
//! parallelised, this set is the one piece of shared state that needs a lock.
//!
//! ## Sanitisation rules
//!
//! Derived names must be safe on common filesystems and stable across runs:
//!
//! 1. Every Unicode space separator (ASCII space, NBSP, narrow NBSP, thin
//!    space, …) becomes a single `_`. Alt texts copied out of rendered pages
//!    routinely contain U+00A0 and U+202F, which look like spaces but survive
//!    a naive `replace(' ', "_")`.
//! 2. Characters invalid on Windows/NTFS (`< > : " / \ | ? *`) and all
//!    control characters are removed.
//! 3. Runs of `_` collapse to one; leading/trailing `_` are stripped.
//! 4. The result is ASCII-lowercased.
//!
//! The function is deterministic and idempotent: no randomness, no timestamps,
//! and `sanitize(sanitize(x)) == sanitize(x)`.

use crate::manifest::ImageReference;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extensions recognised in URL paths. Anything else falls back to the
/// configured default extension.
pub const KNOWN_IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

/// Alt texts equal to one of these (case-insensitive) carry no information
/// and are ignored in favour of the URL basename.
const GENERIC_ALT_WORDS: [&str; 4] = ["image", "img", "photo", "picture"];

/// Alt-derived base names are cut to this many characters before
/// sanitisation, to keep pathological alt texts from producing
/// pathological filenames.
const MAX_ALT_BASE_CHARS: usize = 50;

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\p{Zs}]+").unwrap());
static RE_FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\p{Cc}]"#).unwrap());
static RE_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Normalise arbitrary text into a filesystem-safe name fragment.
///
/// Returns an empty string when nothing usable remains, which callers treat
/// as "derive the name some other way".
pub fn sanitize(raw: &str) -> String {
    // Whitespace first: tab and newline are both whitespace and control
    // characters, and must become underscores rather than vanish.
    let s = RE_SPACES.replace_all(raw, "_");
    let s = RE_FORBIDDEN.replace_all(&s, "");
    let s = RE_UNDERSCORES.replace_all(&s, "_");
    s.trim_matches('_').to_ascii_lowercase()
}

/// Allocates unique, sanitized filenames for one harvest run.
pub struct NamePlanner {
    output_dir: PathBuf,
    used: HashSet<String>,
    default_extension: String,
}

impl NamePlanner {
    /// Create a planner for `output_dir`.
    ///
    /// `default_extension` must include the leading dot (the config builder
    /// guarantees this).
    pub fn new(output_dir: impl Into<PathBuf>, default_extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            used: HashSet::new(),
            default_extension: default_extension.into(),
        }
    }

    /// Produce a unique filename for `reference`.
    ///
    /// `index` is the 1-based position of the reference in the run, used only
    /// for the `image-NNN` fallback. The returned name is recorded as taken,
    /// so two identical references get distinct names (`x.png`, `x-1.png`).
    pub fn assign(&mut self, reference: &ImageReference, index: usize) -> String {
        let base = self
            .base_from_alt(reference.alt_text.as_deref())
            .or_else(|| base_from_url(&reference.url))
            .unwrap_or_else(|| format!("image-{index:03}"));

        let extension = extension_from_url(&reference.url)
            .unwrap_or_else(|| self.default_extension.clone());

        let mut candidate = format!("{base}{extension}");
        let mut suffix = 1u32;
        while self.is_taken(&candidate) {
            candidate = format!("{base}-{suffix}{extension}");
            suffix += 1;
        }

        self.used.insert(candidate.clone());
        candidate
    }

    /// Taken either earlier in this run or by a pre-existing file on disk.
    fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name) || self.output_dir.join(name).exists()
    }

    fn base_from_alt(&self, alt: Option<&str>) -> Option<String> {
        let alt = alt?.trim();
        if alt.len() <= 3 || GENERIC_ALT_WORDS.contains(&alt.to_ascii_lowercase().as_str()) {
            return None;
        }
        let truncated: String = alt.chars().take(MAX_ALT_BASE_CHARS).collect();
        let base = sanitize(&truncated);
        (!base.is_empty()).then_some(base)
    }
}

/// Derive a base name from the URL's path basename, extension stripped.
fn base_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let basename = parsed.path_segments()?.next_back()?.to_string();
    if basename.is_empty() {
        return None;
    }
    // Strip a trailing extension, but keep dotfiles and extensionless names whole.
    let stem = match basename.rfind('.') {
        Some(0) | None => basename.as_str(),
        Some(i) => &basename[..i],
    };
    let base = sanitize(stem);
    (!base.is_empty()).then_some(base)
}

/// Extension from the URL path suffix, when it is a known image extension.
fn extension_from_url(url: &str) -> Option<String> {
    let path = url::Url::parse(url).ok()?.path().to_ascii_lowercase();
    KNOWN_IMAGE_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(*ext))
        .map(|ext| ext.to_string())
}

/// True when `name` contains nothing the sanitizer forbids — used by tests
/// and debug assertions to verify the output-directory invariant.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "<>:\"/\\|?*".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(dir: &Path) -> NamePlanner {
        NamePlanner::new(dir, ".jpg")
    }

    #[test]
    fn sanitize_replaces_unicode_spaces() {
        assert_eq!(sanitize("Gradient Norm Plot"), "gradient_norm_plot");
        assert_eq!(sanitize("a\u{00a0}b\u{202f}c\u{2009}d\u{200a}e"), "a_b_c_d_e");
    }

    #[test]
    fn sanitize_removes_forbidden_chars() {
        assert_eq!(sanitize(r#"fig<1>: "loss/curve" \x|y?z*"#), "fig1_losscurve_xyz");
        assert_eq!(sanitize("tab\tnew\nline"), "tab_new_line");
    }

    #[test]
    fn sanitize_collapses_and_trims_underscores() {
        assert_eq!(sanitize("__a  _  b__"), "a_b");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "Gradient Norm Plot",
            "Fig. 3: Attention\u{00a0}weights / heads",
            "___x___",
            "<<<>>>",
        ] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn alt_text_wins_when_meaningful() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());
        let r = ImageReference::new("http://x/a.png", Some("Gradient Norm Plot"));
        assert_eq!(p.assign(&r, 1), "gradient_norm_plot.png");
    }

    #[test]
    fn generic_and_short_alt_falls_back_to_basename() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());

        let generic = ImageReference::new("http://x/figs/loss-curve.png", Some("Image"));
        assert_eq!(p.assign(&generic, 1), "loss-curve.png");

        let short = ImageReference::new("http://x/figs/arch.webp", Some("ok"));
        assert_eq!(p.assign(&short, 2), "arch.webp");
    }

    #[test]
    fn index_fallback_when_nothing_usable() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());
        // Path ends in '/', no basename; no alt text.
        let r = ImageReference::new("http://x/images/", None);
        assert_eq!(p.assign(&r, 7), "image-007.jpg");
    }

    #[test]
    fn unknown_extension_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = NamePlanner::new(dir.path(), ".png");
        let r = ImageReference::new("http://x/render?id=42", Some("Attention heatmap"));
        assert_eq!(p.assign(&r, 1), "attention_heatmap.png");
    }

    #[test]
    fn collision_in_run_gets_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());
        let r = ImageReference::new("http://x/image.png", None);
        // "image" basename is fine — the generic-word filter only applies to alt text.
        assert_eq!(p.assign(&r, 1), "image.png");
        assert_eq!(p.assign(&r, 2), "image-1.png");
        assert_eq!(p.assign(&r, 3), "image-2.png");
    }

    #[test]
    fn collision_with_existing_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plot.png"), b"old").unwrap();
        let mut p = planner(dir.path());
        let r = ImageReference::new("http://x/plot.png", None);
        assert_eq!(p.assign(&r, 1), "plot-1.png");
    }

    #[test]
    fn long_alt_text_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());
        let alt = "word ".repeat(40);
        let r = ImageReference::new("http://x/a.png", Some(alt.as_str()));
        let name = p.assign(&r, 1);
        // 50 chars of input, minus trailing partial underscore, plus ".png".
        assert!(name.len() <= MAX_ALT_BASE_CHARS + ".png".len());
        assert!(is_safe_filename(&name));
    }

    #[test]
    fn assigned_names_are_always_safe() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = planner(dir.path());
        let cases = [
            ImageReference::new("http://x/Weird Name (v2).JPG", None),
            ImageReference::new("http://x/a.png", Some("C:\\path\\to?file")),
            ImageReference::new("http://x/no-ext", Some("\u{00a0}\u{202f}")),
        ];
        for (i, r) in cases.iter().enumerate() {
            let name = p.assign(r, i + 1);
            assert!(is_safe_filename(&name), "unsafe name: {name:?}");
        }
    }
}
