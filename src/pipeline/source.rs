//! Image sources: anything that can produce a list of [`ImageReference`]s.
//!
//! The scripts this crate replaces each hardcoded one extraction strategy —
//! img tags here, `picture`/`source` tags there, a literal URL list elsewhere —
//! and then copy-pasted the same download loop. Here extraction is a trait and
//! the download core is shared: one implementation per source type, one
//! downloader for all of them.
//!
//! Extraction is deliberately shallow. Anything beyond "find image URLs and
//! their alt text in the fetched DOM" (CSS background images, JavaScript-built
//! galleries, PDF-embedded figures) belongs in an external tool that feeds a
//! [`StaticListSource`].

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::manifest::ImageReference;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Content-scoping selectors tried in order when the caller does not supply
/// one. Matches the article-body conventions of mainstream blog platforms.
const SCOPE_SELECTORS: [&str; 4] = ["article", "main", ".post-content", ".entry-content"];

/// `src` attributes checked on each `img`, in preference order. Lazy-loading
/// frameworks leave the real URL in `data-src`/`data-lazy-src` and put a
/// placeholder in `src`.
const IMG_SRC_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

/// A producer of image references.
///
/// `references` receives the run's shared HTTP client so page fetches honour
/// the same user agent and timeout as the downloads themselves.
pub trait ImageSource {
    /// Label recorded as [`crate::manifest::Manifest::source`].
    fn label(&self) -> &str;

    /// Extract the candidate references, in page order.
    fn references(
        &self,
        client: &reqwest::Client,
        config: &HarvestConfig,
    ) -> impl std::future::Future<Output = Result<Vec<ImageReference>, HarvestError>> + Send;
}

// ── HTML page source ─────────────────────────────────────────────────────

/// Extracts images from a live HTML page: `img` tags (including lazy-load
/// attributes) and `picture > source` srcsets, scoped to the article body
/// when one can be identified.
pub struct HtmlPageSource {
    url: String,
    scope_selector: Option<String>,
}

impl HtmlPageSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scope_selector: None,
        }
    }

    /// Restrict extraction to the first element matching `selector` instead
    /// of the built-in article-body heuristics.
    pub fn with_scope_selector(mut self, selector: impl Into<String>) -> Self {
        self.scope_selector = Some(selector.into());
        self
    }
}

impl ImageSource for HtmlPageSource {
    fn label(&self) -> &str {
        &self.url
    }

    async fn references(
        &self,
        client: &reqwest::Client,
        config: &HarvestConfig,
    ) -> Result<Vec<ImageReference>, HarvestError> {
        let base = Url::parse(&self.url).map_err(|_| HarvestError::InvalidUrl {
            input: self.url.clone(),
        })?;

        info!("Fetching page: {}", self.url);
        let response = client.get(base.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::FetchPageTimeout {
                    url: self.url.clone(),
                    secs: config.timeout_secs,
                }
            } else {
                HarvestError::FetchPageFailed {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::FetchPageFailed {
                url: self.url.clone(),
                reason: format!("HTTP {status}"),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| HarvestError::FetchPageFailed {
                url: self.url.clone(),
                reason: format!("reading body: {e}"),
            })?;

        // Parsing is synchronous and must not span an await point:
        // scraper's DOM is not Send.
        let refs = extract_from_html(&html, &base, self.scope_selector.as_deref());
        info!("Found {} image references on {}", refs.len(), self.url);
        Ok(refs)
    }
}

/// Extract image references from an HTML document.
///
/// Pure function over the document text, separated from the fetch so the
/// extraction rules are testable without a network.
pub fn extract_from_html(
    html: &str,
    base_url: &Url,
    scope_selector: Option<&str>,
) -> Vec<ImageReference> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let scope = find_scope(&document, scope_selector).unwrap_or(root);

    let mut seen: HashSet<String> = HashSet::new();
    let mut refs: Vec<ImageReference> = Vec::new();

    let img_sel = Selector::parse("img").expect("static selector");
    for img in scope.select(&img_sel) {
        let Some(src) = IMG_SRC_ATTRS.iter().find_map(|a| img.value().attr(a)) else {
            continue;
        };
        let Some(url) = resolve_candidate(src, base_url) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let alt = img
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);
        refs.push(ImageReference { url, alt_text: alt });
    }

    // picture > source carries responsive variants; take the first srcset
    // candidate of each, which is the smallest-width (and safest) choice.
    let source_sel = Selector::parse("picture > source[srcset]").expect("static selector");
    for source in scope.select(&source_sel) {
        let Some(srcset) = source.value().attr("srcset") else {
            continue;
        };
        let Some(first) = first_srcset_candidate(srcset) else {
            continue;
        };
        let Some(url) = resolve_candidate(first, base_url) else {
            continue;
        };
        if seen.insert(url.clone()) {
            refs.push(ImageReference {
                url,
                alt_text: None,
            });
        }
    }

    refs
}

/// Locate the element extraction should be scoped to.
fn find_scope<'a>(document: &'a Html, scope_selector: Option<&str>) -> Option<ElementRef<'a>> {
    if let Some(raw) = scope_selector {
        let sel = Selector::parse(raw).ok()?;
        let found = document.select(&sel).next();
        if found.is_some() {
            debug!("Scoped extraction to caller selector '{raw}'");
        }
        return found;
    }
    for raw in SCOPE_SELECTORS {
        let sel = Selector::parse(raw).expect("static selector");
        if let Some(el) = document.select(&sel).next() {
            debug!("Scoped extraction to '{raw}'");
            return Some(el);
        }
    }
    None
}

/// Resolve a raw src value to an absolute URL, dropping data URIs and
/// obvious lazy-load placeholders.
fn resolve_candidate(raw: &str, base_url: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") || raw.to_ascii_lowercase().contains("placeholder")
    {
        return None;
    }
    base_url.join(raw).ok().map(Into::into)
}

/// First URL in an HTML `srcset` attribute (`url width, url width, …`).
fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()?
        .split_whitespace()
        .next()
        .filter(|s| !s.is_empty())
}

// ── Static list source ───────────────────────────────────────────────────

/// A fixed, caller-supplied list of references.
///
/// Covers the one-shot scripts that enumerated arXiv figure URLs by hand, and
/// any external extraction tool that can emit a JSON array of
/// `{url, alt_text}` objects.
#[derive(Debug)]
pub struct StaticListSource {
    label: String,
    references: Vec<ImageReference>,
}

impl StaticListSource {
    pub fn new(label: impl Into<String>, references: Vec<ImageReference>) -> Self {
        Self {
            label: label.into(),
            references,
        }
    }

    /// Load a JSON array of references from a file.
    pub async fn from_json_file(path: &Path) -> Result<Self, HarvestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HarvestError::RefListFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let references: Vec<ImageReference> =
            serde_json::from_slice(&bytes).map_err(|e| HarvestError::RefListFailed {
                path: path.to_path_buf(),
                reason: format!("invalid JSON: {e}"),
            })?;
        Ok(Self::new(path.display().to_string(), references))
    }
}

impl ImageSource for StaticListSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn references(
        &self,
        _client: &reqwest::Client,
        _config: &HarvestConfig,
    ) -> Result<Vec<ImageReference>, HarvestError> {
        Ok(self.references.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://blog.example.com/posts/attention/").unwrap()
    }

    #[test]
    fn extracts_img_tags_with_alt_and_resolves_relative_urls() {
        let html = r#"
            <html><body><article>
                <img src="figs/plot.png" alt="Gradient Norm Plot">
                <img src="https://cdn.example.com/arch.webp" alt="">
            </article></body></html>
        "#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs[0].url,
            "https://blog.example.com/posts/attention/figs/plot.png"
        );
        assert_eq!(refs[0].alt_text.as_deref(), Some("Gradient Norm Plot"));
        assert_eq!(refs[1].url, "https://cdn.example.com/arch.webp");
        assert!(refs[1].alt_text.is_none(), "empty alt must become None");
    }

    #[test]
    fn prefers_src_but_falls_back_to_lazy_attrs() {
        let html = r#"<article>
            <img data-src="/lazy.png">
            <img data-lazy-src="/lazier.jpg">
        </article>"#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].url, "https://blog.example.com/lazy.png");
        assert_eq!(refs[1].url, "https://blog.example.com/lazier.jpg");
    }

    #[test]
    fn skips_data_uris_and_placeholders() {
        let html = r#"<article>
            <img src="data:image/gif;base64,R0lGOD">
            <img src="/static/placeholder.png">
            <img src="/real.png">
        </article>"#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 1);
        assert!(refs[0].url.ends_with("/real.png"));
    }

    #[test]
    fn picture_sources_contribute_first_srcset_candidate() {
        let html = r#"<article>
            <picture>
                <source srcset="/hero-small.webp 640w, /hero-large.webp 1280w">
                <img src="/hero.jpg" alt="Hero">
            </picture>
        </article>"#;
        let refs = extract_from_html(html, &base(), None);
        let urls: Vec<_> = refs.iter().map(|r| r.url.as_str()).collect();
        assert!(urls.contains(&"https://blog.example.com/hero.jpg"));
        assert!(urls.contains(&"https://blog.example.com/hero-small.webp"));
        assert!(!urls.iter().any(|u| u.contains("hero-large")));
    }

    #[test]
    fn duplicate_urls_are_collapsed() {
        let html = r#"<article>
            <img src="/same.png" alt="first">
            <img src="/same.png" alt="second">
        </article>"#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].alt_text.as_deref(), Some("first"));
    }

    #[test]
    fn extraction_is_scoped_to_article_body() {
        let html = r#"
            <body>
                <header><img src="/logo.png" alt="Site logo"></header>
                <article><img src="/figure.png" alt="Figure 1"></article>
                <footer><img src="/badge.png"></footer>
            </body>
        "#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 1);
        assert!(refs[0].url.ends_with("/figure.png"));
    }

    #[test]
    fn caller_selector_overrides_heuristics() {
        let html = r#"
            <article><img src="/wrong.png"></article>
            <div class="gallery"><img src="/right.png"></div>
        "#;
        let refs = extract_from_html(html, &base(), Some(".gallery"));
        assert_eq!(refs.len(), 1);
        assert!(refs[0].url.ends_with("/right.png"));
    }

    #[test]
    fn whole_document_used_when_no_scope_matches() {
        let html = r#"<div><img src="/only.png"></div>"#;
        let refs = extract_from_html(html, &base(), None);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn srcset_candidate_parsing() {
        assert_eq!(first_srcset_candidate("/a.png 640w, /b.png 1280w"), Some("/a.png"));
        assert_eq!(first_srcset_candidate("/a.png"), Some("/a.png"));
        assert_eq!(first_srcset_candidate("  "), None);
    }

    #[tokio::test]
    async fn static_list_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.json");
        std::fs::write(
            &path,
            r#"[{"url":"http://x/a.png","alt_text":"A"},{"url":"http://x/b.png"}]"#,
        )
        .unwrap();

        let source = StaticListSource::from_json_file(&path).await.unwrap();
        let client = reqwest::Client::new();
        let config = HarvestConfig::default();
        let refs = source.references(&client, &config).await.unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].alt_text.as_deref(), Some("A"));
        assert!(refs[1].alt_text.is_none());
    }

    #[tokio::test]
    async fn static_list_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.json");
        std::fs::write(&path, "not json").unwrap();
        let err = StaticListSource::from_json_file(&path).await.unwrap_err();
        assert!(matches!(err, HarvestError::RefListFailed { .. }));
    }
}
