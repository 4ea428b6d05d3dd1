//! Article fetcher: one URL in, one [`SourceDocument`] out.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use url::Url;

use copydesk_shared::{CopydeskError, ImageRef, Result, SourceDocument};

/// User-Agent for article requests. Some publishers refuse requests that
/// identify as tools, so this mimics a desktop browser.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Containers tried in priority order when locating the article body.
const CONTENT_SELECTORS: [&str; 6] = [
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".content",
    "body",
];

/// Elements whose text never belongs to the readable body.
const EXCLUDED_TEXT_TAGS: [&str; 8] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static META_DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name=\"description\"]").expect("valid selector"));
static OG_DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property=\"og:description\"]").expect("valid selector"));
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3").expect("valid selector"));
static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));

// ---------------------------------------------------------------------------
// ArticleFetcher
// ---------------------------------------------------------------------------

/// HTTP fetcher producing normalized source documents.
pub struct ArticleFetcher {
    client: Client,
}

impl ArticleFetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CopydeskError::fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetch `url` and extract its content record.
    ///
    /// Network errors, non-success statuses and unreadable bodies all fail
    /// with a fetch error; this is the only stage whose failure fails the
    /// URL.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<SourceDocument> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CopydeskError::fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CopydeskError::fetch(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CopydeskError::fetch(format!("{url}: body read failed: {e}")))?;

        let content_hash = compute_hash(&body);
        let doc = parse_source(url.as_str(), &body);

        debug!(
            title = %doc.title,
            headings = doc.headings.len(),
            images = doc.images.len(),
            text_len = doc.text.len(),
            "article fetched"
        );

        Ok(SourceDocument {
            content_hash,
            ..doc
        })
    }
}

// ---------------------------------------------------------------------------
// HTML parsing
// ---------------------------------------------------------------------------

/// Parse fetched HTML into a source document (no hash; the caller adds it).
fn parse_source(url: &str, html: &str) -> SourceDocument {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .unwrap_or_default();

    let meta_description = meta_content(&doc, &META_DESC_SEL)
        .or_else(|| meta_content(&doc, &OG_DESC_SEL))
        .unwrap_or_default();

    let headings: Vec<String> = doc
        .select(&HEADING_SEL)
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|h| !h.is_empty())
        .collect();

    // Images without a src attribute carry nothing to lint; skip them.
    let images: Vec<ImageRef> = doc
        .select(&IMG_SEL)
        .filter_map(|el| {
            el.value().attr("src").map(|src| ImageRef {
                src: src.to_string(),
                alt: el.value().attr("alt").unwrap_or("").trim().to_string(),
            })
        })
        .collect();

    let text = extract_body_text(&doc);

    SourceDocument {
        url: url.to_string(),
        meta_title: title.clone(),
        title,
        meta_description,
        headings,
        images,
        text,
        content_hash: String::new(),
        fetched_at: Utc::now(),
    }
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Extract readable body text from the best available content container.
fn extract_body_text(doc: &Html) -> String {
    for sel_str in &CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                let mut parts: Vec<String> = Vec::new();
                collect_text(el, &mut parts);
                if !parts.is_empty() {
                    return parts.join(" ");
                }
            }
        }
    }

    String::new()
}

/// Walk an element's subtree collecting text, skipping page chrome.
fn collect_text(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(t) => {
                let normalized = normalize_ws(t);
                if !normalized.is_empty() {
                    out.push(normalized);
                }
            }
            scraper::Node::Element(e) => {
                if EXCLUDED_TEXT_TAGS.contains(&e.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Collapse all runs of whitespace to single spaces and trim.
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
