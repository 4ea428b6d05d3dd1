//! Sitemap-backed site index: the internal-link candidate source.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::{info, instrument, warn};

use copydesk_shared::{CopydeskError, Result};

/// User-Agent for sitemap requests.
const USER_AGENT: &str = concat!("copydesk/", env!("CARGO_PKG_VERSION"));

/// Sitemap fetch timeout.
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(20);

static LOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("valid regex"));

/// Fetch `{base}/sitemap.xml` and return the URLs containing `section_filter`.
///
/// Best-effort: any failure logs a warning and returns an empty list, which
/// the ranking engine treats as a valid zero-candidate input. Sitemap order
/// is preserved; it is the tie-break order for equal ranking scores.
#[instrument(skip_all, fields(base_url = %base_url))]
pub async fn site_index(base_url: &str, section_filter: &str) -> Vec<String> {
    match fetch_sitemap(base_url).await {
        Ok(xml) => {
            let urls = extract_loc_urls(&xml, section_filter);
            info!(candidates = urls.len(), "site index built");
            urls
        }
        Err(e) => {
            warn!(error = %e, "sitemap fetch failed, candidate list is empty");
            Vec::new()
        }
    }
}

async fn fetch_sitemap(base_url: &str) -> Result<String> {
    let sitemap_url = format!("{}/sitemap.xml", base_url.trim_end_matches('/'));

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(SITEMAP_TIMEOUT)
        .build()
        .map_err(|e| CopydeskError::fetch(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(&sitemap_url)
        .send()
        .await
        .map_err(|e| CopydeskError::fetch(format!("{sitemap_url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CopydeskError::fetch(format!("{sitemap_url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| CopydeskError::fetch(format!("{sitemap_url}: body read failed: {e}")))
}

/// Pull `<loc>` URLs out of sitemap XML, keeping those that contain
/// `section_filter` (an empty filter keeps everything).
fn extract_loc_urls(xml: &str, section_filter: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|u| section_filter.is_empty() || u.contains(section_filter))
        .collect()
}
