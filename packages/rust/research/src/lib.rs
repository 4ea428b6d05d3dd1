//! Competitive research client for copydesk.
//!
//! Talks to a Serper-compatible search API for two things: organic
//! competitor pages for a keyword, and forum-style user questions from
//! reddit/quora site queries. Failures here are absorbed by the pipeline
//! as degraded (empty) research, never as a per-URL failure.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use copydesk_shared::{CompetitorEntry, CopydeskError, Result, SearchConfig};

/// Search request timeout.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Results requested for a forum-question query before filtering.
const QUESTION_FETCH_COUNT: usize = 12;

/// Extra results requested beyond the competitor cap, to survive
/// own-domain exclusion and link-less entries.
const COMPETITOR_OVERFETCH: usize = 3;

/// Quoted extra terms appended to a forum-question query at most.
const MAX_EXTRA_TERMS: usize = 3;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
    gl: &'a str,
    hl: &'a str,
}

/// Organic results from the search provider.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
}

/// One organic search hit.
#[derive(Debug, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
}

// ---------------------------------------------------------------------------
// ResearchClient
// ---------------------------------------------------------------------------

/// Serper-compatible search client.
pub struct ResearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    gl: String,
    hl: String,
}

impl ResearchClient {
    /// Create a client from config and a resolved API key.
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| CopydeskError::research(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            gl: config.gl.clone(),
            hl: config.hl.clone(),
        })
    }

    /// Run one localized search and return its organic results.
    #[instrument(skip_all, fields(num = num))]
    pub async fn search(&self, query: &str, num: usize) -> Result<SearchResponse> {
        let url = format!("{}/search", self.base_url);
        let request = SearchRequest {
            q: query,
            num,
            gl: &self.gl,
            hl: &self.hl,
        };

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CopydeskError::research(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CopydeskError::research(format!(
                "search API HTTP {status}: {body}"
            )));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| CopydeskError::research(format!("search response parse failed: {e}")))
    }

    /// Top organic competitor pages for a query, excluding the caller's own
    /// domain. Over-fetches slightly so exclusions don't starve the list.
    #[instrument(skip_all, fields(num = num))]
    pub async fn top_competitors(
        &self,
        query: &str,
        exclude_domain: &str,
        num: usize,
    ) -> Result<Vec<CompetitorEntry>> {
        let response = self.search(query, num + COMPETITOR_OVERFETCH).await?;

        let mut out = Vec::new();
        for item in response.organic {
            if item.link.is_empty() {
                continue;
            }
            if !exclude_domain.is_empty() && item.link.contains(exclude_domain) {
                continue;
            }
            out.push(CompetitorEntry {
                title: item.title,
                url: item.link,
            });
            if out.len() >= num {
                break;
            }
        }

        debug!(competitors = out.len(), "competitor search complete");
        Ok(out)
    }

    /// Real user questions around the primary keyword, scraped from forum
    /// site results. Keeps question-shaped titles only, deduplicated
    /// case-insensitively, capped at `num`.
    #[instrument(skip_all, fields(num = num))]
    pub async fn forum_questions(
        &self,
        primary_keyword: &str,
        extra_terms: &[String],
        num: usize,
    ) -> Result<Vec<String>> {
        let query = build_question_query(primary_keyword, extra_terms);
        let response = self.search(&query, QUESTION_FETCH_COUNT).await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut questions = Vec::new();
        for item in response.organic {
            let Some(question) = clean_question(&item.title) else {
                continue;
            };
            if !seen.insert(question.to_lowercase()) {
                continue;
            }
            questions.push(question);
            if questions.len() >= num {
                break;
            }
        }

        debug!(questions = questions.len(), "forum question search complete");
        Ok(questions)
    }
}

// ---------------------------------------------------------------------------
// Query & title shaping
// ---------------------------------------------------------------------------

/// Build the forum-question query: reddit/quora site filter, quoted primary
/// keyword, and up to three quoted extra terms.
fn build_question_query(primary_keyword: &str, extra_terms: &[String]) -> String {
    let mut query = format!(r#"site:reddit.com OR site:quora.com "{primary_keyword}" "?""#);
    for term in extra_terms.iter().take(MAX_EXTRA_TERMS) {
        query.push_str(&format!(r#" "{term}""#));
    }
    query
}

/// Normalize a result title into a usable question, or reject it.
///
/// Keeps titles that contain a question mark and land between 10 and 140
/// characters after separator trim; forum titles often end in ` » forum`
/// or `| Site` tails.
fn clean_question(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c| c == ' ' || c == '»' || c == '|');
    if !trimmed.contains('?') {
        return None;
    }
    let len = trimmed.chars().count();
    if len <= 10 || len >= 140 {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ResearchClient {
        let config = SearchConfig {
            api_key_env: "UNUSED".into(),
            base_url: base_url.into(),
            gl: "us".into(),
            hl: "en".into(),
        };
        ResearchClient::new(&config, "test-key".into()).unwrap()
    }

    #[test]
    fn question_query_quotes_terms() {
        let query = build_question_query(
            "therapy notes",
            &["soap notes".into(), "dap".into(), "x".into(), "dropped".into()],
        );
        assert!(query.starts_with("site:reddit.com OR site:quora.com \"therapy notes\" \"?\""));
        assert!(query.contains("\"soap notes\""));
        assert!(query.contains("\"x\""));
        assert!(!query.contains("dropped"));
    }

    #[test]
    fn clean_question_filters_shapes() {
        assert_eq!(
            clean_question(" How long should a note be? »"),
            Some("How long should a note be?".into())
        );
        assert_eq!(clean_question("No question here at all"), None);
        assert_eq!(clean_question("Short?"), None);
        let long = format!("{}?", "x".repeat(150));
        assert_eq!(clean_question(&long), None);
    }

    #[tokio::test]
    async fn competitors_filter_and_cap() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "test-key"))
            .and(body_partial_json(json!({"gl": "us", "hl": "en", "num": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "Own post", "link": "https://mysite.com/blog/own"},
                    {"title": "No link at all"},
                    {"title": "Rival one", "link": "https://rival.com/one"},
                    {"title": "Rival two", "link": "https://rival.com/two"},
                    {"title": "Rival three", "link": "https://rival.com/three"},
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let competitors = client
            .top_competitors("therapy notes", "mysite.com", 2)
            .await
            .unwrap();

        assert_eq!(competitors.len(), 2);
        assert_eq!(competitors[0].title, "Rival one");
        assert_eq!(competitors[1].url, "https://rival.com/two");
    }

    #[tokio::test]
    async fn questions_dedupe_and_trim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"num": 12})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "How do I write faster notes? »", "link": "https://reddit.com/1"},
                    {"title": "HOW DO I WRITE FASTER NOTES?", "link": "https://reddit.com/2"},
                    {"title": "Not a question title", "link": "https://reddit.com/3"},
                    {"title": "Why?", "link": "https://reddit.com/4"},
                    {"title": "| Are templates worth using every day?", "link": "https://quora.com/5"},
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let questions = client
            .forum_questions("notes", &[], 5)
            .await
            .unwrap();

        assert_eq!(
            questions,
            vec![
                "How do I write faster notes?".to_string(),
                "Are templates worth using every day?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn api_error_surfaces_as_research_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.search("anything", 5).await.unwrap_err();

        assert!(matches!(err, CopydeskError::Research(_)));
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn missing_organic_field_parses_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.search("anything", 5).await.unwrap();
        assert!(response.organic.is_empty());
    }
}
