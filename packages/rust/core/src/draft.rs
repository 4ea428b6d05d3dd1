//! Draft generation via an OpenAI-compatible chat completions API.
//!
//! The model is asked for strict JSON matching [`DraftDocument`]. Models
//! drift, so the reply is parsed leniently: the substring between the
//! first `{` and the last `}` is tried first, and anything unparseable is
//! kept verbatim as a degraded `{raw}` draft rather than discarded.

use std::time::Duration;

use copydesk_shared::{
    CompetitorEntry, CopydeskError, Draft, DraftConfig, DraftDocument, KeywordBundle,
    LinkSuggestion, Result, SourceDocument,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

const DRAFT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str =
    "You are an SEO editor. Use clear, neutral, factual language. Respond with strict JSON only.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client that turns an enrichment pack into a draft.
#[derive(Debug, Clone)]
pub struct DraftClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl DraftClient {
    pub fn new(config: &DraftConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DRAFT_TIMEOUT)
            .build()
            .map_err(|e| CopydeskError::draft(format!("failed to build draft client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Generate a draft for the assembled pack. Transport and API errors
    /// are returned as draft errors; a reply that merely fails to parse as
    /// JSON is still `Ok`, degraded to [`Draft::Raw`].
    #[instrument(skip_all, fields(url = %source.url, model = %self.model))]
    pub async fn generate(
        &self,
        source: &SourceDocument,
        keywords: &KeywordBundle,
        competitors: &[CompetitorEntry],
        questions: &[String],
        suggestions: &[LinkSuggestion],
    ) -> Result<Draft> {
        let url = format!("{}/chat/completions", self.base_url);
        let user_prompt = build_user_prompt(source, keywords, competitors, questions, suggestions);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CopydeskError::draft(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CopydeskError::draft(format!(
                "chat API returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CopydeskError::draft(format!("invalid chat response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CopydeskError::draft("chat response contained no choices"))?;

        let draft = parse_draft(&content);
        if draft.is_degraded() {
            warn!(url = %source.url, "draft reply was not valid JSON, keeping raw text");
        }
        Ok(draft)
    }
}

// ---------------------------------------------------------------------------
// Prompt assembly & parsing
// ---------------------------------------------------------------------------

fn build_user_prompt(
    source: &SourceDocument,
    keywords: &KeywordBundle,
    competitors: &[CompetitorEntry],
    questions: &[String],
    suggestions: &[LinkSuggestion],
) -> String {
    let headings: Vec<&str> = source
        .headings
        .iter()
        .take(10)
        .map(String::as_str)
        .collect();
    let entities: Vec<&str> = keywords
        .entities
        .iter()
        .take(20)
        .map(String::as_str)
        .collect();
    let competitor_urls: Vec<&str> = competitors.iter().map(|c| c.url.as_str()).collect();
    let candidate_urls: Vec<&str> = suggestions
        .iter()
        .map(|s| s.target_url.as_str())
        .collect();

    format!(
        "Topic URL: {url}\n\
         Title: {title}\n\
         Current H2s: {headings:?}\n\
         Primary keyword: {primary}\n\
         Secondary keywords: {secondary:?}\n\
         Entities: {entities:?}\n\
         Competitors: {competitor_urls:?}\n\
         Forum questions: {questions:?}\n\
         Internal link candidates: {candidate_urls:?}\n\
         \n\
         Write an optimized draft:\n\
         - Meta Title (<=60 chars), Meta Description (<=155 chars)\n\
         - H2 outline covering definitions, key components, practical context, best practices.\n\
         - 700-900 words body.\n\
         - Inline suggestions for internal links as: [INTERNAL: anchor -> URL] (2-4)\n\
         - 3-5 reputable external citations listed as: [EXTERNAL: Title -> URL]\n\
         - 5 FAQs with 2-4 sentence answers.\n\
         \n\
         Return strict JSON with keys:\n\
         meta_title, meta_description, h2s (array of strings), body,\n\
         faqs (array of {{q, a}}), internal_links (array of {{anchor, url}}),\n\
         external_links (array of {{title, url}}).",
        url = source.url,
        title = source.title,
        primary = keywords.primary_keyword,
        secondary = keywords.secondary_keywords,
    )
}

/// Extract a draft from the model reply: the span from the first `{` to
/// the last `}` parsed as JSON, otherwise the whole reply kept raw.
fn parse_draft(content: &str) -> Draft {
    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Ok(doc) = serde_json::from_str::<DraftDocument>(&content[start..=end]) {
                return Draft::Structured(doc);
            }
        }
    }
    Draft::Raw {
        raw: content.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_source() -> SourceDocument {
        SourceDocument {
            url: "https://site.test/blog/therapy-notes".to_string(),
            title: "Therapy Notes 101".to_string(),
            headings: vec!["What are notes".to_string(), "Formats".to_string()],
            ..SourceDocument::default()
        }
    }

    fn sample_keywords() -> KeywordBundle {
        KeywordBundle {
            primary_keyword: "therapy notes".to_string(),
            secondary_keywords: vec!["progress note".to_string()],
            entities: vec!["World Health Organization".to_string()],
        }
    }

    #[test]
    fn prompt_includes_pack_fields() {
        let competitors = vec![CompetitorEntry {
            title: "Rival post".to_string(),
            url: "https://rival.test/notes".to_string(),
        }];
        let questions = vec!["How long should a note be?".to_string()];
        let suggestions = vec![LinkSuggestion {
            target_url: "https://site.test/blog/soap-notes".to_string(),
            score: 0.9,
        }];

        let prompt = build_user_prompt(
            &sample_source(),
            &sample_keywords(),
            &competitors,
            &questions,
            &suggestions,
        );

        assert!(prompt.contains("Topic URL: https://site.test/blog/therapy-notes"));
        assert!(prompt.contains("Title: Therapy Notes 101"));
        assert!(prompt.contains("Primary keyword: therapy notes"));
        assert!(prompt.contains("progress note"));
        assert!(prompt.contains("World Health Organization"));
        assert!(prompt.contains("https://rival.test/notes"));
        assert!(prompt.contains("How long should a note be?"));
        assert!(prompt.contains("https://site.test/blog/soap-notes"));
        assert!(prompt.contains("meta_title, meta_description"));
    }

    #[test]
    fn prompt_caps_headings_and_entities() {
        let mut source = sample_source();
        source.headings = (0..15).map(|i| format!("heading-{i}")).collect();
        let mut keywords = sample_keywords();
        keywords.entities = (0..30).map(|i| format!("Entity{i}")).collect();

        let prompt = build_user_prompt(&source, &keywords, &[], &[], &[]);

        assert!(prompt.contains("heading-9"));
        assert!(!prompt.contains("heading-10"));
        assert!(prompt.contains("Entity19"));
        assert!(!prompt.contains("Entity20"));
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let content = r#"Sure! Here is the draft:
{"meta_title": "Notes", "meta_description": "About notes.", "h2s": ["One"], "body": "Text."}
Hope that helps."#;

        let draft = parse_draft(content);
        let doc = draft.as_structured().unwrap();
        assert_eq!(doc.meta_title, "Notes");
        assert_eq!(doc.h2s, vec!["One".to_string()]);
    }

    #[test]
    fn parses_fenced_json_block() {
        let content = "```json\n{\"meta_title\": \"Fenced\", \"body\": \"B\"}\n```";
        let draft = parse_draft(content);
        assert_eq!(draft.as_structured().unwrap().meta_title, "Fenced");
    }

    #[test]
    fn non_json_reply_degrades_to_raw() {
        let content = "I could not produce a draft for this page.";
        match parse_draft(content) {
            Draft::Raw { raw } => assert_eq!(raw, content),
            Draft::Structured(_) => panic!("expected a raw draft"),
        }
    }

    #[test]
    fn broken_json_keeps_full_reply() {
        let content = "prefix {\"meta_title\": \"Oops\" suffix";
        match parse_draft(content) {
            Draft::Raw { raw } => assert_eq!(raw, content),
            Draft::Structured(_) => panic!("expected a raw draft"),
        }
    }

    #[tokio::test]
    async fn generate_returns_structured_draft() {
        let server = MockServer::start().await;
        let reply = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "{\"meta_title\": \"Generated\", \"meta_description\": \"Desc\", \"h2s\": [], \"body\": \"Body.\"}"
                }
            }]
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4.1-mini",
                "temperature": 0.2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .mount(&server)
            .await;

        let config = DraftConfig {
            base_url: server.uri(),
            ..DraftConfig::default()
        };
        let client = DraftClient::new(&config, "test-key".to_string()).unwrap();
        let draft = client
            .generate(&sample_source(), &sample_keywords(), &[], &[], &[])
            .await
            .unwrap();

        assert_eq!(draft.as_structured().unwrap().meta_title, "Generated");
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let config = DraftConfig {
            base_url: server.uri(),
            ..DraftConfig::default()
        };
        let client = DraftClient::new(&config, "test-key".to_string()).unwrap();
        let err = client
            .generate(&sample_source(), &sample_keywords(), &[], &[], &[])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn generate_with_non_json_reply_is_ok_but_raw() {
        let server = MockServer::start().await;
        let reply = serde_json::json!({
            "choices": [{ "message": { "content": "no json here" } }]
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .mount(&server)
            .await;

        let config = DraftConfig {
            base_url: server.uri(),
            ..DraftConfig::default()
        };
        let client = DraftClient::new(&config, "test-key".to_string()).unwrap();
        let draft = client
            .generate(&sample_source(), &sample_keywords(), &[], &[], &[])
            .await
            .unwrap();

        assert!(draft.is_degraded());
    }
}
