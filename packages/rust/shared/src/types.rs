//! Core domain types for the copydesk enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// An image reference found in the source page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRef {
    /// Image source attribute, as written in the page.
    pub src: String,
    /// Alt text; empty when the attribute is missing or blank.
    #[serde(default)]
    pub alt: String,
}

/// Normalized record of one fetched source page.
///
/// Produced once per URL by the fetcher and immutable afterwards. `text`
/// may be empty; downstream stages degrade on empty text, they never fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Original page URL.
    pub url: String,
    /// Page `<title>` text; empty when absent.
    #[serde(default)]
    pub title: String,
    /// Title as it should seed the rewrite (same as `title` at fetch time).
    #[serde(default)]
    pub meta_title: String,
    /// Meta description, with `og:description` as fallback source.
    #[serde(default)]
    pub meta_description: String,
    /// H2/H3 heading texts in document order.
    #[serde(default)]
    pub headings: Vec<String>,
    /// Images with their alt text, in document order.
    #[serde(default)]
    pub images: Vec<ImageRef>,
    /// Readable body text, whitespace-normalized.
    #[serde(default)]
    pub text: String,
    /// SHA-256 of the raw response body.
    #[serde(default)]
    pub content_hash: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// KeywordBundle
// ---------------------------------------------------------------------------

/// Ranked keywords and named entities extracted from body text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordBundle {
    /// Top-ranked keyword phrase; empty when no text was available.
    #[serde(default)]
    pub primary_keyword: String,
    /// Next-ranked phrases, excluding the primary.
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    /// Deduplicated entity names, stored sorted.
    #[serde(default)]
    pub entities: Vec<String>,
}

impl KeywordBundle {
    /// True when extraction produced nothing (e.g. empty source text).
    pub fn is_empty(&self) -> bool {
        self.primary_keyword.is_empty()
            && self.secondary_keywords.is_empty()
            && self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Research results
// ---------------------------------------------------------------------------

/// One organic competitor result from the search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorEntry {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
}

// ---------------------------------------------------------------------------
// LinkSuggestion
// ---------------------------------------------------------------------------

/// One ranked internal-link candidate.
///
/// `target_url` is never the source URL; a suggestion list is sorted
/// descending by `score` with ties in candidate input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSuggestion {
    /// Candidate page URL.
    pub target_url: String,
    /// Similarity to the source document. Cosine similarity in [-1, 1]
    /// for the semantic strategy, matching-blocks ratio in [0, 1] for
    /// the lexical fallback.
    pub score: f32,
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A question/answer pair in the drafted FAQ section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Faq {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub a: String,
}

/// An internal link placed by the draft generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalLink {
    #[serde(default)]
    pub anchor: String,
    #[serde(default)]
    pub url: String,
}

/// An external citation placed by the draft generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalLink {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Structured rewrite returned by the draft generator.
///
/// Every field is defaulted so a partially-valid JSON response still
/// parses; missing fields come back empty rather than failing the stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftDocument {
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    /// Proposed H2 outline, in order.
    #[serde(default)]
    pub h2s: Vec<String>,
    /// Markdown article body.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub internal_links: Vec<InternalLink>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
}

/// Draft generator output: structured, or raw text when the response
/// could not be parsed as JSON. Both variants are success for batch
/// continuation; raw drafts lint as all-empty fields.
///
/// Serialized untagged: structured drafts write their fields inline,
/// degraded drafts write `{"raw": "..."}`. `Raw` is declared first so
/// deserialization prefers it when a `raw` key is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Draft {
    /// Unparseable generator output, kept verbatim for review.
    Raw { raw: String },
    /// Parsed, structured draft.
    Structured(DraftDocument),
}

impl Draft {
    /// An empty degraded draft, used when generation itself failed.
    pub fn empty() -> Self {
        Self::Raw { raw: String::new() }
    }

    /// The structured document, when this draft parsed.
    pub fn as_structured(&self) -> Option<&DraftDocument> {
        match self {
            Self::Structured(doc) => Some(doc),
            Self::Raw { .. } => None,
        }
    }

    /// True for the degraded `{raw}` form.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// LintResult
// ---------------------------------------------------------------------------

/// Objective quality metrics over the draft and source document.
///
/// A pure function of its inputs; degraded drafts contribute empty
/// strings, so their lengths lint as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResult {
    /// Character count of the draft meta title.
    pub title_length: usize,
    /// Character count of the draft meta description.
    pub description_length: usize,
    /// Source images whose alt text is empty or absent.
    pub missing_image_alt_count: usize,
}

// ---------------------------------------------------------------------------
// Stage & StageWarning
// ---------------------------------------------------------------------------

/// Pipeline stage names, used for progress reporting and for attributing
/// recorded warnings and per-URL failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Extracting,
    Researching,
    Ranking,
    Drafting,
    Validating,
    Exporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Researching => "researching",
            Self::Ranking => "ranking",
            Self::Drafting => "drafting",
            Self::Validating => "validating",
            Self::Exporting => "exporting",
        };
        f.write_str(name)
    }
}

/// A non-fatal degradation recorded against a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWarning {
    /// Stage that degraded.
    pub stage: Stage,
    /// Human-readable cause.
    pub message: String,
}

// ---------------------------------------------------------------------------
// ContentPackage
// ---------------------------------------------------------------------------

/// The unit of output: everything gathered for one source URL.
///
/// Owned by exactly one pipeline run of one URL; never shared or mutated
/// after that URL finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPackage {
    /// Fetched and normalized source page.
    pub source: SourceDocument,
    /// Extracted keywords and entities.
    pub keywords: KeywordBundle,
    /// Organic competitor pages for the primary keyword.
    #[serde(default)]
    pub competitors: Vec<CompetitorEntry>,
    /// Real user questions seeding the FAQ section.
    #[serde(default)]
    pub faqs_seed: Vec<String>,
    /// Ranked internal-link candidates.
    #[serde(default)]
    pub internal_suggestions: Vec<LinkSuggestion>,
    /// Generated rewrite (structured or raw).
    pub draft: Draft,
    /// Quality metrics over draft and source.
    pub lint: LintResult,
    /// Non-fatal degradations recorded while building this package.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StageWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> SourceDocument {
        SourceDocument {
            url: "https://example.com/blog/sleep-hygiene".into(),
            title: "Sleep Hygiene Basics".into(),
            meta_title: "Sleep Hygiene Basics".into(),
            meta_description: "A short guide to sleep hygiene.".into(),
            headings: vec!["Why sleep matters".into(), "Evening routines".into()],
            images: vec![
                ImageRef {
                    src: "/img/bed.png".into(),
                    alt: "A bed".into(),
                },
                ImageRef {
                    src: "/img/clock.png".into(),
                    alt: String::new(),
                },
            ],
            text: "Sleep hygiene is the set of habits that support good sleep.".into(),
            content_hash: "abc123".into(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn draft_serializes_untagged() {
        let raw = Draft::Raw {
            raw: "not json".into(),
        };
        let json = serde_json::to_value(&raw).expect("serialize raw");
        assert_eq!(json["raw"], "not json");

        let structured = Draft::Structured(DraftDocument {
            meta_title: "A title".into(),
            ..Default::default()
        });
        let json = serde_json::to_value(&structured).expect("serialize structured");
        assert_eq!(json["meta_title"], "A title");
        assert!(json.get("raw").is_none());
    }

    #[test]
    fn draft_deserializes_both_forms() {
        let raw: Draft = serde_json::from_str(r#"{"raw": "plain prose"}"#).expect("raw form");
        assert!(raw.is_degraded());

        let structured: Draft =
            serde_json::from_str(r#"{"meta_title": "T", "h2s": ["One"]}"#).expect("structured");
        let doc = structured.as_structured().expect("structured variant");
        assert_eq!(doc.meta_title, "T");
        assert_eq!(doc.h2s, vec!["One"]);
        assert!(doc.body.is_empty());
    }

    #[test]
    fn package_serialization_roundtrip() {
        let package = ContentPackage {
            source: sample_source(),
            keywords: KeywordBundle {
                primary_keyword: "sleep hygiene".into(),
                secondary_keywords: vec!["evening routine".into()],
                entities: vec!["National Sleep Foundation".into()],
            },
            competitors: vec![CompetitorEntry {
                title: "10 Sleep Tips".into(),
                url: "https://rival.com/sleep-tips".into(),
            }],
            faqs_seed: vec!["How much sleep do adults need?".into()],
            internal_suggestions: vec![LinkSuggestion {
                target_url: "https://example.com/blog/insomnia".into(),
                score: 0.42,
            }],
            draft: Draft::Structured(DraftDocument::default()),
            lint: LintResult::default(),
            warnings: vec![StageWarning {
                stage: Stage::Researching,
                message: "search provider timed out".into(),
            }],
        };

        let json = serde_json::to_string_pretty(&package).expect("serialize");
        let parsed: ContentPackage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.source.url, package.source.url);
        assert_eq!(parsed.keywords.primary_keyword, "sleep hygiene");
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].stage, Stage::Researching);
    }

    #[test]
    fn empty_warnings_are_omitted() {
        let package = ContentPackage {
            source: sample_source(),
            keywords: KeywordBundle::default(),
            competitors: vec![],
            faqs_seed: vec![],
            internal_suggestions: vec![],
            draft: Draft::empty(),
            lint: LintResult::default(),
            warnings: vec![],
        };

        let json = serde_json::to_string(&package).expect("serialize");
        assert!(!json.contains("\"warnings\""));
    }

    #[test]
    fn package_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/package.fixture.json")
            .expect("read fixture");
        let parsed: ContentPackage =
            serde_json::from_str(&fixture).expect("deserialize fixture package");
        assert_eq!(parsed.keywords.primary_keyword, "therapy notes");
        assert_eq!(parsed.internal_suggestions.len(), 2);
        assert!(!parsed.draft.is_degraded());
    }
}
