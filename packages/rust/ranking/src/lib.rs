//! Internal link ranking.
//!
//! Suggests which existing site pages a source article should link to.
//! Two strategies share one interface: an embedding-backed semantic
//! ranker and an offline slug-similarity fallback. The strategy is
//! chosen once at startup by [`LinkRanker::probe`] and never changes
//! mid-run, so a batch is ranked consistently end to end.

use std::fmt;

use copydesk_shared::{EmbeddingsConfig, LinkSuggestion, Result, optional_api_key};
use tracing::{info, instrument, warn};

mod embedding;
mod lexical;
mod semantic;

pub use embedding::EmbeddingClient;
pub use lexical::LexicalRanker;
pub use semantic::SemanticRanker;

/// One short input, embedded at startup to prove the API is reachable
/// before any article work begins.
const PROBE_INPUT: &str = "connectivity check";

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Which ranking path a [`LinkRanker`] will take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankStrategy {
    Semantic,
    Lexical,
}

impl fmt::Display for RankStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic => write!(f, "semantic"),
            Self::Lexical => write!(f, "lexical"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// A ranking strategy fixed for the lifetime of a run.
pub enum LinkRanker {
    Semantic(SemanticRanker),
    Lexical(LexicalRanker),
}

impl LinkRanker {
    /// Pick the best strategy available right now. Semantic ranking is
    /// used only when it is enabled, configured with a key, and answers
    /// a probe request; anything less degrades to lexical with a warning
    /// rather than failing the run.
    #[instrument(skip_all)]
    pub async fn probe(config: &EmbeddingsConfig) -> Self {
        if !config.enabled {
            info!("semantic ranking disabled, using lexical strategy");
            return Self::lexical();
        }
        let Some(api_key) = optional_api_key(&config.api_key_env) else {
            info!(
                var = %config.api_key_env,
                "embeddings key not set, using lexical strategy"
            );
            return Self::lexical();
        };
        let client = match EmbeddingClient::new(config, api_key) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "embedding client unavailable, using lexical strategy");
                return Self::lexical();
            }
        };
        match client.embed(&[PROBE_INPUT.to_string()]).await {
            Ok(_) => {
                info!(model = %config.model, "semantic ranking available");
                Self::Semantic(SemanticRanker::new(client))
            }
            Err(e) => {
                warn!(error = %e, "embedding probe failed, using lexical strategy");
                Self::lexical()
            }
        }
    }

    pub fn lexical() -> Self {
        Self::Lexical(LexicalRanker)
    }

    pub fn semantic(client: EmbeddingClient) -> Self {
        Self::Semantic(SemanticRanker::new(client))
    }

    pub fn strategy(&self) -> RankStrategy {
        match self {
            Self::Semantic(_) => RankStrategy::Semantic,
            Self::Lexical(_) => RankStrategy::Lexical,
        }
    }

    /// Rank `candidates` against the source article and return at most `n`
    /// suggestions, best first. The source URL itself is never suggested,
    /// and an empty candidate list is an empty result, not an error.
    pub async fn rank(
        &self,
        source_url: &str,
        source_text: &str,
        candidates: &[String],
        n: usize,
    ) -> Result<Vec<LinkSuggestion>> {
        match self {
            Self::Semantic(ranker) => ranker.rank(source_url, source_text, candidates, n).await,
            Self::Lexical(ranker) => Ok(ranker.rank(source_url, candidates, n)),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Last path segment of a URL with hyphens as spaces: a cheap topic label
/// for both strategies.
pub(crate) fn slug_label(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .replace('-', " ")
}

/// Stable descending sort, so equal scores keep candidate input order.
pub(crate) fn sort_descending(suggestions: &mut [LinkSuggestion]) {
    suggestions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
