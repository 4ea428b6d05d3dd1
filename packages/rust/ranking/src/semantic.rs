//! Embedding-based ranking.

use copydesk_shared::{LinkSuggestion, Result};
use tracing::instrument;

use crate::embedding::EmbeddingClient;
use crate::{slug_label, sort_descending};

/// How much of the source body text is worth embedding. Articles carry
/// their topic in the opening stretch; the tail mostly adds cost.
const SOURCE_TEXT_PREFIX: usize = 5_000;

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// Ranks candidates by cosine similarity between the source text and each
/// candidate's slug label, all embedded in a single batched request.
#[derive(Debug, Clone)]
pub struct SemanticRanker {
    embeddings: EmbeddingClient,
}

impl SemanticRanker {
    pub fn new(embeddings: EmbeddingClient) -> Self {
        Self { embeddings }
    }

    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn rank(
        &self,
        source_url: &str,
        source_text: &str,
        candidates: &[String],
        n: usize,
    ) -> Result<Vec<LinkSuggestion>> {
        let eligible: Vec<&String> = candidates
            .iter()
            .filter(|candidate| candidate.as_str() != source_url)
            .collect();
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        // The embeddings API rejects empty inputs, so a source with no
        // extractable body text falls back to its own slug label.
        let prefix = truncate_chars(source_text, SOURCE_TEXT_PREFIX);
        let source_input = if prefix.trim().is_empty() {
            slug_label(source_url)
        } else {
            prefix.to_string()
        };

        let mut inputs = Vec::with_capacity(eligible.len() + 1);
        inputs.push(source_input);
        inputs.extend(eligible.iter().map(|candidate| slug_label(candidate)));

        let vectors = self.embeddings.embed(&inputs).await?;
        let (source_vector, candidate_vectors) = match vectors.split_first() {
            Some(split) => split,
            None => return Ok(Vec::new()),
        };

        let mut suggestions: Vec<LinkSuggestion> = eligible
            .iter()
            .zip(candidate_vectors)
            .map(|(candidate, vector)| LinkSuggestion {
                target_url: (*candidate).clone(),
                score: cosine_similarity(source_vector, vector),
            })
            .collect();
        sort_descending(&mut suggestions);
        suggestions.truncate(n);
        Ok(suggestions)
    }
}

// ---------------------------------------------------------------------------
// Vector math
// ---------------------------------------------------------------------------

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
