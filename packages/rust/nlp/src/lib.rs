//! Keyword and entity extraction for copydesk.
//!
//! A deliberately model-free extractor: keyword phrases come from RAKE-style
//! co-occurrence scoring over stopword-delimited word runs, entities from a
//! capitalized-sequence scan. Extraction never fails the caller; empty or
//! unusable text yields an empty [`KeywordBundle`].

mod stopwords;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use copydesk_shared::KeywordBundle;

use crate::stopwords::STOPWORDS;

/// Characters analyzed per document; everything beyond is ignored to keep
/// extraction cost bounded on very large pages.
const ANALYSIS_WINDOW: usize = 200_000;

/// Longest keyword phrase, in words.
const MAX_PHRASE_WORDS: usize = 3;

/// Secondary keywords kept after the primary.
const SECONDARY_CAP: usize = 11;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9'-]*").expect("valid regex"));

static SENTENCE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;:\n\r]+").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)+").expect("valid regex"));

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

// ---------------------------------------------------------------------------
// KeywordExtractor
// ---------------------------------------------------------------------------

/// Ranked keyword-phrase and entity extractor.
pub struct KeywordExtractor {
    top_k: usize,
}

impl KeywordExtractor {
    /// Create an extractor keeping the top `top_k` phrases.
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Extract a keyword bundle from body text. Infallible; empty text
    /// yields an empty bundle.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub fn extract(&self, text: &str) -> KeywordBundle {
        let window = truncate_chars(text, ANALYSIS_WINDOW);
        if window.trim().is_empty() {
            return KeywordBundle::default();
        }

        let ranked = rank_phrases(window, self.top_k);
        let primary_keyword = ranked.first().cloned().unwrap_or_default();
        let secondary_keywords: Vec<String> =
            ranked.iter().skip(1).take(SECONDARY_CAP).cloned().collect();

        let entities = extract_entities(window);

        debug!(
            primary = %primary_keyword,
            secondary = secondary_keywords.len(),
            entities = entities.len(),
            "keywords extracted"
        );

        KeywordBundle {
            primary_keyword,
            secondary_keywords,
            entities,
        }
    }
}

// ---------------------------------------------------------------------------
// Phrase ranking (RAKE-style)
// ---------------------------------------------------------------------------

/// Rank candidate phrases by co-occurrence score, best first.
///
/// Word score is `degree / frequency` over all candidate phrases; a phrase
/// scores the sum of its word scores. Ties keep first-occurrence order so
/// ranking is deterministic for identical input.
fn rank_phrases(text: &str, top_k: usize) -> Vec<String> {
    let phrases = candidate_phrases(text);
    if phrases.is_empty() {
        return Vec::new();
    }

    let mut freq: HashMap<&str, f64> = HashMap::new();
    let mut degree: HashMap<&str, f64> = HashMap::new();
    for phrase in &phrases {
        for word in phrase {
            *freq.entry(word.as_str()).or_default() += 1.0;
            *degree.entry(word.as_str()).or_default() += phrase.len() as f64;
        }
    }

    // Score unique phrases, keeping the first occurrence position of each.
    let mut seen: HashSet<String> = HashSet::new();
    let mut scored: Vec<(String, f64)> = Vec::new();
    for phrase in &phrases {
        let joined = phrase.join(" ");
        if !seen.insert(joined.clone()) {
            continue;
        }
        let score: f64 = phrase
            .iter()
            .map(|w| degree.get(w.as_str()).copied().unwrap_or(0.0)
                / freq.get(w.as_str()).copied().unwrap_or(1.0))
            .sum();
        scored.push((joined, score));
    }

    // Stable sort: equal scores stay in first-occurrence order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_k).map(|(p, _)| p).collect()
}

/// Split text into candidate phrases: maximal stopword-free word runs per
/// sentence, chunked to at most [`MAX_PHRASE_WORDS`] words.
fn candidate_phrases(text: &str) -> Vec<Vec<String>> {
    let mut phrases: Vec<Vec<String>> = Vec::new();

    for sentence in SENTENCE_SPLIT_RE.split(text) {
        let mut run: Vec<String> = Vec::new();
        for m in WORD_RE.find_iter(sentence) {
            let word = m.as_str().to_lowercase();
            if word.len() < 2 || STOPWORD_SET.contains(word.as_str()) {
                flush_run(&mut run, &mut phrases);
            } else {
                run.push(word);
            }
        }
        flush_run(&mut run, &mut phrases);
    }

    phrases
}

fn flush_run(run: &mut Vec<String>, phrases: &mut Vec<Vec<String>>) {
    if run.is_empty() {
        return;
    }
    for chunk in run.chunks(MAX_PHRASE_WORDS) {
        phrases.push(chunk.to_vec());
    }
    run.clear();
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Collect capitalized multi-word sequences, deduplicated and sorted.
fn extract_entities(text: &str) -> Vec<String> {
    let set: BTreeSet<String> = ENTITY_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    set.into_iter().collect()
}

/// Truncate at a char boundary, counting chars rather than bytes.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
