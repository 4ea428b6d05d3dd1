//! Slug-similarity fallback ranking.
//!
//! Works entirely offline: each candidate URL is reduced to its slug label
//! and compared against the source slug with a matching-blocks similarity
//! ratio. Scores land in `[0, 1]` like the semantic strategy, so callers
//! can treat both interchangeably.

use std::collections::HashMap;

use copydesk_shared::LinkSuggestion;

use crate::{slug_label, sort_descending};

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// Ranks candidates by slug similarity alone. Never fails and never
/// performs I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
    /// Score every candidate (except the source itself) against the source
    /// slug and return the top `n`, best first. Ties keep candidate input
    /// order.
    pub fn rank(&self, source_url: &str, candidates: &[String], n: usize) -> Vec<LinkSuggestion> {
        let source_label = slug_label(source_url);
        let mut suggestions: Vec<LinkSuggestion> = candidates
            .iter()
            .filter(|candidate| candidate.as_str() != source_url)
            .map(|candidate| LinkSuggestion {
                target_url: candidate.clone(),
                score: similarity_ratio(&source_label, &slug_label(candidate)),
            })
            .collect();
        sort_descending(&mut suggestions);
        suggestions.truncate(n);
        suggestions
    }
}

// ---------------------------------------------------------------------------
// Matching-blocks similarity
// ---------------------------------------------------------------------------

/// Similarity of two strings as `2 * M / (len(a) + len(b))`, where `M` is
/// the total size of the matching blocks found by recursively splitting
/// around the longest common substring. Two empty strings are identical.
pub(crate) fn similarity_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_total(&a, &b, 0, a.len(), 0, b.len());
    (2 * matched) as f32 / total as f32
}

fn matching_total(a: &[char], b: &[char], a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> usize {
    let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
    if size == 0 {
        return 0;
    }
    size + matching_total(a, b, a_lo, i, b_lo, j)
        + matching_total(a, b, i + size, a_hi, j + size, b_hi)
}

/// Longest common substring of `a[a_lo..a_hi]` and `b[b_lo..b_hi]`.
/// On ties the earliest block in `a`, then in `b`, wins, which keeps the
/// decomposition deterministic.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let mut best_i = a_lo;
    let mut best_j = b_lo;
    let mut best_size = 0usize;
    // j2len[j] = length of the common run ending at a[i], b[j].
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in a_lo..a_hi {
        let mut next: HashMap<usize, usize> = HashMap::new();
        for j in b_lo..b_hi {
            if a[i] == b[j] {
                let run = 1 + j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0);
                next.insert(j, run);
                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_size)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
