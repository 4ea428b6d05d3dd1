//! Draft quality lint.

use copydesk_shared::{Draft, LintResult, SourceDocument};

/// Lint a generated draft against its source document.
///
/// Pure function, total over its inputs: a degraded `{raw}` draft simply
/// lints as empty meta fields. Lengths are counted in characters, matching
/// what an editor sees in a SERP preview, not in bytes.
pub fn lint(source: &SourceDocument, draft: &Draft) -> LintResult {
    let (title_length, description_length) = match draft.as_structured() {
        Some(doc) => (
            doc.meta_title.chars().count(),
            doc.meta_description.chars().count(),
        ),
        None => (0, 0),
    };

    let missing_image_alt_count = source
        .images
        .iter()
        .filter(|image| image.alt.trim().is_empty())
        .count();

    LintResult {
        title_length,
        description_length,
        missing_image_alt_count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
