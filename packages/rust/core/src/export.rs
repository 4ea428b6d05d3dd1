//! Output artifacts.
//!
//! Each completed URL yields two slug-named files in the run output
//! directory: the full `ContentPackage` as pretty JSON and a Markdown
//! rendering of the draft for editors. A `manifest.json` at the directory
//! root records the run, one entry per input URL in input order, with
//! sha256 checksums for every file written.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use copydesk_shared::{ContentPackage, CopydeskError, Draft, Result, RunId, Stage, StageWarning};

// ---------------------------------------------------------------------------
// Manifest types
// ---------------------------------------------------------------------------

/// Checksum record for one written file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Files written for one completed URL.
#[derive(Debug, Clone)]
pub struct ExportedArtifacts {
    pub slug: String,
    pub files: Vec<ArtifactMeta>,
}

/// Final status of one URL in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Skipped,
}

/// One manifest row per input URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StageWarning>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactMeta>,
}

/// Run-level record written as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub url_count: usize,
    pub entries: Vec<ManifestEntry>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Slug for per-URL artifact filenames: the last path segment of the URL.
pub fn page_slug(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if last.is_empty() {
        "index".to_string()
    } else {
        last.to_string()
    }
}

/// Write one package's artifacts (`{slug}.json` + `{slug}.md`).
#[instrument(skip_all, fields(url = %package.source.url))]
pub fn export_package(output_dir: &Path, package: &ContentPackage) -> Result<ExportedArtifacts> {
    std::fs::create_dir_all(output_dir).map_err(|e| CopydeskError::io(output_dir, e))?;

    let slug = page_slug(&package.source.url);
    let json = serde_json::to_string_pretty(package)
        .map_err(|e| CopydeskError::validation(format!("package serialization failed: {e}")))?;
    let markdown = render_markdown(&package.draft);

    let files = vec![
        write_artifact(output_dir, &format!("{slug}.json"), &json)?,
        write_artifact(output_dir, &format!("{slug}.md"), &markdown)?,
    ];

    info!(slug = %slug, "package exported");
    Ok(ExportedArtifacts { slug, files })
}

/// Write `manifest.json` for the run.
#[instrument(skip_all, fields(entries = manifest.entries.len()))]
pub fn write_manifest(output_dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| CopydeskError::validation(format!("manifest serialization failed: {e}")))?;
    write_artifact(output_dir, "manifest.json", &json)?;
    Ok(output_dir.join("manifest.json"))
}

/// Render the draft for editors. Structured drafts become an article
/// skeleton; raw drafts are passed through under a note.
pub fn render_markdown(draft: &Draft) -> String {
    let doc = match draft {
        Draft::Raw { raw } => return format!("# Draft (raw)\n\n{raw}\n"),
        Draft::Structured(doc) => doc,
    };

    let mut lines: Vec<String> = Vec::new();
    if !doc.meta_title.is_empty() {
        lines.push(format!("# {}", doc.meta_title));
        lines.push(String::new());
    }
    if !doc.meta_description.is_empty() {
        lines.push(format!("> {}", doc.meta_description));
        lines.push(String::new());
    }
    for h2 in &doc.h2s {
        lines.push(format!("## {h2}"));
        lines.push(String::new());
    }
    lines.push(doc.body.clone());
    lines.push(String::new());
    if !doc.faqs.is_empty() {
        lines.push("## FAQs".to_string());
        for faq in &doc.faqs {
            lines.push(format!("**Q:** {}", faq.q));
            lines.push(format!("**A:** {}", faq.a));
            lines.push(String::new());
        }
    }
    if !doc.internal_links.is_empty() {
        lines.push("## Suggested Internal Links".to_string());
        for link in &doc.internal_links {
            lines.push(format!("- **{}** -> {}", link.anchor, link.url));
        }
    }
    if !doc.external_links.is_empty() {
        lines.push("## Suggested External Links".to_string());
        for link in &doc.external_links {
            lines.push(format!("- {} -> {}", link.title, link.url));
        }
    }
    lines.join("\n")
}

/// Atomic write: temp file in the same directory, then rename over the
/// target. Returns the checksum record for the written file.
fn write_artifact(dir: &Path, filename: &str, content: &str) -> Result<ArtifactMeta> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| CopydeskError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| CopydeskError::io(&target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(file = %filename, size = content.len(), "wrote artifact");
    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256,
        size_bytes: content.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
