//! Per-URL enrichment pipeline and the sequential batch loop.
//!
//! Each URL moves through a strictly forward state machine:
//! fetch → extract → research → rank → draft → validate → export. Only a
//! fetch failure (or an artifact write failure at the very end) fails the
//! URL; every other stage degrades, records a warning on the package, and
//! keeps going. The batch always produces one outcome per input URL, in
//! input order, no matter what individual URLs do.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};
use url::Url;

use copydesk_fetch::ArticleFetcher;
use copydesk_nlp::KeywordExtractor;
use copydesk_ranking::LinkRanker;
use copydesk_research::ResearchClient;
use copydesk_shared::{ContentPackage, CopydeskError, Draft, Result, RunId, Stage, StageWarning};

use crate::draft::DraftClient;
use crate::export::{self, ExportedArtifacts, ManifestEntry, OutcomeStatus, RunManifest};
use crate::validate;

// ---------------------------------------------------------------------------
// Context & configuration
// ---------------------------------------------------------------------------

/// All collaborator handles for a run, acquired once up front and
/// read-only afterwards. The ranker inside already carries whichever
/// strategy the startup probe selected.
pub struct EnrichContext {
    pub fetcher: ArticleFetcher,
    pub extractor: KeywordExtractor,
    pub research: ResearchClient,
    pub ranker: LinkRanker,
    pub drafter: DraftClient,
}

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// URLs to enrich, processed sequentially in this order.
    pub urls: Vec<Url>,
    /// Internal-link candidate URLs (opaque to the pipeline; usually the
    /// site index).
    pub candidates: Vec<String>,
    /// Directory receiving per-URL artifacts and the run manifest.
    pub output_dir: PathBuf,
    /// Max internal-link suggestions per URL.
    pub suggestion_count: usize,
    /// Max competitor entries per URL.
    pub competitor_count: usize,
    /// Max forum questions per URL.
    pub question_count: usize,
    /// Domain substring excluded from competitor results.
    pub exclude_domain: String,
    /// Tool version recorded in the manifest.
    pub tool_version: String,
}

/// Cooperative cancellation flag, checked between URLs only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Final outcome for one input URL.
pub enum UrlOutcome {
    /// The pipeline ran to the end; the package may still carry warnings.
    Completed {
        package: Box<ContentPackage>,
        artifacts: ExportedArtifacts,
    },
    /// The URL failed at `stage` and produced no artifacts.
    Failed { stage: Stage, error: CopydeskError },
    /// The batch was cancelled before this URL started.
    Skipped,
}

impl UrlOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Warnings recorded on the package, if any.
    pub fn warning_count(&self) -> usize {
        match self {
            Self::Completed { package, .. } => package.warnings.len(),
            _ => 0,
        }
    }
}

/// One input URL paired with its outcome.
pub struct UrlReport {
    pub url: Url,
    pub outcome: UrlOutcome,
}

/// Result of a whole batch run. `degraded` counts completed packages that
/// carry at least one warning, so `degraded <= completed`.
pub struct BatchResult {
    pub run_id: RunId,
    pub reports: Vec<UrlReport>,
    pub completed: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a URL enters a new stage.
    fn stage(&self, url: &str, stage: Stage);
    /// Called after every URL finishes, with `completed / total` counts.
    fn url_completed(&self, url: &str, outcome: &UrlOutcome, completed: usize, total: usize);
    /// Called when the batch completes.
    fn done(&self, result: &BatchResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _url: &str, _stage: Stage) {}
    fn url_completed(&self, _url: &str, _outcome: &UrlOutcome, _completed: usize, _total: usize) {}
    fn done(&self, _result: &BatchResult) {}
}

// ---------------------------------------------------------------------------
// Batch loop
// ---------------------------------------------------------------------------

/// Run the enrichment batch: every URL in input order, one at a time.
#[instrument(skip_all, fields(urls = config.urls.len(), candidates = config.candidates.len()))]
pub async fn run_batch(
    context: &EnrichContext,
    config: &BatchConfig,
    cancel: &CancelToken,
    progress: &dyn ProgressReporter,
) -> Result<BatchResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();

    info!(
        %run_id,
        urls = config.urls.len(),
        candidates = config.candidates.len(),
        strategy = %context.ranker.strategy(),
        "starting enrichment batch"
    );

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| CopydeskError::io(&config.output_dir, e))?;

    let total = config.urls.len();
    let mut reports: Vec<UrlReport> = Vec::with_capacity(total);

    for (i, url) in config.urls.iter().enumerate() {
        let outcome = if cancel.is_cancelled() {
            warn!(url = %url, "batch cancelled, skipping");
            UrlOutcome::Skipped
        } else {
            enrich_url(context, config, url, progress).await
        };
        progress.url_completed(url.as_str(), &outcome, i + 1, total);
        reports.push(UrlReport {
            url: url.clone(),
            outcome,
        });
    }

    let mut completed = 0;
    let mut degraded = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for report in &reports {
        match &report.outcome {
            UrlOutcome::Completed { package, .. } => {
                completed += 1;
                if !package.warnings.is_empty() {
                    degraded += 1;
                }
            }
            UrlOutcome::Failed { .. } => failed += 1,
            UrlOutcome::Skipped => skipped += 1,
        }
    }

    let manifest = RunManifest {
        run_id: run_id.clone(),
        tool_version: config.tool_version.clone(),
        started_at,
        finished_at: Utc::now(),
        url_count: total,
        entries: reports.iter().map(manifest_entry).collect(),
    };
    let manifest_path = export::write_manifest(&config.output_dir, &manifest)?;

    let result = BatchResult {
        run_id,
        reports,
        completed,
        degraded,
        failed,
        skipped,
        output_dir: config.output_dir.clone(),
        manifest_path,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        completed = result.completed,
        degraded = result.degraded,
        failed = result.failed,
        skipped = result.skipped,
        elapsed_ms = result.elapsed.as_millis(),
        "enrichment batch complete"
    );

    Ok(result)
}

fn manifest_entry(report: &UrlReport) -> ManifestEntry {
    match &report.outcome {
        UrlOutcome::Completed { package, artifacts } => ManifestEntry {
            url: report.url.to_string(),
            status: OutcomeStatus::Completed,
            failed_stage: None,
            error: None,
            warnings: package.warnings.clone(),
            artifacts: artifacts.files.clone(),
        },
        UrlOutcome::Failed { stage, error } => ManifestEntry {
            url: report.url.to_string(),
            status: OutcomeStatus::Failed,
            failed_stage: Some(*stage),
            error: Some(error.to_string()),
            warnings: vec![],
            artifacts: vec![],
        },
        UrlOutcome::Skipped => ManifestEntry {
            url: report.url.to_string(),
            status: OutcomeStatus::Skipped,
            failed_stage: None,
            error: None,
            warnings: vec![],
            artifacts: vec![],
        },
    }
}

// ---------------------------------------------------------------------------
// Per-URL pipeline
// ---------------------------------------------------------------------------

/// Run one URL through the full pipeline. The only hard failures are the
/// initial fetch and the final artifact write; every other stage records
/// a warning and continues.
#[instrument(skip_all, fields(url = %url))]
async fn enrich_url(
    context: &EnrichContext,
    config: &BatchConfig,
    url: &Url,
    progress: &dyn ProgressReporter,
) -> UrlOutcome {
    let mut warnings: Vec<StageWarning> = Vec::new();

    // --- Fetching ---
    progress.stage(url.as_str(), Stage::Fetching);
    let source = match context.fetcher.fetch(url).await {
        Ok(source) => source,
        Err(error) => {
            warn!(url = %url, error = %error, "fetch failed");
            return UrlOutcome::Failed {
                stage: Stage::Fetching,
                error,
            };
        }
    };

    // --- Extracting ---
    progress.stage(url.as_str(), Stage::Extracting);
    let keywords = context.extractor.extract(&source.text);
    if keywords.is_empty() {
        warnings.push(StageWarning {
            stage: Stage::Extracting,
            message: "no keywords extracted from page text".to_string(),
        });
    }

    // --- Researching ---
    progress.stage(url.as_str(), Stage::Researching);
    let topic = if keywords.primary_keyword.is_empty() {
        source.title.clone()
    } else {
        keywords.primary_keyword.clone()
    };

    let mut competitors = Vec::new();
    let mut questions = Vec::new();
    if topic.trim().is_empty() {
        warnings.push(StageWarning {
            stage: Stage::Researching,
            message: "no primary keyword or title to search for".to_string(),
        });
    } else {
        match context
            .research
            .top_competitors(&topic, &config.exclude_domain, config.competitor_count)
            .await
        {
            Ok(found) => competitors = found,
            Err(e) => {
                warn!(url = %url, error = %e, "competitor search degraded");
                warnings.push(StageWarning {
                    stage: Stage::Researching,
                    message: format!("competitor search failed: {e}"),
                });
            }
        }
        match context
            .research
            .forum_questions(&topic, &keywords.secondary_keywords, config.question_count)
            .await
        {
            Ok(found) => questions = found,
            Err(e) => {
                warn!(url = %url, error = %e, "question search degraded");
                warnings.push(StageWarning {
                    stage: Stage::Researching,
                    message: format!("question search failed: {e}"),
                });
            }
        }
    }

    // --- Ranking ---
    progress.stage(url.as_str(), Stage::Ranking);
    let suggestions = match context
        .ranker
        .rank(
            url.as_str(),
            &source.text,
            &config.candidates,
            config.suggestion_count,
        )
        .await
    {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!(url = %url, error = %e, "ranking degraded");
            warnings.push(StageWarning {
                stage: Stage::Ranking,
                message: format!("link ranking failed: {e}"),
            });
            Vec::new()
        }
    };

    // --- Drafting ---
    progress.stage(url.as_str(), Stage::Drafting);
    let draft = match context
        .drafter
        .generate(&source, &keywords, &competitors, &questions, &suggestions)
        .await
    {
        Ok(draft) => {
            if draft.is_degraded() {
                warnings.push(StageWarning {
                    stage: Stage::Drafting,
                    message: "draft was not valid JSON, kept as raw text".to_string(),
                });
            }
            draft
        }
        Err(e) => {
            warn!(url = %url, error = %e, "draft generation degraded");
            warnings.push(StageWarning {
                stage: Stage::Drafting,
                message: format!("draft generation failed: {e}"),
            });
            Draft::empty()
        }
    };

    // --- Validating ---
    progress.stage(url.as_str(), Stage::Validating);
    let lint = validate::lint(&source, &draft);

    let package = ContentPackage {
        source,
        keywords,
        competitors,
        faqs_seed: questions,
        internal_suggestions: suggestions,
        draft,
        lint,
        warnings,
    };

    // --- Exporting ---
    progress.stage(url.as_str(), Stage::Exporting);
    match export::export_package(&config.output_dir, &package) {
        Ok(artifacts) => {
            info!(url = %url, warnings = package.warnings.len(), "url enriched");
            UrlOutcome::Completed {
                package: Box::new(package),
                artifacts,
            }
        }
        Err(error) => {
            warn!(url = %url, error = %error, "artifact write failed");
            UrlOutcome::Failed {
                stage: Stage::Exporting,
                error,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use copydesk_shared::{DraftConfig, SearchConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE_HTML: &str = r#"<!doctype html>
<html>
  <head>
    <title>Therapy Notes 101</title>
    <meta name="description" content="A primer on therapy notes.">
  </head>
  <body>
    <article>
      <h2>Why therapy notes matter</h2>
      <p>Therapy notes keep treatment on track. Clinicians review therapy notes before each session.</p>
      <img src="/chart.png">
    </article>
  </body>
</html>"#;

    const EMPTY_PAGE_HTML: &str =
        "<html><head><title>Bare Page</title></head><body></body></html>";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "copydesk-pipeline-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_context(server: &MockServer) -> EnrichContext {
        let search = SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        };
        let draft = DraftConfig {
            base_url: server.uri(),
            ..DraftConfig::default()
        };
        EnrichContext {
            fetcher: ArticleFetcher::new(5).unwrap(),
            extractor: KeywordExtractor::new(20),
            research: ResearchClient::new(&search, "serper-test-key".to_string()).unwrap(),
            ranker: LinkRanker::lexical(),
            drafter: DraftClient::new(&draft, "openai-test-key".to_string()).unwrap(),
        }
    }

    fn test_config(server: &MockServer, paths: &[&str], output_dir: PathBuf) -> BatchConfig {
        BatchConfig {
            urls: paths
                .iter()
                .map(|p| Url::parse(&format!("{}{p}", server.uri())).unwrap())
                .collect(),
            candidates: vec![],
            output_dir,
            suggestion_count: 6,
            competitor_count: 5,
            question_count: 5,
            exclude_domain: String::new(),
            tool_version: "0.1.0-test".to_string(),
        }
    }

    async fn mount_page(server: &MockServer, page_path: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
            .mount(server)
            .await;
    }

    async fn mount_search(server: &MockServer, status: u16) {
        let body = serde_json::json!({
            "organic": [
                { "title": "Competitor article", "link": "https://rival.test/notes" }
            ]
        });
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_chat(server: &MockServer, status: u16) {
        let content =
            "{\"meta_title\": \"Therapy Notes Guide\", \"meta_description\": \"About notes.\", \"h2s\": [\"Basics\"], \"body\": \"Draft body.\"}";
        let body = serde_json::json!({
            "choices": [{ "message": { "content": content } }]
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn batch_reports_one_outcome_per_url_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, "/blog/one", PAGE_HTML).await;
        Mock::given(method("GET"))
            .and(path("/blog/two"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_page(&server, "/blog/three", PAGE_HTML).await;
        mount_search(&server, 200).await;
        mount_chat(&server, 200).await;

        let dir = temp_dir();
        let context = test_context(&server);
        let mut config =
            test_config(&server, &["/blog/one", "/blog/two", "/blog/three"], dir.clone());
        config.candidates = vec![
            format!("{}/blog/one", server.uri()),
            format!("{}/blog/therapy-notes-basics", server.uri()),
        ];

        let result = run_batch(&context, &config, &CancelToken::new(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.reports.len(), 3);
        assert_eq!(result.completed, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 0);

        // Outcomes align with input order.
        assert!(result.reports[0].outcome.is_completed());
        match &result.reports[1].outcome {
            UrlOutcome::Failed { stage, .. } => assert_eq!(*stage, Stage::Fetching),
            _ => panic!("expected URL two to fail at fetch"),
        }
        assert!(result.reports[2].outcome.is_completed());

        // The first URL never suggests itself.
        if let UrlOutcome::Completed { package, .. } = &result.reports[0].outcome {
            assert!(package
                .internal_suggestions
                .iter()
                .all(|s| s.target_url != result.reports[0].url.as_str()));
            assert_eq!(package.competitors.len(), 1);
        }

        // Artifacts for completed URLs, manifest for the run.
        assert!(dir.join("one.json").exists());
        assert!(dir.join("three.json").exists());
        assert!(!dir.join("two.json").exists());
        let manifest: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&result.manifest_path).unwrap())
                .unwrap();
        assert_eq!(manifest.entries.len(), 3);
        assert_eq!(manifest.entries[1].status, OutcomeStatus::Failed);
        assert_eq!(manifest.entries[1].failed_stage, Some(Stage::Fetching));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn research_failure_degrades_instead_of_failing() {
        let server = MockServer::start().await;
        mount_page(&server, "/blog/post", PAGE_HTML).await;
        mount_search(&server, 500).await;
        mount_chat(&server, 200).await;

        let dir = temp_dir();
        let context = test_context(&server);
        let config = test_config(&server, &["/blog/post"], dir.clone());

        let result = run_batch(&context, &config, &CancelToken::new(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.completed, 1);
        assert_eq!(result.degraded, 1);
        match &result.reports[0].outcome {
            UrlOutcome::Completed { package, .. } => {
                assert!(package.competitors.is_empty());
                assert!(package.faqs_seed.is_empty());
                let research_warnings = package
                    .warnings
                    .iter()
                    .filter(|w| w.stage == Stage::Researching)
                    .count();
                assert_eq!(research_warnings, 2);
            }
            _ => panic!("expected a completed package"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn draft_failure_degrades_to_empty_raw() {
        let server = MockServer::start().await;
        mount_page(&server, "/blog/post", PAGE_HTML).await;
        mount_search(&server, 200).await;
        mount_chat(&server, 500).await;

        let dir = temp_dir();
        let context = test_context(&server);
        let config = test_config(&server, &["/blog/post"], dir.clone());

        let result = run_batch(&context, &config, &CancelToken::new(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.completed, 1);
        match &result.reports[0].outcome {
            UrlOutcome::Completed { package, .. } => {
                assert!(package.draft.is_degraded());
                assert_eq!(package.lint.title_length, 0);
                assert!(package.warnings.iter().any(|w| w.stage == Stage::Drafting));
            }
            _ => panic!("expected a completed package"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn cancellation_skips_urls_not_yet_started() {
        struct CancelAfterFirst {
            token: CancelToken,
        }
        impl ProgressReporter for CancelAfterFirst {
            fn stage(&self, _url: &str, _stage: Stage) {}
            fn url_completed(
                &self,
                _url: &str,
                _outcome: &UrlOutcome,
                completed: usize,
                _total: usize,
            ) {
                if completed == 1 {
                    self.token.cancel();
                }
            }
            fn done(&self, _result: &BatchResult) {}
        }

        let server = MockServer::start().await;
        mount_page(&server, "/blog/one", PAGE_HTML).await;
        mount_page(&server, "/blog/two", PAGE_HTML).await;
        mount_page(&server, "/blog/three", PAGE_HTML).await;
        mount_search(&server, 200).await;
        mount_chat(&server, 200).await;

        let dir = temp_dir();
        let context = test_context(&server);
        let config =
            test_config(&server, &["/blog/one", "/blog/two", "/blog/three"], dir.clone());

        let cancel = CancelToken::new();
        let progress = CancelAfterFirst {
            token: cancel.clone(),
        };
        let result = run_batch(&context, &config, &cancel, &progress)
            .await
            .unwrap();

        assert_eq!(result.reports.len(), 3);
        assert_eq!(result.completed, 1);
        assert_eq!(result.skipped, 2);
        assert!(matches!(result.reports[1].outcome, UrlOutcome::Skipped));
        assert!(matches!(result.reports[2].outcome, UrlOutcome::Skipped));

        let manifest: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&result.manifest_path).unwrap())
                .unwrap();
        assert_eq!(manifest.entries[2].status, OutcomeStatus::Skipped);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_page_completes_with_empty_bundle_and_rank() {
        let server = MockServer::start().await;
        mount_page(&server, "/blog/bare", EMPTY_PAGE_HTML).await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "organic": [] })),
            )
            .mount(&server)
            .await;
        mount_chat(&server, 200).await;

        let dir = temp_dir();
        let context = test_context(&server);
        let config = test_config(&server, &["/blog/bare"], dir.clone());

        let result = run_batch(&context, &config, &CancelToken::new(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.completed, 1);
        match &result.reports[0].outcome {
            UrlOutcome::Completed { package, .. } => {
                assert!(package.keywords.is_empty());
                assert!(package.internal_suggestions.is_empty());
                assert!(package.warnings.iter().any(|w| w.stage == Stage::Extracting));
            }
            _ => panic!("expected a completed package"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}
