//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use copydesk_core::draft::DraftClient;
use copydesk_core::pipeline::{
    BatchConfig, BatchResult, CancelToken, EnrichContext, ProgressReporter, UrlOutcome, run_batch,
};
use copydesk_fetch::{ArticleFetcher, site_index};
use copydesk_nlp::KeywordExtractor;
use copydesk_ranking::LinkRanker;
use copydesk_research::ResearchClient;
use copydesk_shared::{AppConfig, Stage, init_config, load_config, require_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Top-level argument parser for the copydesk binary.
#[derive(Parser)]
#[command(
    name = "copydesk",
    version,
    about = "Enrich content page URLs into SEO draft packages with research and link suggestions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: pretty (default) or json.
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Pretty,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich a list of URLs into draft packages.
    Run {
        /// File with one URL per line (blank lines and # comments skipped).
        #[arg(long)]
        urls: String,

        /// Site base URL whose sitemap seeds the internal link candidates.
        #[arg(long)]
        site: Option<String>,

        /// Output directory for artifacts and the run manifest.
        #[arg(short, long)]
        out: Option<String>,

        /// Process at most this many URLs from the list.
        #[arg(long)]
        limit: Option<usize>,

        /// Internal link suggestions per URL.
        #[arg(long)]
        suggestions: Option<usize>,

        /// Skip the embeddings probe and rank links lexically.
        #[arg(long)]
        lexical: bool,
    },

    /// Print the internal link candidates a site's sitemap yields.
    Index {
        /// Site base URL (defaults to the configured site).
        #[arg(long)]
        site: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "copydesk=info",
        1 => "copydesk=debug",
        _ => "copydesk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Pretty => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            urls,
            site,
            out,
            limit,
            suggestions,
            lexical,
        } => {
            cmd_run(
                &urls,
                site.as_deref(),
                out.as_deref(),
                limit,
                suggestions,
                lexical,
            )
            .await
        }
        Command::Index { site } => cmd_index(site.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run command
// ---------------------------------------------------------------------------

async fn cmd_run(
    urls_file: &str,
    site: Option<&str>,
    out: Option<&str>,
    limit: Option<usize>,
    suggestions: Option<usize>,
    lexical: bool,
) -> Result<()> {
    // Validate required API keys before doing anything
    let config = load_config()?;
    let search_key = require_api_key(&config.search.api_key_env, "Search")?;
    let draft_key = require_api_key(&config.draft.api_key_env, "Draft")?;

    let urls = read_url_list(urls_file, limit)?;

    // Internal link candidates come from the site's sitemap, if a site is known
    let site_base = site
        .map(String::from)
        .unwrap_or_else(|| config.site.base_url.clone());
    let candidates = if site_base.is_empty() {
        info!("no site configured, skipping the internal link index");
        Vec::new()
    } else {
        site_index(&site_base, &config.site.section_filter).await
    };

    // Fall back to the site host when no exclude domain is configured
    let exclude_domain = if config.site.exclude_domain.is_empty() {
        Url::parse(&site_base)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_default()
    } else {
        config.site.exclude_domain.clone()
    };

    let ranker = if lexical {
        info!("semantic ranking disabled by flag");
        LinkRanker::lexical()
    } else {
        LinkRanker::probe(&config.embeddings).await
    };
    info!(strategy = %ranker.strategy(), "link ranking strategy selected");

    let context = EnrichContext {
        fetcher: ArticleFetcher::new(config.defaults.fetch_timeout_secs)?,
        extractor: KeywordExtractor::new(config.defaults.keyword_top_k),
        research: ResearchClient::new(&config.search, search_key)?,
        ranker,
        drafter: DraftClient::new(&config.draft, draft_key)?,
    };

    let batch_config = BatchConfig {
        urls,
        candidates,
        output_dir: PathBuf::from(out.unwrap_or(&config.defaults.output_dir)),
        suggestion_count: suggestions.unwrap_or(config.defaults.suggestion_count),
        competitor_count: config.defaults.competitor_count,
        question_count: config.defaults.question_count,
        exclude_domain,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(
        urls = batch_config.urls.len(),
        candidates = batch_config.candidates.len(),
        out = %batch_config.output_dir.display(),
        "starting enrichment batch"
    );

    // Ctrl-C requests a cooperative stop between URLs
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("  Cancelling; URLs not yet started will be skipped.");
                cancel.cancel();
            }
        });
    }

    let reporter = CliProgress::new();

    let result = run_batch(&context, &batch_config, &cancel, &reporter).await?;

    // Print summary
    println!();
    println!("  Enrichment batch finished!");
    println!("  Run ID:    {}", result.run_id);
    println!("  URLs:      {}", result.reports.len());
    println!("  Completed: {}", result.completed);
    println!("  Degraded:  {}", result.degraded);
    println!("  Failed:    {}", result.failed);
    println!("  Skipped:   {}", result.skipped);
    println!("  Output:    {}", result.output_dir.display());
    println!("  Manifest:  {}", result.manifest_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Read the URL list file, applying `--limit` if given.
fn read_url_list(path: &str, limit: Option<usize>) -> Result<Vec<Url>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| eyre!("cannot read URL list '{path}': {e}"))?;

    let mut urls = parse_url_lines(&content)?;
    if let Some(limit) = limit {
        urls.truncate(limit);
    }

    if urls.is_empty() {
        return Err(eyre!("no URLs found in '{path}'"));
    }

    Ok(urls)
}

/// Parse URL lines: blank lines and `#` comments are skipped, anything else
/// must be a valid absolute URL.
fn parse_url_lines(content: &str) -> Result<Vec<Url>> {
    let mut urls = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let url = Url::parse(line)
            .map_err(|e| eyre!("invalid URL on line {}: '{line}': {e}", index + 1))?;
        urls.push(url);
    }
    Ok(urls)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner; per-URL outcome lines
/// are printed above it as they land.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, url: &str, stage: Stage) {
        self.spinner.set_message(format!("{stage} {url}"));
    }

    fn url_completed(&self, url: &str, outcome: &UrlOutcome, completed: usize, total: usize) {
        let line = match outcome {
            UrlOutcome::Completed { .. } if outcome.warning_count() == 0 => {
                format!("  [{completed}/{total}] ok        {url}")
            }
            UrlOutcome::Completed { .. } => format!(
                "  [{completed}/{total}] degraded  {url} ({} warnings)",
                outcome.warning_count()
            ),
            UrlOutcome::Failed { stage, error } => {
                format!("  [{completed}/{total}] failed    {url} ({stage}: {error})")
            }
            UrlOutcome::Skipped => format!("  [{completed}/{total}] skipped   {url}"),
        };
        self.spinner.println(line);
    }

    fn done(&self, _result: &BatchResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// index command
// ---------------------------------------------------------------------------

async fn cmd_index(site: Option<&str>) -> Result<()> {
    let config = load_config()?;

    let site_base = site
        .map(String::from)
        .unwrap_or_else(|| config.site.base_url.clone());
    if site_base.is_empty() {
        return Err(eyre!(
            "no site to index: pass --site or set [site] base_url in the config"
        ));
    }

    info!(site = %site_base, filter = %config.site.section_filter, "building site index");

    let candidates = site_index(&site_base, &config.site.section_filter).await;
    for url in &candidates {
        println!("{url}");
    }

    println!();
    println!("  {} candidate URLs from {site_base}", candidates.len());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
