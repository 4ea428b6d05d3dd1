//! Application configuration for copydesk.
//!
//! User config lives at `~/.copydesk/copydesk.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; each section names the
//! environment variable that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CopydeskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "copydesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".copydesk";

// ---------------------------------------------------------------------------
// Config structs (matching copydesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Search provider (competitor and forum-question research).
    #[serde(default)]
    pub search: SearchConfig,

    /// Draft generation model settings.
    #[serde(default)]
    pub draft: DraftConfig,

    /// Optional embeddings capability for semantic link ranking.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Site being enriched (candidate index, competitor exclusion).
    #[serde(default)]
    pub site: SiteConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving per-URL artifacts and the run manifest.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Internal-link suggestions requested per URL.
    #[serde(default = "default_suggestion_count")]
    pub suggestion_count: usize,

    /// Keyword phrases extracted per document.
    #[serde(default = "default_keyword_top_k")]
    pub keyword_top_k: usize,

    /// Competitor results kept per URL.
    #[serde(default = "default_competitor_count")]
    pub competitor_count: usize,

    /// Forum questions kept per URL.
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Article fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            suggestion_count: default_suggestion_count(),
            keyword_top_k: default_keyword_top_k(),
            competitor_count: default_competitor_count(),
            question_count: default_question_count(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_suggestion_count() -> usize {
    6
}
fn default_keyword_top_k() -> usize {
    20
}
fn default_competitor_count() -> usize {
    5
}
fn default_question_count() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    30
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Search endpoint base URL.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Country code for localized results.
    #[serde(default = "default_gl")]
    pub gl: String,

    /// Language code for localized results.
    #[serde(default = "default_hl")]
    pub hl: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_api_key_env(),
            base_url: default_search_base_url(),
            gl: default_gl(),
            hl: default_hl(),
        }
    }
}

fn default_search_api_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://google.serper.dev".into()
}
fn default_gl() -> String {
    "us".into()
}
fn default_hl() -> String {
    "en".into()
}

/// `[draft]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_draft_api_key_env")]
    pub api_key_env: String,

    /// Chat completions base URL (OpenAI-compatible).
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model used for draft generation.
    #[serde(default = "default_draft_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_draft_temperature")]
    pub temperature: f32,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_draft_api_key_env(),
            base_url: default_openai_base_url(),
            model: default_draft_model(),
            temperature: default_draft_temperature(),
        }
    }
}

fn default_draft_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_draft_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_draft_temperature() -> f32 {
    0.2
}

/// `[embeddings]` section.
///
/// The embeddings capability is optional: a missing key or `enabled =
/// false` selects the lexical ranking fallback instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Whether to probe for the semantic ranking capability at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the env var holding the API key.
    #[serde(default = "default_draft_api_key_env")]
    pub api_key_env: String,

    /// Embeddings base URL (OpenAI-compatible).
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Embedding model.
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_draft_api_key_env(),
            base_url: default_openai_base_url(),
            model: default_embedding_model(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

/// `[site]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site origin whose sitemap seeds the internal-link candidate list.
    /// Empty means no candidate index unless `--site` is passed.
    #[serde(default)]
    pub base_url: String,

    /// Substring a sitemap URL must contain to count as a candidate.
    #[serde(default = "default_section_filter")]
    pub section_filter: String,

    /// Domain substring excluded from competitor results (your own site).
    #[serde(default)]
    pub exclude_domain: String,
}

fn default_section_filter() -> String {
    "/blog/".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.copydesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CopydeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.copydesk/copydesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CopydeskError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CopydeskError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CopydeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CopydeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CopydeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required API key from the env var named in config.
pub fn require_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(CopydeskError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Read an optional API key; `None` when unset or empty.
pub fn optional_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}
