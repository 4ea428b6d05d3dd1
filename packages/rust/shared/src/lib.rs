//! Shared types, error model, and configuration for copydesk.
//!
//! This crate is the foundation depended on by all other copydesk crates.
//! It provides:
//! - [`CopydeskError`], the unified error type
//! - Domain types ([`SourceDocument`], [`KeywordBundle`], [`ContentPackage`], ...)
//! - Configuration ([`AppConfig`], config loading, API key lookup)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DraftConfig, EmbeddingsConfig, SearchConfig, SiteConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, optional_api_key,
    require_api_key,
};
pub use error::{CopydeskError, Result};
pub use types::{
    CompetitorEntry, ContentPackage, Draft, DraftDocument, ExternalLink, Faq, ImageRef,
    InternalLink, KeywordBundle, LinkSuggestion, LintResult, RunId, SourceDocument, Stage,
    StageWarning,
};
