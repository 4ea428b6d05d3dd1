//! Command-line entry point for copydesk.
//!
//! Turns a list of page URLs into SEO-ready draft packages: keywords,
//! competitor research, internal link suggestions, and a generated draft.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
