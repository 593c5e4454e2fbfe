//! ScoutAI CLI: market-research response normalizer.
//!
//! Reads a research payload, cleans its narrative, separates the forecast
//! summary and chart data, and renders a deduplicated source list.

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
