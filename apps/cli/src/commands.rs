//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use scoutai_core::Transcript;
use scoutai_narrative::{Normalizer, dedupe, render_sources};
use scoutai_shared::{
    AppConfig, NormalizeOptions, RawResponse, ScoutError, init_config, load_config,
};
use tokio::io::AsyncReadExt;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ScoutAI: turn raw market-research responses into displayable documents.
#[derive(Parser)]
#[command(
    name = "scoutai",
    version,
    about = "Normalize market-research responses into clean markdown, chart data, and sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
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
    Text,
    Json,
}

/// What `normalize` prints.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Narrative markdown, then the forecast summary.
    Markdown,
    /// The full document as JSON.
    Json,
    /// The assistant message record as JSON.
    Message,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Normalize a research response payload.
    Normalize {
        /// JSON payload file. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,

        /// Output format.
        #[arg(short, long, default_value = "markdown")]
        format: OutputFormat,

        /// Drop emoji from section headings (overrides config).
        #[arg(long)]
        no_emoji: bool,
    },

    /// Deduplicate a JSON array of source strings and print the rendered list.
    Dedupe {
        /// JSON file with an array of strings. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,
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

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for piping.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "scoutai=warn",
        1 => "scoutai=info",
        2 => "scoutai=debug",
        _ => "scoutai=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Normalize {
            file,
            format,
            no_emoji,
        } => cmd_normalize(file.as_deref(), format, no_emoji).await,
        Command::Dedupe { file } => cmd_dedupe(file.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_normalize(file: Option<&Path>, format: OutputFormat, no_emoji: bool) -> Result<()> {
    let config = load_config()?;
    let mut options = NormalizeOptions::from(&config);
    if no_emoji {
        options.emoji = false;
    }
    let normalizer = Normalizer::new(options)?;

    let payload = read_input(file).await?;
    let raw = RawResponse::from_json(&payload)?;

    info!(
        summary_len = raw.summary.len(),
        points = raw.forecast.series.len(),
        sources = raw.sources.len(),
        ?format,
        "normalizing research payload"
    );

    match format {
        OutputFormat::Markdown => {
            let doc = normalizer.normalize(&raw);
            print!("{}", doc.narrative);
            if let Some(summary) = doc.forecast_summary {
                println!();
                println!("---");
                println!();
                println!("{summary}");
            }
        }
        OutputFormat::Json => {
            let doc = normalizer.normalize(&raw);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Message => {
            let mut transcript = Transcript::new(normalizer);
            let msg = transcript.record_response(&raw);
            println!("{}", serde_json::to_string_pretty(msg)?);
        }
    }

    Ok(())
}

async fn cmd_dedupe(file: Option<&Path>) -> Result<()> {
    let input = read_input(file).await?;
    let sources: Vec<String> = serde_json::from_str(&input)
        .map_err(|e| eyre!("expected a JSON array of strings: {e}"))?;

    let unique = dedupe(&sources);
    info!(input = sources.len(), kept = unique.len(), "deduplicated sources");

    if !unique.is_empty() {
        println!("{}", render_sources(&unique));
    }
    Ok(())
}

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

/// Read the whole input from a file, or from stdin for `None` / `-`.
async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => Ok(tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScoutError::io(path, e))?),
        _ => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            Ok(buf)
        }
    }
}
