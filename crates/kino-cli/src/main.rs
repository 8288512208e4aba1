//! Kino CLI - Headless source resolution and track inspection
//!
//! Features:
//! - Source selection against the default loader set, with MIME probing
//! - Manifest inspection through the adaptive engine bridge
//! - Quality selection (manual or auto) with the resulting engine commands
//! - Effective configuration dump

use clap::{Parser, Subcommand};
use kino_media::PlayerConfig;
use output::OutputFormat;
use std::path::PathBuf;

mod commands;
mod element;
mod engine;
mod output;

/// Kino CLI - Media provider toolkit
#[derive(Parser)]
#[command(name = "kino-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Provider resolution and track inspection toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Player configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick the source and loader for a list of candidates
    Resolve {
        /// Candidate sources, in declaration order (`SRC` or `SRC;TYPE`)
        #[arg(required = true)]
        sources: Vec<String>,

        /// Try the native video loader before the adaptive HLS loader
        #[arg(long)]
        prefer_native_hls: bool,
    },

    /// Load an HLS playlist and show the synchronized tracks
    Inspect {
        /// URL or path to the playlist
        manifest: String,

        /// Select a quality after loading (index or "auto")
        #[arg(short, long)]
        quality: Option<String>,
    },

    /// Print the effective player configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    kino_media::init();

    let config = match &cli.config {
        Some(path) => PlayerConfig::from_file(path)?,
        None => PlayerConfig::default(),
    };
    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Resolve { sources, prefer_native_hls } => {
            let config = PlayerConfig {
                prefer_native_hls: prefer_native_hls || config.prefer_native_hls,
                ..config
            };
            commands::resolve(&sources, config, format).await?;
        }
        Commands::Inspect { manifest, quality } => {
            commands::inspect(&manifest, quality.as_deref(), config, format).await?;
        }
        Commands::Config => {
            commands::config(&config, format)?;
        }
    }

    Ok(())
}
