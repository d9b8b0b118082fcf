//! AvPlayer CLI - Headless Player Driver
//!
//! Features:
//! - Single-session playback against the simulated engine
//! - Method-channel script replay
//! - Runtime configuration inspection

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// AvPlayer CLI - drive players without a host UI
#[derive(Parser)]
#[command(name = "avplayer")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Headless media player driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Runtime configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one source end to end and print its events
    Play {
        /// Source: URL, file path or asset:// key
        source: String,

        /// Simulated media duration in milliseconds
        #[arg(short, long, default_value = "3000")]
        duration_ms: u64,

        /// Simulate a live stream
        #[arg(long)]
        live: bool,

        /// Number of extra loop cycles before stopping
        #[arg(short, long, default_value = "0")]
        loops: u32,

        /// Playback speed
        #[arg(short, long, default_value = "1.0")]
        speed: f32,

        /// Seek here (milliseconds) once the media is ready
        #[arg(long)]
        seek_ms: Option<i64>,

        /// Stop after this long; live streams end here
        #[arg(short, long, default_value = "30000")]
        timeout_ms: u64,
    },

    /// Replay a JSON list of method-channel calls
    Script {
        /// Script file: `[{"method": "create"}, {"method": "open", "args": {...}, "waitMs": 500}]`
        file: PathBuf,

        /// Simulated media duration in milliseconds
        #[arg(short, long, default_value = "3000")]
        duration_ms: u64,

        /// Stop at the first failing call
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the effective runtime configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    avplayer_core::init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play { source, duration_ms, live, loops, speed, seek_ms, timeout_ms } => {
            let options = commands::PlayOptions {
                duration_ms,
                live,
                loops,
                speed,
                seek_ms,
                timeout_ms,
            };
            commands::play(&source, options, config, &cli.format).await?;
        }
        Commands::Script { file, duration_ms, fail_fast } => {
            commands::script(&file, duration_ms, fail_fast, config, &cli.format).await?;
        }
        Commands::Config => {
            commands::show_config(&config, &cli.format)?;
        }
    }

    Ok(())
}
