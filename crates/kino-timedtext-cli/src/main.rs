//! Kino Timed Text CLI - Headless caption driver
//!
//! Features:
//! - Caption track listing (WebVTT, SRT)
//! - Track selection preview from language/kind preferences
//! - Active captions at a playback time
//! - Playback simulation with a console render surface

use clap::{Parser, Subcommand};
use kino_timedtext::{LayoutMode, SurfaceSize};
use std::path::PathBuf;

mod commands;
mod loader;
mod output;
mod surface;

use commands::{PlayOptions, SessionOptions};

/// Kino Timed Text - caption track toolkit
#[derive(Parser)]
#[command(name = "kino-timedtext")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Caption track selection and playback simulation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Caption track as LANG:KIND:PATH[:TITLE] (repeatable)
    #[arg(short, long = "track", global = true)]
    tracks: Vec<String>,

    /// Preferences file (JSON)
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    /// Seconds added to playback time before cue lookup
    #[arg(long, default_value = "0", allow_hyphen_values = true, global = true)]
    offset: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracks with their load state
    Tracks,

    /// Show the track that would be enabled
    Select {
        /// Preferred language (default: saved preference or "en")
        #[arg(short, long)]
        lang: Option<String>,

        /// Preferred kind code, e.g. SUB or CC (default: saved preference or SUB)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Print the captions active at a time (seconds)
    At {
        time: f64,
    },

    /// Simulate playback and print render instructions
    Play {
        /// Start time in seconds
        #[arg(long, default_value = "0")]
        from: f64,

        /// End time in seconds
        #[arg(long)]
        to: f64,

        /// Clock tick interval in seconds
        #[arg(short, long, default_value = "0.25")]
        step: f64,

        /// Caption layout (ontop, below, off)
        #[arg(short, long)]
        layout: Option<LayoutMode>,

        /// Report that overlay placement is unsupported
        #[arg(long)]
        no_overlay: bool,

        /// Tick at wall-clock speed
        #[arg(long)]
        realtime: bool,

        /// Player width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Player height in pixels
        #[arg(long, default_value = "360")]
        height: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing, keep stdout for command output
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    let opts = SessionOptions {
        tracks: cli.tracks,
        prefs: cli.prefs,
        offset: cli.offset,
        format: cli.format.as_str().into(),
    };

    match cli.command {
        Commands::Tracks => {
            commands::tracks(&opts).await?;
        }
        Commands::Select { lang, kind } => {
            commands::select(&opts, lang, kind).await?;
        }
        Commands::At { time } => {
            commands::at(&opts, time).await?;
        }
        Commands::Play { from, to, step, layout, no_overlay, realtime, width, height } => {
            let play = PlayOptions {
                from,
                to,
                step,
                layout,
                no_overlay,
                realtime,
                size: SurfaceSize::new(width, height),
            };
            commands::play(&opts, play).await?;
        }
    }

    Ok(())
}
