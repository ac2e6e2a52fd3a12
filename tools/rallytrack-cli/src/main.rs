//! RallyTrack CLI: track balls in rally footage from the command line.
//!
//! Usage:
//!   rallytrack track <INPUT> [OPTIONS]   Track a video and render annotations
//!   rallytrack info <INPUT>              Show video stream information
//!   rallytrack check                     Check external tool availability
//!   rallytrack config [--init]           Show or create the user config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rallytrack",
    about = "Multi-method ball tracking for rally sports footage",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the ball through a video
    Track {
        /// Input video file
        input: PathBuf,

        /// Annotated output video (defaults to <input>_tracked.avi)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Track only; do not render an annotated video
        #[arg(long)]
        no_render: bool,

        /// Write the session summary as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the session summary as JSON instead of text
        #[arg(long)]
        json: bool,

        /// JSON file overriding tracking parameters
        #[arg(long)]
        tuning: Option<PathBuf>,

        /// TTF/OTF font for text overlays
        #[arg(long)]
        font: Option<PathBuf>,

        /// Frames between progress log lines
        #[arg(long, default_value = "30")]
        progress_every: u64,
    },

    /// Show video stream information
    Info {
        /// Input video file
        input: PathBuf,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,

    /// Show the effective configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,

        /// Print the default tracking parameters as a tuning file
        #[arg(long)]
        tuning: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app_config = rallytrack_common::AppConfig::load();
    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    rallytrack_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Track {
            input,
            output,
            no_render,
            report,
            json,
            tuning,
            font,
            progress_every,
        } => {
            commands::track::run(
                &app_config,
                commands::track::TrackArgs {
                    input,
                    output,
                    render: !no_render,
                    report,
                    json,
                    tuning,
                    font,
                    progress_every,
                },
            )
            .await
        }
        Commands::Info { input } => commands::info::run(input),
        Commands::Check => commands::check::run(),
        Commands::Config { init, tuning } => commands::config::run(&app_config, init, tuning),
    }
}
