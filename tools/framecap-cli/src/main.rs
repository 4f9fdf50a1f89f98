//! Framecap CLI — drive capture sessions from the command line.
//!
//! Usage:
//!   framecap record [OPTIONS]    Capture a synthetic scene to a frame log
//!   framecap config [--init]     Show or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use framecap_common::config::{AppConfig, CaptureDefaults};

mod commands;
mod frame_log;
mod scene;

#[derive(Parser)]
#[command(
    name = "framecap",
    about = "Capture composited camera frames from a render loop",
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
    /// Record a synthetic multi-camera scene
    Record {
        /// Frame log output path
        #[arg(short, long, default_value = "frames.jsonl")]
        output: PathBuf,

        /// Frame width (defaults to config)
        #[arg(long)]
        width: Option<u32>,

        /// Frame height (defaults to config)
        #[arg(long)]
        height: Option<u32>,

        /// Host frame rate (defaults to config)
        #[arg(long)]
        fps: Option<u32>,

        /// Host frames skipped between captured frames (defaults to config)
        #[arg(long)]
        skip: Option<u32>,

        /// Stop after this many host frames; runs until Ctrl+C otherwise
        #[arg(long)]
        frames: Option<u64>,

        /// Timestamp source
        #[arg(long, value_enum, default_value_t = commands::record::ClockKind::Realtime)]
        clock: commands::record::ClockKind,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    framecap_common::logging::init_cli_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Record {
            output,
            width,
            height,
            fps,
            skip,
            frames,
            clock,
        } => {
            let defaults = &config.capture;
            let capture = CaptureDefaults {
                width: width.unwrap_or(defaults.width),
                height: height.unwrap_or(defaults.height),
                fps: fps.unwrap_or(defaults.fps),
                skip: skip.unwrap_or(defaults.skip),
                anti_aliasing: defaults.anti_aliasing,
            };
            capture.validate()?;
            commands::record::run(commands::record::RecordOptions {
                output,
                width: capture.width,
                height: capture.height,
                fps: capture.fps,
                skip: capture.skip,
                anti_aliasing: capture.anti_aliasing,
                frames,
                clock,
            })
            .await
        }
        Commands::Config { init } => commands::config::run(&config, init),
    }
}
