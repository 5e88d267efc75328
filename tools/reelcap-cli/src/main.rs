//! Reelcap CLI: record a screen region to a share-ready MP4.
//!
//! Usage:
//!   reelcap record [OPTIONS]     Record for a fixed duration
//!   reelcap preview [OPTIONS]    Live preview of the capture target
//!   reelcap monitors             List connected monitors
//!   reelcap config <ACTION>      Show or edit saved settings
//!   reelcap check                Check system capabilities
//!   reelcap last                 Print the newest recording

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use reelcap_common::config::{config_file_path, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcap",
    about = "Record a screen region and convert it for sharing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the configured capture target
    Record {
        /// Recording length, in `--unit`s
        #[arg(short, long, default_value = "10")]
        duration: String,

        /// Unit of `--duration`: seconds, minutes or hours
        #[arg(short, long, default_value = "seconds")]
        unit: String,

        /// Target FPS (defaults to the configured value)
        #[arg(long)]
        fps: Option<u32>,

        /// Force a capture backend: compositor or screenshot
        #[arg(long)]
        backend: Option<String>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a scaled live preview of the capture target
    Preview {
        /// How long to run the preview
        #[arg(long, default_value = "5")]
        seconds: f64,

        /// Write the last preview frame to this PNG file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Force a capture backend: compositor or screenshot
        #[arg(long)]
        backend: Option<String>,
    },

    /// List connected monitors
    Monitors,

    /// Show or edit saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check system capabilities
    Check,

    /// Print the path of the newest recording
    Last,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,

    /// Capture an explicit rectangle
    Region {
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
        width: u32,
        height: u32,
    },

    /// Capture the rectangle between two corner points (both sides must exceed 10 px)
    Select {
        #[arg(allow_hyphen_values = true)]
        x0: i32,
        #[arg(allow_hyphen_values = true)]
        y0: i32,
        #[arg(allow_hyphen_values = true)]
        x1: i32,
        #[arg(allow_hyphen_values = true)]
        y1: i32,
    },

    /// Capture a whole monitor by zero-based index (see `reelcap monitors`)
    Monitor { index: usize },

    /// Capture the primary screen
    Clear,

    /// Draw the pointer into recordings
    Cursor { state: Toggle },

    /// Delete earlier recordings before each new one
    Replace { state: Toggle },

    /// Folder where recordings are written
    SavePath { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Self::On
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config_file_path);
    let config = AppConfig::load_from(&config_path);

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reelcap_common::logging::init_logging(&logging);

    let config = commands::validated_config(config, &config_path);

    match cli.command {
        Commands::Record {
            duration,
            unit,
            fps,
            backend,
            json,
        } => {
            commands::record::run(
                config,
                config_path,
                commands::record::RecordArgs {
                    duration,
                    unit,
                    fps,
                    backend,
                    json,
                },
            )
            .await
        }
        Commands::Preview {
            seconds,
            snapshot,
            backend,
        } => commands::preview::run(config, seconds, snapshot, backend).await,
        Commands::Monitors => commands::monitors::run(&config),
        Commands::Config { action } => commands::config::run(config, &config_path, action),
        Commands::Check => commands::check::run(),
        Commands::Last => commands::last::run(&config),
    }
}
