//! locwatch CLI - Command-line interface
//!
//! Replays scripted location-provider scenarios through the locwatch service
//! and prints the events a host application would receive.

mod commands;
mod error;
mod scenario;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::TierArg;
use commands::config::ConfigArgs;
use commands::replay::ReplayArgs;

#[derive(Parser)]
#[command(name = "locwatch")]
#[command(version, about = "Device location service replay tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and print every event as a JSON line
    Replay {
        /// Scenario file (JSON)
        scenario: PathBuf,

        /// Config file (default: <config dir>/locwatch/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Accuracy tier to subscribe with
        #[arg(long, value_enum, default_value = "balanced")]
        accuracy: TierArg,

        /// Minimum movement between delivered fixes, in meters
        #[arg(long, default_value = "0")]
        min_distance: f64,

        /// Minimum time between delivered fixes, in milliseconds
        #[arg(long, default_value = "0")]
        min_interval_ms: u64,

        /// Also deliver compass headings that moved at least this many degrees
        #[arg(long)]
        heading_filter: Option<f64>,

        /// Give up after this many milliseconds (one-shot only)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Resolve after the first accepted fix
        #[arg(long)]
        one_shot: bool,

        /// Directory for the log file
        #[arg(long, default_value = locwatch::logging::default_log_dir())]
        log_dir: PathBuf,

        /// Print a service snapshot as the last line
        #[arg(long)]
        summary: bool,
    },

    /// Show the effective configuration
    Config {
        /// Config file (default: <config dir>/locwatch/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Only print the config file path
        #[arg(long, conflicts_with = "init")]
        path: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            scenario,
            config,
            accuracy,
            min_distance,
            min_interval_ms,
            heading_filter,
            timeout_ms,
            one_shot,
            log_dir,
            summary,
        } => commands::replay::run(ReplayArgs {
            scenario,
            config,
            accuracy,
            min_distance,
            min_interval_ms,
            heading_filter,
            timeout_ms,
            one_shot,
            log_dir,
            summary,
        }),
        Commands::Config {
            config,
            init,
            force,
            path,
        } => commands::config::run(ConfigArgs {
            config,
            init,
            force,
            path,
        }),
    };

    if let Err(e) = result {
        e.exit();
    }
}
