//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::config::ConfigArgs;
use crate::commands::heartbeat::HeartbeatArgs;
use crate::commands::status::StatusArgs;
use crate::commands::watch::WatchArgs;

/// Heartbeat tracker.
///
/// Watches project directories and reports file activity to a
/// WakaTime-compatible time tracking service.
#[derive(Debug, Parser)]
#[command(name = "ht", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch directories and send heartbeats until interrupted.
    Watch(WatchArgs),

    /// Send a heartbeat for a single file.
    Heartbeat(HeartbeatArgs),

    /// View or update configuration.
    Config(ConfigArgs),

    /// Show tracker status for the configured directories.
    Status(StatusArgs),
}
