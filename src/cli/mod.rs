//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `lanscan scan <target>` - Discover hosts and scan their ports
//! - `lanscan discover [cidr]` - ARP-sweep a network without port scanning
//! - `lanscan settings` - Show or reset the engine settings

mod discover;
mod scan;
mod settings;

pub use discover::DiscoverCommand;
pub use scan::ScanCommand;
pub use settings::SettingsCommand;

use crate::config::EngineSettings;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lanscan - LAN host discovery and TCP port scanning.
///
/// Finds live hosts on a local network with ARP, or takes explicit
/// addresses, and probes their TCP ports with a bounded pool of workers.
#[derive(Parser, Debug)]
#[command(name = "lanscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LAN host discovery and TCP port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to a custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "LANSCAN_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Default tracing filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "lanscan=info",
            _ => "lanscan=debug",
        }
    }

    /// Settings from `--config`, or from the default location.
    pub fn load_settings(&self) -> anyhow::Result<EngineSettings> {
        match &self.config {
            Some(path) => EngineSettings::load_from(path)
                .with_context(|| format!("loading settings from {}", path.display())),
            None => EngineSettings::load().context("loading settings"),
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a target for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Find live hosts with ARP
    #[command(alias = "d")]
    Discover(DiscoverCommand),

    /// Show or reset settings
    Settings(SettingsCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines, streamed while scanning
    #[default]
    Plain,
    /// JSON report once the scan ends
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}
