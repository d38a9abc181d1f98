//! Scan subcommand implementation.
//!
//! Handles the `lanscan scan <target>` command. Plain output streams the
//! event log while the scan runs; Ctrl-C requests a graceful stop.

use crate::cli::OutputFormat;
use crate::config::EngineSettings;
use crate::discovery::{ArpDiscovery, DatalinkArp};
use crate::error::SessionResult;
use crate::output;
use crate::session::{ScanEngine, ScanReport, SessionHandle};
use crate::types::{PortMode, ScanRequest};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Scan a target for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target to scan (IP, comma-separated IPs, or CIDR notation)
    ///
    /// Examples:
    ///   192.168.1.10               Single IP address
    ///   192.168.1.10,192.168.1.20  Several addresses
    ///   192.168.1.0/24             CIDR range (ARP discovery unless --no-discover)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// How ports are selected [default: from settings]
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<PortMode>,

    /// Ports for `range` ("1-1024") or `list` ("22,80,443") mode
    #[arg(short, long, default_value = "")]
    pub ports: String,

    /// Number of concurrent workers (1-500) [default: from settings]
    #[arg(short = 'c', long)]
    pub concurrency: Option<String>,

    /// Per-probe timeout in seconds (0-10] [default: from settings]
    #[arg(short = 't', long)]
    pub timeout: Option<String>,

    /// Scan every address of a CIDR block instead of ARP-probing it
    #[arg(long)]
    pub no_discover: bool,

    /// Network interface for ARP discovery
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, settings: &EngineSettings) -> anyhow::Result<()> {
        let concurrency = self
            .concurrency
            .clone()
            .unwrap_or_else(|| settings.concurrency.to_string());
        let timeout = self
            .timeout
            .clone()
            .unwrap_or_else(|| settings.timeout.to_string());

        let request = ScanRequest::normalize(
            &self.target,
            self.mode.unwrap_or(settings.default_port_mode),
            &self.ports,
            &concurrency,
            &timeout,
            self.no_discover,
        )?;
        debug!(?request, "request validated");

        let interface = self.interface.clone().or_else(|| settings.interface.clone());
        let arp: Arc<dyn ArpDiscovery> = Arc::new(DatalinkArp::new(interface));
        let engine = ScanEngine::with_options(arp, settings.session_options()?);
        let handle = engine.start(request)?;

        let stopper = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && stopper.request_stop() {
                info!("interrupted, stopping scan");
            }
        });

        let report = match self.output {
            OutputFormat::Plain => {
                stream(&handle, settings.progress_poll(), !self.no_progress).await?
            }
            OutputFormat::Json => handle.await_completion().await?,
        };

        output::format_report(&report, self.output)?;
        Ok(())
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Print log lines as they arrive until the session ends.
async fn stream(
    handle: &SessionHandle,
    poll: Duration,
    show_progress: bool,
) -> SessionResult<ScanReport> {
    let mut bar: Option<ProgressBar> = None;
    let mut ticker = tokio::time::interval(poll);
    let completion = handle.await_completion();
    tokio::pin!(completion);

    loop {
        tokio::select! {
            result = &mut completion => {
                flush(handle, bar.as_ref());
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                return result;
            }
            _ = ticker.tick() => {
                flush(handle, bar.as_ref());
                let progress = handle.progress();
                if show_progress && progress.total > 0 {
                    let pb = bar.get_or_insert_with(|| progress_bar(progress.total));
                    pb.set_position(progress.completed as u64);
                    pb.set_message(format!("{} open", progress.open));
                }
            }
        }
    }
}

fn flush(handle: &SessionHandle, bar: Option<&ProgressBar>) {
    for line in handle.poll_log() {
        match bar {
            Some(pb) => pb.suspend(|| output::print_line(&line)),
            None => output::print_line(&line),
        }
    }
}
