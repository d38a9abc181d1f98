//! Discover subcommand implementation.
//!
//! Runs a bare ARP sweep and lists the hosts that answered.

use crate::cli::OutputFormat;
use crate::config::{wait_duration, EngineSettings};
use crate::discovery::{guess_local_network, ArpDiscovery, DatalinkArp};
use crate::output;
use crate::scanner::StopSignal;
use anyhow::Context;
use clap::Parser;
use ipnetwork::Ipv4Network;
use std::collections::HashSet;

/// Find live hosts on a network with ARP.
#[derive(Parser, Debug)]
pub struct DiscoverCommand {
    /// IPv4 network to sweep [default: the local /24]
    #[arg(value_name = "CIDR")]
    pub network: Option<String>,

    /// Network interface to send from
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Seconds to collect replies [default: from settings]
    #[arg(short = 'w', long)]
    pub window: Option<f64>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl DiscoverCommand {
    pub async fn execute(&self, settings: &EngineSettings) -> anyhow::Result<()> {
        let network: Ipv4Network = match &self.network {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid IPv4 network '{raw}'"))?,
            None => guess_local_network().await?,
        };

        let window = wait_duration("window", self.window.unwrap_or(settings.discovery_window))?;

        let interface = self.interface.clone().or_else(|| settings.interface.clone());
        let arp = DatalinkArp::new(interface);
        arp.check_capability()?;

        let stop = StopSignal::new();
        let stopper = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stopper.stop();
            }
        });

        if self.output == OutputFormat::Plain {
            output::print_info(&format!("Discovering hosts on {network} using ARP..."));
        }
        let mut replies = arp
            .discover(network, window, &stop)
            .await?;
        let mut seen = HashSet::new();
        replies.retain(|r| seen.insert(r.ip));

        match self.output {
            OutputFormat::Json => {
                let hosts: Vec<_> = replies
                    .iter()
                    .map(|r| serde_json::json!({ "ip": r.ip, "mac": r.mac.to_string() }))
                    .collect();
                let body = serde_json::json!({ "network": network.to_string(), "hosts": hosts });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            OutputFormat::Plain if replies.is_empty() => {
                output::print_warning("No hosts found via ARP.");
            }
            OutputFormat::Plain => {
                output::print_success(&format!("Found {} live host(s):", replies.len()));
                for reply in &replies {
                    println!("  - {} ({})", reply.ip, reply.mac);
                }
            }
        }
        Ok(())
    }
}
