//! Target resolution.
//!
//! Turns the target of a request into the concrete host list to scan:
//! explicit addresses are validated, CIDR blocks are either ARP-probed or
//! enumerated directly. Every step writes its progress to the event log.

use super::arp::ArpDiscovery;
use crate::error::ResolveError;
use crate::scanner::StopSignal;
use crate::session::EventLog;
use crate::types::{block_size, usable_hosts, validate_entries, ScanRequest, TargetSpec};
use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};

/// Hosts produced by a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Hosts to scan, in discovery order.
    pub hosts: Vec<IpAddr>,
    /// Whether a stop request cut resolution short.
    pub stopped: bool,
}

/// Resolves request targets against an ARP capability.
pub struct Resolver<'a> {
    arp: &'a dyn ArpDiscovery,
    log: &'a EventLog,
    stop: &'a StopSignal,
    window: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(
        arp: &'a dyn ArpDiscovery,
        log: &'a EventLog,
        stop: &'a StopSignal,
        window: Duration,
    ) -> Self {
        Self {
            arp,
            log,
            stop,
            window,
        }
    }

    /// Resolve the hosts of `request`.
    pub async fn resolve(&self, request: &ScanRequest) -> Result<Resolution, ResolveError> {
        let spec = TargetSpec::parse(request.target()).inspect_err(|e| {
            self.log
                .error(format!("[ERROR] Invalid target CIDR '{}': {}", request.target(), e));
        })?;

        let hosts = match spec {
            TargetSpec::Cidr(network) if !request.skip_discovery() => {
                self.discover(network).await?
            }
            TargetSpec::Cidr(network) => self.enumerate(network)?,
            TargetSpec::List(entries) => self.explicit(&entries)?,
        };

        if self.stop.is_stopped() {
            self.log.warning("[INFO] Scan stopped during host discovery.");
            return Ok(Resolution {
                hosts,
                stopped: true,
            });
        }

        if hosts.is_empty() {
            self.log.warning("[-] No live hosts to scan ports on.");
            return Err(ResolveError::NoHostsFound);
        }

        info!(hosts = hosts.len(), "target resolved");
        Ok(Resolution {
            hosts,
            stopped: false,
        })
    }

    /// Active discovery: ARP-probe the block.
    async fn discover(&self, network: IpNetwork) -> Result<Vec<IpAddr>, ResolveError> {
        let IpNetwork::V4(network) = network else {
            let err = ResolveError::CapabilityUnavailable(
                "ARP discovery requires an IPv4 network".to_string(),
            );
            self.log.error(format!("[ERROR] {err}"));
            return Err(err);
        };

        self.log.info(format!(
            "[*] Discovering hosts on {network} using ARP (requires privileges if issues)..."
        ));

        let replies = self
            .arp
            .discover(network, self.window, self.stop)
            .await
            .inspect_err(|e| {
                self.log.error(format!(
                    "[ERROR] {e}. Try running with root/administrator privileges or skip discovery."
                ));
            })?;

        if replies.is_empty() {
            if !self.stop.is_stopped() {
                self.log.warning("[-] No hosts found via ARP.");
            }
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<_> = replies.into_iter().filter(|r| seen.insert(r.ip)).collect();

        self.log
            .success(format!("[*] Found {} live host(s):", unique.len()));
        let mut hosts = Vec::with_capacity(unique.len());
        for reply in unique {
            if self.stop.is_stopped() {
                break;
            }
            self.log.info(format!("  - {} ({})", reply.ip, reply.mac));
            hosts.push(IpAddr::V4(reply.ip));
        }
        Ok(hosts)
    }

    /// Passive expansion: every usable address of the block.
    fn enumerate(&self, network: IpNetwork) -> Result<Vec<IpAddr>, ResolveError> {
        let size = block_size(&network);
        if size > TargetSpec::MAX_CIDR_HOSTS {
            let err = ResolveError::CidrTooLarge(size, TargetSpec::MAX_CIDR_HOSTS);
            self.log.error(format!("[ERROR] {err}"));
            return Err(err);
        }

        self.log.info(format!(
            "[*] Adding all IPs in {network} for port scanning (no host discovery)..."
        ));

        let mut hosts = Vec::new();
        for ip in usable_hosts(network) {
            if self.stop.is_stopped() {
                break;
            }
            hosts.push(ip);
        }
        debug!(network = %network, hosts = hosts.len(), "enumerated block");
        Ok(hosts)
    }

    /// Explicit addresses: keep the valid ones, log the rest.
    fn explicit(&self, entries: &[String]) -> Result<Vec<IpAddr>, ResolveError> {
        let checked = validate_entries(entries);
        for bad in &checked.invalid {
            self.log
                .error(format!("[ERROR] Invalid IP address in target list: {bad}"));
        }

        if checked.valid.is_empty() {
            self.log
                .error("[ERROR] No valid IP addresses provided in target specification.");
            return Err(ResolveError::AllTargetsInvalid);
        }

        let listed: Vec<String> = checked.valid.iter().map(IpAddr::to_string).collect();
        self.log.info(format!(
            "[*] Target is specific IP(s): {}. Skipping network discovery.",
            listed.join(", ")
        ));
        Ok(checked.valid)
    }
}
