//! Host discovery - the resolving half of a scan.
//!
//! Expands a target into the hosts to probe, either through ARP discovery
//! or by enumerating a block directly.

pub mod arp;
pub mod local;
pub mod resolver;

pub use arp::{is_root, ArpDiscovery, ArpReply, ArpUnavailable, DatalinkArp};
pub use local::guess_local_network;
pub use resolver::{Resolution, Resolver};

use crate::session::{LogLine, Severity};

/// Describe whether ARP discovery can run in this process.
pub fn capability_notice(arp: &dyn ArpDiscovery) -> LogLine {
    match arp.check_capability() {
        Ok(()) if is_root() => LogLine::new(
            Severity::Success,
            "[INFO] ARP discovery available and running with root privileges.",
        ),
        Ok(()) => LogLine::new(
            Severity::Info,
            "[INFO] ARP discovery available. Run with root/administrator privileges if you encounter issues.",
        ),
        Err(e) => LogLine::new(
            Severity::Warning,
            format!("[WARNING] {e}. Host discovery on network ranges is disabled; skip discovery or list IPs explicitly."),
        ),
    }
}
