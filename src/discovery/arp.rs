//! ARP host discovery.
//!
//! Broadcasts an ARP request for every address of an IPv4 block and
//! collects the replies that arrive within a fixed window.
//!
//! # Privileges Required
//!
//! Opening a datalink channel needs root/administrator privileges. When
//! they are missing the capability reports itself unavailable instead of
//! silently scanning nothing.

use crate::error::ResolveError;
use crate::scanner::StopSignal;
use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use pnet::datalink::{self, Channel, MacAddr, NetworkInterface};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ETH_HDR_LEN: usize = 14;
const ARP_LEN: usize = 28;
const ARP_FRAME_LEN: usize = ETH_HDR_LEN + ARP_LEN;

/// How long a single channel read may block before the stop signal is
/// checked again.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// One host that answered an ARP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpReply {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// The ARP capability the resolver depends on.
#[async_trait]
pub trait ArpDiscovery: Send + Sync {
    /// Check that discovery could run at all.
    fn check_capability(&self) -> Result<(), ResolveError>;

    /// Probe every address of `network` and collect replies for `window`.
    ///
    /// Implementations return early with whatever they collected once
    /// `stop` is raised.
    async fn discover(
        &self,
        network: Ipv4Network,
        window: Duration,
        stop: &StopSignal,
    ) -> Result<Vec<ArpReply>, ResolveError>;
}

/// A capability that is never present.
#[derive(Debug, Clone, Default)]
pub struct ArpUnavailable {
    reason: String,
}

impl ArpUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ArpDiscovery for ArpUnavailable {
    fn check_capability(&self) -> Result<(), ResolveError> {
        Err(ResolveError::CapabilityUnavailable(self.reason.clone()))
    }

    async fn discover(
        &self,
        _network: Ipv4Network,
        _window: Duration,
        _stop: &StopSignal,
    ) -> Result<Vec<ArpReply>, ResolveError> {
        self.check_capability().map(|_| Vec::new())
    }
}

/// ARP discovery over a raw datalink channel.
#[derive(Debug, Clone, Default)]
pub struct DatalinkArp {
    interface: Option<String>,
}

impl DatalinkArp {
    /// Use the named interface, or pick one automatically when `None`.
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }
}

#[async_trait]
impl ArpDiscovery for DatalinkArp {
    fn check_capability(&self) -> Result<(), ResolveError> {
        if !is_root() {
            return Err(ResolveError::CapabilityUnavailable(
                "ARP discovery requires root/administrator privileges".to_string(),
            ));
        }
        find_interface(self.interface.as_deref(), None).map(|_| ())
    }

    async fn discover(
        &self,
        network: Ipv4Network,
        window: Duration,
        stop: &StopSignal,
    ) -> Result<Vec<ArpReply>, ResolveError> {
        let interface = find_interface(self.interface.as_deref(), Some(&network))?;
        let stop = stop.clone();

        tokio::task::spawn_blocking(move || sweep(&interface, network, window, &stop))
            .await
            .map_err(|e| ResolveError::CapabilityUnavailable(e.to_string()))?
    }
}

/// Send the requests, then read replies until the window closes.
fn sweep(
    interface: &NetworkInterface,
    network: Ipv4Network,
    window: Duration,
    stop: &StopSignal,
) -> Result<Vec<ArpReply>, ResolveError> {
    let source_mac = interface.mac.ok_or_else(|| {
        ResolveError::CapabilityUnavailable(format!("interface {} has no MAC address", interface.name))
    })?;
    let source_ip = interface_ipv4(interface)?;

    let config = datalink::Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
    };
    let (mut tx, mut rx) = match datalink::channel(interface, config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => {
            return Err(ResolveError::CapabilityUnavailable(
                "unsupported datalink channel type".to_string(),
            ))
        }
        Err(e) => return Err(ResolveError::CapabilityUnavailable(e.to_string())),
    };

    for target in network.iter() {
        if stop.is_stopped() {
            return Ok(Vec::new());
        }
        let frame = build_request(source_mac, source_ip, target);
        if let Some(Err(e)) = tx.send_to(&frame, None) {
            warn!(target = %target, error = %e, "ARP request send failed");
        }
    }

    let deadline = Instant::now() + window;
    let mut replies = Vec::new();
    while Instant::now() < deadline && !stop.is_stopped() {
        match rx.next() {
            Ok(frame) => {
                if let Some(reply) = parse_reply(frame, &network) {
                    debug!(ip = %reply.ip, mac = %reply.mac, "ARP reply");
                    replies.push(reply);
                }
            }
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                warn!(error = %e, "ARP receive failed, ending discovery early");
                break;
            }
        }
    }

    Ok(replies)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Build a broadcast ARP request frame.
pub fn build_request(source_mac: MacAddr, source_ip: Ipv4Addr, target: Ipv4Addr) -> Vec<u8> {
    let mut buffer = vec![0u8; ARP_FRAME_LEN];

    if let Some(mut eth) = MutableEthernetPacket::new(&mut buffer[..ETH_HDR_LEN]) {
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(source_mac);
        eth.set_ethertype(EtherTypes::Arp);
    }

    if let Some(mut arp) = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..]) {
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(source_mac);
        arp.set_sender_proto_addr(source_ip);
        arp.set_target_hw_addr(MacAddr::zero());
        arp.set_target_proto_addr(target);
    }

    buffer
}

/// Extract a reply from a received frame if it answers for `network`.
pub fn parse_reply(frame: &[u8], network: &Ipv4Network) -> Option<ArpReply> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }
    let ip = arp.get_sender_proto_addr();
    network.contains(ip).then(|| ArpReply {
        ip,
        mac: arp.get_sender_hw_addr(),
    })
}

/// Find a suitable network interface.
///
/// Without a name, prefers an interface attached to `network`, then the
/// first non-loopback interface that is up and has an IPv4 address.
fn find_interface(
    name: Option<&str>,
    network: Option<&Ipv4Network>,
) -> Result<NetworkInterface, ResolveError> {
    let interfaces = datalink::interfaces();

    if let Some(name) = name {
        return interfaces
            .into_iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| {
                ResolveError::CapabilityUnavailable(format!("interface {name} not found"))
            });
    }

    let candidates: Vec<NetworkInterface> = interfaces
        .into_iter()
        .filter(|iface| {
            !iface.is_loopback() && iface.is_up() && iface.ips.iter().any(|ip| ip.is_ipv4())
        })
        .collect();

    let attached = network.and_then(|net| {
        candidates.iter().position(|iface| {
            iface
                .ips
                .iter()
                .any(|ip| ip.contains(IpAddr::V4(net.network())))
        })
    });

    match attached {
        Some(index) => Ok(candidates[index].clone()),
        None => candidates.into_iter().next().ok_or_else(|| {
            ResolveError::CapabilityUnavailable("no suitable network interface found".to_string())
        }),
    }
}

fn interface_ipv4(interface: &NetworkInterface) -> Result<Ipv4Addr, ResolveError> {
    interface
        .ips
        .iter()
        .find_map(|ip| match ip.ip() {
            IpAddr::V4(addr) if !addr.is_loopback() => Some(addr),
            _ => None,
        })
        .ok_or_else(|| {
            ResolveError::CapabilityUnavailable(format!(
                "interface {} has no IPv4 address",
                interface.name
            ))
        })
}

/// Check if running with root/admin privileges.
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
