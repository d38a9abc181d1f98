//! Local network auto-discovery.
//!
//! Guesses the /24 block the machine sits on from its primary IPv4 address.

use crate::error::ResolveError;
use ipnetwork::Ipv4Network;
use pnet::datalink;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Prefix length of the guessed network.
const GUESSED_PREFIX: u8 = 24;

/// Any non-local address works; connecting a UDP socket sends nothing.
const ROUTE_PROBE: &str = "10.255.255.255:1";

/// Guess the local network, e.g. `192.168.1.0/24`.
pub async fn guess_local_network() -> Result<Ipv4Network, ResolveError> {
    let ip = match primary_ipv4().await {
        Some(ip) => ip,
        None => interface_ipv4().ok_or_else(|| {
            ResolveError::LocalNetworkUnknown("no non-loopback IPv4 address".to_string())
        })?,
    };
    debug!(ip = %ip, "local address");

    network_for(ip).ok_or_else(|| {
        ResolveError::LocalNetworkUnknown(format!("{ip} is not a usable LAN address"))
    })
}

/// The address the OS would use for outbound traffic.
async fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect(ROUTE_PROBE).await.ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

/// First IPv4 address of an up, non-loopback interface.
fn interface_ipv4() -> Option<Ipv4Addr> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| iface.ips)
        .find_map(|ip| match ip.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
}

/// The /24 containing `ip`, unless it is loopback or unspecified.
fn network_for(ip: Ipv4Addr) -> Option<Ipv4Network> {
    if ip.is_loopback() || ip.is_unspecified() {
        return None;
    }
    let guess = Ipv4Network::new(ip, GUESSED_PREFIX).ok()?;
    Ipv4Network::new(guess.network(), GUESSED_PREFIX).ok()
}
