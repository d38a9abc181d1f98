//! Target specification types with CIDR support.
//!
//! Provides target parsing supporting:
//! - Single IP addresses (IPv4 and IPv6)
//! - Comma-separated address lists
//! - CIDR notation (192.168.1.0/24)

use crate::error::ResolveError;
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;

/// A parsed target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Explicit address entries, trimmed, not yet validated.
    List(Vec<String>),
    /// A CIDR network block.
    Cidr(IpNetwork),
}

/// Outcome of validating the entries of a `TargetSpec::List`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListValidation {
    /// Entries that parsed as address literals, in input order.
    pub valid: Vec<IpAddr>,
    /// Entries that did not.
    pub invalid: Vec<String>,
}

impl TargetSpec {
    /// Maximum number of addresses allowed in a CIDR block.
    pub const MAX_CIDR_HOSTS: u128 = 65536; // /16 for IPv4

    /// Parse a raw target string.
    ///
    /// Anything containing `/` is treated as CIDR; everything else is split
    /// on commas.
    pub fn parse(s: &str) -> Result<Self, ResolveError> {
        let s = s.trim();

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| ResolveError::InvalidCidr(s.to_string()))?;
            return Ok(Self::Cidr(network));
        }

        let entries = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self::List(entries))
    }

    /// Whether this target is a CIDR block.
    pub fn is_cidr(&self) -> bool {
        matches!(self, Self::Cidr(_))
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(entries) => write!(f, "{}", entries.join(", ")),
            Self::Cidr(network) => write!(f, "{}", network),
        }
    }
}

/// Split list entries into valid address literals and rejects.
pub fn validate_entries(entries: &[String]) -> ListValidation {
    let mut result = ListValidation::default();
    for entry in entries {
        match entry.parse::<IpAddr>() {
            Ok(ip) => result.valid.push(ip),
            Err(_) => result.invalid.push(entry.clone()),
        }
    }
    result
}

/// Total number of addresses in a block, network and broadcast included.
pub fn block_size(network: &IpNetwork) -> u128 {
    let bits: u32 = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    let host_bits = bits - u32::from(network.prefix());
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

/// Iterate the usable host addresses of a block in ascending order.
///
/// IPv4 blocks larger than /31 exclude their network and broadcast
/// addresses. A /32 yields exactly its one address.
pub fn usable_hosts(network: IpNetwork) -> impl Iterator<Item = IpAddr> {
    network.iter().filter(move |ip| match (network, ip) {
        (IpNetwork::V4(net), IpAddr::V4(addr)) if net.prefix() < 31 => {
            *addr != net.network() && *addr != net.broadcast()
        }
        _ => true,
    })
}
