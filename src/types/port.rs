//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortMode` selects how the port list of a request is produced.

use crate::error::ValidationError;
use crate::services;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// How the ports of a scan are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    /// The curated set of well-known ports.
    #[default]
    Common,
    /// Every port, 1-65535.
    All,
    /// An inclusive `start-end` range.
    Range,
    /// A comma-separated list; duplicates are kept.
    List,
}

impl PortMode {
    /// Produce the ordered port list for this mode.
    ///
    /// `custom` is only consulted by `Range` and `List`.
    pub fn resolve(self, custom: &str) -> Result<Vec<Port>, ValidationError> {
        let ports = match self {
            Self::Common => services::common_ports()
                .into_iter()
                .filter_map(Port::new)
                .collect(),
            Self::All => (Port::MIN..=Port::MAX).map(Port).collect(),
            Self::Range => parse_range(custom)?,
            Self::List => parse_list(custom)?,
        };

        if ports.is_empty() {
            return Err(ValidationError::NoPorts);
        }
        Ok(ports)
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "Common Ports"),
            Self::All => write!(f, "All Ports (1-65535)"),
            Self::Range => write!(f, "Custom Range"),
            Self::List => write!(f, "Custom List"),
        }
    }
}

impl FromStr for PortMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "common" | "common ports" => Ok(Self::Common),
            "all" | "all ports" | "all ports (1-65535)" => Ok(Self::All),
            "range" | "custom range" => Ok(Self::Range),
            "list" | "custom list" => Ok(Self::List),
            other => Err(ValidationError::UnknownPortMode(other.to_string())),
        }
    }
}

/// Parse `"start-end"` with `0 < start <= end <= 65535`.
fn parse_range(s: &str) -> Result<Vec<Port>, ValidationError> {
    let invalid = || ValidationError::InvalidPortRange(s.to_string());

    let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
    let start: u32 = start.trim().parse().map_err(|_| invalid())?;
    let end: u32 = end.trim().parse().map_err(|_| invalid())?;

    if start == 0 || start > end || end > u32::from(Port::MAX) {
        return Err(invalid());
    }

    Ok((start..=end).map(|p| Port(p as u16)).collect())
}

/// Parse a comma-separated list, each entry in `(0, 65535]`.
fn parse_list(s: &str) -> Result<Vec<Port>, ValidationError> {
    let invalid = || ValidationError::InvalidPortList(s.to_string());

    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let value: u32 = p.parse().map_err(|_| invalid())?;
            if value == 0 || value > u32::from(Port::MAX) {
                return Err(invalid());
            }
            Ok(Port(value as u16))
        })
        .collect()
}
