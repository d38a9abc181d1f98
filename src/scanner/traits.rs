//! Prober trait abstraction.
//!
//! Defines the unit of work handed to workers and the interface a probe
//! technique implements, so the worker pool can be driven by any prober.

use crate::error::ProbeError;
use crate::types::Port;
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// One host/port pair to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTask {
    pub host: IpAddr,
    pub port: Port,
    pub timeout: Duration,
}

impl ScanTask {
    pub fn new(host: IpAddr, port: Port, timeout: Duration) -> Self {
        Self {
            host,
            port,
            timeout,
        }
    }
}

impl fmt::Display for ScanTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of probing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// Connection established; carries the service name.
    Open(String),
    /// Refused or timed out. Never reported.
    Closed,
    /// Any other failure.
    Error(ProbeError),
}

impl ProbeResult {
    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Trait for probe implementations.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe a single task, bounded by `task.timeout`.
    async fn probe(&self, task: &ScanTask) -> ProbeResult;
}
