//! Validated scan requests.
//!
//! A `ScanRequest` can only be obtained through [`ScanRequest::new`] or
//! [`ScanRequest::normalize`], both of which enforce every bound, so a value
//! of this type is always safe to hand to a session.

use super::port::{Port, PortMode};
use crate::error::ValidationError;
use serde::Serialize;
use std::time::Duration;

/// An immutable, fully validated scan request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRequest {
    target: String,
    ports: Vec<Port>,
    concurrency: usize,
    timeout_secs: f64,
    skip_discovery: bool,
}

impl ScanRequest {
    /// Maximum number of simultaneous probes.
    pub const MAX_CONCURRENCY: usize = 500;
    /// Maximum per-probe timeout in seconds.
    pub const MAX_TIMEOUT_SECS: f64 = 10.0;

    /// Build a request from typed values.
    pub fn new(
        target: &str,
        ports: Vec<Port>,
        concurrency: usize,
        timeout_secs: f64,
        skip_discovery: bool,
    ) -> Result<Self, ValidationError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if ports.is_empty() {
            return Err(ValidationError::NoPorts);
        }
        if !(1..=Self::MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ValidationError::ConcurrencyOutOfRange(concurrency.to_string()));
        }
        // Written this way so NaN is rejected too.
        if !(timeout_secs > 0.0 && timeout_secs <= Self::MAX_TIMEOUT_SECS) {
            return Err(ValidationError::TimeoutOutOfRange(timeout_secs.to_string()));
        }

        Ok(Self {
            target: target.to_string(),
            ports,
            concurrency,
            timeout_secs,
            skip_discovery,
        })
    }

    /// Validate and convert raw scan parameters.
    ///
    /// Checks run in order: target, ports, concurrency, timeout. The first
    /// failure is returned.
    pub fn normalize(
        raw_target: &str,
        port_mode: PortMode,
        custom_ports: &str,
        raw_concurrency: &str,
        raw_timeout: &str,
        skip_discovery: bool,
    ) -> Result<Self, ValidationError> {
        if raw_target.trim().is_empty() {
            return Err(ValidationError::EmptyTarget);
        }

        let ports = port_mode.resolve(custom_ports)?;

        let concurrency: usize = raw_concurrency
            .trim()
            .parse()
            .map_err(|_| ValidationError::ConcurrencyOutOfRange(raw_concurrency.to_string()))?;

        let timeout_secs: f64 = raw_timeout
            .trim()
            .parse()
            .map_err(|_| ValidationError::TimeoutOutOfRange(raw_timeout.to_string()))?;

        Self::new(raw_target, ports, concurrency, timeout_secs, skip_discovery)
    }

    /// The target exactly as given, trimmed.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Ports in probe order; duplicates are preserved.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Number of concurrent workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-probe connect timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// Per-probe timeout in seconds, as requested.
    pub fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    /// Whether CIDR targets are enumerated instead of ARP-probed.
    pub fn skip_discovery(&self) -> bool {
        self.skip_discovery
    }

    /// Whether this request needs ARP discovery to resolve its hosts.
    pub fn needs_discovery(&self) -> bool {
        self.target.contains('/') && !self.skip_discovery
    }
}
