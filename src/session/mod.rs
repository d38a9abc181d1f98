//! Scan sessions.
//!
//! [`ScanEngine`] owns at most one live session. Each session carries its own
//! event log, stop signal and queue, so starting a new session always begins
//! from an empty log.

mod engine;
mod log;
mod report;
mod state;

pub use engine::{ScanEngine, SessionHandle};
pub use log::{EventLog, LogLine, Severity};
pub use report::{Outcome, ScanReport, COMPLETED_MARKER, STOPPED_MARKER};
pub use state::SessionState;

use crate::discovery::ArpDiscovery;
use crate::error::SessionResult;
use crate::types::{PortMode, ScanRequest};
use std::sync::Arc;
use std::time::Duration;

/// How long ARP replies are collected after the last request is sent.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(3);
/// Extra time granted to workers beyond one probe timeout when stopping.
pub const DEFAULT_GRACE_MARGIN: Duration = Duration::from_secs(1);
/// Upper bound on a single worker wait for the next task.
pub const DEFAULT_QUEUE_POLL: Duration = Duration::from_millis(100);

/// Engine-wide session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub discovery_window: Duration,
    pub grace_margin: Duration,
    pub queue_poll: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            discovery_window: DEFAULT_DISCOVERY_WINDOW,
            grace_margin: DEFAULT_GRACE_MARGIN,
            queue_poll: DEFAULT_QUEUE_POLL,
        }
    }
}

/// Run one scan to completion and return its full log as text.
///
/// Validation and resolution failures are returned as errors; everything
/// else the session logged is in the returned string, one line per entry.
pub async fn scan_headless(
    target: &str,
    port_mode: PortMode,
    custom_ports: &str,
    concurrency: usize,
    timeout_secs: f64,
    skip_discovery: bool,
    arp: Arc<dyn ArpDiscovery>,
) -> SessionResult<String> {
    let request = ScanRequest::normalize(
        target,
        port_mode,
        custom_ports,
        &concurrency.to_string(),
        &timeout_secs.to_string(),
        skip_discovery,
    )?;

    let engine = ScanEngine::new(arp);
    let handle = engine.start(request)?;
    let report = handle.await_completion().await?;
    Ok(report.to_string())
}
