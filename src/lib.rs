//! # lanscan - LAN Host Discovery and Port Scanning
//!
//! lanscan finds the live hosts of a local network with ARP, or takes an
//! explicit list of addresses, and probes their TCP ports with a bounded
//! pool of async workers. Everything a scan does is written to an ordered
//! event log that callers poll while the scan runs.
//!
//! ## Features
//!
//! - **Host Discovery**: ARP sweeps over raw datalink channels
//! - **TCP Connect Probing**: No privileges needed for the port scan itself
//! - **Bounded Concurrency**: 1-500 workers draining one shared queue
//! - **Graceful Cancellation**: Stop requests are honored within one probe timeout
//! - **Multiple Output Formats**: Streamed plain text and JSON reports
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use lanscan::discovery::ArpUnavailable;
//! use lanscan::session::ScanEngine;
//! use lanscan::types::{PortMode, ScanRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let request = ScanRequest::normalize("127.0.0.1", PortMode::Common, "", "50", "0.5", false)?;
//!     let engine = ScanEngine::new(Arc::new(ArpUnavailable::new("not needed")));
//!     let report = engine.start(request)?.await_completion().await?;
//!
//!     for line in report.open_lines() {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Validated requests, ports and target specifications
//! - [`discovery`] - ARP discovery and target resolution
//! - [`scanner`] - Task queue, worker pool, TCP prober and stop signal
//! - [`session`] - The engine, session lifecycle and event log
//! - [`config`] - Engine settings
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod scanner;
pub mod services;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use error::{ResolveError, SessionError, ValidationError};
pub use session::{scan_headless, ScanEngine, ScanReport, SessionHandle, SessionState};
pub use types::{Port, PortMode, ScanRequest, SessionId, TargetSpec};
