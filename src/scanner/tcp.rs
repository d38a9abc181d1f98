//! TCP connect prober.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API. A completed handshake means the port is open; the socket is
//! closed again immediately.

use crate::error::ProbeError;
use crate::scanner::traits::{ProbeResult, Prober, ScanTask};
use crate::services::service_name;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect prober.
///
/// Does not require elevated privileges.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpConnectProber {
    async fn probe(&self, task: &ScanTask) -> ProbeResult {
        let port = task.port.as_u16();
        let addr = SocketAddr::new(task.host, port);

        match timeout(task.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeResult::Open(service_name(port).to_string())
            }
            Ok(Err(e)) => classify_error(task, &e),
            // Dropping the pending connect future closes its socket.
            Err(_) => ProbeResult::Closed,
        }
    }
}

/// Refusals and timeouts are ordinary closed ports; anything else is
/// reported.
fn classify_error(task: &ScanTask, e: &io::Error) -> ProbeResult {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => ProbeResult::Closed,
        _ => ProbeResult::Error(ProbeError {
            host: task.host.to_string(),
            port: task.port.as_u16(),
            reason: e.to_string(),
        }),
    }
}
