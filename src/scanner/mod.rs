//! Scanner module - the probing half of a scan.
//!
//! This module owns the task queue, the worker pool that drains it, the
//! TCP connect prober and the stop signal that every participant watches.

pub mod cancel;
pub mod pool;
pub mod queue;
pub mod tcp;
pub mod traits;

pub use cancel::StopSignal;
pub use pool::{PoolContext, Progress, ProgressCounters, WorkerPool};
pub use queue::{Pop, TaskGrid, TaskQueue};
pub use tcp::TcpConnectProber;
pub use traits::{ProbeResult, Prober, ScanTask};
