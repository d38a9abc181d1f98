//! The worker pool.
//!
//! A fixed number of workers drain the shared task queue, probing each task
//! and writing material results to the event log. Workers poll the queue
//! with a short interval so a raised stop signal is noticed promptly.

use super::cancel::StopSignal;
use super::queue::{Pop, TaskQueue};
use super::traits::{ProbeResult, Prober, ScanTask};
use crate::session::EventLog;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Snapshot of scan progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Tasks enqueued.
    pub total: usize,
    /// Tasks probed so far.
    pub completed: usize,
    /// Open ports found so far.
    pub open: usize,
}

/// Live progress counters shared with workers.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: AtomicUsize,
    completed: AtomicUsize,
    open: AtomicUsize,
}

impl ProgressCounters {
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn record(&self, result: &ProbeResult) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if result.is_open() {
            self.open.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Relaxed),
        }
    }
}

/// Everything a worker needs, shared across the pool.
#[derive(Clone)]
pub struct PoolContext {
    pub queue: Arc<TaskQueue>,
    pub stop: StopSignal,
    pub log: Arc<EventLog>,
    pub prober: Arc<dyn Prober>,
    pub progress: Arc<ProgressCounters>,
    /// Upper bound on a single wait for the next task.
    pub poll_interval: Duration,
}

/// A running set of workers.
pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `count` workers on the current runtime.
    pub fn spawn(count: usize, ctx: PoolContext) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..count {
            workers.spawn(worker(id, ctx.clone()));
        }
        Self { workers }
    }

    /// Number of workers not yet joined.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit.
    ///
    /// Cancel-safe: workers joined before cancellation stay joined.
    pub async fn join(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker task failed");
            }
        }
    }

    /// Wait up to `grace` for the workers, then abandon the rest.
    ///
    /// Abandoned workers are detached, not aborted: each still finishes its
    /// in-flight probe, bounded by the probe timeout. Returns how many were
    /// abandoned.
    pub async fn join_within(mut self, grace: Duration) -> usize {
        let _ = tokio::time::timeout(grace, self.join()).await;
        let abandoned = self.workers.len();
        self.workers.detach_all();
        abandoned
    }
}

async fn worker(id: usize, ctx: PoolContext) {
    loop {
        if ctx.stop.is_stopped() {
            break;
        }
        match ctx.queue.pop(ctx.poll_interval).await {
            Pop::Task(task) => {
                if ctx.stop.is_stopped() {
                    debug!(worker = id, task = %task, "discarding task after stop");
                    break;
                }
                let result = ctx.prober.probe(&task).await;
                ctx.progress.record(&result);
                report(&ctx.log, &task, result);
            }
            Pop::Empty => continue,
            Pop::Closed => break,
        }
    }
    debug!(worker = id, "worker exiting");
}

/// Write the material part of a probe result to the log.
fn report(log: &EventLog, task: &ScanTask, result: ProbeResult) {
    match result {
        ProbeResult::Open(service) => log.success(format!(
            "  [+] IP: {} - Port {} is OPEN ({})",
            task.host, task.port, service
        )),
        ProbeResult::Error(e) => log.error(format!(
            "  [!] Error scanning {}:{} - {}",
            task.host, task.port, e.reason
        )),
        ProbeResult::Closed => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::scanner::TaskGrid;
    use crate::types::Port;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    /// Marks even ports open and records every probe it receives.
    #[derive(Default)]
    struct RecordingProber {
        seen: Mutex<Vec<u16>>,
        delay: Duration,
    }

    #[async_trait]
    impl Prober for RecordingProber {
        async fn probe(&self, task: &ScanTask) -> ProbeResult {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let port = task.port.as_u16();
            self.seen.lock().unwrap().push(port);
            match port {
                13 => ProbeResult::Error(ProbeError {
                    host: task.host.to_string(),
                    port,
                    reason: "no route to host".to_string(),
                }),
                p if p % 2 == 0 => ProbeResult::Open("test".to_string()),
                _ => ProbeResult::Closed,
            }
        }
    }

    fn context(prober: Arc<RecordingProber>, ports: std::ops::RangeInclusive<u16>) -> PoolContext {
        let queue = Arc::new(TaskQueue::new());
        let grid = TaskGrid::new(
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            ports.filter_map(Port::new).collect(),
            Duration::from_millis(100),
        );
        let progress = Arc::new(ProgressCounters::default());
        progress.set_total(queue.push(grid));
        queue.close();

        PoolContext {
            queue,
            stop: StopSignal::new(),
            log: Arc::new(EventLog::new()),
            prober,
            progress,
            poll_interval: Duration::from_millis(20),
        }
    }

    fn open_lines(log: &EventLog) -> Vec<String> {
        log.snapshot()
            .into_iter()
            .map(|l| l.text)
            .filter(|t| t.contains("is OPEN"))
            .collect()
    }

    #[tokio::test]
    async fn test_pool_covers_every_task_once() {
        for concurrency in [1, 5, 64] {
            let prober = Arc::new(RecordingProber::default());
            let ctx = context(Arc::clone(&prober), 1..=40);
            let log = Arc::clone(&ctx.log);
            let progress = Arc::clone(&ctx.progress);

            let mut pool = WorkerPool::spawn(concurrency, ctx);
            pool.join().await;

            let mut seen = prober.seen.lock().unwrap().clone();
            seen.sort_unstable();
            assert_eq!(seen, (1..=40).collect::<Vec<u16>>(), "concurrency {concurrency}");

            let open: HashSet<String> = open_lines(&log).into_iter().collect();
            assert_eq!(open.len(), 20);
            assert_eq!(
                progress.snapshot(),
                Progress {
                    total: 40,
                    completed: 40,
                    open: 20
                }
            );
        }
    }

    #[tokio::test]
    async fn test_closed_dropped_errors_logged() {
        let prober = Arc::new(RecordingProber::default());
        let ctx = context(prober, 13..=13);
        let log = Arc::clone(&ctx.log);

        let mut pool = WorkerPool::spawn(2, ctx);
        pool.join().await;

        let lines = log.snapshot();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].text,
            "  [!] Error scanning 127.0.0.1:13 - no route to host"
        );
    }

    #[tokio::test]
    async fn test_open_line_format() {
        let prober = Arc::new(RecordingProber::default());
        let ctx = context(prober, 22..=22);
        let log = Arc::clone(&ctx.log);

        let mut pool = WorkerPool::spawn(1, ctx);
        pool.join().await;

        assert_eq!(
            open_lines(&log),
            vec!["  [+] IP: 127.0.0.1 - Port 22 is OPEN (test)"]
        );
    }

    #[tokio::test]
    async fn test_stop_leaves_queue_unconsumed() {
        let prober = Arc::new(RecordingProber {
            seen: Mutex::new(Vec::new()),
            delay: Duration::from_millis(50),
        });
        let ctx = context(Arc::clone(&prober), 1..=1000);
        let queue = Arc::clone(&ctx.queue);
        let stop = ctx.stop.clone();

        let pool = WorkerPool::spawn(4, ctx);
        tokio::time::sleep(Duration::from_millis(80)).await;
        stop.stop();
        queue.clear();

        let abandoned = pool.join_within(Duration::from_secs(1)).await;
        assert_eq!(abandoned, 0);
        assert!(prober.seen.lock().unwrap().len() < 1000);
    }

    #[tokio::test]
    async fn test_more_workers_than_tasks() {
        let prober = Arc::new(RecordingProber::default());
        let ctx = context(Arc::clone(&prober), 1..=3);

        let mut pool = WorkerPool::spawn(50, ctx);
        tokio::time::timeout(Duration::from_secs(2), pool.join())
            .await
            .expect("workers exit once the queue is empty");
        assert!(pool.is_empty());
        assert_eq!(prober.seen.lock().unwrap().len(), 3);
    }
}
