//! The scan engine and its sessions.
//!
//! A session is one scan request followed through its lifecycle. The
//! orchestrator task resolves the target, fills the queue, runs the worker
//! pool and settles the final state. The caller only ever holds a
//! [`SessionHandle`].

use super::log::{EventLog, LogLine, Severity};
use super::report::{Outcome, ScanReport, COMPLETED_MARKER, STOPPED_MARKER};
use super::state::SessionState;
use super::SessionOptions;
use crate::discovery::{capability_notice, ArpDiscovery, Resolver};
use crate::error::{ResolveError, SessionError, SessionResult};
use crate::scanner::{
    PoolContext, Progress, ProgressCounters, Prober, StopSignal, TaskGrid, TaskQueue,
    TcpConnectProber, WorkerPool,
};
use crate::types::{ScanRequest, SessionId};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

const STOP_REQUESTED: &str =
    "[INFO] Stop signal sent. Waiting for workers to finish current tasks...";
const CLEARING_QUEUE: &str =
    "[INFO] Attempting to clear remaining port scan queue due to stop signal...";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs at most one scan session at a time.
pub struct ScanEngine {
    arp: Arc<dyn ArpDiscovery>,
    prober: Arc<dyn Prober>,
    options: SessionOptions,
    current: Mutex<Option<SessionHandle>>,
}

impl ScanEngine {
    /// Engine probing over TCP connect, with default options.
    pub fn new(arp: Arc<dyn ArpDiscovery>) -> Self {
        Self::with_options(arp, SessionOptions::default())
    }

    pub fn with_options(arp: Arc<dyn ArpDiscovery>, options: SessionOptions) -> Self {
        Self {
            arp,
            prober: Arc::new(TcpConnectProber::new()),
            options,
            current: Mutex::new(None),
        }
    }

    /// Replace the prober used by later sessions.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Start a session for `request` and return immediately.
    ///
    /// Fails with [`SessionError::AlreadyRunning`] while another session is
    /// not yet terminal, and with a capability error when the request needs
    /// ARP discovery this process cannot perform. Must be called from within
    /// a tokio runtime.
    pub fn start(&self, request: ScanRequest) -> SessionResult<SessionHandle> {
        let mut current = lock(&self.current);
        if let Some(running) = current.as_ref() {
            if !running.state().is_terminal() {
                return Err(SessionError::AlreadyRunning);
            }
        }

        if request.needs_discovery() {
            if let Err(e) = self.arp.check_capability() {
                warn!(error = %e, target = request.target(), "refusing discovery scan");
                return Err(e.into());
            }
        }

        let session = Arc::new(Session::new(request, self.options));
        session.log.info("--- Starting Scan ---");
        session.log.append(capability_notice(self.arp.as_ref()));
        session.advance(SessionState::Discovering, None);

        let span = info_span!("session", id = %session.id.short());
        tokio::spawn(
            Arc::clone(&session)
                .run(Arc::clone(&self.arp), Arc::clone(&self.prober))
                .instrument(span),
        );

        let handle = SessionHandle { session };
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// The most recently started session, if any.
    pub fn current(&self) -> Option<SessionHandle> {
        lock(&self.current).clone()
    }

    /// Stop the current session. Returns whether a stop was newly requested.
    pub fn request_stop(&self) -> bool {
        self.current().is_some_and(|s| s.request_stop())
    }
}

struct Session {
    id: SessionId,
    request: ScanRequest,
    options: SessionOptions,
    stop: StopSignal,
    log: Arc<EventLog>,
    queue: Arc<TaskQueue>,
    progress: Arc<ProgressCounters>,
    state: watch::Sender<SessionState>,
    failure: Mutex<Option<ResolveError>>,
}

impl Session {
    fn new(request: ScanRequest, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            id: SessionId::new(),
            request,
            options,
            stop: StopSignal::new(),
            log: Arc::new(EventLog::new()),
            queue: Arc::new(TaskQueue::new()),
            progress: Arc::new(ProgressCounters::default()),
            state,
            failure: Mutex::new(None),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move to `next` if the state machine allows it, logging `line` in the
    /// same step. Returns whether the transition happened.
    fn advance(&self, next: SessionState, line: Option<LogLine>) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if !state.can_advance_to(next) {
                return false;
            }
            *state = next;
            if let Some(line) = line {
                self.log.append(line);
            }
            true
        });
        if moved {
            debug!(state = %next, "session state changed");
        }
        moved
    }

    async fn run(self: Arc<Self>, arp: Arc<dyn ArpDiscovery>, prober: Arc<dyn Prober>) {
        let resolved = Resolver::new(
            arp.as_ref(),
            &self.log,
            &self.stop,
            self.options.discovery_window,
        )
        .resolve(&self.request)
        .await;

        match resolved {
            Ok(resolution) if !resolution.stopped => self.scan(resolution.hosts, prober).await,
            Ok(_) => self.finish_stopped(None).await,
            Err(e) => self.fail(e).await,
        }
    }

    async fn scan(&self, hosts: Vec<IpAddr>, prober: Arc<dyn Prober>) {
        if !self.advance(SessionState::Scanning, None) {
            return self.finish_stopped(None).await;
        }

        let ports = self.request.ports();
        let host_count = hosts.len();
        self.log.info(format!(
            "[*] Starting port scan on {} host(s) for {} port(s) each...",
            host_count,
            ports.len()
        ));
        self.log.info(format!(
            "     Concurrency: {}, Timeout: {}s",
            self.request.concurrency(),
            self.request.timeout_secs()
        ));

        let grid = TaskGrid::new(hosts, ports.to_vec(), self.request.timeout());
        self.progress.set_total(self.queue.push(grid));
        self.queue.close();
        info!(
            hosts = host_count,
            ports = ports.len(),
            workers = self.request.concurrency(),
            "port scan started"
        );

        let mut pool = WorkerPool::spawn(
            self.request.concurrency(),
            PoolContext {
                queue: Arc::clone(&self.queue),
                stop: self.stop.clone(),
                log: Arc::clone(&self.log),
                prober,
                progress: Arc::clone(&self.progress),
                poll_interval: self.options.queue_poll,
            },
        );

        let drained = tokio::select! {
            biased;
            _ = self.stop.stopped() => false,
            _ = self.queue.drained() => true,
        };
        if !drained || !self.advance(SessionState::Draining, None) {
            return self.finish_stopped(Some(pool)).await;
        }

        let joined = tokio::select! {
            biased;
            _ = self.stop.stopped() => false,
            _ = pool.join() => true,
        };
        let completed = joined
            && self.advance(
                SessionState::Completed,
                Some(LogLine::new(Severity::Info, COMPLETED_MARKER)),
            );
        if !completed {
            return self.finish_stopped(Some(pool)).await;
        }

        let progress = self.progress.snapshot();
        info!(probed = progress.completed, open = progress.open, "scan completed");
    }

    /// Cancellation path. `pool` is present once workers were started.
    async fn finish_stopped(&self, pool: Option<WorkerPool>) {
        self.advance(SessionState::Stopping, None);
        self.stop.stop();

        if let Some(pool) = pool {
            self.log.warning(CLEARING_QUEUE);
            let discarded = self.queue.clear();
            let grace = self.request.timeout() + self.options.grace_margin;
            let abandoned = pool.join_within(grace).await;
            debug!(discarded, abandoned, "worker pool wound down");
            if abandoned > 0 {
                warn!(abandoned, "workers did not exit within the grace period");
                self.log.warning(format!(
                    "[WARNING] {abandoned} worker(s) did not finish within {:.1}s and were abandoned.",
                    grace.as_secs_f64()
                ));
            }
        }

        self.advance(
            SessionState::Stopped,
            Some(LogLine::new(Severity::Warning, STOPPED_MARKER)),
        );
        info!("scan stopped");
    }

    async fn fail(&self, error: ResolveError) {
        *lock(&self.failure) = Some(error.clone());
        let failed = !self.stop.is_stopped()
            && self.advance(
                SessionState::Failed,
                Some(LogLine::new(Severity::Info, COMPLETED_MARKER)),
            );
        if !failed {
            return self.finish_stopped(None).await;
        }
        warn!(error = %error, "target resolution failed");
    }
}

/// Caller-side view of a session.
///
/// Cheap to clone; every clone observes the same session.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn request(&self) -> &ScanRequest {
        &self.session.request
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn progress(&self) -> Progress {
        self.session.progress.snapshot()
    }

    /// Request cancellation.
    ///
    /// Only the first call on a running session has an effect; it returns
    /// `true` and logs the stop notice. Later calls, and calls on a
    /// terminal session, return `false`.
    pub fn request_stop(&self) -> bool {
        let session = &self.session;
        let requested = session.advance(
            SessionState::Stopping,
            Some(LogLine::new(Severity::Warning, STOP_REQUESTED)),
        );
        if requested {
            session.stop.stop();
            info!(session = %session.id.short(), "stop requested");
        }
        requested
    }

    /// Lines logged since the previous poll.
    pub fn poll_log(&self) -> Vec<LogLine> {
        self.session.log.poll()
    }

    /// Every line logged so far.
    pub fn log_snapshot(&self) -> Vec<LogLine> {
        self.session.log.snapshot()
    }

    /// Take the lines not yet polled out of the log, emptying it.
    pub fn drain_log(&self) -> Vec<LogLine> {
        self.session.log.drain()
    }

    /// Wait for the session to reach a terminal state.
    ///
    /// A session that failed to resolve its target yields the resolution
    /// error; completed and stopped sessions yield their report.
    pub async fn await_completion(&self) -> SessionResult<ScanReport> {
        let mut states = self.session.state.subscribe();
        let state = states
            .wait_for(|s| s.is_terminal())
            .await
            .map(|s| *s)
            .unwrap_or_else(|_| self.state());

        match Outcome::from_state(state) {
            Some(outcome) => Ok(ScanReport {
                session: self.session.id,
                outcome,
                progress: self.progress(),
                lines: self.log_snapshot(),
            }),
            None => {
                let failure = lock(&self.session.failure).clone();
                Err(failure.unwrap_or(ResolveError::NoHostsFound).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ArpUnavailable;
    use crate::scanner::{ProbeResult, ScanTask};
    use crate::types::Port;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Opens every port after a fixed delay.
    struct SlowProber(Duration);

    #[async_trait]
    impl Prober for SlowProber {
        async fn probe(&self, _task: &ScanTask) -> ProbeResult {
            tokio::time::sleep(self.0).await;
            ProbeResult::Open("test".to_string())
        }
    }

    fn engine(delay: Duration) -> ScanEngine {
        let options = SessionOptions {
            queue_poll: Duration::from_millis(10),
            ..SessionOptions::default()
        };
        ScanEngine::with_options(Arc::new(ArpUnavailable::new("test")), options)
            .with_prober(Arc::new(SlowProber(delay)))
    }

    fn request(ports: u16, concurrency: usize) -> ScanRequest {
        let ports = (1..=ports).filter_map(Port::new).collect();
        ScanRequest::new("127.0.0.1", ports, concurrency, 0.5, false).unwrap()
    }

    #[tokio::test]
    async fn test_session_completes() {
        let engine = engine(Duration::ZERO);
        let handle = engine.start(request(10, 3)).unwrap();
        let report = handle.await_completion().await.unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(handle.state(), SessionState::Completed);
        assert_eq!(report.open_lines().count(), 10);
        assert_eq!(report.lines.first().unwrap().text, "--- Starting Scan ---");
        assert_eq!(report.lines.last().unwrap().text, COMPLETED_MARKER);
        assert_eq!(report.progress.completed, 10);
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let engine = engine(Duration::from_millis(200));
        let first = engine.start(request(20, 1)).unwrap();

        assert!(matches!(
            engine.start(request(1, 1)),
            Err(SessionError::AlreadyRunning)
        ));

        assert!(first.request_stop());
        first.await_completion().await.unwrap();
        assert!(engine.start(request(1, 1)).is_ok());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = engine(Duration::from_millis(100));
        let handle = engine.start(request(50, 2)).unwrap();

        assert!(handle.request_stop());
        assert!(!handle.request_stop());
        assert!(!engine.request_stop());

        let report = handle.await_completion().await.unwrap();
        assert_eq!(report.outcome, Outcome::Stopped);
        let notices = report
            .lines
            .iter()
            .filter(|l| l.text == STOP_REQUESTED)
            .count();
        assert_eq!(notices, 1);
        assert_eq!(report.lines.last().unwrap().text, STOPPED_MARKER);
    }

    #[tokio::test]
    async fn test_stop_after_completion_is_noop() {
        let engine = engine(Duration::ZERO);
        let handle = engine.start(request(2, 2)).unwrap();
        handle.await_completion().await.unwrap();

        assert!(!handle.request_stop());
        assert_eq!(handle.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_failed_resolution_surfaces_error() {
        let engine = engine(Duration::ZERO);
        let bad = ScanRequest::new("not-an-ip", vec![Port::new(80).unwrap()], 1, 0.5, false)
            .unwrap();
        let handle = engine.start(bad).unwrap();

        let err = handle.await_completion().await.unwrap_err();
        assert_eq!(err, SessionError::Resolve(ResolveError::AllTargetsInvalid));
        assert_eq!(handle.state(), SessionState::Failed);
        let lines = handle.log_snapshot();
        assert_eq!(lines.last().unwrap().text, COMPLETED_MARKER);
    }

    #[tokio::test]
    async fn test_discovery_refused_without_capability() {
        let engine = engine(Duration::ZERO);
        let cidr = ScanRequest::new("10.0.0.0/30", vec![Port::new(80).unwrap()], 1, 0.5, false)
            .unwrap();

        assert!(matches!(
            engine.start(cidr),
            Err(SessionError::Resolve(ResolveError::CapabilityUnavailable(_)))
        ));
        assert!(engine.current().is_none());
    }
}
