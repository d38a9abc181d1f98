//! End-to-end session behavior: resolution, probing, cancellation.

use async_trait::async_trait;
use futures::future::join_all;
use ipnetwork::Ipv4Network;
use lanscan::discovery::{ArpDiscovery, ArpReply, ArpUnavailable};
use lanscan::error::{ResolveError, SessionError};
use lanscan::scanner::{ProbeResult, Prober, ScanTask, StopSignal};
use lanscan::session::{
    Outcome, ScanEngine, SessionOptions, SessionState, COMPLETED_MARKER, STOPPED_MARKER,
};
use lanscan::types::{PortMode, ScanRequest};
use pnet::datalink::MacAddr;
use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Records every probe; ports in `open` are reported open.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(IpAddr, u16)>>,
    open: HashSet<u16>,
    delay: Duration,
}

impl Recorder {
    fn opening(ports: &[u16]) -> Self {
        Self {
            open: ports.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn seen(&self) -> Vec<(IpAddr, u16)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for Recorder {
    async fn probe(&self, task: &ScanTask) -> ProbeResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let port = task.port.as_u16();
        self.seen.lock().unwrap().push((task.host, port));
        if self.open.contains(&port) {
            ProbeResult::Open("test".to_string())
        } else {
            ProbeResult::Closed
        }
    }
}

/// ARP capability with scripted replies.
struct FakeArp {
    replies: Vec<ArpReply>,
    wait_for_stop: bool,
}

#[async_trait]
impl ArpDiscovery for FakeArp {
    fn check_capability(&self) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn discover(
        &self,
        _network: Ipv4Network,
        _window: Duration,
        stop: &StopSignal,
    ) -> Result<Vec<ArpReply>, ResolveError> {
        if self.wait_for_stop {
            stop.stopped().await;
        }
        Ok(self.replies.clone())
    }
}

fn options() -> SessionOptions {
    SessionOptions {
        discovery_window: Duration::from_millis(50),
        grace_margin: Duration::from_millis(500),
        queue_poll: Duration::from_millis(20),
    }
}

fn unavailable() -> Arc<dyn ArpDiscovery> {
    Arc::new(ArpUnavailable::new("raw sockets not permitted"))
}

fn list_request(target: &str, ports: &str, concurrency: &str, timeout: &str) -> ScanRequest {
    ScanRequest::normalize(target, PortMode::List, ports, concurrency, timeout, false).unwrap()
}

/// Bind listeners that accept and drop connections in the background.
async fn listeners(count: usize) -> Vec<u16> {
    let bound = join_all((0..count).map(|_| TcpListener::bind("127.0.0.1:0"))).await;
    let mut ports = Vec::new();
    for listener in bound {
        let listener = listener.unwrap();
        ports.push(listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });
    }
    ports
}

/// A port nothing listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn joined(ports: &[u16]) -> String {
    ports.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
}

#[tokio::test]
async fn test_open_port_reported_closed_port_silent() {
    let open = listeners(1).await[0];
    let closed = closed_port().await;

    let engine = ScanEngine::with_options(unavailable(), options());
    let handle = engine
        .start(list_request("127.0.0.1", &joined(&[open, closed]), "2", "0.5"))
        .unwrap();
    let report = handle.await_completion().await.unwrap();

    let open_lines: Vec<&str> = report.open_lines().map(|l| l.text.as_str()).collect();
    assert_eq!(open_lines.len(), 1);
    assert!(open_lines[0].starts_with(&format!("  [+] IP: 127.0.0.1 - Port {open} is OPEN (")));
    assert!(report
        .lines
        .iter()
        .all(|l| !l.text.contains(&format!(":{closed} "))));
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.lines.last().unwrap().text, COMPLETED_MARKER);
}

#[tokio::test]
async fn test_open_set_independent_of_concurrency() {
    let open = listeners(3).await;
    let mut ports = open.clone();
    ports.push(closed_port().await);
    ports.push(closed_port().await);

    let mut sets = Vec::new();
    for concurrency in ["1", "500"] {
        let engine = ScanEngine::with_options(unavailable(), options());
        let report = engine
            .start(list_request("127.0.0.1", &joined(&ports), concurrency, "0.5"))
            .unwrap()
            .await_completion()
            .await
            .unwrap();
        let set: BTreeSet<String> = report.open_lines().map(|l| l.text.clone()).collect();
        sets.push(set);
    }

    assert_eq!(sets[0].len(), 3);
    assert_eq!(sets[0], sets[1]);
}

#[tokio::test]
async fn test_duplicate_ports_probed_twice() {
    let prober = Arc::new(Recorder::opening(&[80]));
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober.clone());

    let report = engine
        .start(list_request("10.0.0.7", "80,443,80", "1", "0.5"))
        .unwrap()
        .await_completion()
        .await
        .unwrap();

    let ports: Vec<u16> = prober.seen().into_iter().map(|(_, p)| p).collect();
    assert_eq!(ports, vec![80, 443, 80]);
    assert_eq!(report.open_lines().count(), 2);
    assert_eq!(report.progress.total, 3);
}

#[tokio::test]
async fn test_cidr_discovery_without_capability() {
    let prober = Arc::new(Recorder::default());
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober.clone());
    let request = ScanRequest::normalize(
        "192.168.1.0/24",
        PortMode::Common,
        "",
        "10",
        "0.5",
        false,
    )
    .unwrap();

    let err = engine.start(request).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Resolve(ResolveError::CapabilityUnavailable(_))
    ));
    assert!(prober.seen().is_empty());
}

#[tokio::test]
async fn test_cidr_enumeration_skips_network_and_broadcast() {
    let prober = Arc::new(Recorder::default());
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober.clone());
    let request =
        ScanRequest::normalize("192.168.1.0/30", PortMode::List, "22", "4", "0.5", true).unwrap();

    engine.start(request).unwrap().await_completion().await.unwrap();

    let hosts: BTreeSet<IpAddr> = prober.seen().into_iter().map(|(h, _)| h).collect();
    let expected: BTreeSet<IpAddr> = [
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
    ]
    .into_iter()
    .collect();
    assert_eq!(hosts, expected);
}

#[tokio::test]
async fn test_discovered_hosts_are_scanned() {
    let arp = Arc::new(FakeArp {
        replies: vec![
            ArpReply {
                ip: Ipv4Addr::new(192, 168, 1, 20),
                mac: MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 0x20),
            },
            ArpReply {
                ip: Ipv4Addr::new(192, 168, 1, 5),
                mac: MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 0x05),
            },
        ],
        wait_for_stop: false,
    });
    let prober = Arc::new(Recorder::opening(&[22]));
    let engine = ScanEngine::with_options(arp, options()).with_prober(prober.clone());
    let request =
        ScanRequest::normalize("192.168.1.0/24", PortMode::List, "22,80", "8", "0.5", false)
            .unwrap();

    let report = engine.start(request).unwrap().await_completion().await.unwrap();

    assert_eq!(prober.seen().len(), 4);
    let texts: Vec<&str> = report.lines.iter().map(|l| l.text.as_str()).collect();
    assert!(texts.contains(&"[*] Found 2 live host(s):"));
    assert!(texts.contains(&"  - 192.168.1.20 (aa:bb:cc:00:00:20)"));
    assert!(texts.contains(&"[*] Starting port scan on 2 host(s) for 2 port(s) each..."));
    assert_eq!(report.open_lines().count(), 2);
}

#[tokio::test]
async fn test_stop_during_discovery() {
    let arp = Arc::new(FakeArp {
        replies: Vec::new(),
        wait_for_stop: true,
    });
    let prober = Arc::new(Recorder::default());
    let engine = ScanEngine::with_options(arp, options()).with_prober(prober.clone());
    let request =
        ScanRequest::normalize("192.168.1.0/24", PortMode::Common, "", "8", "0.5", false)
            .unwrap();

    let handle = engine.start(request).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), SessionState::Discovering);
    assert!(handle.request_stop());

    let report = handle.await_completion().await.unwrap();
    let texts: Vec<&str> = report.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(report.outcome, Outcome::Stopped);
    assert!(texts.contains(&"[INFO] Scan stopped during host discovery."));
    assert!(texts.iter().all(|t| !t.starts_with("[*] Starting port scan")));
    assert_eq!(*texts.last().unwrap(), STOPPED_MARKER);
    assert!(prober.seen().is_empty());
}

#[tokio::test]
async fn test_stop_is_prompt_and_idempotent() {
    let prober = Arc::new(Recorder::slow(Duration::from_millis(300)));
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober.clone());
    let handle = engine
        .start(list_request("10.0.0.1", &joined(&(1..=200).collect::<Vec<_>>()), "4", "0.5"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stopped_at = Instant::now();
    assert!(handle.request_stop());
    assert!(!handle.request_stop());
    assert!(!engine.request_stop());

    let report = tokio::time::timeout(Duration::from_secs(3), handle.await_completion())
        .await
        .expect("stop honored within timeout plus grace")
        .unwrap();

    assert!(stopped_at.elapsed() < Duration::from_millis(1500));
    assert_eq!(report.outcome, Outcome::Stopped);
    assert_eq!(handle.state(), SessionState::Stopped);
    assert!(prober.seen().len() < 200);

    let notices = report
        .lines
        .iter()
        .filter(|l| l.text.starts_with("[INFO] Stop signal sent."))
        .count();
    assert_eq!(notices, 1);
    assert_eq!(report.lines.last().unwrap().text, STOPPED_MARKER);
}

#[tokio::test]
async fn test_stuck_workers_abandoned_after_grace() {
    // Ignores the probe timeout entirely.
    let prober = Arc::new(Recorder::slow(Duration::from_secs(30)));
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober);
    let handle = engine
        .start(list_request("10.0.0.1", "1,2,3,4", "2", "0.2"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.request_stop());

    let report = tokio::time::timeout(Duration::from_secs(3), handle.await_completion())
        .await
        .expect("grace period bounds the stop")
        .unwrap();

    assert_eq!(report.outcome, Outcome::Stopped);
    assert!(report
        .lines
        .iter()
        .any(|l| l.text.contains("worker(s) did not finish")));
}

#[tokio::test]
async fn test_second_start_rejected() {
    let prober = Arc::new(Recorder::slow(Duration::from_millis(200)));
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(prober);
    let first = engine
        .start(list_request("10.0.0.1", "1,2,3,4,5,6", "1", "0.5"))
        .unwrap();

    let second = engine.start(list_request("10.0.0.2", "80", "1", "0.5"));
    assert_eq!(second.unwrap_err(), SessionError::AlreadyRunning);
    assert_eq!(engine.current().unwrap().id(), first.id());

    first.request_stop();
    first.await_completion().await.unwrap();

    let third = engine
        .start(list_request("10.0.0.2", "80", "1", "0.5"))
        .unwrap();
    assert_ne!(third.id(), first.id());
    third.await_completion().await.unwrap();
}

#[tokio::test]
async fn test_new_session_starts_with_fresh_log() {
    let engine =
        ScanEngine::with_options(unavailable(), options()).with_prober(Arc::new(Recorder::default()));

    let first = engine.start(list_request("10.0.0.1", "80", "1", "0.5")).unwrap();
    let first_len = first.await_completion().await.unwrap().lines.len();

    let second = engine.start(list_request("10.0.0.1", "80", "1", "0.5")).unwrap();
    let report = second.await_completion().await.unwrap();
    assert_eq!(report.lines.len(), first_len);
    assert_eq!(report.lines[0].text, "--- Starting Scan ---");
}

#[tokio::test]
async fn test_poll_log_hands_out_each_line_once() {
    let engine = ScanEngine::with_options(unavailable(), options())
        .with_prober(Arc::new(Recorder::opening(&[1, 2, 3])));
    let handle = engine
        .start(list_request("10.0.0.1", "1,2,3,4", "2", "0.5"))
        .unwrap();

    let mut polled = Vec::new();
    while !handle.state().is_terminal() {
        polled.extend(handle.poll_log());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let report = handle.await_completion().await.unwrap();
    polled.extend(handle.poll_log());

    assert_eq!(polled, report.lines);
}

#[tokio::test]
async fn test_failed_session_log_ends_with_finished_marker() {
    let engine = ScanEngine::with_options(unavailable(), options());
    let handle = engine
        .start(list_request("bogus", "80", "1", "0.5"))
        .unwrap();

    let mut polled = Vec::new();
    while !handle.state().is_terminal() {
        polled.extend(handle.poll_log());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    polled.extend(handle.poll_log());

    assert_eq!(handle.state(), SessionState::Failed);
    assert_eq!(polled.last().unwrap().text, COMPLETED_MARKER);
    assert!(polled.iter().any(|l| l.text.contains("Invalid IP address")));
    assert_eq!(
        handle.await_completion().await.unwrap_err(),
        SessionError::Resolve(ResolveError::AllTargetsInvalid)
    );
}

#[tokio::test]
async fn test_whole_slash16_with_all_ports_starts_and_stops() {
    let request = ScanRequest::normalize("10.0.0.0/16", PortMode::All, "", "4", "0.5", true)
        .unwrap();
    let recorder = Arc::new(Recorder::slow(Duration::from_millis(50)));
    let engine = ScanEngine::with_options(unavailable(), options()).with_prober(recorder.clone());
    let handle = engine.start(request).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.progress().total == 0 {
        assert!(Instant::now() < deadline, "scan never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.progress().total, 65534 * 65535);
    assert_eq!(handle.state(), SessionState::Scanning);

    assert!(handle.request_stop());
    let report = tokio::time::timeout(Duration::from_secs(5), handle.await_completion())
        .await
        .expect("stop should finish within the grace period")
        .unwrap();
    assert_eq!(report.outcome, Outcome::Stopped);
    assert_eq!(report.lines.last().unwrap().text, STOPPED_MARKER);
    assert!(recorder.seen().len() < 1000);
}
