//! The session event log.
//!
//! An ordered, append-only sink of plain-text lines shared by the
//! orchestrator, the resolver and every worker. Lines are buffered until the
//! session is discarded; nothing is dropped for space.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single line of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub severity: Severity,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Default)]
struct LogState {
    lines: Vec<LogLine>,
    /// Index of the first line not yet handed out by `poll`.
    cursor: usize,
}

/// Thread-safe, ordered event log.
#[derive(Debug, Default)]
pub struct EventLog {
    state: Mutex<LogState>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a prepared line.
    pub fn append(&self, line: LogLine) {
        self.lock().lines.push(line);
    }

    /// Append a line.
    pub fn push(&self, severity: Severity, text: impl Into<String>) {
        self.append(LogLine::new(severity, text));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(Severity::Info, text);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(Severity::Success, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.push(Severity::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(Severity::Error, text);
    }

    /// Everything appended since the previous `poll`, in FIFO order.
    ///
    /// Each line is returned by exactly one call.
    pub fn poll(&self) -> Vec<LogLine> {
        let mut state = self.lock();
        let start = state.cursor;
        state.cursor = state.lines.len();
        state.lines[start..].to_vec()
    }

    /// Copy of every line of the session, independent of polling.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lock().lines.clone()
    }

    /// Return the lines `poll` has not handed out yet and empty the log.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut state = self.lock();
        let cursor = std::mem::take(&mut state.cursor);
        let mut lines = std::mem::take(&mut state.lines);
        lines.drain(..cursor);
        lines
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
