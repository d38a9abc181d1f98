//! The final report of a session.

use super::log::LogLine;
use super::state::SessionState;
use crate::scanner::Progress;
use crate::types::SessionId;
use serde::Serialize;
use std::fmt;

/// Marker line closing a fully exhausted scan, or one whose target failed
/// to resolve.
pub const COMPLETED_MARKER: &str = "--- Scan Finished ---";
/// Marker line closing a cancelled scan.
pub const STOPPED_MARKER: &str = "[INFO] Scan stopped.";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Stopped,
}

impl Outcome {
    pub(crate) fn from_state(state: SessionState) -> Option<Self> {
        match state {
            SessionState::Completed => Some(Self::Completed),
            SessionState::Stopped => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Every line a session logged, plus how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub session: SessionId,
    pub outcome: Outcome,
    pub progress: Progress,
    pub lines: Vec<LogLine>,
}

impl ScanReport {
    /// Lines reporting an open port.
    pub fn open_lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter().filter(|l| l.text.contains(" is OPEN ("))
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for line in &self.lines {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
