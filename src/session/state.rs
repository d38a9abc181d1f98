//! Session lifecycle states.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a scan session.
///
/// Normal path: `Idle -> Discovering -> Scanning -> Draining -> Completed`.
/// Cancellation path: `Discovering | Scanning | Draining -> Stopping -> Stopped`.
/// Resolution failure: `Discovering -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Discovering,
    Scanning,
    Draining,
    Completed,
    Stopping,
    Stopped,
    Failed,
}

impl SessionState {
    /// `Completed`, `Stopped` and `Failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Discovering)
                | (Discovering, Scanning)
                | (Discovering, Failed)
                | (Scanning, Draining)
                | (Draining, Completed)
                | (Discovering | Scanning | Draining, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Scanning => "scanning",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
