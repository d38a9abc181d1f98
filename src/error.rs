//! Error types for lanscan.
//!
//! Uses `thiserror` for ergonomic error definitions. Each stage of a scan
//! has its own error type so callers can tell a rejected request apart from
//! a failed discovery or a conflicting session.

use std::path::PathBuf;
use thiserror::Error;

/// A scan request failed a bound check and was never constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target IP / CIDR cannot be empty")]
    EmptyTarget,

    #[error("no ports selected for scanning")]
    NoPorts,

    #[error("invalid port range '{0}', use a format like '1-1024'")]
    InvalidPortRange(String),

    #[error("invalid port list '{0}', use comma-separated numbers like '80,443'")]
    InvalidPortList(String),

    #[error("invalid concurrency '{0}' (must be 1-500)")]
    ConcurrencyOutOfRange(String),

    #[error("invalid timeout '{0}' (must be >0 and <=10 seconds)")]
    TimeoutOutOfRange(String),

    #[error("unknown port mode '{0}'")]
    UnknownPortMode(String),
}

/// Target resolution failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("ARP discovery unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("no live hosts found")]
    NoHostsFound,

    #[error("no valid IP addresses provided in target specification")]
    AllTargetsInvalid,

    #[error("invalid CIDR notation '{0}'")]
    InvalidCidr(String),

    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),

    #[error("could not determine the local network: {0}")]
    LocalNetworkUnknown(String),
}

/// A single probe failed for a reason other than refusal or timeout.
///
/// Probe errors are recorded in the event log and never abort a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{host}:{port} - {reason}")]
pub struct ProbeError {
    pub host: String,
    pub port: u16,
    pub reason: String,
}

/// Session lifecycle errors surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Configuration loading and saving errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
