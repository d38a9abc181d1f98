//! Core types: ports, targets and validated scan requests.
//!
//! A `ScanRequest` is only ever built through its validating constructors, so
//! the rest of the crate never re-checks bounds.

mod port;
mod request;
mod session_id;
mod target;

pub use port::{Port, PortMode};
pub use request::ScanRequest;
pub use session_id::SessionId;
pub use target::{block_size, usable_hosts, validate_entries, ListValidation, TargetSpec};
