//! Configuration management for lanscan.
//!
//! Provides XDG-compliant storage of the engine settings.

mod settings;

pub use settings::{wait_duration, EngineSettings, Paths, MAX_WAIT_SECS};
