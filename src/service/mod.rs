//! Engine Service
//!
//! The async boundary around the round logic.
//!
//! ## Module Structure
//!
//! - `config`: settings and environment overrides
//! - `engine`: the single-writer round lifecycle
//! - `ticker`: per-round timer task
//! - `protocol`: serializable status views

pub mod config;
pub mod engine;
pub mod ticker;
pub mod protocol;

pub use config::{ConfigError, EngineConfig, Settings};
pub use engine::{CrashEngine, TickControl};
pub use protocol::{EngineStatus, RoundSnapshot};
