//! Output module for reporting harvest progress and results
//!
//! This module handles:
//! - Live progress counters shared by the driver and the item workers
//! - Statistics computed from a persisted snapshot (`--stats`)

pub mod progress;
pub mod stats;

pub use progress::{Progress, Tracked, WorkKind};
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};
