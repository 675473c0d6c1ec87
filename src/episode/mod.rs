//! Episode orchestration and audit artifacts.
//!
//! This module provides:
//! - [`runner::EpisodeRunner`] -- the observe / decide / act control loop
//!   sequencing the planner, the execution layer, and the simulator.
//! - [`record`] -- per-call audit records, the episode summary, and the
//!   [`record::ArtifactWriter`] that persists them.

pub mod record;
pub mod runner;

// Re-export the most commonly used items at the module level.
pub use record::{
    ArtifactWriter, CallKind, EpisodeResult, EpisodeSummary, ExecutedAction, PlannerCallRecord,
    SubTaskHistoryEntry,
};
pub use runner::EpisodeRunner;
