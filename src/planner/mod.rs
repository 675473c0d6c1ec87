//! Hierarchical planning: sub-task state and the planner/verifier.
//!
//! The [`SubTaskPlanner`] decomposes a long-horizon instruction into
//! verifiable sub-tasks, monitors progress with fresh visual evidence, and
//! decides whether to advance, refine, or declare the global task complete.

pub mod planner;
pub mod subtask;

// Re-export the primary types for convenient access.
pub use planner::{Gateway, SubTaskPlanner};
pub use subtask::{GlobalTask, SubTask};
