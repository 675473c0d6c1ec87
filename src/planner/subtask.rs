//! Sub-task and global-task data types.

use serde::{Deserialize, Serialize};

use crate::env::ActionSpace;

// ---------------------------------------------------------------------------
// Global task
// ---------------------------------------------------------------------------

/// The episode-level navigation task, immutable after reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalTask {
    /// The full natural-language instruction, possibly multi-waypoint.
    pub instruction: String,
    /// The simulator's primitive action parameters, read once per episode.
    pub action_space: ActionSpace,
}

impl GlobalTask {
    pub fn new(instruction: impl Into<String>, action_space: ActionSpace) -> Self {
        Self {
            instruction: instruction.into(),
            action_space,
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-task
// ---------------------------------------------------------------------------

/// One verifiable intermediate navigation goal decomposed from the global
/// instruction.
///
/// Sub-tasks are superseded, never mutated: whenever the verifier returns a
/// new or refined sub-task, the previous instance is discarded or archived.
/// `completion_criteria` must be verifiable against *any* future observation,
/// so it never references the image index that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    /// Free-text target description (the next waypoint).
    pub destination: String,
    /// Actionable command text toward the destination.
    pub instruction: String,
    /// Free-text navigation strategy for the execution module.
    pub planning_hints: String,
    /// Observable constraints that decide completion.
    pub completion_criteria: String,
}

impl SubTask {
    /// The fallback sub-task substituted when initial planning fails: keep
    /// moving and observing rather than stalling the episode with no active
    /// sub-task.
    pub fn default_exploration() -> Self {
        Self {
            destination: "the first landmark mentioned in the instruction".into(),
            instruction: "Move forward and look for the first landmark mentioned in the instruction"
                .into(),
            planning_hints: "Keep moving straight and observe the surroundings".into(),
            completion_criteria: "The first object or location mentioned in the instruction is visible"
                .into(),
        }
    }
}
