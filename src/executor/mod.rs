//! Execution layer: directive decomposition and the bounded action queue.
//!
//! One model-issued directive becomes up to `max_actions` primitive actions;
//! the queue is drained one action per control-loop tick before the planner
//! is consulted again, amortizing the cost of model calls.

pub mod directive;
pub mod queue;

// Re-export the most commonly used items at the module level.
pub use directive::{decompose, exploratory_action, parse_directive, DirectiveVerb};
pub use queue::ActionQueue;
