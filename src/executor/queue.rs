//! The bounded buffer of primitive actions pending execution.

use std::collections::VecDeque;

use crate::env::PrimitiveAction;

/// An ordered queue of primitive actions awaiting execution.
///
/// Created whenever a new directive is decomposed, drained one element per
/// control-loop tick, and owned solely by the episode session. The queue is
/// the system's cost-amortization mechanism: only when it runs empty does the
/// loop pay for a new model call.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    actions: VecDeque<PrimitiveAction>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            actions: VecDeque::new(),
        }
    }

    /// Append one action.
    pub fn push(&mut self, action: PrimitiveAction) {
        self.actions.push_back(action);
    }

    /// Remove and return the next action to execute.
    pub fn pop(&mut self) -> Option<PrimitiveAction> {
        self.actions.pop_front()
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the queue is drained.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop any queued actions (e.g. when a new sub-task supersedes the
    /// directive they came from).
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Iterate the queued actions in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &PrimitiveAction> {
        self.actions.iter()
    }
}

impl FromIterator<PrimitiveAction> for ActionQueue {
    fn from_iter<I: IntoIterator<Item = PrimitiveAction>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}
