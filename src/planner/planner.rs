//! The planner/verifier state machine.
//!
//! Three operations, each exactly one gateway call:
//!
//! - [`SubTaskPlanner::generate_initial`] -- decompose the global instruction
//!   into the first sub-task.
//! - [`SubTaskPlanner::verify_and_replan`] -- check the active sub-task
//!   against fresh views, advancing to a new sub-task on completion or
//!   refining the current one otherwise. Verification and replanning are one
//!   combined call: the same observation set answers both "did we arrive"
//!   and "what's next", so a separate replanning round trip would double
//!   model cost without adding information.
//! - [`SubTaskPlanner::check_global_completion`] -- judge the entire
//!   instruction, independent of sub-task state; sub-task completion does not
//!   imply the global instruction is satisfied.
//!
//! The planner performs no retries. Any gateway failure propagates to the
//! caller, which decides whether to retry with a fresh observation, fall back
//! to a default action, or end the episode; this keeps the state machine
//! deterministic and testable independent of network flakiness.

use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::env::{DirectionalView, Observation};
use crate::model::api::GatewayError;
use crate::model::prompt;
use crate::model::{CompletionCheck, InitialPlan, Verification, VlmClient};
use crate::planner::subtask::{GlobalTask, SubTask};

// ---------------------------------------------------------------------------
// Gateway seam
// ---------------------------------------------------------------------------

/// The subset of the model gateway the planner relies on.
///
/// The concrete client is [`VlmClient`]; this trait lets tests substitute
/// scripted gateways without a network.
#[allow(async_fn_in_trait)]
pub trait Gateway: Send + Sync {
    /// Send one multi-modal request and recover a JSON object from the reply.
    async fn call(
        &self,
        prompt: &str,
        views: &[DirectionalView],
    ) -> Result<serde_json::Value, GatewayError>;
}

impl Gateway for VlmClient {
    async fn call(
        &self,
        prompt: &str,
        views: &[DirectionalView],
    ) -> Result<serde_json::Value, GatewayError> {
        VlmClient::call(self, prompt, views).await
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// The planner/verifier backed by a model gateway.
pub struct SubTaskPlanner<G> {
    gateway: G,
    /// Minimum confidence for the global-completion boolean.
    confidence_threshold: f64,
}

impl<G: Gateway> SubTaskPlanner<G> {
    /// Create a planner over the given gateway.
    pub fn new(gateway: G, config: &PlannerConfig) -> Self {
        Self {
            gateway,
            confidence_threshold: config.completion_confidence_threshold,
        }
    }

    /// The configured global-completion confidence threshold.
    pub fn completion_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Produce the first sub-task from the global instruction.
    ///
    /// On failure the caller decides the fallback policy (typically
    /// [`SubTask::default_exploration`]); the episode never proceeds with no
    /// active sub-task.
    pub async fn generate_initial(
        &self,
        task: &GlobalTask,
        observation: &Observation,
    ) -> Result<InitialPlan, GatewayError> {
        let prompt = prompt::initial_planning_prompt(
            &task.instruction,
            &task.action_space.describe(),
        );
        let value = self.gateway.call(&prompt, &observation.views).await?;
        let plan = InitialPlan::from_value(value)?;

        info!(
            destination = %plan.subtask.destination,
            sequence = plan.instruction_sequence.as_deref().unwrap_or("(none)"),
            "initial sub-task planned"
        );

        Ok(plan)
    }

    /// Verify the active sub-task and advance or refine it in one call.
    ///
    /// Enforces the destination self-consistency invariant: a non-completed
    /// response must carry the destination of the input sub-task unchanged.
    /// A response that changes it is classified
    /// [`GatewayError::Incomplete`], and the caller keeps the previous
    /// sub-task active.
    pub async fn verify_and_replan(
        &self,
        task: &GlobalTask,
        current: &SubTask,
        observation: &Observation,
    ) -> Result<Verification, GatewayError> {
        let prompt = prompt::verification_replanning_prompt(
            &task.instruction,
            current,
            &task.action_space.describe(),
        );
        let value = self.gateway.call(&prompt, &observation.views).await?;
        let verification = Verification::from_value(value)?;

        if !verification.is_completed && verification.subtask.destination != current.destination {
            warn!(
                expected = %current.destination,
                got = %verification.subtask.destination,
                "verifier changed destination on a non-completed sub-task"
            );
            return Err(GatewayError::Incomplete {
                reason: format!(
                    "destination changed on non-completed verification: expected {:?}, got {:?}",
                    current.destination, verification.subtask.destination
                ),
                raw: verification.raw,
            });
        }

        info!(
            completed = verification.is_completed,
            destination = %verification.subtask.destination,
            "sub-task verified"
        );

        Ok(verification)
    }

    /// Judge whether the entire navigation instruction is satisfied.
    ///
    /// The returned record's [`CompletionCheck::satisfied`] must be consulted
    /// with [`Self::completion_threshold`]; the raw `task_completed` flag
    /// alone is not trusted.
    pub async fn check_global_completion(
        &self,
        task: &GlobalTask,
        observation: &Observation,
    ) -> Result<CompletionCheck, GatewayError> {
        let prompt = prompt::task_completion_prompt(&task.instruction);
        let value = self.gateway.call(&prompt, &observation.views).await?;
        let check = CompletionCheck::from_value(value)?;

        info!(
            task_completed = check.task_completed,
            confidence = check.confidence,
            satisfied = check.satisfied(self.confidence_threshold),
            "global completion checked"
        );

        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ActionSpace;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A gateway that replays a scripted sequence of responses.
    struct ScriptedGateway {
        responses: Mutex<VecDeque<Result<serde_json::Value, GatewayError>>>,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<Result<serde_json::Value, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl Gateway for ScriptedGateway {
        async fn call(
            &self,
            _prompt: &str,
            _views: &[DirectionalView],
        ) -> Result<serde_json::Value, GatewayError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted gateway exhausted")
        }
    }

    fn planner_with(
        responses: Vec<Result<serde_json::Value, GatewayError>>,
    ) -> SubTaskPlanner<ScriptedGateway> {
        SubTaskPlanner::new(ScriptedGateway::new(responses), &PlannerConfig::default())
    }

    fn task() -> GlobalTask {
        GlobalTask::new(
            "Go to the kitchen and stop next to the refrigerator.",
            ActionSpace::default(),
        )
    }

    fn observation() -> Observation {
        Observation {
            views: Vec::new(),
            distance_to_goal: 4.0,
            path_length: 0.0,
            done: false,
        }
    }

    fn doorway_subtask() -> SubTask {
        SubTask {
            destination: "kitchen doorway".into(),
            instruction: "Move forward to the kitchen doorway".into(),
            planning_hints: "Doorway ahead".into(),
            completion_criteria: "Location: at the doorway".into(),
        }
    }

    #[tokio::test]
    async fn generate_initial_builds_subtask() {
        let planner = planner_with(vec![Ok(json!({
            "subtask_destination": "kitchen doorway",
            "subtask_instruction": "Turn right and move forward to the doorway",
            "planning_hints": "Doorway at 45° right",
            "completion_criteria": "Location: at the doorway threshold",
        }))]);

        let plan = planner
            .generate_initial(&task(), &observation())
            .await
            .unwrap();
        assert_eq!(plan.subtask.destination, "kitchen doorway");
    }

    #[tokio::test]
    async fn generate_initial_propagates_incomplete() {
        let planner = planner_with(vec![Ok(json!({
            "subtask_destination": "kitchen doorway",
        }))]);

        let err = planner
            .generate_initial(&task(), &observation())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Incomplete { .. }));
    }

    #[tokio::test]
    async fn verify_accepts_unchanged_destination_on_refinement() {
        let planner = planner_with(vec![Ok(json!({
            "is_completed": false,
            "subtask_destination": "kitchen doorway",
            "subtask_instruction": "Continue forward, 2m to go",
            "planning_hints": "Chair now visible on the right, keep left",
            "completion_criteria": "Location: at the doorway",
        }))]);

        let v = planner
            .verify_and_replan(&task(), &doorway_subtask(), &observation())
            .await
            .unwrap();
        assert!(!v.is_completed);
        assert_eq!(v.subtask.destination, "kitchen doorway");
    }

    #[tokio::test]
    async fn verify_rejects_changed_destination_on_refinement() {
        let planner = planner_with(vec![Ok(json!({
            "is_completed": false,
            "subtask_destination": "kitchen interior",
            "subtask_instruction": "Continue forward",
            "planning_hints": "h",
            "completion_criteria": "c",
        }))]);

        let err = planner
            .verify_and_replan(&task(), &doorway_subtask(), &observation())
            .await
            .unwrap_err();
        match err {
            GatewayError::Incomplete { reason, .. } => {
                assert!(reason.contains("destination changed"));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_advances_on_completion() {
        let planner = planner_with(vec![Ok(json!({
            "is_completed": true,
            "completion_analysis": "At the doorway per IMAGE 1",
            "next_subtask": {
                "subtask_destination": "refrigerator",
                "subtask_instruction": "Enter the kitchen and approach the refrigerator",
                "planning_hints": "Fridge on the left wall",
                "completion_criteria": "Object: refrigerator within 1m",
            },
        }))]);

        let v = planner
            .verify_and_replan(&task(), &doorway_subtask(), &observation())
            .await
            .unwrap();
        assert!(v.is_completed);
        // A completed verdict may (and here does) change the destination.
        assert_eq!(v.subtask.destination, "refrigerator");
    }

    #[tokio::test]
    async fn completion_check_rederives_boolean_from_confidence() {
        let planner = planner_with(vec![Ok(json!({
            "task_completed": true,
            "confidence": 0.6,
            "analysis": "Some landmarks match",
        }))]);

        let check = planner
            .check_global_completion(&task(), &observation())
            .await
            .unwrap();
        assert!(check.task_completed);
        assert!(!check.satisfied(planner.completion_threshold()));
    }

    #[tokio::test]
    async fn transport_failure_propagates_untouched() {
        let planner = planner_with(vec![Err(GatewayError::Transport("timeout".into()))]);

        let err = planner
            .generate_initial(&task(), &observation())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
