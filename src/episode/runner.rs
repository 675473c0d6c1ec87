//! Episode orchestration: the observe / decide / act control loop.
//!
//! The runner drives one episode at a time, strictly sequentially:
//!
//!   1. reset the simulator and plan the initial sub-task,
//!   2. each tick, pop a cached primitive action if the queue holds one,
//!      otherwise pay for a verification call and refill the queue from the
//!      resulting directive,
//!   3. record every action and model call, until the simulator reports
//!      episode-over, a STOP is issued, the step limit is exhausted, or the
//!      no-progress guard trips.
//!
//! A single malformed model response never aborts the episode: planning
//! failures degrade to the default exploration sub-task and verification
//! failures degrade to one exploratory primitive, so the loop always makes
//! progress within the simulator's own limits. All per-episode mutable state
//! lives in an [`EpisodeSession`] constructed at reset and dropped at episode
//! end.

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{EpisodeConfig, ExecutorConfig, PlannerConfig, VlnConfig};
use crate::env::{Observation, PrimitiveAction, Simulator};
use crate::executor::{decompose, exploratory_action, ActionQueue};
use crate::planner::{Gateway, GlobalTask, SubTask, SubTaskPlanner};

use super::record::{
    ArtifactWriter, CallKind, EpisodeResult, EpisodeSummary, ExecutedAction, PlannerCallRecord,
    SubTaskHistoryEntry,
};

/// Distance improvement below this is treated as standing still.
const PROGRESS_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// All mutable state for one episode, owned exclusively by the runner for the
/// episode's lifetime. No cross-episode aliasing: a fresh session is built at
/// reset and discarded at episode end.
struct EpisodeSession {
    task: GlobalTask,
    /// The active sub-task. Superseded, never mutated, whenever the verifier
    /// returns a new or refined one.
    subtask: SubTask,
    queue: ActionQueue,
    /// 1-based ordinal of the active sub-task.
    subtask_id: usize,
    step_count: usize,
    history: Vec<SubTaskHistoryEntry>,
    /// The record for the most recent planner call; executed actions are
    /// appended to it until the next decision point.
    current_record: PlannerCallRecord,
    /// Best (lowest) distance-to-goal seen at any decision point.
    best_distance: f64,
    /// Consecutive decision points without distance improvement.
    no_progress: usize,
}

impl EpisodeSession {
    /// Close out the active record and start a new one.
    fn roll_record(
        &mut self,
        kind: CallKind,
        llm_response: serde_json::Value,
        artifacts: Option<&ArtifactWriter>,
    ) {
        let finished = std::mem::replace(
            &mut self.current_record,
            PlannerCallRecord::new(self.subtask_id, kind, self.step_count, llm_response),
        );
        if let Some(writer) = artifacts {
            if let Err(e) = writer.save_call_record(&finished) {
                warn!(error = %e, "failed to persist planner call record");
            }
        }
    }

    /// Supersede the active sub-task with a newly planned one.
    fn advance_subtask(&mut self, next: SubTask) {
        self.history.push(SubTaskHistoryEntry {
            subtask_id: self.subtask_id,
            subtask: std::mem::replace(&mut self.subtask, next),
            completed: true,
            completion_step: Some(self.step_count),
        });
        self.subtask_id += 1;
    }

    /// Update the no-progress counter at a decision point.
    fn track_progress(&mut self, distance: f64) {
        if distance < self.best_distance - PROGRESS_EPSILON {
            self.best_distance = distance;
            self.no_progress = 0;
        } else {
            self.no_progress += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Drives episodes by sequencing the planner, the execution layer, and the
/// simulator.
pub struct EpisodeRunner<G> {
    planner: SubTaskPlanner<G>,
    planner_config: PlannerConfig,
    executor_config: ExecutorConfig,
    episode_config: EpisodeConfig,
}

impl<G: Gateway> EpisodeRunner<G> {
    /// Create a runner from a planner and the global configuration.
    pub fn new(planner: SubTaskPlanner<G>, config: &VlnConfig) -> Self {
        Self {
            planner,
            planner_config: config.planner.clone(),
            executor_config: config.executor.clone(),
            episode_config: config.episode.clone(),
        }
    }

    /// Run one full episode and return its terminal result.
    ///
    /// When `artifacts` is provided, every planner call record and the final
    /// summary are persisted under the episode directory.
    pub async fn run<S: Simulator>(
        &self,
        env: &mut S,
        artifacts: Option<&ArtifactWriter>,
    ) -> Result<EpisodeResult> {
        let mut observation = env.reset().await?;
        let task = GlobalTask::new(env.instruction(), env.action_space());

        info!(
            episode = %env.episode_id(),
            instruction = %task.instruction,
            distance = observation.distance_to_goal,
            "episode started"
        );

        // Initial planning; a failure degrades to the default exploration
        // sub-task rather than proceeding with no active sub-task.
        let (subtask, initial_response) =
            match self.planner.generate_initial(&task, &observation).await {
                Ok(plan) => (plan.subtask.clone(), plan.raw),
                Err(e) => {
                    warn!(error = %e, "initial planning failed, using exploration sub-task");
                    (SubTask::default_exploration(), serde_json::Value::Null)
                }
            };

        let queue = decompose(
            &subtask.instruction,
            &task.action_space,
            self.executor_config.max_actions_per_decomposition,
        );

        let mut session = EpisodeSession {
            best_distance: observation.distance_to_goal,
            current_record: PlannerCallRecord::new(
                1,
                CallKind::InitialPlanning,
                0,
                initial_response,
            ),
            task,
            subtask,
            queue,
            subtask_id: 1,
            step_count: 0,
            history: Vec::new(),
            no_progress: 0,
        };

        // Main control loop: one primitive action per tick.
        while !env.episode_over() && session.step_count < self.episode_config.max_steps {
            if session.queue.is_empty() {
                self.decide(&mut session, &observation, artifacts).await;
            }

            // decide() always leaves at least one action queued.
            let action = match session.queue.pop() {
                Some(a) => a,
                None => break,
            };

            session.current_record.actions.push(ExecutedAction {
                step: session.step_count,
                action_name: action.name().to_string(),
                action_id: action.id(),
                distance_to_goal: observation.distance_to_goal,
            });

            observation = env.step(action).await?;
            session.step_count += 1;

            if action == PrimitiveAction::Stop {
                info!(step = session.step_count, "STOP issued, episode ends");
                break;
            }
        }

        self.finish(session, env, artifacts)
    }

    /// One decision point: consult the verifier (or the no-progress guard)
    /// and refill the queue.
    async fn decide(
        &self,
        session: &mut EpisodeSession,
        observation: &Observation,
        artifacts: Option<&ArtifactWriter>,
    ) {
        session.track_progress(observation.distance_to_goal);
        if session.no_progress >= self.episode_config.max_no_progress_decisions {
            warn!(
                decisions = session.no_progress,
                "no progress toward goal, stopping early"
            );
            session.queue.push(PrimitiveAction::Stop);
            return;
        }

        match self
            .planner
            .verify_and_replan(&session.task, &session.subtask, observation)
            .await
        {
            Ok(verification) => {
                let completed = verification.is_completed;
                session.roll_record(CallKind::Verification, verification.raw.clone(), artifacts);

                if completed {
                    session.advance_subtask(verification.subtask);

                    if self.planner_config.check_global_on_subtask_completion
                        && self.global_goal_reached(session, observation, artifacts).await
                    {
                        session.queue.push(PrimitiveAction::Stop);
                        return;
                    }
                } else {
                    // Refined instruction toward the same destination.
                    session.subtask = verification.subtask;
                }

                session.queue = decompose(
                    &session.subtask.instruction,
                    &session.task.action_space,
                    self.executor_config.max_actions_per_decomposition,
                );
            }
            Err(e) => {
                // Keep the previous sub-task active and do one exploratory
                // primitive this tick; the next decision point gets a fresh
                // observation.
                warn!(
                    error = %e,
                    subtask = session.subtask_id,
                    step = session.step_count,
                    "verification failed, substituting exploratory action"
                );
                session.roll_record(CallKind::Verification, serde_json::Value::Null, artifacts);
                session.queue.push(exploratory_action());
            }
        }
    }

    /// Run the global-completion check after a sub-task completes. The
    /// boolean is re-derived from the confidence; any failure counts as
    /// not-yet-complete.
    async fn global_goal_reached(
        &self,
        session: &EpisodeSession,
        observation: &Observation,
        artifacts: Option<&ArtifactWriter>,
    ) -> bool {
        match self
            .planner
            .check_global_completion(&session.task, observation)
            .await
        {
            Ok(check) => {
                let satisfied = check.satisfied(self.planner.completion_threshold());
                let record = PlannerCallRecord::new(
                    session.subtask_id,
                    CallKind::TaskCompletion,
                    session.step_count,
                    check.raw.clone(),
                );
                if let Some(writer) = artifacts {
                    if let Err(e) = writer.save_call_record(&record) {
                        warn!(error = %e, "failed to persist completion-check record");
                    }
                }
                satisfied
            }
            Err(e) => {
                warn!(error = %e, "global completion check failed, continuing");
                false
            }
        }
    }

    /// Close out the session: flush the last record, build the summary, and
    /// assemble the terminal result from simulator metrics.
    fn finish<S: Simulator>(
        &self,
        mut session: EpisodeSession,
        env: &S,
        artifacts: Option<&ArtifactWriter>,
    ) -> Result<EpisodeResult> {
        if let Some(writer) = artifacts {
            if let Err(e) = writer.save_call_record(&session.current_record) {
                warn!(error = %e, "failed to persist final call record");
            }
        }

        // The still-active sub-task goes into the history as incomplete.
        session.history.push(SubTaskHistoryEntry {
            subtask_id: session.subtask_id,
            subtask: session.subtask.clone(),
            completed: false,
            completion_step: None,
        });

        let metrics = env.metrics();
        let result = EpisodeResult {
            total_steps: session.step_count,
            total_subtasks: session.subtask_id,
            metrics: metrics.clone(),
        };

        if let Some(writer) = artifacts {
            let summary = EpisodeSummary {
                episode_id: env.episode_id().to_string(),
                instruction: session.task.instruction.clone(),
                total_steps: session.step_count,
                total_subtasks: session.subtask_id,
                subtask_history: session.history,
                final_metrics: metrics.clone(),
                finished_at: chrono::Utc::now(),
            };
            if let Err(e) = writer.save_summary(&summary) {
                warn!(error = %e, "failed to persist episode summary");
            }
        }

        info!(
            steps = result.total_steps,
            subtasks = result.total_subtasks,
            success = metrics.success,
            spl = metrics.spl,
            distance = metrics.distance_to_goal,
            "episode finished"
        );

        Ok(result)
    }
}
