//! Audit artifacts: per-call planning records and episode summaries.
//!
//! Every planning/verification call is persisted as one JSON record holding
//! the full structured model response plus the primitive actions executed
//! under it, so any decision can be diagnosed offline. A per-episode summary
//! with aggregate metrics is written at episode end.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::env::NavMetrics;
use crate::planner::SubTask;

// ---------------------------------------------------------------------------
// Per-call record
// ---------------------------------------------------------------------------

/// One primitive action executed under a planner call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedAction {
    /// Zero-based primitive step index within the episode.
    pub step: usize,
    pub action_name: String,
    pub action_id: u8,
    /// Distance to goal at the moment the action was issued.
    pub distance_to_goal: f64,
}

/// The kind of model call that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    InitialPlanning,
    Verification,
    TaskCompletion,
}

/// The audit record for one planning/verification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerCallRecord {
    /// Unique record identifier.
    pub record_id: String,
    /// Ordinal of the sub-task active when the call was made (1-based).
    pub subtask_id: usize,
    pub kind: CallKind,
    /// Primitive step index at which the call was issued.
    pub generated_at_step: usize,
    pub generated_at: DateTime<Utc>,
    /// The full structured model response (or `null` when the call failed).
    pub llm_response: serde_json::Value,
    /// The primitive actions executed under this call, appended as they run.
    pub actions: Vec<ExecutedAction>,
}

impl PlannerCallRecord {
    /// Start a record for a call issued at `step`.
    pub fn new(subtask_id: usize, kind: CallKind, step: usize, llm_response: serde_json::Value) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            subtask_id,
            kind,
            generated_at_step: step,
            generated_at: Utc::now(),
            llm_response,
            actions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Episode outcome
// ---------------------------------------------------------------------------

/// One entry of the sub-task history kept for the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskHistoryEntry {
    pub subtask_id: usize,
    pub subtask: SubTask,
    pub completed: bool,
    /// Step at which the sub-task was superseded (None while active).
    pub completion_step: Option<usize>,
}

/// Terminal record of one episode, built once from simulator metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub total_steps: usize,
    pub total_subtasks: usize,
    pub metrics: NavMetrics,
}

/// The persisted per-episode summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: String,
    pub instruction: String,
    pub total_steps: usize,
    pub total_subtasks: usize,
    pub subtask_history: Vec<SubTaskHistoryEntry>,
    pub final_metrics: NavMetrics,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Artifact writer
// ---------------------------------------------------------------------------

/// Writes audit artifacts for one episode under
/// `{output_root}/episode_{episode_id}/`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    episode_dir: PathBuf,
}

impl ArtifactWriter {
    /// Create the episode directory and return a writer for it.
    pub fn new(output_root: &Path, episode_id: &str) -> Result<Self> {
        let episode_dir = output_root.join(format!("episode_{episode_id}"));
        fs::create_dir_all(&episode_dir)
            .with_context(|| format!("failed to create {}", episode_dir.display()))?;
        Ok(Self { episode_dir })
    }

    /// The directory artifacts are written to.
    pub fn episode_dir(&self) -> &Path {
        &self.episode_dir
    }

    /// Persist one planner-call record as pretty JSON.
    pub fn save_call_record(&self, record: &PlannerCallRecord) -> Result<()> {
        let filename = format!(
            "subtask_{:03}_step_{:04}_call.json",
            record.subtask_id, record.generated_at_step
        );
        let path = self.episode_dir.join(filename);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Persist the episode summary as pretty JSON.
    pub fn save_summary(&self, summary: &EpisodeSummary) -> Result<()> {
        let path = self.episode_dir.join("episode_summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_record_accumulates_actions() {
        let mut record = PlannerCallRecord::new(
            1,
            CallKind::Verification,
            12,
            json!({"is_completed": false}),
        );
        record.actions.push(ExecutedAction {
            step: 12,
            action_name: "MOVE_FORWARD".into(),
            action_id: 1,
            distance_to_goal: 3.5,
        });

        assert_eq!(record.subtask_id, 1);
        assert_eq!(record.actions.len(), 1);
        assert!(!record.record_id.is_empty());
    }

    #[test]
    fn test_call_record_serialization_shape() {
        let record = PlannerCallRecord::new(
            2,
            CallKind::InitialPlanning,
            0,
            json!({"subtask_destination": "kitchen doorway"}),
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["subtask_id"], json!(2));
        assert_eq!(value["kind"], json!("initial_planning"));
        assert_eq!(value["generated_at_step"], json!(0));
        assert_eq!(
            value["llm_response"]["subtask_destination"],
            json!("kitchen doorway")
        );
        assert!(value["actions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_artifact_writer_persists_records() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path(), "0007").unwrap();

        let record =
            PlannerCallRecord::new(1, CallKind::InitialPlanning, 0, json!({"ok": true}));
        writer.save_call_record(&record).unwrap();

        let summary = EpisodeSummary {
            episode_id: "0007".into(),
            instruction: "Go to the kitchen.".into(),
            total_steps: 14,
            total_subtasks: 3,
            subtask_history: Vec::new(),
            final_metrics: NavMetrics::default(),
            finished_at: Utc::now(),
        };
        writer.save_summary(&summary).unwrap();

        let dir = writer.episode_dir();
        assert!(dir.join("subtask_001_step_0000_call.json").exists());
        let text = std::fs::read_to_string(dir.join("episode_summary.json")).unwrap();
        let parsed: EpisodeSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.total_steps, 14);
    }
}
