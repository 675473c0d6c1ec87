//! Validated response records for the three request kinds.
//!
//! The gateway recovers a raw JSON object; this module checks the per-kind
//! required-key sets exactly once at the boundary and hands downstream
//! components a typed record. A record missing required keys is classified
//! [`GatewayError::Incomplete`], never silently accepted.

use serde_json::Value;

use crate::model::api::GatewayError;
use crate::planner::SubTask;

// ---------------------------------------------------------------------------
// Key sets
// ---------------------------------------------------------------------------

/// The four keys every planned sub-task must carry.
const SUBTASK_KEYS: [&str; 4] = [
    "subtask_destination",
    "subtask_instruction",
    "planning_hints",
    "completion_criteria",
];

/// Extract a sub-task from `value` at the given keys, collecting missing or
/// non-string entries.
fn subtask_from(value: &Value) -> Result<SubTask, Vec<&'static str>> {
    let mut missing = Vec::new();
    let mut field = |key: &'static str| -> String {
        match value.get(key).and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                missing.push(key);
                String::new()
            }
        }
    };

    let subtask = SubTask {
        destination: field(SUBTASK_KEYS[0]),
        instruction: field(SUBTASK_KEYS[1]),
        planning_hints: field(SUBTASK_KEYS[2]),
        completion_criteria: field(SUBTASK_KEYS[3]),
    };

    if missing.is_empty() {
        Ok(subtask)
    } else {
        Err(missing)
    }
}

fn incomplete(reason: String, raw: Value) -> GatewayError {
    GatewayError::Incomplete { reason, raw }
}

fn opt_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Initial planning
// ---------------------------------------------------------------------------

/// The validated record of an initial planning response.
#[derive(Debug, Clone)]
pub struct InitialPlan {
    /// The first sub-task.
    pub subtask: SubTask,
    pub current_location: Option<String>,
    /// The parsed waypoint chain, when the model supplied one.
    pub instruction_sequence: Option<String>,
    pub reasoning: Option<String>,
    /// The full structured response, preserved for audit artifacts.
    pub raw: Value,
}

impl InitialPlan {
    /// Validate a raw gateway object against the initial-planning key set.
    pub fn from_value(value: Value) -> Result<Self, GatewayError> {
        let subtask = subtask_from(&value).map_err(|missing| {
            incomplete(
                format!("initial plan missing required keys: {}", missing.join(", ")),
                value.clone(),
            )
        })?;

        Ok(Self {
            subtask,
            current_location: opt_string(&value, "current_location"),
            instruction_sequence: opt_string(&value, "instruction_sequence"),
            reasoning: opt_string(&value, "reasoning"),
            raw: value,
        })
    }
}

// ---------------------------------------------------------------------------
// Verification + replanning
// ---------------------------------------------------------------------------

/// The validated record of a combined verification/replanning response.
///
/// When `is_completed` is true, `subtask` is the newly planned next step
/// (taken from the `next_subtask` object). When false, `subtask` is the
/// refined current step taken from the top-level keys. A completed response
/// without a `next_subtask` object is a contract violation and classified
/// [`GatewayError::Incomplete`]. The destination self-consistency invariant
/// on non-completed responses is enforced by the planner, which holds the
/// active sub-task.
#[derive(Debug, Clone)]
pub struct Verification {
    pub is_completed: bool,
    pub subtask: SubTask,
    pub analysis: Option<String>,
    /// The full structured response, preserved for audit artifacts.
    pub raw: Value,
}

impl Verification {
    /// Validate a raw gateway object against the verification key set.
    pub fn from_value(value: Value) -> Result<Self, GatewayError> {
        let is_completed = value
            .get("is_completed")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                incomplete(
                    "verification missing required key: is_completed".into(),
                    value.clone(),
                )
            })?;

        let subtask = if is_completed {
            let next = value.get("next_subtask").ok_or_else(|| {
                incomplete(
                    "completed verification missing next_subtask object".into(),
                    value.clone(),
                )
            })?;
            subtask_from(next).map_err(|missing| {
                incomplete(
                    format!("next_subtask missing required keys: {}", missing.join(", ")),
                    value.clone(),
                )
            })?
        } else {
            subtask_from(&value).map_err(|missing| {
                incomplete(
                    format!(
                        "refined subtask missing required keys: {}",
                        missing.join(", ")
                    ),
                    value.clone(),
                )
            })?
        };

        Ok(Self {
            is_completed,
            subtask,
            analysis: opt_string(&value, "completion_analysis"),
            raw: value,
        })
    }
}

// ---------------------------------------------------------------------------
// Global task completion
// ---------------------------------------------------------------------------

/// The validated record of a global-completion response.
#[derive(Debug, Clone)]
pub struct CompletionCheck {
    /// The model's self-reported completion flag. Downstream logic must not
    /// act on this alone; see [`CompletionCheck::satisfied`].
    pub task_completed: bool,
    /// Calibration signal, clamped to [0, 1].
    pub confidence: f64,
    pub analysis: String,
    pub recommendation: Option<String>,
    /// The full structured response, preserved for audit artifacts.
    pub raw: Value,
}

impl CompletionCheck {
    /// Validate a raw gateway object against the completion-check key set.
    pub fn from_value(value: Value) -> Result<Self, GatewayError> {
        let task_completed = value.get("task_completed").and_then(Value::as_bool);
        let confidence = value.get("confidence").and_then(Value::as_f64);
        let analysis = opt_string(&value, "analysis");

        let mut missing = Vec::new();
        if task_completed.is_none() {
            missing.push("task_completed");
        }
        if confidence.is_none() {
            missing.push("confidence");
        }
        if analysis.is_none() {
            missing.push("analysis");
        }
        if !missing.is_empty() {
            return Err(incomplete(
                format!(
                    "completion check missing required keys: {}",
                    missing.join(", ")
                ),
                value,
            ));
        }

        Ok(Self {
            task_completed: task_completed.unwrap_or_default(),
            confidence: confidence.unwrap_or_default().clamp(0.0, 1.0),
            analysis: analysis.unwrap_or_default(),
            recommendation: opt_string(&value, "recommendation"),
            raw: value,
        })
    }

    /// Re-derive the completion boolean from the numeric confidence.
    ///
    /// The flag and the confidence can be unreconciled noise from the model,
    /// so the task counts as completed only when the flag is set AND the
    /// confidence clears the threshold.
    pub fn satisfied(&self, threshold: f64) -> bool {
        self.task_completed && self.confidence >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_plan_accepts_complete_record() {
        let value = json!({
            "subtask_destination": "kitchen doorway",
            "subtask_instruction": "Move forward to the kitchen doorway",
            "planning_hints": "Doorway ahead on the right",
            "completion_criteria": "Location: at the doorway",
            "instruction_sequence": "Living room -> Kitchen (final)",
        });
        let plan = InitialPlan::from_value(value).unwrap();

        assert_eq!(plan.subtask.destination, "kitchen doorway");
        assert_eq!(
            plan.instruction_sequence.as_deref(),
            Some("Living room -> Kitchen (final)")
        );
        assert!(plan.current_location.is_none());
    }

    #[test]
    fn test_initial_plan_rejects_missing_keys() {
        let value = json!({
            "subtask_destination": "kitchen doorway",
            "planning_hints": "Doorway ahead",
        });
        let err = InitialPlan::from_value(value).unwrap_err();

        match err {
            GatewayError::Incomplete { reason, .. } => {
                assert!(reason.contains("subtask_instruction"));
                assert!(reason.contains("completion_criteria"));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_initial_plan_rejects_non_string_field() {
        let value = json!({
            "subtask_destination": 42,
            "subtask_instruction": "go",
            "planning_hints": "h",
            "completion_criteria": "c",
        });
        assert!(matches!(
            InitialPlan::from_value(value),
            Err(GatewayError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_verification_completed_takes_next_subtask() {
        let value = json!({
            "is_completed": true,
            "completion_analysis": "Doorway reached per IMAGE 1",
            "next_subtask": {
                "subtask_destination": "refrigerator",
                "subtask_instruction": "Move forward to the refrigerator",
                "planning_hints": "Fridge on the left wall",
                "completion_criteria": "Object: refrigerator within 1m",
            },
        });
        let v = Verification::from_value(value).unwrap();

        assert!(v.is_completed);
        assert_eq!(v.subtask.destination, "refrigerator");
        assert!(v.analysis.unwrap().contains("IMAGE 1"));
    }

    #[test]
    fn test_verification_completed_without_next_subtask_is_violation() {
        let value = json!({ "is_completed": true });
        assert!(matches!(
            Verification::from_value(value),
            Err(GatewayError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_verification_not_completed_takes_top_level_keys() {
        let value = json!({
            "is_completed": false,
            "subtask_destination": "kitchen doorway",
            "subtask_instruction": "Continue forward, the doorway is 2m ahead",
            "planning_hints": "Chair now visible on the right, keep left",
            "completion_criteria": "Location: at the doorway",
        });
        let v = Verification::from_value(value).unwrap();

        assert!(!v.is_completed);
        assert_eq!(v.subtask.destination, "kitchen doorway");
        assert!(v.subtask.instruction.contains("2m ahead"));
    }

    #[test]
    fn test_verification_missing_flag_is_incomplete() {
        let value = json!({
            "subtask_destination": "kitchen doorway",
            "subtask_instruction": "go",
            "planning_hints": "h",
            "completion_criteria": "c",
        });
        assert!(matches!(
            Verification::from_value(value),
            Err(GatewayError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_completion_check_parses_and_clamps() {
        let value = json!({
            "task_completed": true,
            "confidence": 1.4,
            "analysis": "All landmarks visible",
        });
        let check = CompletionCheck::from_value(value).unwrap();

        assert!(check.task_completed);
        assert!((check.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completion_check_low_confidence_not_satisfied() {
        // Flag says true, confidence says otherwise: confidence wins.
        let value = json!({
            "task_completed": true,
            "confidence": 0.6,
            "analysis": "...",
        });
        let check = CompletionCheck::from_value(value).unwrap();

        assert!(!check.satisfied(0.85));
        assert!(check.satisfied(0.5));
    }

    #[test]
    fn test_completion_check_flag_false_never_satisfied() {
        let value = json!({
            "task_completed": false,
            "confidence": 0.95,
            "analysis": "...",
        });
        let check = CompletionCheck::from_value(value).unwrap();
        assert!(!check.satisfied(0.85));
    }

    #[test]
    fn test_completion_check_missing_keys() {
        let value = json!({ "task_completed": true });
        let err = CompletionCheck::from_value(value).unwrap_err();
        match err {
            GatewayError::Incomplete { reason, .. } => {
                assert!(reason.contains("confidence"));
                assert!(reason.contains("analysis"));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }
}
