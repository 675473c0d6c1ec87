//! Prompt templates for the hierarchical planning loop.
//!
//! Each function builds the text half of one multi-modal request; the
//! panoramic views travel alongside it through the gateway. Three request
//! kinds exist:
//!
//! - **Initial planning**: decompose the global instruction into the first
//!   sub-task.
//! - **Verification + replanning**: check the active sub-task against fresh
//!   views and either advance or refine in a single call.
//! - **Task completion**: judge whether the whole instruction is satisfied,
//!   with a calibrated confidence score.

use crate::env::ViewDirection;
use crate::planner::SubTask;

/// The image legend shared by every request kind: one line per panoramic view,
/// in capture order, so the model can reference frames by number.
fn direction_legend() -> String {
    ViewDirection::ALL
        .iter()
        .enumerate()
        .map(|(i, d)| format!("IMAGE {}: {} view", i + 1, d.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Initial planning
// ---------------------------------------------------------------------------

/// Build the initial planning request: global instruction + action space +
/// the 8-view legend.
///
/// Required response keys: `subtask_destination`, `subtask_instruction`,
/// `planning_hints`, `completion_criteria`. Optional: `current_location`,
/// `instruction_sequence`, `reasoning`.
pub fn initial_planning_prompt(instruction: &str, action_space: &str) -> String {
    let legend = direction_legend();
    format!(
        r#"You are the planning module of a Vision-Language Navigation agent. Analyze the spatial environment and design an easily achievable subtask for the low-level execution module.

# Overall Navigation Instruction (Global Task)
{instruction}

# Current Visual Observations (8 Directional Views, clockwise from front)
{legend}

# Task
1. **Spatial understanding**: from ALL 8 images, identify where the agent is and which direction it faces.
2. **Navigation sequence**: parse the global instruction into its ordered waypoints, then pick the NEXT waypoint that is reachable and visible (or inferable) from the current views.
3. **Subtask design**: the subtask must be achievable within 5-15 primitive actions.

# Output Requirements (Strict JSON Format)
{{
    "current_location": "Where the agent is, with distances to key landmarks",
    "instruction_sequence": "Parsed waypoint chain (format: 'Location A -> Location B -> Location C (final)')",
    "subtask_destination": "The NEXT waypoint from the sequence",
    "subtask_instruction": "Action-oriented command: [ACTION] to [DESTINATION]",
    "planning_hints": "High-level path: facing direction, relative position of destination, which side to pass obstacles",
    "completion_criteria": "THREE constraint types: (1) Location - where the agent should be positioned, (2) Object - what objects the agent should see, (3) Direction - spatial relations between objects and the agent",
    "reasoning": "Your analysis: spatial perception with image evidence, destination choice, path feasibility"
}}

# Example
**Global Instruction**: "Go to the kitchen and stop next to the refrigerator"
**Observation**: Agent in living room center, kitchen doorway visible in IMAGE 2 at 45° right

**Correct Output**:
{{
    "current_location": "Standing in living room center, facing the TV wall",
    "instruction_sequence": "Living room (current) -> Kitchen doorway -> Kitchen interior -> Refrigerator location (final)",
    "subtask_destination": "Kitchen doorway entrance",
    "subtask_instruction": "Turn right and move forward to the kitchen doorway entrance",
    "planning_hints": "Doorway is on your right front (45°). Pass the coffee table on your left. Stop before crossing the threshold.",
    "completion_criteria": "Location: at the kitchen doorway threshold. Object: kitchen doorway frame, coffee table, kitchen counters. Direction: doorway and agent are close (within 1m).",
    "reasoning": "TV in IMAGE 1 and sofa in IMAGE 3 confirm the living room. Kitchen doorway is next in the waypoint chain and visible in IMAGE 2 at roughly 3-4m. Turning right then moving forward gives an unobstructed path."
}}

# Key Constraints
- Agent capabilities: {action_space}
- Reference specific IMAGE numbers in reasoning
- completion_criteria must NOT reference IMAGE numbers: it is checked against a different, future observation. Describe landmarks in GENERAL terms without view-relative directions ("bedroom door on the right" -> "bedroom door"). Focus on WHAT objects exist, not WHERE they sit relative to the agent."#
    )
}

// ---------------------------------------------------------------------------
// Verification + replanning
// ---------------------------------------------------------------------------

/// Build the combined verification/replanning request for the active sub-task.
///
/// Required response keys: `is_completed`, plus either a complete
/// `next_subtask` object (when completed) or the four planning keys at top
/// level with an unchanged destination (when not completed).
pub fn verification_replanning_prompt(
    instruction: &str,
    subtask: &SubTask,
    action_space: &str,
) -> String {
    let legend = direction_legend();
    format!(
        r#"You are the planning module of a Vision-Language Navigation agent. Verify whether the current subtask is completed and guide the next step, in a single response.

# Overall Navigation Instruction (Global Task)
{instruction}

# Current Subtask Being Verified
- Destination: {destination}
- Instruction: {subtask_instruction}
- Planning hints: {planning_hints}
- Completion criteria: {completion_criteria}

# Current Visual Observations (8 Directional Views, clockwise from front)
{legend}

# Your Mission
1. Compare the 8 current views with the completion criteria, image by image.
2. Decide whether the subtask is completed.
3. If COMPLETED: design the next subtask, progressing the waypoint chain toward the global goal.
4. If NOT COMPLETED: refine the current subtask instruction and hints to reflect newly visible obstacles. The destination MUST stay exactly the same.

# Output Requirements (Strict JSON Format)
If the subtask is completed:
{{
    "is_completed": true,
    "completion_analysis": "Evidence from specific IMAGE numbers",
    "next_subtask": {{
        "subtask_destination": "The next waypoint",
        "subtask_instruction": "Action-oriented command toward it",
        "planning_hints": "Execution guidance: direction, landmarks, obstacles",
        "completion_criteria": "Location / Object / Direction constraints, without IMAGE references"
    }}
}}

If the subtask is NOT completed:
{{
    "is_completed": false,
    "completion_analysis": "Which criteria are unmet, with IMAGE evidence",
    "subtask_destination": "{destination}",
    "subtask_instruction": "Refined command toward the SAME destination",
    "planning_hints": "Updated guidance for what is now visible",
    "completion_criteria": "The criteria to keep checking, without IMAGE references"
}}

# Key Constraints
- Agent capabilities: {action_space}
- On a NOT-completed verdict, subtask_destination must be byte-identical to the destination above
- completion_criteria must never reference IMAGE numbers"#,
        destination = subtask.destination,
        subtask_instruction = subtask.instruction,
        planning_hints = subtask.planning_hints,
        completion_criteria = subtask.completion_criteria,
    )
}

// ---------------------------------------------------------------------------
// Global task completion
// ---------------------------------------------------------------------------

/// Build the global-completion request: global instruction + fresh views,
/// independent of any sub-task.
///
/// Required response keys: `task_completed`, `confidence` in [0,1],
/// `analysis`. Optional: `recommendation`.
pub fn task_completion_prompt(instruction: &str) -> String {
    let legend = direction_legend();
    format!(
        r#"You are the planning module of a Vision-Language Navigation agent. Verify whether the ENTIRE navigation task has been completed.

# Overall Navigation Goal (Target to Reach)
{instruction}

# Current Visual Observations (8 Directional Views, clockwise from front)
{legend}

# Your Mission
Compare the target described in the goal against ALL 8 views:
- Does the current location match the target description?
- Are the key landmarks mentioned in the goal visible?
- Is the agent positioned as described?

# Output Requirements (Strict JSON Format)
{{
    "task_completed": true/false,
    "confidence": 0.0-1.0,
    "analysis": "For each key element of the goal, state which IMAGE(s) show evidence",
    "recommendation": "If not completed: concrete next steps. If completed: null"
}}

# Evaluation Guidelines
- Confidence 0.9-1.0: all goal elements clearly visible, position matches
- Confidence 0.7-0.9: most elements match, minor adjustment may remain
- Confidence 0.5-0.7: some elements match, significant differences remain
- Confidence below 0.5: current location does not match the goal
- Be conservative: only report completed when highly confident (above 0.85)"#
    )
}
