//! Directive parsing and decomposition into primitive actions.
//!
//! A directive is the natural-language command issued for the current
//! sub-task, e.g. `"move forward 75 cm"` or `"turn left 90 degrees"`. This
//! module bridges the granularity mismatch between one such coarse command
//! and the simulator's unit-step vocabulary: the magnitude is divided by the
//! primitive step size and the result is capped, bounding how long the agent
//! acts on a single, possibly stale, visual grounding before the planner is
//! consulted again.

use rand::Rng;
use tracing::{debug, warn};

use crate::env::{ActionSpace, PrimitiveAction};

use super::queue::ActionQueue;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// The action verb recovered from a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveVerb {
    Stop,
    Forward,
    Left,
    Right,
}

/// Parse an action verb and optional magnitude from free-form directive text.
///
/// Matching is permissive keyword search, checked in priority order: `stop`
/// wins over everything, then `forward`, then `left`, then `right` (so
/// "turn left and move forward" resolves to forward, the verb that makes
/// progress). The magnitude is the first integer in the text: centimeters
/// for forward moves, degrees for turns.
pub fn parse_directive(text: &str) -> Option<(DirectiveVerb, Option<f64>)> {
    let lower = text.to_lowercase();

    let verb = if lower.contains("stop") {
        DirectiveVerb::Stop
    } else if lower.contains("forward") {
        DirectiveVerb::Forward
    } else if lower.contains("left") {
        DirectiveVerb::Left
    } else if lower.contains("right") {
        DirectiveVerb::Right
    } else {
        return None;
    };

    Some((verb, first_number(&lower)))
}

/// Scan for the first (optionally negative) integer in the text.
fn first_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map(|off| start + off)
        .unwrap_or(bytes.len());

    let negative = start > 0 && bytes[start - 1] == b'-';
    let magnitude: f64 = text[start..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

/// Decompose one directive into a queue of primitive actions.
///
/// Policy:
/// - `stop` decomposes to a single terminal primitive, never capped or split.
/// - Forward magnitudes (cm) divide by the forward step size; turn magnitudes
///   (degrees) divide by the turn angle. The count is capped at
///   `max_actions`, the core staleness bound.
/// - A verb with no magnitude queues a single primitive of that verb.
/// - When no action is recoverable, or the division yields zero, a single
///   random exploratory primitive (never `STOP`) is queued so the episode
///   keeps making progress under model output noise.
pub fn decompose(directive: &str, action_space: &ActionSpace, max_actions: usize) -> ActionQueue {
    let mut queue = ActionQueue::new();

    match parse_directive(directive) {
        Some((DirectiveVerb::Stop, _)) => {
            queue.push(PrimitiveAction::Stop);
            return queue;
        }
        Some((verb, magnitude)) => {
            let (action, unit) = match verb {
                DirectiveVerb::Forward => {
                    (PrimitiveAction::MoveForward, action_space.forward_step_m * 100.0)
                }
                DirectiveVerb::Left => (PrimitiveAction::TurnLeft, action_space.turn_angle_deg),
                DirectiveVerb::Right => (PrimitiveAction::TurnRight, action_space.turn_angle_deg),
                DirectiveVerb::Stop => unreachable!(),
            };

            let count = match magnitude {
                // One primitive when the directive names no magnitude: act
                // conservatively and re-ground at the next decision point.
                None => 1,
                Some(m) if m <= 0.0 => 0,
                Some(m) => ((m / unit).floor() as usize).min(max_actions),
            };

            debug!(
                directive,
                action = action.name(),
                count,
                "decomposed directive"
            );
            for _ in 0..count {
                queue.push(action);
            }
        }
        None => {
            warn!(directive, "no action recoverable from directive");
        }
    }

    if queue.is_empty() {
        let fallback = exploratory_action();
        warn!(
            directive,
            fallback = fallback.name(),
            "substituting exploratory action for unparseable directive"
        );
        queue.push(fallback);
    }

    queue
}

/// A randomly chosen non-terminal primitive, used when a directive yields
/// nothing executable or a planner call fails outright.
pub fn exploratory_action() -> PrimitiveAction {
    match rand::thread_rng().gen_range(1..=3u8) {
        1 => PrimitiveAction::MoveForward,
        2 => PrimitiveAction::TurnLeft,
        _ => PrimitiveAction::TurnRight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ActionSpace {
        ActionSpace {
            forward_step_m: 0.25,
            turn_angle_deg: 45.0,
        }
    }

    #[test]
    fn test_parse_forward_with_magnitude() {
        let (verb, magnitude) = parse_directive("move forward 75 cm").unwrap();
        assert_eq!(verb, DirectiveVerb::Forward);
        assert_eq!(magnitude, Some(75.0));
    }

    #[test]
    fn test_parse_attached_unit() {
        let (verb, magnitude) = parse_directive("move forward 75cm").unwrap();
        assert_eq!(verb, DirectiveVerb::Forward);
        assert_eq!(magnitude, Some(75.0));
    }

    #[test]
    fn test_parse_stop_wins_over_other_verbs() {
        let (verb, _) = parse_directive("move forward to the sign, then stop").unwrap();
        assert_eq!(verb, DirectiveVerb::Stop);
    }

    #[test]
    fn test_parse_forward_wins_over_turn() {
        let (verb, _) = parse_directive("Turn left and move forward to the doorway").unwrap();
        assert_eq!(verb, DirectiveVerb::Forward);
    }

    #[test]
    fn test_parse_unrecoverable() {
        assert!(parse_directive("admire the painting").is_none());
    }

    #[test]
    fn test_decompose_forward_75cm_caps_at_exact_fit() {
        // 75 / 25 = 3, equal to the cap.
        let queue = decompose("move forward 75cm", &space(), 3);
        let actions: Vec<_> = queue.iter().copied().collect();
        assert_eq!(actions, vec![PrimitiveAction::MoveForward; 3]);
    }

    #[test]
    fn test_decompose_turn_180_truncated_by_cap() {
        // 180 / 45 = 4 needed, but the cap defers the remainder to the next
        // model call.
        let queue = decompose("turn left 180 degrees", &space(), 3);
        let actions: Vec<_> = queue.iter().copied().collect();
        assert_eq!(actions, vec![PrimitiveAction::TurnLeft; 3]);
    }

    #[test]
    fn test_decompose_cap_invariant() {
        for (magnitude, expected) in [(25.0, 1), (50.0, 2), (75.0, 3), (200.0, 3), (30.0, 1)] {
            let queue = decompose(&format!("move forward {magnitude} cm"), &space(), 3);
            assert_eq!(queue.len(), expected, "magnitude {magnitude}");
        }
    }

    #[test]
    fn test_decompose_stop_is_single_and_terminal() {
        let queue = decompose("stop 500", &space(), 3);
        let actions: Vec<_> = queue.iter().copied().collect();
        assert_eq!(actions, vec![PrimitiveAction::Stop]);
    }

    #[test]
    fn test_decompose_verb_without_magnitude_queues_one() {
        let queue = decompose("Move forward to the kitchen doorway", &space(), 3);
        let actions: Vec<_> = queue.iter().copied().collect();
        assert_eq!(actions, vec![PrimitiveAction::MoveForward]);
    }

    #[test]
    fn test_decompose_unparseable_falls_back_to_exploration() {
        let queue = decompose("contemplate the hallway", &space(), 3);
        assert_eq!(queue.len(), 1);
        let action = queue.iter().next().copied().unwrap();
        assert_ne!(action, PrimitiveAction::Stop);
    }

    #[test]
    fn test_decompose_sub_unit_magnitude_falls_back() {
        // 10cm is below one 25cm step; the queue must not stall empty.
        let queue = decompose("move forward 10 cm", &space(), 3);
        assert_eq!(queue.len(), 1);
        assert_ne!(
            queue.iter().next().copied().unwrap(),
            PrimitiveAction::Stop
        );
    }

    #[test]
    fn test_decompose_negative_magnitude_falls_back() {
        let queue = decompose("move forward -50 cm", &space(), 3);
        assert_eq!(queue.len(), 1);
        assert_ne!(
            queue.iter().next().copied().unwrap(),
            PrimitiveAction::Stop
        );
    }
}
