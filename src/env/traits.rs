//! Core simulator trait and shared observation types.
//!
//! The external simulator (Habitat or a scripted mock) is consumed through the
//! [`Simulator`] trait so that the episode runner can drive navigation
//! episodes uniformly.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Primitive actions
// ---------------------------------------------------------------------------

/// The discrete motor vocabulary of the simulator.
///
/// The numeric ids match the simulator's action indices: `0=STOP`,
/// `1=MOVE_FORWARD`, `2=TURN_LEFT`, `3=TURN_RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveAction {
    Stop,
    MoveForward,
    TurnLeft,
    TurnRight,
}

impl PrimitiveAction {
    /// The simulator action index.
    pub fn id(&self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::MoveForward => 1,
            Self::TurnLeft => 2,
            Self::TurnRight => 3,
        }
    }

    /// Human-readable action name as the simulator spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::MoveForward => "MOVE_FORWARD",
            Self::TurnLeft => "TURN_LEFT",
            Self::TurnRight => "TURN_RIGHT",
        }
    }

    /// Parse from a simulator action index.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Stop),
            1 => Some(Self::MoveForward),
            2 => Some(Self::TurnLeft),
            3 => Some(Self::TurnRight),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Panoramic views
// ---------------------------------------------------------------------------

/// One of the 8 panoramic camera directions, clockwise from forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewDirection {
    Front,
    FrontRight,
    Right,
    BackRight,
    Back,
    BackLeft,
    Left,
    FrontLeft,
}

impl ViewDirection {
    /// All directions in capture order (clockwise from forward).
    pub const ALL: [ViewDirection; 8] = [
        Self::Front,
        Self::FrontRight,
        Self::Right,
        Self::BackRight,
        Self::Back,
        Self::BackLeft,
        Self::Left,
        Self::FrontLeft,
    ];

    /// Heading offset from the agent's forward direction, in degrees.
    pub fn angle_deg(&self) -> u16 {
        match self {
            Self::Front => 0,
            Self::FrontRight => 45,
            Self::Right => 90,
            Self::BackRight => 135,
            Self::Back => 180,
            Self::BackLeft => 225,
            Self::Left => 270,
            Self::FrontLeft => 315,
        }
    }

    /// Label used in prompts and saved artifacts, e.g. `"front (0°)"`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Front => "front (0°)",
            Self::FrontRight => "front-right (45°)",
            Self::Right => "right (90°)",
            Self::BackRight => "back-right (135°)",
            Self::Back => "back (180°)",
            Self::BackLeft => "back-left (225°)",
            Self::Left => "left (270°)",
            Self::FrontLeft => "front-left (315°)",
        }
    }
}

/// A single labeled camera frame within a panoramic observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionalView {
    /// Which way the camera was facing relative to the agent.
    pub direction: ViewDirection,
    /// JPEG-encoded frame bytes. Base64 inlining happens at the gateway
    /// boundary, not here.
    pub jpeg: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Observations and metrics
// ---------------------------------------------------------------------------

/// A snapshot of the environment at one decision point.
///
/// Produced fresh by every `reset`/`step`; never retained beyond building the
/// next model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Panoramic views in capture order (by convention 8, clockwise from
    /// forward).
    pub views: Vec<DirectionalView>,
    /// Geodesic distance to the goal in meters.
    pub distance_to_goal: f64,
    /// Cumulative path length walked so far in meters.
    pub path_length: f64,
    /// Whether the episode has terminated.
    pub done: bool,
}

/// Outcome metrics reported by the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavMetrics {
    pub distance_to_goal: f64,
    pub path_length: f64,
    /// Whether the agent stopped within the success radius of the goal.
    pub success: bool,
    /// Success weighted by path length (path efficiency in [0, 1]).
    pub spl: f64,
    /// Whether the agent ever passed within the success radius.
    pub oracle_success: bool,
}

// ---------------------------------------------------------------------------
// Action space
// ---------------------------------------------------------------------------

/// The simulator's primitive action parameters, read once per episode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionSpace {
    /// Distance covered by one `MOVE_FORWARD`, in meters.
    pub forward_step_m: f64,
    /// Rotation of one `TURN_LEFT`/`TURN_RIGHT`, in degrees.
    pub turn_angle_deg: f64,
}

impl ActionSpace {
    /// Render the action-space description used in planning prompts, e.g.
    /// `"MOVE_FORWARD (0.25m), TURN_LEFT (45°), TURN_RIGHT (45°), STOP"`.
    pub fn describe(&self) -> String {
        format!(
            "MOVE_FORWARD ({}m), TURN_LEFT ({}°), TURN_RIGHT ({}°), STOP",
            self.forward_step_m, self.turn_angle_deg, self.turn_angle_deg
        )
    }
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self {
            forward_step_m: 0.25,
            turn_angle_deg: 45.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator trait
// ---------------------------------------------------------------------------

/// The simulator collaborator contract.
///
/// All concrete simulators implement this trait so the episode runner can
/// drive them uniformly. The `step` call is synchronous from the runner's
/// perspective: once issued, a primitive action always runs to completion
/// before the next observation is valid.
#[allow(async_fn_in_trait)]
pub trait Simulator: Send + Sync {
    /// Start a new episode and return the initial observation.
    async fn reset(&mut self) -> anyhow::Result<Observation>;

    /// Execute one primitive action and return the resulting observation.
    async fn step(&mut self, action: PrimitiveAction) -> anyhow::Result<Observation>;

    /// The natural-language navigation instruction for the current episode.
    fn instruction(&self) -> &str;

    /// The simulator's primitive action parameters.
    fn action_space(&self) -> ActionSpace;

    /// Outcome metrics as of the latest observation.
    fn metrics(&self) -> NavMetrics;

    /// Whether the current episode has ended.
    fn episode_over(&self) -> bool;

    /// Identifier of the current episode (dataset-assigned).
    fn episode_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_action_ids_roundtrip() {
        for action in [
            PrimitiveAction::Stop,
            PrimitiveAction::MoveForward,
            PrimitiveAction::TurnLeft,
            PrimitiveAction::TurnRight,
        ] {
            assert_eq!(PrimitiveAction::from_id(action.id()), Some(action));
        }
        assert_eq!(PrimitiveAction::from_id(7), None);
    }

    #[test]
    fn test_view_directions_cover_full_circle() {
        let angles: Vec<u16> = ViewDirection::ALL.iter().map(|d| d.angle_deg()).collect();
        assert_eq!(angles, vec![0, 45, 90, 135, 180, 225, 270, 315]);
    }

    #[test]
    fn test_action_space_description() {
        let space = ActionSpace::default();
        let desc = space.describe();
        assert!(desc.contains("MOVE_FORWARD (0.25m)"));
        assert!(desc.contains("TURN_LEFT (45°)"));
        assert!(desc.ends_with("STOP"));
    }
}
