//! Habitat simulator bridge and scripted mock.
//!
//! This module provides two implementations of [`Simulator`]:
//! - [`HabitatEnv`] connects to a running Habitat VLN server via HTTP.
//! - [`MockNavEnv`] replays canned panoramic episodes for testing.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing;

use super::traits::{
    ActionSpace, DirectionalView, NavMetrics, Observation, PrimitiveAction, Simulator,
    ViewDirection,
};

// ---------------------------------------------------------------------------
// HTTP-backed Habitat environment
// ---------------------------------------------------------------------------

/// A VLN simulator that communicates with an external Habitat server via HTTP.
///
/// The server is expected to expose two endpoints:
/// - `POST {base_url}/reset` -- body: `{}`
/// - `POST {base_url}/step`  -- body: `{"action": <action id>}`
///
/// Both return JSON matching [`ServerResponse`]. The reset response
/// additionally carries the episode instruction and the simulator's step
/// size / turn angle, which are read once per episode.
#[derive(Debug)]
pub struct HabitatEnv {
    /// Base URL of the simulator server (e.g. `http://localhost:3000`).
    base_url: String,
    http: reqwest::Client,
    instruction: String,
    episode_id: String,
    action_space: ActionSpace,
    latest_metrics: NavMetrics,
    done: bool,
}

/// The JSON shape returned by the simulator server.
#[derive(Debug, Deserialize)]
struct ServerResponse {
    /// Panoramic frames in capture order, JPEG bytes base64-encoded.
    views: Vec<ServerView>,
    metrics: NavMetrics,
    #[serde(default)]
    episode_over: bool,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    episode_id: Option<String>,
    #[serde(default)]
    forward_step_size: Option<f64>,
    #[serde(default)]
    turn_angle: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ServerView {
    /// Heading offset in degrees (0, 45, ..., 315).
    angle: u16,
    jpeg_base64: String,
}

impl HabitatEnv {
    /// Create a new bridge pointing at the given server.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            instruction: String::new(),
            episode_id: String::new(),
            action_space: ActionSpace::default(),
            latest_metrics: NavMetrics::default(),
            done: false,
        }
    }

    fn observation_from_response(&mut self, resp: ServerResponse) -> Result<Observation> {
        let mut views = Vec::with_capacity(resp.views.len());
        for view in resp.views {
            let direction = ViewDirection::ALL
                .iter()
                .copied()
                .find(|d| d.angle_deg() == view.angle)
                .with_context(|| format!("server sent unknown view angle {}", view.angle))?;
            let jpeg = BASE64
                .decode(view.jpeg_base64.as_bytes())
                .context("failed to decode view JPEG from base64")?;
            views.push(DirectionalView { direction, jpeg });
        }

        self.latest_metrics = resp.metrics.clone();
        self.done = resp.episode_over;

        Ok(Observation {
            views,
            distance_to_goal: resp.metrics.distance_to_goal,
            path_length: resp.metrics.path_length,
            done: resp.episode_over,
        })
    }
}

impl Simulator for HabitatEnv {
    async fn reset(&mut self) -> Result<Observation> {
        let resp: ServerResponse = self
            .http
            .post(format!("{}/reset", self.base_url))
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("failed to reach simulator server on reset")?
            .json()
            .await
            .context("failed to parse simulator reset response")?;

        self.instruction = resp
            .instruction
            .clone()
            .context("simulator reset response missing instruction")?;
        self.episode_id = resp.episode_id.clone().unwrap_or_default();
        if let (Some(step), Some(turn)) = (resp.forward_step_size, resp.turn_angle) {
            self.action_space = ActionSpace {
                forward_step_m: step,
                turn_angle_deg: turn,
            };
        }

        tracing::debug!(
            episode = %self.episode_id,
            instruction = %self.instruction,
            "simulator reset"
        );

        self.observation_from_response(resp)
    }

    async fn step(&mut self, action: PrimitiveAction) -> Result<Observation> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }

        let body = serde_json::json!({ "action": action.id() });
        let resp: ServerResponse = self
            .http
            .post(format!("{}/step", self.base_url))
            .json(&body)
            .send()
            .await
            .context("failed to reach simulator server on step")?
            .json()
            .await
            .context("failed to parse simulator step response")?;

        self.observation_from_response(resp)
    }

    fn instruction(&self) -> &str {
        &self.instruction
    }

    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn metrics(&self) -> NavMetrics {
        self.latest_metrics.clone()
    }

    fn episode_over(&self) -> bool {
        self.done
    }

    fn episode_id(&self) -> &str {
        &self.episode_id
    }
}

// ---------------------------------------------------------------------------
// Mock environment for testing
// ---------------------------------------------------------------------------

/// A scripted mock simulator that replays predefined episodes.
///
/// Useful for deterministic tests of the episode runner and the planner loop
/// without a running Habitat server. Each scripted episode carries an
/// instruction and a sequence of observations with decreasing distance to
/// goal; forward steps advance through the script, turns hold position, and
/// `STOP` ends the episode immediately. Success is granted when the agent
/// stops within the success radius (0.5 m by default).
#[derive(Debug, Clone)]
pub struct MockNavEnv {
    episodes: Vec<MockEpisode>,
    /// Index of the next episode `reset` will serve.
    episode_index: usize,
    /// Distance script of the active episode.
    distances: Vec<f64>,
    step_index: usize,
    instruction: String,
    episode_id: String,
    latest_metrics: NavMetrics,
    path_length: f64,
    done: bool,
    success_radius: f64,
}

/// A single canned episode: the first distance entry is the initial
/// observation returned by `reset`.
#[derive(Debug, Clone)]
struct MockEpisode {
    episode_id: String,
    instruction: String,
    /// Distance-to-goal after each step; index 0 is the initial distance.
    distances: Vec<f64>,
}

impl MockNavEnv {
    /// Create a mock pre-loaded with multi-waypoint indoor episodes.
    pub fn new() -> Self {
        Self::with_success_radius(0.5)
    }

    /// Create a mock with a custom success radius.
    pub fn with_success_radius(success_radius: f64) -> Self {
        Self {
            episodes: Self::default_episodes(),
            episode_index: 0,
            distances: Vec::new(),
            step_index: 0,
            instruction: String::new(),
            episode_id: String::new(),
            latest_metrics: NavMetrics::default(),
            path_length: 0.0,
            done: false,
            success_radius,
        }
    }

    fn default_episodes() -> Vec<MockEpisode> {
        vec![
            MockEpisode {
                episode_id: "mock-0001".into(),
                instruction:
                    "Go to the kitchen and stop next to the refrigerator.".into(),
                distances: vec![4.5, 4.25, 4.0, 3.75, 3.5, 3.0, 2.5, 1.75, 1.0, 0.4, 0.2],
            },
            MockEpisode {
                episode_id: "mock-0002".into(),
                instruction:
                    "Walk down the hallway, enter the bedroom on the right, and stop beside the bed."
                        .into(),
                distances: vec![6.0, 5.75, 5.5, 5.0, 4.5, 4.0, 3.25, 2.5, 1.75, 1.0, 0.5, 0.3],
            },
        ]
    }

    /// Build a synthetic 8-view panoramic observation. The JPEG payloads are
    /// placeholder bytes; nothing in the pipeline decodes them.
    fn panoramic_views() -> Vec<DirectionalView> {
        ViewDirection::ALL
            .iter()
            .map(|&direction| DirectionalView {
                direction,
                // JPEG SOI marker followed by filler, enough to look like a frame.
                jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
            })
            .collect()
    }

    fn current_distance(&self) -> f64 {
        if self.distances.is_empty() {
            return 0.0;
        }
        let idx = self.step_index.min(self.distances.len() - 1);
        self.distances[idx]
    }

    fn observation(&mut self) -> Observation {
        let distance = self.current_distance();
        self.latest_metrics = NavMetrics {
            distance_to_goal: distance,
            path_length: self.path_length,
            success: self.done && distance <= self.success_radius,
            spl: if self.done && distance <= self.success_radius {
                0.9
            } else {
                0.0
            },
            oracle_success: distance <= self.success_radius,
        };
        Observation {
            views: Self::panoramic_views(),
            distance_to_goal: distance,
            path_length: self.path_length,
            done: self.done,
        }
    }
}

impl Default for MockNavEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator for MockNavEnv {
    async fn reset(&mut self) -> Result<Observation> {
        let episode = self.episodes[self.episode_index % self.episodes.len()].clone();
        self.instruction = episode.instruction;
        self.episode_id = episode.episode_id;
        self.distances = episode.distances;
        self.step_index = 0;
        self.path_length = 0.0;
        self.done = false;
        self.episode_index += 1;

        Ok(self.observation())
    }

    async fn step(&mut self, action: PrimitiveAction) -> Result<Observation> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }

        match action {
            PrimitiveAction::Stop => {
                self.done = true;
            }
            PrimitiveAction::MoveForward => {
                self.step_index += 1;
                self.path_length += 0.25;
            }
            PrimitiveAction::TurnLeft | PrimitiveAction::TurnRight => {
                // Turning in place neither advances the script nor covers distance.
            }
        }

        Ok(self.observation())
    }

    fn instruction(&self) -> &str {
        &self.instruction
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::default()
    }

    fn metrics(&self) -> NavMetrics {
        self.latest_metrics.clone()
    }

    fn episode_over(&self) -> bool {
        self.done
    }

    fn episode_id(&self) -> &str {
        &self.episode_id
    }
}
