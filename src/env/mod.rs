//! Simulator abstractions and concrete implementations.
//!
//! Every simulator implements the [`Simulator`] trait so that the episode
//! runner can drive it uniformly.
//!
//! Included simulators:
//! - **Habitat bridge** ([`habitat::HabitatEnv`]) -- HTTP client for a running
//!   Habitat VLN server.
//! - **Mock** ([`habitat::MockNavEnv`]) -- replays canned panoramic episodes,
//!   making it possible to test the full planning loop without external
//!   dependencies.

pub mod habitat;
pub mod traits;

// Re-export the core trait and shared types at the module level.
pub use traits::{
    ActionSpace, DirectionalView, NavMetrics, Observation, PrimitiveAction, Simulator,
    ViewDirection,
};

// ---------------------------------------------------------------------------
// AnyEnv: enum dispatch wrapper for runtime simulator selection
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete simulator types, enabling runtime
/// selection without `dyn` (which is incompatible with async trait methods).
pub enum AnyEnv {
    Habitat(habitat::HabitatEnv),
    Mock(habitat::MockNavEnv),
}

impl Simulator for AnyEnv {
    async fn reset(&mut self) -> anyhow::Result<Observation> {
        match self {
            Self::Habitat(e) => e.reset().await,
            Self::Mock(e) => e.reset().await,
        }
    }

    async fn step(&mut self, action: PrimitiveAction) -> anyhow::Result<Observation> {
        match self {
            Self::Habitat(e) => e.step(action).await,
            Self::Mock(e) => e.step(action).await,
        }
    }

    fn instruction(&self) -> &str {
        match self {
            Self::Habitat(e) => e.instruction(),
            Self::Mock(e) => e.instruction(),
        }
    }

    fn action_space(&self) -> ActionSpace {
        match self {
            Self::Habitat(e) => e.action_space(),
            Self::Mock(e) => e.action_space(),
        }
    }

    fn metrics(&self) -> NavMetrics {
        match self {
            Self::Habitat(e) => e.metrics(),
            Self::Mock(e) => e.metrics(),
        }
    }

    fn episode_over(&self) -> bool {
        match self {
            Self::Habitat(e) => e.episode_over(),
            Self::Mock(e) => e.episode_over(),
        }
    }

    fn episode_id(&self) -> &str {
        match self {
            Self::Habitat(e) => e.episode_id(),
            Self::Mock(e) => e.episode_id(),
        }
    }
}
