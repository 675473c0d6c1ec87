use serde::{Deserialize, Serialize};

/// Complete configuration for the navigation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlnConfig {
    pub model: ModelConfig,
    pub planner: PlannerConfig,
    pub executor: ExecutorConfig,
    pub episode: EpisodeConfig,
}

/// VLM endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL for the chat-completions API.
    pub api_base: String,
    /// API key for bearer authentication (may be filled from `VLM_API_KEY`).
    pub api_key: String,
    /// Model identifier (e.g., "qwen2.5-vl-72b-instruct").
    pub model_id: String,
    /// Sampling temperature (default: 0.7).
    pub temperature: f64,
    /// Maximum response tokens (default: 2000).
    pub max_tokens: usize,
    /// Request timeout in seconds (default: 60).
    pub timeout_secs: u64,
}

/// Planner/verifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Minimum confidence before a global-completion verdict is trusted
    /// (default: 0.85).
    pub completion_confidence_threshold: f64,
    /// Whether to run the global-completion check each time a sub-task
    /// completes (default: true).
    pub check_global_on_subtask_completion: bool,
}

/// Execution-layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum primitives queued per decomposition (default: 3). Bounds how
    /// long the agent acts on one visual grounding before replanning.
    pub max_actions_per_decomposition: usize,
}

/// Episode-level limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Hard cap on primitive steps per episode (default: 200).
    pub max_steps: usize,
    /// Consecutive decision points without distance improvement before the
    /// episode is stopped early (default: 5).
    pub max_no_progress_decisions: usize,
}

impl Default for VlnConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                api_base: "https://openrouter.ai/api/v1".into(),
                api_key: String::new(),
                model_id: "qwen/qwen2.5-vl-72b-instruct".into(),
                temperature: 0.7,
                max_tokens: 2000,
                timeout_secs: 60,
            },
            planner: PlannerConfig {
                completion_confidence_threshold: 0.85,
                check_global_on_subtask_completion: true,
            },
            executor: ExecutorConfig {
                max_actions_per_decomposition: 3,
            },
            episode: EpisodeConfig {
                max_steps: 200,
                max_no_progress_decisions: 5,
            },
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        VlnConfig::default().planner
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        VlnConfig::default().executor
    }
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        VlnConfig::default().episode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let config = VlnConfig::default();
        assert_eq!(config.executor.max_actions_per_decomposition, 3);
        assert!((config.planner.completion_confidence_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.model.timeout_secs, 60);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = VlnConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: VlnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.episode.max_steps, config.episode.max_steps);
        assert_eq!(parsed.model.model_id, config.model.model_id);
    }
}
