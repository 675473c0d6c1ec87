//! Tern: hierarchical planning and execution for Vision-Language Navigation.
//!
//! Provides subcommands for driving and auditing navigation episodes:
//!
//! - `run`     -- Run one or more episodes against the simulator
//! - `inspect` -- Inspect the saved artifacts of a finished episode

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tern::config::VlnConfig;
use tern::env::habitat::{HabitatEnv, MockNavEnv};
use tern::env::AnyEnv;
use tern::episode::{ArtifactWriter, EpisodeRunner, EpisodeSummary};
use tern::model::VlmClient;
use tern::planner::SubTaskPlanner;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Tern: hierarchical planning for Vision-Language Navigation agents.
#[derive(Parser)]
#[command(name = "tern", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the scripted mock simulator instead of a live server.
    #[arg(long, global = true, default_value_t = false)]
    mock: bool,

    /// Base URL of the live simulator server.
    #[arg(long, global = true, default_value = "http://localhost:3000")]
    sim_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run navigation episodes.
    Run {
        /// Number of episodes to run.
        #[arg(long, default_value_t = 1)]
        episodes: usize,

        /// Directory to save per-episode artifacts into.
        #[arg(long, default_value = "data/episodes")]
        output: PathBuf,
    },

    /// Inspect the saved artifacts of a finished episode.
    Inspect {
        /// Path to an episode directory (containing episode_summary.json).
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load or create configuration.
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str::<VlnConfig>(&text)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        }
        None => VlnConfig::default(),
    };

    // Fill in the API key from the environment when not set in the file.
    if config.model.api_key.is_empty() {
        if let Ok(key) = std::env::var("VLM_API_KEY") {
            config.model.api_key = key;
        }
    }

    match cli.command {
        Commands::Run { episodes, output } => {
            cmd_run(&config, cli.mock, &cli.sim_url, episodes, &output).await
        }
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &VlnConfig,
    mock: bool,
    sim_url: &str,
    episodes: usize,
    output: &PathBuf,
) -> Result<()> {
    tracing::info!(episodes, "Running navigation episodes");

    let gateway = VlmClient::new(&config.model);
    let planner = SubTaskPlanner::new(gateway, &config.planner);
    let runner = EpisodeRunner::new(planner, config);
    let mut env = create_env(mock, sim_url);

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output dir {}", output.display()))?;

    for ep in 0..episodes {
        // The dataset-assigned episode id is only known after reset, which
        // the runner owns; artifact directories are named by run ordinal.
        let writer = ArtifactWriter::new(output, &format!("{ep:04}"))?;
        let result = runner.run(&mut env, Some(&writer)).await?;

        tracing::info!(
            episode = ep,
            steps = result.total_steps,
            subtasks = result.total_subtasks,
            success = result.metrics.success,
            spl = format!("{:.4}", result.metrics.spl),
            distance = format!("{:.2}", result.metrics.distance_to_goal),
            "episode complete"
        );
    }

    tracing::info!(path = %output.display(), "All artifacts saved");
    Ok(())
}

fn cmd_inspect(path: &PathBuf) -> Result<()> {
    let summary_path = path.join("episode_summary.json");
    let text = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("Failed to read {}", summary_path.display()))?;
    let summary: EpisodeSummary =
        serde_json::from_str(&text).context("Failed to parse episode summary")?;

    println!("Episode: {}", summary.episode_id);
    println!("  Instruction: {}", summary.instruction);
    println!("  Total steps: {}", summary.total_steps);
    println!("  Sub-tasks: {}", summary.total_subtasks);
    println!("  Finished at: {}", summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    println!("Final metrics:");
    println!("  Distance to goal: {:.2}m", summary.final_metrics.distance_to_goal);
    println!("  Path length: {:.2}m", summary.final_metrics.path_length);
    println!("  Success: {}", if summary.final_metrics.success { "yes" } else { "no" });
    println!("  SPL: {:.4}", summary.final_metrics.spl);
    println!("  Oracle success: {}", summary.final_metrics.oracle_success);
    println!();

    println!("Sub-task history:");
    for entry in &summary.subtask_history {
        let status = if entry.completed {
            match entry.completion_step {
                Some(step) => format!("completed at step {step}"),
                None => "completed".to_string(),
            }
        } else {
            "incomplete".to_string()
        };
        println!("  #{} [{}] {}", entry.subtask_id, status, entry.subtask.destination);
        println!("    Instruction: {}", entry.subtask.instruction);
        println!("    Criteria: {}", entry.subtask.completion_criteria);
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Simulator construction
// ---------------------------------------------------------------------------

fn create_env(mock: bool, sim_url: &str) -> AnyEnv {
    if mock {
        tracing::info!("Using scripted mock simulator");
        AnyEnv::Mock(MockNavEnv::new())
    } else {
        tracing::info!(url = sim_url, "Using live simulator server");
        AnyEnv::Habitat(HabitatEnv::new(sim_url))
    }
}
