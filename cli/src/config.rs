//! Command-line configuration.
//!
//! Every knob mirrors a field on the library's `OptimizerConfig`. CLI
//! arguments take highest priority, followed by `OPTIMIZER_*` environment
//! variables, then the built-in defaults.

use anyhow::{anyhow, Result};
use clap::Parser;
use mcts_optimizer::{OptimizerConfig, Strictness};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "optimize")]
#[command(about = "Iteratively improve text with Monte Carlo Tree Search")]
#[command(
    long_about = "Reads a draft from a file or stdin and runs an MCTS loop that
critiques, rewrites, and scores revisions against goal-specific metrics
generated by the configured LLM completion service.

CLI arguments take highest priority, followed by OPTIMIZER_* environment
variables."
)]
pub struct Config {
    /// File to read the draft from; reads stdin when omitted
    pub input: Option<String>,

    /// Optimization goal; inferred from the content when omitted
    #[arg(long, short)]
    pub goal: Option<String>,

    /// API key for the completion service
    #[arg(long, env = "OPTIMIZER_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Completion service base URL
    #[arg(long, env = "OPTIMIZER_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub base_url: String,

    /// Model used for critique, rewriting, and evaluation
    #[arg(long, env = "OPTIMIZER_MODEL", default_value = "anthropic/claude-3.5-sonnet")]
    pub model: String,

    /// Search iterations after the initial evaluation
    #[arg(long, env = "OPTIMIZER_MAX_SIMULATIONS", default_value_t = 6)]
    pub max_simulations: u32,

    /// Maximum variations kept per node
    #[arg(long, env = "OPTIMIZER_MAX_CHILDREN", default_value_t = 3)]
    pub max_children: usize,

    /// Parallel candidate generations per expansion
    #[arg(long, env = "OPTIMIZER_NUM_THOUGHTS", default_value_t = 2)]
    pub num_thoughts: usize,

    /// UCT exploration weight
    #[arg(long, env = "OPTIMIZER_EXPLORATION_WEIGHT", default_value_t = 1.414)]
    pub exploration_weight: f64,

    /// Stop after this many iterations without improvement
    #[arg(long, env = "OPTIMIZER_PATIENCE", default_value_t = 3)]
    pub patience: u32,

    /// Stop once the best score reaches this value
    #[arg(long, env = "OPTIMIZER_THRESHOLD", default_value_t = 9.0)]
    pub threshold: f64,

    /// Per-request timeout in seconds
    #[arg(long, env = "OPTIMIZER_TIMEOUT_SECS", default_value_t = 180)]
    pub timeout_secs: u64,

    /// Attempts per completion call
    #[arg(long, env = "OPTIMIZER_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Scoring harshness: relaxed, normal, strict, or brutal
    #[arg(long, env = "OPTIMIZER_STRICTNESS", default_value = "strict")]
    pub strictness: Strictness,

    /// Disable anchoring evaluation against the previous best score
    #[arg(long, env = "OPTIMIZER_NO_COMPARATIVE")]
    pub no_comparative: bool,

    /// Minimum tree depth before any early stop may fire
    #[arg(long, env = "OPTIMIZER_MIN_DEPTH", default_value_t = 3)]
    pub min_depth: u32,

    /// UCT bonus favoring deeper nodes
    #[arg(long, env = "OPTIMIZER_DEPTH_BONUS", default_value_t = 0.3)]
    pub depth_bonus: f64,

    /// Print intermediate node results while searching
    #[arg(long, env = "OPTIMIZER_SHOW_INTERMEDIATE")]
    pub show_intermediate: bool,

    /// Content preview length (chars) in intermediate results
    #[arg(long, env = "OPTIMIZER_PREVIEW_LENGTH", default_value_t = 300)]
    pub preview_length: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OPTIMIZER_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        self.to_optimizer_config().validate()?;
        Ok(())
    }

    /// Map the CLI surface onto the library configuration.
    pub fn to_optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            thinking_model: self.model.clone(),
            max_simulations: self.max_simulations,
            max_children: self.max_children,
            num_thoughts: self.num_thoughts,
            exploration_weight: self.exploration_weight,
            early_stop_patience: self.patience,
            early_stop_threshold: self.threshold,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            grading_strictness: self.strictness,
            comparative_eval: !self.no_comparative,
            min_depth: self.min_depth,
            depth_bonus: self.depth_bonus,
            show_intermediate: self.show_intermediate,
            preview_length: self.preview_length,
        }
    }
}
