//! Optimizer configuration parameters.

use std::time::Duration;

use thiserror::Error;

use crate::prompts::Strictness;

/// Error returned when a configuration value is out of range.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Configuration for one optimization run.
///
/// Every knob has a default and is independently overridable; see
/// [`OptimizerConfig::validate`] for the accepted ranges.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Bearer token for the completion service.
    pub api_key: String,

    /// Completion service base URL; `/chat/completions` is appended.
    pub base_url: String,

    /// Model used for thinking, critique, and evaluation.
    pub thinking_model: String,

    /// Search iterations after the root evaluation.
    pub max_simulations: u32,

    /// Maximum variations kept per node.
    pub max_children: usize,

    /// Parallel candidate generations per expansion attempt.
    pub num_thoughts: usize,

    /// UCT exploration vs exploitation weight.
    pub exploration_weight: f64,

    /// Stop after this many iterations without improvement.
    pub early_stop_patience: u32,

    /// Stop once the best score reaches this value.
    pub early_stop_threshold: f64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per logical completion call.
    pub max_retries: u32,

    /// How harshly the evaluator scores.
    pub grading_strictness: Strictness,

    /// Anchor evaluation against the previous best score.
    pub comparative_eval: bool,

    /// Minimum tree depth before any early stop may fire (0 disables the
    /// gate, letting already-excellent content skip the search).
    pub min_depth: u32,

    /// UCT bonus for exploring deeper nodes, asymptotic in [0, depth_bonus).
    pub depth_bonus: f64,

    /// Emit intermediate node results on the progress side channel.
    pub show_intermediate: bool,

    /// Content preview length (chars) in intermediate results.
    pub preview_length: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            thinking_model: "anthropic/claude-3.5-sonnet".to_string(),
            max_simulations: 6,
            max_children: 3,
            num_thoughts: 2,
            exploration_weight: 1.414,
            early_stop_patience: 3,
            early_stop_threshold: 9.0,
            timeout_secs: 180,
            max_retries: 3,
            grading_strictness: Strictness::Strict,
            comparative_eval: true,
            min_depth: 3,
            depth_bonus: 0.3,
            show_intermediate: true,
            preview_length: 300,
        }
    }
}

impl OptimizerConfig {
    /// Small, fast settings for tests.
    pub fn for_testing() -> Self {
        Self {
            max_simulations: 3,
            num_thoughts: 1,
            early_stop_patience: 10,
            min_depth: 1,
            timeout_secs: 5,
            max_retries: 1,
            show_intermediate: false,
            ..Self::default()
        }
    }

    /// Builder pattern: set search iterations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.max_simulations = n;
        self
    }

    /// Builder pattern: set the exploration weight.
    pub fn with_exploration_weight(mut self, c: f64) -> Self {
        self.exploration_weight = c;
        self
    }

    /// Builder pattern: set grading strictness.
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.grading_strictness = strictness;
        self
    }

    /// Builder pattern: set the early-stop threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.early_stop_threshold = threshold;
        self
    }

    /// Builder pattern: set the minimum depth gate.
    pub fn with_min_depth(mut self, depth: u32) -> Self {
        self.min_depth = depth;
        self
    }

    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check all knobs against their accepted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check<T: PartialOrd + std::fmt::Display>(
            name: &str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), ConfigError> {
            if value < min || value > max {
                return Err(ConfigError(format!(
                    "{name} must be between {min} and {max}, got {value}"
                )));
            }
            Ok(())
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError("base_url cannot be empty".to_string()));
        }
        if self.thinking_model.trim().is_empty() {
            return Err(ConfigError("thinking_model cannot be empty".to_string()));
        }

        check("max_simulations", self.max_simulations, 1, 50)?;
        check("max_children", self.max_children, 1, 10)?;
        check("num_thoughts", self.num_thoughts, 1, 5)?;
        check("early_stop_patience", self.early_stop_patience, 1, 20)?;
        check("early_stop_threshold", self.early_stop_threshold, 1.0, 10.0)?;
        check("timeout_secs", self.timeout_secs, 1, 600)?;
        check("max_retries", self.max_retries, 1, 5)?;
        check("min_depth", self.min_depth, 0, 10)?;
        check("depth_bonus", self.depth_bonus, 0.0, 2.0)?;
        check("preview_length", self.preview_length, 50, 1000)?;

        if !self.exploration_weight.is_finite() || self.exploration_weight < 0.0 {
            return Err(ConfigError(
                "exploration_weight must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}
