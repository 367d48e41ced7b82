//! Monte Carlo Tree Search over content revisions.
//!
//! This crate iteratively improves a piece of text toward a goal. Candidate
//! rewrites form a search tree; an LLM completion service provides the
//! critique, rewrite, and evaluation steps, and UCT selection decides which
//! revision to work on next.
//!
//! # Overview
//!
//! Each search iteration runs four phases:
//!
//! 1. **Selection**: Traverse the tree using UCT (with a depth bonus) to
//!    pick the revision to work on
//! 2. **Expansion**: Critique the revision's weakest metric and generate
//!    rewritten candidates concurrently
//! 3. **Evaluation**: Score one candidate against the run's generated
//!    metrics, anchored to the previous best
//! 4. **Backpropagation**: Update visit counts and value sums along the
//!    path from the candidate to the root
//!
//! The evaluation metrics themselves are generated once per run from the
//! goal and the content, so the same engine optimizes prose, documentation,
//! or marketing copy without configuration changes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcts_optimizer::{NullProgress, Optimizer, OptimizerConfig};
//!
//! let config = OptimizerConfig {
//!     api_key: std::env::var("OPTIMIZER_API_KEY")?,
//!     ..OptimizerConfig::default()
//! };
//! config.validate()?;
//!
//! let optimizer = Optimizer::from_config(config)?;
//! let report = optimizer
//!     .improve_content("draft text...", Some("make it persuasive"), &NullProgress)
//!     .await;
//! println!("{report}");
//! ```

pub mod completion;
pub mod config;
pub mod evaluator;
pub mod expand;
pub mod metrics;
pub mod node;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod search;
pub mod tree;

pub use completion::{CompletionError, CompletionService, HttpCompletionService};
pub use config::{ConfigError, OptimizerConfig};
pub use metrics::RunMetrics;
pub use node::{Node, NodeId};
pub use progress::{NullProgress, ProgressSink};
pub use prompts::Strictness;
pub use search::{Optimization, OptimizeError, Optimizer, ScorePoint};
pub use tree::Tree;
