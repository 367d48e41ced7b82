//! MCTS driver for content optimization.
//!
//! Implements the core search loop over revisions:
//! 1. Selection: walk the tree by UCT to find the node to work on
//! 2. Expansion: critique the weakest metric and synthesize rewrites
//! 3. Evaluation: score the chosen candidate against the run's metrics
//! 4. Backpropagation: update visit/value statistics up to the root
//!
//! The driver mutates the tree strictly sequentially; the only concurrency
//! is the fan-out of candidate generation inside one expansion step.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::completion::{
    self, complete_with_retries, CompletionError, CompletionService, HttpCompletionService,
};
use crate::config::OptimizerConfig;
use crate::evaluator;
use crate::expand;
use crate::metrics::{self, RunMetrics};
use crate::node::NodeId;
use crate::progress::ProgressSink;
use crate::prompts;
use crate::report;
use crate::tree::Tree;

/// Errors that abort an optimization run.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("API key required")]
    MissingApiKey,

    #[error("no text provided to improve")]
    EmptyInput,

    #[error("completion service unreachable: {0}")]
    ServiceUnavailable(#[source] CompletionError),

    #[error("could not generate evaluation metrics: {0}")]
    MetricGeneration(#[source] CompletionError),

    #[error("search failed: {source} (last error: {detail})")]
    Search {
        #[source]
        source: CompletionError,
        detail: String,
    },
}

/// One entry in the best-score progression.
#[derive(Debug, Clone)]
pub struct ScorePoint {
    pub iteration: u32,
    pub score: f64,
    pub node: NodeId,
}

/// The finished search: the whole tree is retained for reporting.
#[derive(Debug)]
pub struct Optimization {
    pub goal: String,
    pub metrics: RunMetrics,
    pub tree: Tree,
    pub best: NodeId,
    pub best_score: f64,
    pub root_score: f64,
    pub iterations: u32,
    pub api_calls: u32,
    pub history: Vec<ScorePoint>,
}

impl Optimization {
    /// Content of the best node found.
    pub fn best_content(&self) -> &str {
        &self.tree.get(self.best).content
    }

    /// Scores of the best node, if it was evaluated.
    pub fn best_scores(&self) -> Option<&HashMap<String, f64>> {
        self.tree.get(self.best).scores.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.tree.max_depth()
    }

    /// Best-score delta relative to the original content.
    pub fn improvement(&self) -> f64 {
        self.best_score - self.root_score
    }
}

/// The content optimizer: owns the configuration and the completion service.
pub struct Optimizer {
    config: OptimizerConfig,
    service: Arc<dyn CompletionService>,
}

impl Optimizer {
    /// Build an optimizer backed by the HTTP completion service.
    pub fn from_config(config: OptimizerConfig) -> Result<Self, OptimizeError> {
        let service = HttpCompletionService::new(&config).map_err(|err| match err {
            CompletionError::MissingApiKey => OptimizeError::MissingApiKey,
            other => OptimizeError::ServiceUnavailable(other),
        })?;
        Ok(Self {
            config,
            service: Arc::new(service),
        })
    }

    /// Build an optimizer over any completion service implementation.
    pub fn with_service(config: OptimizerConfig, service: Arc<dyn CompletionService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize `text` toward `goal` and render the result as markdown.
    ///
    /// This never fails: errors are converted into a marked error string,
    /// while success yields a report beginning with the fixed
    /// "Optimization Complete" header.
    pub async fn improve_content(
        &self,
        text: &str,
        goal: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> String {
        match self.run(text, goal, progress).await {
            Ok(result) => {
                progress.status(&format!("Done! Best score: {:.1}/10", result.best_score));
                report::render_final(&result)
            }
            Err(err) => {
                warn!(error = %err, "optimization run failed");
                report::render_error(&err)
            }
        }
    }

    /// Run the full optimization and return the structured result.
    pub async fn run(
        &self,
        text: &str,
        goal: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<Optimization, OptimizeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OptimizeError::EmptyInput);
        }

        let mut api_calls: u32 = 0;
        let mut last_error: Option<String> = None;

        progress.status("Testing API connection...");
        api_calls += 1;
        completion::probe(self.service.as_ref())
            .await
            .map_err(OptimizeError::ServiceUnavailable)?;

        progress.status("Analyzing goal...");
        let goal = match goal.map(str::trim).filter(|g| !g.is_empty()) {
            Some(goal) => goal.to_string(),
            None => self.infer_goal(text, &mut api_calls, &mut last_error).await,
        };
        info!(%goal, "optimization goal fixed for this run");
        progress.message(&format!("**Goal:** {goal}\n\n---\n\n"));

        progress.status("Generating evaluation metrics...");
        api_calls += 1;
        let metrics = metrics::generate(
            self.service.as_ref(),
            self.config.max_retries,
            &goal,
            &preview(text, 500),
        )
        .await
        .map_err(OptimizeError::MetricGeneration)?;
        progress.message(&format!(
            "**Evaluation metrics:**\n{}\n\n---\n\n",
            metrics.display_list()
        ));

        progress.status("Starting optimization search...");
        self.search(text, goal, metrics, progress, api_calls, last_error)
            .await
    }

    /// The main loop: root evaluation, then up to `max_simulations`
    /// select/expand/evaluate/backpropagate iterations.
    async fn search(
        &self,
        text: &str,
        goal: String,
        metrics: RunMetrics,
        progress: &dyn ProgressSink,
        mut api_calls: u32,
        mut last_error: Option<String>,
    ) -> Result<Optimization, OptimizeError> {
        let config = &self.config;
        let mut tree = Tree::new(text.to_string());
        let root = tree.root();
        let mut history = Vec::new();

        progress.status("Evaluating initial content...");
        let scores = self
            .score(&metrics, &goal, text, None, &mut api_calls, &last_error)
            .await?;
        let root_score = metrics.total_score(&scores);
        tree.get_mut(root).record_scores(scores);
        tree.backpropagate(root, root_score);
        history.push(ScorePoint {
            iteration: 0,
            score: root_score,
            node: root,
        });
        if config.show_intermediate {
            progress.message(&report::render_intermediate(
                &tree, &metrics, root, 0, &history, config, true,
            ));
        }

        let mut best = root;
        let mut best_score = root_score;
        let mut no_improvement: u32 = 0;
        let mut iterations: u32 = 0;

        // Every stop condition, including this shortcut, waits for the tree
        // to reach min_depth so the search cannot quit on its first look.
        if best_score >= config.early_stop_threshold && tree.max_depth() >= config.min_depth {
            progress.status("Content already excellent!");
            return Ok(finish(
                goal, metrics, tree, best, best_score, root_score, iterations, api_calls, history,
            ));
        }

        for i in 0..config.max_simulations {
            let iteration = i + 1;
            iterations = iteration;
            progress.status(&format!(
                "Iteration {iteration}/{} | Best: {best_score:.1}/10",
                config.max_simulations
            ));

            let leaf = tree.select(
                config.exploration_weight,
                config.depth_bonus,
                config.max_children,
            );
            let expandable = {
                let node = tree.get(leaf);
                node.visits > 0 && !node.is_fully_expanded(config.max_children)
            };

            if expandable {
                let weak = metrics
                    .weakest(tree.get(leaf).scores.as_ref())
                    .to_string();
                let parent_content = tree.get(leaf).content.clone();
                let (candidates, calls) = expand::generate_candidates(
                    self.service.as_ref(),
                    config,
                    &metrics,
                    &goal,
                    &parent_content,
                    &weak,
                )
                .await;
                api_calls += calls;

                // Attach every surviving candidate (respecting the child
                // bound); the unchosen ones stay banked in the tree for
                // later selection.
                let mut attached = Vec::new();
                for candidate in candidates {
                    if tree.get(leaf).is_fully_expanded(config.max_children) {
                        break;
                    }
                    attached.push(tree.add_child(
                        leaf,
                        candidate.content,
                        candidate.critique,
                        iteration,
                    ));
                }

                if attached.is_empty() {
                    // Expansion failed: re-score and backprop the leaf
                    // instead of treating this as a run-terminating error.
                    last_error =
                        Some(format!("expansion produced no valid candidate at {leaf}"));
                    debug!(node = %leaf, "expansion failed, re-scoring leaf");
                    let scores = self
                        .score(
                            &metrics,
                            &goal,
                            &parent_content,
                            Some(best_score),
                            &mut api_calls,
                            &last_error,
                        )
                        .await?;
                    let score = metrics.total_score(&scores);
                    tree.get_mut(leaf).record_scores(scores);
                    tree.backpropagate(leaf, score);
                    no_improvement += 1;
                } else {
                    let pick = rand::thread_rng().gen_range(0..attached.len());
                    let target = attached[pick];
                    let content = tree.get(target).content.clone();
                    let scores = self
                        .score(
                            &metrics,
                            &goal,
                            &content,
                            Some(best_score),
                            &mut api_calls,
                            &last_error,
                        )
                        .await?;
                    let score = metrics.total_score(&scores);
                    tree.get_mut(target).record_scores(scores);
                    tree.backpropagate(target, score);

                    if config.show_intermediate {
                        progress.message(&report::render_intermediate(
                            &tree, &metrics, target, iteration, &history, config, false,
                        ));
                    }

                    if score > best_score {
                        best = target;
                        best_score = score;
                        no_improvement = 0;
                        history.push(ScorePoint {
                            iteration,
                            score,
                            node: target,
                        });
                        progress.status(&format!("New best: {score:.1}/10!"));
                    } else {
                        no_improvement += 1;
                    }
                }
            } else {
                // Banked leaf that was never evaluated, or a saturated node:
                // score it on first visit, then reinforce the path.
                let newly_scored = tree.get(leaf).scores.is_none();
                if newly_scored {
                    let content = tree.get(leaf).content.clone();
                    let scores = self
                        .score(
                            &metrics,
                            &goal,
                            &content,
                            Some(best_score),
                            &mut api_calls,
                            &last_error,
                        )
                        .await?;
                    tree.get_mut(leaf).record_scores(scores);
                }
                let score = tree
                    .get(leaf)
                    .scores
                    .as_ref()
                    .map(|s| metrics.total_score(s))
                    .unwrap_or(1.0);
                tree.backpropagate(leaf, score);

                if newly_scored && score > best_score {
                    best = leaf;
                    best_score = score;
                    no_improvement = 0;
                    history.push(ScorePoint {
                        iteration,
                        score,
                        node: leaf,
                    });
                    progress.status(&format!("New best: {score:.1}/10!"));
                } else {
                    no_improvement += 1;
                }
            }

            progress.message(&report::render_tree_update(
                &tree, &metrics, leaf, iteration, best_score,
            ));

            let depth = tree.max_depth();
            if best_score >= config.early_stop_threshold && depth >= config.min_depth {
                progress.status(&format!("Reached target score at depth {depth}!"));
                break;
            }
            if no_improvement >= config.early_stop_patience && depth >= config.min_depth {
                progress.status(&format!(
                    "Converged after {iteration} iterations (depth {depth})"
                ));
                break;
            }
        }

        Ok(finish(
            goal, metrics, tree, best, best_score, root_score, iterations, api_calls, history,
        ))
    }

    /// One evaluation call. Transient trouble degrades inside the
    /// evaluator; a terminal service error is fatal for the run and carries
    /// the last captured diagnostic.
    async fn score(
        &self,
        metrics: &RunMetrics,
        goal: &str,
        content: &str,
        previous_best: Option<f64>,
        api_calls: &mut u32,
        last_error: &Option<String>,
    ) -> Result<HashMap<String, f64>, OptimizeError> {
        *api_calls += 1;
        evaluator::evaluate_content(
            self.service.as_ref(),
            &self.config,
            metrics,
            goal,
            content,
            previous_best,
        )
        .await
        .map_err(|source| OptimizeError::Search {
            source,
            detail: last_error.clone().unwrap_or_else(|| "none".to_string()),
        })
    }

    /// Infer a goal from the content. Failure here is non-fatal: the run
    /// continues with a generic default goal.
    async fn infer_goal(
        &self,
        text: &str,
        api_calls: &mut u32,
        last_error: &mut Option<String>,
    ) -> String {
        *api_calls += 1;
        let prompt = prompts::goal_inference_prompt(&preview(text, 1500));
        match complete_with_retries(self.service.as_ref(), &prompt, self.config.max_retries).await
        {
            Ok(goal) if goal.trim().chars().count() > 10 => goal.trim().to_string(),
            Ok(_) => prompts::DEFAULT_GOAL.to_string(),
            Err(err) => {
                warn!(error = %err, "goal inference failed, using default goal");
                *last_error = Some(err.to_string());
                prompts::DEFAULT_GOAL.to_string()
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finish(
    goal: String,
    metrics: RunMetrics,
    tree: Tree,
    best: NodeId,
    best_score: f64,
    root_score: f64,
    iterations: u32,
    api_calls: u32,
    history: Vec<ScorePoint>,
) -> Optimization {
    info!(
        best = %best,
        best_score,
        nodes = tree.len(),
        depth = tree.max_depth(),
        api_calls,
        "search finished"
    );
    Optimization {
        goal,
        metrics,
        tree,
        best,
        best_score,
        root_score,
        iterations,
        api_calls,
        history,
    }
}

/// Char-boundary-safe prefix of `text`.
fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
