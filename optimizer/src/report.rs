//! Markdown rendering for intermediate and final results.
//!
//! Everything here is pure string formatting over the finished (or
//! in-progress) tree: score tables with bar gauges, a mermaid view of the
//! search tree, the root-to-best improvement path, and a sparkline of the
//! best-score trajectory.

use std::collections::HashMap;

use crate::config::OptimizerConfig;
use crate::metrics::{display_name, RunMetrics};
use crate::node::NodeId;
use crate::search::{Optimization, OptimizeError, ScorePoint};
use crate::tree::Tree;

/// Sparkline glyphs, lowest to highest.
const SPARK_BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render a failed run as a marked error string.
pub fn render_error(err: &OptimizeError) -> String {
    format!("⚠️ **Error:** {err}")
}

/// Render the final report for a successful run.
///
/// The report always begins with the fixed "Optimization Complete" header,
/// followed by the goal, the per-metric score table, run stats, the full
/// optimized content, and collapsible tree/path/metrics sections.
pub fn render_final(result: &Optimization) -> String {
    let best = result.tree.get(result.best);
    let empty = HashMap::new();
    let scores = best.scores.as_ref().unwrap_or(&empty);
    let total = result.best_score;

    let score_rows = result
        .metrics
        .names()
        .iter()
        .map(|name| {
            let s = scores.get(name).copied().unwrap_or(0.0);
            format!(
                "| {} | {} | **{s:.1}** | {} |",
                display_name(name),
                score_bar(s),
                clip_chars(result.metrics.description(name), 50),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let improvement = result.improvement();
    let improvement_str = if improvement > 0.0 {
        format!("+{improvement:.1}")
    } else {
        format!("{improvement:.1}")
    };

    format!(
        "## ✨ Optimization Complete!\n\
         \n\
         ### 🎯 Goal\n\
         {goal}\n\
         \n\
         ### 📊 Final Scores\n\
         \n\
         | Metric | Progress | Score | Description |\n\
         |--------|----------|-------|-------------|\n\
         {score_rows}\n\
         \n\
         **Overall Score: {total:.1}/10** ({improvement_str} improvement)\n\
         \n\
         ### 📈 Stats\n\
         - **Nodes explored:** {nodes}\n\
         - **Iterations:** {iterations}\n\
         - **API calls:** {api_calls}\n\
         - **Starting score:** {root_score:.1}/10\n\
         - **Final score:** {total:.1}/10\n\
         \n\
         ---\n\
         \n\
         ## 📝 Optimized Content\n\
         \n\
         {content}\n\
         \n\
         ---\n\
         \n\
         <details>\n\
         <summary>🌳 Final Search Tree</summary>\n\
         \n\
         {tree}\n\
         \n\
         </details>\n\
         \n\
         <details>\n\
         <summary>📈 Improvement Path</summary>\n\
         \n\
         {path}\n\
         \n\
         </details>\n\
         \n\
         <details>\n\
         <summary>🎯 Metrics Used</summary>\n\
         \n\
         {metrics}\n\
         \n\
         </details>\n",
        goal = result.goal,
        nodes = result.node_count(),
        iterations = result.iterations,
        api_calls = result.api_calls,
        root_score = result.root_score,
        content = best.content,
        tree = mermaid(&result.tree, &result.metrics, Some(result.best)),
        path = improvement_path(&result.tree, &result.metrics, result.best),
        metrics = result.metrics.display_list(),
    )
}

/// Render one node's result mid-run: score table, trajectory so far, the
/// applied critique, and a collapsed content preview.
pub fn render_intermediate(
    tree: &Tree,
    metrics: &RunMetrics,
    id: NodeId,
    iteration: u32,
    history: &[ScorePoint],
    config: &OptimizerConfig,
    is_initial: bool,
) -> String {
    let node = tree.get(id);
    let empty = HashMap::new();
    let scores = node.scores.as_ref().unwrap_or(&empty);
    let total = metrics.total_score(scores);
    let weak = metrics.weakest(node.scores.as_ref());

    let score_rows = metrics
        .names()
        .iter()
        .map(|name| {
            let s = scores.get(name).copied().unwrap_or(0.0);
            let marker = if name.as_str() == weak { " ⚠️" } else { "" };
            format!("| {} | {} | {s:.1}{marker} |", display_name(name), score_bar(s))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let header = if is_initial {
        format!("### 📋 Initial Content (Score: {total:.1}/10)")
    } else {
        format!(
            "### 🔄 Iteration {iteration} → Node {id} (Score: {total:.1}/10 | Depth: {})",
            tree.depth(id)
        )
    };

    let critique_section = if node.critique.is_empty() {
        String::new()
    } else {
        format!(
            "\n**Applied Critique:** {}{}\n",
            clip_chars(&node.critique, 200),
            if node.critique.chars().count() > 200 { "..." } else { "" },
        )
    };

    let preview = clip_chars(&node.content, config.preview_length);
    let ellipsis = if node.content.chars().count() > config.preview_length {
        "..."
    } else {
        ""
    };

    format!(
        "\n{header}\n\
         \n\
         {trajectory}\n\
         \n\
         | Metric | Score | Value |\n\
         |--------|-------|-------|\n\
         {score_rows}\n\
         \n\
         **Total: {total:.1}/10** | Weakest: {weakest} | Strictness: {strictness}\n\
         {critique_section}\n\
         <details>\n\
         <summary>📄 Content Preview</summary>\n\
         \n\
         {preview}{ellipsis}\n\
         \n\
         </details>\n\
         \n\
         ---\n\n",
        trajectory = trajectory(history),
        weakest = display_name(weak),
        strictness = config.grading_strictness,
    )
}

/// Render the collapsible tree snapshot emitted after each iteration.
pub fn render_tree_update(
    tree: &Tree,
    metrics: &RunMetrics,
    current: NodeId,
    iteration: u32,
    best_score: f64,
) -> String {
    format!(
        "\n<details open>\n\
         <summary>🌳 Search Tree (Iteration {iteration}) | Best: {best_score:.1}/10 | Nodes: {nodes} | Depth: {depth}</summary>\n\
         \n\
         {mermaid}\n\
         \n\
         </details>\n\n",
        nodes = tree.len(),
        depth = tree.max_depth(),
        mermaid = mermaid(tree, metrics, Some(current)),
    )
}

/// Best-score history as a sparkline plus the last few best nodes.
fn trajectory(history: &[ScorePoint]) -> String {
    let Some(first) = history.first() else {
        return String::new();
    };
    let last = history.last().unwrap_or(first);
    if history.len() < 2 {
        return format!("📈 **Trajectory:** {:.1}", first.score);
    }

    let min = history.iter().map(|p| p.score).fold(f64::INFINITY, f64::min);
    let max = history.iter().map(|p| p.score).fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };

    let sparkline: String = history
        .iter()
        .map(|p| {
            let idx = ((p.score - min) / range * 8.0) as usize;
            SPARK_BLOCKS[idx.min(8)]
        })
        .collect();

    let tail = history.len().saturating_sub(5);
    let path = history[tail..]
        .iter()
        .map(|p| format!("{}({:.1})", p.node, p.score))
        .collect::<Vec<_>>()
        .join(" → ");

    format!(
        "📈 **Trajectory:** {:.1} {sparkline} {:.1}\n   Path: {path}",
        first.score, last.score
    )
}

/// `█`/`░` gauge out of ten for a score.
fn score_bar(score: f64) -> String {
    let filled = (score.clamp(0.0, 10.0) as usize).min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// The root-to-best chain with per-step critiques.
fn improvement_path(tree: &Tree, metrics: &RunMetrics, best: NodeId) -> String {
    let mut lines = Vec::new();
    for (i, id) in tree.path_to_root(best).into_iter().enumerate() {
        let node = tree.get(id);
        let score = node
            .scores
            .as_ref()
            .map(|s| metrics.total_score(s))
            .unwrap_or(0.0);
        if i == 0 {
            lines.push(format!("⚑ **{id}** (initial) - Score: {score:.1}/10"));
        } else {
            lines.push(format!(
                "→ **{id}** (iter {}) - Score: {score:.1}/10",
                node.iteration_created
            ));
            lines.push(format!("   *Critique: {}*", clip_chars(&node.critique, 100)));
        }
    }
    lines.join("\n")
}

/// Mermaid `graph TD` over the whole tree. Node labels carry the mean score,
/// visit count, and weakest metric; edges carry the score delta; fills band
/// nodes by score, with the selected node outlined.
fn mermaid(tree: &Tree, metrics: &RunMetrics, selected: Option<NodeId>) -> String {
    let mut lines = vec!["```mermaid".to_string(), "graph TD".to_string()];
    mermaid_node(tree, metrics, tree.root(), selected, &mut lines);
    lines.push("```".to_string());
    lines.join("\n")
}

fn mermaid_node(
    tree: &Tree,
    metrics: &RunMetrics,
    id: NodeId,
    selected: Option<NodeId>,
    lines: &mut Vec<String>,
) {
    let node = tree.get(id);
    let score = node.mean_score();
    let weak = match node.scores.as_ref() {
        Some(scores) => clip_chars(metrics.weakest(Some(scores)), 4),
        None => String::new(),
    };

    lines.push(format!(
        "    {id}[\"{id}<br/>s:{score:.1} v:{}<br/>{weak}\"]",
        node.visits
    ));

    if selected == Some(id) {
        lines.push(format!("    style {id} stroke:#00ff00,stroke-width:4px"));
    } else if score >= 8.0 {
        lines.push(format!("    style {id} fill:#90EE90,stroke:#228B22"));
    } else if score >= 6.0 {
        lines.push(format!("    style {id} fill:#FFE4B5,stroke:#DDA000"));
    } else if score >= 4.0 {
        lines.push(format!("    style {id} fill:#FFB6C1,stroke:#DC143C"));
    } else {
        lines.push(format!("    style {id} fill:#FF6B6B,stroke:#8B0000"));
    }

    for &child in &node.children {
        mermaid_node(tree, metrics, child, selected, lines);
        let diff = tree.get(child).mean_score() - score;
        let diff_str = if diff > 0.0 {
            format!("+{diff:.1}")
        } else {
            format!("{diff:.1}")
        };
        lines.push(format!("    {id} -->|{diff_str}| {child}"));
    }
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored_tree() -> (Tree, RunMetrics, NodeId) {
        let metrics = RunMetrics::fallback();
        let mut tree = Tree::new("the original draft of this content".into());

        let root_scores: HashMap<String, f64> = metrics
            .names()
            .iter()
            .map(|n| (n.clone(), 5.0))
            .collect();
        tree.get_mut(tree.root()).record_scores(root_scores);
        tree.backpropagate(tree.root(), 5.0);

        let child = tree.add_child(
            tree.root(),
            "a much better draft of this content".into(),
            "Tighten the opening paragraph".into(),
            1,
        );
        let child_scores: HashMap<String, f64> = metrics
            .names()
            .iter()
            .map(|n| (n.clone(), 8.0))
            .collect();
        tree.get_mut(child).record_scores(child_scores);
        tree.backpropagate(child, 8.0);

        (tree, metrics, child)
    }

    fn sample_optimization() -> Optimization {
        let (tree, metrics, best) = scored_tree();
        let root = tree.root();
        Optimization {
            goal: "Make it clearer".into(),
            metrics,
            tree,
            best,
            best_score: 8.0,
            root_score: 5.0,
            iterations: 1,
            api_calls: 4,
            history: vec![
                ScorePoint { iteration: 0, score: 5.0, node: root },
                ScorePoint { iteration: 1, score: 8.0, node: best },
            ],
        }
    }

    #[test]
    fn final_report_has_fixed_header_and_sections() {
        let report = render_final(&sample_optimization());
        assert!(report.starts_with("## ✨ Optimization Complete!"));
        assert!(report.contains("### 📊 Final Scores"));
        assert!(report.contains("Make it clearer"));
        assert!(report.contains("a much better draft of this content"));
        assert!(report.contains("**Overall Score: 8.0/10** (+3.0 improvement)"));
        assert!(report.contains("```mermaid"));
    }

    #[test]
    fn error_report_is_marked() {
        let report = render_error(&OptimizeError::EmptyInput);
        assert!(report.starts_with("⚠️ **Error:**"));
        assert!(report.contains("no text provided"));
    }

    #[test]
    fn mermaid_labels_edges_with_score_delta() {
        let (tree, metrics, child) = scored_tree();
        let graph = mermaid(&tree, &metrics, Some(child));
        assert!(graph.contains("graph TD"));
        assert!(graph.contains("n0 -->|+3.0| n1"));
        // Selected node gets the outline, not a score band fill.
        assert!(graph.contains("style n1 stroke:#00ff00"));
    }

    #[test]
    fn mermaid_bands_fill_by_score() {
        let (tree, metrics, _) = scored_tree();
        let graph = mermaid(&tree, &metrics, None);
        // Root mean 5.0 lands in the 4..6 band, child 8.0 in the green band.
        assert!(graph.contains("style n0 fill:#FFB6C1"));
        assert!(graph.contains("style n1 fill:#90EE90"));
    }

    #[test]
    fn score_bar_fills_proportionally() {
        assert_eq!(score_bar(0.0), "░░░░░░░░░░");
        assert_eq!(score_bar(7.4), "███████░░░");
        assert_eq!(score_bar(10.0), "██████████");
        assert_eq!(score_bar(42.0), "██████████");
    }

    #[test]
    fn trajectory_sparkline_spans_min_to_max() {
        let history = vec![
            ScorePoint { iteration: 0, score: 4.0, node: NodeId(0) },
            ScorePoint { iteration: 1, score: 6.0, node: NodeId(1) },
            ScorePoint { iteration: 2, score: 8.0, node: NodeId(2) },
        ];
        let line = trajectory(&history);
        assert!(line.starts_with("📈 **Trajectory:** 4.0"));
        assert!(line.ends_with("n0(4.0) → n1(6.0) → n2(8.0)"));
        assert!(line.contains('█'));
    }

    #[test]
    fn trajectory_handles_short_history() {
        assert_eq!(trajectory(&[]), "");
        let single = vec![ScorePoint { iteration: 0, score: 7.0, node: NodeId(0) }];
        assert_eq!(trajectory(&single), "📈 **Trajectory:** 7.0");
    }

    #[test]
    fn improvement_path_walks_root_to_best() {
        let (tree, metrics, child) = scored_tree();
        let path = improvement_path(&tree, &metrics, child);
        let lines: Vec<&str> = path.lines().collect();
        assert!(lines[0].starts_with("⚑ **n0** (initial)"));
        assert!(lines[1].contains("**n1** (iter 1) - Score: 8.0/10"));
        assert!(lines[2].contains("Tighten the opening paragraph"));
    }
}
