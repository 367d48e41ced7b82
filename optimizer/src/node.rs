//! Search tree node representation.
//!
//! Each node holds one candidate revision of the content being optimized,
//! together with the visit/value statistics used for UCT selection.

use std::collections::HashMap;
use std::fmt;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node in the revision search tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's own arena index.
    pub id: NodeId,

    /// Parent node index (NONE for root).
    pub parent: NodeId,

    /// The text candidate this node represents.
    pub content: String,

    /// Child node indices, in attach order.
    pub children: Vec<NodeId>,

    /// Number of backpropagation passes through this node.
    pub visits: u32,

    /// Accumulated score sum across visits.
    pub value: f64,

    /// The critique that produced this node (empty for root).
    pub critique: String,

    /// Per-metric scores in [1, 10], absent until evaluated.
    /// Once set they are never mutated; a revision is only re-scored by
    /// creating a fresh node.
    pub scores: Option<HashMap<String, f64>>,

    /// Search iteration in which this node was added (0 for root).
    pub iteration_created: u32,
}

impl Node {
    /// Create the root node from the original input content.
    pub fn new_root(id: NodeId, content: String) -> Self {
        Self {
            id,
            parent: NodeId::NONE,
            content,
            children: Vec::new(),
            visits: 0,
            value: 0.0,
            critique: String::new(),
            scores: None,
            iteration_created: 0,
        }
    }

    /// Create a child node holding a rewritten candidate.
    pub fn new_child(
        id: NodeId,
        parent: NodeId,
        content: String,
        critique: String,
        iteration: u32,
    ) -> Self {
        Self {
            id,
            parent,
            content,
            children: Vec::new(),
            visits: 0,
            value: 0.0,
            critique,
            scores: None,
            iteration_created: iteration,
        }
    }

    /// Average score `value / visits`, or 0.0 if never visited.
    #[inline]
    pub fn mean_score(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value / f64::from(self.visits)
        }
    }

    /// UCT desirability of this node relative to its parent.
    ///
    /// `UCT = v/n + c * sqrt(ln(N+1)/n) + depth_bonus * depth/(depth+2)`
    ///
    /// An unvisited node scores infinity so it is always preferred for
    /// expansion. The depth term is an asymptotic bonus in `[0, depth_bonus)`
    /// that favors deeper nodes as the search matures, so the loop keeps
    /// iterating on content instead of re-scoring the same shallow draft.
    pub fn uct(&self, parent_visits: u32, depth: u32, exploration_weight: f64, depth_bonus: f64) -> f64 {
        if self.visits == 0 {
            return f64::INFINITY;
        }

        let exploitation = self.value / f64::from(self.visits);
        if parent_visits == 0 {
            return exploitation;
        }

        let exploration = exploration_weight
            * ((f64::from(parent_visits) + 1.0).ln() / f64::from(self.visits)).sqrt();
        let depth = f64::from(depth);
        let bonus = depth_bonus * (depth / (depth + 2.0));

        exploitation + exploration + bonus
    }

    /// Whether this node has reached the configured child bound.
    #[inline]
    pub fn is_fully_expanded(&self, max_children: usize) -> bool {
        self.children.len() >= max_children
    }

    /// Record evaluation scores. Scores are write-once: a second call on an
    /// already-scored node is ignored.
    pub fn record_scores(&mut self, scores: HashMap<String, f64>) {
        if self.scores.is_none() {
            self.scores = Some(scores);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_none() {
        assert!(NodeId::NONE.is_none());
        assert!(!NodeId::NONE.is_some());
        assert!(NodeId(0).is_some());
    }

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId(3).to_string(), "n3");
    }

    #[test]
    fn new_root_starts_unvisited() {
        let node = Node::new_root(NodeId(0), "draft".into());
        assert!(node.parent.is_none());
        assert_eq!(node.visits, 0);
        assert!(node.scores.is_none());
        assert!(node.children.is_empty());
        assert!(node.critique.is_empty());
    }

    #[test]
    fn mean_score_handles_unvisited() {
        let mut node = Node::new_root(NodeId(0), String::new());
        assert!(node.mean_score().abs() < 1e-9);

        node.visits = 4;
        node.value = 30.0;
        assert!((node.mean_score() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn uct_prefers_unvisited() {
        let node = Node::new_root(NodeId(0), String::new());
        assert!(node.uct(10, 1, 1.414, 0.3).is_infinite());
    }

    #[test]
    fn uct_combines_terms() {
        let mut node = Node::new_root(NodeId(0), String::new());
        node.visits = 4;
        node.value = 28.0; // mean 7.0

        // exploitation 7.0 + 1.0 * sqrt(ln(9)/4) + 0.5 * 2/4
        let expected = 7.0 + (9.0f64.ln() / 4.0).sqrt() + 0.25;
        let got = node.uct(8, 2, 1.0, 0.5);
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn uct_without_parent_visits_is_exploitation_only() {
        let mut node = Node::new_root(NodeId(0), String::new());
        node.visits = 2;
        node.value = 12.0;
        assert!((node.uct(0, 3, 1.414, 0.3) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn depth_bonus_is_asymptotic() {
        let mut node = Node::new_root(NodeId(0), String::new());
        node.visits = 1;
        node.value = 5.0;

        let shallow = node.uct(1, 0, 0.0, 0.3);
        let deep = node.uct(1, 20, 0.0, 0.3);
        assert!(deep > shallow);
        assert!(deep - shallow < 0.3);
    }

    #[test]
    fn fully_expanded_respects_bound() {
        let mut node = Node::new_root(NodeId(0), String::new());
        assert!(!node.is_fully_expanded(2));
        node.children.push(NodeId(1));
        node.children.push(NodeId(2));
        assert!(node.is_fully_expanded(2));
    }

    #[test]
    fn scores_are_write_once() {
        let mut node = Node::new_root(NodeId(0), String::new());
        let mut first = HashMap::new();
        first.insert("CLARITY".to_string(), 6.0);
        node.record_scores(first);

        let mut second = HashMap::new();
        second.insert("CLARITY".to_string(), 9.0);
        node.record_scores(second);

        let scores = node.scores.as_ref().expect("scores set");
        assert!((scores["CLARITY"] - 6.0).abs() < 1e-9);
    }
}
