//! Revision tree with arena allocation.
//!
//! Nodes are stored in a contiguous Vec and referenced by `NodeId` indices.
//! Ids are assigned sequentially during the single-threaded attach phase, so
//! concurrent candidate generation never touches a shared counter.

use crate::node::{Node, NodeId};

/// Search tree over content revisions, rooted at the original input.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree whose root holds the original content.
    pub fn new(root_content: String) -> Self {
        let root = Node::new_root(NodeId(0), root_content);
        Self { nodes: vec![root] }
    }

    /// The root node id (always index 0).
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach a rewritten candidate under `parent`. Returns the child's id.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        content: String,
        critique: String,
        iteration: u32,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let child = Node::new_child(id, parent, content, critique, iteration);
        self.nodes.push(child);
        self.get_mut(parent).children.push(id);
        id
    }

    /// Distance of `id` from the root.
    pub fn depth(&self, id: NodeId) -> u32 {
        let mut depth = 0;
        let mut current = self.get(id).parent;
        while current.is_some() {
            depth += 1;
            current = self.get(current).parent;
        }
        depth
    }

    /// Maximum depth over all nodes currently in the tree.
    pub fn max_depth(&self) -> u32 {
        self.nodes
            .iter()
            .map(|node| self.depth(node.id))
            .max()
            .unwrap_or(0)
    }

    /// Node ids from the root down to `id`, inclusive.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = self.get(id).parent;
        while current.is_some() {
            path.push(current);
            current = self.get(current).parent;
        }
        path.reverse();
        path
    }

    /// Walk from the root and pick the node to work on this iteration.
    ///
    /// At each step: a node that still has room for children and has been
    /// visited at least once is selected for expansion; otherwise descend to
    /// the child maximizing UCT. Leaves terminate the walk.
    pub fn select(&self, exploration_weight: f64, depth_bonus: f64, max_children: usize) -> NodeId {
        let mut current = self.root();

        loop {
            let node = self.get(current);
            if node.children.is_empty() {
                return current;
            }
            if node.visits > 0 && !node.is_fully_expanded(max_children) {
                return current;
            }

            let parent_visits = node.visits;
            let child_depth = self.depth(current) + 1;
            let best = node
                .children
                .iter()
                .copied()
                .max_by(|a, b| {
                    let score_a =
                        self.get(*a)
                            .uct(parent_visits, child_depth, exploration_weight, depth_bonus);
                    let score_b =
                        self.get(*b)
                            .uct(parent_visits, child_depth, exploration_weight, depth_bonus);
                    score_a
                        .partial_cmp(&score_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

            match best {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Add `score` to `value` and increment `visits` for `id` and every
    /// ancestor up to the root.
    pub fn backpropagate(&mut self, id: NodeId, score: f64) {
        let mut current = id;
        while current.is_some() {
            let node = self.get_mut(current);
            node.visits += 1;
            node.value += score;
            current = node.parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of_three() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new("root content".into());
        let child = tree.add_child(tree.root(), "child content".into(), "crit".into(), 1);
        let grandchild = tree.add_child(child, "grandchild content".into(), "crit".into(), 2);
        (tree, child, grandchild)
    }

    #[test]
    fn new_tree_has_single_root() {
        let tree = Tree::new("hello".into());
        assert_eq!(tree.len(), 1);
        assert!(tree.get(tree.root()).parent.is_none());
        assert_eq!(tree.get(tree.root()).content, "hello");
    }

    #[test]
    fn add_child_links_both_directions() {
        let mut tree = Tree::new("root".into());
        let child = tree.add_child(tree.root(), "better root".into(), "be better".into(), 1);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(tree.root()).children, vec![child]);
        assert_eq!(tree.get(child).parent, tree.root());
        assert_eq!(tree.get(child).iteration_created, 1);
    }

    #[test]
    fn backpropagate_touches_exactly_the_path_to_root() {
        let mut tree = Tree::new("root".into());
        let left = tree.add_child(tree.root(), "left".into(), String::new(), 1);
        let right = tree.add_child(tree.root(), "right".into(), String::new(), 1);
        let leaf = tree.add_child(left, "left-left".into(), String::new(), 2);

        tree.backpropagate(leaf, 6.0);

        assert_eq!(tree.get(leaf).visits, 1);
        assert_eq!(tree.get(left).visits, 1);
        assert_eq!(tree.get(tree.root()).visits, 1);
        // Off-path sibling is untouched.
        assert_eq!(tree.get(right).visits, 0);

        assert!((tree.get(leaf).value - 6.0).abs() < 1e-9);
        assert!((tree.get(tree.root()).value - 6.0).abs() < 1e-9);
    }

    #[test]
    fn visits_are_non_decreasing_across_backprops() {
        let (mut tree, child, grandchild) = chain_of_three();
        tree.backpropagate(grandchild, 5.0);
        tree.backpropagate(child, 7.0);

        assert_eq!(tree.get(tree.root()).visits, 2);
        assert_eq!(tree.get(child).visits, 2);
        assert_eq!(tree.get(grandchild).visits, 1);
        assert!((tree.get(child).value - 12.0).abs() < 1e-9);
    }

    #[test]
    fn depth_and_max_depth() {
        let (tree, child, grandchild) = chain_of_three();
        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.depth(child), 1);
        assert_eq!(tree.depth(grandchild), 2);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn path_to_root_orders_root_first() {
        let (tree, child, grandchild) = chain_of_three();
        assert_eq!(tree.path_to_root(grandchild), vec![tree.root(), child, grandchild]);
    }

    #[test]
    fn select_returns_root_when_leafless() {
        let tree = Tree::new("root".into());
        assert_eq!(tree.select(1.414, 0.3, 3), tree.root());
    }

    #[test]
    fn select_prefers_unvisited_child() {
        let mut tree = Tree::new("root".into());
        let visited = tree.add_child(tree.root(), "a".into(), String::new(), 1);
        let unvisited = tree.add_child(tree.root(), "b".into(), String::new(), 1);

        // Root fully expanded with max_children = 2; one child has a strong
        // record, the other has never been visited.
        tree.backpropagate(visited, 9.5);
        tree.get_mut(tree.root()).visits += 1;

        let selected = tree.select(1.414, 0.3, 2);
        assert_eq!(selected, unvisited);
    }

    #[test]
    fn select_stops_at_expandable_visited_node() {
        let mut tree = Tree::new("root".into());
        let child = tree.add_child(tree.root(), "a".into(), String::new(), 1);
        tree.backpropagate(child, 5.0);

        // Root is visited and has room for more children, so it is the
        // expansion target even though it already has a child.
        let selected = tree.select(1.414, 0.3, 3);
        assert_eq!(selected, tree.root());
    }

    #[test]
    fn select_descends_when_fully_expanded() {
        let mut tree = Tree::new("root".into());
        let a = tree.add_child(tree.root(), "a".into(), String::new(), 1);
        let b = tree.add_child(tree.root(), "b".into(), String::new(), 1);
        tree.backpropagate(a, 4.0);
        tree.backpropagate(b, 8.0);

        let selected = tree.select(0.5, 0.0, 2);
        assert_eq!(selected, b);
    }
}
