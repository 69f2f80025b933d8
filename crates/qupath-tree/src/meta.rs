//! Arena-backed binary tree shared by concrete scheme trees.
//!
//! [`MetaTree`] stores every node in a `Vec` and hands out [`NodeIndex`]
//! handles. It knows nothing about how fidelities combine; it provides the
//! structural operations (adding leaves and branches, cloning subtrees,
//! re-parenting) and the generic queries (pre-order walks, rendering,
//! constrained maximum search) that [`Spst`](crate::Spst) builds on.
//!
//! Nodes are never removed individually. A rebuild clears the whole arena.

use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use qupath_phys::{Edge, ExpCost, Fidelity, OpKind, Prob, Side};
use rustc_hash::FxHashMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::{TreeError, TreeResult};
use crate::node::{IdAllocator, NodeAttr, NodeIndex, NodeKind, NodeType, TreeNode};

/// What [`MetaTree::copy_subtree`] does with node identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPolicy {
    /// Copies keep the ids of their originals, so provenance can be traced.
    Preserve,
    /// Copies draw new ids from the tree's allocator.
    Fresh,
}

/// Arena of scheme-tree nodes with an optional root.
#[derive(Debug, Clone, Default)]
pub struct MetaTree {
    nodes: Vec<TreeNode>,
    root: Option<NodeIndex>,
    ids: IdAllocator,
}

impl MetaTree {
    /// Create an empty tree with a fresh id allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree drawing ids from `ids`.
    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            ids,
        }
    }

    /// Root index, if the tree has been built.
    #[inline]
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Root node, if the tree has been built.
    pub fn root_node(&self) -> Option<&TreeNode> {
        self.root.map(|r| &self.nodes[r.index()])
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeIndex>) {
        self.root = root;
    }

    /// Number of nodes in the arena, including detached copies.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the arena holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node id allocator.
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Mutable access to the allocator, e.g. to reset it between tests.
    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    /// Drop all nodes. The allocator keeps counting.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Look up a node.
    pub fn get(&self, idx: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(idx.index())
    }

    /// Look up a node mutably.
    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut TreeNode> {
        self.nodes.get_mut(idx.index())
    }

    /// Look up a node, failing with [`TreeError::InvalidNode`].
    pub fn node(&self, idx: NodeIndex) -> TreeResult<&TreeNode> {
        self.get(idx).ok_or(TreeError::InvalidNode(idx))
    }

    /// Look up a node mutably, failing with [`TreeError::InvalidNode`].
    pub fn node_mut(&mut self, idx: NodeIndex) -> TreeResult<&mut TreeNode> {
        self.get_mut(idx).ok_or(TreeError::InvalidNode(idx))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Add a detached leaf.
    pub fn add_leaf(
        &mut self,
        edge: Edge,
        fidelity: Fidelity,
        cost: ExpCost,
    ) -> TreeResult<NodeIndex> {
        let id = self.ids.next_id();
        self.push(TreeNode::leaf(id, edge, fidelity, cost))
    }

    /// Add a branch over two detached nodes and adopt them.
    ///
    /// The branch cost is `(left.cost + right.cost) / prob`.
    pub fn add_branch(
        &mut self,
        edge: Edge,
        left: NodeIndex,
        right: NodeIndex,
        op: OpKind,
        fidelity: Fidelity,
        prob: Prob,
    ) -> TreeResult<NodeIndex> {
        if left == right {
            return Err(TreeError::InvalidArgument(format!(
                "branch children must differ, got {left} twice"
            )));
        }
        let (left_cost, right_cost) = {
            let (l, r) = (self.node(left)?, self.node(right)?);
            for (idx, child) in [(left, l), (right, r)] {
                if let Some(parent) = child.parent {
                    return Err(TreeError::InvalidArgument(format!(
                        "node {idx} is already a child of {parent}"
                    )));
                }
            }
            (l.cost, r.cost)
        };

        let id = self.ids.next_id();
        let mut branch = TreeNode::leaf(id, edge, fidelity, (left_cost + right_cost) / prob);
        branch.kind = NodeKind::Branch {
            left,
            right,
            op,
            prob,
        };
        let idx = self.push(branch)?;
        self.nodes[left.index()].parent = Some(idx);
        self.nodes[right.index()].parent = Some(idx);
        Ok(idx)
    }

    fn push(&mut self, node: TreeNode) -> TreeResult<NodeIndex> {
        let idx = node_index(self.nodes.len())?;
        self.nodes.push(node);
        Ok(idx)
    }

    /// Cut `idx` loose from its parent, returning the former parent.
    ///
    /// The parent keeps pointing at `idx` until [`replace_child`](Self::replace_child)
    /// installs a substitute.
    pub(crate) fn detach(&mut self, idx: NodeIndex) -> Option<NodeIndex> {
        self.nodes[idx.index()].parent.take()
    }

    /// Point `parent`'s slot that holds `old` at `new`, and adopt `new`.
    pub(crate) fn replace_child(&mut self, parent: NodeIndex, old: NodeIndex, new: NodeIndex) {
        if let NodeKind::Branch { left, right, .. } = &mut self.nodes[parent.index()].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
        self.nodes[new.index()].parent = Some(parent);
    }

    /// Deep-copy the subtree rooted at `idx`.
    ///
    /// The copy is detached (no parent) and shares no state with the
    /// original. With [`IdPolicy::Preserve`] the copies carry the same ids as
    /// their originals, so ids are no longer unique across the arena.
    pub fn copy_subtree(&mut self, idx: NodeIndex, policy: IdPolicy) -> TreeResult<NodeIndex> {
        self.node(idx)?;
        let order: Vec<NodeIndex> = self.preorder(idx).collect();
        let base = self.nodes.len();
        let remap: FxHashMap<NodeIndex, NodeIndex> = order
            .iter()
            .enumerate()
            .map(|(offset, &src)| Ok((src, node_index(base + offset)?)))
            .collect::<TreeResult<_>>()?;

        for &src in &order {
            let mut copy = self.nodes[src.index()].clone();
            if policy == IdPolicy::Fresh {
                copy.id = self.ids.next_id();
            }
            copy.parent = if src == idx {
                None
            } else {
                copy.parent.map(|p| remap[&p])
            };
            if let NodeKind::Branch { left, right, .. } = &mut copy.kind {
                *left = remap[&*left];
                *right = remap[&*right];
            }
            self.nodes.push(copy);
        }
        Ok(remap[&idx])
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Pre-order walk (node, left subtree, right subtree) from `idx`.
    pub fn preorder(&self, idx: NodeIndex) -> Preorder<'_> {
        let stack = if self.get(idx).is_some() {
            vec![idx]
        } else {
            Vec::new()
        };
        Preorder { tree: self, stack }
    }

    /// Strict ancestors of `idx`, nearest first.
    pub fn ancestors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.get(idx).and_then(TreeNode::parent), move |&p| {
            self.nodes[p.index()].parent
        })
    }

    /// Leaves under `idx`, left to right.
    pub fn leaves(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.preorder(idx)
            .filter(|&i| self.nodes[i.index()].is_leaf())
            .collect()
    }

    /// Number of edges on the longest path from `idx` down to a leaf.
    pub fn height(&self, idx: NodeIndex) -> usize {
        let mut height = 0;
        let mut stack = vec![(idx, 0usize)];
        while let Some((i, depth)) = stack.pop() {
            let Some(node) = self.get(i) else { continue };
            height = height.max(depth);
            if let Some((l, r)) = node.children() {
                stack.push((l, depth + 1));
                stack.push((r, depth + 1));
            }
        }
        height
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Node with the largest `attr` under `idx` among nodes whose type is in
    /// `filter`.
    ///
    /// Ties go to the node met first in pre-order. NaN scores never win.
    /// Returns `None` when nothing matches.
    pub fn find_max(&self, idx: NodeIndex, attr: NodeAttr, filter: &[NodeType]) -> Option<NodeIndex> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for i in self.preorder(idx) {
            let node = &self.nodes[i.index()];
            if !filter.contains(&node.node_type()) {
                continue;
            }
            let value = attr.value(node);
            if value.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((i, value)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Indented text rendering of the subtree at `idx`, one node per line.
    pub fn render(&self, idx: NodeIndex) -> String {
        let mut out = String::new();
        let mut stack = vec![(idx, 0usize)];
        while let Some((i, indent)) = stack.pop() {
            let Some(node) = self.get(i) else { continue };
            out.push_str(&"  ".repeat(indent));
            out.push_str(&node.to_string());
            out.push('\n');
            if let Some((l, r)) = node.children() {
                stack.push((r, indent + 1));
                stack.push((l, indent + 1));
            }
        }
        out
    }

    /// The subtree at `idx` as a `petgraph` graph, edges pointing from a
    /// branch to its children.
    pub fn to_graph(&self, idx: NodeIndex) -> DiGraph<TreeNode, Side> {
        let mut graph = DiGraph::new();
        let placed: FxHashMap<NodeIndex, _> = self
            .preorder(idx)
            .map(|i| (i, graph.add_node(self.nodes[i.index()].clone())))
            .collect();
        for i in self.preorder(idx) {
            if let Some((l, r)) = self.nodes[i.index()].children() {
                graph.add_edge(placed[&i], placed[&l], Side::Left);
                graph.add_edge(placed[&i], placed[&r], Side::Right);
            }
        }
        graph
    }

    /// Graphviz DOT rendering of the subtree at `idx`.
    pub fn to_dot(&self, idx: NodeIndex) -> String {
        format!("{}", Dot::new(&self.to_graph(idx)))
    }
}

impl Index<NodeIndex> for MetaTree {
    type Output = TreeNode;

    fn index(&self, idx: NodeIndex) -> &TreeNode {
        &self.nodes[idx.index()]
    }
}

impl IndexMut<NodeIndex> for MetaTree {
    fn index_mut(&mut self, idx: NodeIndex) -> &mut TreeNode {
        &mut self.nodes[idx.index()]
    }
}

impl fmt::Display for MetaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => f.write_str(&self.render(root)),
            None => writeln!(f, "<empty>"),
        }
    }
}

/// Iterator returned by [`MetaTree::preorder`].
pub struct Preorder<'a> {
    tree: &'a MetaTree,
    stack: Vec<NodeIndex>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let idx = self.stack.pop()?;
        if let Some((l, r)) = self.tree.nodes[idx.index()].children() {
            self.stack.push(r);
            self.stack.push(l);
        }
        Some(idx)
    }
}

/// Arena slot `pos` as a [`NodeIndex`].
fn node_index(pos: usize) -> TreeResult<NodeIndex> {
    u32::try_from(pos).map(NodeIndex).map_err(|_| {
        TreeError::InvalidArgument(format!("scheme tree cannot hold more than {} nodes", u32::MAX))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built tree: (a + b) + c, all swaps with probability 0.5.
    fn small_tree() -> (MetaTree, [NodeIndex; 5]) {
        let mut tree = MetaTree::new();
        let a = tree.add_leaf(Edge::from((0, 1)), 0.9, 1.0).unwrap();
        let b = tree.add_leaf(Edge::from((1, 2)), 0.8, 1.0).unwrap();
        let c = tree.add_leaf(Edge::from((2, 3)), 0.7, 1.0).unwrap();
        let ab = tree
            .add_branch(Edge::from((0, 2)), a, b, OpKind::Swap, 0.75, 0.5)
            .unwrap();
        let abc = tree
            .add_branch(Edge::from((0, 3)), ab, c, OpKind::Swap, 0.6, 0.5)
            .unwrap();
        tree.set_root(Some(abc));
        (tree, [a, b, c, ab, abc])
    }

    #[test]
    fn test_branch_cost_and_parents() {
        let (tree, [a, b, c, ab, abc]) = small_tree();
        assert_eq!(tree[ab].cost, 4.0);
        assert_eq!(tree[abc].cost, 10.0);
        assert_eq!(tree[a].parent(), Some(ab));
        assert_eq!(tree[b].parent(), Some(ab));
        assert_eq!(tree[c].parent(), Some(abc));
        assert!(tree[abc].is_root());
        assert_eq!(tree.root(), Some(abc));
    }

    #[test]
    fn test_node_index_bounds() {
        assert_eq!(node_index(7).unwrap(), NodeIndex(7));
        assert_eq!(node_index(u32::MAX as usize).unwrap(), NodeIndex(u32::MAX));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_node_index_overflow_is_an_error() {
        assert!(matches!(
            node_index(u32::MAX as usize + 1),
            Err(TreeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_add_branch_rejects_adopted_child() {
        let (mut tree, [a, _, c, _, _]) = small_tree();
        let result = tree.add_branch(Edge::from((0, 3)), a, c, OpKind::Swap, 0.5, 1.0);
        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
        let d = tree.add_leaf(Edge::from((3, 4)), 0.9, 1.0).unwrap();
        let result = tree.add_branch(Edge::from((3, 4)), d, d, OpKind::Purify, 0.9, 1.0);
        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
    }

    #[test]
    fn test_preorder_and_leaves() {
        let (tree, [a, b, c, ab, abc]) = small_tree();
        let order: Vec<_> = tree.preorder(abc).collect();
        assert_eq!(order, vec![abc, ab, a, b, c]);
        assert_eq!(tree.leaves(abc), vec![a, b, c]);
        assert_eq!(tree.height(abc), 2);
        assert_eq!(tree.height(c), 0);
    }

    #[test]
    fn test_ancestors() {
        let (tree, [a, _, _, ab, abc]) = small_tree();
        assert_eq!(tree.ancestors(a).collect::<Vec<_>>(), vec![ab, abc]);
        assert_eq!(tree.ancestors(abc).count(), 0);
    }

    #[test]
    fn test_copy_subtree_preserves_ids_and_detaches() {
        let (mut tree, [a, _, _, ab, _]) = small_tree();
        let before = tree.len();
        let copy = tree.copy_subtree(ab, IdPolicy::Preserve).unwrap();
        assert_eq!(tree.len(), before + 3);
        assert!(tree[copy].is_root());
        assert_eq!(tree[copy].id, tree[ab].id);
        assert_eq!(tree[copy].cost, tree[ab].cost);

        let (cl, _) = tree[copy].children().unwrap();
        assert_ne!(cl, a);
        assert_eq!(tree[cl].id, tree[a].id);
        assert_eq!(tree[cl].parent(), Some(copy));

        // Mutating the copy leaves the original untouched.
        tree.node_mut(cl).unwrap().fidelity = 0.1;
        assert_eq!(tree[a].fidelity, 0.9);
    }

    #[test]
    fn test_copy_subtree_fresh_ids() {
        let (mut tree, [_, _, _, ab, _]) = small_tree();
        let next = tree.ids().peek();
        let copy = tree.copy_subtree(ab, IdPolicy::Fresh).unwrap();
        assert_eq!(tree[copy].id, next);
        assert_ne!(tree[copy].id, tree[ab].id);
    }

    #[test]
    fn test_find_max_with_filter() {
        let (mut tree, [a, b, c, ab, abc]) = small_tree();
        assert_eq!(tree.find_max(abc, NodeAttr::Fidelity, &[NodeType::Leaf]), Some(a));
        assert_eq!(tree.find_max(abc, NodeAttr::Cost, &[NodeType::Branch]), Some(abc));
        assert_eq!(tree.find_max(c, NodeAttr::Cost, &[NodeType::Branch]), None);

        // Ties resolve to the first node in pre-order.
        tree.node_mut(b).unwrap().fidelity = 0.9;
        assert_eq!(tree.find_max(abc, NodeAttr::Fidelity, &[NodeType::Leaf]), Some(a));

        // NaN never wins.
        tree.node_mut(ab).unwrap().efficiency = f64::NAN;
        tree.node_mut(abc).unwrap().efficiency = -1.0;
        assert_eq!(
            tree.find_max(abc, NodeAttr::Efficiency, &[NodeType::Branch]),
            Some(abc)
        );
    }

    #[test]
    fn test_render_and_graph() {
        let (tree, [_, _, _, _, abc]) = small_tree();
        let text = tree.render(abc);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("S "));
        assert!(lines[1].starts_with("  S "));
        assert!(lines[2].starts_with("    L "));

        let graph = tree.to_graph(abc);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
        assert!(tree.to_dot(abc).contains("digraph"));
    }
}
