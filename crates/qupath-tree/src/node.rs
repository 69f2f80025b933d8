//! Scheme-tree nodes.
//!
//! Nodes live in the arena of a [`MetaTree`](crate::MetaTree) and refer to
//! each other by [`NodeIndex`]. A branch owns its two children; the parent
//! index is only used to walk upwards.

use qupath_phys::{Edge, ExpCost, Fidelity, Grad, OpKind, Prob};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Arena slot as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier handed out by an [`IdAllocator`].
///
/// Unique among nodes created by the same allocator, except for subtrees
/// copied with [`IdPolicy::Preserve`](crate::IdPolicy::Preserve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeNodeId(pub u64);

impl fmt::Display for TreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic node id source owned by a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Allocator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { next: seed }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> TreeNodeId {
        let id = TreeNodeId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to [`next_id`](Self::next_id) returns.
    pub fn peek(&self) -> TreeNodeId {
        TreeNodeId(self.next)
    }

    /// Restart at id 0.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Runtime type of a node, used to filter searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Elementary link.
    Leaf,
    /// Result of a swap or purify.
    Branch,
}

/// Numeric node attributes that [`MetaTree::find_max`](crate::MetaTree::find_max)
/// can rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttr {
    /// Current fidelity.
    Fidelity,
    /// Current expected cost.
    Cost,
    /// ∂root-fidelity/∂node-fidelity.
    GradFidelity,
    /// ∂root-cost/∂node-count.
    GradCostCount,
    /// ∂root-cost/∂node-fidelity.
    GradCostFidelity,
    /// Fidelity gradient per unit cost.
    Efficiency,
    /// Marginal fidelity gain per marginal cost of one more purification.
    AdjustedEfficiency,
}

impl NodeAttr {
    /// Read this attribute from a node.
    pub fn value(self, node: &TreeNode) -> f64 {
        match self {
            NodeAttr::Fidelity => node.fidelity,
            NodeAttr::Cost => node.cost,
            NodeAttr::GradFidelity => node.grad.fidelity,
            NodeAttr::GradCostCount => node.grad.cost_count,
            NodeAttr::GradCostFidelity => node.grad.cost_fidelity,
            NodeAttr::Efficiency => node.efficiency,
            NodeAttr::AdjustedEfficiency => node.adjusted_efficiency,
        }
    }
}

/// Structural part of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Elementary link without children.
    Leaf,
    /// Two children combined by `op`, which succeeds with probability `prob`.
    Branch {
        /// First operand.
        left: NodeIndex,
        /// Second operand.
        right: NodeIndex,
        /// Operation applied to the children.
        op: OpKind,
        /// Success probability of `op` on the children's fidelities.
        prob: Prob,
    },
}

/// A node of a swap-purification scheme tree.
///
/// Value fields are public; the structure (kind, parent) is only changed
/// through the owning tree so it always stays strictly binary.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Node identifier.
    pub id: TreeNodeId,
    /// Link this node's pair spans.
    pub edge: Edge,
    /// Fidelity of the pair.
    pub fidelity: Fidelity,
    /// Expected number of elementary attempts to produce the pair.
    pub cost: ExpCost,
    /// Sensitivities of the root to this node.
    pub grad: Grad,
    /// `grad.fidelity / cost`.
    pub efficiency: f64,
    /// Estimated Δfidelity/Δcost of purifying this node once more.
    pub adjusted_efficiency: f64,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) kind: NodeKind,
}

impl TreeNode {
    pub(crate) fn leaf(id: TreeNodeId, edge: Edge, fidelity: Fidelity, cost: ExpCost) -> Self {
        Self {
            id,
            edge,
            fidelity,
            cost,
            grad: Grad::IDENTITY,
            efficiency: 1.0,
            adjusted_efficiency: 1.0,
            parent: None,
            kind: NodeKind::Leaf,
        }
    }

    /// The node's structure.
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent index, `None` for the root (or a detached copy).
    #[inline]
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// `true` if the node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// `true` if the node has no parent.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Runtime node type.
    #[inline]
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Leaf => NodeType::Leaf,
            NodeKind::Branch { .. } => NodeType::Branch,
        }
    }

    /// `(left, right)` children of a branch.
    #[inline]
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match self.kind {
            NodeKind::Branch { left, right, .. } => Some((left, right)),
            NodeKind::Leaf => None,
        }
    }

    /// Left child of a branch.
    #[inline]
    pub fn left(&self) -> Option<NodeIndex> {
        self.children().map(|(l, _)| l)
    }

    /// Right child of a branch.
    #[inline]
    pub fn right(&self) -> Option<NodeIndex> {
        self.children().map(|(_, r)| r)
    }

    /// Operation of a branch.
    #[inline]
    pub fn op(&self) -> Option<OpKind> {
        match self.kind {
            NodeKind::Branch { op, .. } => Some(op),
            NodeKind::Leaf => None,
        }
    }

    /// Success probability of a branch's operation.
    #[inline]
    pub fn prob(&self) -> Option<Prob> {
        match self.kind {
            NodeKind::Branch { prob, .. } => Some(prob),
            NodeKind::Leaf => None,
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.op().map_or('L', OpKind::tag);
        write!(
            f,
            "{tag} {} {}: f={:.4}, c={:.4}",
            self.id, self.edge, self.fidelity, self.cost
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(), TreeNodeId(0));
        assert_eq!(ids.next_id(), TreeNodeId(1));
        assert_eq!(ids.peek(), TreeNodeId(2));
        ids.reset();
        assert_eq!(ids.next_id(), TreeNodeId(0));
        assert_eq!(IdAllocator::with_seed(40).next_id(), TreeNodeId(40));
    }

    #[test]
    fn test_leaf_accessors() {
        let leaf = TreeNode::leaf(TreeNodeId(3), Edge::from((0, 1)), 0.9, 1.0);
        assert!(leaf.is_leaf());
        assert!(leaf.is_root());
        assert_eq!(leaf.node_type(), NodeType::Leaf);
        assert_eq!(leaf.children(), None);
        assert_eq!(leaf.op(), None);
        assert_eq!(leaf.to_string(), "L 3 (0, 1): f=0.9000, c=1.0000");
    }

    #[test]
    fn test_attr_reads_field() {
        let mut leaf = TreeNode::leaf(TreeNodeId(0), Edge::from((0, 1)), 0.9, 2.0);
        leaf.adjusted_efficiency = 0.25;
        leaf.grad = Grad::new(0.5, 0.6, 0.7);
        assert_eq!(NodeAttr::Cost.value(&leaf), 2.0);
        assert_eq!(NodeAttr::AdjustedEfficiency.value(&leaf), 0.25);
        assert_eq!(NodeAttr::GradCostFidelity.value(&leaf), 0.7);
    }
}
