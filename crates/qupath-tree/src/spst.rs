//! Swap-purification scheme tree.
//!
//! An [`Spst`] owns the elementary links of a path, the [`Gate`] that
//! combines them and a [`MetaTree`] recording the order of operations.
//! After [`build`](Spst::build) the tree can be queried and grown:
//!
//! - [`grad`](Spst::grad) pushes root sensitivities down to every node,
//! - [`calc_efficiency`](Spst::calc_efficiency) scores each node,
//! - [`purify`](Spst::purify) adds one purification round on a node,
//! - [`virtual_purify`](Spst::virtual_purify) predicts the root after such a
//!   round without touching the tree,
//! - [`backward`](Spst::backward) re-evaluates the ancestors of a branch.

use qupath_phys::{Edge, ExpCost, Fidelity, Gate, Grad, OpKind, PhysError, Side};
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::{debug, trace};

use crate::alloc::{Alloc, ExpAlloc};
use crate::error::{TreeError, TreeResult};
use crate::meta::{IdPolicy, MetaTree};
use crate::node::{IdAllocator, NodeAttr, NodeIndex, NodeKind, NodeType, TreeNode};
use crate::strategy::BuildStrategy;

/// Swap-purification scheme tree over one repeater path.
#[derive(Debug, Clone)]
pub struct Spst {
    tree: MetaTree,
    edges: Vec<Edge>,
    fids: Vec<Fidelity>,
    gate: Gate,
    strategy: Option<BuildStrategy>,
}

impl Spst {
    /// Create an unbuilt tree over the links of `path`, in path order.
    ///
    /// Fails if the path is empty, a link appears twice, or a fidelity lies
    /// outside `(0, 1]`.
    pub fn new(path: impl IntoIterator<Item = (Edge, Fidelity)>, gate: Gate) -> TreeResult<Self> {
        Self::with_allocator(path, gate, IdAllocator::new())
    }

    /// Like [`new`](Self::new), drawing node ids from `ids`.
    pub fn with_allocator(
        path: impl IntoIterator<Item = (Edge, Fidelity)>,
        gate: Gate,
        ids: IdAllocator,
    ) -> TreeResult<Self> {
        let (edges, fids): (Vec<Edge>, Vec<Fidelity>) = path.into_iter().unzip();
        if edges.is_empty() {
            return Err(TreeError::InvalidArgument(
                "path must contain at least one link".into(),
            ));
        }
        let mut seen = FxHashSet::default();
        for (edge, &f) in edges.iter().zip(&fids) {
            if !seen.insert(*edge) {
                return Err(TreeError::InvalidArgument(format!(
                    "link {edge} appears more than once"
                )));
            }
            check_fidelity(f)?;
        }
        Ok(Self {
            tree: MetaTree::with_allocator(ids),
            edges,
            fids,
            gate,
            strategy: None,
        })
    }

    /// Links in path order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Initial link fidelities, aligned with [`edges`](Self::edges).
    pub fn fids(&self) -> &[Fidelity] {
        &self.fids
    }

    /// The gate used for every (re-)evaluation.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Strategy of the last successful build.
    pub fn strategy(&self) -> Option<BuildStrategy> {
        self.strategy
    }

    /// The underlying tree.
    pub fn tree(&self) -> &MetaTree {
        &self.tree
    }

    /// Root index, if built.
    pub fn root(&self) -> Option<NodeIndex> {
        self.tree.root()
    }

    /// Root index, failing with [`TreeError::EmptyTree`] before `build`.
    pub fn root_index(&self) -> TreeResult<NodeIndex> {
        self.tree.root().ok_or(TreeError::EmptyTree)
    }

    /// Root node, failing with [`TreeError::EmptyTree`] before `build`.
    pub fn root_node(&self) -> TreeResult<&TreeNode> {
        self.tree.root_node().ok_or(TreeError::EmptyTree)
    }

    /// Look up a node.
    pub fn node(&self, idx: NodeIndex) -> TreeResult<&TreeNode> {
        self.tree.node(idx)
    }

    /// End-to-end `(fidelity, cost)` at the root.
    pub fn root_state(&self) -> TreeResult<(Fidelity, ExpCost)> {
        let root = self.root_node()?;
        Ok((root.fidelity, root.cost))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build the initial tree and return its root.
    ///
    /// One leaf per link is seeded with the link's fidelity and cost 1, or
    /// `costs[i]` when overrides are given. Any previous tree is discarded;
    /// the id allocator keeps counting.
    pub fn build(
        &mut self,
        strategy: BuildStrategy,
        costs: Option<&[ExpCost]>,
    ) -> TreeResult<NodeIndex> {
        let merge_all: fn(&mut Self, Vec<NodeIndex>) -> TreeResult<NodeIndex> = match strategy {
            BuildStrategy::Linked => Self::build_linked,
            BuildStrategy::Balanced => Self::build_balanced,
            BuildStrategy::StOpt => Self::build_st_opt,
            BuildStrategy::PtOpt => {
                return Err(TreeError::NotImplemented(format!(
                    "tree build strategy '{strategy}'"
                )));
            }
        };
        if let Some(costs) = costs {
            if costs.len() != self.edges.len() {
                return Err(TreeError::InvalidArgument(format!(
                    "{} cost overrides for {} links",
                    costs.len(),
                    self.edges.len()
                )));
            }
            if let Some(bad) = costs.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
                return Err(TreeError::InvalidArgument(format!(
                    "leaf cost must be positive and finite, got {bad}"
                )));
            }
        }

        self.tree.clear();
        let leaves = (0..self.edges.len())
            .map(|i| {
                let cost = costs.map_or(1.0, |c| c[i]);
                self.tree.add_leaf(self.edges[i], self.fids[i], cost)
            })
            .collect::<TreeResult<Vec<NodeIndex>>>()?;

        let root = merge_all(self, leaves)?;
        self.tree.set_root(Some(root));
        self.strategy = Some(strategy);

        let node = &self.tree[root];
        debug!(
            strategy = %strategy,
            leaves = self.edges.len(),
            nodes = self.tree.len(),
            fidelity = node.fidelity,
            cost = node.cost,
            "Built scheme tree"
        );
        Ok(root)
    }

    /// Combine two detached nodes with `op` into a new branch.
    fn merge(
        &mut self,
        op: OpKind,
        edge: Edge,
        left: NodeIndex,
        right: NodeIndex,
    ) -> TreeResult<NodeIndex> {
        let (f, prob) = self
            .gate
            .apply(op, self.tree[left].fidelity, self.tree[right].fidelity);
        self.tree.add_branch(edge, left, right, op, f, prob)
    }

    /// Fold front to back: purify the first two, put the result back first.
    fn build_linked(&mut self, leaves: Vec<NodeIndex>) -> TreeResult<NodeIndex> {
        let mut nodes = leaves.into_iter();
        let Some(mut acc) = nodes.next() else {
            return Err(TreeError::EmptyTree);
        };
        for next in nodes {
            let edge = self.tree[acc].edge;
            acc = self.merge(OpKind::Purify, edge, acc, next)?;
        }
        Ok(acc)
    }

    /// Swap neighbours pairwise per round; an odd last node waits a round.
    fn build_balanced(&mut self, leaves: Vec<NodeIndex>) -> TreeResult<NodeIndex> {
        let mut current = leaves;
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                match *pair {
                    [l, r] => {
                        let edge = self.tree[l].edge.span(&self.tree[r].edge);
                        next.push(self.merge(OpKind::Swap, edge, l, r)?);
                    }
                    _ => next.extend_from_slice(pair),
                }
            }
            current = next;
        }
        current.pop().ok_or(TreeError::EmptyTree)
    }

    /// Repeatedly swap the adjacent pair with the smallest summed cost.
    fn build_st_opt(&mut self, leaves: Vec<NodeIndex>) -> TreeResult<NodeIndex> {
        let mut nodes = leaves;
        while nodes.len() > 1 {
            let mut best = 0;
            let mut best_cost = f64::INFINITY;
            for (i, pair) in nodes.windows(2).enumerate() {
                let cost = self.tree[pair[0]].cost + self.tree[pair[1]].cost;
                if cost < best_cost {
                    best_cost = cost;
                    best = i;
                }
            }
            let (l, r) = (nodes[best], nodes[best + 1]);
            let edge = self.tree[l].edge.span(&self.tree[r].edge);
            let merged = self.merge(OpKind::Swap, edge, l, r)?;
            nodes[best] = merged;
            nodes.remove(best + 1);
        }
        nodes.pop().ok_or(TreeError::EmptyTree)
    }

    // ------------------------------------------------------------------
    // Gradients and scores
    // ------------------------------------------------------------------

    /// Propagate gradients from `idx` down to all its descendants.
    ///
    /// `idx` stores `inbound`; every child stores its local partial
    /// derivative (left operand for the left child, right for the right)
    /// multiplied elementwise by its parent's gradient.
    pub fn grad(&mut self, idx: NodeIndex, inbound: Grad) -> TreeResult<()> {
        self.tree.node_mut(idx)?.grad = inbound;
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            let node = &self.tree[i];
            let NodeKind::Branch {
                left, right, op, ..
            } = *node.kind()
            else {
                continue;
            };
            let upstream = node.grad;
            let (l, r) = (&self.tree[left], &self.tree[right]);
            let (fl, fr, cl, cr) = (l.fidelity, r.fidelity, l.cost, r.cost);
            let grad_l = self.gate.op_grad(op, fl, fr, cl, cr, Side::Left) * upstream;
            let grad_r = self.gate.op_grad(op, fl, fr, cl, cr, Side::Right) * upstream;
            self.tree[left].grad = grad_l;
            self.tree[right].grad = grad_r;
            stack.push(right);
            stack.push(left);
        }
        Ok(())
    }

    /// [`grad`](Self::grad) from the root with the identity gradient.
    pub fn grad_root(&mut self) -> TreeResult<()> {
        let root = self.root_index()?;
        self.grad(root, Grad::IDENTITY)
    }

    /// Score `idx` and its descendants in pre-order.
    ///
    /// `efficiency = grad.fidelity / cost`. `adjusted_efficiency` is the
    /// first-order root fidelity gain per root cost increase of purifying
    /// the node with a copy of itself. Run [`grad`](Self::grad) first.
    pub fn calc_efficiency(&mut self, idx: NodeIndex) -> TreeResult<()> {
        self.tree.node(idx)?;
        let order: Vec<NodeIndex> = self.tree.preorder(idx).collect();
        for i in order {
            let (purified, _) = {
                let f = self.tree[i].fidelity;
                self.gate.purify(f, f)
            };
            let node = &mut self.tree[i];
            let gain = purified - node.fidelity;
            let d_fid = gain * node.grad.fidelity;
            let d_cost = gain * node.grad.cost_fidelity + node.cost * node.grad.cost_count;
            node.efficiency = node.grad.fidelity / node.cost;
            node.adjusted_efficiency = d_fid / d_cost;
        }
        Ok(())
    }

    /// Node under `idx` with the largest `attr` among the types in `filter`.
    pub fn find_max(
        &self,
        idx: NodeIndex,
        attr: NodeAttr,
        filter: &[NodeType],
    ) -> TreeResult<Option<NodeIndex>> {
        self.tree.node(idx)?;
        Ok(self.tree.find_max(idx, attr, filter))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Recompute fidelity, probability and cost of every ancestor of the
    /// branch `idx`, bottom-up to the root.
    pub fn backward(&mut self, idx: NodeIndex) -> TreeResult<()> {
        if self.tree.node(idx)?.is_leaf() {
            return Err(TreeError::InvalidArgument(format!(
                "backward must start from a branch, {idx} is a leaf"
            )));
        }
        self.reevaluate_ancestors(idx);
        Ok(())
    }

    /// Overwrite the fidelity of `idx` and re-evaluate its ancestors.
    pub fn set_fidelity(&mut self, idx: NodeIndex, fidelity: Fidelity) -> TreeResult<()> {
        check_fidelity(fidelity)?;
        self.tree.node_mut(idx)?.fidelity = fidelity;
        self.reevaluate_ancestors(idx);
        Ok(())
    }

    fn reevaluate_ancestors(&mut self, idx: NodeIndex) {
        let chain: Vec<NodeIndex> = self.tree.ancestors(idx).collect();
        for a in chain {
            let NodeKind::Branch {
                left, right, op, ..
            } = *self.tree[a].kind()
            else {
                continue;
            };
            let (l, r) = (&self.tree[left], &self.tree[right]);
            let (cl, cr) = (l.cost, r.cost);
            let (f, p) = self.gate.apply(op, l.fidelity, r.fidelity);
            let node = &mut self.tree[a];
            node.fidelity = f;
            node.cost = (cl + cr) / p;
            if let NodeKind::Branch { prob, .. } = &mut node.kind {
                *prob = p;
            }
            trace!(node = %node.id, op = %op, fidelity = f, cost = node.cost, "Re-evaluated");
        }
    }

    /// Purify `idx` with a fresh copy of its subtree and return the new
    /// branch.
    ///
    /// The branch takes `idx`'s place (becoming the root if `idx` was the
    /// root), with the copy on the left and `idx` on the right. Ancestors
    /// are re-evaluated before returning.
    pub fn purify(&mut self, idx: NodeIndex) -> TreeResult<NodeIndex> {
        self.tree.node(idx)?;
        let copy = self.tree.copy_subtree(idx, IdPolicy::Fresh)?;
        let (f, prob) = self
            .gate
            .purify(self.tree[copy].fidelity, self.tree[idx].fidelity);
        let edge = self.tree[idx].edge;

        let parent = self.tree.detach(idx);
        let branch = self.tree.add_branch(edge, copy, idx, OpKind::Purify, f, prob)?;
        match parent {
            Some(p) => self.tree.replace_child(p, idx, branch),
            None => self.tree.set_root(Some(branch)),
        }
        self.reevaluate_ancestors(branch);

        debug!(
            node = %self.tree[idx].id,
            edge = %edge,
            fidelity = f,
            nodes = self.tree.len(),
            "Purified node"
        );
        Ok(branch)
    }

    /// Root `(fidelity, cost)` that [`purify`](Self::purify) on `idx` would
    /// produce, computed without mutating the tree.
    pub fn virtual_purify(&self, idx: NodeIndex) -> TreeResult<(Fidelity, ExpCost)> {
        let node = self.tree.node(idx)?;
        let (mut f, prob) = self.gate.purify(node.fidelity, node.fidelity);
        let mut c = (node.cost + node.cost) / prob;
        let mut child = idx;
        for a in self.tree.ancestors(idx) {
            let NodeKind::Branch {
                left, right, op, ..
            } = *self.tree[a].kind()
            else {
                continue;
            };
            let (fl, fr, cl, cr) = if left == child {
                let r = &self.tree[right];
                (f, r.fidelity, c, r.cost)
            } else {
                let l = &self.tree[left];
                (l.fidelity, f, l.cost, c)
            };
            let (nf, p) = self.gate.apply(op, fl, fr);
            f = nf;
            c = (cl + cr) / p;
            child = a;
        }
        Ok((f, c))
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Number of elementary pairs (leaves) the tree uses per link.
    pub fn allocation(&self) -> TreeResult<Alloc> {
        let root = self.root_index()?;
        let mut alloc = Alloc::new();
        for i in self.tree.leaves(root) {
            *alloc.entry(self.tree[i].edge).or_default() += 1;
        }
        Ok(alloc)
    }

    /// Expected elementary attempts per link.
    ///
    /// A leaf contributes its cost divided by the success probability of
    /// every operation above it; the values sum to the root cost.
    pub fn expected_allocation(&self) -> TreeResult<ExpAlloc> {
        let root = self.root_index()?;
        let mut alloc = ExpAlloc::new();
        let mut stack = vec![(root, 1.0)];
        while let Some((i, scale)) = stack.pop() {
            let node = &self.tree[i];
            match *node.kind() {
                NodeKind::Leaf => *alloc.entry(node.edge).or_default() += node.cost * scale,
                NodeKind::Branch {
                    left, right, prob, ..
                } => {
                    stack.push((right, scale / prob));
                    stack.push((left, scale / prob));
                }
            }
        }
        Ok(alloc)
    }
}

impl fmt::Display for Spst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.tree, f)
    }
}

fn check_fidelity(f: Fidelity) -> TreeResult<()> {
    if f > 0.0 && f <= 1.0 {
        Ok(())
    } else {
        Err(PhysError::InvalidParameter(format!("fidelity must be in (0, 1], got {f}")).into())
    }
}
