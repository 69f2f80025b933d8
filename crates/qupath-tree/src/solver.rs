//! Path solvers that turn a scheme tree into a per-link allocation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use qupath_phys::ExpCost;

use crate::alloc::ExpAlloc;
use crate::error::{TreeError, TreeResult};
use crate::node::{NodeAttr, NodeIndex, NodeType};
use crate::spst::Spst;
use crate::strategy::BuildStrategy;

/// Produces the expected elementary attempts per link for one path.
///
/// Implementations are chosen at construction time and own whatever state
/// they need (edges, gate, tree).
pub trait PathSolver {
    /// Run the solver and report the allocation it settled on.
    fn solve(&mut self) -> TreeResult<ExpAlloc>;
}

/// Which nodes the greedy search may purify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRange {
    /// Leaves and branches.
    #[default]
    All,
    /// Elementary links only.
    Leaves,
    /// Swap or purify results only.
    Branches,
}

impl SearchRange {
    /// Node types accepted by [`Spst::find_max`].
    pub fn filter(self) -> &'static [NodeType] {
        match self {
            SearchRange::All => &[NodeType::Leaf, NodeType::Branch],
            SearchRange::Leaves => &[NodeType::Leaf],
            SearchRange::Branches => &[NodeType::Branch],
        }
    }
}

/// Settings for [`TreeSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Shape of the initial tree.
    #[serde(default)]
    pub strategy: BuildStrategy,
    /// End-to-end fidelity to reach.
    #[serde(default = "default_target_fidelity")]
    pub target_fidelity: f64,
    /// Upper bound on purification rounds.
    #[serde(default = "default_max_purifications")]
    pub max_purifications: usize,
    /// Candidate nodes for each round.
    #[serde(default)]
    pub search: SearchRange,
}

fn default_target_fidelity() -> f64 {
    0.9
}

fn default_max_purifications() -> usize {
    64
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: BuildStrategy::default(),
            target_fidelity: default_target_fidelity(),
            max_purifications: default_max_purifications(),
            search: SearchRange::default(),
        }
    }
}

/// Greedy tree-based solver.
///
/// Builds the initial tree, then purifies the node with the best adjusted
/// efficiency, one round at a time, until the root reaches the target
/// fidelity. The result is a heuristic, not an optimum.
#[derive(Debug, Clone)]
pub struct TreeSolver {
    spst: Spst,
    config: SolverConfig,
    costs: Option<Vec<ExpCost>>,
    purifications: usize,
}

impl TreeSolver {
    /// Create a solver over an (unbuilt) scheme tree.
    pub fn new(spst: Spst, config: SolverConfig) -> Self {
        Self {
            spst,
            config,
            costs: None,
            purifications: 0,
        }
    }

    /// Use `costs` as the leaf costs of the initial tree, one per link in
    /// path order.
    pub fn with_costs(mut self, costs: Vec<ExpCost>) -> Self {
        self.costs = Some(costs);
        self
    }

    /// The solver settings.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The scheme tree in its current state.
    pub fn spst(&self) -> &Spst {
        &self.spst
    }

    /// Consume the solver and return the tree.
    pub fn into_spst(self) -> Spst {
        self.spst
    }

    /// Purification rounds applied by the last [`solve`](PathSolver::solve).
    pub fn purifications(&self) -> usize {
        self.purifications
    }

    /// Score the tree and return the best candidate, if any has a positive
    /// finite adjusted efficiency.
    fn pick(&mut self) -> TreeResult<Option<NodeIndex>> {
        let root = self.spst.root_index()?;
        self.spst.grad_root()?;
        self.spst.calc_efficiency(root)?;
        let best = self
            .spst
            .find_max(root, NodeAttr::AdjustedEfficiency, self.config.search.filter())?;
        Ok(best.filter(|&i| {
            let score = self.spst.tree()[i].adjusted_efficiency;
            score.is_finite() && score > 0.0
        }))
    }
}

impl PathSolver for TreeSolver {
    fn solve(&mut self) -> TreeResult<ExpAlloc> {
        self.purifications = 0;
        self.spst.build(self.config.strategy, self.costs.as_deref())?;
        let target = self.config.target_fidelity;

        loop {
            let (fidelity, cost) = self.spst.root_state()?;
            if fidelity >= target {
                debug!(
                    purifications = self.purifications,
                    fidelity, cost, "Target fidelity reached"
                );
                break;
            }
            let not_reached = TreeError::FidelityNotReached {
                target,
                achieved: fidelity,
                purifications: self.purifications,
            };
            if self.purifications >= self.config.max_purifications {
                warn!(fidelity, target, "Purification budget exhausted");
                return Err(not_reached);
            }
            let Some(node) = self.pick()? else {
                warn!(fidelity, target, "No purification candidate left");
                return Err(not_reached);
            };

            self.spst.purify(node)?;
            self.purifications += 1;
            debug!(
                round = self.purifications,
                node = %node,
                fidelity = self.spst.root_state()?.0,
                "Greedy purification round"
            );
        }

        self.spst.expected_allocation()
    }
}
