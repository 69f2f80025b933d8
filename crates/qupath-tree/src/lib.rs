//! Swap-purification scheme trees for quantum repeater paths.
//!
//! A scheme tree records in which order the elementary links of a path are
//! swapped together and purified. Leaves are links, branches are operations,
//! and every node carries the fidelity and expected cost of the pair it
//! produces.
//!
//! # Core Components
//!
//! - **Nodes**: [`TreeNode`], [`NodeKind`], [`NodeIndex`], [`IdAllocator`]
//! - **Structure**: [`MetaTree`], the arena with cloning, traversal and
//!   constrained maximum search
//! - **Scheme tree**: [`Spst`], with [`BuildStrategy`] shapes, gradient
//!   propagation, purification and efficiency scoring
//! - **Solvers**: the [`PathSolver`] contract and the greedy [`TreeSolver`]
//!
//! # Example
//!
//! ```rust
//! use qupath_phys::{Edge, Gate, HardwarePreset};
//! use qupath_tree::{BuildStrategy, NodeAttr, NodeType, Spst};
//!
//! let path = [
//!     (Edge::from((0, 1)), 0.95),
//!     (Edge::from((1, 2)), 0.92),
//!     (Edge::from((2, 3)), 0.97),
//! ];
//! let mut spst = Spst::new(path, Gate::werner(HardwarePreset::High)).unwrap();
//! let root = spst.build(BuildStrategy::Balanced, None).unwrap();
//!
//! spst.grad_root().unwrap();
//! spst.calc_efficiency(root).unwrap();
//! let best = spst
//!     .find_max(root, NodeAttr::AdjustedEfficiency, &[NodeType::Leaf])
//!     .unwrap()
//!     .unwrap();
//!
//! let predicted = spst.virtual_purify(best).unwrap();
//! spst.purify(best).unwrap();
//! assert_eq!(spst.root_state().unwrap(), predicted);
//! ```

pub mod alloc;
pub mod error;
pub mod meta;
pub mod node;
pub mod solver;
pub mod spst;
pub mod strategy;

pub use alloc::{Alloc, ExpAlloc};
pub use error::{TreeError, TreeResult};
pub use meta::{IdPolicy, MetaTree, Preorder};
pub use node::{IdAllocator, NodeAttr, NodeIndex, NodeKind, NodeType, TreeNode, TreeNodeId};
pub use solver::{PathSolver, SearchRange, SolverConfig, TreeSolver};
pub use spst::Spst;
pub use strategy::BuildStrategy;
