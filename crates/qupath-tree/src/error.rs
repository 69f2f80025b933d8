//! Error types for the scheme-tree crate.

use qupath_phys::PhysError;
use thiserror::Error;

use crate::node::NodeIndex;

/// Errors that can occur while building or mutating a scheme tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TreeError {
    /// Error from the physical operation model.
    #[error(transparent)]
    Phys(#[from] PhysError),

    /// The requested build strategy exists but has no implementation.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Node index does not refer to a node of this tree.
    #[error("Node {0} does not exist in this tree")]
    InvalidNode(NodeIndex),

    /// The tree has not been built yet.
    #[error("Tree is empty - call build() first")]
    EmptyTree,

    /// The greedy solver ran out of budget or candidates.
    #[error(
        "Target fidelity {target} not reached: best {achieved:.6} after {purifications} purifications"
    )]
    FidelityNotReached {
        /// Requested end-to-end fidelity.
        target: f64,
        /// Root fidelity when the solver stopped.
        achieved: f64,
        /// Number of purifications applied.
        purifications: usize,
    },
}

/// Result type for scheme-tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
