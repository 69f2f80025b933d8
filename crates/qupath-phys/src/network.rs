//! Network identity types: repeater nodes and the links between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a repeater node on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

/// An ordered pair of endpoints identifying a link.
///
/// Elementary links join neighbouring repeaters; merged links produced by a
/// swap span from the start of the left operand to the end of the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge(pub NodeId, pub NodeId);

impl Edge {
    /// Create an edge from two raw node ids.
    pub fn new(start: impl Into<NodeId>, end: impl Into<NodeId>) -> Self {
        Edge(start.into(), end.into())
    }

    /// First endpoint.
    #[inline]
    pub fn start(&self) -> NodeId {
        self.0
    }

    /// Second endpoint.
    #[inline]
    pub fn end(&self) -> NodeId {
        self.1
    }

    /// The link obtained by swapping `self` with `right`.
    #[inline]
    pub fn span(&self, right: &Edge) -> Edge {
        Edge(self.0, right.1)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0.0, self.1.0)
    }
}

impl From<(u32, u32)> for Edge {
    fn from((start, end): (u32, u32)) -> Self {
        Edge::new(start, end)
    }
}
