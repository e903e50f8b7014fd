//! Stable ID newtypes for graph entities.
//!
//! Nodes, child graphs and top-level functions all live in one petgraph
//! arena owned by the [`Module`](crate::module::Module), so a single
//! [`NodeId`] addresses any of them. Ports are addressed by a node plus a
//! 1-based port number.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable node identifier. Maps to a petgraph `NodeIndex<u32>`.
///
/// Identity only: the label a node carries in `.if1` text is its position
/// within its graph and is recomputed on every serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// A producer port: output `port` of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPortRef {
    pub node: NodeId,
    pub port: u32,
}

/// A consumer port: input `port` of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InPortRef {
    pub node: NodeId,
    pub port: u32,
}

/// Either side of a wire, as reported along a cross-graph wiring path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    In(InPortRef),
    Out(OutPortRef),
}

impl NodeId {
    /// Output port `port` of this node.
    pub fn out(self, port: u32) -> OutPortRef {
        OutPortRef { node: self, port }
    }

    /// Input port `port` of this node.
    pub fn inp(self, port: u32) -> InPortRef {
        InPortRef { node: self, port }
    }
}

// Display implementations mirror the `node[port]` / `node(port)` notation
// used when building graphs by hand.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OutPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.port)
    }
}

impl fmt::Display for InPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.node, self.port)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::In(p) => p.fmt(f),
            PortRef::Out(p) => p.fmt(f),
        }
    }
}

// Bridge between NodeId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
