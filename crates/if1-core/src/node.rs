//! Nodes, graphs and their ports.
//!
//! Every entity that carries ports is an [`IfNode`]: plain computational
//! nodes, child graphs of compound nodes, and top-level function graphs.
//! What distinguishes them is their [`Role`]. Graph roles own an ordered
//! node list; compound nodes own an ordered (possibly aliased) child list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{NodeId, OutPortRef};
use crate::ops::Opcode;
use crate::pragma::Pragmas;
use crate::type_id::TypeId;

/// Literal text bound to an input port, with the type inferred for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub text: String,
    pub ty: Option<TypeId>,
}

/// A consumer port. Wires feeding it are edges of the module graph; a
/// literal binding is stored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InPort {
    pub pragmas: Pragmas,
    pub literal: Option<Literal>,
}

/// A producer port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutPort {
    pub ty: Option<TypeId>,
    pub pragmas: Pragmas,
}

/// Where a node sits in the ownership tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A top-level function graph registered with the module.
    Function { name: String },
    /// A child graph of a compound node.
    Subgraph { compound: NodeId },
    /// A node inside `graph`.
    Node { graph: NodeId },
}

/// The binding of an input port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding<'m> {
    Literal(&'m Literal),
    Wire(OutPortRef),
}

/// Node weight of the module's `StableGraph`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfNode {
    pub opcode: Opcode,
    pub role: Role,
    pub inputs: BTreeMap<u32, InPort>,
    pub outputs: BTreeMap<u32, OutPort>,
    /// Child graphs of a compound node. The same graph may appear more than
    /// once.
    pub children: SmallVec<[NodeId; 4]>,
    /// Nodes owned by a graph, in label order.
    pub nodes: Vec<NodeId>,
    pub pragmas: Pragmas,
}

impl IfNode {
    pub fn new(opcode: Opcode, role: Role) -> Self {
        IfNode {
            opcode,
            role,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            children: SmallVec::new(),
            nodes: Vec::new(),
            pragmas: Pragmas::new(),
        }
    }

    /// Top-level functions and child graphs.
    pub fn is_graph(&self) -> bool {
        !matches!(self.role, Role::Node { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.role, Role::Function { .. })
    }

    /// The function name, for top-level graphs.
    pub fn function_name(&self) -> Option<&str> {
        match &self.role {
            Role::Function { name } => Some(name),
            _ => None,
        }
    }

    /// Children with duplicates removed, in order of first appearance.
    pub fn distinct_children(&self) -> Vec<NodeId> {
        let mut seen = Vec::with_capacity(self.children.len());
        for c in &self.children {
            if !seen.contains(c) {
                seen.push(*c);
            }
        }
        seen
    }

    /// Highest input port number in use, or 0.
    pub fn max_input(&self) -> u32 {
        self.inputs.keys().next_back().copied().unwrap_or(0)
    }

    /// Highest output port number in use, or 0.
    pub fn max_output(&self) -> u32 {
        self.outputs.keys().next_back().copied().unwrap_or(0)
    }
}
