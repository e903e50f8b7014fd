//! Top-level function graphs.
//!
//! Functions are graphs registered with the module under a name. The module
//! keeps them in registration order; name lookup returns the most recently
//! registered function of that name.
//!
//! A function's type is never stored. It is synthesized on demand from the
//! graph's ports: the graph's output ports carry the function's arguments
//! and its input ports collect the results, so the type is
//! `Function(chain(output port types), chain(input port types))`.

use crate::error::CoreError;
use crate::id::NodeId;
use crate::module::Module;
use crate::node::{IfNode, Role};
use crate::ops::Opcode;
use crate::type_id::TypeId;
use crate::types::TypeCode;

impl Module {
    /// Registers a new, empty `XGraph` function.
    pub fn add_function(&mut self, name: &str) -> NodeId {
        let id = NodeId::from(self.graph.add_node(IfNode::new(
            Opcode::XGraph,
            Role::Function {
                name: name.to_string(),
            },
        )));
        self.functions.push(id);
        if let Some(previous) = self.names.insert(name.to_string(), id) {
            tracing::debug!(name, previous = previous.0, "function name shadowed");
        }
        tracing::debug!(name, id = id.0, "added function");
        id
    }

    /// Registers a new function whose graph opcode is `opcode`, which must
    /// be one of the graph opcodes (`SGraph` ... `RLGraph`).
    pub fn add_function_with(&mut self, name: &str, opcode: Opcode) -> Result<NodeId, CoreError> {
        if !opcode.is_graph() {
            return Err(CoreError::InvalidGraph {
                reason: format!("{} is not a graph opcode", opcode),
            });
        }
        let id = self.add_function(name);
        self.node_mut(id)?.opcode = opcode;
        Ok(id)
    }

    /// Functions in registration order.
    pub fn functions(&self) -> &[NodeId] {
        &self.functions
    }

    /// The most recently registered function called `name`.
    pub fn function(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn function_name(&self, id: NodeId) -> Result<&str, CoreError> {
        self.node(id)?
            .function_name()
            .ok_or(CoreError::NotAFunction { id })
    }

    /// The function type of a graph, interning the tuple chains it needs.
    ///
    /// Argument types come from the graph's output ports 1 through the
    /// highest typed one, so that argument `k` is the type of port `k`.
    /// Ports in that range that are missing or untyped are declared with the
    /// Wild type first. Result types come from the bound input ports in port
    /// order, skipping those without a type. A graph with no typed results
    /// has no type and its ports are left alone.
    pub fn function_type(&mut self, graph: NodeId) -> Result<Option<TypeId>, CoreError> {
        let node = self.node(graph)?;
        if !node.is_graph() {
            return Err(CoreError::NotAGraph { id: graph });
        }
        let has_results = node
            .inputs
            .keys()
            .any(|p| self.in_port_type(graph.inp(*p)).is_some());
        if !has_results {
            return Ok(None);
        }
        let last = node
            .outputs
            .iter()
            .filter(|(_, p)| p.ty.is_some())
            .map(|(port, _)| *port)
            .next_back()
            .unwrap_or(0);
        let gaps: Vec<u32> = (1..=last)
            .filter(|port| node.outputs.get(port).and_then(|p| p.ty).is_none())
            .collect();
        if !gaps.is_empty() {
            let wild = self.types.add(TypeCode::Wild, None, None)?;
            for port in &gaps {
                self.set_output(graph, *port, wild)?;
            }
            tracing::debug!(graph = graph.0, ports = ?gaps, "typed argument gaps as wild");
        }
        // Results are read after the gaps are filled, since a result may be
        // wired straight from one of them.
        let node = self.node(graph)?;
        let args: Vec<TypeId> = node.outputs.values().filter_map(|p| p.ty).collect();
        let results: Vec<TypeId> = node
            .inputs
            .keys()
            .filter_map(|p| self.in_port_type(graph.inp(*p)))
            .collect();
        let p1 = self.types.add_chain(&args, TypeCode::Tuple, None)?;
        let p2 = self.types.add_chain(&results, TypeCode::Tuple, None)?;
        self.types.add(TypeCode::Function, p1, p2).map(Some)
    }
}
