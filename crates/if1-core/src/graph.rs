//! Node, child-graph and port construction on a [`Module`].
//!
//! All entities live in the module's `StableGraph`; a wire from an output
//! port to an input port is a graph edge carrying a [`Wire`] weight. The
//! methods here enforce the ownership tree:
//!
//! - a node belongs to exactly one graph, fixed at creation;
//! - a child graph belongs to exactly one compound node, which may list it
//!   several times;
//! - an input port has at most one binding, a literal or a wire, and
//!   rebinding replaces the old one.
//!
//! Wires that cross graph boundaries are threaded through every enclosing
//! compound node between producer and consumer; see [`Module::wire`].

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::edge::Wire;
use crate::error::CoreError;
use crate::id::{InPortRef, NodeId, OutPortRef, PortRef};
use crate::literal::{HostValue, LiteralKind};
use crate::module::Module;
use crate::node::{Binding, IfNode, Literal, OutPort, Role};
use crate::ops::Opcode;
use crate::pragma::Pragmas;
use crate::type_id::TypeId;
use crate::types::{BasicKind, TypeCode};

fn check_port(port: u32) -> Result<(), CoreError> {
    if port == 0 {
        return Err(CoreError::InvalidPort { port });
    }
    Ok(())
}

impl Module {
    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&IfNode, CoreError> {
        let idx: NodeIndex<u32> = id.into();
        self.graph
            .node_weight(idx)
            .ok_or(CoreError::NodeNotFound { id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut IfNode, CoreError> {
        let idx: NodeIndex<u32> = id.into();
        self.graph
            .node_weight_mut(idx)
            .ok_or(CoreError::NodeNotFound { id })
    }

    fn graph_node(&self, id: NodeId) -> Result<&IfNode, CoreError> {
        let node = self.node(id)?;
        if !node.is_graph() {
            return Err(CoreError::NotAGraph { id });
        }
        Ok(node)
    }

    pub fn opcode(&self, id: NodeId) -> Result<Opcode, CoreError> {
        Ok(self.node(id)?.opcode)
    }

    /// Nodes of a graph in label order.
    pub fn nodes(&self, graph: NodeId) -> Result<&[NodeId], CoreError> {
        Ok(&self.graph_node(graph)?.nodes)
    }

    /// Child graphs of a compound node, aliases included.
    pub fn children(&self, node: NodeId) -> Result<&[NodeId], CoreError> {
        Ok(&self.node(node)?.children)
    }

    /// The graph owning a node, or the compound owning a child graph.
    /// Top-level functions have no owner.
    pub fn owner(&self, id: NodeId) -> Result<Option<NodeId>, CoreError> {
        Ok(match self.node(id)?.role {
            Role::Node { graph } => Some(graph),
            Role::Subgraph { compound } => Some(compound),
            Role::Function { .. } => None,
        })
    }

    /// The graph whose frame a node's ports live in: a graph is its own
    /// scope, a node lives in its owning graph.
    pub fn scope_of(&self, id: NodeId) -> Result<NodeId, CoreError> {
        Ok(match self.node(id)?.role {
            Role::Node { graph } => graph,
            _ => id,
        })
    }

    /// The serialization label of a node: its 1-based position in its
    /// graph. Graphs are label 0 when they refer to their own ports.
    pub fn label(&self, id: NodeId) -> Result<u32, CoreError> {
        match self.node(id)?.role {
            Role::Node { graph } => self
                .nodes(graph)?
                .iter()
                .position(|n| *n == id)
                .map(|p| p as u32 + 1)
                .ok_or_else(|| CoreError::InvalidGraph {
                    reason: format!("node {} is not listed in graph {}", id, graph),
                }),
            _ => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Appends a new node to `graph`.
    pub fn add_node(&mut self, graph: NodeId, opcode: Opcode) -> Result<NodeId, CoreError> {
        self.graph_node(graph)?;
        let id = NodeId::from(
            self.graph
                .add_node(IfNode::new(opcode, Role::Node { graph })),
        );
        self.node_mut(graph)?.nodes.push(id);
        tracing::trace!(graph = graph.0, node = id.0, %opcode, "added node");
        Ok(id)
    }

    /// Appends a new, empty child graph to a node.
    ///
    /// Graphs (functions and child graphs alike) cannot own child graphs.
    pub fn add_graph(&mut self, node: NodeId) -> Result<NodeId, CoreError> {
        if self.node(node)?.is_graph() {
            return Err(CoreError::InvalidGraph {
                reason: format!("graph {} cannot own child graphs", node),
            });
        }
        let id = NodeId::from(self.graph.add_node(IfNode::new(
            Opcode::XGraph,
            Role::Subgraph { compound: node },
        )));
        self.node_mut(node)?.children.push(id);
        Ok(id)
    }

    /// Lists an existing child graph of `node` once more.
    pub fn push_child(&mut self, node: NodeId, graph: NodeId) -> Result<(), CoreError> {
        match self.node(graph)?.role {
            Role::Subgraph { compound } if compound == node => {}
            _ => {
                return Err(CoreError::InvalidGraph {
                    reason: format!("graph {} is not a child of node {}", graph, node),
                })
            }
        }
        self.node_mut(node)?.children.push(graph);
        Ok(())
    }

    /// Declares (or re-declares) the type of output `port`.
    pub fn set_output(
        &mut self,
        node: NodeId,
        port: u32,
        ty: TypeId,
    ) -> Result<OutPortRef, CoreError> {
        check_port(port)?;
        self.types.get(ty)?;
        self.node_mut(node)?.outputs.entry(port).or_default().ty = Some(ty);
        Ok(node.out(port))
    }

    pub fn output_type(&self, out: OutPortRef) -> Result<Option<TypeId>, CoreError> {
        Ok(self
            .node(out.node)?
            .outputs
            .get(&out.port)
            .and_then(|p| p.ty))
    }

    /// Returns input `port` of `node`, creating it unbound if needed.
    pub fn input(&mut self, node: NodeId, port: u32) -> Result<InPortRef, CoreError> {
        check_port(port)?;
        self.node_mut(node)?.inputs.entry(port).or_default();
        Ok(node.inp(port))
    }

    pub fn in_ports(&self, node: NodeId) -> Result<Vec<InPortRef>, CoreError> {
        Ok(self
            .node(node)?
            .inputs
            .keys()
            .map(|p| node.inp(*p))
            .collect())
    }

    pub fn out_ports(&self, node: NodeId) -> Result<Vec<OutPortRef>, CoreError> {
        Ok(self
            .node(node)?
            .outputs
            .keys()
            .map(|p| node.out(*p))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Wiring
    // -----------------------------------------------------------------------

    /// Feeds input `dst` from output `src`, replacing any earlier binding.
    ///
    /// When `src` lives in an enclosing graph of `dst`, the value is routed
    /// through each compound node in between, outermost first: the compound
    /// gets a fresh input port (one past the highest port used by its inputs
    /// and by its child graphs' outputs), every distinct child graph gets an
    /// output of the same number and type, and routing continues from the
    /// child graph on the path to `dst`.
    ///
    /// Returns the ports created along the way, ending with `dst`. Fails with
    /// [`CoreError::Disconnected`] when `src` is not visible from `dst`.
    pub fn wire(&mut self, dst: InPortRef, src: OutPortRef) -> Result<Vec<PortRef>, CoreError> {
        check_port(dst.port)?;
        check_port(src.port)?;
        let src_scope = self.scope_of(src.node)?;
        let dst_scope = self.scope_of(dst.node)?;

        // (compound, child graph) pairs from the consumer outwards.
        let mut levels = Vec::new();
        let mut scope = dst_scope;
        while scope != src_scope {
            match self.node(scope)?.role {
                Role::Subgraph { compound } => {
                    levels.push((compound, scope));
                    scope = self.scope_of(compound)?;
                }
                _ => {
                    return Err(CoreError::Disconnected {
                        reason: format!("{} is not visible from {}", src, dst),
                    })
                }
            }
        }

        let mut path = Vec::with_capacity(2 * levels.len() + 1);
        let mut current = src;
        if !levels.is_empty() {
            tracing::debug!(from = %src, to = %dst, levels = levels.len(), "cross-graph wire");
        }
        for (compound, child) in levels.into_iter().rev() {
            let port = self.free_port(compound)?;
            let ty = self.output_type(current)?;
            let entry = compound.inp(port);
            self.connect(current, entry)?;
            path.push(PortRef::In(entry));
            let children = self.node(compound)?.distinct_children();
            for g in children {
                self.node_mut(g)?.outputs.insert(
                    port,
                    OutPort {
                        ty,
                        pragmas: Pragmas::new(),
                    },
                );
            }
            current = child.out(port);
            path.push(PortRef::Out(current));
        }
        self.connect(current, dst)?;
        path.push(PortRef::In(dst));
        Ok(path)
    }

    fn free_port(&self, compound: NodeId) -> Result<u32, CoreError> {
        let node = self.node(compound)?;
        let mut top = node.max_input();
        for child in node.distinct_children() {
            top = top.max(self.node(child)?.max_output());
        }
        Ok(top + 1)
    }

    fn connect(&mut self, src: OutPortRef, dst: InPortRef) -> Result<(), CoreError> {
        self.node(src.node)?;
        self.detach(dst)?;
        self.node_mut(src.node)?.outputs.entry(src.port).or_default();
        let seq = self.bump_seq();
        self.graph.add_edge(
            src.node.into(),
            dst.node.into(),
            Wire::new(src.port, dst.port, seq),
        );
        Ok(())
    }

    /// Drops whatever currently feeds `dst`, leaving the port unbound.
    fn detach(&mut self, dst: InPortRef) -> Result<(), CoreError> {
        let idx: NodeIndex<u32> = dst.node.into();
        let stale: Vec<EdgeIndex<u32>> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().target_port == dst.port)
            .map(|e| e.id())
            .collect();
        for e in stale {
            self.graph.remove_edge(e);
        }
        self.node_mut(dst.node)?
            .inputs
            .entry(dst.port)
            .or_default()
            .literal = None;
        Ok(())
    }

    /// Binds a host value to `dst` as literal text.
    ///
    /// Booleans, integers and floats are written in canonical form; text is
    /// classified by the literal grammar and rejected with
    /// [`CoreError::LiteralFormat`] when it matches none. A function
    /// reference is written as the function's name and typed with its
    /// function type.
    pub fn set_literal(
        &mut self,
        dst: InPortRef,
        value: impl Into<HostValue>,
    ) -> Result<InPortRef, CoreError> {
        check_port(dst.port)?;
        self.node(dst.node)?;
        let value = value.into();
        let (text, ty) = match value.to_literal()? {
            Some((text, kind)) => {
                let ty = self.literal_type(kind)?;
                (text, ty)
            }
            None => {
                let HostValue::Function(f) = &value else {
                    return Err(CoreError::LiteralFormat {
                        text: format!("{:?}", value),
                    });
                };
                let f = *f;
                let name = self
                    .node(f)?
                    .function_name()
                    .ok_or(CoreError::NotAFunction { id: f })?
                    .to_string();
                let ty = self
                    .function_type(f)?
                    .ok_or_else(|| CoreError::MissingType { what: name.clone() })?;
                (name, ty)
            }
        };
        self.bind_literal(dst, text, Some(ty))?;
        Ok(dst)
    }

    /// The type a literal of `kind` gets, created if the table lacks it.
    fn literal_type(&mut self, kind: LiteralKind) -> Result<TypeId, CoreError> {
        match kind.basic() {
            Some(basic) => Ok(self.types.add_basic(basic)),
            None => {
                let ch = self.types.add_basic(BasicKind::Character);
                self.types.add(TypeCode::Array, Some(ch), None)
            }
        }
    }

    pub(crate) fn bind_literal(
        &mut self,
        dst: InPortRef,
        text: String,
        ty: Option<TypeId>,
    ) -> Result<(), CoreError> {
        if let Some(ty) = ty {
            self.types.get(ty)?;
        }
        self.detach(dst)?;
        self.node_mut(dst.node)?
            .inputs
            .entry(dst.port)
            .or_default()
            .literal = Some(Literal { text, ty });
        Ok(())
    }

    /// What feeds `dst`, if anything.
    pub fn binding(&self, dst: InPortRef) -> Option<Binding<'_>> {
        if let Some(lit) = self.literal(dst) {
            return Some(Binding::Literal(lit));
        }
        self.source(dst).map(Binding::Wire)
    }

    pub fn literal(&self, dst: InPortRef) -> Option<&Literal> {
        self.node(dst.node)
            .ok()?
            .inputs
            .get(&dst.port)?
            .literal
            .as_ref()
    }

    /// The output port wired to `dst`.
    pub fn source(&self, dst: InPortRef) -> Option<OutPortRef> {
        let idx: NodeIndex<u32> = dst.node.into();
        if self.graph.node_weight(idx).is_none() {
            return None;
        }
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .find(|e| e.weight().target_port == dst.port)
            .map(|e| NodeId::from(e.source()).out(e.weight().source_port))
    }

    /// The type of the value arriving at `dst`: the literal's type, or the
    /// type of the output port feeding it.
    pub fn in_port_type(&self, dst: InPortRef) -> Option<TypeId> {
        match self.binding(dst)? {
            Binding::Literal(lit) => lit.ty,
            Binding::Wire(src) => self.output_type(src).ok().flatten(),
        }
    }

    /// Consumers of `src`, in the order they were wired.
    pub fn out_edges(&self, src: OutPortRef) -> Vec<InPortRef> {
        let idx: NodeIndex<u32> = src.node.into();
        if self.graph.node_weight(idx).is_none() {
            return Vec::new();
        }
        let mut edges: Vec<(u64, InPortRef)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().source_port == src.port)
            .map(|e| (e.weight().seq, NodeId::from(e.target()).inp(e.weight().target_port)))
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, p)| p).collect()
    }

    // -----------------------------------------------------------------------
    // Pragmas
    // -----------------------------------------------------------------------

    pub fn node_pragmas(&self, id: NodeId) -> Result<&Pragmas, CoreError> {
        Ok(&self.node(id)?.pragmas)
    }

    pub fn node_pragmas_mut(&mut self, id: NodeId) -> Result<&mut Pragmas, CoreError> {
        Ok(&mut self.node_mut(id)?.pragmas)
    }

    pub fn in_pragmas(&self, p: InPortRef) -> Option<&Pragmas> {
        self.node(p.node)
            .ok()?
            .inputs
            .get(&p.port)
            .map(|i| &i.pragmas)
    }

    /// Pragmas of an input port, creating the port if needed.
    pub fn in_pragmas_mut(&mut self, p: InPortRef) -> Result<&mut Pragmas, CoreError> {
        check_port(p.port)?;
        Ok(&mut self
            .node_mut(p.node)?
            .inputs
            .entry(p.port)
            .or_default()
            .pragmas)
    }

    pub fn out_pragmas(&self, p: OutPortRef) -> Option<&Pragmas> {
        self.node(p.node)
            .ok()?
            .outputs
            .get(&p.port)
            .map(|o| &o.pragmas)
    }

    /// Pragmas of an output port, creating an untyped port if needed.
    pub fn out_pragmas_mut(&mut self, p: OutPortRef) -> Result<&mut Pragmas, CoreError> {
        check_port(p.port)?;
        Ok(&mut self
            .node_mut(p.node)?
            .outputs
            .entry(p.port)
            .or_default()
            .pragmas)
    }
}
