//! The module: root of ownership and of serialization.
//!
//! A [`Module`] owns the type table, one petgraph arena holding every node,
//! child graph and function of the compilation unit, the registration-ordered
//! function list, and the module pragmas written as `C$` comment lines.
//!
//! Node and graph construction lives in [`graph`](crate::graph), function
//! registration in [`function`](crate::function), and the text format in
//! [`writer`](crate::writer) and [`reader`](crate::reader); all of them are
//! `impl Module` blocks over the state defined here.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;

use crate::error::CoreError;
use crate::id::NodeId;
use crate::pragma::{PragmaValue, Pragmas};
use crate::type_id::{TypeDisplay, TypeId, TypeTable};
use crate::types::{BasicKind, TypeCode, TypeDef};

use crate::edge::Wire;
use crate::node::IfNode;

/// A compilation unit.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) types: TypeTable,
    pub(crate) graph: StableGraph<IfNode, Wire, Directed, u32>,
    /// Top-level graphs in registration order.
    pub(crate) functions: Vec<NodeId>,
    /// Name lookup; a later function with the same name shadows earlier ones.
    pub(crate) names: IndexMap<String, NodeId>,
    pub(crate) pragmas: BTreeMap<char, String>,
    pub(crate) next_seq: u64,
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}

impl Module {
    /// Creates a module whose type table starts with the nine built-in
    /// types.
    pub fn new() -> Self {
        Module::with_types(TypeTable::with_builtins())
    }

    /// Creates a module with an empty type table.
    pub fn empty() -> Self {
        Module::with_types(TypeTable::new())
    }

    fn with_types(types: TypeTable) -> Self {
        Module {
            types,
            graph: StableGraph::new(),
            functions: Vec::new(),
            names: IndexMap::new(),
            pragmas: BTreeMap::new(),
            next_seq: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    /// Read-only access to the type table.
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn type_def(&self, id: TypeId) -> Result<&TypeDef, CoreError> {
        self.types.get(id)
    }

    /// Returns the canonical type for `(code, p1, p2)`; see
    /// [`TypeTable::add`].
    pub fn add_type(
        &mut self,
        code: TypeCode,
        p1: Option<TypeId>,
        p2: Option<TypeId>,
    ) -> Result<TypeId, CoreError> {
        self.types.add(code, p1, p2)
    }

    pub fn add_basic(&mut self, kind: BasicKind) -> TypeId {
        self.types.add_basic(kind)
    }

    /// Builds a `code` chain over `types`; `None` for an empty list.
    pub fn add_type_chain(
        &mut self,
        types: &[TypeId],
        code: TypeCode,
        names: Option<&[&str]>,
    ) -> Result<Option<TypeId>, CoreError> {
        self.types.add_chain(types, code, names)
    }

    pub fn type_chain(&self, head: TypeId) -> Result<Vec<TypeId>, CoreError> {
        self.types.chain(head)
    }

    /// Removes a type from the type list. Ports that still refer to it keep
    /// their id; it simply no longer has a label.
    pub fn delete_type(&mut self, id: TypeId) -> Result<(), CoreError> {
        self.types.delete(id)
    }

    /// The current 1-based label of a type.
    pub fn type_label(&self, id: TypeId) -> Option<u32> {
        self.types.label(id)
    }

    pub fn type_by_name(&self, name: &str) -> Result<TypeId, CoreError> {
        self.types
            .by_name(name)
            .ok_or_else(|| CoreError::UnknownTypeName {
                name: name.to_string(),
            })
    }

    pub fn type_name(&self, id: TypeId) -> Result<Option<&str>, CoreError> {
        Ok(self.types.get(id)?.name())
    }

    /// Sets or (with `None`) removes the `na` pragma of a type.
    pub fn set_type_name(&mut self, id: TypeId, name: Option<&str>) -> Result<(), CoreError> {
        self.types.get_mut(id)?.pragmas.set_name(name);
        Ok(())
    }

    pub fn set_type_pragma(
        &mut self,
        id: TypeId,
        key: &str,
        value: impl Into<PragmaValue>,
    ) -> Result<(), CoreError> {
        self.types.get_mut(id)?.pragmas.set(key, value)
    }

    pub fn remove_type_pragma(
        &mut self,
        id: TypeId,
        key: &str,
    ) -> Result<Option<PragmaValue>, CoreError> {
        self.types.get_mut(id)?.pragmas.remove(key)
    }

    pub fn type_pragmas(&self, id: TypeId) -> Result<&Pragmas, CoreError> {
        Ok(self.types.get(id)?.pragmas())
    }

    /// Human-readable rendering, e.g. `function[integer returns real]`.
    pub fn display_type(&self, id: TypeId) -> TypeDisplay<'_> {
        self.types.display(id)
    }

    // -----------------------------------------------------------------------
    // Module pragmas
    // -----------------------------------------------------------------------

    pub fn pragmas(&self) -> &BTreeMap<char, String> {
        &self.pragmas
    }

    pub fn set_pragma(&mut self, key: char, value: impl Into<String>) {
        self.pragmas.insert(key, value.into());
    }

    pub fn remove_pragma(&mut self, key: char) -> Option<String> {
        self.pragmas.remove(&key)
    }

    pub(crate) fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
