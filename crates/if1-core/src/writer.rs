//! Module → `.if1` text.
//!
//! Output layout:
//!
//! ```text
//! T <label> <code> ...        one line per type, in label order
//! C$  <key> <value>           module pragmas, ascending key
//! X <type> "<name>"           each function in registration order
//! ```
//!
//! Type lines and pragma lines are newline terminated; function texts are
//! joined by newlines with none after the last one. Labels are positions
//! computed at write time: types by their place in the type list, nodes by
//! their place in their graph, with 0 standing for the enclosing graph.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::id::NodeId;
use crate::module::Module;
use crate::pragma::Pragmas;
use crate::type_id::TypeId;
use crate::types::TypeCode;

type Labels = HashMap<TypeId, u32>;

/// Label of an optional type reference; absent references are written as 0.
fn type_label(labels: &Labels, ty: Option<TypeId>) -> Result<u32, CoreError> {
    match ty {
        None => Ok(0),
        Some(id) => labels.get(&id).copied().ok_or(CoreError::TypeNotFound { id }),
    }
}

impl Module {
    /// Serializes the module.
    ///
    /// Takes `&mut self` because each function's type is interned into the
    /// type table before the types are written.
    pub fn to_if1(&mut self) -> Result<String, CoreError> {
        let functions = self.functions.clone();
        let mut signatures = Vec::with_capacity(functions.len());
        for f in &functions {
            signatures.push(self.function_type(*f)?);
        }

        let labels = self.types.labels();
        let mut out = String::new();
        for id in self.types.ids() {
            out.push_str(&self.type_line(*id, &labels)?);
            out.push('\n');
        }
        for (key, value) in &self.pragmas {
            out.push_str(&format!("C$  {} {}\n", key, value));
        }

        let mut texts = Vec::with_capacity(functions.len());
        for (f, sig) in functions.iter().zip(signatures) {
            texts.push(self.function_text(*f, sig, &labels)?);
        }
        out.push_str(&texts.join("\n"));

        tracing::debug!(
            types = self.types.len(),
            functions = functions.len(),
            bytes = out.len(),
            "wrote module"
        );
        Ok(out)
    }

    /// The `T` record of one live type.
    pub fn type_if1(&self, id: TypeId) -> Result<String, CoreError> {
        self.type_line(id, &self.types.labels())
    }

    /// The text of a single function, node or compound, labelled as it
    /// would be in the whole module.
    pub fn node_if1(&mut self, id: NodeId) -> Result<String, CoreError> {
        if self.node(id)?.is_function() {
            let sig = self.function_type(id)?;
            let labels = self.types.labels();
            return self.function_text(id, sig, &labels);
        }
        let labels = self.types.labels();
        if self.node(id)?.is_graph() {
            self.subgraph_text(id, &labels)
        } else {
            self.node_text(id, &labels)
        }
    }

    fn type_line(&self, id: TypeId, labels: &Labels) -> Result<String, CoreError> {
        let def = self.types.get(id)?;
        let label = labels
            .get(&id)
            .copied()
            .ok_or(CoreError::TypeNotFound { id })?;
        let mut line = format!("T {} {}", label, def.code().code());
        match def.code() {
            TypeCode::Wild => {}
            TypeCode::Basic => {
                line.push_str(&format!(" {}", def.aux()));
            }
            TypeCode::Array
            | TypeCode::Multiple
            | TypeCode::Record
            | TypeCode::Stream
            | TypeCode::Union => {
                line.push_str(&format!(" {}", type_label(labels, def.parameter1())?));
            }
            TypeCode::Field | TypeCode::Tag | TypeCode::Tuple | TypeCode::Function => {
                line.push_str(&format!(
                    " {} {}",
                    type_label(labels, def.parameter1())?,
                    type_label(labels, def.parameter2())?
                ));
            }
        }
        line.push_str(&def.pragmas().to_string());
        Ok(line)
    }

    fn function_text(
        &self,
        f: NodeId,
        sig: Option<TypeId>,
        labels: &Labels,
    ) -> Result<String, CoreError> {
        let node = self.node(f)?;
        let name = node.function_name().ok_or(CoreError::NotAFunction { id: f })?;
        let mut text = format!("X {} \"{}\"{}", type_label(labels, sig)?, name, node.pragmas);
        self.body_text(f, &mut text, labels)?;
        Ok(text)
    }

    fn subgraph_text(&self, g: NodeId, labels: &Labels) -> Result<String, CoreError> {
        let mut text = format!("G 0{}", self.node(g)?.pragmas);
        self.body_text(g, &mut text, labels)?;
        Ok(text)
    }

    /// A graph's own result bindings followed by its nodes.
    fn body_text(&self, g: NodeId, text: &mut String, labels: &Labels) -> Result<(), CoreError> {
        self.bindings_text(g, 0, text, labels)?;
        for n in self.nodes(g)? {
            text.push('\n');
            text.push_str(&self.node_text(*n, labels)?);
        }
        Ok(())
    }

    fn node_text(&self, n: NodeId, labels: &Labels) -> Result<String, CoreError> {
        let node = self.node(n)?;
        let label = self.label(n)?;
        let opcode = node.opcode.code();
        let mut text = if node.children.is_empty() {
            format!("N {} {}", label, opcode)
        } else {
            // Aliased children are written once; the closing record lists,
            // for every child slot, the index of the distinct graph in it.
            let distinct = node.distinct_children();
            let mut text = format!("{{ Compound {} {} \n", label, opcode);
            for g in &distinct {
                text.push_str(&self.subgraph_text(*g, labels)?);
                text.push('\n');
            }
            text.push_str(&format!("}} {} {} {}", label, opcode, node.children.len()));
            for c in &node.children {
                let offset = distinct.iter().position(|d| d == c).unwrap_or(0);
                text.push_str(&format!(" {}", offset));
            }
            text
        };
        text.push_str(&node.pragmas.to_string());
        self.bindings_text(n, label, &mut text, labels)?;
        Ok(text)
    }

    /// `E` and `L` records for every bound input of `n`, in port order.
    fn bindings_text(
        &self,
        n: NodeId,
        label: u32,
        text: &mut String,
        labels: &Labels,
    ) -> Result<(), CoreError> {
        let empty = Pragmas::new();
        for (port, input) in &self.node(n)?.inputs {
            if let Some(lit) = &input.literal {
                text.push_str(&format!(
                    "\nL     {} {} {} \"{}\"{}",
                    label,
                    port,
                    type_label(labels, lit.ty)?,
                    lit.text,
                    input.pragmas
                ));
            } else if let Some(src) = self.source(n.inp(*port)) {
                let src_pragmas = self.out_pragmas(src).unwrap_or(&empty);
                text.push_str(&format!(
                    "\nE {} {} {} {} {}{}",
                    self.label(src.node)?,
                    src.port,
                    label,
                    port,
                    type_label(labels, self.output_type(src)?)?,
                    Pragmas::merge_edge(src_pragmas, &input.pragmas)
                ));
            }
        }
        Ok(())
    }
}
