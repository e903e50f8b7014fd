//! The interpreter: graph walking, literals and structured operations.
//!
//! A graph is evaluated with a frame that maps output ports to values. The
//! graph's own output ports are seeded with the arguments, then every node
//! runs in label order: its inputs are read from the frame or from literal
//! bindings, the node is evaluated, and its results are stored under its
//! output ports. The graph's results are the values arriving at its bound
//! input ports, in port order.
//!
//! Values bind to ports by position: argument `k` and result `k` belong to
//! output port `k`. `.if1` text only records output ports something reads,
//! so a graph may declare fewer ports than it receives values; missing
//! values for a declared port are an error, surplus ones are dropped. Only
//! top-level functions insist on an exact argument count.
//!
//! Label order is a valid evaluation order for graphs built front to back
//! and for everything read from `.if1` text. A wire from a node that has not
//! run yet is reported as [`RuntimeError::MissingValue`].

use std::collections::HashMap;

use if1_core::literal::{classify, unescape};
use if1_core::{
    BasicKind, Binding, InPortRef, Literal, Module, NodeId, Opcode, OutPortRef, TypeCode,
};

use super::error::RuntimeError;
use super::eval::{Dispatch, StandardOps};
use super::trace::TraceEntry;
use super::value::Value;

/// Configuration for the interpreter.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Whether to record execution traces.
    pub trace_enabled: bool,
    /// Maximum nesting of graph evaluations (calls and child graphs).
    pub max_recursion_depth: usize,
    /// Maximum number of body evaluations of a single Iterate node.
    pub max_iterations: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            trace_enabled: false,
            max_recursion_depth: 256,
            max_iterations: 1_000_000,
        }
    }
}

/// Output port values of one graph evaluation.
type Frame = HashMap<OutPortRef, Value>;

/// The type a literal's text is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralShape {
    Basic(BasicKind),
    String,
    Function,
}

/// Tree-walking interpreter over a borrowed [`Module`].
///
/// Simple opcodes are delegated to a [`Dispatch`] implementation, by default
/// [`StandardOps`]. IfThenElse, Iterate, Call and NoOp are evaluated here
/// because they run child graphs or functions of the module.
pub struct Interpreter<'m, D: Dispatch = StandardOps> {
    module: &'m Module,
    ops: D,
    config: InterpreterConfig,
    depth: usize,
    trace: Option<Vec<TraceEntry>>,
}

impl<'m> Interpreter<'m, StandardOps> {
    /// Creates an interpreter using the built-in scalar operations.
    pub fn new(module: &'m Module, config: InterpreterConfig) -> Self {
        Interpreter::with_dispatch(module, config, StandardOps)
    }
}

impl<'m, D: Dispatch> Interpreter<'m, D> {
    /// Creates an interpreter that delegates simple opcodes to `ops`.
    pub fn with_dispatch(module: &'m Module, config: InterpreterConfig, ops: D) -> Self {
        let trace = if config.trace_enabled {
            Some(Vec::new())
        } else {
            None
        };
        Interpreter {
            module,
            ops,
            config,
            depth: 0,
            trace,
        }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn dispatch(&self) -> &D {
        &self.ops
    }

    /// The recorded trace, if tracing is enabled.
    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Drains the recorded trace, leaving an empty one behind.
    pub fn take_trace(&mut self) -> Vec<TraceEntry> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Evaluates a graph with one argument per output port.
    ///
    /// Returns the values of the graph's bound input ports in port order.
    pub fn interpret(&mut self, graph: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        if self.depth >= self.config.max_recursion_depth {
            return Err(RuntimeError::RecursionLimitExceeded {
                node: graph,
                limit: self.config.max_recursion_depth,
            });
        }
        self.depth += 1;
        let result = self.run_graph(graph, args);
        self.depth -= 1;
        result
    }

    /// Evaluates the most recently registered function called `name`.
    pub fn interpret_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let f = self
            .module
            .function(name)
            .ok_or_else(|| RuntimeError::FunctionNotFound {
                name: name.to_string(),
            })?;
        self.interpret(f, args)
    }

    /// Evaluates a single node in isolation.
    ///
    /// Literal inputs keep their literal; every other input port, in port
    /// order, takes the next value of `args`. All of `args` must be used.
    pub fn interpret_node(&mut self, node: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let module = self.module;
        let n = module.node(node)?;
        if n.is_graph() {
            return self.interpret(node, args);
        }
        let mut args = args.into_iter();
        let mut inputs = Vec::with_capacity(n.inputs.len());
        for port in n.inputs.keys() {
            let dst = node.inp(*port);
            let value = match module.literal(dst) {
                Some(lit) => self.literal_value(dst, lit)?,
                None => args.next().ok_or(RuntimeError::UnsetInputs { node })?,
            };
            inputs.push(value);
        }
        if args.next().is_some() {
            return Err(RuntimeError::UnusedInputs { node });
        }
        let outputs = self.eval_node(node, inputs)?;
        check_outputs(node, n.max_output(), outputs.len())?;
        Ok(outputs)
    }

    // -----------------------------------------------------------------------
    // Graph evaluation
    // -----------------------------------------------------------------------

    fn run_graph(&mut self, graph: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let module = self.module;
        let g = module.node(graph)?;
        if !g.is_graph() {
            return Err(if1_core::CoreError::NotAGraph { id: graph }.into());
        }
        let expected = g.max_output() as usize;
        if args.len() < expected || (g.is_function() && args.len() != expected) {
            return Err(RuntimeError::ArityMismatch {
                node: graph,
                expected,
                got: args.len(),
            });
        }
        tracing::debug!(graph = graph.0, args = args.len(), depth = self.depth, "interpreting graph");

        let mut frame: Frame = (1..).map(|port| graph.out(port)).zip(args).collect();

        for n in module.nodes(graph)? {
            let node = module.node(*n)?;
            let mut inputs = Vec::with_capacity(node.inputs.len());
            for port in node.inputs.keys() {
                inputs.push(self.input_value(&frame, n.inp(*port))?);
            }
            let outputs = self.eval_node(*n, inputs)?;
            check_outputs(*n, node.max_output(), outputs.len())?;
            for (port, value) in (1..).zip(outputs) {
                frame.insert(n.out(port), value);
            }
        }

        result_ports(module, graph)?
            .into_iter()
            .map(|port| self.input_value(&frame, graph.inp(port)))
            .collect()
    }

    /// The value arriving at `dst`: its literal, or what its source produced.
    fn input_value(&self, frame: &Frame, dst: InPortRef) -> Result<Value, RuntimeError> {
        let missing = || RuntimeError::MissingValue {
            node: dst.node,
            port: dst.port,
        };
        match self.module.binding(dst) {
            Some(Binding::Literal(lit)) => self.literal_value(dst, lit),
            Some(Binding::Wire(src)) => frame.get(&src).cloned().ok_or_else(missing),
            None => Err(missing()),
        }
    }

    /// Evaluates one node on already gathered inputs.
    fn eval_node(&mut self, node: NodeId, inputs: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let opcode = self.module.opcode(node)?;
        let traced = self.trace.is_some().then(|| inputs.clone());
        let outputs = match opcode {
            Opcode::IfThenElse => self.if_then_else(node, inputs)?,
            Opcode::Iterate => self.iterate(node, inputs)?,
            Opcode::Call => self.call(node, inputs)?,
            Opcode::NoOp => inputs,
            _ => self.ops.apply(node, opcode, &inputs)?,
        };
        tracing::trace!(node = node.0, %opcode, outputs = outputs.len(), "evaluated node");
        if let (Some(trace), Some(inputs)) = (self.trace.as_mut(), traced) {
            trace.push(TraceEntry {
                node_id: node,
                opcode,
                inputs,
                outputs: outputs.clone(),
            });
        }
        Ok(outputs)
    }

    // -----------------------------------------------------------------------
    // Structured operations
    // -----------------------------------------------------------------------

    /// Two children: the first input selects children[0] when true, else
    /// children[1]. An odd number of three or more: (test, body) pairs
    /// followed by an else graph; the first test whose first result is true
    /// selects its body. Every graph receives all of the node's inputs.
    fn if_then_else(&mut self, node: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let module = self.module;
        let children = module.children(node)?;
        match children.len() {
            2 => {
                let first = args.first().ok_or(RuntimeError::ArityMismatch {
                    node,
                    expected: 1,
                    got: 0,
                })?;
                let chosen = if first.truthy() {
                    children[0]
                } else {
                    children[1]
                };
                self.interpret(chosen, args)
            }
            k if k >= 3 && k % 2 == 1 => {
                for pair in children[..k - 1].chunks(2) {
                    let test = self.interpret(pair[0], args.clone())?;
                    let taken = test.first().ok_or_else(|| RuntimeError::InvalidCompound {
                        node,
                        reason: format!("test graph {} produced no value", pair[0]),
                    })?;
                    if taken.truthy() {
                        return self.interpret(pair[1], args);
                    }
                }
                self.interpret(children[k - 1], args)
            }
            k => Err(RuntimeError::InvalidCompound {
                node,
                reason: format!(
                    "IfThenElse needs two or an odd number of at least three child graphs, has {}",
                    k
                ),
            }),
        }
    }

    /// Runs the body while the first carried value is true.
    ///
    /// Carried values enter the body through its output ports. After each
    /// pass, every bound body input port `p` replaces carried value `p`;
    /// carried values whose port is unbound in the body stay unchanged.
    fn iterate(&mut self, node: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let body = *self
            .module
            .children(node)?
            .first()
            .ok_or_else(|| RuntimeError::InvalidCompound {
                node,
                reason: "Iterate has no body graph".into(),
            })?;
        let ports = result_ports(self.module, body)?;
        let limit = self.config.max_iterations;

        let mut values = args;
        let mut iterations = 0usize;
        while values.first().is_some_and(Value::truthy) {
            if iterations >= limit {
                return Err(RuntimeError::IterationLimitExceeded { node, limit });
            }
            iterations += 1;
            let results = self.interpret(body, values.clone())?;
            for (port, value) in ports.iter().zip(results) {
                let slot = (*port as usize)
                    .checked_sub(1)
                    .and_then(|i| values.get_mut(i))
                    .ok_or_else(|| RuntimeError::InvalidCompound {
                        node,
                        reason: format!("body result {} has no carried value", port),
                    })?;
                *slot = value;
            }
        }
        tracing::debug!(node = node.0, iterations, "iterate finished");
        Ok(values)
    }

    /// The first input is the function to call; the rest are its arguments.
    fn call(&mut self, node: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let mut args = args.into_iter();
        match args.next() {
            Some(Value::Function(f)) => self.interpret(f, args.collect()),
            Some(other) => Err(RuntimeError::TypeMismatchAtRuntime {
                node,
                expected: "function".into(),
                got: other.type_name().into(),
            }),
            None => Err(RuntimeError::ArityMismatch {
                node,
                expected: 1,
                got: 0,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Literals
    // -----------------------------------------------------------------------

    /// The value of the literal bound to `dst`, read according to its type.
    /// An untyped literal is classified by its text; text that is no literal
    /// at all is taken as a function name.
    pub fn literal_value(&self, dst: InPortRef, lit: &Literal) -> Result<Value, RuntimeError> {
        let invalid = |reason: &str| RuntimeError::InvalidLiteral {
            node: dst.node,
            port: dst.port,
            text: lit.text.clone(),
            reason: reason.to_string(),
        };
        let text = lit.text.as_str();

        let shape = match lit.ty {
            Some(ty) => self.literal_shape(ty).ok_or_else(|| {
                invalid("literals must have a basic, string or function type")
            })?,
            None => match classify(text) {
                Ok(kind) => kind.basic().map_or(LiteralShape::String, LiteralShape::Basic),
                Err(_) => LiteralShape::Function,
            },
        };

        match shape {
            LiteralShape::Basic(BasicKind::Boolean) => {
                Ok(Value::Bool(text.starts_with(['t', 'T'])))
            }
            LiteralShape::Basic(BasicKind::Character) => {
                let body = quoted(text, '\'').ok_or_else(|| invalid("expected a quoted character"))?;
                let s = unescape(body);
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(invalid("expected exactly one character")),
                }
            }
            LiteralShape::Basic(BasicKind::Integer) => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid("not an integer")),
            LiteralShape::Basic(BasicKind::Real) => float_text(text)
                .parse::<f32>()
                .map(Value::Real)
                .map_err(|_| invalid("not a real")),
            LiteralShape::Basic(BasicKind::DoubleReal) => float_text(text)
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| invalid("not a doublereal")),
            LiteralShape::Basic(BasicKind::Null) => Ok(Value::Null),
            LiteralShape::Basic(BasicKind::WildBasic) => Err(invalid("wildbasic has no values")),
            LiteralShape::String => {
                let body = quoted(text, '"').ok_or_else(|| invalid("expected a quoted string"))?;
                Ok(Value::string(&unescape(body)))
            }
            LiteralShape::Function => self
                .module
                .function(text)
                .map(Value::Function)
                .ok_or_else(|| RuntimeError::FunctionNotFound {
                    name: text.to_string(),
                }),
        }
    }

    fn literal_shape(&self, ty: if1_core::TypeId) -> Option<LiteralShape> {
        let def = self.module.type_def(ty).ok()?;
        match def.code() {
            TypeCode::Basic => def.basic().map(LiteralShape::Basic),
            TypeCode::Function => Some(LiteralShape::Function),
            TypeCode::Array => {
                let element = self.module.type_def(def.parameter1()?).ok()?;
                (element.basic() == Some(BasicKind::Character)).then_some(LiteralShape::String)
            }
            _ => None,
        }
    }
}

/// Input ports of a graph that carry a result, in port order.
fn result_ports(module: &Module, graph: NodeId) -> Result<Vec<u32>, RuntimeError> {
    Ok(module
        .node(graph)?
        .inputs
        .keys()
        .copied()
        .filter(|port| module.binding(graph.inp(*port)).is_some())
        .collect())
}

/// Every declared output port, up to the highest, needs a result.
fn check_outputs(node: NodeId, max_output: u32, got: usize) -> Result<(), RuntimeError> {
    let expected = max_output as usize;
    if got >= expected {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            node,
            expected,
            got,
        })
    }
}

/// The body between matching quotes.
fn quoted(text: &str, quote: char) -> Option<&str> {
    text.strip_prefix(quote)?.strip_suffix(quote)
}

/// Float text in Rust syntax: `d` exponent markers become `e`, and a marker
/// without digits (`3d`) is dropped.
fn float_text(text: &str) -> String {
    let text = text.replace(['d', 'D'], "e");
    text.trim_end_matches(['e', 'E']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use if1_core::TypeId;

    fn literal(m: &mut Module, text: &str) -> Value {
        let f = m.add_function("lit");
        let n = m.add_node(f, Opcode::NoOp).unwrap();
        m.set_literal(n.inp(1), text).unwrap();
        let lit = m.literal(n.inp(1)).unwrap().clone();
        Interpreter::new(m, InterpreterConfig::default())
            .literal_value(n.inp(1), &lit)
            .unwrap()
    }

    #[test]
    fn literal_values_by_type() {
        let mut m = Module::new();
        assert_eq!(literal(&mut m, "true"), Value::Bool(true));
        assert_eq!(literal(&mut m, "False"), Value::Bool(false));
        assert_eq!(literal(&mut m, "'a'"), Value::Char('a'));
        assert_eq!(literal(&mut m, "'\\n'"), Value::Char('\n'));
        assert_eq!(literal(&mut m, "'\\0'"), Value::Char('\0'));
        assert_eq!(literal(&mut m, "+41"), Value::Int(41));
        assert_eq!(literal(&mut m, "-7"), Value::Int(-7));
        assert_eq!(literal(&mut m, "3.5"), Value::Real(3.5));
        assert_eq!(literal(&mut m, "1.5e3"), Value::Real(1500.0));
        assert_eq!(literal(&mut m, "2.5d"), Value::Double(2.5));
        assert_eq!(literal(&mut m, "2.5D2"), Value::Double(250.0));
        assert_eq!(literal(&mut m, "1d-2"), Value::Double(0.01));
        assert_eq!(literal(&mut m, "nil"), Value::Null);
        assert_eq!(literal(&mut m, "\"a\\tb\""), Value::string("a\tb"));
        assert_eq!(literal(&mut m, "\"\""), Value::string(""));
    }

    #[test]
    fn untyped_literals_are_classified() {
        let mut m = Module::new();
        let f = m.add_function("f");
        let interp = Interpreter::new(&m, InterpreterConfig::default());
        let dst = f.inp(1);
        let lit = |text: &str| Literal {
            text: text.to_string(),
            ty: None,
        };
        assert_eq!(interp.literal_value(dst, &lit("12")).unwrap(), Value::Int(12));
        assert_eq!(interp.literal_value(dst, &lit("1.0d0")).unwrap(), Value::Double(1.0));
        assert_eq!(interp.literal_value(dst, &lit("f")).unwrap(), Value::Function(f));
        assert!(matches!(
            interp.literal_value(dst, &lit("nowhere")),
            Err(RuntimeError::FunctionNotFound { name }) if name == "nowhere"
        ));
    }

    #[test]
    fn mistyped_literals_are_rejected() {
        let m = Module::new();
        let interp = Interpreter::new(&m, InterpreterConfig::default());
        let dst = NodeId(0).inp(1);
        let typed = |text: &str, ty| Literal {
            text: text.to_string(),
            ty: Some(ty),
        };
        for (text, ty) in [
            ("abc", TypeId::INTEGER),
            ("x", TypeId::CHARACTER),
            ("'ab'", TypeId::CHARACTER),
            ("1.2.3", TypeId::REAL),
            ("1", TypeId::WILDBASIC),
            ("1", TypeId::WILD),
            ("abc", TypeId::STRING),
        ] {
            assert!(
                matches!(
                    interp.literal_value(dst, &typed(text, ty)),
                    Err(RuntimeError::InvalidLiteral { .. })
                ),
                "{} as {}",
                text,
                ty
            );
        }
    }

    #[test]
    fn float_text_normalization() {
        assert_eq!(float_text("3d"), "3");
        assert_eq!(float_text("3.5D-2"), "3.5e-2");
        assert_eq!(float_text("3e"), "3");
        assert_eq!(float_text("1.5e+33"), "1.5e+33");
    }

    #[test]
    fn config_defaults() {
        let config = InterpreterConfig::default();
        assert!(!config.trace_enabled);
        assert_eq!(config.max_recursion_depth, 256);
        assert_eq!(config.max_iterations, 1_000_000);

        let m = Module::new();
        let interp = Interpreter::new(&m, config);
        assert!(interp.trace().is_none());
    }
}
