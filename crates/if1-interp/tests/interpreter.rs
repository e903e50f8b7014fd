//! Integration tests for the IF1 interpreter.
//!
//! Each test builds a module with the if1-core construction API (or reads
//! one from `.if1` text), interprets a function, and checks the results.
//!
//! Tests cover:
//! - Straight-line graphs and literal results
//! - IfThenElse with test/body chains and with two branches
//! - Iterate with loop-carried and invariant values
//! - Call through function literals, recursion and iteration limits
//! - Single-node interpretation
//! - Runtime errors surfacing from nested graphs
//! - Execution traces and custom dispatch
//! - Interpreting modules read back from text

use if1_core::{Module, NodeId, Opcode, TypeId};
use if1_interp::{Dispatch, Interpreter, InterpreterConfig, RuntimeError, StandardOps, Value};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A function whose `arity` arguments are all integers.
fn int_function(m: &mut Module, name: &str, arity: u32) -> NodeId {
    let f = m.add_function(name);
    for port in 1..=arity {
        m.set_output(f, port, TypeId::INTEGER).unwrap();
    }
    f
}

fn run(m: &Module, f: NodeId, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
    Interpreter::new(m, InterpreterConfig::default()).interpret(f, args)
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

/// `main(a, b) = (a + b) * 10, a`
fn arithmetic_module() -> (Module, NodeId) {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 2);
    let plus = m.add_node(main, Opcode::Plus).unwrap();
    m.wire(plus.inp(1), main.out(1)).unwrap();
    m.wire(plus.inp(2), main.out(2)).unwrap();
    m.set_output(plus, 1, TypeId::INTEGER).unwrap();
    let times = m.add_node(main, Opcode::Times).unwrap();
    m.wire(times.inp(1), plus.out(1)).unwrap();
    m.set_literal(times.inp(2), 10).unwrap();
    m.set_output(times, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), times.out(1)).unwrap();
    m.wire(main.inp(2), main.out(1)).unwrap();
    (m, main)
}

/// `main(a, b)`: `a+b < 100 → 1234`, `a-b < 100 → 4321`,
/// `a*b < 100 → 9999`, otherwise `-1`.
fn if_then_else_module() -> (Module, NodeId) {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 2);
    let ite = m.add_node(main, Opcode::IfThenElse).unwrap();
    m.wire(ite.inp(1), main.out(1)).unwrap();
    m.wire(ite.inp(2), main.out(2)).unwrap();

    let branch = |m: &mut Module| {
        let g = m.add_graph(ite).unwrap();
        m.set_output(g, 1, TypeId::INTEGER).unwrap();
        m.set_output(g, 2, TypeId::INTEGER).unwrap();
        g
    };
    for (op, result) in [
        (Opcode::Plus, 1234),
        (Opcode::Minus, 4321),
        (Opcode::Times, 9999),
    ] {
        let test = branch(&mut m);
        let body = branch(&mut m);
        let p = m.add_node(test, op).unwrap();
        m.wire(p.inp(1), test.out(1)).unwrap();
        m.wire(p.inp(2), test.out(2)).unwrap();
        m.set_output(p, 1, TypeId::INTEGER).unwrap();
        let t = m.add_node(test, Opcode::Less).unwrap();
        m.wire(t.inp(1), p.out(1)).unwrap();
        m.set_literal(t.inp(2), 100).unwrap();
        m.set_output(t, 1, TypeId::BOOLEAN).unwrap();
        m.wire(test.inp(1), t.out(1)).unwrap();
        m.set_literal(body.inp(1), result).unwrap();
    }
    let otherwise = branch(&mut m);
    m.set_literal(otherwise.inp(1), -1).unwrap();

    m.set_output(ite, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), ite.out(1)).unwrap();
    (m, main)
}

/// `main(n)`: `sum += i` for `i` in `1..=n` while `i < n`.
fn iterate_module() -> (Module, NodeId) {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 1);

    let test = m.add_node(main, Opcode::Less).unwrap();
    m.set_literal(test.inp(1), 0).unwrap();
    m.wire(test.inp(2), main.out(1)).unwrap();
    m.set_output(test, 1, TypeId::BOOLEAN).unwrap();

    let it = m.add_node(main, Opcode::Iterate).unwrap();
    m.wire(it.inp(1), test.out(1)).unwrap();
    m.set_literal(it.inp(2), 0).unwrap();
    m.wire(it.inp(3), main.out(1)).unwrap();
    m.set_literal(it.inp(4), 0).unwrap();
    m.set_output(it, 1, TypeId::BOOLEAN).unwrap();
    for port in 2..=4 {
        m.set_output(it, port, TypeId::INTEGER).unwrap();
    }

    let g = m.add_graph(it).unwrap();
    m.set_output(g, 1, TypeId::BOOLEAN).unwrap();
    for port in 2..=4 {
        m.set_output(g, port, TypeId::INTEGER).unwrap();
    }
    let plus_i = m.add_node(g, Opcode::Plus).unwrap();
    m.wire(plus_i.inp(1), g.out(2)).unwrap();
    m.set_literal(plus_i.inp(2), 1).unwrap();
    m.set_output(plus_i, 1, TypeId::INTEGER).unwrap();
    let plus_sum = m.add_node(g, Opcode::Plus).unwrap();
    m.wire(plus_sum.inp(1), g.out(4)).unwrap();
    m.wire(plus_sum.inp(2), plus_i.out(1)).unwrap();
    m.set_output(plus_sum, 1, TypeId::INTEGER).unwrap();
    let lt = m.add_node(g, Opcode::Less).unwrap();
    m.wire(lt.inp(1), plus_i.out(1)).unwrap();
    m.wire(lt.inp(2), g.out(3)).unwrap();
    m.set_output(lt, 1, TypeId::BOOLEAN).unwrap();

    // Port 3 (n) is left unbound: it is carried unchanged.
    m.wire(g.inp(1), lt.out(1)).unwrap();
    m.wire(g.inp(2), plus_i.out(1)).unwrap();
    m.wire(g.inp(4), plus_sum.out(1)).unwrap();

    m.wire(main.inp(1), it.out(4)).unwrap();
    (m, main)
}

// ---------------------------------------------------------------------------
// Straight-line graphs
// ---------------------------------------------------------------------------

#[test]
fn arithmetic_graph() {
    let (m, main) = arithmetic_module();
    assert_eq!(run(&m, main, ints(&[3, 4])).unwrap(), ints(&[70, 3]));
    assert_eq!(run(&m, main, ints(&[-3, 1])).unwrap(), ints(&[-20, -3]));
}

#[test]
fn literal_results() {
    let mut m = Module::new();
    let main = m.add_function("main");
    m.set_literal(main.inp(1), 3).unwrap();
    m.set_literal(main.inp(2), "\"hello\"").unwrap();
    m.set_literal(main.inp(3), 2.5).unwrap();
    assert_eq!(
        run(&m, main, vec![]).unwrap(),
        vec![Value::Int(3), Value::string("hello"), Value::Double(2.5)]
    );
}

#[test]
fn noop_passes_values_through() {
    let mut m = Module::new();
    let main = m.add_function("main");
    m.set_output(main, 1, TypeId::STRING).unwrap();
    m.set_output(main, 2, TypeId::CHARACTER).unwrap();
    let n = m.add_node(main, Opcode::NoOp).unwrap();
    m.wire(n.inp(1), main.out(1)).unwrap();
    m.wire(n.inp(2), main.out(2)).unwrap();
    m.wire(main.inp(1), n.out(1)).unwrap();
    m.wire(main.inp(2), n.out(2)).unwrap();
    for s in ["", "hello"] {
        let args = vec![Value::string(s), Value::Char('a')];
        assert_eq!(run(&m, main, args.clone()).unwrap(), args);
    }
}

#[test]
fn argument_count_must_match() {
    let (m, main) = arithmetic_module();
    assert!(matches!(
        run(&m, main, ints(&[1])),
        Err(RuntimeError::ArityMismatch { expected: 2, got: 1, node }) if node == main
    ));
}

#[test]
fn values_must_be_produced_before_use() {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 1);
    let first = m.add_node(main, Opcode::Neg).unwrap();
    let second = m.add_node(main, Opcode::Neg).unwrap();
    m.wire(second.inp(1), main.out(1)).unwrap();
    m.set_output(second, 1, TypeId::INTEGER).unwrap();
    m.wire(first.inp(1), second.out(1)).unwrap();
    m.set_output(first, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), first.out(1)).unwrap();
    assert!(matches!(
        run(&m, main, ints(&[1])),
        Err(RuntimeError::MissingValue { node, port: 1 }) if node == first
    ));
}

#[test]
fn result_count_must_match_outputs() {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 2);
    let plus = m.add_node(main, Opcode::Plus).unwrap();
    m.wire(plus.inp(1), main.out(1)).unwrap();
    m.wire(plus.inp(2), main.out(2)).unwrap();
    m.set_output(plus, 1, TypeId::INTEGER).unwrap();
    m.set_output(plus, 2, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), plus.out(1)).unwrap();
    assert!(matches!(
        run(&m, main, ints(&[1, 2])),
        Err(RuntimeError::ArityMismatch { expected: 2, got: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// IfThenElse
// ---------------------------------------------------------------------------

#[test]
fn if_then_else_chain() {
    let (m, main) = if_then_else_module();
    assert_eq!(run(&m, main, ints(&[10, 20])).unwrap(), ints(&[1234]));
    assert_eq!(run(&m, main, ints(&[1000, 950])).unwrap(), ints(&[4321]));
    assert_eq!(run(&m, main, ints(&[1000, 0])).unwrap(), ints(&[9999]));
    assert_eq!(run(&m, main, ints(&[1000, 10])).unwrap(), ints(&[-1]));
}

#[test]
fn if_then_else_two_branches_with_free_values() {
    // max(a, b): the branches read b and a through cross-graph wires.
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 2);
    let less = m.add_node(main, Opcode::Less).unwrap();
    m.wire(less.inp(1), main.out(1)).unwrap();
    m.wire(less.inp(2), main.out(2)).unwrap();
    m.set_output(less, 1, TypeId::BOOLEAN).unwrap();

    let ite = m.add_node(main, Opcode::IfThenElse).unwrap();
    m.wire(ite.inp(1), less.out(1)).unwrap();
    let then = m.add_graph(ite).unwrap();
    let otherwise = m.add_graph(ite).unwrap();
    m.set_output(then, 1, TypeId::BOOLEAN).unwrap();
    m.set_output(otherwise, 1, TypeId::BOOLEAN).unwrap();
    m.wire(then.inp(1), main.out(2)).unwrap();
    m.wire(otherwise.inp(1), main.out(1)).unwrap();
    m.set_output(ite, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), ite.out(1)).unwrap();

    assert_eq!(m.node(ite).unwrap().inputs.len(), 3);
    assert_eq!(run(&m, main, ints(&[3, 7])).unwrap(), ints(&[7]));
    assert_eq!(run(&m, main, ints(&[9, 2])).unwrap(), ints(&[9]));
}

#[test]
fn if_then_else_needs_a_usable_child_count() {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 1);
    let ite = m.add_node(main, Opcode::IfThenElse).unwrap();
    m.wire(ite.inp(1), main.out(1)).unwrap();
    for _ in 0..4 {
        let g = m.add_graph(ite).unwrap();
        m.set_output(g, 1, TypeId::INTEGER).unwrap();
    }
    m.set_output(ite, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), ite.out(1)).unwrap();
    assert!(matches!(
        run(&m, main, ints(&[1])),
        Err(RuntimeError::InvalidCompound { node, .. }) if node == ite
    ));
}

// ---------------------------------------------------------------------------
// Iterate
// ---------------------------------------------------------------------------

#[test]
fn iterate_triangular_number() {
    let (m, main) = iterate_module();
    assert_eq!(run(&m, main, ints(&[10])).unwrap(), ints(&[55]));
    assert_eq!(run(&m, main, ints(&[1])).unwrap(), ints(&[1]));
    // The initial test is false: no iteration, sum stays 0.
    assert_eq!(run(&m, main, ints(&[0])).unwrap(), ints(&[0]));
}

#[test]
fn iterate_returns_every_carried_value() {
    let (m, main) = iterate_module();
    let it = m.nodes(main).unwrap()[1];
    let mut interp = Interpreter::new(&m, InterpreterConfig::default());
    let out = interp
        .interpret_node(it, vec![Value::Bool(true), Value::Int(4)])
        .unwrap();
    // (test, i, n, sum) with i and sum from literals 0.
    assert_eq!(
        out,
        vec![Value::Bool(false), Value::Int(4), Value::Int(4), Value::Int(10)]
    );
}

#[test]
fn iteration_limit() {
    let mut m = Module::new();
    let main = m.add_function("main");
    let it = m.add_node(main, Opcode::Iterate).unwrap();
    m.set_literal(it.inp(1), true).unwrap();
    m.set_output(it, 1, TypeId::BOOLEAN).unwrap();
    let g = m.add_graph(it).unwrap();
    m.set_output(g, 1, TypeId::BOOLEAN).unwrap();
    m.set_literal(g.inp(1), true).unwrap();
    m.wire(main.inp(1), it.out(1)).unwrap();

    let config = InterpreterConfig {
        max_iterations: 5,
        ..InterpreterConfig::default()
    };
    let mut interp = Interpreter::new(&m, config);
    assert!(matches!(
        interp.interpret(main, vec![]),
        Err(RuntimeError::IterationLimitExceeded { node, limit: 5 }) if node == it
    ));
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[test]
fn call_through_function_literal() {
    let mut m = Module::new();
    let square = int_function(&mut m, "square", 1);
    let t = m.add_node(square, Opcode::Times).unwrap();
    m.wire(t.inp(1), square.out(1)).unwrap();
    m.wire(t.inp(2), square.out(1)).unwrap();
    m.set_output(t, 1, TypeId::INTEGER).unwrap();
    m.wire(square.inp(1), t.out(1)).unwrap();

    let main = int_function(&mut m, "main", 1);
    let call = m.add_node(main, Opcode::Call).unwrap();
    m.set_literal(call.inp(1), square).unwrap();
    m.wire(call.inp(2), main.out(1)).unwrap();
    m.set_output(call, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), call.out(1)).unwrap();

    assert_eq!(run(&m, main, ints(&[7])).unwrap(), ints(&[49]));

    let mut interp = Interpreter::new(&m, InterpreterConfig::default());
    assert_eq!(interp.interpret_function("square", ints(&[-3])).unwrap(), ints(&[9]));
    assert!(matches!(
        interp.interpret_function("cube", ints(&[2])),
        Err(RuntimeError::FunctionNotFound { name }) if name == "cube"
    ));
}

#[test]
fn call_requires_a_function_value() {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 1);
    let call = m.add_node(main, Opcode::Call).unwrap();
    m.wire(call.inp(1), main.out(1)).unwrap();
    m.set_output(call, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), call.out(1)).unwrap();
    assert!(matches!(
        run(&m, main, ints(&[1])),
        Err(RuntimeError::TypeMismatchAtRuntime { expected, got, .. })
            if expected == "function" && got == "integer"
    ));
}

#[test]
fn unbounded_recursion_hits_the_limit() {
    let mut m = Module::new();
    let f = int_function(&mut m, "forever", 1);
    let call = m.add_node(f, Opcode::Call).unwrap();
    m.set_output(call, 1, TypeId::INTEGER).unwrap();
    m.wire(f.inp(1), call.out(1)).unwrap();
    // The result port is typed now, so `forever` has a function type.
    m.set_literal(call.inp(1), f).unwrap();
    m.wire(call.inp(2), f.out(1)).unwrap();

    let config = InterpreterConfig {
        max_recursion_depth: 16,
        ..InterpreterConfig::default()
    };
    let mut interp = Interpreter::new(&m, config);
    assert!(matches!(
        interp.interpret(f, ints(&[1])),
        Err(RuntimeError::RecursionLimitExceeded { node, limit: 16 }) if node == f
    ));
    // The depth is unwound after the failure.
    assert!(matches!(
        interp.interpret(f, ints(&[1])),
        Err(RuntimeError::RecursionLimitExceeded { .. })
    ));
}

// ---------------------------------------------------------------------------
// Single nodes
// ---------------------------------------------------------------------------

#[test]
fn interpret_node_fills_free_inputs_in_order() {
    let (m, main) = arithmetic_module();
    let nodes = m.nodes(main).unwrap();
    let (plus, times) = (nodes[0], nodes[1]);
    let mut interp = Interpreter::new(&m, InterpreterConfig::default());

    assert_eq!(interp.interpret_node(plus, ints(&[3, 4])).unwrap(), ints(&[7]));
    // times has a literal 10 on port 2.
    assert_eq!(interp.interpret_node(times, ints(&[7])).unwrap(), ints(&[70]));

    assert!(matches!(
        interp.interpret_node(plus, ints(&[3])),
        Err(RuntimeError::UnsetInputs { node }) if node == plus
    ));
    assert!(matches!(
        interp.interpret_node(times, ints(&[7, 8])),
        Err(RuntimeError::UnusedInputs { node }) if node == times
    ));
}

#[test]
fn unimplemented_opcode_inside_a_graph() {
    let mut m = Module::new();
    let main = int_function(&mut m, "main", 1);
    let n = m.add_node(main, Opcode::ASize).unwrap();
    m.wire(n.inp(1), main.out(1)).unwrap();
    m.set_output(n, 1, TypeId::INTEGER).unwrap();
    m.wire(main.inp(1), n.out(1)).unwrap();
    let err = run(&m, main, ints(&[1])).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::NotImplementedOperation { opcode: Opcode::ASize, node } if node == n
    ));
    assert_eq!(err.to_string(), format!("operation IFASize is not implemented (node {})", n));
}

#[test]
fn errors_surface_from_child_graphs() {
    let (m, main) = if_then_else_module();
    // a+b overflows in the first test graph.
    assert!(matches!(
        run(&m, main, ints(&[i64::MAX, 1])),
        Err(RuntimeError::IntegerOverflow { .. })
    ));
}

// ---------------------------------------------------------------------------
// Tracing and dispatch
// ---------------------------------------------------------------------------

#[test]
fn trace_records_each_node() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();

    let (m, main) = arithmetic_module();
    let config = InterpreterConfig {
        trace_enabled: true,
        ..InterpreterConfig::default()
    };
    let mut interp = Interpreter::new(&m, config);
    interp.interpret(main, ints(&[3, 4])).unwrap();

    let trace = interp.trace().unwrap();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].opcode, Opcode::Plus);
    assert_eq!(trace[0].inputs, ints(&[3, 4]));
    assert_eq!(trace[0].outputs, ints(&[7]));
    assert_eq!(trace[1].opcode, Opcode::Times);
    assert_eq!(trace[1].inputs, ints(&[7, 10]));
    assert_eq!(trace[1].outputs, ints(&[70]));

    let json = serde_json::to_value(&trace[1]).unwrap();
    assert_eq!(json["opcode"], "Times");
    assert_eq!(json["outputs"][0]["Int"], 70);

    assert_eq!(interp.take_trace().len(), 2);
    assert_eq!(interp.trace().map(<[_]>::len), Some(0));
}

#[test]
fn compound_entries_follow_their_bodies() {
    let (m, main) = if_then_else_module();
    let config = InterpreterConfig {
        trace_enabled: true,
        ..InterpreterConfig::default()
    };
    let mut interp = Interpreter::new(&m, config);
    interp.interpret(main, ints(&[10, 20])).unwrap();
    let opcodes: Vec<Opcode> = interp.trace().unwrap().iter().map(|e| e.opcode).collect();
    assert_eq!(opcodes, vec![Opcode::Plus, Opcode::Less, Opcode::IfThenElse]);
}

/// Saturating integer Plus; everything else as usual.
struct Saturating;

impl Dispatch for Saturating {
    fn apply(
        &self,
        node: NodeId,
        opcode: Opcode,
        args: &[Value],
    ) -> Result<Vec<Value>, RuntimeError> {
        match (opcode, args) {
            (Opcode::Plus, [Value::Int(a), Value::Int(b)]) => {
                Ok(vec![Value::Int(a.saturating_add(*b))])
            }
            _ => StandardOps.apply(node, opcode, args),
        }
    }
}

#[test]
fn custom_dispatch() {
    let (m, main) = arithmetic_module();
    let plus = m.nodes(main).unwrap()[0];
    let mut interp = Interpreter::with_dispatch(&m, InterpreterConfig::default(), Saturating);
    assert_eq!(interp.interpret(main, ints(&[3, 4])).unwrap(), ints(&[70, 3]));
    assert_eq!(
        interp.interpret_node(plus, ints(&[i64::MAX, 1])).unwrap(),
        ints(&[i64::MAX])
    );
    // Times still goes through the standard checked arithmetic.
    assert!(matches!(
        interp.interpret(main, ints(&[i64::MAX, 1])),
        Err(RuntimeError::IntegerOverflow { node }) if node != plus
    ));
    assert!(matches!(
        run(&m, main, ints(&[i64::MAX, 1])),
        Err(RuntimeError::IntegerOverflow { node }) if node == plus
    ));
}

// ---------------------------------------------------------------------------
// Modules read from text
// ---------------------------------------------------------------------------

const ADDER: &str = r#"T 1 1 3
T 2 8 1 0
T 3 8 1 2
T 4 3 3 2
X 4 "main"
E 1 1 0 1 1
N 1 141
E 0 1 1 1 1
E 0 2 1 2 1
X 4 "caller"
E 1 1 0 1 1
N 1 120
L     1 1 4 "main"
E 0 1 1 2 1
E 0 2 1 3 1"#;

#[test]
fn interpret_text_module() {
    let m: Module = ADDER.parse().unwrap();
    let mut interp = Interpreter::new(&m, InterpreterConfig::default());
    assert_eq!(interp.interpret_function("main", ints(&[3, 4])).unwrap(), ints(&[7]));
    assert_eq!(interp.interpret_function("caller", ints(&[30, 12])).unwrap(), ints(&[42]));
}

#[test]
fn round_tripped_modules_behave_the_same() {
    for (mut m, cases) in [
        (
            if_then_else_module().0,
            vec![(ints(&[10, 20]), ints(&[1234])), (ints(&[1000, 10]), ints(&[-1]))],
        ),
        (iterate_module().0, vec![(ints(&[10]), ints(&[55]))]),
        (arithmetic_module().0, vec![(ints(&[3, 4]), ints(&[70, 3]))]),
    ] {
        let text = m.to_if1().unwrap();
        let read = Module::from_if1(&text).unwrap();
        let main = read.function("main").unwrap();
        for (args, expected) in cases {
            assert_eq!(run(&read, main, args).unwrap(), expected, "{}", text);
        }
    }
}
