//! Runtime errors produced while interpreting a module.
//!
//! Every variant that can be traced back to a node carries its [`NodeId`],
//! so a failure deep inside a nested loop body still names the node that
//! raised it.

use if1_core::{CoreError, NodeId, Opcode};

/// Errors produced by the interpreter.
///
/// Each variant halts the current interpretation; nothing is retried and no
/// partial results are kept.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The opcode has no interpreter mapping.
    #[error("operation {opcode} is not implemented (node {node})")]
    NotImplementedOperation { node: NodeId, opcode: Opcode },

    #[error("arity mismatch at node {node}: expected {expected} values, got {got}")]
    ArityMismatch {
        node: NodeId,
        expected: usize,
        got: usize,
    },

    /// `interpret_node` ran out of arguments before every input had a value.
    #[error("not all inputs of node {node} were set")]
    UnsetInputs { node: NodeId },

    /// `interpret_node` was given more arguments than the node has free
    /// inputs.
    #[error("not all inputs of node {node} were used")]
    UnusedInputs { node: NodeId },

    #[error("type mismatch at runtime: node {node}, expected {expected}, got {got}")]
    TypeMismatchAtRuntime {
        node: NodeId,
        expected: String,
        got: String,
    },

    #[error("divide by zero at node {node}")]
    DivideByZero { node: NodeId },

    #[error("integer overflow at node {node}")]
    IntegerOverflow { node: NodeId },

    #[error("iteration limit ({limit}) exceeded at node {node}")]
    IterationLimitExceeded { node: NodeId, limit: usize },

    #[error("recursion depth limit ({limit}) exceeded at node {node}")]
    RecursionLimitExceeded { node: NodeId, limit: usize },

    #[error("function not found: {name}")]
    FunctionNotFound { name: String },

    #[error("missing value: node {node} input port {port} has no value")]
    MissingValue { node: NodeId, port: u32 },

    #[error("invalid literal {text} at node {node} input port {port}: {reason}")]
    InvalidLiteral {
        node: NodeId,
        port: u32,
        text: String,
        reason: String,
    },

    /// A compound node whose child graphs do not fit its opcode.
    #[error("invalid compound at node {node}: {reason}")]
    InvalidCompound { node: NodeId, reason: String },

    #[error("internal error: {message}")]
    InternalError { message: String },

    /// A lookup into the module failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}
