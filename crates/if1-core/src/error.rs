//! Core error types for if1-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! construction misuse, literal text, and malformed `.if1` documents.

use crate::id::NodeId;
use crate::type_id::TypeId;
use crate::types::TypeCode;
use thiserror::Error;

/// Errors produced by the if1-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A type was requested with parameters its code does not accept.
    #[error("invalid {code:?} construction: {reason}")]
    InvalidConstruction { code: TypeCode, reason: String },

    /// Pragma keys on types, nodes and ports are exactly two characters.
    #[error("invalid pragma key '{key}'")]
    InvalidPragmaKey { key: String },

    /// Literal text does not match any basic-type grammar.
    #[error("invalid literal {text}")]
    LiteralFormat { text: String },

    /// A line of `.if1` text could not be read.
    #[error("{reason}: {line}")]
    Parse { line: String, reason: String },

    /// A TypeId does not refer to a live type of this module.
    #[error("type not found: TypeId({id})", id = id.0)]
    TypeNotFound { id: TypeId },

    /// No type with this name exists in the module.
    #[error("module does not define type {name}")]
    UnknownTypeName { name: String },

    /// A chain was requested from a type that is not a chain.
    #[error("type {id} is not a chain type", id = id.0)]
    InvalidChain { id: TypeId },

    /// A node index was not found in the module arena.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A graph operation was applied to a plain node.
    #[error("node {id} is not a graph", id = id.0)]
    NotAGraph { id: NodeId },

    /// A function operation was applied to something that is not a
    /// top-level function.
    #[error("node {id} is not a function", id = id.0)]
    NotAFunction { id: NodeId },

    /// An opcode number or name is not in the opcode table.
    #[error("unknown opcode {opcode}")]
    UnknownOpcode { opcode: String },

    /// The producer of a wire is not visible from the consumer's graph.
    #[error("disconnected: {reason}")]
    Disconnected { reason: String },

    /// A child-graph operation does not fit the ownership tree.
    #[error("invalid graph structure: {reason}")]
    InvalidGraph { reason: String },

    /// Ports are numbered from 1.
    #[error("invalid port number {port}")]
    InvalidPort { port: u32 },

    /// A value that must carry a type has none, e.g. a function referenced
    /// as a literal before any of its results are typed.
    #[error("{what} does not have a type")]
    MissingType { what: String },
}
