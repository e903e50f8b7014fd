//! Execution trace recording.
//!
//! When tracing is enabled via [`InterpreterConfig::trace_enabled`], the
//! interpreter records a [`TraceEntry`] for every node it evaluates, in
//! completion order. A compound node's entry follows the entries of the
//! nodes inside its child graphs.
//!
//! [`InterpreterConfig::trace_enabled`]: super::InterpreterConfig::trace_enabled

use if1_core::{NodeId, Opcode};
use serde::{Deserialize, Serialize};

use super::value::Value;

/// A single entry in the execution trace, recording one node evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// The node that was evaluated.
    pub node_id: NodeId,
    pub opcode: Opcode,
    /// Input values in port order.
    pub inputs: Vec<Value>,
    /// Output values in port order.
    pub outputs: Vec<Value>,
}
