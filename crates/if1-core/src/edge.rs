//! Wire edges of the module graph.
//!
//! A [`Wire`] connects an output port of a producer to an input port of a
//! consumer. Producers may fan out to any number of consumers; a consumer
//! port is fed by at most one wire (or a literal, which is not an edge).

use serde::{Deserialize, Serialize};

/// Edge weight in the module's `StableGraph`: data flows from the edge's
/// source node to its target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    /// Output port on the source node.
    pub source_port: u32,
    /// Input port on the target node.
    pub target_port: u32,
    /// Module-wide wiring counter; orders the consumers of a producer port.
    pub seq: u64,
}

impl Wire {
    pub fn new(source_port: u32, target_port: u32, seq: u64) -> Self {
        Wire {
            source_port,
            target_port,
            seq,
        }
    }
}
