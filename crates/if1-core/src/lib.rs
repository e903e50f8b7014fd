pub mod edge;
pub mod error;
pub mod function;
pub mod graph;
pub mod id;
pub mod literal;
pub mod module;
pub mod node;
pub mod ops;
pub mod pragma;
pub mod reader;
pub mod type_id;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use edge::Wire;
pub use error::CoreError;
pub use id::{InPortRef, NodeId, OutPortRef, PortRef};
pub use literal::{HostValue, LiteralKind};
pub use module::Module;
pub use node::{Binding, IfNode, Literal, Role};
pub use ops::{Opcode, OpcodeKind};
pub use pragma::{PragmaValue, Pragmas};
pub use type_id::{TypeId, TypeTable};
pub use types::{BasicKind, TypeCode, TypeDef};
