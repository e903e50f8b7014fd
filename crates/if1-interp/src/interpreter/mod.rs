//! Tree-walking interpreter for IF1 modules.
//!
//! Executes function graphs of a [`Module`](if1_core::Module) on concrete
//! values, including the structured IfThenElse and Iterate compounds and
//! calls through function values.
//!
//! # Architecture
//!
//! - [`Interpreter`] borrows a module and evaluates graphs recursively,
//!   tracking call depth and an optional execution trace.
//! - [`Dispatch`] maps simple opcodes to results. [`StandardOps`] covers
//!   the scalar arithmetic, comparison and conversion opcodes; other
//!   implementations can override or extend it.
//! - [`Value`] is the runtime representation of all values.
//! - [`RuntimeError`] names the node that failed.
//! - [`TraceEntry`] records each node evaluation when tracing is enabled.
//!
//! # Usage
//!
//! ```ignore
//! let mut interp = Interpreter::new(&module, InterpreterConfig::default());
//! let results = interp.interpret_function("main", vec![Value::Int(3), Value::Int(4)])?;
//! ```

pub mod error;
pub mod eval;
pub mod state;
pub mod trace;
pub mod value;

pub use error::RuntimeError;
pub use eval::{eval_op, Dispatch, StandardOps};
pub use state::{Interpreter, InterpreterConfig};
pub use trace::TraceEntry;
pub use value::Value;
