pub mod interpreter;

pub use interpreter::{
    Dispatch, Interpreter, InterpreterConfig, RuntimeError, StandardOps, TraceEntry, Value,
};
