//! Per-op evaluation of the simple opcodes.
//!
//! [`eval_op`] is one exhaustive match over [`Opcode`]. The structured
//! opcodes (IfThenElse, Iterate, Call, NoOp) need the module and are handled
//! by the [`Interpreter`](super::Interpreter) itself; everything without an
//! interpreter mapping fails with [`RuntimeError::NotImplementedOperation`].
//!
//! Numeric operands are widened along `integer < real < doublereal`, with
//! booleans counting as integers. Integer arithmetic is checked.

use std::cmp::Ordering;

use if1_core::{NodeId, Opcode};

use super::error::RuntimeError;
use super::value::Value;

/// Maps a simple opcode and its input values to output values.
///
/// The interpreter calls this for every node that is not a structured
/// operation. The returned values are assigned to the node's output ports
/// in port order.
pub trait Dispatch {
    fn apply(&self, node: NodeId, opcode: Opcode, args: &[Value])
        -> Result<Vec<Value>, RuntimeError>;
}

/// The built-in scalar operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOps;

impl Dispatch for StandardOps {
    fn apply(
        &self,
        node: NodeId,
        opcode: Opcode,
        args: &[Value],
    ) -> Result<Vec<Value>, RuntimeError> {
        eval_op(opcode, args, node).map(|v| vec![v])
    }
}

/// Evaluates a single-result scalar operation.
///
/// Boolean operands overload the arithmetic operators: Plus and Minus act
/// as logical or, Times and Div as logical and, returning one of the
/// operands unchanged.
///
/// # Errors
///
/// Returns `RuntimeError` for:
/// - Wrong number of arguments
/// - Operands of the wrong kind
/// - Integer overflow and division by zero
/// - Opcodes without an interpreter mapping
pub fn eval_op(opcode: Opcode, args: &[Value], node: NodeId) -> Result<Value, RuntimeError> {
    match opcode {
        Opcode::Plus | Opcode::Minus => {
            let (a, b) = binary(args, node)?;
            if is_bool(a) || is_bool(b) {
                return Ok(or_value(a, b));
            }
            let op = if opcode == Opcode::Plus {
                Arith::Plus
            } else {
                Arith::Minus
            };
            arith(op, a, b, node)
        }

        Opcode::Times | Opcode::Div => {
            let (a, b) = binary(args, node)?;
            if is_bool(a) || is_bool(b) {
                return Ok(and_value(a, b));
            }
            let op = if opcode == Opcode::Times {
                Arith::Times
            } else {
                Arith::Div
            };
            arith(op, a, b, node)
        }

        Opcode::Mod => {
            let (a, b) = binary(args, node)?;
            arith(Arith::Mod, a, b, node)
        }

        Opcode::Max | Opcode::Min => {
            let (a, b) = binary(args, node)?;
            let max = opcode == Opcode::Max;
            if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
                return Ok(Value::Bool(if max { *x || *y } else { *x && *y }));
            }
            arith(if max { Arith::Max } else { Arith::Min }, a, b, node)
        }

        Opcode::Exp => {
            let (a, b) = binary(args, node)?;
            Ok(match pair(a, b, node)? {
                Pair::Int(x, y) => Value::Real((x as f64).powf(y as f64) as f32),
                Pair::Real(x, y) => Value::Real(x.powf(y)),
                Pair::Double(x, y) => Value::Double(x.powf(y)),
            })
        }

        Opcode::Abs => match num(unary(args, node)?, node)? {
            Num::Int(n) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or(RuntimeError::IntegerOverflow { node }),
            Num::Real(x) => Ok(Value::Real(x.abs())),
            Num::Double(x) => Ok(Value::Double(x.abs())),
        },

        Opcode::Neg => match num(unary(args, node)?, node)? {
            Num::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or(RuntimeError::IntegerOverflow { node }),
            Num::Real(x) => Ok(Value::Real(-x)),
            Num::Double(x) => Ok(Value::Double(-x)),
        },

        // Floor and Trunc of integers produce reals.
        Opcode::Floor => Ok(match num(unary(args, node)?, node)? {
            Num::Int(n) => Value::Real(n as f32),
            Num::Real(x) => Value::Real(x.floor()),
            Num::Double(x) => Value::Double(x.floor()),
        }),

        Opcode::Trunc => Ok(match num(unary(args, node)?, node)? {
            Num::Int(n) => Value::Real(n as f32),
            Num::Real(x) => Value::Real(x.trunc()),
            Num::Double(x) => Value::Double(x.trunc()),
        }),

        Opcode::Int => match num(unary(args, node)?, node)? {
            Num::Int(n) => Ok(Value::Int(n)),
            Num::Real(x) => float_to_int(x as f64, node),
            Num::Double(x) => float_to_int(x, node),
        },

        Opcode::Double => Ok(Value::Double(num(unary(args, node)?, node)?.to_f64())),

        Opcode::Single => Ok(Value::Real(num(unary(args, node)?, node)?.to_f32())),

        Opcode::Bool => Ok(Value::Bool(unary(args, node)?.truthy())),

        Opcode::Char => match unary(args, node)? {
            Value::Bool(b) => Ok(Value::Char(if *b { '\u{1}' } else { '\0' })),
            Value::Char(c) => Ok(Value::Char(*c)),
            Value::Int(n) => u32::try_from(*n)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or_else(|| RuntimeError::TypeMismatchAtRuntime {
                    node,
                    expected: "character code".into(),
                    got: n.to_string(),
                }),
            other => Err(mismatch(node, "boolean, character or integer", other)),
        },

        Opcode::Not => Ok(Value::Bool(!unary(args, node)?.truthy())),

        Opcode::And => {
            let (a, b) = binary(args, node)?;
            Ok(and_value(a, b))
        }

        Opcode::Or => {
            let (a, b) = binary(args, node)?;
            Ok(or_value(a, b))
        }

        Opcode::Equal | Opcode::NotEqual => {
            let (a, b) = binary(args, node)?;
            let eq = values_equal(a, b);
            Ok(Value::Bool(if opcode == Opcode::Equal { eq } else { !eq }))
        }

        Opcode::Less | Opcode::LessEqual | Opcode::Great | Opcode::GreatEqual => {
            let (a, b) = binary(args, node)?;
            let ord = compare(a, b, node)?;
            Ok(Value::Bool(match opcode {
                Opcode::Less => ord == Some(Ordering::Less),
                Opcode::LessEqual => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                Opcode::Great => ord == Some(Ordering::Greater),
                _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            }))
        }

        // Structured operations need the module
        Opcode::IfThenElse | Opcode::Iterate | Opcode::Call | Opcode::NoOp => {
            Err(RuntimeError::InternalError {
                message: format!("{} is evaluated by the interpreter, not eval_op", opcode),
            })
        }

        // Compound forms without an interpreter mapping
        Opcode::Forall
        | Opcode::Select
        | Opcode::TagCase
        | Opcode::LoopA
        | Opcode::LoopB
        | Opcode::WhileLoop
        | Opcode::RepeatLoop
        | Opcode::SeqForall
        | Opcode::UReduce
        // Array, record, stream and reduction operations
        | Opcode::AAddH
        | Opcode::AAddL
        | Opcode::AAdjust
        | Opcode::ABuild
        | Opcode::ACatenate
        | Opcode::AElement
        | Opcode::AFill
        | Opcode::AGather
        | Opcode::AIsEmpty
        | Opcode::ALimH
        | Opcode::ALimL
        | Opcode::ARemH
        | Opcode::ARemL
        | Opcode::AReplace
        | Opcode::AScatter
        | Opcode::ASetL
        | Opcode::ASize
        | Opcode::AElementN
        | Opcode::AElementP
        | Opcode::AElementM
        | Opcode::RBuild
        | Opcode::RElements
        | Opcode::RReplace
        | Opcode::RedLeft
        | Opcode::RedRight
        | Opcode::RedTree
        | Opcode::Reduce
        | Opcode::FirstValue
        | Opcode::FinalValue
        | Opcode::RestValues
        | Opcode::RangeGenerate
        | Opcode::PrefixSize
        | Opcode::ReplaceMulti
        // Everything else
        | Opcode::BindArguments
        | Opcode::IsError
        | Opcode::Error
        | Opcode::Convert
        | Opcode::CallForeign
        | Opcode::SGraph
        | Opcode::LGraph
        | Opcode::IGraph
        | Opcode::XGraph
        | Opcode::LPGraph
        | Opcode::RLGraph => Err(RuntimeError::NotImplementedOperation { node, opcode }),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn unary(args: &[Value], node: NodeId) -> Result<&Value, RuntimeError> {
    match args {
        [a] => Ok(a),
        _ => Err(RuntimeError::ArityMismatch {
            node,
            expected: 1,
            got: args.len(),
        }),
    }
}

fn binary(args: &[Value], node: NodeId) -> Result<(&Value, &Value), RuntimeError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(RuntimeError::ArityMismatch {
            node,
            expected: 2,
            got: args.len(),
        }),
    }
}

fn mismatch(node: NodeId, expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::TypeMismatchAtRuntime {
        node,
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

fn is_bool(v: &Value) -> bool {
    matches!(v, Value::Bool(_))
}

/// `a` if it is true, else `b`.
fn or_value(a: &Value, b: &Value) -> Value {
    if a.truthy() {
        a.clone()
    } else {
        b.clone()
    }
}

/// `a` if it is false, else `b`.
fn and_value(a: &Value, b: &Value) -> Value {
    if a.truthy() {
        b.clone()
    } else {
        a.clone()
    }
}

// ---------------------------------------------------------------------------
// Numeric widening
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Real(f32),
    Double(f64),
}

impl Num {
    fn to_f32(self) -> f32 {
        match self {
            Num::Int(n) => n as f32,
            Num::Real(x) => x,
            Num::Double(x) => x as f32,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(x) => x as f64,
            Num::Double(x) => x,
        }
    }
}

/// Two operands widened to their common kind.
#[derive(Debug, Clone, Copy)]
enum Pair {
    Int(i64, i64),
    Real(f32, f32),
    Double(f64, f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Real(x) => Some(Num::Real(*x)),
        Value::Double(x) => Some(Num::Double(*x)),
        _ => None,
    }
}

fn num(v: &Value, node: NodeId) -> Result<Num, RuntimeError> {
    as_num(v).ok_or_else(|| mismatch(node, "number", v))
}

fn widen(a: Num, b: Num) -> Pair {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Pair::Int(x, y),
        (Num::Double(x), y) => Pair::Double(x, y.to_f64()),
        (x, Num::Double(y)) => Pair::Double(x.to_f64(), y),
        (x, y) => Pair::Real(x.to_f32(), y.to_f32()),
    }
}

fn pair(a: &Value, b: &Value, node: NodeId) -> Result<Pair, RuntimeError> {
    Ok(widen(num(a, node)?, num(b, node)?))
}

fn float_to_int(x: f64, node: NodeId) -> Result<Value, RuntimeError> {
    // i64::MIN is exactly representable; i64::MAX rounds up to 2^63.
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(Value::Int(x.trunc() as i64))
    } else {
        Err(RuntimeError::IntegerOverflow { node })
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    Max,
    Min,
}

fn arith(op: Arith, a: &Value, b: &Value, node: NodeId) -> Result<Value, RuntimeError> {
    match pair(a, b, node)? {
        Pair::Int(x, y) => int_arith(op, x, y, node).map(Value::Int),
        Pair::Real(x, y) => float_arith(op, x as f64, y as f64, node).map(|r| Value::Real(r as f32)),
        Pair::Double(x, y) => float_arith(op, x, y, node).map(Value::Double),
    }
}

/// Checked integer arithmetic. Div and Mod round toward negative infinity,
/// so the remainder takes the sign of the divisor.
fn int_arith(op: Arith, x: i64, y: i64, node: NodeId) -> Result<i64, RuntimeError> {
    let overflow = || RuntimeError::IntegerOverflow { node };
    match op {
        Arith::Plus => x.checked_add(y).ok_or_else(overflow),
        Arith::Minus => x.checked_sub(y).ok_or_else(overflow),
        Arith::Times => x.checked_mul(y).ok_or_else(overflow),
        Arith::Div => {
            if y == 0 {
                return Err(RuntimeError::DivideByZero { node });
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && (x < 0) != (y < 0) {
                Ok(q - 1)
            } else {
                Ok(q)
            }
        }
        Arith::Mod => {
            if y == 0 {
                return Err(RuntimeError::DivideByZero { node });
            }
            let r = x.wrapping_rem(y);
            if r != 0 && (r < 0) != (y < 0) {
                Ok(r + y)
            } else {
                Ok(r)
            }
        }
        Arith::Max => Ok(x.max(y)),
        Arith::Min => Ok(x.min(y)),
    }
}

fn float_arith(op: Arith, x: f64, y: f64, node: NodeId) -> Result<f64, RuntimeError> {
    Ok(match op {
        Arith::Plus => x + y,
        Arith::Minus => x - y,
        Arith::Times => x * y,
        Arith::Div => {
            if y == 0.0 {
                return Err(RuntimeError::DivideByZero { node });
            }
            x / y
        }
        Arith::Mod => {
            if y == 0.0 {
                return Err(RuntimeError::DivideByZero { node });
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        Arith::Max => x.max(y),
        Arith::Min => x.min(y),
    })
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Equality across kinds: numbers compare after widening, anything else
/// only equals a value of its own kind.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Char(x), Value::Char(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Function(x), Value::Function(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q))
        }
        _ => match (as_num(a), as_num(b)) {
            (Some(x), Some(y)) => match widen(x, y) {
                Pair::Int(x, y) => x == y,
                Pair::Real(x, y) => x == y,
                Pair::Double(x, y) => x == y,
            },
            _ => false,
        },
    }
}

/// Ordering of two characters or two numbers. NaN compares as unordered.
fn compare(a: &Value, b: &Value, node: NodeId) -> Result<Option<Ordering>, RuntimeError> {
    if let (Value::Char(x), Value::Char(y)) = (a, b) {
        return Ok(Some(x.cmp(y)));
    }
    match (as_num(a), as_num(b)) {
        (Some(x), Some(y)) => Ok(match widen(x, y) {
            Pair::Int(x, y) => Some(x.cmp(&y)),
            Pair::Real(x, y) => x.partial_cmp(&y),
            Pair::Double(x, y) => x.partial_cmp(&y),
        }),
        _ => Err(RuntimeError::TypeMismatchAtRuntime {
            node,
            expected: a.type_name().to_string(),
            got: b.type_name().to_string(),
        }),
    }
}
