//! Literal text: classification, host-value conversion and escapes.
//!
//! An input port bound to a literal stores the literal's canonical text. The
//! basic type of that text is decided by a small deterministic automaton
//! over its bytes; anything the automaton rejects is a
//! [`CoreError::LiteralFormat`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::types::BasicKind;

/// The basic type a literal's text denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    Boolean,
    Character,
    DoubleReal,
    Integer,
    Null,
    Real,
    /// A double-quoted string; typed as the built-in `string` array.
    String,
}

impl LiteralKind {
    /// Name of the built-in type a literal of this kind is given.
    pub fn type_name(self) -> &'static str {
        match self {
            LiteralKind::String => "string",
            other => other.basic().map(BasicKind::name).unwrap_or("string"),
        }
    }

    /// The scalar kind, for every literal except strings.
    pub fn basic(self) -> Option<BasicKind> {
        match self {
            LiteralKind::Boolean => Some(BasicKind::Boolean),
            LiteralKind::Character => Some(BasicKind::Character),
            LiteralKind::DoubleReal => Some(BasicKind::DoubleReal),
            LiteralKind::Integer => Some(BasicKind::Integer),
            LiteralKind::Null => Some(BasicKind::Null),
            LiteralKind::Real => Some(BasicKind::Real),
            LiteralKind::String => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Sign,
    True(u8),
    False(u8),
    Nil(u8),
    Integer,
    Real,
    RealExpSign,
    RealExpDigit,
    RealExp,
    DoubleExpSign,
    DoubleExpDigit,
    DoubleExp,
    CharBody,
    CharEscape,
    CharEnd,
    CharClose,
    StringBody,
    StringEscape,
    StringEnd,
}

fn printable(b: u8) -> bool {
    (b' '..=b'~').contains(&b)
}

fn step(state: State, b: u8) -> Option<State> {
    use State::*;
    let lower = b.to_ascii_lowercase();
    let next = match (state, lower) {
        (Start, b'n') => Nil(0),
        (Start, b't') => True(0),
        (Start, b'f') => False(0),
        (Start, b'+' | b'-') => Sign,
        (Start, b'0'..=b'9') | (Sign, b'0'..=b'9') => Integer,
        (Start, b'\'') => CharBody,
        (Start, b'"') => StringBody,

        (True(0), b'r') => True(1),
        (True(1), b'u') => True(2),
        (True(2), b'e') => True(3),
        (False(0), b'a') => False(1),
        (False(1), b'l') => False(2),
        (False(2), b's') => False(3),
        (False(3), b'e') => False(4),
        (Nil(0), b'i') => Nil(1),
        (Nil(1), b'l') => Nil(2),

        (Integer, b'0'..=b'9') => Integer,
        (Integer, b'.') => Real,
        (Integer | Real, b'e') => RealExpSign,
        (Integer | Real, b'd') => DoubleExpSign,
        (Real, b'0'..=b'9') => Real,

        (RealExpSign, b'+' | b'-') => RealExpDigit,
        (RealExpSign | RealExpDigit | RealExp, b'0'..=b'9') => RealExp,
        (DoubleExpSign, b'+' | b'-') => DoubleExpDigit,
        (DoubleExpSign | DoubleExpDigit | DoubleExp, b'0'..=b'9') => DoubleExp,

        (CharBody, _) if b == b'\\' => CharEscape,
        (CharBody, _) if b == b'\'' => return None,
        (CharBody, _) | (CharEscape, _) if printable(b) => CharEnd,
        (CharEnd, _) if b == b'\'' => CharClose,

        (StringBody, _) if b == b'\\' => StringEscape,
        (StringBody, _) if b == b'"' => StringEnd,
        (StringBody, _) | (StringEscape, _) if printable(b) => StringBody,

        _ => return None,
    };
    Some(next)
}

fn accept(state: State) -> Option<LiteralKind> {
    use State::*;
    match state {
        True(3) | False(4) => Some(LiteralKind::Boolean),
        Nil(2) => Some(LiteralKind::Null),
        Integer => Some(LiteralKind::Integer),
        Real | RealExpSign | RealExp => Some(LiteralKind::Real),
        DoubleExpSign | DoubleExp => Some(LiteralKind::DoubleReal),
        CharClose => Some(LiteralKind::Character),
        StringEnd => Some(LiteralKind::String),
        _ => None,
    }
}

/// Decides which basic type `text` is a literal of.
pub fn classify(text: &str) -> Result<LiteralKind, CoreError> {
    let error = || CoreError::LiteralFormat {
        text: text.to_string(),
    };
    let mut state = State::Start;
    for b in text.bytes() {
        state = step(state, b).ok_or_else(error)?;
    }
    accept(state).ok_or_else(error)
}

/// A host value that can be bound to an input port.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Literal text, classified with [`classify`].
    Text(String),
    /// A reference to a top-level function, written as its name.
    Function(NodeId),
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Int(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Int(n as i64)
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Text(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Text(s)
    }
}

impl From<NodeId> for HostValue {
    fn from(f: NodeId) -> Self {
        HostValue::Function(f)
    }
}

impl HostValue {
    /// Canonical literal text and kind for every value but function
    /// references, which need the module to resolve.
    pub fn to_literal(&self) -> Result<Option<(String, LiteralKind)>, CoreError> {
        Ok(Some(match self {
            HostValue::Bool(b) => (b.to_string(), LiteralKind::Boolean),
            HostValue::Int(n) => (n.to_string(), LiteralKind::Integer),
            HostValue::Float(x) => (double_literal(*x)?, LiteralKind::DoubleReal),
            HostValue::Text(t) => (t.clone(), classify(t)?),
            HostValue::Function(_) => return Ok(None),
        }))
    }
}

/// Writes a float as a doublereal literal: shortest round-trip digits, a
/// `d` exponent marker, no `+` sign, and a trailing `d` when there is no
/// exponent (`3.5` → `3.5d`, `3.5e20` → `3.5d20`, `3.5e-20` → `3.5d-20`).
pub fn double_literal(x: f64) -> Result<String, CoreError> {
    if !x.is_finite() {
        return Err(CoreError::LiteralFormat {
            text: x.to_string(),
        });
    }
    let sci = format!("{:e}", x);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if x == 0.0 || (-4..16).contains(&exp) {
        let mut plain = x.to_string();
        if !plain.contains('.') {
            plain.push_str(".0");
        }
        plain.push('d');
        Ok(plain)
    } else {
        let sign = if exp < 0 { "-" } else { "" };
        Ok(format!("{}d{}{:02}", mantissa, sign, exp.abs()))
    }
}

/// Quotes host text as a string literal, escaping quotes and backslashes
/// and writing bytes outside printable ASCII as `\ddd` octal.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            _ if printable(b) => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out.push('"');
    out
}

/// Resolves backslash escapes in the body of a character or string literal.
pub fn unescape(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' || i >= bytes.len() {
            out.push(b);
            continue;
        }
        let e = bytes[i];
        i += 1;
        match e {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value = (e - b'0') as u32;
                let mut digits = 1;
                while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + (bytes[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xff) as u8);
            }
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
