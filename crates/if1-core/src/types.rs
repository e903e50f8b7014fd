//! Structural type codes and type records.
//!
//! Every IF1 type is a `(code, aux, parameter1, parameter2)` record. Basic
//! types use `aux` to select a scalar kind; every other code links to other
//! types through its parameters, so the set of types forms a DAG.
//! [`TypeDef`] values are only ever created by the
//! [`TypeTable`](crate::type_id::TypeTable), which interns them.

use serde::{Deserialize, Serialize};

use crate::pragma::Pragmas;
use crate::type_id::TypeId;

/// The structural kind of a type, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Array = 0,
    Basic = 1,
    Field = 2,
    Function = 3,
    Multiple = 4,
    Record = 5,
    Stream = 6,
    Tag = 7,
    Tuple = 8,
    Union = 9,
    Wild = 10,
}

impl TypeCode {
    pub const ALL: [TypeCode; 11] = [
        TypeCode::Array,
        TypeCode::Basic,
        TypeCode::Field,
        TypeCode::Function,
        TypeCode::Multiple,
        TypeCode::Record,
        TypeCode::Stream,
        TypeCode::Tag,
        TypeCode::Tuple,
        TypeCode::Union,
        TypeCode::Wild,
    ];

    /// The integer written in `T` records.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<TypeCode> {
        TypeCode::ALL.get(code as usize).copied()
    }

    /// Lower-case keyword used when rendering types for humans.
    pub fn keyword(self) -> &'static str {
        match self {
            TypeCode::Array => "array",
            TypeCode::Basic => "basic",
            TypeCode::Field => "field",
            TypeCode::Function => "function",
            TypeCode::Multiple => "multiple",
            TypeCode::Record => "record",
            TypeCode::Stream => "stream",
            TypeCode::Tag => "tag",
            TypeCode::Tuple => "tuple",
            TypeCode::Union => "union",
            TypeCode::Wild => "wild",
        }
    }

    /// Tuple, Field and Tag types are links of a chain: `parameter1` is the
    /// element, `parameter2` the rest of the chain.
    pub fn is_chain_link(self) -> bool {
        matches!(self, TypeCode::Tuple | TypeCode::Field | TypeCode::Tag)
    }
}

/// Scalar kinds selected by the `aux` field of a Basic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    Boolean = 0,
    Character = 1,
    DoubleReal = 2,
    Integer = 3,
    Null = 4,
    Real = 5,
    WildBasic = 6,
}

impl BasicKind {
    pub const ALL: [BasicKind; 7] = [
        BasicKind::Boolean,
        BasicKind::Character,
        BasicKind::DoubleReal,
        BasicKind::Integer,
        BasicKind::Null,
        BasicKind::Real,
        BasicKind::WildBasic,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<BasicKind> {
        BasicKind::ALL.get(code as usize).copied()
    }

    /// The name the built-in type of this kind carries.
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Boolean => "boolean",
            BasicKind::Character => "character",
            BasicKind::DoubleReal => "doublereal",
            BasicKind::Integer => "integer",
            BasicKind::Null => "null",
            BasicKind::Real => "real",
            BasicKind::WildBasic => "wildbasic",
        }
    }
}

/// The interning key: two types with equal keys are the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey {
    pub code: TypeCode,
    pub aux: u32,
    pub p1: Option<TypeId>,
    pub p2: Option<TypeId>,
}

/// A type record owned by a [`TypeTable`](crate::type_id::TypeTable).
///
/// There is no public constructor: types are obtained from
/// `Module::add_type` and friends so that structural equality and identity
/// coincide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub(crate) code: TypeCode,
    pub(crate) aux: u32,
    pub(crate) parameter1: Option<TypeId>,
    pub(crate) parameter2: Option<TypeId>,
    pub(crate) pragmas: Pragmas,
}

impl TypeDef {
    pub(crate) fn new(key: TypeKey) -> Self {
        TypeDef {
            code: key.code,
            aux: key.aux,
            parameter1: key.p1,
            parameter2: key.p2,
            pragmas: Pragmas::new(),
        }
    }

    pub(crate) fn key(&self) -> TypeKey {
        TypeKey {
            code: self.code,
            aux: self.aux,
            p1: self.parameter1,
            p2: self.parameter2,
        }
    }

    pub fn code(&self) -> TypeCode {
        self.code
    }

    pub fn aux(&self) -> u32 {
        self.aux
    }

    /// The scalar kind for Basic types.
    pub fn basic(&self) -> Option<BasicKind> {
        match self.code {
            TypeCode::Basic => BasicKind::from_code(self.aux),
            _ => None,
        }
    }

    pub fn parameter1(&self) -> Option<TypeId> {
        self.parameter1
    }

    pub fn parameter2(&self) -> Option<TypeId> {
        self.parameter2
    }

    pub fn pragmas(&self) -> &Pragmas {
        &self.pragmas
    }

    pub fn name(&self) -> Option<&str> {
        self.pragmas.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_wire_numbers() {
        assert_eq!(TypeCode::Array.code(), 0);
        assert_eq!(TypeCode::Basic.code(), 1);
        assert_eq!(TypeCode::Function.code(), 3);
        assert_eq!(TypeCode::Tuple.code(), 8);
        assert_eq!(TypeCode::Wild.code(), 10);
        for code in TypeCode::ALL {
            assert_eq!(TypeCode::from_code(code.code()), Some(code));
        }
        assert_eq!(TypeCode::from_code(11), None);
    }

    #[test]
    fn basic_kinds_match_wire_numbers() {
        assert_eq!(BasicKind::Boolean.code(), 0);
        assert_eq!(BasicKind::Integer.code(), 3);
        assert_eq!(BasicKind::WildBasic.code(), 6);
        assert_eq!(BasicKind::from_code(5), Some(BasicKind::Real));
        assert_eq!(BasicKind::from_code(7), None);
    }

    #[test]
    fn chain_links() {
        assert!(TypeCode::Tuple.is_chain_link());
        assert!(TypeCode::Field.is_chain_link());
        assert!(TypeCode::Tag.is_chain_link());
        assert!(!TypeCode::Record.is_chain_link());
        assert!(!TypeCode::Function.is_chain_link());
    }
}
