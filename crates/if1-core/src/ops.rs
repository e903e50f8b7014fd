//! The IF1 opcode vocabulary.
//!
//! Opcodes fall into three families that share one number space:
//! - **Simple** (100..=161, plus interpreter extensions at 162..=165):
//!   scalar and aggregate operations on plain nodes (`N` records).
//! - **Compound** (0..=10): structured control whose bodies are child
//!   graphs (`{ Compound ... }` blocks).
//! - **Graph** (1000..=1005): the kind of a graph itself; top-level
//!   functions default to [`Opcode::XGraph`].
//!
//! The numbers are part of the text format and must never change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Declares [`Opcode`] together with its wire number and name.
macro_rules! opcodes {
    ($($op:ident = $code:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $($op,)*
        }

        impl Opcode {
            /// Every opcode, in wire-number order.
            const ALL: &'static [Opcode] = &[$(Opcode::$op,)*];

            /// The number written in `N`, `{` and `}` records.
            pub fn code(self) -> u32 {
                match self {
                    $(Opcode::$op => $code,)*
                }
            }

            /// Symbolic name without the `IF` prefix, e.g. `Plus`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$op => stringify!($op),)*
                }
            }

            pub fn from_code(code: u32) -> Result<Opcode, CoreError> {
                match code {
                    $($code => Ok(Opcode::$op),)*
                    _ => Err(CoreError::UnknownOpcode {
                        opcode: code.to_string(),
                    }),
                }
            }
        }
    };
}

opcodes! {
    // -- compound ---------------------------------------------------------
    Forall = 0,
    Select = 1,
    TagCase = 2,
    LoopA = 3,
    LoopB = 4,
    IfThenElse = 5,
    Iterate = 6,
    WhileLoop = 7,
    RepeatLoop = 8,
    SeqForall = 9,
    UReduce = 10,

    // -- simple -----------------------------------------------------------
    AAddH = 100,
    AAddL = 101,
    AAdjust = 102,
    ABuild = 103,
    ACatenate = 104,
    AElement = 105,
    AFill = 106,
    AGather = 107,
    AIsEmpty = 108,
    ALimH = 109,
    ALimL = 110,
    ARemH = 111,
    ARemL = 112,
    AReplace = 113,
    AScatter = 114,
    ASetL = 115,
    ASize = 116,
    Abs = 117,
    BindArguments = 118,
    Bool = 119,
    Call = 120,
    Char = 121,
    Div = 122,
    Double = 123,
    Equal = 124,
    Exp = 125,
    FirstValue = 126,
    FinalValue = 127,
    Floor = 128,
    Int = 129,
    IsError = 130,
    Less = 131,
    LessEqual = 132,
    Max = 133,
    Min = 134,
    Minus = 135,
    Mod = 136,
    Neg = 137,
    NoOp = 138,
    Not = 139,
    NotEqual = 140,
    Plus = 141,
    RangeGenerate = 142,
    RBuild = 143,
    RElements = 144,
    RReplace = 145,
    RedLeft = 146,
    RedRight = 147,
    RedTree = 148,
    Reduce = 149,
    RestValues = 150,
    Single = 151,
    Times = 152,
    Trunc = 153,
    PrefixSize = 154,
    Error = 155,
    ReplaceMulti = 156,
    Convert = 157,
    CallForeign = 158,
    AElementN = 159,
    AElementP = 160,
    AElementM = 161,
    // Interpreter extensions without a standard number.
    Great = 162,
    GreatEqual = 163,
    And = 164,
    Or = 165,

    // -- graph ------------------------------------------------------------
    SGraph = 1000,
    LGraph = 1001,
    IGraph = 1002,
    XGraph = 1003,
    LPGraph = 1004,
    RLGraph = 1005,
}

/// The family an opcode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpcodeKind {
    Simple,
    Compound,
    Graph,
}

impl Opcode {
    /// Looks up `Plus` or its prefixed spelling `IFPlus`.
    pub fn from_name(name: &str) -> Result<Opcode, CoreError> {
        let bare = name.strip_prefix("IF").unwrap_or(name);
        Opcode::all()
            .find(|op| op.name() == bare || op.name() == name)
            .ok_or(CoreError::UnknownOpcode {
                opcode: name.to_string(),
            })
    }

    pub fn kind(self) -> OpcodeKind {
        match self.code() {
            0..=10 => OpcodeKind::Compound,
            1000.. => OpcodeKind::Graph,
            _ => OpcodeKind::Simple,
        }
    }

    pub fn is_compound(self) -> bool {
        self.kind() == OpcodeKind::Compound
    }

    pub fn is_graph(self) -> bool {
        self.kind() == OpcodeKind::Graph
    }

    /// Every opcode, in wire-number order.
    pub fn all() -> impl Iterator<Item = Opcode> {
        Opcode::ALL.iter().copied()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IF{}", self.name())
    }
}
