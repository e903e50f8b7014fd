//! TypeId and TypeTable for structural typing.
//!
//! Every type in a module has a unique [`TypeId`] providing O(1) identity
//! comparison. The [`TypeTable`] interns types on their structural
//! signature, so asking twice for `array[integer]` yields the same id, and
//! keeps the ordered type list from which `.if1` labels are derived.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{BasicKind, TypeCode, TypeDef, TypeKey};

/// Unique identifier for a type in the type table.
///
/// The inner value is an index into the table's arena. It is not a label:
/// labels are 1-based positions in the current type list and shift when a
/// type is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Ids of the built-in types in a table created by
/// [`TypeTable::with_builtins`].
impl TypeId {
    pub const BOOLEAN: TypeId = TypeId(0);
    pub const CHARACTER: TypeId = TypeId(1);
    pub const DOUBLEREAL: TypeId = TypeId(2);
    pub const INTEGER: TypeId = TypeId(3);
    pub const NULL: TypeId = TypeId(4);
    pub const REAL: TypeId = TypeId(5);
    pub const WILDBASIC: TypeId = TypeId(6);
    pub const WILD: TypeId = TypeId(7);
    pub const STRING: TypeId = TypeId(8);
}

/// Interning table of all types of a module.
///
/// Deleted types stay in the arena so that ids held elsewhere never dangle,
/// but they leave the ordered list and the intern index: a later request for
/// the same signature creates a fresh type at the end of the list.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    /// Every type ever created, indexed by TypeId.0
    arena: Vec<TypeDef>,
    /// Live types in label order
    order: Vec<TypeId>,
    /// Structural signature lookup
    index: HashMap<TypeKey, TypeId>,
    /// Whether each arena entry is still in the list
    live: Vec<bool>,
}

impl TypeTable {
    /// Number of built-in types registered by [`with_builtins`](Self::with_builtins).
    pub const BUILTIN_COUNT: usize = 9;

    /// Creates a table with no types at all.
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Creates a table holding the nine built-in types, in label order:
    /// boolean, character, doublereal, integer, null, real, wildbasic, wild
    /// and string (array of character).
    pub fn with_builtins() -> Self {
        let mut table = TypeTable::new();
        for kind in BasicKind::ALL {
            let id = table.add_basic(kind);
            table.arena[id.0 as usize].pragmas.set_name(Some(kind.name()));
        }
        let wild = table.insert(TypeKey {
            code: TypeCode::Wild,
            aux: 0,
            p1: None,
            p2: None,
        });
        table.arena[wild.0 as usize].pragmas.set_name(Some("wild"));
        let string = table.insert(TypeKey {
            code: TypeCode::Array,
            aux: 0,
            p1: Some(TypeId::CHARACTER),
            p2: None,
        });
        table.arena[string.0 as usize].pragmas.set_name(Some("string"));
        table
    }

    fn insert(&mut self, key: TypeKey) -> TypeId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = TypeId(self.arena.len() as u32);
        self.arena.push(TypeDef::new(key));
        self.live.push(true);
        self.order.push(id);
        self.index.insert(key, id);
        tracing::trace!(id = id.0, code = ?key.code, "interned type");
        id
    }

    fn check_live(&self, id: Option<TypeId>) -> Result<(), CoreError> {
        match id {
            Some(id) => self.get(id).map(|_| ()),
            None => Ok(()),
        }
    }

    fn is_live(&self, id: TypeId) -> bool {
        self.live.get(id.0 as usize).copied().unwrap_or(false)
    }

    /// Returns the Basic type of the given kind, creating it if needed.
    pub fn add_basic(&mut self, kind: BasicKind) -> TypeId {
        self.insert(TypeKey {
            code: TypeCode::Basic,
            aux: kind.code(),
            p1: None,
            p2: None,
        })
    }

    /// Returns the canonical type for a non-Basic signature.
    ///
    /// Wild takes no parameters; Array, Multiple, Record, Stream and Union
    /// take exactly `p1`; Field, Tag and Tuple require `p1` and accept `p2`;
    /// Function requires `p2` (its outputs) and accepts `p1` (its inputs).
    /// Basic types go through [`add_basic`](Self::add_basic).
    pub fn add(
        &mut self,
        code: TypeCode,
        p1: Option<TypeId>,
        p2: Option<TypeId>,
    ) -> Result<TypeId, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidConstruction {
            code,
            reason: reason.to_string(),
        };
        match code {
            TypeCode::Basic => return Err(invalid("basic types are selected by aux")),
            TypeCode::Wild => {
                if p1.is_some() || p2.is_some() {
                    return Err(invalid("wild takes no parameters"));
                }
            }
            TypeCode::Array
            | TypeCode::Multiple
            | TypeCode::Record
            | TypeCode::Stream
            | TypeCode::Union => {
                if p1.is_none() {
                    return Err(invalid("missing base type"));
                }
                if p2.is_some() {
                    return Err(invalid("takes a single parameter"));
                }
            }
            TypeCode::Field | TypeCode::Tag | TypeCode::Tuple => {
                if p1.is_none() {
                    return Err(invalid("missing element type"));
                }
            }
            TypeCode::Function => {
                if p2.is_none() {
                    return Err(invalid("missing output type"));
                }
            }
        }
        self.check_live(p1)?;
        self.check_live(p2)?;
        Ok(self.insert(TypeKey {
            code,
            aux: 0,
            p1,
            p2,
        }))
    }

    /// Builds a right-folded chain of `code` links over `types`, returning
    /// its head, or `None` for an empty sequence.
    ///
    /// When `names` is given, link `i` is named `names[i]`.
    pub fn add_chain(
        &mut self,
        types: &[TypeId],
        code: TypeCode,
        names: Option<&[&str]>,
    ) -> Result<Option<TypeId>, CoreError> {
        if !code.is_chain_link() {
            return Err(CoreError::InvalidConstruction {
                code,
                reason: "chains are built from tuple, field or tag links".into(),
            });
        }
        if let Some(names) = names {
            if names.len() != types.len() {
                return Err(CoreError::InvalidConstruction {
                    code,
                    reason: format!("{} names for {} links", names.len(), types.len()),
                });
            }
        }
        let mut tail = None;
        for (i, t) in types.iter().enumerate().rev() {
            let link = self.add(code, Some(*t), tail)?;
            if let Some(names) = names {
                self.arena[link.0 as usize].pragmas.set_name(Some(names[i]));
            }
            tail = Some(link);
        }
        Ok(tail)
    }

    /// Element types of a chain, head first.
    ///
    /// Tuple, Field and Tag types are walked directly; Record and Union types
    /// walk the chain held in their first parameter.
    pub fn chain(&self, head: TypeId) -> Result<Vec<TypeId>, CoreError> {
        Ok(self.links(head)?.iter().filter_map(|l| self.arena[l.0 as usize].parameter1).collect())
    }

    /// Link names of a chain (`na` of each link), head first.
    pub fn chain_names(&self, head: TypeId) -> Result<Vec<Option<String>>, CoreError> {
        Ok(self
            .links(head)?
            .iter()
            .map(|l| self.arena[l.0 as usize].name().map(str::to_string))
            .collect())
    }

    fn links(&self, head: TypeId) -> Result<Vec<TypeId>, CoreError> {
        let def = self.get(head)?;
        let start = match def.code {
            TypeCode::Tuple | TypeCode::Field | TypeCode::Tag => Some(head),
            TypeCode::Record | TypeCode::Union => def.parameter1,
            _ => return Err(CoreError::InvalidChain { id: head }),
        };
        let mut links = Vec::new();
        let mut cursor = start;
        while let Some(link) = cursor {
            if links.len() > self.arena.len() {
                return Err(CoreError::InvalidChain { id: head });
            }
            links.push(link);
            cursor = self.get(link)?.parameter2;
        }
        Ok(links)
    }

    /// The definition of a live type. Deleted types are not found.
    pub fn get(&self, id: TypeId) -> Result<&TypeDef, CoreError> {
        if !self.is_live(id) {
            return Err(CoreError::TypeNotFound { id });
        }
        self.arena
            .get(id.0 as usize)
            .ok_or(CoreError::TypeNotFound { id })
    }

    pub fn get_mut(&mut self, id: TypeId) -> Result<&mut TypeDef, CoreError> {
        if !self.is_live(id) {
            return Err(CoreError::TypeNotFound { id });
        }
        self.arena
            .get_mut(id.0 as usize)
            .ok_or(CoreError::TypeNotFound { id })
    }

    /// Removes a type from the ordered list; every later label shifts down.
    pub fn delete(&mut self, id: TypeId) -> Result<(), CoreError> {
        let pos = self
            .order
            .iter()
            .position(|t| *t == id)
            .ok_or(CoreError::TypeNotFound { id })?;
        self.order.remove(pos);
        self.live[id.0 as usize] = false;
        let key = self.arena[id.0 as usize].key();
        if self.index.get(&key) == Some(&id) {
            self.index.remove(&key);
        }
        tracing::debug!(id = id.0, "deleted type");
        Ok(())
    }

    /// Live types in label order.
    pub fn ids(&self) -> &[TypeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The 1-based label of a live type.
    pub fn label(&self, id: TypeId) -> Option<u32> {
        self.order.iter().position(|t| *t == id).map(|p| p as u32 + 1)
    }

    /// Labels of all live types, computed in one pass.
    pub fn labels(&self) -> HashMap<TypeId, u32> {
        self.order
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, i as u32 + 1))
            .collect()
    }

    /// First live type whose `na` pragma equals `name`.
    pub fn by_name(&self, name: &str) -> Option<TypeId> {
        self.order
            .iter()
            .copied()
            .find(|t| self.arena[t.0 as usize].name() == Some(name))
    }

    // -----------------------------------------------------------------------
    // Parser support: records are created in label order first and linked
    // afterwards, since parameters may refer forward.
    // -----------------------------------------------------------------------

    pub(crate) fn push_record(&mut self, code: TypeCode, aux: u32) -> TypeId {
        let id = TypeId(self.arena.len() as u32);
        self.arena.push(TypeDef::new(TypeKey {
            code,
            aux,
            p1: None,
            p2: None,
        }));
        self.live.push(true);
        self.order.push(id);
        id
    }

    pub(crate) fn link_record(&mut self, id: TypeId, p1: Option<TypeId>, p2: Option<TypeId>) {
        let def = &mut self.arena[id.0 as usize];
        def.parameter1 = p1;
        def.parameter2 = p2;
    }

    /// Rebuilds the intern index from the ordered list; the first type with
    /// a given signature is canonical.
    pub(crate) fn reindex(&mut self) {
        self.index.clear();
        for id in &self.order {
            let key = self.arena[id.0 as usize].key();
            self.index.entry(key).or_insert(*id);
        }
    }

    /// Renders a type for humans: `array[integer]`, `int->real`,
    /// `function[integer returns real]`.
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay {
            table: self,
            id: Some(id),
        }
    }
}

/// Human-readable rendering of a type; see [`TypeTable::display`].
pub struct TypeDisplay<'t> {
    table: &'t TypeTable,
    id: Option<TypeId>,
}

impl TypeDisplay<'_> {
    fn of(&self, id: Option<TypeId>) -> Self {
        TypeDisplay {
            table: self.table,
            id,
        }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(id) = self.id else {
            return Ok(());
        };
        let Ok(def) = self.table.get(id) else {
            return write!(f, "<{}>", id);
        };

        // Named types print their name, except chain links which carry
        // field names rather than type names.
        if !def.code.is_chain_link() {
            if let Some(name) = def.name() {
                return f.write_str(name);
            }
        }

        match def.code {
            TypeCode::Array
            | TypeCode::Multiple
            | TypeCode::Record
            | TypeCode::Stream
            | TypeCode::Union => {
                write!(f, "{}[{}]", def.code.keyword(), self.of(def.parameter1))
            }
            TypeCode::Basic => write!(f, "Basic({})", def.aux),
            TypeCode::Wild => f.write_str("wild"),
            TypeCode::Field | TypeCode::Tag | TypeCode::Tuple => {
                if let Some(name) = def.name() {
                    write!(f, "{}:", name)?;
                }
                write!(f, "{}", self.of(def.parameter1))?;
                if def.parameter2.is_some() {
                    write!(f, "->{}", self.of(def.parameter2))?;
                }
                Ok(())
            }
            TypeCode::Function => write!(
                f,
                "function[{} returns {}]",
                self.of(def.parameter1),
                self.of(def.parameter2)
            ),
        }
    }
}
