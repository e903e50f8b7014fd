//! `.if1` text → Module.
//!
//! Reading happens in three steps:
//!
//! 1. Every line is classified. `T` and `C$` records may appear anywhere;
//!    all other records are kept in document order.
//! 2. Types are created in label order. Labels need not be dense: gaps are
//!    dropped, and a label that is referenced but never defined becomes an
//!    anonymous Wild type. Parameters are linked once every record exists,
//!    so they may refer forward.
//! 3. Function records are replayed. They nest (`X` opens a function,
//!    `{ Compound` / `G` / `}` bracket child graphs), so their relative
//!    order matters. Wires and literals of a graph are resolved when the
//!    graph closes, since they may name nodes declared after them.
//!
//! Any malformed line fails the whole read with [`CoreError::Parse`]
//! carrying the line.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::NodeId;
use crate::module::Module;
use crate::node::Role;
use crate::ops::Opcode;
use crate::pragma::{PragmaValue, Pragmas};
use crate::type_id::TypeId;
use crate::types::{BasicKind, TypeCode};

fn parse_error(line: &str, reason: impl Into<String>) -> CoreError {
    CoreError::Parse {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Wraps an error raised while applying a record so that it names the line.
fn at(line: &str) -> impl Fn(CoreError) -> CoreError + '_ {
    move |e| match e {
        CoreError::Parse { .. } => e,
        other => parse_error(line, other.to_string()),
    }
}

fn number(token: Option<&&str>, line: &str, what: &str) -> Result<u32, CoreError> {
    let token = token.ok_or_else(|| parse_error(line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {} '{}'", what, token)))
}

/// Splits record tokens into positional fields and trailing `%key=value`
/// pragmas.
fn fields<'a>(
    tokens: impl Iterator<Item = &'a str>,
    line: &str,
) -> Result<(Vec<&'a str>, Pragmas), CoreError> {
    let mut positional = Vec::new();
    let mut pragmas = Pragmas::new();
    for token in tokens {
        if let Some(pragma) = token.strip_prefix('%') {
            let (key, value) = pragma
                .split_once('=')
                .ok_or_else(|| parse_error(line, format!("malformed pragma '{}'", token)))?;
            pragmas.set(key, PragmaValue::parse(value)).map_err(at(line))?;
        } else if pragmas.is_empty() {
            positional.push(token);
        } else {
            return Err(parse_error(line, format!("unexpected field '{}'", token)));
        }
    }
    Ok((positional, pragmas))
}

/// `(before, quoted, after)` around the outermost pair of double quotes.
fn split_quoted(line: &str) -> Option<(&str, &str, &str)> {
    let open = line.find('"')?;
    let close = line.rfind('"')?;
    if close <= open {
        return None;
    }
    Some((&line[..open], &line[open + 1..close], &line[close + 1..]))
}

struct TypeRecord<'a> {
    line: &'a str,
    code: TypeCode,
    aux: u32,
    params: [u32; 2],
    pragmas: Pragmas,
}

impl TypeRecord<'_> {
    fn referenced(&self) -> impl Iterator<Item = u32> + '_ {
        self.params.iter().copied().filter(|l| *l != 0)
    }
}

fn parse_type(line: &str) -> Result<(u32, TypeRecord<'_>), CoreError> {
    let (pos, pragmas) = fields(line.split_whitespace().skip(1), line)?;
    let label = number(pos.first(), line, "type label")?;
    if label == 0 {
        return Err(parse_error(line, "type labels start at 1"));
    }
    let raw = number(pos.get(1), line, "type code")?;
    let code = TypeCode::from_code(raw).ok_or_else(|| parse_error(line, "unknown typecode"))?;
    let arity = match code {
        TypeCode::Wild => 0,
        TypeCode::Basic
        | TypeCode::Array
        | TypeCode::Multiple
        | TypeCode::Record
        | TypeCode::Stream
        | TypeCode::Union => 1,
        TypeCode::Field | TypeCode::Tag | TypeCode::Tuple | TypeCode::Function => 2,
    };
    if pos.len() != 2 + arity {
        return Err(parse_error(
            line,
            format!("{} types take {} parameters", code.keyword(), arity),
        ));
    }
    let mut record = TypeRecord {
        line,
        code,
        aux: 0,
        params: [0, 0],
        pragmas,
    };
    if code == TypeCode::Basic {
        let aux = number(pos.get(2), line, "basic kind")?;
        BasicKind::from_code(aux).ok_or_else(|| parse_error(line, "unknown basic type"))?;
        record.aux = aux;
    } else {
        for i in 0..arity {
            record.params[i] = number(pos.get(2 + i), line, "type parameter")?;
        }
        let needs_p1 = !matches!(code, TypeCode::Function | TypeCode::Wild);
        if needs_p1 && record.params[0] == 0 {
            return Err(parse_error(line, "missing base type"));
        }
        if code == TypeCode::Function && record.params[1] == 0 {
            return Err(parse_error(line, "missing output type"));
        }
    }
    Ok((label, record))
}

/// Rejects types that (transitively) contain themselves.
fn check_acyclic(records: &BTreeMap<u32, TypeRecord<'_>>) -> Result<(), CoreError> {
    // 1 = on the current path, 2 = finished
    let mut state: HashMap<u32, u8> = HashMap::new();
    for start in records.keys() {
        let mut stack = vec![(*start, false)];
        while let Some((label, expanded)) = stack.pop() {
            if expanded {
                state.insert(label, 2);
                continue;
            }
            match state.get(&label) {
                Some(2) => continue,
                Some(_) => {
                    let line = records.get(&label).map(|r| r.line).unwrap_or_default();
                    return Err(parse_error(line, "cyclic type"));
                }
                None => {}
            }
            state.insert(label, 1);
            stack.push((label, true));
            if let Some(record) = records.get(&label) {
                for next in record.referenced() {
                    if state.get(&next) == Some(&1) {
                        return Err(parse_error(record.line, "cyclic type"));
                    }
                    stack.push((next, false));
                }
            }
        }
    }
    Ok(())
}

/// Creates the type table from the `T` records; returns the label map.
fn build_types(
    module: &mut Module,
    records: BTreeMap<u32, TypeRecord<'_>>,
) -> Result<HashMap<u32, TypeId>, CoreError> {
    check_acyclic(&records)?;

    let mut labels: BTreeSet<u32> = records.keys().copied().collect();
    for record in records.values() {
        labels.extend(record.referenced());
    }

    let mut map = HashMap::with_capacity(labels.len());
    for label in &labels {
        let id = match records.get(label) {
            Some(r) => module.types.push_record(r.code, r.aux),
            None => module.types.push_record(TypeCode::Wild, 0),
        };
        map.insert(*label, id);
    }

    for (label, record) in records {
        if record.code.is_chain_link() && record.params[1] != 0 {
            let rest = module.types.get(map[&record.params[1]])?.code();
            if rest != record.code {
                return Err(parse_error(record.line, "Invalid chain type label"));
            }
        }
        let resolve = |l: u32| if l == 0 { None } else { map.get(&l).copied() };
        let id = map[&label];
        module
            .types
            .link_record(id, resolve(record.params[0]), resolve(record.params[1]));
        module.types.get_mut(id)?.pragmas = record.pragmas;
    }
    module.types.reindex();
    Ok(map)
}

enum Pending {
    Edge {
        src: u32,
        src_port: u32,
        dst: u32,
        dst_port: u32,
        ty: Option<TypeId>,
        pragmas: Pragmas,
    },
    Literal {
        dst: u32,
        port: u32,
        ty: Option<TypeId>,
        text: String,
        pragmas: Pragmas,
    },
}

enum Scope<'a> {
    Graph {
        graph: NodeId,
        pending: Vec<(&'a str, Pending)>,
    },
    Compound {
        node: NodeId,
        label: u32,
        opcode: u32,
        graphs: Vec<NodeId>,
    },
}

/// Replays function records against a module whose types already exist.
struct FunctionReader<'a, 'm> {
    module: &'m mut Module,
    types: &'m HashMap<u32, TypeId>,
    stack: Vec<Scope<'a>>,
}

impl<'a> FunctionReader<'a, '_> {
    fn type_ref(&self, token: Option<&&str>, line: &str) -> Result<Option<TypeId>, CoreError> {
        match number(token, line, "type label")? {
            0 => Ok(None),
            label => self
                .types
                .get(&label)
                .copied()
                .map(Some)
                .ok_or_else(|| parse_error(line, format!("unknown type label {}", label))),
        }
    }

    fn current_graph(&mut self, line: &str) -> Result<(NodeId, &mut Vec<(&'a str, Pending)>), CoreError> {
        match self.stack.last_mut() {
            Some(Scope::Graph { graph, pending }) => Ok((*graph, pending)),
            _ => Err(parse_error(line, "record outside of a graph")),
        }
    }

    fn new_node(&mut self, line: &str, label: u32, opcode: Opcode) -> Result<NodeId, CoreError> {
        let (graph, _) = self.current_graph(line)?;
        let expected = self.module.nodes(graph)?.len() as u32 + 1;
        if label != expected {
            return Err(parse_error(
                line,
                format!("node label {} out of sequence, expected {}", label, expected),
            ));
        }
        self.module.add_node(graph, opcode).map_err(at(line))
    }

    fn record(&mut self, line: &'a str) -> Result<(), CoreError> {
        let head = line.split_whitespace().next().unwrap_or_default();
        match head {
            "X" => {
                self.close_all(line)?;
                let (before, name, after) =
                    split_quoted(line).ok_or_else(|| parse_error(line, "missing function name"))?;
                let pos: Vec<&str> = before.split_whitespace().skip(1).collect();
                let (_, pragmas) = fields(after.split_whitespace(), line)?;
                let ty = self.type_ref(pos.first(), line)?;
                let f = self.module.add_function(name);
                *self.module.node_pragmas_mut(f)? = pragmas;
                if let Some(ty) = ty {
                    let def = self.module.types.get(ty)?;
                    if def.code() == TypeCode::Function {
                        if let Some(args) = def.parameter1() {
                            let args = self.module.types.chain(args).map_err(at(line))?;
                            for (i, t) in args.into_iter().enumerate() {
                                self.module.set_output(f, i as u32 + 1, t)?;
                            }
                        }
                    }
                }
                self.stack.push(Scope::Graph {
                    graph: f,
                    pending: Vec::new(),
                });
            }
            "N" => {
                let (pos, pragmas) = fields(line.split_whitespace().skip(1), line)?;
                let label = number(pos.first(), line, "node label")?;
                let opcode = Opcode::from_code(number(pos.get(1), line, "opcode")?).map_err(at(line))?;
                let n = self.new_node(line, label, opcode)?;
                *self.module.node_pragmas_mut(n)? = pragmas;
            }
            "{" => {
                let pos: Vec<&str> = line.split_whitespace().collect();
                if pos.get(1) != Some(&"Compound") {
                    return Err(parse_error(line, "expected '{ Compound'"));
                }
                let label = number(pos.get(2), line, "node label")?;
                let raw = number(pos.get(3), line, "opcode")?;
                let opcode = Opcode::from_code(raw).map_err(at(line))?;
                let node = self.new_node(line, label, opcode)?;
                self.stack.push(Scope::Compound {
                    node,
                    label,
                    opcode: raw,
                    graphs: Vec::new(),
                });
            }
            "G" => {
                let (_, pragmas) = fields(line.split_whitespace().skip(2), line)?;
                self.close_subgraph()?;
                let Some(Scope::Compound { node, graphs, .. }) = self.stack.last_mut() else {
                    return Err(parse_error(line, "subgraph outside of a compound"));
                };
                let node = *node;
                let g = self.module.add_graph(node).map_err(at(line))?;
                graphs.push(g);
                *self.module.node_pragmas_mut(g)? = pragmas;
                self.stack.push(Scope::Graph {
                    graph: g,
                    pending: Vec::new(),
                });
            }
            "}" => {
                self.close_subgraph()?;
                let Some(Scope::Compound {
                    node,
                    label,
                    opcode,
                    graphs,
                }) = self.stack.pop()
                else {
                    return Err(parse_error(line, "'}' without a compound"));
                };
                let (pos, pragmas) = fields(line.split_whitespace().skip(1), line)?;
                if number(pos.first(), line, "node label")? != label
                    || number(pos.get(1), line, "opcode")? != opcode
                {
                    return Err(parse_error(line, "compound trailer does not match its header"));
                }
                let count = number(pos.get(2), line, "child count")? as usize;
                if pos.len() != 3 + count {
                    return Err(parse_error(line, "child count does not match offsets"));
                }
                let mut children = SmallVec::with_capacity(count);
                for i in 0..count {
                    let offset = number(pos.get(3 + i), line, "child offset")? as usize;
                    let g = graphs
                        .get(offset)
                        .ok_or_else(|| parse_error(line, format!("no subgraph {}", offset)))?;
                    children.push(*g);
                }
                let n = self.module.node_mut(node)?;
                n.children = children;
                n.pragmas = pragmas;
            }
            "E" => {
                let (pos, pragmas) = fields(line.split_whitespace().skip(1), line)?;
                if pos.len() != 5 {
                    return Err(parse_error(line, "edge records have five fields"));
                }
                let pending = Pending::Edge {
                    src: number(pos.first(), line, "source label")?,
                    src_port: number(pos.get(1), line, "source port")?,
                    dst: number(pos.get(2), line, "destination label")?,
                    dst_port: number(pos.get(3), line, "destination port")?,
                    ty: self.type_ref(pos.get(4), line)?,
                    pragmas,
                };
                self.current_graph(line)?.1.push((line, pending));
            }
            "L" => {
                let (before, text, after) =
                    split_quoted(line).ok_or_else(|| parse_error(line, "missing literal text"))?;
                let pos: Vec<&str> = before.split_whitespace().skip(1).collect();
                if pos.len() != 3 {
                    return Err(parse_error(line, "literal records have three fields"));
                }
                let (_, pragmas) = fields(after.split_whitespace(), line)?;
                let pending = Pending::Literal {
                    dst: number(pos.first(), line, "destination label")?,
                    port: number(pos.get(1), line, "destination port")?,
                    ty: self.type_ref(pos.get(2), line)?,
                    text: text.to_string(),
                    pragmas,
                };
                self.current_graph(line)?.1.push((line, pending));
            }
            _ => return Err(parse_error(line, "unknown record")),
        }
        Ok(())
    }

    /// Closes the innermost graph if it is a child graph.
    fn close_subgraph(&mut self) -> Result<(), CoreError> {
        if let Some(Scope::Graph { graph, .. }) = self.stack.last() {
            if matches!(self.module.node(*graph)?.role, Role::Subgraph { .. }) {
                self.close_graph()?;
            }
        }
        Ok(())
    }

    fn close_all(&mut self, line: &str) -> Result<(), CoreError> {
        while let Some(scope) = self.stack.last() {
            if matches!(scope, Scope::Compound { .. }) {
                return Err(parse_error(line, "unterminated compound"));
            }
            self.close_graph()?;
        }
        Ok(())
    }

    /// Pops the innermost graph and resolves its wires and literals.
    fn close_graph(&mut self) -> Result<(), CoreError> {
        let Some(Scope::Graph { graph, pending }) = self.stack.pop() else {
            return Ok(());
        };
        let nodes = self.module.nodes(graph)?.to_vec();
        for (line, record) in pending {
            let node_at = |label: u32| -> Result<NodeId, CoreError> {
                if label == 0 {
                    return Ok(graph);
                }
                nodes
                    .get(label as usize - 1)
                    .copied()
                    .ok_or_else(|| parse_error(line, format!("unknown node label {}", label)))
            };
            match record {
                Pending::Edge {
                    src,
                    src_port,
                    dst,
                    dst_port,
                    ty,
                    pragmas,
                } => {
                    let src = node_at(src)?.out(src_port);
                    let dst = node_at(dst)?.inp(dst_port);
                    if let Some(ty) = ty {
                        if self.module.output_type(src)?.is_none() {
                            self.module.set_output(src.node, src.port, ty).map_err(at(line))?;
                        }
                    }
                    self.module.wire(dst, src).map_err(at(line))?;
                    *self.module.in_pragmas_mut(dst).map_err(at(line))? = pragmas;
                }
                Pending::Literal {
                    dst,
                    port,
                    ty,
                    text,
                    pragmas,
                } => {
                    let dst = node_at(dst)?.inp(port);
                    self.module.bind_literal(dst, text, ty).map_err(at(line))?;
                    *self.module.in_pragmas_mut(dst).map_err(at(line))? = pragmas;
                }
            }
        }
        Ok(())
    }
}

impl Module {
    /// Reads a module from `.if1` text.
    ///
    /// The result starts from an empty type table: only the types the text
    /// defines exist, so `Module::from_if1("")` has no types at all.
    pub fn from_if1(text: &str) -> Result<Module, CoreError> {
        let mut records = BTreeMap::new();
        let mut pragmas = BTreeMap::new();
        let mut function_lines = Vec::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("C$") {
                let rest = rest.trim_start();
                let mut chars = rest.chars();
                let key = chars
                    .next()
                    .ok_or_else(|| parse_error(line, "missing pragma key"))?;
                pragmas.insert(key, chars.as_str().trim().to_string());
                continue;
            }
            match line.split_whitespace().next() {
                Some("T") => {
                    let (label, record) = parse_type(line)?;
                    if records.insert(label, record).is_some() {
                        return Err(parse_error(line, "duplicate type label"));
                    }
                }
                Some("X" | "N" | "E" | "L" | "{" | "G" | "}") => function_lines.push(line),
                _ => return Err(parse_error(line, "unknown record")),
            }
        }

        let mut module = Module::empty();
        module.pragmas = pragmas;
        let type_count = records.len();
        let types = build_types(&mut module, records)?;

        let mut reader = FunctionReader {
            module: &mut module,
            types: &types,
            stack: Vec::new(),
        };
        for line in &function_lines {
            reader.record(line)?;
        }
        reader.close_all("<end of input>")?;

        tracing::debug!(
            types = type_count,
            functions = module.functions.len(),
            "read module"
        );
        Ok(module)
    }
}

impl FromStr for Module {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::from_if1(s)
    }
}
