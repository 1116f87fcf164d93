//! The universal expression/runtime value tree.
//!
//! `Value` is both the serialized shape of the expression language (loaded
//! from the on-disk bundle) and the runtime representation the evaluator
//! produces. A node carries a type tag, an optional primitive payload, and
//! an ordered sequence of children — mirroring the tagged-tree AST used by
//! `causality-lisp`, generalized to the fixed opcode set this engine needs.

use serde::{Deserialize, Serialize};

/// The fixed enumeration of value/operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    // Primitives
    Nil,
    Uint64,
    Bool,
    Bytes,

    // Binder references
    Arg,
    Param,

    // Chain data constructors
    OutPoint,
    CellInput,
    CellDep,
    Script,
    Cell,
    Header,
    Transaction,

    // Collection constructors
    List,
    QueryCells,
    Map,
    Filter,

    // Per-field projections
    GetCapacity,
    GetLock,
    GetType,
    GetData,
    GetDataHash,
    GetOutPoint,
    GetHeader,
    GetCodeHash,
    GetHashType,
    GetArgs,
    GetCompactTarget,
    GetTimestamp,
    GetNumber,
    GetEpoch,
    GetParentHash,
    GetTransactionsRoot,
    GetProposalsHash,
    GetUnclesHash,
    GetDao,
    GetNonce,

    // Operations
    Hash,
    SerializeToCore,
    SerializeToJson,
    Not,
    And,
    Or,
    Equal,
    Less,
    Len,
    Slice,
    Index,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Apply,
    Reduce,
    Cond,
    TailRecursion,
}

impl ValueType {
    /// Header fields in fixed wire order (10 total).
    pub const HEADER_FIELDS: [ValueType; 10] = [
        ValueType::GetCompactTarget,
        ValueType::GetTimestamp,
        ValueType::GetNumber,
        ValueType::GetEpoch,
        ValueType::GetParentHash,
        ValueType::GetTransactionsRoot,
        ValueType::GetProposalsHash,
        ValueType::GetUnclesHash,
        ValueType::GetDao,
        ValueType::GetNonce,
    ];
}

/// The primitive payload carried by leaf nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    None,
    Bool(bool),
    Uint64(u64),
    Bytes(Vec<u8>),
}

/// A node in the expression/value tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub ty: ValueType,
    pub primitive: Primitive,
    pub children: Vec<Value>,
}

impl Value {
    pub fn new(ty: ValueType, primitive: Primitive, children: Vec<Value>) -> Self {
        Self { ty, primitive, children }
    }

    pub fn nil() -> Self {
        Self::new(ValueType::Nil, Primitive::None, vec![])
    }

    pub fn bool(b: bool) -> Self {
        Self::new(ValueType::Bool, Primitive::Bool(b), vec![])
    }

    pub fn uint64(u: u64) -> Self {
        Self::new(ValueType::Uint64, Primitive::Uint64(u), vec![])
    }

    pub fn bytes(raw: impl Into<Vec<u8>>) -> Self {
        Self::new(ValueType::Bytes, Primitive::Bytes(raw.into()), vec![])
    }

    pub fn arg(i: u64) -> Self {
        Self::new(ValueType::Arg, Primitive::Uint64(i), vec![])
    }

    pub fn param(i: u64) -> Self {
        Self::new(ValueType::Param, Primitive::Uint64(i), vec![])
    }

    /// Build an operation node with no primitive payload.
    pub fn op(ty: ValueType, children: Vec<Value>) -> Self {
        Self::new(ty, Primitive::None, children)
    }

    pub fn out_point(tx_hash: Value, index: Value) -> Self {
        Self::op(ValueType::OutPoint, vec![tx_hash, index])
    }

    pub fn cell_input(out_point: Value, since: Value) -> Self {
        Self::op(ValueType::CellInput, vec![out_point, since])
    }

    pub fn cell_dep(out_point: Value, dep_type: Value) -> Self {
        Self::op(ValueType::CellDep, vec![out_point, dep_type])
    }

    pub fn script(code_hash: Value, hash_type: Value, args: Value) -> Self {
        Self::op(ValueType::Script, vec![code_hash, hash_type, args])
    }

    /// Build a cell. `out_point_and_header` is either empty (live-query
    /// shape) or exactly `[out_point, header]` (indexed/fetched shape).
    pub fn cell(
        capacity: Value,
        lock: Value,
        type_: Value,
        data: Value,
        out_point_and_header: Vec<Value>,
    ) -> Self {
        let mut children = vec![capacity, lock, type_, data];
        children.extend(out_point_and_header);
        Self::op(ValueType::Cell, children)
    }

    pub fn transaction(inputs: Value, outputs: Value, deps: Value) -> Self {
        Self::op(ValueType::Transaction, vec![inputs, outputs, deps])
    }

    pub fn header(fields: [Value; 10]) -> Self {
        Self::op(ValueType::Header, fields.to_vec())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::op(ValueType::List, items)
    }

    pub fn query_cells(filter: Value) -> Self {
        Self::op(ValueType::QueryCells, vec![filter])
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.ty, ValueType::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.primitive {
            Primitive::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint64(&self) -> Option<u64> {
        match &self.primitive {
            Primitive::Uint64(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.primitive {
            Primitive::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Structural equality used for query deduplication and for
    /// `equal`'s fallback non-param comparison. `Value` already
    /// derives `PartialEq` with exactly this (deep, order-sensitive)
    /// semantics, so this is just a named entry point for callers that want
    /// to be explicit about which equality they mean.
    pub fn structurally_equal(&self, other: &Value) -> bool {
        self == other
    }
}

/// A named top-level expression — a `Call` (request/response) or a
/// `Stream` (server-push filter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Value,
}

/// The immutable bundle loaded at startup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Root {
    pub calls: Vec<NamedExpr>,
    pub streams: Vec<NamedExpr>,
}

impl Root {
    pub fn find_call(&self, name: &str) -> Option<&Value> {
        self.calls.iter().find(|c| c.name == name).map(|c| &c.expr)
    }

    pub fn find_stream(&self, name: &str) -> Option<&Value> {
        self.streams.iter().find(|s| s.name == name).map(|s| &s.expr)
    }
}

// Helper constructors mirroring `causality-lisp::ast::helpers`, kept small
// and used mostly by tests and by bundle-building tools.
pub mod helpers {
    use super::*;

    pub fn get(ty: ValueType, target: Value) -> Value {
        Value::op(ty, vec![target])
    }

    pub fn equal(a: Value, b: Value) -> Value {
        Value::op(ValueType::Equal, vec![a, b])
    }

    pub fn and(children: Vec<Value>) -> Value {
        Value::op(ValueType::And, children)
    }

    pub fn or(children: Vec<Value>) -> Value {
        Value::op(ValueType::Or, children)
    }

    pub fn reduce(f: Value, init: Value, list: Value) -> Value {
        Value::op(ValueType::Reduce, vec![f, init, list])
    }

    pub fn map(f: Value, list: Value) -> Value {
        Value::op(ValueType::Map, vec![f, list])
    }

    pub fn filter(p: Value, list: Value) -> Value {
        Value::op(ValueType::Filter, vec![p, list])
    }
}
