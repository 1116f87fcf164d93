//! Builds the index-relevant shape of a `Call`'s result tree: which
//! `query_cells` nodes it contains, what parameters each one needs bound,
//! and the canonical string key an indexed query is stored under.
//!
//! Grounded on `ValueContext`/`IndexKey` from the reference indexer's
//! `context.go`, generalized with structural-equality deduplication and
//! automatic per-query parameter discovery in place of a caller-supplied
//! parameter list.

pub mod error;

pub use error::{ContextError, ContextResult};

use animagus_types::{Value, ValueType};
use std::collections::BTreeSet;

/// One retained `query_cells` node plus the sorted set of `param(i)`
/// indices that appear anywhere in its filter sub-tree.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub query: Value,
    pub param_indices: Vec<u64>,
}

/// The index-relevant shape of a single `Call`'s expression tree.
#[derive(Debug, Clone)]
pub struct ValueContext {
    pub name: String,
    pub queries: Vec<QueryEntry>,
}

impl ValueContext {
    /// Walk `expr`'s tree collecting `query_cells` nodes in encounter
    /// order, deduplicated by deep structural equality (two queries with
    /// identical children are treated as one logical query). A
    /// `query_cells` node's own children are not descended into — a query
    /// cannot contain a nested query.
    pub fn new(name: impl Into<String>, expr: &Value) -> Self {
        let mut queries: Vec<Value> = Vec::new();
        collect_queries(expr, &mut queries);

        let entries = queries
            .into_iter()
            .map(|query| {
                let param_indices = collect_param_indices(&query);
                QueryEntry { query, param_indices }
            })
            .collect();

        Self { name: name.into(), queries: entries }
    }

    /// The ordinal of `query` within this context, if it (structurally)
    /// appears here.
    pub fn query_index(&self, query: &Value) -> Option<usize> {
        self.queries.iter().position(|entry| &entry.query == query)
    }

    /// Build the canonical index key for `query_ordinal`, given a map from
    /// parameter index to its bound value. Fails if a parameter the query
    /// actually references is missing from `param_values`.
    pub fn index_key(
        &self,
        query_ordinal: usize,
        param_values: &std::collections::BTreeMap<u64, Value>,
    ) -> ContextResult<String> {
        let entry = self.queries.get(query_ordinal).ok_or(ContextError::UnknownQuery(query_ordinal))?;

        let mut encoded = String::new();
        encoded.push_str(&entry.param_indices.len().to_string());
        for index in &entry.param_indices {
            let value = param_values.get(index).ok_or(ContextError::MissingParam(*index))?;
            encoded.push_str(&encode_param(*index, value)?);
        }

        Ok(format!("CALL:{}:QUERY:{}:PARAM:{}:CELLS", self.name, query_ordinal, encoded))
    }
}

fn collect_queries(expr: &Value, out: &mut Vec<Value>) {
    if expr.ty == ValueType::QueryCells {
        if !out.iter().any(|q| q == expr) {
            out.push(expr.clone());
        }
        return;
    }
    for child in &expr.children {
        collect_queries(child, out);
    }
}

fn collect_param_indices(query: &Value) -> Vec<u64> {
    let mut set = BTreeSet::new();
    let mut stack = vec![query];
    while let Some(node) = stack.pop() {
        if node.ty == ValueType::Param {
            if let Some(i) = node.as_uint64() {
                set.insert(i);
            }
        }
        stack.extend(node.children.iter());
    }
    set.into_iter().collect()
}

fn encode_param(index: u64, value: &Value) -> ContextResult<String> {
    match value.ty {
        ValueType::Uint64 => Ok(format!("n{}", value.as_uint64().unwrap())),
        ValueType::Bool => Ok(format!("o{}", value.as_bool().unwrap())),
        ValueType::Bytes => Ok(format!("x{}", hex::encode(value.as_bytes().unwrap()))),
        other => Err(ContextError::UnencodableParam { index, found: other }),
    }
}
