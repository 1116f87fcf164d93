//! The `Environment` the indexer evaluates `query_cells` filters and stream
//! filters under. Both variants refuse `query_cell` — cells are supplied
//! block-by-block during indexing, never resolved live — and differ only in
//! what `arg`s they expose.

use animagus_evaluator::{EvalError, EvalResult, Environment};
use animagus_types::Value;
use std::collections::BTreeMap;

/// Evaluates one `QUERY_CELLS` filter against one cell. `arg(0)` is the
/// cell; `param(i)` echoes back any value already bound to it, letting
/// `equal(param(i), param(i))`-style re-reads within the same filter see a
/// consistent value. `index_param` is write-once per evaluation: binding a
/// previously-bound index to a different value is "already bound".
pub struct IndexingEnvironment {
    cell: Value,
    bound: BTreeMap<u64, Value>,
}

impl IndexingEnvironment {
    pub fn new(cell: Value) -> Self {
        Self { cell, bound: BTreeMap::new() }
    }

    pub fn into_bound(self) -> BTreeMap<u64, Value> {
        self.bound
    }

    pub fn bound(&self) -> &BTreeMap<u64, Value> {
        &self.bound
    }
}

impl Environment for IndexingEnvironment {
    fn arg(&self, i: u64) -> Option<Value> {
        if i == 0 {
            Some(self.cell.clone())
        } else {
            None
        }
    }

    fn param(&self, i: u64) -> Option<Value> {
        self.bound.get(&i).cloned()
    }

    fn index_param(&mut self, i: u64, value: Value) -> EvalResult<()> {
        match self.bound.get(&i) {
            None => {
                self.bound.insert(i, value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(EvalError::ParamAlreadyBound { index: i }),
        }
    }

    fn query_cell(&mut self, _query: &Value) -> EvalResult<Vec<Value>> {
        Err(EvalError::QueryCellRefused)
    }
}

/// A direction/role discriminator pair for stream filter evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Insert,
    Remove,
}

impl Direction {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Direction::Insert => b"insert",
            Direction::Remove => b"remove",
        }
    }

    /// The direction a revert-publish reports: the mirror of the original.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Insert => Direction::Remove,
            Direction::Remove => Direction::Insert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Index,
    Revert,
}

impl Role {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Role::Index => b"index",
            Role::Revert => b"revert",
        }
    }
}

/// Evaluates a stream filter: `arg(0)` is the touched cell, `arg(1)` is the
/// direction (`insert`/`remove`), `arg(2)` is the role (`index`/`revert`).
/// `index_param` is always refused — streams never bind query parameters.
pub struct StreamEnvironment {
    cell: Value,
    direction: Value,
    role: Value,
}

impl StreamEnvironment {
    pub fn new(cell: Value, direction: Direction, role: Role) -> Self {
        Self {
            cell,
            direction: Value::bytes(direction.as_bytes().to_vec()),
            role: Value::bytes(role.as_bytes().to_vec()),
        }
    }
}

impl Environment for StreamEnvironment {
    fn arg(&self, i: u64) -> Option<Value> {
        match i {
            0 => Some(self.cell.clone()),
            1 => Some(self.direction.clone()),
            2 => Some(self.role.clone()),
            _ => None,
        }
    }

    fn param(&self, _i: u64) -> Option<Value> {
        None
    }

    fn index_param(&mut self, _i: u64, _value: Value) -> EvalResult<()> {
        Err(EvalError::IndexParamRefused)
    }

    fn query_cell(&mut self, _query: &Value) -> EvalResult<Vec<Value>> {
        Err(EvalError::QueryCellRefused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_evaluator::eval;
    use animagus_types::value::helpers;

    #[test]
    fn index_param_binds_once() {
        let mut env = IndexingEnvironment::new(Value::uint64(1));
        let expr = helpers::equal(Value::param(0), Value::uint64(7));
        assert_eq!(eval(&expr, &mut env).unwrap(), Value::bool(true));
        assert_eq!(env.bound().get(&0), Some(&Value::uint64(7)));
    }

    #[test]
    fn index_param_conflicting_rebind_fails() {
        let mut env = IndexingEnvironment::new(Value::uint64(1));
        eval(&helpers::equal(Value::param(0), Value::uint64(7)), &mut env).unwrap();
        let second = eval(&helpers::equal(Value::param(0), Value::uint64(8)), &mut env);
        assert!(matches!(second, Err(EvalError::ParamAlreadyBound { index: 0 })));
    }

    #[test]
    fn stream_environment_exposes_cell_direction_role() {
        let mut env = StreamEnvironment::new(Value::uint64(9), Direction::Insert, Role::Index);
        assert_eq!(eval(&Value::arg(0), &mut env).unwrap(), Value::uint64(9));
        assert_eq!(eval(&Value::arg(1), &mut env).unwrap(), Value::bytes(b"insert".to_vec()));
        assert_eq!(eval(&Value::arg(2), &mut env).unwrap(), Value::bytes(b"index".to_vec()));
    }
}
