//! The `Environment` capability threaded through evaluation.
//!
//! This is the seam between the pure evaluator and everything stateful
//! around it: the service binding's per-call parameter bindings, the
//! indexer's per-cell/per-filter param recorder, and the live `query_cells`
//! resolver all implement this trait rather than being hard-wired into the
//! interpreter, mirroring how `executor.Environment` decouples
//! `evaluateValue` from its caller in the Go reference implementation.

use crate::error::{EvalError, EvalResult};
use animagus_types::Value;

pub trait Environment {
    /// Positional binding introduced by the nearest enclosing function
    /// invocation (`apply`/`reduce`/`map`/`filter` body, or a stream/query
    /// filter's implicit arguments).
    fn arg(&self, i: u64) -> Option<Value>;

    /// An external parameter, supplied by the caller (service binding) or
    /// echoed back during indexing.
    fn param(&self, i: u64) -> Option<Value>;

    /// Called by `equal(param(i), x)` to record the binding an indexing
    /// filter would require. Outside of indexing this capability is
    /// refused — see `RefusingIndexParam`.
    fn index_param(&mut self, i: u64, value: Value) -> EvalResult<()>;

    /// Resolve a `query_cells` node to its matching cells. Only meaningful
    /// outside of indexing (live Call evaluation) — see `RefusingQueryCell`.
    fn query_cell(&mut self, query: &Value) -> EvalResult<Vec<Value>>;
}

/// An `Environment` that shifts `arg(i)` for `i < bound.len()` to the bound
/// values and delegates everything else — higher `arg` indices, all
/// `param`s, `index_param`, `query_cell` — to the enclosing environment.
/// This is how `apply`, `reduce`'s fold step, and `map`/`filter`'s
/// per-element call each introduce their own argument scope without
/// losing access to the caller's capabilities.
pub struct ArgShiftEnv<'a> {
    inner: &'a mut dyn Environment,
    bound: Vec<Value>,
}

impl<'a> ArgShiftEnv<'a> {
    pub fn new(inner: &'a mut dyn Environment, bound: Vec<Value>) -> Self {
        Self { inner, bound }
    }
}

impl<'a> Environment for ArgShiftEnv<'a> {
    fn arg(&self, i: u64) -> Option<Value> {
        let i = i as usize;
        if i < self.bound.len() {
            Some(self.bound[i].clone())
        } else {
            self.inner.arg((i - self.bound.len()) as u64)
        }
    }

    fn param(&self, i: u64) -> Option<Value> {
        self.inner.param(i)
    }

    fn index_param(&mut self, i: u64, value: Value) -> EvalResult<()> {
        self.inner.index_param(i, value)
    }

    fn query_cell(&mut self, query: &Value) -> EvalResult<Vec<Value>> {
        self.inner.query_cell(query)
    }
}

/// An `Environment` whose `index_param` always fails — used for live Call
/// evaluation, where parameters are fixed by the caller and cannot be
/// bound by a filter.
pub fn refuse_index_param(_i: u64, _value: Value) -> EvalResult<()> {
    Err(EvalError::IndexParamRefused)
}

/// An `Environment` whose `query_cell` always fails — used while indexing,
/// where cells are provided block-by-block rather than queried live.
pub fn refuse_query_cell(_query: &Value) -> EvalResult<Vec<Value>> {
    Err(EvalError::QueryCellRefused)
}
