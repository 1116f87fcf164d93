//! The `Environment` a live Call evaluation runs under.
//!
//! `Environment::query_cell` is synchronous, but resolving a `query_cells`
//! hit into full cells requires RPC round trips. The handler resolves every
//! query a `ValueContext` contains *before* constructing this environment —
//! one batched, deduplicated `resolve_out_points` call per query ordinal —
//! so `query_cell` itself is a pure in-memory lookup, keeping the evaluator
//! itself free of any async dependency.

use animagus_context::ValueContext;
use animagus_evaluator::{refuse_index_param, Environment};
use animagus_evaluator::{EvalError, EvalResult};
use animagus_types::Value;

/// `arg(_)` is always `nil` here: a Call's top-level expression is not
/// invoked with positional arguments the way a filter body is — only
/// `param`s, supplied by the caller, are meaningful at this scope.
pub struct ServiceEnvironment<'a> {
    context: &'a ValueContext,
    params: &'a [Value],
    /// Pre-fetched cells for each query ordinal in `context.queries`, in
    /// the same order.
    resolved: Vec<Vec<Value>>,
}

impl<'a> ServiceEnvironment<'a> {
    pub fn new(context: &'a ValueContext, params: &'a [Value], resolved: Vec<Vec<Value>>) -> Self {
        Self { context, params, resolved }
    }
}

impl<'a> Environment for ServiceEnvironment<'a> {
    fn arg(&self, _i: u64) -> Option<Value> {
        Some(Value::nil())
    }

    fn param(&self, i: u64) -> Option<Value> {
        self.params.get(i as usize).cloned()
    }

    fn index_param(&mut self, i: u64, value: Value) -> EvalResult<()> {
        refuse_index_param(i, value)
    }

    fn query_cell(&mut self, query: &Value) -> EvalResult<Vec<Value>> {
        let ordinal = self
            .context
            .query_index(query)
            .ok_or_else(|| EvalError::MalformedValue {
                ty: query.ty,
                reason: "query does not belong to this call's context".to_string(),
            })?;
        Ok(self.resolved[ordinal].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_types::value::helpers;

    #[test]
    fn param_indexes_into_supplied_slice() {
        let ctx = ValueContext::new("get_cell", &Value::nil());
        let params = vec![Value::uint64(7)];
        let env = ServiceEnvironment::new(&ctx, &params, vec![]);
        assert_eq!(env.param(0), Some(Value::uint64(7)));
        assert_eq!(env.param(1), None);
    }

    #[test]
    fn arg_is_always_nil() {
        let ctx = ValueContext::new("get_cell", &Value::nil());
        let env = ServiceEnvironment::new(&ctx, &[], vec![]);
        assert!(env.arg(0).unwrap().is_nil());
        assert!(env.arg(99).unwrap().is_nil());
    }

    #[test]
    fn index_param_is_refused() {
        let ctx = ValueContext::new("get_cell", &Value::nil());
        let mut env = ServiceEnvironment::new(&ctx, &[], vec![]);
        assert!(matches!(env.index_param(0, Value::nil()), Err(EvalError::IndexParamRefused)));
    }

    #[test]
    fn query_cell_returns_the_pre_resolved_batch_for_its_ordinal() {
        let query = Value::query_cells(helpers::equal(Value::arg(0), Value::param(0)));
        let ctx = ValueContext::new("get_cell", &query);
        let resolved = vec![vec![Value::uint64(1), Value::uint64(2)]];
        let mut env = ServiceEnvironment::new(&ctx, &[], resolved);
        let cells = env.query_cell(&query).unwrap();
        assert_eq!(cells, vec![Value::uint64(1), Value::uint64(2)]);
    }
}
