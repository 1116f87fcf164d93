//! The side-effect-free tree-walking interpreter for the expression
//! language. Evaluation never mutates chain state; the only
//! "effect" it can have is recording a parameter binding through
//! `Environment::index_param`, which the indexer uses to reverse-derive an
//! index key from a filter expression.

pub mod bigint;
pub mod environment;
pub mod error;

pub use environment::{refuse_index_param, refuse_query_cell, ArgShiftEnv, Environment};
pub use error::{EvalError, EvalResult};

use animagus_types::value::Primitive;
use animagus_types::{codec, hash, json, Value, ValueType};
use std::cmp::Ordering;

/// What a function invocation just produced: either its final value, or a
/// request (from a `tail_recursion` node in tail position) to re-enter the
/// same function with new arguments. Keeping this distinct from `Value`
/// lets `invoke` trampoline instead of recursing, so a chain of
/// `tail_recursion` calls runs in constant stack space.
enum TailOutcome {
    Done(Value),
    Recurse(Vec<Value>),
}

/// Evaluate `expr` to a final value. This is the entry point for
/// subexpressions that are not themselves a function body in tail
/// position — use [`invoke`] to call a function value with arguments.
pub fn eval(expr: &Value, env: &mut dyn Environment) -> EvalResult<Value> {
    match eval_tail(expr, env)? {
        TailOutcome::Done(v) => Ok(v),
        TailOutcome::Recurse(_) => Err(EvalError::Unsupported(ValueType::TailRecursion)),
    }
}

/// Call a function-shaped value `f` with `args` bound as `arg(0)..arg(n)`,
/// trampolining through any chain of tail calls `f` makes via
/// `tail_recursion`.
pub fn invoke(f: &Value, args: Vec<Value>, env: &mut dyn Environment) -> EvalResult<Value> {
    let mut current_args = args;
    loop {
        let mut shifted = ArgShiftEnv::new(env, current_args);
        match eval_tail(f, &mut shifted)? {
            TailOutcome::Done(v) => return Ok(v),
            TailOutcome::Recurse(new_args) => {
                current_args = new_args;
            }
        }
    }
}

/// Evaluate `expr`, recognizing `tail_recursion` and `cond` in tail
/// position so a trampolining `invoke` can catch the recursion request
/// without growing the stack.
fn eval_tail(expr: &Value, env: &mut dyn Environment) -> EvalResult<TailOutcome> {
    match expr.ty {
        ValueType::TailRecursion => {
            let args = expr
                .children
                .iter()
                .map(|c| eval(c, env))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(TailOutcome::Recurse(args))
        }
        ValueType::Cond => {
            let (p, t, e) = (&expr.children[0], &expr.children[1], &expr.children[2]);
            let cond = eval(p, env)?;
            let taken = if require_bool(&cond)? { t } else { e };
            eval_tail(taken, env)
        }
        _ => Ok(TailOutcome::Done(eval_node(expr, env)?)),
    }
}

/// Evaluate every non-tail-position node: primitives, bindings, operators,
/// and the chain data constructors.
fn eval_node(expr: &Value, env: &mut dyn Environment) -> EvalResult<Value> {
    match expr.ty {
        ValueType::Nil | ValueType::Uint64 | ValueType::Bool | ValueType::Bytes => {
            Ok(expr.clone())
        }

        ValueType::Arg => {
            let i = require_index(expr)?;
            env.arg(i).ok_or(EvalError::UnboundArg(i))
        }
        ValueType::Param => {
            let i = require_index(expr)?;
            env.param(i).ok_or(EvalError::UnboundParam(i))
        }

        ValueType::OutPoint => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::OutPoint, children, &[2])
        }
        ValueType::CellInput => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::CellInput, children, &[2])
        }
        ValueType::CellDep => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::CellDep, children, &[2])
        }
        ValueType::Script => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::Script, children, &[3])
        }
        ValueType::Cell => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::Cell, children, &[4, 6])
        }
        ValueType::Transaction => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::Transaction, children, &[3])
        }
        ValueType::Header => {
            let children = eval_children(expr, env)?;
            build_checked(ValueType::Header, children, &[10])
        }

        ValueType::List => {
            let children = eval_children(expr, env)?;
            Ok(Value::list(children))
        }
        ValueType::QueryCells => env.query_cell(expr).map(Value::list),

        ValueType::Map => {
            let f = &expr.children[0];
            let list = eval(&expr.children[1], env)?;
            require_list(&list)?
                .iter()
                .map(|item| invoke(f, vec![item.clone()], env))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::list)
        }
        ValueType::Filter => {
            let f = &expr.children[0];
            let list = eval(&expr.children[1], env)?;
            let mut out = Vec::new();
            for item in require_list(&list)? {
                if require_bool(&invoke(f, vec![item.clone()], env)?)? {
                    out.push(item.clone());
                }
            }
            Ok(Value::list(out))
        }
        ValueType::Reduce => {
            let f = &expr.children[0];
            let mut acc = eval(&expr.children[1], env)?;
            let list = eval(&expr.children[2], env)?;
            for item in require_list(&list)? {
                acc = invoke(f, vec![acc.clone(), item.clone()], env)?;
            }
            Ok(acc)
        }
        ValueType::Apply => {
            let f = &expr.children[0];
            let args = expr.children[1..]
                .iter()
                .map(|c| eval(c, env))
                .collect::<EvalResult<Vec<_>>>()?;
            invoke(f, args, env)
        }

        ValueType::GetCapacity => project_cell(expr, env, 0),
        ValueType::GetLock => project_cell(expr, env, 1),
        ValueType::GetType => project_cell(expr, env, 2),
        ValueType::GetData => project_cell(expr, env, 3),
        ValueType::GetOutPoint => project_cell(expr, env, 4),
        ValueType::GetHeader => project_cell(expr, env, 5),
        ValueType::GetDataHash => {
            let target = eval(&expr.children[0], env)?;
            if target.is_nil() {
                return Ok(Value::nil());
            }
            let data = target
                .as_bytes()
                .ok_or(EvalError::TypeMismatch { expected: "bytes (cell data)", found: target.ty })?;
            Ok(Value::bytes(hash::blake2b_256(data).to_vec()))
        }

        ValueType::GetCodeHash => project_script(expr, env, 0),
        ValueType::GetHashType => project_script(expr, env, 1),
        ValueType::GetArgs => project_script(expr, env, 2),

        ValueType::GetCompactTarget => project_header(expr, env, 0),
        ValueType::GetTimestamp => project_header(expr, env, 1),
        ValueType::GetNumber => project_header(expr, env, 2),
        ValueType::GetEpoch => project_header(expr, env, 3),
        ValueType::GetParentHash => project_header(expr, env, 4),
        ValueType::GetTransactionsRoot => project_header(expr, env, 5),
        ValueType::GetProposalsHash => project_header(expr, env, 6),
        ValueType::GetUnclesHash => project_header(expr, env, 7),
        ValueType::GetDao => project_header(expr, env, 8),
        ValueType::GetNonce => project_header(expr, env, 9),

        ValueType::Hash => {
            let target = eval(&expr.children[0], env)?;
            if target.is_nil() {
                return Ok(Value::nil());
            }
            if target.ty != ValueType::Script {
                return Err(EvalError::TypeMismatch { expected: "script", found: target.ty });
            }
            let bytes = codec::serialize_script(&target)?;
            Ok(Value::bytes(hash::blake2b_256(&bytes).to_vec()))
        }
        ValueType::SerializeToCore => {
            let target = eval(&expr.children[0], env)?;
            Ok(Value::bytes(codec::serialize_to_core(&target)?))
        }
        ValueType::SerializeToJson => {
            let target = eval(&expr.children[0], env)?;
            let rendered = json::serialize_to_json(&target)?;
            Ok(Value::bytes(rendered.to_string().into_bytes()))
        }

        ValueType::Not => {
            let v = eval(&expr.children[0], env)?;
            Ok(Value::bool(!require_bool(&v)?))
        }
        ValueType::And => {
            let mut result = true;
            for child in &expr.children {
                let v = eval(child, env)?;
                if !require_bool(&v)? {
                    result = false;
                }
            }
            Ok(Value::bool(result))
        }
        ValueType::Or => {
            let mut result = false;
            for child in &expr.children {
                let v = eval(child, env)?;
                if require_bool(&v)? {
                    result = true;
                }
            }
            Ok(Value::bool(result))
        }
        ValueType::Equal => eval_equal(expr, env),
        ValueType::Less => {
            let a = eval(&expr.children[0], env)?;
            let b = eval(&expr.children[1], env)?;
            Ok(Value::bool(numeric_compare(&a, &b)? == Ordering::Less))
        }

        ValueType::Len => {
            let v = eval(&expr.children[0], env)?;
            let bytes = v.as_bytes().ok_or(EvalError::TypeMismatch { expected: "bytes", found: v.ty })?;
            Ok(Value::uint64(bytes.len() as u64))
        }
        ValueType::Slice => eval_slice(expr, env),
        ValueType::Index => {
            let i = eval(&expr.children[0], env)?;
            let i = i.as_uint64().ok_or(EvalError::TypeMismatch { expected: "uint64", found: i.ty })?;
            let list = eval(&expr.children[1], env)?;
            let items = require_list(&list)?;
            items
                .get(i as usize)
                .cloned()
                .ok_or(EvalError::IndexOutOfRange { index: i, len: items.len() })
        }

        ValueType::Add => eval_arith(expr, env, |a, b| bigint::add(a, b), u64::checked_add),
        ValueType::Subtract => eval_arith_checked(expr, env, bigint::subtract, u64::checked_sub),
        ValueType::Multiply => eval_arith(expr, env, |a, b| bigint::multiply(a, b), u64::checked_mul),
        ValueType::Divide => eval_divmod(expr, env, true),
        ValueType::Mod => eval_divmod(expr, env, false),

        ValueType::Cond | ValueType::TailRecursion => unreachable!("handled in eval_tail"),
    }
}

fn eval_children(expr: &Value, env: &mut dyn Environment) -> EvalResult<Vec<Value>> {
    expr.children.iter().map(|c| eval(c, env)).collect()
}

/// Construct a chain-data value from already-evaluated children, checking
/// its arity matches one of `allowed` (mirroring the verifier's checks,
/// since constructors can be reached with runtime-computed children that
/// were never statically verified).
fn build_checked(ty: ValueType, children: Vec<Value>, allowed: &[usize]) -> EvalResult<Value> {
    if !allowed.contains(&children.len()) {
        return Err(EvalError::MalformedValue {
            ty,
            reason: format!("expected {:?} children, found {}", allowed, children.len()),
        });
    }
    Ok(Value::op(ty, children))
}

fn project_cell(expr: &Value, env: &mut dyn Environment, field: usize) -> EvalResult<Value> {
    let target = eval(&expr.children[0], env)?;
    if target.is_nil() {
        return Ok(Value::nil());
    }
    if target.ty != ValueType::Cell {
        return Err(EvalError::TypeMismatch { expected: "cell", found: target.ty });
    }
    target
        .children
        .get(field)
        .cloned()
        .ok_or(EvalError::MalformedValue { ty: ValueType::Cell, reason: "missing optional field".into() })
}

fn project_script(expr: &Value, env: &mut dyn Environment, field: usize) -> EvalResult<Value> {
    let target = eval(&expr.children[0], env)?;
    if target.is_nil() {
        return Ok(Value::nil());
    }
    if target.ty != ValueType::Script {
        return Err(EvalError::TypeMismatch { expected: "script", found: target.ty });
    }
    Ok(target.children[field].clone())
}

fn project_header(expr: &Value, env: &mut dyn Environment, field: usize) -> EvalResult<Value> {
    let target = eval(&expr.children[0], env)?;
    if target.is_nil() {
        return Ok(Value::nil());
    }
    if target.ty != ValueType::Header {
        return Err(EvalError::TypeMismatch { expected: "header", found: target.ty });
    }
    Ok(target.children[field].clone())
}

/// `equal(param(i), x)` (or its mirror `equal(x, param(i))`) binds the
/// parameter to whatever `x` evaluates to and always yields `true`; every
/// other shape falls back to deep structural equality. This is the single
/// side effect a pure evaluator performs, and it is what lets an indexing
/// filter be read backwards into an index key.
fn eval_equal(expr: &Value, env: &mut dyn Environment) -> EvalResult<Value> {
    let (lhs, rhs) = (&expr.children[0], &expr.children[1]);
    if lhs.ty == ValueType::Param {
        let other = eval(rhs, env)?;
        if !other.is_nil() {
            let i = require_index(lhs)?;
            env.index_param(i, other)?;
            return Ok(Value::bool(true));
        }
    }
    if rhs.ty == ValueType::Param {
        let other = eval(lhs, env)?;
        if !other.is_nil() {
            let i = require_index(rhs)?;
            env.index_param(i, other)?;
            return Ok(Value::bool(true));
        }
    }
    let a = eval(lhs, env)?;
    let b = eval(rhs, env)?;
    Ok(Value::bool(a.structurally_equal(&b)))
}

fn eval_slice(expr: &Value, env: &mut dyn Environment) -> EvalResult<Value> {
    let start = eval(&expr.children[0], env)?;
    let end = eval(&expr.children[1], env)?;
    let src = eval(&expr.children[2], env)?;
    let start = start.as_uint64().ok_or(EvalError::TypeMismatch { expected: "uint64", found: start.ty })?;
    let end = end.as_uint64().ok_or(EvalError::TypeMismatch { expected: "uint64", found: end.ty })?;
    let bytes = src.as_bytes().ok_or(EvalError::TypeMismatch { expected: "bytes", found: src.ty })?;
    let len = bytes.len() as u64;
    if start > len {
        return Err(EvalError::SliceStartOutOfRange { start, len: bytes.len() });
    }
    let width = end.saturating_sub(start) as usize;
    let take_end = end.min(len) as usize;
    let mut out = bytes[start as usize..take_end].to_vec();
    out.resize(width, 0);
    Ok(Value::bytes(out))
}

fn eval_arith(
    expr: &Value,
    env: &mut dyn Environment,
    promoted: impl Fn(&[u8], &[u8]) -> Vec<u8>,
    native: impl Fn(u64, u64) -> Option<u64>,
) -> EvalResult<Value> {
    let a = eval(&expr.children[0], env)?;
    let b = eval(&expr.children[1], env)?;
    arith_dispatch(&a, &b, &promoted, &native)
}

fn eval_arith_checked(
    expr: &Value,
    env: &mut dyn Environment,
    promoted: impl Fn(&[u8], &[u8]) -> Option<Vec<u8>>,
    native: impl Fn(u64, u64) -> Option<u64>,
) -> EvalResult<Value> {
    let a = eval(&expr.children[0], env)?;
    let b = eval(&expr.children[1], env)?;
    if a.ty == ValueType::Uint64 && b.ty == ValueType::Uint64 {
        let (x, y) = (a.as_uint64().unwrap(), b.as_uint64().unwrap());
        return native(x, y).map(Value::uint64).ok_or(EvalError::DivisionByZero);
    }
    let x = numeric_bytes(&a)?;
    let y = numeric_bytes(&b)?;
    promoted(&x, &y).map(Value::bytes).ok_or(EvalError::DivisionByZero)
}

fn arith_dispatch(
    a: &Value,
    b: &Value,
    promoted: &impl Fn(&[u8], &[u8]) -> Vec<u8>,
    native: &impl Fn(u64, u64) -> Option<u64>,
) -> EvalResult<Value> {
    if a.ty == ValueType::Uint64 && b.ty == ValueType::Uint64 {
        let (x, y) = (a.as_uint64().unwrap(), b.as_uint64().unwrap());
        return native(x, y).map(Value::uint64).ok_or(EvalError::DivisionByZero);
    }
    let x = numeric_bytes(a)?;
    let y = numeric_bytes(b)?;
    Ok(Value::bytes(promoted(&x, &y)))
}

fn eval_divmod(expr: &Value, env: &mut dyn Environment, want_quotient: bool) -> EvalResult<Value> {
    let a = eval(&expr.children[0], env)?;
    let b = eval(&expr.children[1], env)?;
    if a.ty == ValueType::Uint64 && b.ty == ValueType::Uint64 {
        let (x, y) = (a.as_uint64().unwrap(), b.as_uint64().unwrap());
        if y == 0 {
            return Err(EvalError::DivisionByZero);
        }
        return Ok(Value::uint64(if want_quotient { x / y } else { x % y }));
    }
    let x = numeric_bytes(&a)?;
    let y = numeric_bytes(&b)?;
    if y.iter().all(|b| *b == 0) {
        return Err(EvalError::DivisionByZero);
    }
    let (q, r) = bigint::divmod(&x, &y);
    Ok(Value::bytes(if want_quotient { q } else { r }))
}

fn numeric_bytes(v: &Value) -> EvalResult<Vec<u8>> {
    match v.ty {
        ValueType::Uint64 => Ok(bigint::from_uint64(v.as_uint64().unwrap())),
        ValueType::Bytes => Ok(v.as_bytes().unwrap().to_vec()),
        other => Err(EvalError::TypeMismatch { expected: "uint64 or bytes", found: other }),
    }
}

fn numeric_compare(a: &Value, b: &Value) -> EvalResult<Ordering> {
    if a.ty == ValueType::Uint64 && b.ty == ValueType::Uint64 {
        return Ok(a.as_uint64().unwrap().cmp(&b.as_uint64().unwrap()));
    }
    let x = numeric_bytes(a)?;
    let y = numeric_bytes(b)?;
    Ok(bigint::compare(&x, &y))
}

fn require_bool(v: &Value) -> EvalResult<bool> {
    v.as_bool().ok_or(EvalError::TypeMismatch { expected: "bool", found: v.ty })
}

fn require_index(v: &Value) -> EvalResult<u64> {
    v.as_uint64().ok_or(EvalError::TypeMismatch { expected: "uint64 index", found: v.ty })
}

fn require_list(v: &Value) -> EvalResult<&[Value]> {
    if matches!(v.primitive, Primitive::None) && v.ty == ValueType::List {
        Ok(&v.children)
    } else {
        Err(EvalError::TypeMismatch { expected: "list", found: v.ty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_types::value::helpers;

    struct TestEnv {
        args: Vec<Value>,
        params: Vec<Value>,
        bound: Vec<Option<Value>>,
    }

    impl TestEnv {
        fn new(params: Vec<Value>) -> Self {
            Self { args: vec![], params: params.clone(), bound: vec![None; params.len()] }
        }
    }

    impl Environment for TestEnv {
        fn arg(&self, i: u64) -> Option<Value> {
            self.args.get(i as usize).cloned()
        }
        fn param(&self, i: u64) -> Option<Value> {
            self.params.get(i as usize).cloned()
        }
        fn index_param(&mut self, i: u64, value: Value) -> EvalResult<()> {
            match self.bound.get_mut(i as usize) {
                Some(slot @ None) => {
                    *slot = Some(value);
                    Ok(())
                }
                Some(Some(existing)) if *existing == value => Ok(()),
                Some(Some(_)) => Err(EvalError::ParamAlreadyBound { index: i }),
                None => Err(EvalError::UnboundParam(i)),
            }
        }
        fn query_cell(&mut self, _query: &Value) -> EvalResult<Vec<Value>> {
            Err(EvalError::QueryCellRefused)
        }
    }

    #[test]
    fn equal_binds_param_and_returns_true() {
        let mut env = TestEnv::new(vec![Value::nil()]);
        let expr = helpers::equal(Value::param(0), Value::uint64(7));
        let result = eval(&expr, &mut env).unwrap();
        assert_eq!(result, Value::bool(true));
        assert_eq!(env.bound[0], Some(Value::uint64(7)));
    }

    #[test]
    fn plain_equal_uses_structural_equality() {
        let mut env = TestEnv::new(vec![]);
        let expr = helpers::equal(Value::uint64(1), Value::uint64(1));
        assert_eq!(eval(&expr, &mut env).unwrap(), Value::bool(true));
        let expr = helpers::equal(Value::uint64(1), Value::uint64(2));
        assert_eq!(eval(&expr, &mut env).unwrap(), Value::bool(false));
    }

    #[test]
    fn add_promotes_mixed_operands_to_bytes() {
        let mut env = TestEnv::new(vec![]);
        let expr = Value::op(ValueType::Add, vec![Value::uint64(1), Value::bytes(vec![255, 0])]);
        let result = eval(&expr, &mut env).unwrap();
        assert_eq!(result.ty, ValueType::Bytes);
        assert_eq!(result.as_bytes().unwrap(), &[0, 1]);
    }

    #[test]
    fn add_uint64_stays_native() {
        let mut env = TestEnv::new(vec![]);
        let expr = Value::op(ValueType::Add, vec![Value::uint64(2), Value::uint64(3)]);
        assert_eq!(eval(&expr, &mut env).unwrap(), Value::uint64(5));
    }

    #[test]
    fn divide_by_zero_fails() {
        let mut env = TestEnv::new(vec![]);
        let expr = Value::op(ValueType::Divide, vec![Value::uint64(1), Value::uint64(0)]);
        assert!(matches!(eval(&expr, &mut env), Err(EvalError::DivisionByZero)));
    }

    #[test]
    fn slice_pads_with_trailing_zeros() {
        let mut env = TestEnv::new(vec![]);
        let expr = Value::op(ValueType::Slice, vec![Value::uint64(0), Value::uint64(4), Value::bytes(vec![1, 2])]);
        let result = eval(&expr, &mut env).unwrap();
        assert_eq!(result.as_bytes().unwrap(), &[1, 2, 0, 0]);
    }

    #[test]
    fn tail_recursion_loops_without_recursing() {
        // f(n) = cond(equal(arg(0), 0), 0, tail_recursion(subtract(arg(0), 1)))
        let f = Value::op(
            ValueType::Cond,
            vec![
                helpers::equal(Value::arg(0), Value::uint64(0)),
                Value::uint64(0),
                Value::op(ValueType::TailRecursion, vec![Value::op(ValueType::Subtract, vec![Value::arg(0), Value::uint64(1)])]),
            ],
        );
        let mut env = TestEnv::new(vec![]);
        let result = invoke(&f, vec![Value::uint64(100_000)], &mut env).unwrap();
        assert_eq!(result, Value::uint64(0));
    }

    #[test]
    fn map_applies_function_preserving_order() {
        let mut env = TestEnv::new(vec![]);
        let f = Value::op(ValueType::Add, vec![Value::arg(0), Value::uint64(1)]);
        let list = Value::list(vec![Value::uint64(1), Value::uint64(2), Value::uint64(3)]);
        let expr = helpers::map(f, list);
        let result = eval(&expr, &mut env).unwrap();
        assert_eq!(
            result,
            Value::list(vec![Value::uint64(2), Value::uint64(3), Value::uint64(4)])
        );
    }

    #[test]
    fn get_on_nil_propagates_nil() {
        let mut env = TestEnv::new(vec![]);
        let expr = Value::op(ValueType::GetCapacity, vec![Value::nil()]);
        assert_eq!(eval(&expr, &mut env).unwrap(), Value::nil());
    }
}
