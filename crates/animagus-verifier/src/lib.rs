//! Static well-formedness checks for a loaded bundle.
//!
//! Verification runs once, at bundle-load time, on every `Call` and `Stream`
//! expression before it is ever evaluated: it only checks the *shape* of the
//! tree (arities, primitive presence, which argument positions are actually
//! function bodies and how many `arg` slots they may reference) — it does
//! not attempt full type inference, matching `pkg/verifier/verifier.go`'s
//! scope.

pub mod error;

pub use error::{VerifyError, VerifyResult};

use animagus_types::{Primitive, Value, ValueType};

/// Recursively verify `expr` and all of its descendants.
pub fn verify(expr: &Value) -> VerifyResult<()> {
    for (index, child) in expr.children.iter().enumerate() {
        verify(child).map_err(|source| VerifyError::Nested {
            ty: expr.ty,
            index,
            source: Box::new(source),
        })?;
    }

    match expr.ty {
        ValueType::Nil => {}

        ValueType::Uint64 => {
            require_primitive(expr, |p| matches!(p, Primitive::Uint64(_)))?;
            require_no_children(expr)?;
        }
        ValueType::Bool => {
            require_primitive(expr, |p| matches!(p, Primitive::Bool(_)))?;
            require_no_children(expr)?;
        }
        ValueType::Bytes => {
            require_primitive(expr, |p| matches!(p, Primitive::Bytes(_)))?;
            require_no_children(expr)?;
        }
        ValueType::Arg | ValueType::Param => {
            require_primitive(expr, |p| matches!(p, Primitive::Uint64(_)))?;
            require_no_children(expr)?;
        }

        ValueType::OutPoint | ValueType::CellInput | ValueType::CellDep => {
            require_arity(expr, 2)?;
        }
        ValueType::Script => {
            require_arity(expr, 3)?;
        }
        ValueType::Cell => {
            // The original verifier's arity check (`!= 4 || != 6`) is a
            // tautology that rejects every cell; a cell is well-formed with
            // either the bare 4 core fields or those plus [out_point, header].
            if expr.children.len() != 4 && expr.children.len() != 6 {
                return Err(VerifyError::Arity {
                    ty: expr.ty,
                    expected: "4 or 6".into(),
                    found: expr.children.len(),
                });
            }
        }
        ValueType::Transaction => {
            require_arity(expr, 3)?;
        }
        ValueType::Header => {
            require_arity(expr, 10)?;
        }

        ValueType::List => {}

        ValueType::QueryCells => {
            require_arity(expr, 1)?;
            verify_func_args(&expr.children[0], 1)?;
        }
        ValueType::Map => {
            require_arity(expr, 2)?;
            verify_func_args(&expr.children[0], 1)?;
            require_list_producing(&expr.children[1])?;
        }
        ValueType::Filter => {
            require_arity(expr, 2)?;
            verify_func_args(&expr.children[0], 1)?;
            require_list_producing(&expr.children[1])?;
        }
        ValueType::Reduce => {
            require_arity(expr, 3)?;
            verify_func_args(&expr.children[0], 2)?;
        }
        ValueType::Apply => {
            if expr.children.is_empty() {
                return Err(VerifyError::Arity {
                    ty: expr.ty,
                    expected: "at least 1".into(),
                    found: 0,
                });
            }
            verify_func_args(&expr.children[0], expr.children.len() - 1)?;
        }

        ValueType::GetCapacity
        | ValueType::GetLock
        | ValueType::GetType
        | ValueType::GetData
        | ValueType::GetDataHash
        | ValueType::GetCodeHash
        | ValueType::GetHashType
        | ValueType::GetArgs
        | ValueType::GetCompactTarget
        | ValueType::GetTimestamp
        | ValueType::GetNumber
        | ValueType::GetEpoch
        | ValueType::GetParentHash
        | ValueType::GetTransactionsRoot
        | ValueType::GetProposalsHash
        | ValueType::GetUnclesHash
        | ValueType::GetDao
        | ValueType::GetNonce => {
            require_arity(expr, 1)?;
        }

        ValueType::GetOutPoint => {
            require_arity(expr, 1)?;
            if expr.children[0].children.len() < 5 {
                return Err(VerifyError::CellMissingOutPoint);
            }
        }
        ValueType::GetHeader => {
            require_arity(expr, 1)?;
            if expr.children[0].children.len() < 6 {
                return Err(VerifyError::CellMissingHeader);
            }
        }

        ValueType::Hash => {
            require_arity(expr, 1)?;
        }
        ValueType::SerializeToCore | ValueType::SerializeToJson => {
            require_arity(expr, 1)?;
            let target = expr.children[0].ty;
            if !matches!(target, ValueType::Script | ValueType::Header | ValueType::Transaction) {
                return Err(VerifyError::UnsupportedSerializeTarget { op: expr.ty, target });
            }
        }

        ValueType::Not => {
            require_arity(expr, 1)?;
        }
        ValueType::And | ValueType::Or => {
            if expr.children.is_empty() {
                return Err(VerifyError::Arity {
                    ty: expr.ty,
                    expected: "at least 1".into(),
                    found: 0,
                });
            }
        }
        ValueType::Equal => {
            require_arity(expr, 2)?;
        }
        ValueType::Len => {
            require_arity(expr, 1)?;
        }
        ValueType::Slice => {
            require_arity(expr, 3)?;
        }
        ValueType::Index => {
            require_arity(expr, 2)?;
        }
        ValueType::Less
        | ValueType::Add
        | ValueType::Subtract
        | ValueType::Multiply
        | ValueType::Divide
        | ValueType::Mod => {
            require_arity(expr, 2)?;
        }
        ValueType::Cond => {
            require_arity(expr, 3)?;
        }
        ValueType::TailRecursion => {
            if expr.children.is_empty() {
                return Err(VerifyError::EmptyTailRecursion);
            }
        }
    }
    Ok(())
}

fn require_primitive(expr: &Value, matches_ty: impl Fn(&Primitive) -> bool) -> VerifyResult<()> {
    if !matches_ty(&expr.primitive) {
        return Err(VerifyError::MissingPrimitive { ty: expr.ty });
    }
    Ok(())
}

fn require_no_children(expr: &Value) -> VerifyResult<()> {
    if !expr.children.is_empty() {
        return Err(VerifyError::UnexpectedChildren { ty: expr.ty });
    }
    Ok(())
}

fn require_arity(expr: &Value, n: usize) -> VerifyResult<()> {
    if expr.children.len() != n {
        return Err(VerifyError::Arity { ty: expr.ty, expected: n.to_string(), found: expr.children.len() });
    }
    Ok(())
}

fn is_list_producing(ty: ValueType) -> bool {
    matches!(ty, ValueType::List | ValueType::Map | ValueType::Filter | ValueType::QueryCells)
}

fn require_list_producing(expr: &Value) -> VerifyResult<()> {
    if !is_list_producing(expr.ty) {
        return Err(VerifyError::NotAList { found: expr.ty });
    }
    Ok(())
}

/// Walk a function body (an `apply`/`reduce`/`map`/`filter`/`query_cells`
/// argument) and check every `arg(i)` reference is within `[0, arity)`.
fn verify_func_args(body: &Value, arity: usize) -> VerifyResult<()> {
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node.ty == ValueType::Arg {
            let index = node.as_uint64().ok_or(VerifyError::MissingPrimitive { ty: ValueType::Arg })?;
            if index as usize >= arity {
                return Err(VerifyError::ArgOutOfRange { index, arity });
            }
        } else {
            stack.extend(node.children.iter());
        }
    }
    Ok(())
}
