//! Loads the expression bundle from disk and verifies every `Call`/`Stream`
//! it contains before the indexer or service ever evaluates them.
//!
//! The bundle is a `bincode`-encoded `Root` (teacher's binary
//! (de)serialization choice throughout `causality-cli`). `AST_HASH` is
//! computed over the raw pre-decode bytes, not the decoded structure, so a
//! content-preserving re-encode still produces the same stored hash only
//! if the bytes are byte-identical — matching spec.md §3's "content hash of
//! the loaded expression bundle" invariant literally.

use animagus_types::Root;
use anyhow::Context;
use std::path::Path;

pub struct LoadedBundle {
    pub bytes: Vec<u8>,
    pub root: Root,
}

/// Read `path`, decode it as a `Root`, and verify every `Call` and
/// `Stream` expression it names. Fails fatally (this is load-time, not a
/// per-request error) on a decode failure or a verifier rejection.
pub fn load(path: &Path) -> anyhow::Result<LoadedBundle> {
    let bytes = std::fs::read(path).with_context(|| format!("reading bundle {}", path.display()))?;
    let root: Root = bincode::deserialize(&bytes)
        .with_context(|| format!("decoding bundle {} as a bincode-encoded Root", path.display()))?;

    for call in &root.calls {
        animagus_verifier::verify(&call.expr)
            .with_context(|| format!("verifying call `{}`", call.name))?;
    }
    for stream in &root.streams {
        animagus_verifier::verify(&stream.expr)
            .with_context(|| format!("verifying stream `{}`", stream.name))?;
    }

    tracing::info!(
        path = %path.display(),
        calls = root.calls.len(),
        streams = root.streams.len(),
        "loaded expression bundle"
    );
    Ok(LoadedBundle { bytes, root })
}

#[cfg(test)]
mod tests {
    use super::*;
    use animagus_types::{value::helpers, NamedExpr, Value};

    #[test]
    fn rejects_bundle_failing_verification() {
        let dir = std::env::temp_dir().join(format!("animagus-bundle-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.bin");

        // A `query_cells` filter referencing `arg(1)` when its implicit
        // arity is 1 (only `arg(0)` is in scope) fails verification.
        let bad_filter = helpers::equal(Value::arg(1), Value::uint64(1));
        let root = Root {
            calls: vec![NamedExpr { name: "bad".into(), expr: Value::query_cells(bad_filter) }],
            streams: vec![],
        };
        std::fs::write(&path, bincode::serialize(&root).unwrap()).unwrap();

        assert!(load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_and_verifies_a_well_formed_bundle() {
        let dir = std::env::temp_dir().join(format!("animagus-bundle-test-ok-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("good.bin");

        let filter = helpers::equal(Value::arg(0), Value::param(0));
        let root = Root {
            calls: vec![NamedExpr { name: "get_cell".into(), expr: Value::query_cells(filter) }],
            streams: vec![],
        };
        let bytes = bincode::serialize(&root).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.bytes, bytes);
        assert_eq!(loaded.root.calls.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
