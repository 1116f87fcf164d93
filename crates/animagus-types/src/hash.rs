//! Blake2b hashing with the chain's fixed personalization.
//!
//! CKB-style chains derive every content hash from a 256-bit Blake2b digest
//! personalized with `ckb-default-hash`, rather than the default IV. This
//! mirrors `blake2b-simd`'s `Params::personal` usage in the Go reference
//! implementation.

const PERSONALIZATION: &[u8] = b"ckb-default-hash";

/// Hash arbitrary canonical bytes, producing the chain's 32-byte digest.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(PERSONALIZATION)
        .to_state()
        .update(data)
        .finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = blake2b_256(b"hello");
        let b = blake2b_256(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn personalization_changes_digest() {
        let personalized = blake2b_256(b"hello");
        let plain = blake2b_simd::Params::new()
            .hash_length(32)
            .to_state()
            .update(b"hello")
            .finalize();
        assert_ne!(personalized.as_slice(), plain.as_bytes());
    }
}
