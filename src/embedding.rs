//! Deterministic bag-of-hashes embedding (§4.5): no learned model, no
//! external call — a token's SHA-256 digest selects a bucket in a
//! fixed-width vector, which is then L2-normalized.

use sha2::{Digest, Sha256};

/// Embedding dimensionality. Fixed, not configurable: changing it would
/// invalidate every embedding already stored.
pub const DIM: usize = 64;

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Hash `token` to a big integer and reduce it mod `dim` the same way the
/// Python reference does (`int(hexdigest, 16) % dim`), without actually
/// materializing a bignum: walk the hex digest one nibble at a time,
/// folding each into a running remainder mod `dim`.
fn bucket_for_token(token: &str, dim: usize) -> usize {
    let digest = Sha256::digest(token.to_lowercase().as_bytes());
    let mut rem: u64 = 0;
    for byte in digest.iter() {
        // 256 mod dim folded in one byte at a time keeps rem small.
        rem = (rem * 256 + *byte as u64) % dim as u64;
    }
    rem as usize
}

/// L2-normalize a vector in place's worth of semantics; the zero vector
/// stays the zero vector rather than dividing by zero.
pub fn normalize(vector: &[f64]) -> Vec<f64> {
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Compute the unit-norm embedding of `text` with the default dimension.
pub fn compute_embedding(text: &str) -> Vec<f64> {
    compute_embedding_with_dim(text, DIM)
}

fn compute_embedding_with_dim(text: &str, dim: usize) -> Vec<f64> {
    let mut vector = vec![0.0; dim];
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return vector;
    }
    for token in tokens {
        let idx = bucket_for_token(token, dim);
        vector[idx] += 1.0;
    }
    normalize(&vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zero_vector() {
        let v = compute_embedding("");
        assert_eq!(v, vec![0.0; DIM]);
    }

    #[test]
    fn nonempty_text_is_unit_norm() {
        let v = compute_embedding("carbon fiber tooling lead time");
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_text_is_deterministic() {
        let a = compute_embedding("blocker decision needed by friday");
        let b = compute_embedding("blocker decision needed by friday");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_zero_vector_stays_zero() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalize_is_case_insensitive_for_tokens() {
        let a = compute_embedding("BLOCKER");
        let b = compute_embedding("blocker");
        assert_eq!(a, b);
    }
}
