//! Vector utilities for the retrieval index.
//!
//! - [`cosine_similarity`]: compare two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! Embeddings themselves come from a [`TextGenerator`](crate::generator::TextGenerator).

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use privy::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine of the angle between two embedding vectors, in `[-1.0, 1.0]`.
///
/// Sums run in `f64`, so tiny and very large components keep full range:
/// `cosine_similarity(v, v)` is `1.0` for every nonzero finite `v`. The
/// result is exactly `0.0` when either vector is empty, the lengths differ,
/// either vector has zero magnitude, or a component is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x), f64::from(y)))
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, sq_a, sq_b), (x, y)| {
            (dot + x * y, sq_a + x * x, sq_b + y * y)
        });

    if sq_a == 0.0 || sq_b == 0.0 {
        return 0.0;
    }
    let cos = dot / (sq_a.sqrt() * sq_b.sqrt());
    if !cos.is_finite() {
        return 0.0;
    }
    cos.clamp(-1.0, 1.0) as f32
}
