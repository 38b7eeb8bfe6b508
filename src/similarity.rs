//! Cosine similarity over embedding vectors.

use crate::error::{AnalysisError, AnalysisResult};

/// Compute cosine similarity between two vectors.
///
/// Accumulates in f64 so long low-magnitude embeddings do not lose
/// precision. A zero-magnitude vector yields 0.0 rather than NaN;
/// mismatched dimensions are an error because they mean the two
/// embeddings came from different models and the comparison is
/// meaningless.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AnalysisResult<f32> {
    if a.len() != b.len() {
        return Err(AnalysisError::ShapeMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / denom) as f32)
}
