//! Focus scoring against the reference embedding.

use crate::error::AnalysisResult;
use crate::similarity::cosine_similarity;

/// Score how close an activity embedding is to a reference embedding.
///
/// Returns a value in [0, 1]. Negative cosine similarity means "pointing
/// away from the reference", which for focus purposes is just zero; it is
/// not a meaningful gradation. Absence of either vector also scores 0.0,
/// so ticks captured while the embedder was down count as unfocused
/// rather than poisoning the series. Cosine similarity is already at most
/// 1; the upper clamp only absorbs floating-point overshoot on identical
/// vectors.
pub fn relevance_score(
    current: Option<&[f32]>,
    reference: Option<&[f32]>,
) -> AnalysisResult<f32> {
    let (current, reference) = match (current, reference) {
        (Some(current), Some(reference)) => (current, reference),
        _ => return Ok(0.0),
    };

    let score = cosine_similarity(current, reference)?;
    Ok(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn test_identical_embedding_scores_one() {
        let v = vec![0.1, 0.2, 0.3];
        let score = relevance_score(Some(&v), Some(&v)).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_embedding_clamps_to_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        let score = relevance_score(Some(&a), Some(&b)).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_missing_either_side_scores_zero() {
        let v = vec![1.0, 0.0];
        assert_eq!(relevance_score(None, Some(&v)).unwrap(), 0.0);
        assert_eq!(relevance_score(Some(&v), None).unwrap(), 0.0);
        assert_eq!(relevance_score(None, None).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0];
        let err = relevance_score(Some(&a), Some(&b)).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { left: 3, right: 2 }));
    }

    #[test]
    fn test_partial_overlap_scores_between_zero_and_one() {
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 0.0];
        let score = relevance_score(Some(&a), Some(&b)).unwrap();
        assert!(score > 0.0 && score < 1.0);
    }
}
