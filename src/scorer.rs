//! Exact late-interaction scoring (spec.md §4.4): MaxSim over L2-normalized
//! token vectors, so cosine similarity reduces to a dot product.

use crate::error::ScoringError;
use crate::types::MultiVector;

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// For every query token, take the max dot product against all document
/// tokens, then sum those per-token maxima.
pub fn maxsim(query: &MultiVector, doc: &MultiVector) -> Result<f32, ScoringError> {
    if query.dim != doc.dim {
        return Err(ScoringError::DimMismatch {
            query: query.dim,
            document: doc.dim,
        });
    }
    if query.is_empty() || doc.is_empty() {
        return Ok(f32::NEG_INFINITY);
    }

    let mut total = 0.0f32;
    for q_vec in query.tokens() {
        let mut best = f32::NEG_INFINITY;
        for d_vec in doc.tokens() {
            let sim = dot(q_vec, d_vec);
            if sim > best {
                best = sim;
            }
        }
        total += best;
    }

    if !total.is_finite() {
        return Err(ScoringError::NonFinite);
    }
    Ok(total)
}

/// Scores one query against many candidate documents. Candidates that
/// fail to score (corrupt/mismatched) are skipped rather than aborting
/// the whole batch (spec.md §4.6 "corrupt candidate skip" edge case).
pub fn maxsim_batch(query: &MultiVector, docs: &[(usize, MultiVector)]) -> Vec<(usize, f32)> {
    docs.iter()
        .filter_map(|(idx, doc)| maxsim(query, doc).ok().map(|score| (*idx, score)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    #[test]
    fn identical_sequences_score_seq_len() {
        let tok = unit(vec![1.0, 0.0, 0.0]);
        let mv = MultiVector::new(3, 2, [tok.clone(), tok].concat());
        let score = maxsim(&mv, &mv).unwrap();
        assert!((score - 2.0).abs() < 1e-5);
    }

    #[test]
    fn orthogonal_sequences_score_zero() {
        let q = MultiVector::new(2, 1, unit(vec![1.0, 0.0]));
        let d = MultiVector::new(2, 1, unit(vec![0.0, 1.0]));
        let score = maxsim(&q, &d).unwrap();
        assert!(score.abs() < 1e-5);
    }

    #[test]
    fn empty_sequence_scores_negative_infinity() {
        let q = MultiVector::new(2, 0, vec![]);
        let d = MultiVector::new(2, 1, unit(vec![1.0, 0.0]));
        assert_eq!(maxsim(&q, &d).unwrap(), f32::NEG_INFINITY);
        assert_eq!(maxsim(&d, &q).unwrap(), f32::NEG_INFINITY);
    }

    #[test]
    fn dim_mismatch_is_rejected() {
        let q = MultiVector::new(2, 1, vec![1.0, 0.0]);
        let d = MultiVector::new(3, 1, vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            maxsim(&q, &d),
            Err(ScoringError::DimMismatch { query: 2, document: 3 })
        ));
    }

    #[test]
    fn batch_skips_mismatched_candidates() {
        let q = MultiVector::new(2, 1, unit(vec![1.0, 0.0]));
        let good = MultiVector::new(2, 1, unit(vec![1.0, 0.0]));
        let bad = MultiVector::new(3, 1, vec![1.0, 0.0, 0.0]);
        let results = maxsim_batch(&q, &[(0, good), (1, bad)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 0);
    }
}
