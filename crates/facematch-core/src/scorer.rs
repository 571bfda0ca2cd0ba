//! Multi-metric similarity scoring.
//!
//! Combines Euclidean distance, cosine similarity and Manhattan distance
//! into a single score used for ranking and for the classifier thresholds.

use crate::types::{Fingerprint, ScoreResult};
use thiserror::Error;

// Weights and calibration divisors. The classifier thresholds are tuned
// against these exact values; change them together.
const EUCLIDEAN_WEIGHT: f64 = 0.4;
const COSINE_WEIGHT: f64 = 0.4;
const MANHATTAN_WEIGHT: f64 = 0.2;
const EUCLIDEAN_SCALE: f64 = 2.0;
const MANHATTAN_SCALE: f64 = 256.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("fingerprint dimension mismatch: query has {query}, candidate has {candidate}")]
    DimensionMismatch { query: usize, candidate: usize },
}

/// Strategy for scoring a query fingerprint against one candidate.
pub trait Scorer {
    fn score(&self, query: &Fingerprint, candidate: &Fingerprint)
        -> Result<ScoreResult, ScoreError>;
}

/// Weighted Euclidean + cosine + Manhattan scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiMetricScorer;

impl Scorer for MultiMetricScorer {
    fn score(
        &self,
        query: &Fingerprint,
        candidate: &Fingerprint,
    ) -> Result<ScoreResult, ScoreError> {
        if query.len() != candidate.len() {
            return Err(ScoreError::DimensionMismatch {
                query: query.len(),
                candidate: candidate.len(),
            });
        }

        let mut sq_diff = 0.0f64;
        let mut abs_diff = 0.0f64;
        let mut dot = 0.0f64;
        let mut norm_q = 0.0f64;
        let mut norm_c = 0.0f64;

        for (&q, &c) in query.values().iter().zip(candidate.values()) {
            let (q, c) = (f64::from(q), f64::from(c));
            let d = q - c;
            sq_diff += d * d;
            abs_diff += d.abs();
            dot += q * c;
            norm_q += q * q;
            norm_c += c * c;
        }

        let euclidean = sq_diff.sqrt();
        let denom = norm_q.sqrt() * norm_c.sqrt();
        let cosine = if denom > 0.0 { dot / denom } else { 0.0 };
        let manhattan = abs_diff;

        Ok(ScoreResult {
            euclidean: euclidean as f32,
            cosine: cosine as f32,
            manhattan: manhattan as f32,
            combined: combine(euclidean, cosine, manhattan) as f32,
        })
    }
}

/// `0.4 * max(0, 1 - e/2) + 0.4 * cos + 0.2 * max(0, 1 - m/256)`.
///
/// Only the distance terms are floored; the sum is not clamped.
fn combine(euclidean: f64, cosine: f64, manhattan: f64) -> f64 {
    let euclidean_term = (1.0 - euclidean / EUCLIDEAN_SCALE).max(0.0);
    let manhattan_term = (1.0 - manhattan / MANHATTAN_SCALE).max(0.0);
    EUCLIDEAN_WEIGHT * euclidean_term + COSINE_WEIGHT * cosine + MANHATTAN_WEIGHT * manhattan_term
}
