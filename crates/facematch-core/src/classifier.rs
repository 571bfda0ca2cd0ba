//! Tiered match classification.

use crate::types::{MatchDecision, ScoreResult};

/// Combined score at or above which a candidate is a match.
pub const MATCH_THRESHOLD: f32 = 0.85;
/// Combined score at or above which a candidate is a possible match.
pub const POSSIBLE_THRESHOLD: f32 = 0.75;

/// Decision thresholds. Calibrated against the multi-metric scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub matched: f32,
    pub possible: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            matched: MATCH_THRESHOLD,
            possible: POSSIBLE_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Both thresholds finite and `possible <= matched`.
    pub fn is_valid(&self) -> bool {
        self.matched.is_finite() && self.possible.is_finite() && self.possible <= self.matched
    }
}

/// Classify the best candidate found for a query.
///
/// `None` means nothing was scored (empty store).
pub fn classify(best: Option<(&str, ScoreResult)>, thresholds: &Thresholds) -> MatchDecision {
    let Some((identity, score)) = best else {
        return MatchDecision::Unmatched {
            best: None,
            reason: None,
        };
    };

    if score.combined >= thresholds.matched {
        MatchDecision::Matched {
            identity: identity.to_string(),
            score,
        }
    } else if score.combined >= thresholds.possible {
        MatchDecision::Possible {
            identity: identity.to_string(),
            score,
        }
    } else {
        tracing::debug!(
            best = identity,
            combined = score.combined,
            "best candidate below possible threshold"
        );
        MatchDecision::Unmatched {
            best: Some(score),
            reason: None,
        }
    }
}
