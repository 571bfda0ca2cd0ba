use serde::{Deserialize, Serialize};

/// Number of components in every fingerprint produced by the extractor.
pub const FINGERPRINT_DIM: usize = 128;

/// Name a reported match carries in the `algorithm` field.
pub const ALGORITHM_NAME: &str = "multi-metric";

/// Content-derived fingerprint vector (128-dimensional when produced by the extractor).
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    values: Vec<f32>,
}

impl Fingerprint {
    /// Wrap raw components. Length is not checked here; the store and
    /// scorer enforce dimensions where it matters.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean (L2) norm of the vector.
    pub fn norm(&self) -> f32 {
        self.values
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt() as f32
    }
}

/// Metrics for one query/candidate comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    pub euclidean: f32,
    /// Cosine similarity in [-1, 1].
    pub cosine: f32,
    pub manhattan: f32,
    /// Weighted blend of the three metrics, used for ranking and thresholds.
    pub combined: f32,
}

/// Outcome of matching one query against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// Best candidate cleared the match threshold.
    Matched {
        identity: String,
        score: ScoreResult,
    },
    /// Best candidate landed between the two thresholds; needs manual verification.
    Possible {
        identity: String,
        score: ScoreResult,
    },
    /// Nothing cleared the lower threshold, the store was empty, or the
    /// query produced no fingerprint (`reason` set).
    Unmatched {
        best: Option<ScoreResult>,
        reason: Option<String>,
    },
}

impl MatchDecision {
    /// Unmatched decision with no candidate and an explanatory note.
    pub fn no_fingerprint(reason: impl Into<String>) -> Self {
        MatchDecision::Unmatched {
            best: None,
            reason: Some(reason.into()),
        }
    }

    /// Identity of the positive (matched or possible) candidate.
    pub fn identity(&self) -> Option<&str> {
        match self {
            MatchDecision::Matched { identity, .. } | MatchDecision::Possible { identity, .. } => {
                Some(identity)
            }
            MatchDecision::Unmatched { .. } => None,
        }
    }

    /// Combined score of the best candidate, if any candidate was scored.
    pub fn combined_score(&self) -> Option<f32> {
        match self {
            MatchDecision::Matched { score, .. } | MatchDecision::Possible { score, .. } => {
                Some(score.combined)
            }
            MatchDecision::Unmatched { best, .. } => best.map(|s| s.combined),
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, MatchDecision::Matched { .. })
    }

    /// Wire form handed back across the invocation boundary.
    pub fn report(&self) -> MatchReport {
        match self {
            MatchDecision::Matched { identity, score } => MatchReport {
                verdict: Verdict::Yes,
                filename: Some(identity.clone()),
                confidence: Some(format_confidence(score.combined)),
                algorithm: Some(ALGORITHM_NAME.to_string()),
                details: Some(MetricDetails::from(score)),
                requires_verification: None,
                error: None,
            },
            MatchDecision::Possible { identity, score } => MatchReport {
                verdict: Verdict::Possible,
                filename: Some(identity.clone()),
                confidence: Some(format_confidence(score.combined)),
                algorithm: Some(ALGORITHM_NAME.to_string()),
                details: None,
                requires_verification: Some(true),
                error: None,
            },
            MatchDecision::Unmatched { best, reason } => MatchReport {
                verdict: Verdict::No,
                filename: None,
                confidence: best.map(|s| format_confidence(s.combined)),
                algorithm: None,
                details: None,
                requires_verification: None,
                error: reason.clone(),
            },
        }
    }

    /// Serialize the report to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.report()).unwrap_or_else(|_| r#"{"match":"no"}"#.to_string())
    }
}

/// `yes` / `possible` / `no` as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    Possible,
    No,
}

/// JSON shape returned to callers of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    #[serde(rename = "match")]
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Combined score, three decimals ("0.000"–"1.000").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<MetricDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw metrics rendered as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetails {
    pub euclidean: String,
    pub cosine: String,
    pub manhattan: String,
}

impl From<&ScoreResult> for MetricDetails {
    fn from(score: &ScoreResult) -> Self {
        Self {
            euclidean: format!("{:.4}", score.euclidean),
            cosine: format!("{:.4}", score.cosine),
            manhattan: format!("{:.4}", score.manhattan),
        }
    }
}

/// Clamp to [0, 1] and render with three decimals.
fn format_confidence(combined: f32) -> String {
    format!("{:.3}", combined.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect() -> ScoreResult {
        ScoreResult {
            euclidean: 0.0,
            cosine: 1.0,
            manhattan: 0.0,
            combined: 1.0,
        }
    }

    #[test]
    fn test_fingerprint_norm() {
        let f = Fingerprint::new(vec![3.0, 4.0]);
        assert!((f.norm() - 5.0).abs() < 1e-6);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_matched_report_json() {
        let decision = MatchDecision::Matched {
            identity: "alice.jpg".into(),
            score: perfect(),
        };
        let json: serde_json::Value = serde_json::from_str(&decision.to_json()).unwrap();
        assert_eq!(json["match"], "yes");
        assert_eq!(json["filename"], "alice.jpg");
        assert_eq!(json["confidence"], "1.000");
        assert_eq!(json["algorithm"], "multi-metric");
        assert_eq!(json["details"]["cosine"], "1.0000");
        assert!(json.get("requiresVerification").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_possible_report_flags_verification() {
        let score = ScoreResult {
            euclidean: 0.5,
            cosine: 0.8,
            manhattan: 4.0,
            combined: 0.8,
        };
        let decision = MatchDecision::Possible {
            identity: "bob.png".into(),
            score,
        };
        let json: serde_json::Value = serde_json::from_str(&decision.to_json()).unwrap();
        assert_eq!(json["match"], "possible");
        assert_eq!(json["filename"], "bob.png");
        assert_eq!(json["confidence"], "0.800");
        assert_eq!(json["requiresVerification"], true);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_empty_unmatched_report_is_bare() {
        let decision = MatchDecision::Unmatched {
            best: None,
            reason: None,
        };
        assert_eq!(decision.to_json(), r#"{"match":"no"}"#);
        assert_eq!(decision.identity(), None);
    }

    #[test]
    fn test_unmatched_report_keeps_diagnostic_score_only() {
        let score = ScoreResult {
            euclidean: 1.2,
            cosine: 0.1,
            manhattan: 11.0,
            combined: 0.4,
        };
        let decision = MatchDecision::Unmatched {
            best: Some(score),
            reason: None,
        };
        let report = decision.report();
        assert_eq!(report.verdict, Verdict::No);
        assert_eq!(report.filename, None);
        assert_eq!(report.confidence.as_deref(), Some("0.400"));
    }

    #[test]
    fn test_no_fingerprint_report_carries_error() {
        let decision = MatchDecision::no_fingerprint("No face detected in input image");
        let json: serde_json::Value = serde_json::from_str(&decision.to_json()).unwrap();
        assert_eq!(json["match"], "no");
        assert_eq!(json["error"], "No face detected in input image");
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(format_confidence(1.02), "1.000");
        assert_eq!(format_confidence(-0.1), "0.000");
    }
}
