//! Matching session: extract, score every stored fingerprint, classify.

use crate::classifier::{classify, Thresholds};
use crate::extractor::{self, ExtractError};
use crate::scorer::{MultiMetricScorer, ScoreError, Scorer};
use crate::source::{QuerySource, ReferenceEntry, ReferenceSource, SourceError};
use crate::store::{FingerprintStore, StoreError};
use crate::types::{Fingerprint, MatchDecision, ScoreResult};
use std::sync::Arc;
use thiserror::Error;

/// Note attached to an unmatched decision when the query yields no fingerprint.
pub const NO_FINGERPRINT_NOTE: &str = "No face detected in input image";
/// Note attached when the query image does not exist.
pub const QUERY_NOT_FOUND_NOTE: &str = "Input image not found";
/// Note attached when the query exists but cannot be read (too large, no access).
pub const QUERY_UNREADABLE_NOTE: &str = "Input image could not be read";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Matches queries against a shared fingerprint store.
///
/// A match is a pure read over one store snapshot.
pub struct MatchSession<S = MultiMetricScorer> {
    store: Arc<FingerprintStore>,
    scorer: S,
    thresholds: Thresholds,
}

impl MatchSession<MultiMetricScorer> {
    pub fn new(store: Arc<FingerprintStore>, thresholds: Thresholds) -> Self {
        Self::with_scorer(store, MultiMetricScorer, thresholds)
    }
}

impl<S: Scorer> MatchSession<S> {
    pub fn with_scorer(store: Arc<FingerprintStore>, scorer: S, thresholds: Thresholds) -> Self {
        Self {
            store,
            scorer,
            thresholds,
        }
    }

    pub fn store(&self) -> &Arc<FingerprintStore> {
        &self.store
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Match raw query content.
    ///
    /// A query that yields no fingerprint is an unmatched decision, not an
    /// error. `Err` means a stored fingerprint was corrupt.
    pub fn match_image(
        &self,
        path: &str,
        bytes: &[u8],
        size: u64,
    ) -> Result<MatchDecision, ScoreError> {
        match extractor::extract(path, bytes, size) {
            Ok(query) => self.match_fingerprint(&query),
            Err(e) => {
                tracing::info!(path, error = %e, "query produced no fingerprint");
                Ok(MatchDecision::no_fingerprint(NO_FINGERPRINT_NOTE))
            }
        }
    }

    /// Score `query` against every stored fingerprint and classify the best.
    ///
    /// Ties keep the earliest identity in store order.
    pub fn match_fingerprint(&self, query: &Fingerprint) -> Result<MatchDecision, ScoreError> {
        let snapshot = self.store.snapshot();
        let mut best: Option<(&str, ScoreResult)> = None;

        for (identity, candidate) in snapshot.iter() {
            let score = self.scorer.score(query, candidate).map_err(|e| {
                tracing::error!(identity = %identity, error = %e, "corrupt fingerprint in store");
                e
            })?;
            tracing::debug!(
                identity = %identity,
                euclidean = score.euclidean,
                cosine = score.cosine,
                manhattan = score.manhattan,
                combined = score.combined,
                "scored candidate"
            );

            let is_better = match &best {
                None => true,
                Some((_, prev)) => score.combined > prev.combined,
            };
            if is_better {
                best = Some((identity.as_str(), score));
            }
        }

        let decision = classify(best, &self.thresholds);
        tracing::info!(
            candidates = snapshot.len(),
            identity = decision.identity().unwrap_or("-"),
            combined = decision.combined_score().unwrap_or(0.0),
            "match complete"
        );
        Ok(decision)
    }

    /// Read the query through `source`, then match it.
    pub fn match_query<Q>(&self, source: &Q, path: &str) -> Result<MatchDecision, ScoreError>
    where
        Q: QuerySource + ?Sized,
    {
        if source.probe(path).is_none() {
            tracing::info!(path, "query image not found");
            return Ok(MatchDecision::no_fingerprint(QUERY_NOT_FOUND_NOTE));
        }
        match source.read_query(path) {
            Ok(query) => self.match_image(&query.path, &query.bytes, query.size),
            Err(SourceError::NotFound(_)) => {
                tracing::info!(path, "query image disappeared before read");
                Ok(MatchDecision::no_fingerprint(QUERY_NOT_FOUND_NOTE))
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "query image unreadable");
                Ok(MatchDecision::no_fingerprint(QUERY_UNREADABLE_NOTE))
            }
        }
    }

    /// Rebuild the store from `source`. On failure the store is left as it was.
    pub fn reload<R>(&self, source: &R) -> Result<usize, StoreError>
    where
        R: ReferenceSource + ?Sized,
    {
        self.store.rebuild_from(source)
    }

    /// Fingerprint a newly registered reference image and add it to the store.
    pub fn register(&self, entry: &ReferenceEntry) -> Result<(), SessionError> {
        let fingerprint = extractor::extract(&entry.identity, &entry.bytes, entry.size)?;
        self.store.put(entry.identity.clone(), fingerprint)?;
        tracing::info!(identity = %entry.identity, "reference registered");
        Ok(())
    }

    /// Drop a reference from the store. Returns true if it was present.
    pub fn unregister(&self, identity: &str) -> bool {
        let removed = self.store.remove(identity);
        tracing::info!(identity, removed, "reference unregistered");
        removed
    }
}
