//! facematch-core — Content fingerprinting and multi-metric matching engine.
//!
//! Turns an image file into a 128-dimensional fingerprint, keeps a store
//! of reference fingerprints keyed by file name, and classifies a query
//! as matched, possible or unmatched against that store.

pub mod classifier;
pub mod extractor;
pub mod scorer;
pub mod session;
pub mod source;
pub mod store;
pub mod types;

pub use classifier::{classify, Thresholds};
pub use extractor::{extract, ExtractError};
pub use scorer::{MultiMetricScorer, ScoreError, Scorer};
pub use session::{
    MatchSession, SessionError, NO_FINGERPRINT_NOTE, QUERY_NOT_FOUND_NOTE, QUERY_UNREADABLE_NOTE,
};
pub use source::{QueryImage, QuerySource, ReferenceEntry, ReferenceSource, SourceError};
pub use store::{FingerprintStore, Snapshot, StoreError};
pub use types::{Fingerprint, MatchDecision, MatchReport, ScoreResult, Verdict, FINGERPRINT_DIM};
