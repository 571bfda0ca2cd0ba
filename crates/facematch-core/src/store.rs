//! In-memory fingerprint store keyed by identity.
//!
//! Readers take an `Arc` snapshot once and never see a half-applied
//! update: `rebuild` constructs the new map off to the side and swaps it
//! in, `put`/`remove` copy-on-write when a snapshot is outstanding.

use crate::extractor;
use crate::source::{ReferenceEntry, ReferenceSource, SourceError};
use crate::types::{Fingerprint, FINGERPRINT_DIM};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Immutable view of the store. Iterates in identity order.
pub type Snapshot = Arc<BTreeMap<String, Fingerprint>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("reference store unavailable: {0}")]
    StoreUnavailable(#[from] SourceError),
    #[error("fingerprint for {identity} has {actual} components, expected {expected}")]
    InvalidDimension {
        identity: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Default)]
pub struct FingerprintStore {
    entries: RwLock<Snapshot>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Current contents; later writes do not affect the returned snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.entries.read().clone()
    }

    /// Copy of every `(identity, fingerprint)` pair.
    pub fn entries(&self) -> Vec<(String, Fingerprint)> {
        self.snapshot()
            .iter()
            .map(|(id, fp)| (id.clone(), fp.clone()))
            .collect()
    }

    pub fn identities(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.read().contains_key(identity)
    }

    /// Insert or overwrite an entry.
    pub fn put(
        &self,
        identity: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Result<(), StoreError> {
        let identity = identity.into();
        if fingerprint.len() != FINGERPRINT_DIM {
            return Err(StoreError::InvalidDimension {
                identity,
                expected: FINGERPRINT_DIM,
                actual: fingerprint.len(),
            });
        }
        let mut guard = self.entries.write();
        Arc::make_mut(&mut *guard).insert(identity, fingerprint);
        Ok(())
    }

    /// Returns true if the identity was present.
    pub fn remove(&self, identity: &str) -> bool {
        let mut guard = self.entries.write();
        if !guard.contains_key(identity) {
            return false;
        }
        Arc::make_mut(&mut *guard).remove(identity).is_some()
    }

    pub fn clear(&self) {
        *self.entries.write() = Arc::default();
    }

    /// Replace the whole store with fingerprints extracted from `entries`.
    ///
    /// Entries that yield no fingerprint are skipped. Returns the number
    /// of fingerprints stored.
    pub fn rebuild<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = ReferenceEntry>,
    {
        let mut fresh = BTreeMap::new();
        let mut skipped = 0usize;

        for entry in entries {
            match extractor::extract(&entry.identity, &entry.bytes, entry.size) {
                Ok(fp) => {
                    fresh.insert(entry.identity, fp);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(identity = %entry.identity, error = %e, "skipping reference");
                }
            }
        }

        let count = fresh.len();
        *self.entries.write() = Arc::new(fresh);
        tracing::info!(stored = count, skipped, "fingerprint store rebuilt");
        count
    }

    /// Rebuild from a reference source.
    ///
    /// If the source cannot be listed the store keeps its prior contents.
    pub fn rebuild_from<S>(&self, source: &S) -> Result<usize, StoreError>
    where
        S: ReferenceSource + ?Sized,
    {
        let entries = source.list_references().map_err(|e| {
            tracing::warn!(error = %e, "reference listing failed; keeping previous store");
            StoreError::from(e)
        })?;
        Ok(self.rebuild(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identity: &str, len: usize) -> ReferenceEntry {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8 ^ identity.len() as u8).collect();
        ReferenceEntry {
            identity: identity.to_string(),
            size: len as u64,
            bytes,
        }
    }

    fn unit(len: usize) -> Fingerprint {
        let mut v = vec![0.0f32; len];
        if let Some(first) = v.first_mut() {
            *first = 1.0;
        }
        Fingerprint::new(v)
    }

    struct FailingSource;

    impl ReferenceSource for FailingSource {
        fn list_references(&self) -> Result<Vec<ReferenceEntry>, SourceError> {
            Err(SourceError::NotFound("/missing".into()))
        }
    }

    #[test]
    fn test_put_and_remove() {
        let store = FingerprintStore::new();
        store.put("alice.jpg", unit(FINGERPRINT_DIM)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("alice.jpg"));
        assert!(store.remove("alice.jpg"));
        assert!(!store.remove("alice.jpg"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_overwrites() {
        let store = FingerprintStore::new();
        store.put("a", unit(FINGERPRINT_DIM)).unwrap();
        let mut other = vec![0.0f32; FINGERPRINT_DIM];
        other[1] = 1.0;
        store.put("a", Fingerprint::new(other.clone())).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].1.values(), other.as_slice());
    }

    #[test]
    fn test_put_rejects_wrong_dimension() {
        let store = FingerprintStore::new();
        let err = store.put("short", unit(3)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDimension { actual: 3, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = FingerprintStore::new();
        store.put("a", unit(FINGERPRINT_DIM)).unwrap();
        store.put("b", unit(FINGERPRINT_DIM)).unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let store = FingerprintStore::new();
        store.put("a", unit(FINGERPRINT_DIM)).unwrap();
        let snap = store.snapshot();
        store.put("b", unit(FINGERPRINT_DIM)).unwrap();
        store.remove("a");
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("a"));
        assert_eq!(store.identities(), vec!["b".to_string()]);
    }

    #[test]
    fn test_rebuild_skips_unfingerprintable_entries() {
        let store = FingerprintStore::new();
        let entries = vec![
            entry("a.jpg", 2048),
            entry("b.jpg", 100),
            entry("c.png", 4096),
            entry("d.bmp", 1023),
            entry("e.jpeg", 1024),
        ];
        assert_eq!(store.rebuild(entries), 3);
        assert_eq!(store.identities(), vec!["a.jpg", "c.png", "e.jpeg"]);
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let store = FingerprintStore::new();
        store.put("stale.jpg", unit(FINGERPRINT_DIM)).unwrap();
        store.rebuild(vec![entry("fresh.jpg", 2048)]);
        assert_eq!(store.identities(), vec!["fresh.jpg"]);
    }

    #[test]
    fn test_rebuild_from_unavailable_source_keeps_store() {
        let store = FingerprintStore::new();
        store.put("kept.jpg", unit(FINGERPRINT_DIM)).unwrap();
        let err = store.rebuild_from(&FailingSource).unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
        assert_eq!(store.identities(), vec!["kept.jpg"]);
    }

    #[test]
    fn test_every_stored_fingerprint_is_full_length() {
        let store = FingerprintStore::new();
        store.rebuild(vec![entry("a.jpg", 2048), entry("b.jpg", 8192)]);
        assert!(store.entries().iter().all(|(_, fp)| fp.len() == FINGERPRINT_DIM));
    }
}
