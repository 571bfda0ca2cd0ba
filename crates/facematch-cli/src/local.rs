//! In-process engine for `--dir`: no daemon, one command per run.

use anyhow::{Context, Result};
use facematch_core::{FingerprintStore, MatchDecision, MatchSession, Thresholds};
use facematch_fs::DirectorySource;
use std::path::Path;
use std::sync::Arc;

pub struct LocalEngine {
    source: DirectorySource,
    session: MatchSession,
}

impl LocalEngine {
    /// Open `dir` and build the store from it.
    pub fn open(dir: &Path) -> Result<Self> {
        let source = DirectorySource::new(dir);
        let session = MatchSession::new(Arc::new(FingerprintStore::new()), Thresholds::default());
        let count = session
            .reload(&source)
            .with_context(|| format!("loading references from {}", dir.display()))?;
        tracing::debug!(references = count, "local store built");
        Ok(Self { source, session })
    }

    pub fn match_image(&self, path: &Path) -> Result<MatchDecision> {
        let path = path.to_string_lossy();
        Ok(self.session.match_query(&self.source, &path)?)
    }

    pub fn reload(&self) -> Result<usize> {
        Ok(self.session.reload(&self.source)?)
    }

    pub fn list(&self) -> Vec<String> {
        self.session.store().identities()
    }

    pub fn add(&self, path: &Path, name: Option<&str>) -> Result<String> {
        Ok(facematch_fs::register_file(
            &self.source,
            &self.session,
            path,
            name,
        )?)
    }

    pub fn remove(&self, identity: &str) -> Result<bool> {
        Ok(facematch_fs::remove_reference(
            &self.source,
            &self.session,
            identity,
        )?)
    }

    pub fn status(&self) -> serde_json::Value {
        let thresholds = self.session.thresholds();
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "mode": "local",
            "references": self.session.store().len(),
            "reference_dir": self.source.root().display().to_string(),
            "match_threshold": thresholds.matched,
            "possible_threshold": thresholds.possible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::Verdict;
    use std::fs;
    use tempfile::TempDir;

    fn bytes(len: usize, step: u8) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(step)).collect();
        bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        bytes
    }

    #[test]
    fn test_local_round_trip() {
        let refs = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        fs::write(refs.path().join("gina.jpg"), bytes(4096, 3)).unwrap();

        let engine = LocalEngine::open(refs.path()).unwrap();
        assert_eq!(engine.list(), vec!["gina.jpg"]);

        let query = inbox.path().join("gina.jpg");
        fs::write(&query, bytes(4096, 3)).unwrap();
        let decision = engine.match_image(&query).unwrap();
        assert_eq!(decision.report().verdict, Verdict::Yes);

        let new_ref = inbox.path().join("hank.png");
        fs::write(&new_ref, bytes(2048, 5)).unwrap();
        assert_eq!(engine.add(&new_ref, None).unwrap(), "hank.png");
        assert!(engine.remove("gina.jpg").unwrap());
        assert_eq!(engine.list(), vec!["hank.png"]);
        assert_eq!(engine.status()["references"], 1);
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalEngine::open(&tmp.path().join("absent")).is_err());
    }
}
