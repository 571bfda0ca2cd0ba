use chrono::{DateTime, Utc};
use facematch_core::{
    ExtractError, FingerprintStore, MatchDecision, MatchSession, ScoreError, SessionError,
    StoreError, Thresholds,
};
use facematch_fs::{DirectorySource, FsError, SyncError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("file system error: {0}")]
    Fs(#[from] FsError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal scoring error: {0}")]
    Score(#[from] ScoreError),
    #[error("{0}")]
    NoFingerprint(#[from] ExtractError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

impl From<SyncError> for EngineError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Fs(e) => EngineError::Fs(e),
            SyncError::Session(SessionError::Extract(e)) => EngineError::NoFingerprint(e),
            SyncError::Session(SessionError::Store(e)) => EngineError::Store(e),
        }
    }
}

/// Snapshot of engine state reported by `Status`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub version: &'static str,
    pub references: usize,
    pub reference_dir: String,
    pub match_threshold: f32,
    pub possible_threshold: f32,
    /// Time of the last successful reload (RFC 3339).
    pub last_reload: Option<DateTime<Utc>>,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Match {
        path: String,
        reply: oneshot::Sender<Result<MatchDecision, EngineError>>,
    },
    Reload {
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    Register {
        path: PathBuf,
        name: Option<String>,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
    Remove {
        identity: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Match the image at `path` against the reference store.
    pub async fn match_image(&self, path: String) -> Result<MatchDecision, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Match { path, reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Re-scan the reference directory and rebuild the store.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Reload { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Copy an image into the reference directory and fingerprint it.
    pub async fn register(
        &self,
        path: PathBuf,
        name: Option<String>,
    ) -> Result<String, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Register { path, name, reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Delete a reference image and drop its fingerprint.
    pub async fn remove(&self, identity: String) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Remove { identity, reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Identities currently held in memory.
    pub async fn list(&self) -> Result<Vec<String>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::List { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Status { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Engine state owned by the engine thread.
struct Engine {
    source: DirectorySource,
    session: MatchSession,
    last_reload: Option<DateTime<Utc>>,
}

impl Engine {
    fn new(source: DirectorySource, thresholds: Thresholds) -> Self {
        Self {
            source,
            session: MatchSession::new(Arc::new(FingerprintStore::new()), thresholds),
            last_reload: None,
        }
    }

    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Match { path, reply } => {
                let _ = reply.send(self.run_match(&path));
            }
            EngineRequest::Reload { reply } => {
                let _ = reply.send(self.run_reload());
            }
            EngineRequest::Register { path, name, reply } => {
                let _ = reply.send(self.run_register(path, name));
            }
            EngineRequest::Remove { identity, reply } => {
                let _ = reply.send(self.run_remove(&identity));
            }
            EngineRequest::List { reply } => {
                let _ = reply.send(self.session.store().identities());
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn run_match(&self, path: &str) -> Result<MatchDecision, EngineError> {
        Ok(self.session.match_query(&self.source, path)?)
    }

    /// On failure the previous store stays in place.
    fn run_reload(&mut self) -> Result<usize, EngineError> {
        let count = self.session.reload(&self.source)?;
        self.last_reload = Some(Utc::now());
        Ok(count)
    }

    fn run_register(&self, path: PathBuf, name: Option<String>) -> Result<String, EngineError> {
        Ok(facematch_fs::register_file(
            &self.source,
            &self.session,
            &path,
            name.as_deref(),
        )?)
    }

    fn run_remove(&self, identity: &str) -> Result<bool, EngineError> {
        Ok(facematch_fs::remove_reference(
            &self.source,
            &self.session,
            identity,
        )?)
    }

    fn status(&self) -> EngineStatus {
        let thresholds = self.session.thresholds();
        EngineStatus {
            version: env!("CARGO_PKG_VERSION"),
            references: self.session.store().len(),
            reference_dir: self.source.root().display().to_string(),
            match_threshold: thresholds.matched,
            possible_threshold: thresholds.possible,
            last_reload: self.last_reload,
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Ensures the reference directory exists and performs the initial
/// rebuild before accepting requests. A failed initial rebuild starts the
/// engine with an empty store.
pub fn spawn_engine(
    source: DirectorySource,
    thresholds: Thresholds,
) -> Result<EngineHandle, EngineError> {
    source.ensure_dir()?;
    tracing::info!(
        dir = %source.root().display(),
        max_file_bytes = source.max_file_bytes(),
        "reference directory ready"
    );

    let mut engine = Engine::new(source, thresholds);
    match engine.run_reload() {
        Ok(count) => tracing::info!(references = count, "initial rebuild complete"),
        Err(e) => tracing::warn!(error = %e, "initial rebuild failed; starting empty"),
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::Verdict;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// JPEG start-of-image marker followed by seeded noise.
    fn image(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed | 1;
        let mut bytes: Vec<u8> = (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect();
        bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        bytes
    }

    fn spawn(dir: &Path) -> EngineHandle {
        spawn_engine(DirectorySource::new(dir), Thresholds::default()).unwrap()
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_engine_match_register_remove() {
        let refs = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        let alice = image(4096, 1);
        write(refs.path(), "alice.jpg", &alice);
        write(refs.path(), "bob.png", &image(4096, 2));
        write(refs.path(), "tiny.bmp", &image(100, 3));

        let engine = spawn(refs.path());
        assert_eq!(engine.list().await.unwrap(), vec!["alice.jpg", "bob.png"]);

        let query = write(inbox.path(), "alice.jpg", &alice);
        let decision = engine
            .match_image(query.to_string_lossy().into_owned())
            .await
            .unwrap();
        assert_eq!(decision.report().verdict, Verdict::Yes);
        assert_eq!(decision.identity(), Some("alice.jpg"));

        let carol = write(inbox.path(), "carol.jpeg", &image(3000, 4));
        assert_eq!(engine.register(carol, None).await.unwrap(), "carol.jpeg");
        assert_eq!(engine.status().await.unwrap().references, 3);

        assert!(engine.remove("alice.jpg".into()).await.unwrap());
        assert!(!refs.path().join("alice.jpg").exists());
        assert_eq!(engine.list().await.unwrap(), vec!["bob.png", "carol.jpeg"]);
    }

    #[tokio::test]
    async fn test_register_rolls_back_unfingerprintable_image() {
        let refs = TempDir::new().unwrap();
        let inbox = TempDir::new().unwrap();
        let engine = spawn(refs.path());

        let small = write(inbox.path(), "small.jpg", &image(200, 5));
        let err = engine.register(small, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NoFingerprint(_)));
        assert!(!refs.path().join("small.jpg").exists());
        assert!(engine.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_reports_not_found() {
        let refs = TempDir::new().unwrap();
        let engine = spawn(refs.path());
        let missing = refs.path().join("nope.jpg");
        let decision = engine
            .match_image(missing.to_string_lossy().into_owned())
            .await
            .unwrap();
        let report = decision.report();
        assert_eq!(report.verdict, Verdict::No);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_files() {
        let refs = TempDir::new().unwrap();
        let engine = spawn(refs.path());
        assert_eq!(engine.reload().await.unwrap(), 0);

        write(refs.path(), "dave.jpg", &image(2048, 6));
        assert_eq!(engine.reload().await.unwrap(), 1);
        let status = engine.status().await.unwrap();
        assert_eq!(status.references, 1);
        assert!(status.last_reload.is_some());
    }

    #[test]
    fn test_failed_reload_keeps_previous_store() {
        let refs = TempDir::new().unwrap();
        write(refs.path(), "erin.jpg", &image(2048, 7));
        let mut engine = Engine::new(DirectorySource::new(refs.path()), Thresholds::default());
        assert_eq!(engine.run_reload().unwrap(), 1);

        fs::remove_file(refs.path().join("erin.jpg")).unwrap();
        fs::remove_dir(refs.path()).unwrap();
        assert!(matches!(engine.run_reload(), Err(EngineError::Store(_))));
        assert_eq!(engine.session.store().identities(), vec!["erin.jpg"]);
    }
}
