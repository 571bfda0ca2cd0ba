use crate::engine::{EngineError, EngineHandle};
use facematch_fs::FsError;
use std::path::PathBuf;
use zbus::interface;

pub const BUS_NAME: &str = "org.freedesktop.FaceMatch1";
pub const OBJECT_PATH: &str = "/org/freedesktop/FaceMatch1";

/// D-Bus interface for the FaceMatch daemon.
///
/// Bus name: org.freedesktop.FaceMatch1
/// Object path: /org/freedesktop/FaceMatch1
pub struct FaceMatchService {
    engine: EngineHandle,
}

impl FaceMatchService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.freedesktop.FaceMatch1")]
impl FaceMatchService {
    /// Match the image at `path` against the reference set.
    ///
    /// Returns the match report as JSON. A missing or unusable query is a
    /// `"no"` report with an `error` note, not a D-Bus error.
    async fn match_image(&self, path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(path, "match requested");
        let decision = self.engine.match_image(path.to_string()).await.map_err(to_fdo)?;
        Ok(decision.to_json())
    }

    /// Rebuild the store from the reference directory. Returns the entry count.
    async fn reload(&self) -> zbus::fdo::Result<u32> {
        tracing::info!("reload requested");
        let count = self.engine.reload().await.map_err(to_fdo)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Register a new reference image. An empty `name` keeps the file name.
    async fn register(&self, path: &str, name: &str) -> zbus::fdo::Result<String> {
        tracing::info!(path, name, "register requested");
        let name = (!name.is_empty()).then(|| name.to_string());
        self.engine
            .register(PathBuf::from(path), name)
            .await
            .map_err(to_fdo)
    }

    /// Remove a reference image by identity.
    async fn remove(&self, identity: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(identity, "remove requested");
        self.engine.remove(identity.to_string()).await.map_err(to_fdo)
    }

    /// List registered identities as a JSON array.
    async fn list_references(&self) -> zbus::fdo::Result<String> {
        let identities = self.engine.list().await.map_err(to_fdo)?;
        serde_json::to_string(&identities).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        serde_json::to_string(&status).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}

fn to_fdo(e: EngineError) -> zbus::fdo::Error {
    match &e {
        EngineError::NoFingerprint(_)
        | EngineError::Fs(
            FsError::InvalidName(_)
            | FsError::NotAnImage(_)
            | FsError::TooLarge { .. }
            | FsError::AlreadyExists(_),
        ) => zbus::fdo::Error::InvalidArgs(e.to_string()),
        EngineError::Fs(FsError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
            zbus::fdo::Error::FileNotFound(e.to_string())
        }
        EngineError::Score(_) => {
            tracing::error!(error = %e, "store corruption detected");
            zbus::fdo::Error::Failed(e.to_string())
        }
        _ => zbus::fdo::Error::Failed(e.to_string()),
    }
}
