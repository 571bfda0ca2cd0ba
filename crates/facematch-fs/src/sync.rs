//! Keeping the reference directory and an in-memory store in step.

use crate::directory::{DirectorySource, FsError};
use facematch_core::{MatchSession, Scorer, SessionError};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Import `src` into the reference directory and fingerprint it.
///
/// If the imported file yields no fingerprint it is deleted again, so the
/// directory never holds a reference the store does not.
pub fn register_file<S: Scorer>(
    source: &DirectorySource,
    session: &MatchSession<S>,
    src: &Path,
    name: Option<&str>,
) -> Result<String, SyncError> {
    let entry = source.import(src, name)?;
    if let Err(e) = session.register(&entry) {
        tracing::warn!(identity = %entry.identity, error = %e, "registration rejected");
        if let Err(del) = source.delete(&entry.identity) {
            tracing::warn!(
                identity = %entry.identity,
                error = %del,
                "failed to roll back import"
            );
        }
        return Err(e.into());
    }
    Ok(entry.identity)
}

/// Delete a reference file and drop its fingerprint. True if either existed.
pub fn remove_reference<S: Scorer>(
    source: &DirectorySource,
    session: &MatchSession<S>,
    identity: &str,
) -> Result<bool, FsError> {
    let deleted = source.delete(identity)?;
    let unregistered = session.unregister(identity);
    Ok(deleted || unregistered)
}
