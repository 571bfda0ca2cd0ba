//! Reference directory access.
//!
//! The reference directory is the durable store: one image file per
//! identity, named after the identity. The in-memory fingerprint store is
//! only ever synchronized from here by an explicit rebuild.

use crate::format::{
    is_plain_file_name, is_reference_image, reference_format, sniff_reference_format,
};
use facematch_core::{QueryImage, QuerySource, ReferenceEntry, ReferenceSource, SourceError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Files above this size are neither enumerated nor read as queries.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("reference directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("invalid reference name: {0:?}")]
    InvalidName(String),
    #[error("not a reference image (need .jpg, .jpeg, .png or .bmp): {0}")]
    NotAnImage(String),
    #[error("{path} is {size} bytes, above the {max}-byte limit")]
    TooLarge { path: String, size: u64, max: u64 },
    #[error("reference already exists: {0}")]
    AlreadyExists(String),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// File or identity the error is about, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            FsError::DirectoryNotFound(p)
            | FsError::InvalidName(p)
            | FsError::NotAnImage(p)
            | FsError::AlreadyExists(p)
            | FsError::TooLarge { path: p, .. } => Some(p.as_str()),
            FsError::Io(_) => None,
        }
    }
}

impl From<FsError> for SourceError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::DirectoryNotFound(p) => SourceError::NotFound(p),
            FsError::Io(err) => SourceError::Io(err),
            other => SourceError::Unreadable {
                path: other.path().unwrap_or_default().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Reference directory plus query reads from the local file system.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    max_file_bytes: u64,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Create the reference directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), FsError> {
        if !self.root.is_dir() {
            fs::create_dir_all(&self.root)?;
            tracing::info!(dir = %self.root.display(), "created reference directory");
        }
        Ok(())
    }

    /// Path of the file backing `identity`, after validating the name.
    pub fn reference_path(&self, identity: &str) -> Result<PathBuf, FsError> {
        if !is_plain_file_name(identity) {
            return Err(FsError::InvalidName(identity.to_string()));
        }
        if !is_reference_image(identity) {
            return Err(FsError::NotAnImage(identity.to_string()));
        }
        Ok(self.root.join(identity))
    }

    /// Identities of every reference image currently on disk, sorted.
    pub fn list_identities(&self) -> Result<Vec<String>, FsError> {
        let mut names: Vec<String> = self
            .reference_files()?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Read one reference image by identity.
    pub fn read_reference(&self, identity: &str) -> Result<ReferenceEntry, FsError> {
        let path = self.reference_path(identity)?;
        let (bytes, size) = self.read_capped(&path)?;
        Ok(ReferenceEntry {
            identity: identity.to_string(),
            bytes,
            size,
        })
    }

    /// Copy `src` into the reference directory.
    ///
    /// The identity is `name` if given, else the source file name. An
    /// existing reference with the same identity is not overwritten. The
    /// source must carry a reference extension and start with a JPEG, PNG
    /// or BMP signature.
    pub fn import(&self, src: &Path, name: Option<&str>) -> Result<ReferenceEntry, FsError> {
        let identity = match name {
            Some(n) => n.to_string(),
            None => src
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| FsError::InvalidName(src.display().to_string()))?,
        };
        let dest = self.reference_path(&identity)?;
        if reference_format(src).is_none() {
            return Err(FsError::NotAnImage(src.display().to_string()));
        }
        if dest.exists() {
            return Err(FsError::AlreadyExists(identity));
        }

        let (bytes, size) = self.read_capped(src)?;
        if sniff_reference_format(&bytes).is_none() {
            tracing::warn!(src = %src.display(), "import refused: content is not an image");
            return Err(FsError::NotAnImage(src.display().to_string()));
        }
        self.ensure_dir()?;
        fs::write(&dest, &bytes)?;
        tracing::info!(identity = %identity, src = %src.display(), size, "reference imported");

        Ok(ReferenceEntry {
            identity,
            bytes,
            size,
        })
    }

    /// Delete the file backing `identity`. Returns false if it did not exist.
    pub fn delete(&self, identity: &str) -> Result<bool, FsError> {
        let path = self.reference_path(identity)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(identity, "reference deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// `(identity, path)` for every regular file with a reference extension.
    fn reference_files(&self) -> Result<Vec<(String, PathBuf)>, FsError> {
        let dir = fs::read_dir(&self.root).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FsError::DirectoryNotFound(self.root.display().to_string())
            } else {
                FsError::Io(e)
            }
        })?;

        let mut files = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %path.display(), "skipping non-UTF-8 file name");
                continue;
            };
            if is_reference_image(&name) {
                files.push((name, path));
            }
        }
        Ok(files)
    }

    /// Read a whole file, refusing anything above the size cap.
    fn read_capped(&self, path: &Path) -> Result<(Vec<u8>, u64), FsError> {
        let size = fs::metadata(path)?.len();
        if size > self.max_file_bytes {
            return Err(FsError::TooLarge {
                path: path.display().to_string(),
                size,
                max: self.max_file_bytes,
            });
        }
        let bytes = fs::read(path)?;
        Ok((bytes, size))
    }
}

impl ReferenceSource for DirectorySource {
    fn list_references(&self) -> Result<Vec<ReferenceEntry>, SourceError> {
        let mut files = self.reference_files()?;
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for (identity, path) in files {
            match self.read_capped(&path) {
                Ok((bytes, size)) => entries.push(ReferenceEntry {
                    identity,
                    bytes,
                    size,
                }),
                Err(e) => {
                    tracing::warn!(
                        identity = %identity,
                        error = %e,
                        "skipping unreadable reference"
                    );
                }
            }
        }

        tracing::debug!(
            dir = %self.root.display(),
            count = entries.len(),
            "listed reference images"
        );
        Ok(entries)
    }
}

impl QuerySource for DirectorySource {
    fn probe(&self, path: &str) -> Option<u64> {
        fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    fn read_query(&self, path: &str) -> Result<QueryImage, SourceError> {
        let (bytes, size) = self.read_capped(Path::new(path)).map_err(|e| match e {
            FsError::Io(err) if err.kind() == io::ErrorKind::NotFound => {
                SourceError::NotFound(path.to_string())
            }
            other => SourceError::Unreadable {
                path: path.to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(QueryImage {
            path: path.to_string(),
            bytes,
            size,
        })
    }
}
