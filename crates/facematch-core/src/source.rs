//! Collaborator seams: where reference images and queries come from.
//!
//! Platform adapters implement these two traits and nothing else; the
//! engine never touches the file system directly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unreadable: {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// One reference image as read from the reference directory.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    /// Store key, derived from the file name.
    pub identity: String,
    pub bytes: Vec<u8>,
    /// Byte length of the file on disk.
    pub size: u64,
}

/// The query image for a single match request.
#[derive(Debug, Clone)]
pub struct QueryImage {
    pub path: String,
    pub bytes: Vec<u8>,
    pub size: u64,
}

/// Supplies the reference images a store is rebuilt from.
pub trait ReferenceSource {
    /// List every reference image. Unreadable individual files are the
    /// adapter's to skip; an `Err` means the listing itself failed.
    fn list_references(&self) -> Result<Vec<ReferenceEntry>, SourceError>;
}

/// Supplies query image content given its location.
pub trait QuerySource {
    /// Size in bytes if the query exists and is readable, `None` otherwise.
    fn probe(&self, path: &str) -> Option<u64>;

    fn read_query(&self, path: &str) -> Result<QueryImage, SourceError>;
}
