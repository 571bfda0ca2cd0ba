//! facematch-fs — File system adapter for the matching engine.
//!
//! Enumerates the reference directory, reads query images, and imports or
//! deletes reference files. Implements the `ReferenceSource` and
//! `QuerySource` seams from `facematch-core`.

pub mod directory;
pub mod format;
pub mod sync;

pub use directory::{DirectorySource, FsError, DEFAULT_MAX_FILE_BYTES};
pub use format::{is_reference_image, reference_format, sniff_reference_format};
pub use sync::{register_file, remove_reference, SyncError};
