//! Traits for metadata readers.

use std::path::Path;

use crate::{error::Result, formats::DistributionFormat, pkginfo::RawMetadata};

/// Limits applied while reading an archive.
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Largest metadata member, in bytes, a reader will load.
    pub max_metadata_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_metadata_size: 1024 * 1024,
        }
    }
}

/// Extracts core metadata from a distribution file on disk.
///
/// Readers inspect the path's suffix, so callers must hand them a file named exactly as
/// the distribution was uploaded.
pub trait MetadataReader: Send + Sync {
    /// The format this reader understands.
    fn format(&self) -> DistributionFormat;

    /// Reads the archive at `path` and returns its raw metadata.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PackageError::MetadataExtraction`] when the archive is unreadable,
    /// carries the wrong suffix, or has no usable metadata member.
    fn read(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata>;
}
