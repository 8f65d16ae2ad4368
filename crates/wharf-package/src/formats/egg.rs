//! Egg (`.egg`) metadata reader.

use std::path::Path;

use tracing::debug;

use crate::{
    error::Result,
    formats::{
        common::{display_name, ensure_suffix, find_member, missing_member, open_zip, read_zip_metadata},
        DistributionFormat,
    },
    pkginfo::RawMetadata,
    traits::{MetadataReader, ReaderOptions},
};

/// Reads `EGG-INFO/PKG-INFO` from an egg.
#[derive(Debug, Default, Clone, Copy)]
pub struct EggReader;

impl MetadataReader for EggReader {
    fn format(&self) -> DistributionFormat {
        DistributionFormat::Egg
    }

    fn read(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata> {
        ensure_suffix(self.format(), path)?;
        let filename = display_name(path);
        let mut archive = open_zip(path)?;

        let member = find_member(archive.file_names(), |parts| {
            parts == ["EGG-INFO", "PKG-INFO"]
        })
        .ok_or_else(|| missing_member(&filename, "EGG-INFO/PKG-INFO"))?;

        debug!(filename, member, "reading egg metadata");
        read_zip_metadata(&mut archive, &member, options.max_metadata_size, &filename)
    }
}
