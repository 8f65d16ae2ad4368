//! Wheel (`.whl`) metadata reader.

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

/// Reads `<name>-<version>.dist-info/METADATA` from a wheel.
#[derive(Debug, Default, Clone, Copy)]
pub struct WheelReader;

impl MetadataReader for WheelReader {
    fn format(&self) -> DistributionFormat {
        DistributionFormat::Wheel
    }

    fn read(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata> {
        ensure_suffix(self.format(), path)?;
        let filename = display_name(path);
        let mut archive = open_zip(path)?;

        let member = find_member(archive.file_names(), |parts| {
            matches!(parts, [dir, "METADATA"] if dir.ends_with(".dist-info"))
        })
        .ok_or_else(|| missing_member(&filename, "*.dist-info/METADATA"))?;

        debug!(filename, member, "reading wheel metadata");
        read_zip_metadata(&mut archive, &member, options.max_metadata_size, &filename)
    }
}
