//! Source distribution (`.tar.gz`, `.tar.bz2`, `.zip`) metadata reader.

use std::{io::Read, path::Path};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::{
    error::{PackageError, Result},
    formats::{
        common::{
            display_name, ensure_suffix, find_member, missing_member, open_file, open_zip,
            parse_metadata, read_member_text, read_zip_metadata,
        },
        DistributionFormat,
    },
    pkginfo::RawMetadata,
    traits::{MetadataReader, ReaderOptions},
};

const MEMBER: &str = "<top>/PKG-INFO";

fn is_top_level_pkg_info(parts: &[&str]) -> bool {
    matches!(parts, [_, "PKG-INFO"])
}

/// Reads the top-level `PKG-INFO` of a source distribution.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdistReader;

impl SdistReader {
    fn read_zip(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata> {
        let filename = display_name(path);
        let mut archive = open_zip(path)?;
        let member = find_member(archive.file_names(), is_top_level_pkg_info)
            .ok_or_else(|| missing_member(&filename, MEMBER))?;

        debug!(filename, member, "reading sdist metadata from zip");
        read_zip_metadata(&mut archive, &member, options.max_metadata_size, &filename)
    }

    fn read_tar<R: Read>(
        &self,
        decoder: R,
        filename: &str,
        options: &ReaderOptions,
    ) -> Result<RawMetadata> {
        let mut archive = tar::Archive::new(decoder);
        let entries = archive.entries().map_err(|err| {
            PackageError::extraction(filename, format!("not a readable tar archive: {err}"))
        })?;

        for entry in entries {
            let entry = entry.map_err(|err| {
                PackageError::extraction(filename, format!("corrupt tar entry: {err}"))
            })?;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let member = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(_) => continue,
            };
            let parts: Vec<&str> = member
                .split('/')
                .filter(|p| !p.is_empty() && *p != ".")
                .collect();
            if !is_top_level_pkg_info(&parts) {
                continue;
            }

            debug!(filename, member, "reading sdist metadata from tar");
            let size = entry.size();
            let text = read_member_text(entry, size, options.max_metadata_size, filename, &member)?;
            return parse_metadata(&text, filename, &member);
        }

        Err(missing_member(filename, MEMBER))
    }
}

impl MetadataReader for SdistReader {
    fn format(&self) -> DistributionFormat {
        DistributionFormat::SourceDistribution
    }

    fn read(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata> {
        let suffix = ensure_suffix(self.format(), path)?;
        let filename = display_name(path);

        match suffix {
            ".zip" => self.read_zip(path, options),
            ".tar.gz" => self.read_tar(GzDecoder::new(open_file(path)?), &filename, options),
            ".tar.bz2" => self.read_tar(BzDecoder::new(open_file(path)?), &filename, options),
            other => {
                Err(PackageError::extraction(
                    filename,
                    format!("no source distribution reader for {other}"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write};

    use bzip2::{write::BzEncoder, Compression as BzCompression};
    use flate2::{write::GzEncoder, Compression};
    use tempfile::tempdir;

    use super::*;
    use crate::formats::common::testing::{zip_bytes, PKG_INFO};

    fn tar_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), BzCompression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    const ENTRIES: &[(&str, &str)] = &[
        ("shelf-reader-0.1/setup.py", "from setuptools import setup\n"),
        ("shelf-reader-0.1/shelf_reader.egg-info/PKG-INFO", "Name: wrong\nVersion: 9\n"),
        ("shelf-reader-0.1/PKG-INFO", PKG_INFO),
    ];

    #[test]
    fn test_reads_tar_gz() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf-reader-0.1.tar.gz");
        fs::write(&path, gzip(&tar_bytes(ENTRIES))).unwrap();

        let raw = SdistReader.read(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(raw.get("name"), Some("shelf-reader"));
        assert_eq!(raw.get("version"), Some("0.1"));
    }

    #[test]
    fn test_reads_tar_bz2() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf-reader-0.1.tar.bz2");
        fs::write(&path, bzip(&tar_bytes(ENTRIES))).unwrap();

        let raw = SdistReader.read(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(raw.get("name"), Some("shelf-reader"));
    }

    #[test]
    fn test_reads_zip_sdist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf-reader-0.1.zip");
        fs::write(&path, zip_bytes(ENTRIES)).unwrap();

        let raw = SdistReader.read(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(raw.get("summary"), Some("Make sure your collections are in call number order."));
    }

    #[test]
    fn test_wrong_compression_is_extraction_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf-reader-0.1.tar.bz2");
        fs::write(&path, gzip(&tar_bytes(ENTRIES))).unwrap();

        assert!(matches!(
            SdistReader.read(&path, &ReaderOptions::default()),
            Err(PackageError::MetadataExtraction { .. })
        ));
    }

    #[test]
    fn test_missing_pkg_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare-1.0.tar.gz");
        fs::write(&path, gzip(&tar_bytes(&[("bare-1.0/setup.py", "")]))).unwrap();

        let err = SdistReader
            .read(&path, &ReaderOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("no <top>/PKG-INFO found"));
    }
}
