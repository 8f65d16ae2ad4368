//! Windows installer (`.exe`, bdist_wininst) metadata reader.
//!
//! The installer is an executable stub followed by a zip archive whose `PURELIB/` or
//! `PLATLIB/` tree contains the package's `.egg-info` metadata, either as a single file or
//! as a directory holding `PKG-INFO`.

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

fn is_egg_info(parts: &[&str]) -> bool {
    match parts {
        ["PURELIB" | "PLATLIB", file] => file.ends_with(".egg-info"),
        ["PURELIB" | "PLATLIB", dir, "PKG-INFO"] => dir.ends_with(".egg-info"),
        _ => false,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WininstReader;

impl MetadataReader for WininstReader {
    fn format(&self) -> DistributionFormat {
        DistributionFormat::LegacyInstaller
    }

    fn read(&self, path: &Path, options: &ReaderOptions) -> Result<RawMetadata> {
        ensure_suffix(self.format(), path)?;
        let filename = display_name(path);
        let mut archive = open_zip(path)?;

        let member = find_member(archive.file_names(), is_egg_info)
            .ok_or_else(|| missing_member(&filename, "*.egg-info"))?;

        debug!(filename, member, "reading installer metadata");
        read_zip_metadata(&mut archive, &member, options.max_metadata_size, &filename)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::formats::common::testing::{zip_bytes, PKG_INFO};

    fn installer(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = b"MZ\x90\x00fake executable stub".to_vec();
        bytes.extend(zip_bytes(entries));
        bytes
    }

    #[test]
    fn test_reads_egg_info_file_after_stub() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf-reader-0.1.win32.exe");
        fs::write(
            &path,
            installer(&[
                ("PURELIB/shelf_reader.py", ""),
                ("PURELIB/shelf_reader-0.1-py2.7.egg-info", PKG_INFO),
            ]),
        )
        .unwrap();

        let raw = WininstReader.read(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(raw.get("name"), Some("shelf-reader"));
    }

    #[test]
    fn test_reads_egg_info_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("native-2.0.win-amd64.exe");
        fs::write(
            &path,
            installer(&[("PLATLIB/native-2.0.egg-info/PKG-INFO", "Name: native\nVersion: 2.0\n")]),
        )
        .unwrap();

        let raw = WininstReader.read(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(raw.get("version"), Some("2.0"));
    }

    #[test]
    fn test_plain_executable_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tool.exe");
        fs::write(&path, b"MZ just a program").unwrap();
        assert!(WininstReader
            .read(&path, &ReaderOptions::default())
            .is_err());
    }

    #[test]
    fn test_matcher() {
        assert!(is_egg_info(&["PURELIB", "x-1.0.egg-info"]));
        assert!(is_egg_info(&["PLATLIB", "x.egg-info", "PKG-INFO"]));
        assert!(!is_egg_info(&["x.egg-info"]));
        assert!(!is_egg_info(&["PURELIB", "x.egg-info", "SOURCES.txt"]));
        assert!(!is_egg_info(&["SCRIPTS", "x-1.0.egg-info"]));
        assert!(!is_egg_info(&["DATA", "x.egg-info", "PKG-INFO"]));
    }

    #[test]
    fn test_ignores_egg_info_outside_lib_trees() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stray-0.1.win32.exe");
        fs::write(
            &path,
            installer(&[("SCRIPTS/stray-0.1.egg-info", PKG_INFO)]),
        )
        .unwrap();

        assert!(WininstReader
            .read(&path, &ReaderOptions::default())
            .is_err());
    }
}
