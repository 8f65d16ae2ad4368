//! Helpers shared by the archive readers.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use tracing::trace;
use zip::ZipArchive;

use crate::{
    error::{PackageError, Result},
    formats::DistributionFormat,
    pkginfo::{self, RawMetadata},
};

pub type ZipFileArchive = ZipArchive<BufReader<File>>;

/// Returns the file name of `path` for use in error messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Fails unless `path` carries one of `format`'s suffixes, returning the matched suffix.
pub fn ensure_suffix(format: DistributionFormat, path: &Path) -> Result<&'static str> {
    let filename = display_name(path);
    format.matching_suffix(&filename).ok_or_else(|| {
        let expected: Vec<_> = format.suffixes().collect();
        PackageError::extraction(
            filename,
            format!(
                "{} reader requires a file ending in {}",
                format,
                expected.join(" or ")
            ),
        )
    })
}

pub fn open_file(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| PackageError::extraction(display_name(path), err))
}

pub fn open_zip(path: &Path) -> Result<ZipFileArchive> {
    let reader = open_file(path)?;
    ZipArchive::new(reader).map_err(|err| {
        PackageError::extraction(display_name(path), format!("not a readable zip archive: {err}"))
    })
}

/// Picks the shallowest, then lexically first, member name accepted by `accept`.
pub fn find_member<'a, I, F>(names: I, accept: F) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&[&str]) -> bool,
{
    names
        .into_iter()
        .filter(|name| !name.ends_with('/'))
        .filter(|name| {
            let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
            accept(&parts)
        })
        .min_by_key(|name| (name.matches('/').count(), name.to_string()))
        .map(str::to_string)
}

/// Reads at most `max` bytes of a metadata member as UTF-8 text.
pub fn read_member_text<R: Read>(
    reader: R,
    declared_size: u64,
    max: u64,
    filename: &str,
    member: &str,
) -> Result<String> {
    if declared_size > max {
        return Err(PackageError::extraction(
            filename,
            format!("{member} is {declared_size} bytes, larger than the {max} byte limit"),
        ));
    }

    let mut buf = Vec::new();
    reader
        .take(max.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| PackageError::extraction(filename, format!("reading {member}: {err}")))?;

    if buf.len() as u64 > max {
        return Err(PackageError::extraction(
            filename,
            format!("{member} exceeds the {max} byte limit"),
        ));
    }

    String::from_utf8(buf)
        .map_err(|_| PackageError::extraction(filename, format!("{member} is not valid UTF-8")))
}

/// Loads `member` from a zip archive and parses it as core metadata.
pub fn read_zip_metadata(
    archive: &mut ZipFileArchive,
    member: &str,
    max: u64,
    filename: &str,
) -> Result<RawMetadata> {
    trace!(filename, member, "reading metadata member from zip");
    let file = archive
        .by_name(member)
        .map_err(|err| PackageError::extraction(filename, format!("opening {member}: {err}")))?;
    let size = file.size();
    let text = read_member_text(file, size, max, filename, member)?;
    parse_metadata(&text, filename, member)
}

pub fn parse_metadata(text: &str, filename: &str, member: &str) -> Result<RawMetadata> {
    pkginfo::parse(text)
        .map_err(|reason| PackageError::extraction(filename, format!("{member}: {reason}")))
}

/// Error for an archive that has no metadata member.
pub fn missing_member(filename: &str, expected: &str) -> PackageError {
    PackageError::extraction(filename, format!("no {expected} found in archive"))
}
