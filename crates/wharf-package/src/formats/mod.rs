//! Distribution format detection and the per-format metadata readers.

pub mod common;
pub mod egg;
pub mod sdist;
pub mod wheel;
pub mod wininst;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{PackageError, Result};

/// Supported Python distribution formats.
///
/// The string forms are the `packagetype` values used by package indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistributionFormat {
    /// Built wheel archive.
    #[serde(rename = "bdist_wheel")]
    Wheel,
    /// Windows installer executable with an appended zip payload.
    #[serde(rename = "bdist_wininst")]
    LegacyInstaller,
    /// Built egg archive.
    #[serde(rename = "bdist_egg")]
    Egg,
    /// Source distribution tarball or zip.
    #[serde(rename = "sdist")]
    SourceDistribution,
}

/// Recognized filename suffixes in matching order.
///
/// Compound suffixes come first so `.tar.gz` is never mistaken for a shorter match.
pub const DIST_EXTENSIONS: &[(&str, DistributionFormat)] = &[
    (".tar.bz2", DistributionFormat::SourceDistribution),
    (".tar.gz", DistributionFormat::SourceDistribution),
    (".whl", DistributionFormat::Wheel),
    (".exe", DistributionFormat::LegacyInstaller),
    (".egg", DistributionFormat::Egg),
    (".zip", DistributionFormat::SourceDistribution),
];

impl DistributionFormat {
    pub const ALL: [DistributionFormat; 4] = [
        DistributionFormat::Wheel,
        DistributionFormat::LegacyInstaller,
        DistributionFormat::Egg,
        DistributionFormat::SourceDistribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionFormat::Wheel => "bdist_wheel",
            DistributionFormat::LegacyInstaller => "bdist_wininst",
            DistributionFormat::Egg => "bdist_egg",
            DistributionFormat::SourceDistribution => "sdist",
        }
    }

    /// Suffixes that identify this format.
    pub fn suffixes(&self) -> impl Iterator<Item = &'static str> + '_ {
        DIST_EXTENSIONS
            .iter()
            .filter(move |(_, format)| format == self)
            .map(|(suffix, _)| *suffix)
    }

    /// Returns the suffix of `filename` that belongs to this format, if any.
    pub fn matching_suffix(&self, filename: &str) -> Option<&'static str> {
        self.suffixes().find(|suffix| has_suffix(filename, suffix))
    }
}

impl fmt::Display for DistributionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| format!("unknown package type `{s}`"))
    }
}

/// All accepted suffixes, in matching order.
pub fn accepted_suffixes() -> Vec<&'static str> {
    DIST_EXTENSIONS.iter().map(|(suffix, _)| *suffix).collect()
}

// A bare suffix such as ".whl" is not a distribution.
fn has_suffix(filename: &str, suffix: &str) -> bool {
    filename.len() > suffix.len() && filename.ends_with(suffix)
}

/// Detects the distribution format of `filename` from its suffix.
///
/// # Errors
///
/// Returns [`PackageError::UnsupportedFormat`] listing every accepted suffix when none match.
pub fn detect_format(filename: &str) -> Result<DistributionFormat> {
    DIST_EXTENSIONS
        .iter()
        .find(|(suffix, _)| has_suffix(filename, suffix))
        .map(|(_, format)| *format)
        .ok_or_else(|| {
            PackageError::UnsupportedFormat {
                filename: filename.to_string(),
                accepted: accepted_suffixes(),
            }
        })
}
