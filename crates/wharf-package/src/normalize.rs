//! Conversion of raw core metadata into the canonical content fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FieldError, PackageError, Result},
    formats::DistributionFormat,
    pkginfo::RawMetadata,
};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$")
        .expect("unable to compile project name regex")
});

const REQUIRED: &str = "This field is required.";

/// One trove classifier attached to a content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    pub name: String,
}

impl Classifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Validated metadata ready to be persisted as a content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFields {
    pub name: String,
    pub version: String,
    pub packagetype: DistributionFormat,
    pub metadata_version: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub project_url: Option<String>,
    pub platform: Option<String>,
    pub supported_platform: Option<String>,
    pub classifiers: Vec<Classifier>,
    pub project_urls: Vec<String>,
    pub requires_dist: Vec<String>,
    pub provides_dist: Vec<String>,
    pub obsoletes_dist: Vec<String>,
    pub requires_external: Vec<String>,
}

/// Builds [`NormalizedFields`] from the field bag a reader produced for `format`.
///
/// Values of `UNKNOWN` (the placeholder old build tools write for unset fields) and empty
/// values count as absent. Classifiers keep their file order, duplicates included.
///
/// # Errors
///
/// Returns [`PackageError::Validation`] listing every invalid or missing required field.
pub fn normalize(format: DistributionFormat, raw: &RawMetadata) -> Result<NormalizedFields> {
    let mut errors = Vec::new();

    let name = match optional(raw, "name") {
        None => {
            errors.push(FieldError::new("name", REQUIRED));
            None
        }
        Some(name) if !NAME_RE.is_match(&name) => {
            errors.push(FieldError::new(
                "name",
                format!("`{name}` is not a valid project name."),
            ));
            None
        }
        Some(name) => Some(name),
    };

    let version = match optional(raw, "version") {
        None => {
            errors.push(FieldError::new("version", REQUIRED));
            None
        }
        Some(version) if version.contains(char::is_whitespace) => {
            errors.push(FieldError::new(
                "version",
                format!("`{version}` must not contain whitespace."),
            ));
            None
        }
        Some(version) => Some(version),
    };

    let (Some(name), Some(version)) = (name, version) else {
        return Err(PackageError::Validation(errors));
    };

    let description = optional(raw, "description").or_else(|| {
        raw.body()
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .map(str::to_string)
    });

    let project_urls = list(raw, "project_url");

    Ok(NormalizedFields {
        name,
        version,
        packagetype: format,
        metadata_version: optional(raw, "metadata_version"),
        summary: optional(raw, "summary"),
        description,
        keywords: optional(raw, "keywords"),
        home_page: optional(raw, "home_page"),
        download_url: optional(raw, "download_url"),
        author: optional(raw, "author"),
        author_email: optional(raw, "author_email"),
        maintainer: optional(raw, "maintainer"),
        maintainer_email: optional(raw, "maintainer_email"),
        license: optional(raw, "license"),
        requires_python: optional(raw, "requires_python"),
        project_url: project_urls.first().cloned(),
        platform: joined(raw, "platform"),
        supported_platform: joined(raw, "supported_platform"),
        classifiers: list(raw, "classifier")
            .into_iter()
            .map(Classifier::new)
            .collect(),
        project_urls,
        requires_dist: list(raw, "requires_dist"),
        provides_dist: list(raw, "provides_dist"),
        obsoletes_dist: list(raw, "obsoletes_dist"),
        requires_external: list(raw, "requires_external"),
    })
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != "UNKNOWN").then_some(value)
}

fn optional(raw: &RawMetadata, key: &str) -> Option<String> {
    raw.get(key).and_then(present).map(str::to_string)
}

fn list(raw: &RawMetadata, key: &str) -> Vec<String> {
    raw.get_all(key)
        .iter()
        .filter_map(|value| present(value))
        .map(str::to_string)
        .collect()
}

fn joined(raw: &RawMetadata, key: &str) -> Option<String> {
    let values = list(raw, key);
    (!values.is_empty()).then(|| values.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkginfo;

    fn raw(text: &str) -> RawMetadata {
        pkginfo::parse(text).unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let metadata = raw("Metadata-Version: 2.1
Name: shelf-reader
Version: 0.1
Summary: Make sure your collections are in call number order.
Home-page: https://github.com/asmacdo/shelf-reader
Author: Austin Macdonald
Author-email: asmacdo@gmail.com
License: UNKNOWN
Keywords: library shelving
Platform: linux
Platform: macos
Classifier: Environment :: Console
Classifier: Development Status :: 4 - Beta
Classifier: Environment :: Console
Project-URL: Source, https://github.com/asmacdo/shelf-reader
Requires-Dist: click

The long description.
");
        let fields = normalize(DistributionFormat::Wheel, &metadata).unwrap();

        assert_eq!(fields.name, "shelf-reader");
        assert_eq!(fields.version, "0.1");
        assert_eq!(fields.packagetype, DistributionFormat::Wheel);
        assert_eq!(fields.metadata_version.as_deref(), Some("2.1"));
        assert_eq!(
            fields.home_page.as_deref(),
            Some("https://github.com/asmacdo/shelf-reader")
        );
        assert_eq!(fields.license, None);
        assert_eq!(fields.keywords.as_deref(), Some("library shelving"));
        assert_eq!(fields.platform.as_deref(), Some("linux, macos"));
        assert_eq!(
            fields.classifiers,
            vec![
                Classifier::new("Environment :: Console"),
                Classifier::new("Development Status :: 4 - Beta"),
                Classifier::new("Environment :: Console"),
            ]
        );
        assert_eq!(
            fields.project_url.as_deref(),
            Some("Source, https://github.com/asmacdo/shelf-reader")
        );
        assert_eq!(fields.requires_dist, vec!["click".to_string()]);
        assert_eq!(fields.description.as_deref(), Some("The long description."));
    }

    #[test]
    fn test_description_header_wins_over_body() {
        let metadata = raw("Name: pkg\nVersion: 1.0\nDescription: header text\n\nbody text\n");
        let fields = normalize(DistributionFormat::SourceDistribution, &metadata).unwrap();
        assert_eq!(fields.description.as_deref(), Some("header text"));
        assert_eq!(fields.summary, None);
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let metadata = raw("Summary: nothing else\n");
        match normalize(DistributionFormat::Egg, &metadata) {
            Err(PackageError::Validation(errors)) => {
                assert_eq!(
                    errors,
                    vec![
                        FieldError::new("name", REQUIRED),
                        FieldError::new("version", REQUIRED),
                    ]
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_name_counts_as_missing() {
        let metadata = raw("Name: UNKNOWN\nVersion: 1.0\n");
        let err = normalize(DistributionFormat::Egg, &metadata).unwrap_err();
        assert!(err.to_string().contains("name: This field is required."));
    }

    #[test]
    fn test_invalid_name_and_version() {
        for name in ["-leading", "trailing.", "with space", "ü"] {
            let metadata = raw(&format!("Name: {name}\nVersion: 1.0\n"));
            assert!(
                normalize(DistributionFormat::Wheel, &metadata).is_err(),
                "{name} should be rejected"
            );
        }

        let mut metadata = RawMetadata::new();
        metadata.insert("Name", "Valid.Name_2");
        metadata.insert("Version", "1.0 beta");
        match normalize(DistributionFormat::Wheel, &metadata) {
            Err(PackageError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "version");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_single_character_and_mixed_case_names() {
        for name in ["a", "Z", "Django", "zope.interface"] {
            let metadata = raw(&format!("Name: {name}\nVersion: 2!1.0.post1\n"));
            let fields = normalize(DistributionFormat::Wheel, &metadata).unwrap();
            assert_eq!(fields.name, name);
            assert_eq!(fields.version, "2!1.0.post1");
        }
    }
}
