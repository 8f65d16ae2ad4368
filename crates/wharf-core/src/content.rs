//! Registration of uploaded distributions as content units.
//!
//! [`ContentRegistrar::register`] runs the whole ingestion pipeline for one artifact:
//! format detection, metadata extraction inside a scoped workspace, normalization, and a
//! single transactional insert. Either a complete unit is stored or nothing is.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use wharf_db::{
    models::content::{Content, NewContent, PYTHON_PACKAGE},
    repository::ContentRepository,
};
use wharf_events::{ContentStage, EventSinkHandle, WharfEvent};
use wharf_package::{detect_format, normalize, NormalizedFields, ReaderRegistry};
use wharf_utils::fs::{copy_file, ensure_dir_exists, is_plain_file_name};

use crate::{
    artifact::ArtifactStore,
    database::DieselDatabase,
    error::{ErrorContext, WharfError},
    utils::timestamp,
    WharfResult,
};

/// Request to create a content unit from a stored artifact.
#[derive(Debug, Clone, Default)]
pub struct CreateContent {
    /// Digest of the stored artifact.
    pub artifact: Option<String>,
    /// Name the distribution was uploaded under; selects the format.
    pub filename: Option<String>,
}

impl CreateContent {
    pub fn new(artifact: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            artifact: Some(artifact.into()),
            filename: Some(filename.into()),
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> WharfResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(WharfError::MissingField { field })
}

fn json_list<T: Serialize>(items: &[T]) -> WharfResult<Value> {
    Ok(serde_json::to_value(items)?)
}

pub struct ContentRegistrar {
    db: DieselDatabase,
    store: Arc<dyn ArtifactStore>,
    readers: ReaderRegistry,
    workspace_root: PathBuf,
    events: EventSinkHandle,
}

impl ContentRegistrar {
    pub fn new(
        db: DieselDatabase,
        store: Arc<dyn ArtifactStore>,
        readers: ReaderRegistry,
        workspace_root: PathBuf,
        events: EventSinkHandle,
    ) -> Self {
        Self {
            db,
            store,
            readers,
            workspace_root,
            events,
        }
    }

    /// Creates a content unit from the artifact and filename in `request`.
    ///
    /// # Errors
    ///
    /// * [`WharfError::MissingField`] if either input is absent; nothing else is attempted.
    /// * [`WharfError::Package`] for an unsupported suffix, an unreadable archive, or
    ///   invalid metadata.
    /// * [`WharfError::Validation`] for an unknown artifact or a filename with path
    ///   components.
    /// * [`WharfError::Conflict`] if the artifact was already registered under this filename.
    pub fn register(&self, request: &CreateContent) -> WharfResult<Content> {
        let artifact = required(request.artifact.as_deref(), "artifact")?;
        let filename = required(request.filename.as_deref(), "filename")?;

        match self.ingest(artifact, filename) {
            Ok(unit) => {
                info!(
                    id = unit.id,
                    name = %unit.name,
                    version = %unit.version,
                    packagetype = %unit.packagetype,
                    "created content unit"
                );
                self.events.emit(WharfEvent::ContentCreated {
                    content_id: unit.id,
                    name: unit.name.clone(),
                    version: unit.version.clone(),
                    packagetype: unit.packagetype.clone(),
                    filename: unit.filename.clone(),
                });
                Ok(unit)
            }
            Err(err) => {
                debug!(filename, error = %err, "rejected upload");
                self.events.emit(WharfEvent::ContentRejected {
                    filename: filename.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn stage(&self, filename: &str, stage: ContentStage) {
        self.events.emit(WharfEvent::Content {
            filename: filename.to_string(),
            stage,
        });
    }

    fn ingest(&self, digest: &str, filename: &str) -> WharfResult<Content> {
        self.stage(filename, ContentStage::Detecting);
        let format = detect_format(filename)?;
        if !is_plain_file_name(filename) {
            return Err(WharfError::invalid_field(
                "filename",
                "Filename must not contain path separators.",
            ));
        }

        let handle = self.store.resolve(digest)?.ok_or_else(|| {
            WharfError::invalid_field("artifact", format!("Artifact `{digest}` does not exist."))
        })?;

        let existing = self
            .db
            .with_conn(|conn| ContentRepository::find_by_artifact(conn, &handle.digest, filename))?;
        if existing.is_some() {
            return Err(duplicate(&handle.digest, filename));
        }

        let reader = self.readers.get(format).ok_or_else(|| {
            WharfError::invalid_field("packagetype", format!("No reader is registered for {format}."))
        })?;
        if reader.format() != format {
            return Err(WharfError::invalid_field(
                "packagetype",
                format!(
                    "Reader produced {} metadata for a {format} file.",
                    reader.format()
                ),
            ));
        }

        self.stage(
            filename,
            ContentStage::Extracting {
                packagetype: format.to_string(),
            },
        );
        let raw = {
            ensure_dir_exists(&self.workspace_root)?;
            let workspace = tempfile::Builder::new()
                .prefix("wharf-upload-")
                .tempdir_in(&self.workspace_root)
                .with_context(|| {
                    format!("creating workspace in {}", self.workspace_root.display())
                })?;
            let local = workspace.path().join(filename);
            copy_file(&handle.path, &local)?;
            debug!(filename, %format, path = %local.display(), "reading distribution metadata");
            reader.read(&local, self.readers.options())?
        };

        self.stage(filename, ContentStage::Normalizing);
        let fields = normalize(format, &raw)?;

        self.stage(filename, ContentStage::Persisting);
        self.persist(&handle.digest, filename, &fields)
    }

    fn persist(&self, digest: &str, filename: &str, fields: &NormalizedFields) -> WharfResult<Content> {
        let created_at = timestamp();
        let packagetype = fields.packagetype.as_str();
        let unit = NewContent {
            content_type: PYTHON_PACKAGE,
            artifact_digest: digest,
            filename,
            packagetype,
            name: &fields.name,
            version: &fields.version,
            metadata_version: fields.metadata_version.as_deref(),
            summary: fields.summary.as_deref(),
            description: fields.description.as_deref(),
            keywords: fields.keywords.as_deref(),
            home_page: fields.home_page.as_deref(),
            download_url: fields.download_url.as_deref(),
            author: fields.author.as_deref(),
            author_email: fields.author_email.as_deref(),
            maintainer: fields.maintainer.as_deref(),
            maintainer_email: fields.maintainer_email.as_deref(),
            license: fields.license.as_deref(),
            requires_python: fields.requires_python.as_deref(),
            project_url: fields.project_url.as_deref(),
            platform: fields.platform.as_deref(),
            supported_platform: fields.supported_platform.as_deref(),
            classifiers: json_list(&fields.classifiers)?,
            project_urls: json_list(&fields.project_urls)?,
            requires_dist: json_list(&fields.requires_dist)?,
            provides_dist: json_list(&fields.provides_dist)?,
            obsoletes_dist: json_list(&fields.obsoletes_dist)?,
            requires_external: json_list(&fields.requires_external)?,
            created_at: &created_at,
        };

        let result = self.db.transaction(|conn| {
            let id = ContentRepository::insert(conn, &unit)?;
            ContentRepository::find_by_id(conn, id)?
                .ok_or_else(|| WharfError::Custom(format!("content {id} vanished after insert")))
        });

        match result {
            Err(WharfError::Database(err)) if err.is_conflict() => Err(WharfError::Conflict(format!(
                "Content {} {} ({packagetype}, {filename}) already exists: {err}",
                fields.name, fields.version
            ))),
            other => other,
        }
    }

    /// Loads a content unit by id.
    pub fn find(&self, id: i32) -> WharfResult<Content> {
        self.db
            .with_conn(|conn| ContentRepository::find_by_id(conn, id))?
            .ok_or_else(|| WharfError::not_found("Content", id.to_string()))
    }
}

fn duplicate(digest: &str, filename: &str) -> WharfError {
    WharfError::Conflict(format!(
        "Content from artifact {digest} with filename {filename} already exists"
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use wharf_events::WharfEvent;
    use wharf_package::PackageError;

    use super::*;
    use crate::testing::{zip_bytes, TestEnv, SHELF_READER};

    fn workspace_entries(env: &TestEnv) -> usize {
        fs::read_dir(env.workspace())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_register_round_trip() {
        let env = TestEnv::new();
        let artifact = env.import_wheel("shelf_reader-0.1.dist-info", SHELF_READER);
        let filename = "shelf_reader-0.1-py2-none-any.whl";

        let unit = env
            .registrar()
            .register(&CreateContent::new(&artifact.digest, filename))
            .unwrap();

        let stored = env.registrar().find(unit.id).unwrap();
        assert_eq!(stored, unit);
        assert_eq!(stored.name, "shelf-reader");
        assert_eq!(stored.version, "0.1");
        assert_eq!(stored.packagetype, "bdist_wheel");
        assert_eq!(stored.filename, filename);
        assert_eq!(stored.content_type, PYTHON_PACKAGE);
        assert_eq!(stored.author.as_deref(), Some("Austin Macdonald"));
        assert_eq!(stored.description.as_deref(), Some("Long description."));
        assert_eq!(
            stored
                .classifiers
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            vec![
                "Development Status :: 4 - Beta",
                "Environment :: Console",
                "Development Status :: 4 - Beta"
            ]
        );

        let events = env.events.events();
        assert!(matches!(
            events.last(),
            Some(WharfEvent::ContentCreated { content_id, .. }) if *content_id == unit.id
        ));
        assert_eq!(workspace_entries(&env), 0);
    }

    #[test]
    fn test_duplicate_is_a_conflict() {
        let env = TestEnv::new();
        let artifact = env.import_wheel("shelf_reader-0.1.dist-info", SHELF_READER);
        let request = CreateContent::new(&artifact.digest, "shelf_reader-0.1-py2-none-any.whl");

        env.registrar().register(&request).unwrap();
        let err = env.registrar().register(&request).unwrap_err();
        assert!(matches!(err, WharfError::Conflict(_)));
        assert!(err.is_client_error());

        let count = env.db.with_conn(ContentRepository::count).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_same_identity_under_new_artifact_is_a_conflict() {
        let env = TestEnv::new();
        let first = env.import_wheel("shelf_reader-0.1.dist-info", SHELF_READER);
        // Same metadata, different bytes.
        let second = env.import(
            "other.whl",
            &zip_bytes(&[
                ("shelf_reader-0.1.dist-info/METADATA", SHELF_READER),
                ("extra.txt", "x"),
            ]),
        );
        let filename = "shelf_reader-0.1-py2-none-any.whl";

        env.registrar()
            .register(&CreateContent::new(&first.digest, filename))
            .unwrap();
        let err = env
            .registrar()
            .register(&CreateContent::new(&second.digest, filename))
            .unwrap_err();
        assert!(matches!(err, WharfError::Conflict(_)));
    }

    #[test]
    fn test_missing_inputs_fail_before_extraction() {
        let env = TestEnv::new();
        let registrar = env.registrar();

        let err = registrar
            .register(&CreateContent {
                artifact: None,
                filename: Some("pkg-1.0.tar.gz".into()),
            })
            .unwrap_err();
        assert!(matches!(err, WharfError::MissingField { field: "artifact" }));

        let err = registrar
            .register(&CreateContent {
                artifact: Some("abc".into()),
                filename: Some("  ".into()),
            })
            .unwrap_err();
        assert!(matches!(err, WharfError::MissingField { field: "filename" }));

        assert!(!env.workspace().exists());
        assert!(env.events.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let env = TestEnv::new();
        let artifact = env.import("pkg.rpm", b"not python");

        let err = env
            .registrar()
            .register(&CreateContent::new(&artifact.digest, "pkg-1.0.rpm"))
            .unwrap_err();
        match err {
            WharfError::Package(PackageError::UnsupportedFormat { accepted, .. }) => {
                assert_eq!(accepted.len(), 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!env.workspace().exists());
    }

    #[test]
    fn test_unknown_artifact_and_bad_filename() {
        let env = TestEnv::new();

        let err = env
            .registrar()
            .register(&CreateContent::new("a".repeat(64), "pkg-1.0.tar.gz"))
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "artifact");

        let artifact = env.import_wheel("shelf_reader-0.1.dist-info", SHELF_READER);
        let err = env
            .registrar()
            .register(&CreateContent::new(&artifact.digest, "../escape-1.0.whl"))
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "filename");
    }

    #[test]
    fn test_reader_failure_cleans_workspace() {
        let env = TestEnv::new();
        let artifact = env.import("broken.whl", b"this is not a zip archive");

        let err = env
            .registrar()
            .register(&CreateContent::new(&artifact.digest, "broken-1.0-py3-none-any.whl"))
            .unwrap_err();
        assert!(matches!(
            err,
            WharfError::Package(PackageError::MetadataExtraction { .. })
        ));
        assert_eq!(workspace_entries(&env), 0);

        assert!(matches!(
            env.events.events().last(),
            Some(WharfEvent::ContentRejected { .. })
        ));
        assert_eq!(env.db.with_conn(ContentRepository::count).unwrap(), 0);
    }

    #[test]
    fn test_invalid_metadata_is_rejected() {
        let env = TestEnv::new();
        let artifact = env.import_wheel("nameless-1.0.dist-info", "Metadata-Version: 2.1\n");

        let err = env
            .registrar()
            .register(&CreateContent::new(&artifact.digest, "nameless-1.0-py3-none-any.whl"))
            .unwrap_err();
        let fields: Vec<_> = err.field_errors().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "version"]);
        assert_eq!(workspace_entries(&env), 0);
    }
}
