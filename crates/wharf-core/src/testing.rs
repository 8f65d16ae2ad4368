//! Shared fixtures for the crate's tests.

use std::{
    io::{Cursor, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use tempfile::TempDir;
use wharf_events::{CollectorSink, EventSinkHandle};
use wharf_package::ReaderRegistry;
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::{
    artifact::{ArtifactHandle, FileArtifactStore},
    content::ContentRegistrar,
    database::DieselDatabase,
};

pub struct TestEnv {
    pub dir: TempDir,
    pub db: DieselDatabase,
    pub store: Arc<FileArtifactStore>,
    pub events: Arc<CollectorSink>,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = DieselDatabase::open(dir.path().join("db/wharf.db"), Duration::from_secs(5))
            .unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path().join("artifacts"), db.clone()));
        Self {
            dir,
            db,
            store,
            events: Arc::new(CollectorSink::default()),
        }
    }

    pub fn sink(&self) -> EventSinkHandle {
        self.events.clone()
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }

    pub fn registrar(&self) -> ContentRegistrar {
        ContentRegistrar::new(
            self.db.clone(),
            self.store.clone(),
            ReaderRegistry::with_defaults(),
            self.workspace(),
            self.sink(),
        )
    }

    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join("uploads").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Imports an in-memory blob into the artifact store.
    pub fn import(&self, name: &str, contents: &[u8]) -> ArtifactHandle {
        let path = self.write_file(name, contents);
        self.store.import(path).unwrap()
    }

    /// Imports a wheel whose METADATA is `metadata`.
    pub fn import_wheel(&self, dist_info: &str, metadata: &str) -> ArtifactHandle {
        let member = format!("{dist_info}/METADATA");
        self.import(
            &format!("{dist_info}.whl"),
            &zip_bytes(&[("pkg/__init__.py", ""), (&member, metadata)]),
        )
    }
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub const SHELF_READER: &str = "Metadata-Version: 2.1
Name: shelf-reader
Version: 0.1
Summary: Make sure your collections are in call number order.
Author: Austin Macdonald
Keywords: library shelving
Classifier: Development Status :: 4 - Beta
Classifier: Environment :: Console
Classifier: Development Status :: 4 - Beta

Long description.
";
