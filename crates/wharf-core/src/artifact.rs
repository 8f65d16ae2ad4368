//! Content-addressed artifact storage.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use wharf_db::{
    models::artifact::{Artifact, NewArtifact},
    repository::ArtifactRepository,
};
use wharf_utils::{
    fs::ensure_dir_exists,
    hash::{calculate_checksum, is_hex_digest},
};

use crate::{
    database::DieselDatabase,
    error::{ErrorContext, WharfError},
    utils::timestamp,
    WharfResult,
};

/// A stored artifact readable on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactHandle {
    pub digest: String,
    pub size: u64,
    pub path: PathBuf,
}

/// Read access to stored artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Looks up an artifact by digest; `None` if the store does not hold it.
    fn resolve(&self, digest: &str) -> WharfResult<Option<ArtifactHandle>>;
}

/// Artifact store keeping blobs under `<root>/<digest[0..2]>/<digest>` and their
/// bookkeeping in the `artifacts` table.
#[derive(Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
    db: DieselDatabase,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P, db: DieselDatabase) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            db,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(digest: &str) -> PathBuf {
        Path::new(&digest[..2]).join(digest)
    }

    /// Copies the file at `path` into the store. Importing the same bytes twice returns the
    /// existing artifact.
    pub fn import<P: AsRef<Path>>(&self, path: P) -> WharfResult<ArtifactHandle> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WharfError::InvalidRequest(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let digest = calculate_checksum(path)?;
        let relative = Self::relative_path(&digest);
        let dest = self.root.join(&relative);

        if !dest.is_file() {
            let parent = dest
                .parent()
                .ok_or_else(|| WharfError::Custom(format!("invalid artifact path {}", dest.display())))?;
            ensure_dir_exists(parent)?;

            let mut staged = NamedTempFile::new_in(parent)
                .with_context(|| format!("creating staging file in {}", parent.display()))?;
            let mut source =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            io::copy(&mut source, staged.as_file_mut())
                .with_context(|| format!("copying {} into the artifact store", path.display()))?;
            staged
                .persist(&dest)
                .map_err(|err| err.error)
                .with_context(|| format!("storing artifact {}", dest.display()))?;
            debug!(digest, dest = %dest.display(), "stored artifact blob");
        }

        let size = dest
            .metadata()
            .with_context(|| format!("reading metadata of {}", dest.display()))?
            .len();
        let relative_str = relative.to_string_lossy();
        let created_at = timestamp();
        let artifact = self.db.with_conn(|conn| {
            ArtifactRepository::insert_or_get(
                conn,
                &NewArtifact {
                    digest: &digest,
                    size: size as i64,
                    relative_path: &relative_str,
                    created_at: &created_at,
                },
            )
        })?;

        Ok(ArtifactHandle {
            digest: artifact.digest,
            size,
            path: dest,
        })
    }

    pub fn list(&self) -> WharfResult<Vec<Artifact>> {
        self.db.with_conn(ArtifactRepository::list_all)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn resolve(&self, digest: &str) -> WharfResult<Option<ArtifactHandle>> {
        if !is_hex_digest(digest) {
            return Ok(None);
        }

        let Some(artifact) = self
            .db
            .with_conn(|conn| ArtifactRepository::find_by_digest(conn, digest))?
        else {
            return Ok(None);
        };

        let path = self.root.join(&artifact.relative_path);
        if !path.is_file() {
            warn!(digest, path = %path.display(), "artifact is recorded but its blob is missing");
            return Ok(None);
        }

        Ok(Some(ArtifactHandle {
            digest: artifact.digest,
            size: artifact.size as u64,
            path,
        }))
    }
}
