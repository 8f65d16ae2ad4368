//! Repository pattern implementations for database operations.
//!
//! Each repository is a unit struct with associated functions taking a
//! `&mut SqliteConnection`; transaction boundaries are the caller's:
//!
//! - [`ArtifactRepository`] - stored artifact bookkeeping
//! - [`ContentRepository`] - Python content units and filtered listing
//! - [`LedgerRepository`] - repositories, versions, remotes, publishers, publications
//! - [`JobRepository`] - durable jobs, their resource claims and reservations

pub mod artifacts;
pub mod content;
pub mod jobs;
pub mod ledger;

pub use artifacts::ArtifactRepository;
pub use content::{ContentFilter, ContentRepository, FieldMatch};
pub use jobs::JobRepository;
pub use ledger::{LedgerRepository, RemoteFilter, TimeBound};

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::connection::DbConnection;

    /// Opens a migrated database inside a fresh temporary directory.
    pub fn open_db() -> (TempDir, DbConnection) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbConnection::open(dir.path().join("wharf.db"), Duration::from_secs(1)).unwrap();
        (dir, db)
    }

    pub const NOW: &str = "2025-01-01T00:00:00+00:00";
}
