//! Database connection management.

use std::{path::Path, time::Duration};

use diesel::{sql_query, Connection, RunQueryDsl, SqliteConnection};
use tracing::debug;

use crate::{
    error::{DbError, Result},
    migration::apply_migrations,
};

/// SQLite connection with wharf's pragmas applied and the schema migrated.
pub struct DbConnection {
    conn: SqliteConnection,
}

impl DbConnection {
    /// Opens (creating if needed) the database at `path` and runs pending migrations.
    ///
    /// Enables WAL journaling and foreign keys, and waits up to `busy_timeout` for locks
    /// held by other processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, a pragma is rejected, or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!(path = %path_str, "opening database");
        let mut conn = SqliteConnection::establish(&path_str)?;

        configure(&mut conn, busy_timeout)?;

        apply_migrations(&mut conn).map_err(|e| DbError::MigrationError(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Opens a database connection without running migrations.
    ///
    /// Use this when you know the database is already migrated.
    pub fn open_without_migrations<P: AsRef<Path>>(
        path: P,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let mut conn = SqliteConnection::establish(&path_str)?;
        configure(&mut conn, busy_timeout)?;
        Ok(Self { conn })
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

fn configure(conn: &mut SqliteConnection, busy_timeout: Duration) -> Result<()> {
    let pragmas = [
        "PRAGMA journal_mode = WAL;".to_string(),
        "PRAGMA foreign_keys = ON;".to_string(),
        format!("PRAGMA busy_timeout = {};", busy_timeout.as_millis()),
    ];
    for pragma in pragmas {
        sql_query(&pragma)
            .execute(conn)
            .map_err(|e| DbError::ConnectionError(format!("{pragma} failed: {e}")))?;
    }
    Ok(())
}

impl std::ops::Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::migration::is_up_to_date;

    #[test]
    fn test_open_migrates_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wharf.db");

        let mut db = DbConnection::open(&path, Duration::from_secs(1)).unwrap();
        assert!(is_up_to_date(db.conn()).unwrap());
        drop(db);

        let mut db = DbConnection::open(&path, Duration::from_secs(1)).unwrap();
        assert!(is_up_to_date(db.conn()).unwrap());
    }

    #[test]
    fn test_open_without_migrations_leaves_schema_pending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare.db");

        let mut db = DbConnection::open_without_migrations(&path, Duration::from_secs(1)).unwrap();
        assert!(!is_up_to_date(db.conn()).unwrap());
    }
}
