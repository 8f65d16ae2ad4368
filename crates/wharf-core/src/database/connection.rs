//! Database connection management.

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use diesel::{Connection as DieselConnection, SqliteConnection};
use wharf_db::connection::DbConnection;

use crate::{error::WharfError, WharfResult};

/// Thread-safe handle to the wharf database.
///
/// Every clone shares one connection; callers serialize on its mutex.
pub struct DieselDatabase {
    conn: Arc<Mutex<DbConnection>>,
}

impl DieselDatabase {
    /// Opens the database at `path`, running pending migrations.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> WharfResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            wharf_utils::fs::ensure_dir_exists(parent)?;
        }
        let conn = DbConnection::open(path, busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Gets a mutable reference to the underlying connection.
    /// Locks the mutex and returns a guard.
    pub fn conn(&self) -> WharfResult<std::sync::MutexGuard<'_, DbConnection>> {
        self.conn.lock().map_err(|_| WharfError::PoisonError)
    }

    /// Executes a function with the connection.
    pub fn with_conn<F, T>(&self, f: F) -> WharfResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> diesel::QueryResult<T>,
    {
        let mut conn = self.conn()?;
        Ok(f(conn.conn())?)
    }

    /// Executes a function within an immediate (write-locking) transaction.
    ///
    /// The transaction rolls back if `f` returns an error.
    pub fn transaction<F, T>(&self, f: F) -> WharfResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> WharfResult<T>,
    {
        let mut conn = self.conn()?;
        conn.conn().immediate_transaction(f)
    }

    /// Executes a read-only function within a deferred transaction, for a consistent view
    /// across several queries.
    pub fn read<F, T>(&self, f: F) -> WharfResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> WharfResult<T>,
    {
        let mut conn = self.conn()?;
        conn.conn().transaction(f)
    }
}

impl Clone for DieselDatabase {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use wharf_db::repository::LedgerRepository;

    use super::*;
    use crate::testing::TestEnv;

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let env = TestEnv::new();

        let result: WharfResult<()> = env.db.transaction(|conn| {
            LedgerRepository::create_repository(conn, "pypi", "now")?;
            Err(WharfError::Custom("abort".into()))
        });
        assert!(result.is_err());

        let repos = env
            .db
            .with_conn(LedgerRepository::list_repositories)
            .unwrap();
        assert!(repos.is_empty());
    }

    #[test]
    fn test_unique_violation_surfaces_as_conflict() {
        let env = TestEnv::new();
        env.db
            .transaction(|conn| Ok(LedgerRepository::create_repository(conn, "pypi", "now")?))
            .unwrap();

        let err = env
            .db
            .with_conn(|conn| LedgerRepository::create_repository(conn, "pypi", "now"))
            .unwrap_err();
        assert!(matches!(err, WharfError::Database(ref db) if db.is_conflict()));
    }
}
