use std::error::Error;

use diesel::{sql_query, RunQueryDsl, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs every pending migration.
///
/// A migration whose objects already exist (a database created before its version was
/// recorded) is marked as applied and skipped.
pub fn apply_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    loop {
        match conn.run_pending_migrations(MIGRATIONS) {
            Ok(applied) => {
                for version in applied {
                    debug!(%version, "applied migration");
                }
                break;
            }
            Err(e) if e.to_string().contains("already exists") => {
                mark_first_pending(conn)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn mark_first_pending(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let pending = conn.pending_migrations(MIGRATIONS)?;
    if let Some(first) = pending.first() {
        debug!(version = %first.name().version(), "marking existing migration as applied");
        sql_query("INSERT INTO __diesel_schema_migrations (version) VALUES (?1)")
            .bind::<diesel::sql_types::Text, _>(first.name().version().to_string())
            .execute(conn)?;
    }

    Ok(())
}

/// Returns true when every embedded migration has been applied.
pub fn is_up_to_date(
    conn: &mut SqliteConnection,
) -> Result<bool, Box<dyn Error + Send + Sync + 'static>> {
    Ok(conn.pending_migrations(MIGRATIONS)?.is_empty())
}
