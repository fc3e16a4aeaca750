use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::MIGRATOR;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a SQLite connection pool with the default pool settings.
pub async fn create_sqlite_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_sqlite_pool_with(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_CONNECT_TIMEOUT).await
}

/// Creates a SQLite connection pool for the ticket tables.
///
/// The database file is created when missing and runs in WAL mode.
pub async fn create_sqlite_pool_with(
    database_url: &str,
    max_connections: u32,
    connect_timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    let options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(connect_timeout)
        .connect_with(options)
        .await
}

/// Runs all outstanding migrations against the provided connection pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
