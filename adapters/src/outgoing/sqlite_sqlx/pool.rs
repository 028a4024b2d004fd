use std::path::Path;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use pixel_hawk_application::error::{AppError, AppResult};

/// Open (creating if missing) the database file and bring the schema up
/// to date. One writer at a time; readers proceed concurrently under WAL.
pub async fn open_database(path: &Path, pool_size: u32) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to open database at {}: {}", path.display(), e),
        })?;

    run_migrations(&pool).await?;
    info!("database ready at {}", path.display());
    Ok(pool)
}

/// A private in-memory database, for tests. Single connection: each
/// `sqlite::memory:` connection would otherwise see its own database.
pub async fn open_in_memory() -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to open in-memory database: {}", e),
        })?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to run migrations: {}", e),
        })
}
