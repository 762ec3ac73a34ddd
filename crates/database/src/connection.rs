use crate::error::DbError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Establishes a connection pool to the SQLite database at `database_url`.
///
/// File databases are created if missing. In-memory databases live only as
/// long as their connection, so they get a single connection that is never
/// recycled.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
    if database_url.trim().is_empty() {
        return Err(DbError::ConnectionConfigError(
            "DATABASE_URL must be set.".to_string(),
        ));
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DbError::ConnectionConfigError(e.to_string()))?
        .create_if_missing(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(5));
    let pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;
    tracing::debug!(url = %database_url, in_memory, "Database pool ready.");
    Ok(pool)
}

/// A fresh, migrated in-memory database. Used by tests across the workspace.
pub async fn connect_in_memory() -> Result<SqlitePool, DbError> {
    let pool = connect("sqlite::memory:", 1).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Applies the embedded migrations so the schema is up to date at startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
