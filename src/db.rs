//! Database module
//!
//! SQLite pool construction and schema utilities.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Schema statements, applied in order. Monetary columns are TEXT so the
/// canonical two-place strings survive round-trips untouched.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        occurred_on TEXT NOT NULL DEFAULT (DATE('now')),
        amount TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('sale', 'presentation')),
        commission TEXT NOT NULL,
        owner_id BLOB
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_entries_occurred_on ON entries(occurred_on)",
    "CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner_id, occurred_on)",
];

/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Required tables
const REQUIRED_TABLES: &[&str] = &["entries"];

/// Open a pool for `database_url`, creating the database file if needed.
///
/// WAL mode: readers never block the single writer.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Open a private in-memory database.
///
/// Every SQLite memory connection is its own database, so the pool holds
/// exactly one connection and never recycles it.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
}

/// Create tables and indexes that do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!("Database schema initialized");
    Ok(())
}

/// Verify database connectivity
pub async fn verify_connection(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if count == 0 {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_lifecycle() {
        let pool = connect_in_memory().await.unwrap();
        verify_connection(&pool).await.unwrap();

        assert!(!check_schema(&pool).await.unwrap());

        init_schema(&pool).await.unwrap();
        assert!(check_schema(&pool).await.unwrap());

        // idempotent
        init_schema(&pool).await.unwrap();
        assert!(check_schema(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_kind_check_constraint() {
        let pool = connect_in_memory().await.unwrap();
        init_schema(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO entries (amount, kind, commission) VALUES ('1.00', 'refund', '0.00')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }
}
