//! Common test utilities

#![allow(dead_code)]

use commission_ledger::{create_entry, db, LedgerStore, NewEntry};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Setup test database - fresh in-memory SQLite with the schema applied
pub async fn setup_test_db() -> SqlitePool {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");

    db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");

    pool
}

/// SQLite URL for a database file inside `dir`
pub fn file_db_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("ledger.db").display())
}

/// Setup file-backed database with a real multi-connection pool
pub async fn setup_file_db(dir: &TempDir, max_connections: u32) -> SqlitePool {
    let pool = db::connect(&file_db_url(dir), max_connections)
        .await
        .expect("Failed to open database file");

    db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");

    pool
}

pub async fn setup_test_store() -> LedgerStore {
    LedgerStore::new(setup_test_db().await)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// Unsaved entry dated on the given day
pub fn new_entry(amount: &str, kind: &str, on: NaiveDate) -> NewEntry {
    create_entry(amount, kind, Some(on)).expect("valid test entry")
}
