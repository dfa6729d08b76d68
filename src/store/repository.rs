//! Ledger Store Repository
//!
//! Persists ledger entries in SQLite. Every mutation runs in its own
//! transaction; an uncommitted transaction is rolled back when dropped,
//! so a failed call leaves no partial row behind.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    to_money, validate_amount, DomainError, Entry, EntryChanges, Money, NewEntry,
};

use super::totals::{month_range, LedgerTotals, MonthlyTotals};
use super::StoreError;

/// Column order shared by every entry query
const SELECT_ENTRY: &str =
    "SELECT id, occurred_on, amount, kind, commission, owner_id FROM entries";

/// Raw entry row as stored
type EntryRow = (i64, NaiveDate, String, String, String, Option<Uuid>);

/// Ledger store over a SQLite pool.
///
/// Operations that take `owner: Option<Uuid>` are unscoped when `None`.
/// With `Some(owner)`, entries of other owners behave as if absent.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Create a new LedgerStore with a database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist a new entry and return its id
    pub async fn insert(&self, entry: &NewEntry) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO entries (occurred_on, amount, kind, commission, owner_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.occurred_at())
        .bind(entry.amount().to_string())
        .bind(entry.kind().as_str())
        .bind(entry.commission().to_string())
        .bind(entry.owner())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        tracing::info!(
            entry_id = id,
            kind = %entry.kind(),
            amount = %entry.amount(),
            commission = %entry.commission(),
            "Entry inserted"
        );

        Ok(id)
    }

    /// Apply a partial update, re-deriving commission when amount or kind
    /// changes. Lost races with a concurrent writer are retried.
    pub async fn update(
        &self,
        id: i64,
        changes: &EntryChanges,
        owner: Option<Uuid>,
    ) -> Result<Entry, StoreError> {
        const MAX_RETRIES: u32 = 3;

        for attempt in 0..MAX_RETRIES {
            match self.try_update(id, changes, owner).await {
                Ok(entry) => return Ok(entry),
                Err(e) if e.is_concurrency_conflict() => {
                    if attempt + 1 == MAX_RETRIES {
                        break;
                    }
                    tracing::warn!(
                        entry_id = id,
                        "Concurrency conflict, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::MaxRetriesExceeded)
    }

    /// Single update attempt: read, merge, write guarded by the values read
    async fn try_update(
        &self,
        id: i64,
        changes: &EntryChanges,
        owner: Option<Uuid>,
    ) -> Result<Entry, StoreError> {
        if changes.is_empty() {
            return self.get(id, owner).await;
        }

        let mut tx = self.pool.begin().await?;

        // Claim the write lock before reading. A reader that later upgrades
        // cannot wait on busy_timeout and fails straight away.
        sqlx::query("UPDATE entries SET id = id WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_if_busy(e, id))?;

        let current = fetch_entry(&mut *tx, id, owner)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let updated = current.apply(changes);

        let rows_affected = sqlx::query(
            r#"
            UPDATE entries
            SET occurred_on = ?, amount = ?, kind = ?, commission = ?
            WHERE id = ? AND occurred_on = ? AND amount = ? AND kind = ? AND commission = ?
            "#,
        )
        .bind(updated.occurred_at)
        .bind(updated.amount.to_string())
        .bind(updated.kind.as_str())
        .bind(updated.commission.to_string())
        .bind(id)
        .bind(current.occurred_at)
        .bind(current.amount.to_string())
        .bind(current.kind.as_str())
        .bind(current.commission.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_if_busy(e, id))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::ConcurrencyConflict { id });
        }

        tx.commit().await.map_err(|e| conflict_if_busy(e, id))?;

        tracing::info!(
            entry_id = id,
            kind = %updated.kind,
            amount = %updated.amount,
            commission = %updated.commission,
            recomputed = changes.touches_commission(),
            "Entry updated"
        );

        Ok(updated)
    }

    /// Remove an entry. Deleting an absent id is `NotFound`, every time.
    pub async fn delete(&self, id: i64, owner: Option<Uuid>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM entries WHERE id = ");
        query.push_bind(id);
        push_owner_scope(&mut query, owner);

        let rows_affected = query.build().execute(&mut *tx).await?.rows_affected();
        if rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }

        tx.commit().await?;

        tracing::info!(entry_id = id, "Entry deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get one entry by id
    pub async fn get(&self, id: i64, owner: Option<Uuid>) -> Result<Entry, StoreError> {
        let mut conn = self.pool.acquire().await?;

        fetch_entry(&mut *conn, id, owner)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    /// All entries in scope, newest date first, ties in insertion order
    pub async fn list_all(&self, owner: Option<Uuid>) -> Result<Vec<Entry>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
        if let Some(owner) = owner {
            query.push(" WHERE owner_id = ").push_bind(owner);
        }
        query.push(" ORDER BY occurred_on DESC, id ASC");

        let rows: Vec<EntryRow> = query.build_query_as().fetch_all(&self.pool).await?;

        tracing::debug!(count = rows.len(), owner = ?owner, "Entries listed");

        rows.into_iter().map(entry_from_row).collect()
    }

    /// Sum of amounts per kind for entries dated in the given month
    pub async fn totals(
        &self,
        year: i32,
        month: u32,
        owner: Option<Uuid>,
    ) -> Result<MonthlyTotals, StoreError> {
        let (start, end) = month_range(year, month)?;

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT kind, amount FROM entries WHERE occurred_on >= ");
        query.push_bind(start);
        query.push(" AND occurred_on < ").push_bind(end);
        push_owner_scope(&mut query, owner);

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut totals = MonthlyTotals::default();
        for (kind, amount) in rows {
            let invalid = |e: DomainError| StoreError::InvalidRow(e.to_string());
            totals.add(kind.parse().map_err(invalid)?, stored_amount(&amount).map_err(invalid)?);
        }

        tracing::debug!(
            year,
            month,
            owner = ?owner,
            sale = %totals.sale,
            presentation = %totals.presentation,
            "Monthly totals computed"
        );

        Ok(totals)
    }

    /// Grand totals of amount and commission over every entry in scope
    pub async fn ledger_totals(&self, owner: Option<Uuid>) -> Result<LedgerTotals, StoreError> {
        let entries = self.list_all(owner).await?;
        Ok(sum_entries(&entries))
    }
}

/// Sum amounts and commissions of already loaded entries
pub fn sum_entries(entries: &[Entry]) -> LedgerTotals {
    LedgerTotals {
        amount: entries.iter().map(|e| e.amount).sum(),
        commission: entries.iter().map(|e| e.commission).sum(),
    }
}

async fn fetch_entry(
    conn: &mut SqliteConnection,
    id: i64,
    owner: Option<Uuid>,
) -> Result<Option<Entry>, StoreError> {
    let mut query = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
    query.push(" WHERE id = ").push_bind(id);
    push_owner_scope(&mut query, owner);

    let row: Option<EntryRow> = query.build_query_as().fetch_optional(&mut *conn).await?;
    row.map(entry_from_row).transpose()
}

/// Appends `AND owner_id = ?` after an existing WHERE clause
fn push_owner_scope(query: &mut QueryBuilder<'_, Sqlite>, owner: Option<Uuid>) {
    if let Some(owner) = owner {
        query.push(" AND owner_id = ").push_bind(owner);
    }
}

fn entry_from_row(row: EntryRow) -> Result<Entry, StoreError> {
    let (id, occurred_at, amount, kind, commission, owner) = row;
    let invalid = move |e: DomainError| StoreError::InvalidRow(format!("entry {}: {}", id, e));

    Ok(Entry {
        id,
        occurred_at,
        amount: stored_amount(&amount).map_err(invalid)?,
        kind: kind.parse().map_err(invalid)?,
        commission: to_money(&commission).map_err(invalid)?,
        owner,
    })
}

/// Amounts read back are held to the same bounds as amounts written, which
/// keeps every sum of stored amounts far from `Decimal` overflow.
fn stored_amount(raw: &str) -> Result<Money, DomainError> {
    let amount = to_money(raw)?;
    validate_amount(amount)?;
    Ok(amount)
}

/// SQLite reports lock contention as SQLITE_BUSY (5) or its extended codes
fn conflict_if_busy(err: sqlx::Error, id: i64) -> StoreError {
    let busy = err
        .as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff == 5)
        .unwrap_or(false);

    if busy {
        StoreError::ConcurrencyConflict { id }
    } else {
        StoreError::Database(err)
    }
}
