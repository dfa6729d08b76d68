//! Integration tests for the ledger store

use std::str::FromStr;
use std::time::Duration;

use commission_ledger::{db, EntryChanges, Kind, LedgerStore, Money, StoreError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

mod common;

use common::{date, file_db_url, new_entry, setup_file_db, setup_test_db, setup_test_store};

fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_insert_and_list_round_trip() {
    let store = setup_test_store().await;

    let entry = new_entry("1234.56", "presentation", date(2024, 5, 3));
    let id = store.insert(&entry).await.unwrap();

    let entries = store.list_all(None).await.unwrap();
    assert_eq!(entries.len(), 1);

    let stored = &entries[0];
    assert_eq!(stored.id, id);
    assert_eq!(stored.occurred_at, date(2024, 5, 3));
    assert_eq!(stored.amount, entry.amount());
    assert_eq!(stored.commission, entry.commission());
    assert_eq!(stored.amount.to_string(), "1234.56");
    assert_eq!(stored.commission.to_string(), "37.04");
    assert_eq!(stored.kind, Kind::Presentation);
    assert!(stored.is_consistent());
}

#[tokio::test]
async fn test_ids_are_assigned_and_never_reused() {
    let store = setup_test_store().await;

    let first = store.insert(&new_entry("1", "sale", date(2024, 1, 1))).await.unwrap();
    let second = store.insert(&new_entry("2", "sale", date(2024, 1, 1))).await.unwrap();
    assert!(second > first);

    store.delete(second, None).await.unwrap();
    let third = store.insert(&new_entry("3", "sale", date(2024, 1, 1))).await.unwrap();
    assert!(third > second);
}

#[tokio::test]
async fn test_list_orders_by_date_desc_then_id() {
    let store = setup_test_store().await;

    let a = store.insert(&new_entry("1", "sale", date(2024, 5, 1))).await.unwrap();
    let b = store.insert(&new_entry("2", "sale", date(2024, 6, 1))).await.unwrap();
    let c = store.insert(&new_entry("3", "sale", date(2024, 5, 1))).await.unwrap();
    let d = store.insert(&new_entry("4", "sale", date(2023, 12, 31))).await.unwrap();

    let ids: Vec<i64> = store.list_all(None).await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![b, a, c, d]);
}

#[tokio::test]
async fn test_update_amount_keeps_stored_kind() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let changes = EntryChanges::new().with_amount(money("200")).unwrap();
    let updated = store.update(id, &changes, None).await.unwrap();

    assert_eq!(updated.kind, Kind::Sale);
    assert_eq!(updated.commission.value(), dec!(4.00));

    let reloaded = store.get(id, None).await.unwrap();
    assert_eq!(reloaded, updated);
}

#[tokio::test]
async fn test_update_kind_uses_stored_amount() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let changes = EntryChanges::new().with_kind(Kind::Presentation);
    store.update(id, &changes, None).await.unwrap();

    let reloaded = store.get(id, None).await.unwrap();
    assert_eq!(reloaded.amount.value(), dec!(100.00));
    assert_eq!(reloaded.kind, Kind::Presentation);
    assert_eq!(reloaded.commission.value(), dec!(3.00));
}

#[tokio::test]
async fn test_update_both_fields() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("100", "presentation", date(2024, 5, 1))).await.unwrap();

    let changes = EntryChanges::parse(None, Some("80.50"), Some("sale")).unwrap();
    let updated = store.update(id, &changes, None).await.unwrap();

    assert_eq!(updated.amount.value(), dec!(80.50));
    assert_eq!(updated.kind, Kind::Sale);
    assert_eq!(updated.commission.value(), dec!(1.61));
}

#[tokio::test]
async fn test_update_date_only_leaves_commission() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let changes = EntryChanges::parse(Some("2024-04-30"), None, None).unwrap();
    let updated = store.update(id, &changes, None).await.unwrap();

    assert_eq!(updated.occurred_at, date(2024, 4, 30));
    assert_eq!(updated.amount.value(), dec!(100.00));
    assert_eq!(updated.commission.value(), dec!(2.00));
}

#[tokio::test]
async fn test_update_with_no_changes_is_a_read() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("10", "sale", date(2024, 5, 1))).await.unwrap();

    let before = store.get(id, None).await.unwrap();
    let after = store.update(id, &EntryChanges::new(), None).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_update_missing_entry_is_not_found() {
    let store = setup_test_store().await;

    let changes = EntryChanges::new().with_kind(Kind::Sale);
    let err = store.update(999, &changes, None).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(999)));
}

#[tokio::test]
async fn test_delete_twice_fails_second_time() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    store.delete(id, None).await.unwrap();
    let err = store.delete(id, None).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(found) if found == id));

    assert!(store.list_all(None).await.unwrap().is_empty());
    assert!(store.get(id, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_totals_empty_month_reports_zeros() {
    let store = setup_test_store().await;

    let totals = store.totals(2024, 5, None).await.unwrap();
    assert_eq!(totals.sale.to_string(), "0.00");
    assert_eq!(totals.presentation.to_string(), "0.00");
}

#[tokio::test]
async fn test_totals_sum_amounts_within_month() {
    let store = setup_test_store().await;

    for (amount, kind, on) in [
        ("100.10", "sale", date(2024, 5, 1)),
        ("50.05", "sale", date(2024, 5, 31)),
        ("20.00", "presentation", date(2024, 5, 15)),
        ("999.99", "sale", date(2024, 4, 30)),
        ("999.99", "presentation", date(2024, 6, 1)),
        ("999.99", "sale", date(2023, 5, 10)),
    ] {
        store.insert(&new_entry(amount, kind, on)).await.unwrap();
    }

    let totals = store.totals(2024, 5, None).await.unwrap();
    assert_eq!(totals.sale.value(), dec!(150.15));
    assert_eq!(totals.presentation.value(), dec!(20.00));

    let december = store.totals(2023, 12, None).await.unwrap();
    assert_eq!(december.sale, Money::ZERO);
}

#[tokio::test]
async fn test_totals_reject_invalid_month() {
    let store = setup_test_store().await;

    let err = store.totals(2024, 13, None).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(_)));
}

#[tokio::test]
async fn test_owner_scoping() {
    let store = setup_test_store().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let alice_id = store
        .insert(&new_entry("100", "sale", date(2024, 5, 1)).with_owner(alice))
        .await
        .unwrap();
    store
        .insert(&new_entry("40", "presentation", date(2024, 5, 2)).with_owner(bob))
        .await
        .unwrap();

    let alice_entries = store.list_all(Some(alice)).await.unwrap();
    assert_eq!(alice_entries.len(), 1);
    assert_eq!(alice_entries[0].owner, Some(alice));
    assert_eq!(store.list_all(None).await.unwrap().len(), 2);

    let alice_totals = store.totals(2024, 5, Some(alice)).await.unwrap();
    assert_eq!(alice_totals.sale.value(), dec!(100.00));
    assert_eq!(alice_totals.presentation, Money::ZERO);

    // Bob cannot see, change or delete Alice's entry
    assert!(store.get(alice_id, Some(bob)).await.unwrap_err().is_not_found());
    let changes = EntryChanges::new().with_kind(Kind::Presentation);
    assert!(store
        .update(alice_id, &changes, Some(bob))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store.delete(alice_id, Some(bob)).await.unwrap_err().is_not_found());

    let untouched = store.get(alice_id, Some(alice)).await.unwrap();
    assert_eq!(untouched.kind, Kind::Sale);
}

#[tokio::test]
async fn test_ledger_totals() {
    let store = setup_test_store().await;
    store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();
    store.insert(&new_entry("100", "presentation", date(2024, 6, 1))).await.unwrap();

    let totals = store.ledger_totals(None).await.unwrap();
    assert_eq!(totals.amount.value(), dec!(200.00));
    assert_eq!(totals.commission.value(), dec!(5.00));
}

#[tokio::test]
async fn test_repeated_updates_do_not_drift() {
    let store = setup_test_store().await;
    let id = store.insert(&new_entry("0.25", "sale", date(2024, 5, 1))).await.unwrap();

    for kind in [Kind::Presentation, Kind::Sale, Kind::Presentation, Kind::Sale] {
        let changes = EntryChanges::new().with_kind(kind);
        store.update(id, &changes, None).await.unwrap();
    }

    let entry = store.get(id, None).await.unwrap();
    assert_eq!(entry.amount.value(), dec!(0.25));
    assert_eq!(entry.commission.value(), dec!(0.01));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::new(setup_file_db(&dir, 5).await);
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let kind = if i % 2 == 0 { Kind::Sale } else { Kind::Presentation };
            let changes = EntryChanges::new()
                .with_amount(Money::from(Decimal::from(i * 10)))
                .unwrap()
                .with_kind(kind);
            store.update(id, &changes, None).await
        }));
    }

    let mut written = Vec::new();
    for handle in handles {
        let updated = handle.await.unwrap().expect("every concurrent update succeeds");
        assert!(updated.is_consistent());
        written.push(updated.amount);
    }

    let entry = store.get(id, None).await.unwrap();
    assert!(entry.is_consistent());
    assert!(written.contains(&entry.amount));
}

#[tokio::test]
async fn test_update_gives_up_while_another_writer_holds_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let url = file_db_url(&dir);
    setup_file_db(&dir, 1).await.close().await;

    let options = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .busy_timeout(Duration::from_millis(20));
    let store = LedgerStore::new(
        SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap(),
    );
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let holder_pool = db::connect(&url, 1).await.unwrap();
    let mut holder = holder_pool.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *holder).await.unwrap();

    let changes = EntryChanges::new().with_kind(Kind::Presentation);
    let err = store.update(id, &changes, None).await.unwrap_err();
    assert!(matches!(err, StoreError::MaxRetriesExceeded));

    sqlx::query("COMMIT").execute(&mut *holder).await.unwrap();

    let updated = store.update(id, &changes, None).await.unwrap();
    assert_eq!(updated.kind, Kind::Presentation);
    assert_eq!(updated.commission.value(), dec!(3.00));
}

#[tokio::test]
async fn test_totals_of_largest_amounts() {
    let store = setup_test_store().await;
    for _ in 0..3 {
        store
            .insert(&new_entry("99999999.99", "sale", date(2024, 5, 1)))
            .await
            .unwrap();
    }

    let totals = store.totals(2024, 5, None).await.unwrap();
    assert_eq!(totals.sale.value(), dec!(299999999.97));

    let ledger = store.ledger_totals(None).await.unwrap();
    assert_eq!(ledger.amount.value(), dec!(299999999.97));
    assert_eq!(ledger.commission.value(), dec!(6000000.00));
}

#[tokio::test]
async fn test_out_of_range_stored_amount_is_invalid_row() {
    let pool = setup_test_db().await;
    for _ in 0..2 {
        sqlx::query(
            r#"
            INSERT INTO entries (occurred_on, amount, kind, commission)
            VALUES ('2024-05-01', '50000000000000000000000000000.00', 'sale', '1.00')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
    }
    let store = LedgerStore::new(pool);

    let err = store.totals(2024, 5, None).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRow(_)));

    let err = store.ledger_totals(None).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRow(_)));
}

#[tokio::test]
async fn test_storage_failure_on_insert_leaves_nothing() {
    let pool = setup_test_db().await;
    sqlx::query(
        r#"
        CREATE TRIGGER reject_thirteen BEFORE INSERT ON entries
        WHEN NEW.amount = '13.00'
        BEGIN SELECT RAISE(ABORT, 'unlucky'); END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = LedgerStore::new(pool);

    let err = store
        .insert(&new_entry("13", "sale", date(2024, 5, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
    assert!(store.list_all(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_on_update_rolls_back() {
    let pool = setup_test_db().await;
    sqlx::query(
        r#"
        CREATE TRIGGER freeze_presentations BEFORE UPDATE ON entries
        WHEN NEW.kind = 'presentation'
        BEGIN SELECT RAISE(ABORT, 'frozen'); END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = LedgerStore::new(pool);
    let id = store.insert(&new_entry("100", "sale", date(2024, 5, 1))).await.unwrap();

    let changes = EntryChanges::new()
        .with_amount(money("500"))
        .unwrap()
        .with_kind(Kind::Presentation);
    let err = store.update(id, &changes, None).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    let entry = store.get(id, None).await.unwrap();
    assert_eq!(entry.amount.value(), dec!(100.00));
    assert_eq!(entry.kind, Kind::Sale);
    assert_eq!(entry.commission.value(), dec!(2.00));
}

#[tokio::test]
async fn test_missing_schema_is_a_database_error() {
    let pool = commission_ledger::db::connect_in_memory().await.unwrap();
    let store = LedgerStore::new(pool);

    let err = store.list_all(None).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}
