//! commission_ledger Library
//!
//! Sales and presentation commission tracking: exact money arithmetic,
//! a SQLite-backed ledger store and a JSON HTTP API over it.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod store;

mod error;

pub use config::Config;
pub use domain::{
    commission_for, create_entry, parse_date, to_money, DomainError, Entry, EntryChanges, Kind,
    Money, NewEntry,
};
pub use error::{AppError, AppResult};
pub use store::{LedgerStore, LedgerTotals, MonthlyTotals, StoreError};
