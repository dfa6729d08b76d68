//! Ledger Store module
//!
//! Persistence layer for ledger entries.
//! Handles storing, updating and aggregating entries in SQLite.

mod error;
mod repository;
mod totals;

pub use error::StoreError;
pub use repository::{sum_entries, LedgerStore};
pub use totals::{month_range, LedgerTotals, MonthlyTotals};
