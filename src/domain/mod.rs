//! Domain module
//!
//! Ledger entries, the commission rate table and exact money arithmetic.

pub mod entry;
pub mod error;
pub mod kind;
pub mod money;

pub use entry::{
    commission_for, create_entry, parse_date, validate_amount, Entry, EntryChanges, NewEntry,
};
pub use error::DomainError;
pub use kind::Kind;
pub use money::{to_money, Money};
