//! Aggregation results

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Kind, Money};

/// Sum of amounts per kind for one calendar month.
///
/// A kind with no entries reports `0.00`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub sale: Money,
    pub presentation: Money,
}

impl MonthlyTotals {
    pub fn add(&mut self, kind: Kind, amount: Money) {
        match kind {
            Kind::Sale => self.sale = self.sale + amount,
            Kind::Presentation => self.presentation = self.presentation + amount,
        }
    }
}

/// Grand totals over a set of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub amount: Money,
    pub commission: Money,
}

/// Half-open date range `[first day, first day of next month)`.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), DomainError> {
    let invalid = || DomainError::InvalidPeriod { year, month };

    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok((start, end))
}
