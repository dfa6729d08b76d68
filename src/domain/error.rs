//! Domain Error Types
//!
//! Pure validation errors that don't depend on storage or HTTP.

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation failures raised while turning raw input into ledger values.
///
/// All of these are detected before anything is written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Amount could not be parsed as a number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount parsed but is zero or negative
    #[error("Amount must be positive (got {0})")]
    NonPositiveAmount(Decimal),

    /// Kind outside the closed set {sale, presentation}
    #[error("Unsupported kind '{0}': must be 'sale' or 'presentation'")]
    UnsupportedKind(String),

    /// Date is not a valid YYYY-MM-DD calendar date
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Year/month pair does not name a calendar month
    #[error("Invalid period: year {year}, month {month}")]
    InvalidPeriod { year: i32, month: u32 },
}

impl DomainError {
    /// Stable machine-readable code, used in API error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::NonPositiveAmount(_) => "non_positive_amount",
            Self::UnsupportedKind(_) => "unsupported_kind",
            Self::InvalidDate(_) => "invalid_date",
            Self::InvalidPeriod { .. } => "invalid_period",
        }
    }
}
