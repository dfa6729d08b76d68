//! Entry kind and rate table

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Closed category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Sale,
    Presentation,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Sale, Kind::Presentation];

    /// Commission rate: sale 2%, presentation 3%
    pub fn rate(self) -> Decimal {
        match self {
            Kind::Sale => Decimal::new(2, 2),
            Kind::Presentation => Decimal::new(3, 2),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Sale => "sale",
            Kind::Presentation => "presentation",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sale" => Ok(Kind::Sale),
            "presentation" => Ok(Kind::Presentation),
            other => Err(DomainError::UnsupportedKind(other.to_string())),
        }
    }
}
