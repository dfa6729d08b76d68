//! Ledger entries
//!
//! An entry records one sale or presentation. Its commission is derived
//! from amount and kind and is never set on its own: every path that
//! changes amount or kind goes through [`commission_for`].

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{to_money, DomainError, Kind, Money};

/// Date format accepted from callers
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Commission earned for `amount` of the given kind, rounded half-up to cents.
pub fn commission_for(amount: Money, kind: Kind) -> Money {
    amount.times_rate(kind.rate())
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// Only the zero-padded four-digit-year shape is accepted; chrono alone
/// would also take `2024-5-1` or a signed year.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = raw.trim();
    let invalid = || DomainError::InvalidDate(trimmed.to_string());

    let well_formed = trimmed.len() == 10
        && trimmed.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| invalid())
}

/// Build an unsaved entry from raw caller input.
///
/// Validation order: amount format, amount sign, kind. `occurred_at`
/// defaults to today (UTC).
pub fn create_entry(
    amount_raw: &str,
    kind_raw: &str,
    occurred_at: Option<NaiveDate>,
) -> Result<NewEntry, DomainError> {
    let amount = to_money(amount_raw)?;
    validate_amount(amount)?;
    let kind: Kind = kind_raw.parse()?;

    NewEntry::new(
        amount,
        kind,
        occurred_at.unwrap_or_else(|| Utc::now().date_naive()),
    )
}

/// Check that an amount may be recorded: positive and at most
/// [`Money::MAX_AMOUNT`].
pub fn validate_amount(amount: Money) -> Result<(), DomainError> {
    if !amount.is_positive() {
        return Err(DomainError::NonPositiveAmount(amount.value()));
    }
    if amount > Money::MAX_AMOUNT {
        return Err(DomainError::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            amount,
            Money::MAX_AMOUNT
        )));
    }
    Ok(())
}

/// An entry that has not been stored yet (no id).
///
/// Deserializing goes through [`NewEntry::new`]: a serialized commission
/// is ignored and re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NewEntryFields")]
pub struct NewEntry {
    occurred_at: NaiveDate,
    amount: Money,
    kind: Kind,
    commission: Money,
    owner: Option<Uuid>,
}

impl NewEntry {
    pub fn new(amount: Money, kind: Kind, occurred_at: NaiveDate) -> Result<Self, DomainError> {
        validate_amount(amount)?;

        Ok(Self {
            occurred_at,
            amount,
            kind,
            commission: commission_for(amount, kind),
            owner: None,
        })
    }

    /// Attach the owning user
    pub fn with_owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn occurred_at(&self) -> NaiveDate {
        self.occurred_at
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn commission(&self) -> Money {
        self.commission
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }
}

#[derive(Deserialize)]
struct NewEntryFields {
    occurred_at: NaiveDate,
    amount: Money,
    kind: Kind,
    #[serde(default)]
    owner: Option<Uuid>,
}

impl TryFrom<NewEntryFields> for NewEntry {
    type Error = DomainError;

    fn try_from(fields: NewEntryFields) -> Result<Self, Self::Error> {
        let entry = NewEntry::new(fields.amount, fields.kind, fields.occurred_at)?;
        Ok(match fields.owner {
            Some(owner) => entry.with_owner(owner),
            None => entry,
        })
    }
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub occurred_at: NaiveDate,
    pub amount: Money,
    pub kind: Kind,
    pub commission: Money,
    pub owner: Option<Uuid>,
}

impl Entry {
    /// Merge a partial update into this entry.
    ///
    /// Each of amount and kind falls back to the stored value when not
    /// given. Commission is recomputed once, from the effective pair,
    /// whenever either of them was supplied.
    pub fn apply(&self, changes: &EntryChanges) -> Entry {
        let amount = changes.amount.unwrap_or(self.amount);
        let kind = changes.kind.unwrap_or(self.kind);
        let commission = if changes.touches_commission() {
            commission_for(amount, kind)
        } else {
            self.commission
        };

        Entry {
            id: self.id,
            occurred_at: changes.occurred_at.unwrap_or(self.occurred_at),
            amount,
            kind,
            commission,
            owner: self.owner,
        }
    }

    /// Whether the stored commission matches amount and kind
    pub fn is_consistent(&self) -> bool {
        self.commission == commission_for(self.amount, self.kind)
    }
}

/// Validated partial update: only the fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryChanges {
    occurred_at: Option<NaiveDate>,
    amount: Option<Money>,
    kind: Option<Kind>,
}

impl EntryChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw optional fields. Blank strings count as not given.
    pub fn parse(
        date_raw: Option<&str>,
        amount_raw: Option<&str>,
        kind_raw: Option<&str>,
    ) -> Result<Self, DomainError> {
        let mut changes = Self::new();

        if let Some(raw) = non_blank(date_raw) {
            changes = changes.with_date(parse_date(raw)?);
        }
        if let Some(raw) = non_blank(amount_raw) {
            changes = changes.with_amount(to_money(raw)?)?;
        }
        if let Some(raw) = non_blank(kind_raw) {
            changes = changes.with_kind(raw.parse()?);
        }

        Ok(changes)
    }

    pub fn with_date(mut self, occurred_at: NaiveDate) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Result<Self, DomainError> {
        validate_amount(amount)?;
        self.amount = Some(amount);
        Ok(self)
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn occurred_at(&self) -> Option<NaiveDate> {
        self.occurred_at
    }

    pub fn amount(&self) -> Option<Money> {
        self.amount
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.occurred_at.is_none() && self.amount.is_none() && self.kind.is_none()
    }

    /// Amount or kind was supplied, so commission must be re-derived
    pub fn touches_commission(&self) -> bool {
        self.amount.is_some() || self.kind.is_some()
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}
