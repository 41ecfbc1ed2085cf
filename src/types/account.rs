//! Account-related types for the ledger engine
//!
//! This module defines the Account structure, the account identifier and the
//! ISO currency code carried by every account and transaction record.

use super::error::LedgerError;
use super::MinorUnits;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account identifier
///
/// Assigned from a monotonic counter at onboarding. The numeric order of
/// account ids is the global lock order used by transfers.
pub type AccountId = u64;

/// ISO 4217 style currency code (three ASCII letters, stored uppercase)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and normalize a currency code
    ///
    /// Accepts exactly three ASCII letters in any case. Anything else is
    /// rejected as an unknown currency.
    pub fn new(code: &str) -> Result<Self, LedgerError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::unknown_currency(code));
        }
        Ok(Currency(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account state
///
/// Holds a single-currency balance in minor units. The balance is unsigned,
/// and every debit checks it against the requested amount under the account
/// lock, so it can never go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Ledger-assigned identifier
    pub id: AccountId,

    /// External identity that owns this account (e.g. an email address)
    pub owner: String,

    /// Currency of the balance
    pub currency: Currency,

    /// Balance in minor units (cents for USD)
    pub balance: MinorUnits,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(id: AccountId, owner: impl Into<String>, currency: Currency) -> Self {
        Account {
            id,
            owner: owner.into(),
            currency,
            balance: 0,
        }
    }
}
