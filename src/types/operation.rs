//! Inbound operations
//!
//! An `Operation` is one request against the ledger, as read from the replay
//! CSV. Accounts are addressed by owner identity; the ledger resolves the
//! identity to an account before running the operation.

use super::account::Currency;
use rust_decimal::Decimal;

/// Owner identity (e.g. an email address)
pub type OwnerId = String;

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Onboard `owner` with a fresh account in `currency`
    Open { owner: OwnerId, currency: Currency },

    Deposit {
        owner: OwnerId,
        amount: Decimal,
        key: String,
    },

    Withdraw {
        owner: OwnerId,
        amount: Decimal,
        key: String,
    },

    /// Move `amount` (in the sender's currency) from `owner` to `recipient`
    Transfer {
        owner: OwnerId,
        recipient: OwnerId,
        amount: Decimal,
        key: String,
    },
}

impl Operation {
    /// Identity whose account the operation is charged to
    pub fn owner(&self) -> &str {
        match self {
            Operation::Open { owner, .. }
            | Operation::Deposit { owner, .. }
            | Operation::Withdraw { owner, .. }
            | Operation::Transfer { owner, .. } => owner,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Open { .. } => "open",
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::Transfer { .. } => "transfer",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Operation::Open { .. })
    }
}
