//! Transaction record types
//!
//! A transaction record is the audit entry for one attempted balance
//! mutation. Records are created `pending` before any money moves and are
//! resolved exactly once to `completed` or `failed`.

use super::account::{AccountId, Currency};
use super::MinorUnits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transaction record identifier
pub type RecordId = Uuid;

/// Kind of balance mutation a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Funds credited from outside the ledger
    Deposit,

    /// Funds debited to outside the ledger
    Withdrawal,

    /// Credit side of a transfer, on the receiving account
    TransferIn,

    /// Debit side of a transfer, on the sending account
    TransferOut,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Completed and failed records accept no further transitions
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Audit entry for one attempted balance mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,

    /// Account whose balance this record describes
    pub account_id: AccountId,

    pub kind: TransactionKind,

    /// Strictly positive amount in minor units of `currency`
    pub amount: MinorUnits,

    pub currency: Currency,

    pub status: TransactionStatus,

    /// Caller-supplied idempotency key. Shared by the two halves of a transfer.
    pub idempotency_key: String,

    /// Human-readable reason, present only when `status` is `Failed`
    pub failure_reason: Option<String>,

    /// Stable error code, present only when `status` is `Failed`
    pub failure_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a new pending record with a fresh id
    pub fn pending(
        account_id: AccountId,
        kind: TransactionKind,
        amount: MinorUnits,
        currency: Currency,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        TransactionRecord {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount,
            currency,
            status: TransactionStatus::Pending,
            idempotency_key: idempotency_key.into(),
            failure_reason: None,
            failure_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
