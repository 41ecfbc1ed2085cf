//! Operation outcome
//!
//! The value returned to callers of Deposit / Withdraw / Transfer and the
//! value cached under an idempotency key once an operation has finished.

use super::error::LedgerError;
use super::transaction::{TransactionRecord, TransactionStatus};
use serde::{Deserialize, Serialize};

/// Terminal result of a ledger operation
///
/// `payload` is the canonical transaction record (the `transfer_out` record
/// for transfers). On failure `error` holds the human-readable reason and
/// `code` the stable error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub payload: Option<TransactionRecord>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl Outcome {
    pub fn completed(record: TransactionRecord) -> Self {
        Outcome {
            success: true,
            payload: Some(record),
            error: None,
            code: None,
        }
    }

    /// Failed outcome for a record that was opened and then marked failed
    ///
    /// Reason and code come from the record, so a replay rebuilt by
    /// [`Outcome::from_record`] is identical to the first answer.
    pub fn failed(record: TransactionRecord, error: &LedgerError) -> Self {
        Outcome {
            success: false,
            error: record
                .failure_reason
                .clone()
                .or_else(|| Some(error.to_string())),
            code: record
                .failure_code
                .clone()
                .or_else(|| Some(error.code().to_string())),
            payload: Some(record),
        }
    }

    /// Rebuild the outcome of a terminal record found by idempotency key
    ///
    /// Returns `None` for records that are still pending.
    pub fn from_record(record: TransactionRecord) -> Option<Self> {
        match record.status {
            TransactionStatus::Completed => Some(Outcome::completed(record)),
            TransactionStatus::Failed => Some(Outcome {
                success: false,
                error: record.failure_reason.clone(),
                code: record.failure_code.clone(),
                payload: Some(record),
            }),
            TransactionStatus::Pending => None,
        }
    }

    /// Id of the canonical record, if any
    pub fn record_id(&self) -> Option<uuid::Uuid> {
        self.payload.as_ref().map(|record| record.id)
    }
}
