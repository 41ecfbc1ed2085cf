//! Error types for the ledger engine
//!
//! This module defines the closed set of errors a ledger operation can return.
//! Display strings are written for clients: they end up verbatim as the
//! `failure_reason` of failed transaction records.
//!
//! # Error Categories
//!
//! - **Validation Errors**: raised before any record is opened or any
//!   idempotency key is claimed (invalid amount, self transfer, missing key)
//! - **Business Errors**: raised after a record was opened; the record is
//!   marked failed with the error text (insufficient funds, conversion)
//! - **Coordination Errors**: another worker owns the idempotency key
//! - **Storage Errors**: unexpected backend conditions and programming errors

use thiserror::Error;
use uuid::Uuid;

use super::account::AccountId;
use super::transaction::TransactionStatus;

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount is zero, negative, non-integral or out of range
    #[error("Invalid amount '{amount}': must be a positive whole number of minor units")]
    InvalidAmount {
        /// The rejected amount as supplied
        amount: String,
    },

    /// Withdrawal or transfer exceeds the current balance
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: u64,
        requested: u64,
    },

    /// Transfer source and destination are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SelfTransfer { account: AccountId },

    /// Currency code is malformed or not known to the rate provider
    #[error("Unknown currency '{code}'")]
    UnknownCurrency { code: String },

    /// No conversion rate between two known currencies
    #[error("Conversion from {from} to {to} is unavailable")]
    ConversionUnavailable { from: String, to: String },

    /// Idempotency key is empty
    #[error("Idempotency key is required")]
    MissingKey,

    /// Another worker currently owns the idempotency key
    #[error("Operation with idempotency key '{key}' is already being processed")]
    AlreadyProcessing { key: String },

    /// No account belongs to the given identity
    #[error("Recipient '{identity}' not found")]
    RecipientNotFound { identity: String },

    /// No account with the given id
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// The identity has already been onboarded
    #[error("An account already exists for '{owner}'")]
    AccountAlreadyExists { owner: String },

    /// A record of this kind already exists under the idempotency key
    #[error("A {kind} record already exists for idempotency key '{key}'")]
    DuplicateRecord { key: String, kind: String },

    /// Transaction record id is unknown
    #[error("Transaction record {id} not found")]
    RecordNotFound { id: Uuid },

    /// Attempt to complete or fail a record that is already terminal
    #[error("Transaction record {id} is already {status}")]
    InvalidTransition { id: Uuid, status: TransactionStatus },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow { operation: String, account: AccountId },

    /// Unexpected backend failure
    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    /// I/O error while reading input or writing output
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Malformed input record
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse { line: Option<u64>, message: String },
}

impl LedgerError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::SelfTransfer { .. } => "SELF_TRANSFER",
            LedgerError::UnknownCurrency { .. } => "UNKNOWN_CURRENCY",
            LedgerError::ConversionUnavailable { .. } => "CONVERSION_UNAVAILABLE",
            LedgerError::MissingKey => "MISSING_KEY",
            LedgerError::AlreadyProcessing { .. } => "ALREADY_PROCESSING",
            LedgerError::RecipientNotFound { .. } => "RECIPIENT_NOT_FOUND",
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::AccountAlreadyExists { .. } => "ACCOUNT_ALREADY_EXISTS",
            LedgerError::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            LedgerError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
            LedgerError::StorageFailure { .. } => "STORAGE_FAILURE",
            LedgerError::Io { .. } => "IO_ERROR",
            LedgerError::Parse { .. } => "PARSE_ERROR",
        }
    }

    /// Errors that are rejected before the idempotency coordinator runs
    ///
    /// Retrying with the same input always fails the same way.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount { .. }
                | LedgerError::SelfTransfer { .. }
                | LedgerError::MissingKey
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::StorageFailure {
            message: format!("corrupt cached outcome: {}", error),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn invalid_amount(amount: impl ToString) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    pub fn insufficient_funds(account: AccountId, balance: u64, requested: u64) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    pub fn self_transfer(account: AccountId) -> Self {
        LedgerError::SelfTransfer { account }
    }

    pub fn unknown_currency(code: &str) -> Self {
        LedgerError::UnknownCurrency {
            code: code.to_string(),
        }
    }

    pub fn conversion_unavailable(from: &str, to: &str) -> Self {
        LedgerError::ConversionUnavailable {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn already_processing(key: &str) -> Self {
        LedgerError::AlreadyProcessing {
            key: key.to_string(),
        }
    }

    pub fn recipient_not_found(identity: &str) -> Self {
        LedgerError::RecipientNotFound {
            identity: identity.to_string(),
        }
    }

    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::StorageFailure {
            message: message.into(),
        }
    }
}
