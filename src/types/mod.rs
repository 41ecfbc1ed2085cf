//! Types module
//!
//! Contains core data structures used throughout the application:
//! - `account`: Account, account identifiers and currency codes
//! - `amount`: Minor-unit amounts and their validation
//! - `transaction`: Transaction records, kinds and statuses
//! - `outcome`: Terminal operation results returned to callers
//! - `operation`: Inbound operations for the replay driver
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod amount;
pub mod error;
pub mod operation;
pub mod outcome;
pub mod transaction;

pub use account::{Account, AccountId, Currency};
pub use amount::{to_minor_units, MinorUnits};
pub use error::LedgerError;
pub use operation::{Operation, OwnerId};
pub use outcome::Outcome;
pub use transaction::{RecordId, TransactionKind, TransactionRecord, TransactionStatus};
