//! Core business logic module
//!
//! This module contains the ledger core components:
//! - `traits` - Seams for the idempotency cache and the rate provider
//! - `account_manager` - Account ledger: per-account locking and balance mutation
//! - `transaction_store` - Audit trail of every attempted mutation
//! - `idempotency` - At-most-once execution per idempotency key
//! - `transfer` - Atomic two-account transfers
//! - `engine` - `Ledger` entry points composing the above
//! - `batch_processor` - Owner-partitioned concurrent replay

pub mod account_manager;
pub mod batch_processor;
pub mod engine;
pub mod idempotency;
pub mod traits;
pub mod transaction_store;
pub mod transfer;

pub use account_manager::{AccountLock, AccountManager};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::{Applied, Ledger};
pub use idempotency::IdempotencyCoordinator;
pub use traits::{ExchangeRates, IdempotencyCache};
pub use transaction_store::TransactionStore;
pub use transfer::TransferOrchestrator;
