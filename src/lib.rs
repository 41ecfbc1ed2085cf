//! Rust Ledger Engine Library
//! # Overview
//!
//! This library provides an idempotent, concurrency-safe ledger core: it
//! mutates account balances, records an audit trail of every attempt,
//! deduplicates retried requests by idempotency key, and moves money between
//! two accounts without deadlocking.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, TransactionRecord, Outcome, errors)
//! - [`core`] - Ledger components:
//!   - [`core::account_manager`] - Per-account locking and balance mutation
//!   - [`core::transaction_store`] - Audit trail with terminal-state records
//!   - [`core::idempotency`] - At-most-once execution per key
//!   - [`core::transfer`] - Atomic, lock-ordered transfers with conversion
//!   - [`core::engine`] - `Ledger` entry points
//! - [`adapters`] - In-process cache and rate table behind the core's traits
//! - [`io`] - Operation CSV reading and account CSV output
//! - [`strategy`] - Sequential and concurrent replay
//! - [`cli`], [`config`], [`logging`] - Command-line driver
//!
//! # Operations
//!
//! - **Deposit**: credit an account
//! - **Withdraw**: debit an account; fails without effect on insufficient funds
//! - **Transfer**: debit one account and credit another, converting currency
//!
//! Every operation carries an idempotency key. Replaying a key returns the
//! first outcome without repeating its side effects.
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use rust_ledger_engine::{Currency, Ledger};
//!
//! # async fn demo() -> Result<(), rust_ledger_engine::LedgerError> {
//! let ledger = Ledger::default();
//! let alice = ledger.open_account("alice@example.com", Currency::new("USD")?)?;
//! let outcome = ledger.deposit(alice.id, Decimal::from(10_000), "d1").await?;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use crate::config::LedgerConfig;
pub use crate::core::{
    AccountManager, IdempotencyCoordinator, Ledger, TransactionStore, TransferOrchestrator,
};
pub use crate::io::write_accounts_csv;
pub use crate::types::{
    Account, AccountId, Currency, LedgerError, Outcome, TransactionKind, TransactionRecord,
    TransactionStatus,
};
