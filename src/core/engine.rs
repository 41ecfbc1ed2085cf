//! Ledger entry points
//!
//! This module provides the `Ledger`, the public face of the ledger core. It
//! wires the account ledger, the record store, the idempotency coordinator
//! and the transfer orchestrator together and exposes the operations callers
//! use: onboarding, Deposit, Withdraw, Transfer and TransferToOwner.
//!
//! The ledger enforces the error propagation rules:
//! - Amount and self-transfer validation happens before the idempotency key is
//!   claimed, so bad input fails the same way on every retry
//! - Business failures after a record was opened are recorded on that record
//!   and returned as a failed `Outcome`, never as an `Err`
//! - Everything else (unknown account, storage trouble) is an `Err` and
//!   releases the idempotency key

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::account_manager::AccountManager;
use super::idempotency::IdempotencyCoordinator;
use super::traits::{ExchangeRates, IdempotencyCache};
use super::transaction_store::TransactionStore;
use super::transfer::TransferOrchestrator;
use crate::adapters::{InMemoryCache, StaticRates};
use crate::config::LedgerConfig;
use crate::types::{
    to_minor_units, Account, AccountId, Currency, LedgerError, MinorUnits, Operation, Outcome,
    TransactionKind, TransactionRecord,
};

/// Result of applying one [`Operation`]
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// An identity was onboarded
    Opened(Account),
    /// A keyed money movement finished (successfully or not)
    Finished(Outcome),
}

/// The ledger core
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Ledger {
    accounts: Arc<AccountManager>,
    store: Arc<TransactionStore>,
    coordinator: IdempotencyCoordinator,
    transfers: TransferOrchestrator,
}

impl Ledger {
    /// Create an empty ledger on top of the given cache and rate provider
    pub fn new(
        cache: Arc<dyn IdempotencyCache>,
        rates: Arc<dyn ExchangeRates>,
        config: LedgerConfig,
    ) -> Self {
        let accounts = Arc::new(AccountManager::new());
        let store = Arc::new(TransactionStore::new());
        let coordinator = IdempotencyCoordinator::new(cache, Arc::clone(&store), config);
        let transfers = TransferOrchestrator::new(
            Arc::clone(&accounts),
            Arc::clone(&store),
            rates,
            coordinator.clone(),
        );

        Self {
            accounts,
            store,
            coordinator,
            transfers,
        }
    }

    /// Ledger backed by the in-process cache and a fixed rate table
    pub fn in_memory(rates: StaticRates, config: LedgerConfig) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), Arc::new(rates), config)
    }

    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        self.coordinator.config()
    }

    /// Onboard an identity, provisioning its single account
    pub fn open_account(&self, owner: &str, currency: Currency) -> Result<Account, LedgerError> {
        self.accounts.open_account(owner, currency)
    }

    /// Every record of an account, oldest first
    pub fn history(&self, account: AccountId) -> Vec<TransactionRecord> {
        self.store.history(account)
    }

    /// Credit `amount` to an account, at most once per `key`
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` before the key is claimed
    /// - `MissingKey` / `AlreadyProcessing` from the coordinator
    /// - `AccountNotFound` (the key is released)
    ///
    /// A deposit that fails after its record was opened (balance overflow)
    /// comes back as a failed `Outcome`.
    pub async fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        let amount = to_minor_units(amount)?;
        self.coordinator
            .execute(key, || {
                self.run_single(account, TransactionKind::Deposit, amount, key)
            })
            .await
    }

    /// Debit `amount` from an account, at most once per `key`
    ///
    /// Insufficient funds produce a failed record and a failed `Outcome`; the
    /// balance is left untouched.
    pub async fn withdraw(
        &self,
        account: AccountId,
        amount: Decimal,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        let amount = to_minor_units(amount)?;
        self.coordinator
            .execute(key, || {
                self.run_single(account, TransactionKind::Withdrawal, amount, key)
            })
            .await
    }

    /// Move `amount` (sender currency) between two accounts, at most once per `key`
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        self.transfers.transfer(from, to, amount, key).await
    }

    /// Transfer to the account owned by `recipient`
    ///
    /// The recipient is resolved first; an unknown identity fails with
    /// `RecipientNotFound` without claiming the key.
    pub async fn transfer_to_owner(
        &self,
        from: AccountId,
        recipient: &str,
        amount: Decimal,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        let to = self.accounts.resolve_owner(recipient).await?;
        self.transfer(from, to.id, amount, key).await
    }

    /// Apply one inbound operation, addressing accounts by owner identity
    pub async fn apply(&self, operation: Operation) -> Result<Applied, LedgerError> {
        match operation {
            Operation::Open { owner, currency } => {
                self.open_account(&owner, currency).map(Applied::Opened)
            }
            Operation::Deposit { owner, amount, key } => {
                let account = self.accounts.resolve_owner(&owner).await?;
                self.deposit(account.id, amount, &key)
                    .await
                    .map(Applied::Finished)
            }
            Operation::Withdraw { owner, amount, key } => {
                let account = self.accounts.resolve_owner(&owner).await?;
                self.withdraw(account.id, amount, &key)
                    .await
                    .map(Applied::Finished)
            }
            Operation::Transfer {
                owner,
                recipient,
                amount,
                key,
            } => {
                let account = self.accounts.resolve_owner(&owner).await?;
                self.transfer_to_owner(account.id, &recipient, amount, &key)
                    .await
                    .map(Applied::Finished)
            }
        }
    }

    /// Single-account movement: record, lock, mutate, settle the record
    ///
    /// The row lock is held from the balance check until the record reaches
    /// its terminal state.
    async fn run_single(
        &self,
        account: AccountId,
        kind: TransactionKind,
        amount: MinorUnits,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        let mut lock = self.accounts.lock(account).await?;
        let record = self
            .store
            .open(account, kind, amount, lock.currency(), key)?;
        let before = lock.balance();

        let applied = match kind {
            TransactionKind::Deposit => lock.credit(amount),
            _ => lock.debit(amount),
        };

        match applied {
            Ok(balance) => match self.store.complete(record.id) {
                Ok(completed) => {
                    info!(key, account, amount, balance, kind = %kind, "Operation applied");
                    Ok(Outcome::completed(completed))
                }
                Err(e) => {
                    lock.restore(before);
                    Err(e)
                }
            },
            Err(e) => {
                warn!(key, account, kind = %kind, reason = %e, "Operation failed");
                let failed = self.store.fail(record.id, &e)?;
                Ok(Outcome::failed(failed, &e))
            }
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::in_memory(StaticRates::new(), LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionStatus;
    use rstest::rstest;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    async fn funded(ledger: &Ledger, owner: &str, balance: i64) -> AccountId {
        let account = ledger.open_account(owner, usd()).unwrap();
        if balance > 0 {
            let key = format!("seed-{}", owner);
            ledger
                .deposit(account.id, Decimal::from(balance), &key)
                .await
                .unwrap();
        }
        account.id
    }

    #[tokio::test]
    async fn test_deposit_completes_record() {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 0).await;

        let outcome = ledger.deposit(id, Decimal::from(10000), "d1").await.unwrap();

        assert!(outcome.success);
        let record = outcome.payload.unwrap();
        assert_eq!(record.kind, TransactionKind::Deposit);
        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.amount, 10000);
        assert_eq!(ledger.accounts().get(id).await.unwrap().balance, 10000);
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_is_recorded() {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 3000).await;

        let outcome = ledger.withdraw(id, Decimal::from(5000), "w1").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.code.as_deref(), Some("INSUFFICIENT_FUNDS"));
        assert_eq!(ledger.accounts().get(id).await.unwrap().balance, 3000);

        let records = ledger.store().find_by_key("w1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Failed);
        assert!(records[0]
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Insufficient"));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::from(-5))]
    #[case::fractional(Decimal::new(105, 1))]
    #[tokio::test]
    async fn test_invalid_amount_rejected_before_any_record(#[case] amount: Decimal) {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 100).await;

        let result = ledger.withdraw(id, amount, "bad").await;

        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        assert!(ledger.store().find_by_key("bad").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_is_not_cached() {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 100).await;

        let first = ledger.deposit(id, Decimal::ZERO, "retry").await;
        assert!(first.is_err());

        // Same key, corrected amount: the key was never claimed
        let second = ledger.deposit(id, Decimal::from(50), "retry").await.unwrap();
        assert!(second.success);
        assert_eq!(ledger.accounts().get(id).await.unwrap().balance, 150);
    }

    #[tokio::test]
    async fn test_unknown_account_releases_key() {
        let ledger = Ledger::default();

        let result = ledger.deposit(42, Decimal::from(10), "ghost").await;

        assert_eq!(result.unwrap_err(), LedgerError::account_not_found(42));
        assert!(ledger.store().find_by_key("ghost").is_empty());
    }

    #[tokio::test]
    async fn test_replayed_withdrawal_applies_once() {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 1000).await;

        let first = ledger.withdraw(id, Decimal::from(400), "w2").await.unwrap();
        let second = ledger.withdraw(id, Decimal::from(400), "w2").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.accounts().get(id).await.unwrap().balance, 600);
    }

    #[tokio::test]
    async fn test_transfer_to_owner() {
        let ledger = Ledger::default();
        let alice = funded(&ledger, "alice", 1000).await;
        let bob = funded(&ledger, "bob", 0).await;

        let outcome = ledger
            .transfer_to_owner(alice, "bob", Decimal::from(300), "t1")
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(ledger.accounts().get(bob).await.unwrap().balance, 300);
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_owner() {
        let ledger = Ledger::default();
        let alice = funded(&ledger, "alice", 1000).await;

        let result = ledger
            .transfer_to_owner(alice, "nobody@example.com", Decimal::from(300), "t2")
            .await;

        assert_eq!(
            result.unwrap_err(),
            LedgerError::recipient_not_found("nobody@example.com")
        );
        assert!(ledger.store().find_by_key("t2").is_empty());
    }

    #[tokio::test]
    async fn test_apply_operations_by_owner() {
        let ledger = Ledger::default();

        let opened = ledger
            .apply(Operation::Open {
                owner: "alice".to_string(),
                currency: usd(),
            })
            .await
            .unwrap();
        let Applied::Opened(account) = opened else {
            panic!("expected an opened account");
        };

        let deposited = ledger
            .apply(Operation::Deposit {
                owner: "alice".to_string(),
                amount: Decimal::from(250),
                key: "a-d1".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(deposited, Applied::Finished(ref outcome) if outcome.success));
        let balance = ledger.accounts().get(account.id).await.unwrap().balance;
        assert_eq!(balance, 250);
    }

    #[tokio::test]
    async fn test_history_in_creation_order() {
        let ledger = Ledger::default();
        let id = funded(&ledger, "alice", 0).await;

        ledger.deposit(id, Decimal::from(100), "h1").await.unwrap();
        ledger.withdraw(id, Decimal::from(500), "h2").await.unwrap();
        ledger.withdraw(id, Decimal::from(40), "h3").await.unwrap();

        let history = ledger.history(id);
        let keys: Vec<&str> = history
            .iter()
            .map(|record| record.idempotency_key.as_str())
            .collect();
        assert_eq!(keys, vec!["h1", "h2", "h3"]);
        assert_eq!(history[1].status, TransactionStatus::Failed);
    }
}
