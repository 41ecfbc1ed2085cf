//! Account ledger
//!
//! This module provides the `AccountManager`, which owns every account
//! balance and is the only component allowed to mutate one.
//!
//! # Locking
//!
//! Each account row lives behind its own `tokio::sync::Mutex`. Balance reads
//! and writes happen only through an [`AccountLock`], an owned guard that is
//! released when it is dropped, on every exit path. Operations on the same
//! account are therefore totally ordered; operations on different accounts run
//! in parallel.
//!
//! The `DashMap` holding the rows is only ever touched briefly to clone the
//! row's `Arc`; no shard lock is held while waiting for a row lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::types::{to_minor_units, Account, AccountId, Currency, LedgerError, MinorUnits};

/// Exclusive lock on a single account row
///
/// Holding an `AccountLock` is the only way to read a trustworthy balance or
/// to change one.
#[derive(Debug)]
pub struct AccountLock {
    guard: OwnedMutexGuard<Account>,
}

impl AccountLock {
    pub fn account(&self) -> &Account {
        &self.guard
    }

    pub fn id(&self) -> AccountId {
        self.guard.id
    }

    pub fn balance(&self) -> MinorUnits {
        self.guard.balance
    }

    pub fn currency(&self) -> &Currency {
        &self.guard.currency
    }

    /// Add `amount` to the balance
    pub fn credit(&mut self, amount: MinorUnits) -> Result<MinorUnits, LedgerError> {
        let new_balance = self
            .guard
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("deposit", self.guard.id))?;
        self.guard.balance = new_balance;
        Ok(new_balance)
    }

    /// Subtract `amount` from the balance
    ///
    /// Fails with `InsufficientFunds` and leaves the balance untouched if the
    /// balance is smaller than `amount`.
    pub fn debit(&mut self, amount: MinorUnits) -> Result<MinorUnits, LedgerError> {
        if self.guard.balance < amount {
            return Err(LedgerError::insufficient_funds(
                self.guard.id,
                self.guard.balance,
                amount,
            ));
        }
        self.guard.balance -= amount;
        Ok(self.guard.balance)
    }

    /// Put back a balance captured earlier under this same lock
    pub(crate) fn restore(&mut self, balance: MinorUnits) {
        self.guard.balance = balance;
    }
}

/// Thread-safe owner of all account rows
#[derive(Debug)]
pub struct AccountManager {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,

    /// Owner identity -> account id (one account per identity)
    owners: DashMap<String, AccountId>,

    next_id: AtomicU64,
}

impl AccountManager {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            owners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Provision the account for a newly onboarded identity
    ///
    /// Each identity gets exactly one account; a second call fails with
    /// `AccountAlreadyExists`. A blank identity can never be resolved later,
    /// so it is rejected as `RecipientNotFound`.
    pub fn open_account(&self, owner: &str, currency: Currency) -> Result<Account, LedgerError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LedgerError::recipient_not_found(owner));
        }

        match self.owners.entry(owner.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::AccountAlreadyExists {
                owner: owner.to_string(),
            }),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let account = Account::new(id, owner, currency);
                self.accounts
                    .insert(id, Arc::new(Mutex::new(account.clone())));
                slot.insert(id);
                info!(account = id, owner = %owner, currency = %account.currency, "Account opened");
                Ok(account)
            }
        }
    }

    fn row(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// Acquire the exclusive lock on one account
    ///
    /// Blocks until the current holder releases it.
    pub async fn lock(&self, id: AccountId) -> Result<AccountLock, LedgerError> {
        let row = self.row(id)?;
        let guard = row.lock_owned().await;
        Ok(AccountLock { guard })
    }

    /// Acquire exclusive locks on two distinct accounts
    ///
    /// Locks are always taken in ascending account id order, whichever
    /// account is passed first, so two callers locking the same pair can never
    /// wait on each other in a cycle. The guards are returned in argument
    /// order.
    pub async fn lock_pair(
        &self,
        first: AccountId,
        second: AccountId,
    ) -> Result<(AccountLock, AccountLock), LedgerError> {
        if first == second {
            return Err(LedgerError::self_transfer(first));
        }

        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_row = self.row(low)?;
        let high_row = self.row(high)?;

        debug!(low, high, "Acquiring account locks in ascending order");
        let low_lock = AccountLock {
            guard: low_row.lock_owned().await,
        };
        let high_lock = AccountLock {
            guard: high_row.lock_owned().await,
        };

        if first == low {
            Ok((low_lock, high_lock))
        } else {
            Ok((high_lock, low_lock))
        }
    }

    /// Snapshot of an account
    ///
    /// The snapshot is taken under the row lock but may be stale as soon as
    /// it is returned; never use it to decide a balance mutation.
    pub async fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        let lock = self.lock(id).await?;
        Ok(lock.account().clone())
    }

    /// Resolve an owner identity to its account
    pub async fn resolve_owner(&self, owner: &str) -> Result<Account, LedgerError> {
        let id = self
            .owners
            .get(owner.trim())
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::recipient_not_found(owner))?;
        self.get(id).await
    }

    /// Deposit `amount` into an account
    ///
    /// The amount is validated before the account is touched.
    pub async fn deposit(&self, id: AccountId, amount: Decimal) -> Result<Account, LedgerError> {
        let amount = to_minor_units(amount)?;
        let mut lock = self.lock(id).await?;
        lock.credit(amount)?;
        debug!(account = id, amount, balance = lock.balance(), "Deposit applied");
        Ok(lock.account().clone())
    }

    /// Withdraw `amount` from an account
    ///
    /// Fails with `InsufficientFunds` and changes nothing when the balance is
    /// smaller than `amount`.
    pub async fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<Account, LedgerError> {
        let amount = to_minor_units(amount)?;
        let mut lock = self.lock(id).await?;
        lock.debit(amount)?;
        debug!(account = id, amount, balance = lock.balance(), "Withdrawal applied");
        Ok(lock.account().clone())
    }

    /// Snapshots of all accounts, sorted by id
    pub async fn all_accounts(&self) -> Vec<Account> {
        let rows: Vec<Arc<Mutex<Account>>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(row.lock().await.clone());
        }
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    async fn funded(manager: &AccountManager, owner: &str, balance: i64) -> AccountId {
        let account = manager.open_account(owner, usd()).unwrap();
        if balance > 0 {
            manager
                .deposit(account.id, Decimal::from(balance))
                .await
                .unwrap();
        }
        account.id
    }

    #[test]
    fn test_open_account_assigns_ascending_ids() {
        let manager = AccountManager::new();

        let first = manager.open_account("alice", usd()).unwrap();
        let second = manager.open_account("bob", usd()).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.balance, 0);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_open_account_once_per_identity() {
        let manager = AccountManager::new();
        manager.open_account("alice", usd()).unwrap();

        let result = manager.open_account("alice", Currency::new("EUR").unwrap());

        assert_eq!(
            result.unwrap_err(),
            LedgerError::AccountAlreadyExists {
                owner: "alice".to_string()
            }
        );
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_owner() {
        let manager = AccountManager::new();
        let id = funded(&manager, "alice", 0).await;

        assert_eq!(manager.resolve_owner("alice").await.unwrap().id, id);
        assert_eq!(
            manager.resolve_owner("mallory").await.unwrap_err(),
            LedgerError::recipient_not_found("mallory")
        );
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let manager = AccountManager::new();
        let id = funded(&manager, "alice", 10000).await;

        let account = manager.withdraw(id, Decimal::from(2500)).await.unwrap();

        assert_eq!(account.balance, 7500);
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_leaves_balance() {
        let manager = AccountManager::new();
        let id = funded(&manager, "alice", 3000).await;

        let result = manager.withdraw(id, Decimal::from(5000)).await;

        assert_eq!(
            result.unwrap_err(),
            LedgerError::insufficient_funds(id, 3000, 5000)
        );
        assert_eq!(manager.get(id).await.unwrap().balance, 3000);
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::from(-1))]
    #[case::fractional(Decimal::new(15, 1))]
    #[tokio::test]
    async fn test_invalid_amounts_rejected_before_storage(#[case] amount: Decimal) {
        let manager = AccountManager::new();

        // Unknown account: validation must fail first.
        let deposit = manager.deposit(99, amount).await;
        let withdraw = manager.withdraw(99, amount).await;

        assert!(matches!(deposit, Err(LedgerError::InvalidAmount { .. })));
        assert!(matches!(withdraw, Err(LedgerError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let manager = AccountManager::new();

        let result = manager.deposit(42, Decimal::from(1)).await;

        assert_eq!(result.unwrap_err(), LedgerError::account_not_found(42));
    }

    #[tokio::test]
    async fn test_deposit_overflow_rejected() {
        let manager = AccountManager::new();
        let id = funded(&manager, "alice", 0).await;
        manager.lock(id).await.unwrap().restore(u64::MAX);

        let result = manager.deposit(id, Decimal::from(1)).await;

        assert!(matches!(
            result,
            Err(LedgerError::ArithmeticOverflow { .. })
        ));
        assert_eq!(manager.get(id).await.unwrap().balance, u64::MAX);
    }

    #[tokio::test]
    async fn test_lock_pair_returns_argument_order() {
        let manager = AccountManager::new();
        let a = funded(&manager, "alice", 0).await;
        let b = funded(&manager, "bob", 0).await;

        let (first, second) = manager.lock_pair(b, a).await.unwrap();

        assert_eq!(first.id(), b);
        assert_eq!(second.id(), a);
    }

    #[tokio::test]
    async fn test_lock_pair_rejects_same_account() {
        let manager = AccountManager::new();
        let a = funded(&manager, "alice", 0).await;

        assert_eq!(
            manager.lock_pair(a, a).await.unwrap_err(),
            LedgerError::self_transfer(a)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_blocks_other_holders() {
        let manager = Arc::new(AccountManager::new());
        let id = funded(&manager, "alice", 100).await;

        let held = manager.lock(id).await.unwrap();

        let contender = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.withdraw(id, Decimal::from(100)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        let account = contender.await.unwrap().unwrap();
        assert_eq!(account.balance, 0);
    }

    // Concurrent access tests
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_deposits_same_account() {
        let manager = Arc::new(AccountManager::new());
        let id = funded(&manager, "alice", 0).await;

        let mut handles = vec![];
        for _ in 0..100 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.deposit(id, Decimal::from(10)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.get(id).await.unwrap().balance, 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let manager = Arc::new(AccountManager::new());
        let id = funded(&manager, "alice", 1000).await;

        let mut handles = vec![];
        for _ in 0..50 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.withdraw(id, Decimal::from(30)).await.is_ok()
            }));
        }
        let mut succeeded = 0u64;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        // 1000 / 30 = 33 withdrawals fit, the rest must be rejected
        assert_eq!(succeeded, 33);
        assert_eq!(manager.get(id).await.unwrap().balance, 1000 - 33 * 30);
    }

    #[tokio::test]
    async fn test_all_accounts_sorted() {
        let manager = AccountManager::new();
        funded(&manager, "carol", 5).await;
        funded(&manager, "alice", 7).await;

        let accounts = manager.all_accounts().await;

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, 1);
        assert_eq!(accounts[0].owner, "carol");
        assert_eq!(accounts[1].balance, 7);
    }
}
