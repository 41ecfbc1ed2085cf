//! Transaction record storage
//!
//! This module provides the `TransactionStore`, the audit trail of every
//! attempted balance mutation.
//!
//! # Lifecycle
//!
//! Records are opened `pending` before money moves and resolved exactly once
//! to `completed` or `failed`. Terminal records are never mutated again.
//!
//! # Idempotency keys
//!
//! Keys are indexed but not globally unique: a transfer writes a
//! `transfer_out` and a `transfer_in` record under one key. Uniqueness is
//! enforced per `(key, kind)` instead.
//!
//! # Lock order
//!
//! The key index is always locked before the account index, and both before
//! the record map. No method holds a
//! record-map guard while touching the key index.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::types::{
    AccountId, Currency, LedgerError, MinorUnits, RecordId, TransactionKind, TransactionRecord,
    TransactionStatus,
};

/// Thread-safe store of transaction records
#[derive(Debug, Default)]
pub struct TransactionStore {
    records: DashMap<RecordId, TransactionRecord>,

    /// Idempotency key -> ids of the records written under it
    by_key: DashMap<String, Vec<RecordId>>,

    /// Account -> ids of its records, in insertion order
    by_account: DashMap<AccountId, Vec<RecordId>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending record
    ///
    /// Validates the amount and key before anything is persisted.
    pub fn open(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: MinorUnits,
        currency: &Currency,
        key: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = Self::build(account_id, kind, amount, currency, key)?;
        self.insert(record.clone())?;
        debug!(
            record_id = %record.id,
            account = account_id,
            kind = %kind,
            amount,
            key,
            "Record opened"
        );
        Ok(record)
    }

    /// Persist a record directly in the completed state
    ///
    /// Used for the receiving side of a transfer, which is written inside the
    /// transfer's atomic unit once both balances have moved.
    pub fn record_completed(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: MinorUnits,
        currency: &Currency,
        key: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let mut record = Self::build(account_id, kind, amount, currency, key)?;
        record.status = TransactionStatus::Completed;
        self.insert(record.clone())?;
        debug!(
            record_id = %record.id,
            account = account_id,
            kind = %kind,
            amount,
            key,
            "Completed record written"
        );
        Ok(record)
    }

    fn build(
        account_id: AccountId,
        kind: TransactionKind,
        amount: MinorUnits,
        currency: &Currency,
        key: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::invalid_amount(amount));
        }
        if key.trim().is_empty() {
            return Err(LedgerError::MissingKey);
        }
        Ok(TransactionRecord::pending(
            account_id,
            kind,
            amount,
            currency.clone(),
            key,
        ))
    }

    fn insert(&self, record: TransactionRecord) -> Result<(), LedgerError> {
        let mut ids = self
            .by_key
            .entry(record.idempotency_key.clone())
            .or_default();

        let duplicate = ids.iter().any(|id| {
            self.records
                .get(id)
                .is_some_and(|existing| existing.kind == record.kind)
        });
        if duplicate {
            return Err(LedgerError::DuplicateRecord {
                key: record.idempotency_key.clone(),
                kind: record.kind.to_string(),
            });
        }

        ids.push(record.id);
        self.by_account
            .entry(record.account_id)
            .or_default()
            .push(record.id);
        self.records.insert(record.id, record);
        Ok(())
    }

    /// Mark a pending record completed
    pub fn complete(&self, id: RecordId) -> Result<TransactionRecord, LedgerError> {
        let record = self.transition(id, TransactionStatus::Completed, None)?;
        debug!(record_id = %id, key = %record.idempotency_key, "Record completed");
        Ok(record)
    }

    /// Mark a pending record failed, keeping the error's reason and code
    pub fn fail(
        &self,
        id: RecordId,
        error: &LedgerError,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self.transition(id, TransactionStatus::Failed, Some(error))?;
        info!(
            record_id = %id,
            key = %record.idempotency_key,
            code = error.code(),
            reason = %error,
            "Record failed"
        );
        Ok(record)
    }

    fn transition(
        &self,
        id: RecordId,
        status: TransactionStatus,
        failure: Option<&LedgerError>,
    ) -> Result<TransactionRecord, LedgerError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(LedgerError::RecordNotFound { id })?;
        let record = entry.value_mut();

        if record.is_terminal() {
            warn!(
                record_id = %id,
                status = %record.status,
                "Rejected transition of terminal record"
            );
            return Err(LedgerError::InvalidTransition {
                id,
                status: record.status,
            });
        }

        record.status = status;
        record.failure_reason = failure.map(ToString::to_string);
        record.failure_code = failure.map(|error| error.code().to_string());
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Remove a record written inside a unit that is being rolled back
    pub(crate) fn discard(&self, id: RecordId) {
        if let Some((_, record)) = self.records.remove(&id) {
            if let Some(mut ids) = self.by_key.get_mut(&record.idempotency_key) {
                ids.retain(|existing| *existing != id);
            }
            if let Some(mut ids) = self.by_account.get_mut(&record.account_id) {
                ids.retain(|existing| *existing != id);
            }
            debug!(record_id = %id, "Record discarded by rollback");
        }
    }

    pub fn get(&self, id: RecordId) -> Option<TransactionRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// All records written under an idempotency key
    pub fn find_by_key(&self, key: &str) -> Vec<TransactionRecord> {
        let ids = match self.by_key.get(key) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    /// The record that speaks for an idempotency key
    ///
    /// The `transfer_out` record wins when present; otherwise the sole (first)
    /// record under the key.
    pub fn authoritative_for_key(&self, key: &str) -> Option<TransactionRecord> {
        let mut records = self.find_by_key(key);
        match records
            .iter()
            .position(|record| record.kind == TransactionKind::TransferOut)
        {
            Some(index) => Some(records.swap_remove(index)),
            None => records.into_iter().next(),
        }
    }

    /// Every record of an account, oldest first
    pub fn history(&self, account_id: AccountId) -> Vec<TransactionRecord> {
        let ids = match self.by_account.get(&account_id) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    #[test]
    fn test_open_creates_pending_record() {
        let store = TransactionStore::new();

        let record = store
            .open(1, TransactionKind::Deposit, 10000, &usd(), "d1")
            .unwrap();

        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(store.get(record.id), Some(record));
    }

    #[rstest]
    #[case::zero_amount(0, "k", LedgerError::invalid_amount(0))]
    #[case::empty_key(10, "", LedgerError::MissingKey)]
    #[case::blank_key(10, "   ", LedgerError::MissingKey)]
    fn test_open_validation(
        #[case] amount: MinorUnits,
        #[case] key: &str,
        #[case] expected: LedgerError,
    ) {
        let store = TransactionStore::new();

        let result = store.open(1, TransactionKind::Withdrawal, amount, &usd(), key);

        assert_eq!(result.unwrap_err(), expected);
        assert!(store.is_empty());
    }

    #[test]
    fn test_complete_and_fail_are_terminal() {
        let store = TransactionStore::new();
        let completed = store
            .open(1, TransactionKind::Deposit, 5, &usd(), "a")
            .unwrap();
        let failed = store
            .open(1, TransactionKind::Withdrawal, 5, &usd(), "b")
            .unwrap();

        store.complete(completed.id).unwrap();
        store
            .fail(failed.id, &LedgerError::insufficient_funds(1, 0, 5))
            .unwrap();

        assert!(matches!(
            store.fail(completed.id, &LedgerError::storage("late")),
            Err(LedgerError::InvalidTransition {
                status: TransactionStatus::Completed,
                ..
            })
        ));
        assert!(matches!(
            store.complete(failed.id),
            Err(LedgerError::InvalidTransition {
                status: TransactionStatus::Failed,
                ..
            })
        ));
        let failed = store.get(failed.id).unwrap();
        assert!(failed
            .failure_reason
            .as_deref()
            .unwrap()
            .starts_with("Insufficient funds"));
    }

    #[test]
    fn test_fail_keeps_error_code() {
        let store = TransactionStore::new();
        let record = store
            .open(1, TransactionKind::Deposit, 5, &usd(), "a")
            .unwrap();

        let error = LedgerError::arithmetic_overflow("deposit", 1);
        let failed = store.fail(record.id, &error).unwrap();

        assert_eq!(failed.failure_reason, Some(error.to_string()));
        assert_eq!(failed.failure_code.as_deref(), Some("ARITHMETIC_OVERFLOW"));
        assert_eq!(store.get(record.id).unwrap(), failed);
    }

    #[test]
    fn test_unknown_record() {
        let store = TransactionStore::new();
        let id = uuid::Uuid::new_v4();

        assert_eq!(
            store.complete(id).unwrap_err(),
            LedgerError::RecordNotFound { id }
        );
    }

    #[test]
    fn test_key_unique_per_kind() {
        let store = TransactionStore::new();
        store
            .open(1, TransactionKind::Deposit, 5, &usd(), "k")
            .unwrap();

        let result = store.open(1, TransactionKind::Deposit, 5, &usd(), "k");

        assert!(matches!(result, Err(LedgerError::DuplicateRecord { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_transfer_pair_shares_key() {
        let store = TransactionStore::new();
        let out = store
            .open(1, TransactionKind::TransferOut, 1000, &usd(), "t1")
            .unwrap();
        let incoming = store
            .record_completed(
                2,
                TransactionKind::TransferIn,
                850,
                &Currency::new("EUR").unwrap(),
                "t1",
            )
            .unwrap();

        assert_eq!(incoming.status, TransactionStatus::Completed);
        assert_eq!(store.find_by_key("t1").len(), 2);
        assert_eq!(store.authoritative_for_key("t1").unwrap().id, out.id);
    }

    #[test]
    fn test_authoritative_for_single_record() {
        let store = TransactionStore::new();
        let record = store
            .open(1, TransactionKind::Withdrawal, 5, &usd(), "w")
            .unwrap();

        assert_eq!(store.authoritative_for_key("w").unwrap().id, record.id);
        assert!(store.authoritative_for_key("missing").is_none());
    }

    #[test]
    fn test_discard_removes_record_and_index() {
        let store = TransactionStore::new();
        let record = store
            .record_completed(2, TransactionKind::TransferIn, 5, &usd(), "t")
            .unwrap();

        store.discard(record.id);

        assert!(store.get(record.id).is_none());
        assert!(store.find_by_key("t").is_empty());
        // The key can be used again for the same kind after a rollback
        assert!(store
            .record_completed(2, TransactionKind::TransferIn, 5, &usd(), "t")
            .is_ok());
    }

    #[test]
    fn test_history_filters_by_account() {
        let store = TransactionStore::new();
        store
            .open(1, TransactionKind::Deposit, 5, &usd(), "a")
            .unwrap();
        store
            .open(2, TransactionKind::Deposit, 5, &usd(), "b")
            .unwrap();
        store
            .open(1, TransactionKind::Withdrawal, 3, &usd(), "c")
            .unwrap();

        let history = store.history(1);

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|record| record.account_id == 1));
    }

    #[test]
    fn test_concurrent_opens_same_key_single_winner() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(TransactionStore::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store
                    .open(1, TransactionKind::Deposit, 5, &usd(), "same")
                    .is_ok()
            }));
        }

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
