//! Transfer orchestration
//!
//! Moves funds between two accounts as one atomic unit, on top of the
//! account ledger, the record store and the idempotency coordinator.
//!
//! # Flow
//!
//! ```text
//! transfer(from, to, amount, key)
//!   validate (SelfTransfer, InvalidAmount)        -- before the coordinator
//!   coordinator.execute(key)
//!     open transfer_out (pending) on sender        -- before any lock
//!     unit:
//!       lock both accounts, ascending id order
//!       re-read balances under the locks
//!       convert amount sender -> receiver currency
//!       debit sender, credit receiver
//!       write transfer_in (completed), complete transfer_out
//!       any error -> roll back balances and transfer_in
//!     unit failed -> mark transfer_out failed (outside the unit)
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::account_manager::{AccountLock, AccountManager};
use super::idempotency::IdempotencyCoordinator;
use super::traits::ExchangeRates;
use super::transaction_store::TransactionStore;
use crate::types::{
    to_minor_units, AccountId, LedgerError, MinorUnits, Outcome, RecordId, TransactionKind,
    TransactionRecord,
};

/// Undo log for one transfer unit
///
/// Holds both row locks for the lifetime of the unit, so a rollback restores
/// balances that no one else could have observed.
struct TransferUnit {
    sender: AccountLock,
    receiver: AccountLock,
    sender_balance: MinorUnits,
    receiver_balance: MinorUnits,
    written: Vec<RecordId>,
}

impl TransferUnit {
    fn begin(sender: AccountLock, receiver: AccountLock) -> Self {
        Self {
            sender_balance: sender.balance(),
            receiver_balance: receiver.balance(),
            sender,
            receiver,
            written: Vec::new(),
        }
    }

    fn rollback(mut self, store: &TransactionStore) {
        self.sender.restore(self.sender_balance);
        self.receiver.restore(self.receiver_balance);
        for id in self.written.drain(..) {
            store.discard(id);
        }
        debug!(
            sender = self.sender.id(),
            receiver = self.receiver.id(),
            "Transfer unit rolled back"
        );
    }
}

/// Composes ledger, store, rates and coordinator into atomic transfers
#[derive(Clone)]
pub struct TransferOrchestrator {
    accounts: Arc<AccountManager>,
    store: Arc<TransactionStore>,
    rates: Arc<dyn ExchangeRates>,
    coordinator: IdempotencyCoordinator,
}

impl TransferOrchestrator {
    pub fn new(
        accounts: Arc<AccountManager>,
        store: Arc<TransactionStore>,
        rates: Arc<dyn ExchangeRates>,
        coordinator: IdempotencyCoordinator,
    ) -> Self {
        Self {
            accounts,
            store,
            rates,
            coordinator,
        }
    }

    /// Transfer `amount` (in the sender's currency) from one account to another
    ///
    /// Self transfers and invalid amounts are rejected before the idempotency
    /// key is claimed. Business failures after the `transfer_out` record is
    /// opened come back as a failed `Outcome`; the payload is always the
    /// `transfer_out` record.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        if from == to {
            return Err(LedgerError::self_transfer(from));
        }
        let amount = to_minor_units(amount)?;

        self.coordinator
            .execute(key, || self.run(from, to, amount, key))
            .await
    }

    async fn run(
        &self,
        from: AccountId,
        to: AccountId,
        amount: MinorUnits,
        key: &str,
    ) -> Result<Outcome, LedgerError> {
        // Only the currency is read here; the balance is re-read under lock
        let sender = self.accounts.get(from).await?;
        self.accounts.get(to).await?;

        let outgoing = self.store.open(
            from,
            TransactionKind::TransferOut,
            amount,
            &sender.currency,
            key,
        )?;

        match self.execute_unit(&outgoing, to).await {
            Ok(completed) => {
                info!(
                    key,
                    from,
                    to,
                    amount,
                    record_id = %completed.id,
                    "Transfer completed"
                );
                Ok(Outcome::completed(completed))
            }
            Err(e) => {
                warn!(key, from, to, amount, error = %e, "Transfer failed");
                let failed = self.store.fail(outgoing.id, &e)?;
                Ok(Outcome::failed(failed, &e))
            }
        }
    }

    /// The atomic part of a transfer
    ///
    /// Either every step lands or nothing does. Locks are released when the
    /// unit is dropped, after commit or rollback.
    async fn execute_unit(
        &self,
        outgoing: &TransactionRecord,
        to: AccountId,
    ) -> Result<TransactionRecord, LedgerError> {
        let (sender, receiver) = self.accounts.lock_pair(outgoing.account_id, to).await?;
        let mut unit = TransferUnit::begin(sender, receiver);

        match self.apply(&mut unit, outgoing).await {
            Ok(completed) => Ok(completed),
            Err(e) => {
                unit.rollback(&self.store);
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        unit: &mut TransferUnit,
        outgoing: &TransactionRecord,
    ) -> Result<TransactionRecord, LedgerError> {
        let from_currency = unit.sender.currency().clone();
        let to_currency = unit.receiver.currency().clone();

        let converted = self
            .rates
            .convert(outgoing.amount, &from_currency, &to_currency)
            .await?;
        if converted == 0 {
            return Err(LedgerError::invalid_amount(format!(
                "{} {} converts to 0 {}",
                outgoing.amount, from_currency, to_currency
            )));
        }

        unit.sender.debit(outgoing.amount)?;
        unit.receiver.credit(converted)?;

        let incoming = self.store.record_completed(
            unit.receiver.id(),
            TransactionKind::TransferIn,
            converted,
            &to_currency,
            &outgoing.idempotency_key,
        )?;
        unit.written.push(incoming.id);

        let completed = self.store.complete(outgoing.id)?;
        debug!(
            sender = unit.sender.id(),
            sender_balance = unit.sender.balance(),
            receiver = unit.receiver.id(),
            receiver_balance = unit.receiver.balance(),
            converted,
            "Transfer unit committed"
        );
        Ok(completed)
    }
}
