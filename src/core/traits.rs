//! Core traits for the ledger's external collaborators
//!
//! The idempotency cache and the currency rate source live outside the
//! ledger. They are injected as trait objects so tests and deployments can
//! substitute their own implementations (see `crate::adapters`).

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{Currency, LedgerError, MinorUnits};

/// Key-value cache with expiry used to deduplicate in-flight operations
///
/// This is the minimal primitive set the idempotency coordinator needs. The
/// cache is best-effort: entries may be evicted at any time, so it is never
/// the source of truth once a terminal transaction record exists.
#[async_trait]
pub trait IdempotencyCache: Send + Sync {
    /// Store `value` under `key` only if the key is absent (or expired)
    ///
    /// Returns `true` if this call stored the value.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LedgerError>;

    /// Unconditionally store `value` under `key`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), LedgerError>;

    /// Fetch the live value under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), LedgerError>;
}

/// Currency conversion source
///
/// Same-currency conversion is the identity. Implementations fail with
/// `UnknownCurrency` for a currency they do not know and with
/// `ConversionUnavailable` when no rate exists for the pair.
#[async_trait]
pub trait ExchangeRates: Send + Sync {
    async fn convert(
        &self,
        amount: MinorUnits,
        from: &Currency,
        to: &Currency,
    ) -> Result<MinorUnits, LedgerError>;
}
