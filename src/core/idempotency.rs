//! Idempotency coordinator
//!
//! Deduplicates retried and concurrent requests that carry the same
//! caller-supplied key, so that an operation's side effects run at most once.
//!
//! # Algorithm
//!
//! ```text
//! execute(key, op)
//!   1. terminal record under key?     -> its outcome (durable, survives eviction)
//!   2. SET idempotency:<key> IN_PROGRESS NX EX in_progress_ttl
//!      ├── claimed  -> run op
//!      │               ├── Ok(outcome) -> SET outcome EX outcome_ttl, return it
//!      │               └── Err(e)      -> DEL marker, return e
//!      └── taken    -> GET
//!                      ├── IN_PROGRESS -> AlreadyProcessing (never waits)
//!                      └── outcome     -> return cached outcome
//! ```
//!
//! # Known risk
//!
//! The in-progress marker expires after `in_progress_ttl`. If an operation
//! runs longer than that and has not yet reached a terminal record, a second
//! caller can claim the key and start the same operation. The store's
//! per-(key, kind) uniqueness rejects the second record, but the window is
//! not closed by the coordinator itself.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::traits::IdempotencyCache;
use super::transaction_store::TransactionStore;
use crate::config::LedgerConfig;
use crate::types::{LedgerError, Outcome};

/// Sentinel stored while the owning worker runs the operation
pub const IN_PROGRESS: &str = "IN_PROGRESS";

/// Claim attempts before giving up on a key that keeps vanishing between
/// `set_if_absent` and `get`
const MAX_CLAIM_ATTEMPTS: usize = 2;

/// Runs operations at most once per idempotency key
#[derive(Clone)]
pub struct IdempotencyCoordinator {
    cache: Arc<dyn IdempotencyCache>,
    store: Arc<TransactionStore>,
    config: LedgerConfig,
}

impl IdempotencyCoordinator {
    pub fn new(
        cache: Arc<dyn IdempotencyCache>,
        store: Arc<TransactionStore>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            cache,
            store,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `operation` unless `key` has already been (or is being) processed
    ///
    /// `operation` is only invoked by the caller that claims the key.
    /// Business failures must be returned as `Ok` failed outcomes so they are
    /// cached; an `Err` from `operation` releases the key and is propagated.
    pub async fn execute<F, Fut>(&self, key: &str, operation: F) -> Result<Outcome, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome, LedgerError>>,
    {
        if key.trim().is_empty() {
            return Err(LedgerError::MissingKey);
        }

        if let Some(outcome) = self.durable_outcome(key) {
            debug!(key, "Replaying outcome from terminal record");
            return Ok(outcome);
        }

        let cache_key = self.config.cache_key(key);
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let claimed = self
                .cache
                .set_if_absent(&cache_key, IN_PROGRESS, self.config.in_progress_ttl)
                .await?;

            if claimed {
                debug!(key, "Idempotency key claimed");
                return self.run_claimed(key, &cache_key, operation).await;
            }

            match self.cache.get(&cache_key).await? {
                Some(value) if value == IN_PROGRESS => {
                    info!(key, "Rejected: operation already in progress");
                    return Err(LedgerError::already_processing(key));
                }
                Some(value) => {
                    let outcome: Outcome = serde_json::from_str(&value)?;
                    debug!(key, "Replaying cached outcome");
                    return Ok(outcome);
                }
                // Entry expired between the two calls; try to claim again
                None => continue,
            }
        }

        Err(LedgerError::already_processing(key))
    }

    async fn run_claimed<F, Fut>(
        &self,
        key: &str,
        cache_key: &str,
        operation: F,
    ) -> Result<Outcome, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome, LedgerError>>,
    {
        match operation().await {
            Ok(outcome) => {
                let serialized = serde_json::to_string(&outcome)?;
                if let Err(e) = self
                    .cache
                    .set(cache_key, &serialized, self.config.outcome_ttl)
                    .await
                {
                    // The terminal record still answers replays
                    warn!(key, error = %e, "Failed to cache outcome");
                }
                info!(key, success = outcome.success, "Operation finished");
                Ok(outcome)
            }
            Err(e) => {
                warn!(key, error = %e, "Operation failed unexpectedly; releasing key");
                if let Err(release) = self.cache.delete(cache_key).await {
                    warn!(key, error = %release, "Failed to release idempotency key");
                }
                Err(e)
            }
        }
    }

    fn durable_outcome(&self, key: &str) -> Option<Outcome> {
        self.store
            .authoritative_for_key(key)
            .and_then(Outcome::from_record)
    }
}
