//! Batch processing with owner-based partitioning
//!
//! This module provides the `BatchProcessor`, which replays a batch of
//! operations against a shared [`Ledger`] with as much parallelism as the
//! ordering rules allow.
//!
//! # Ordering
//!
//! ```text
//! batch
//!   ├── open operations      -> applied first, sequentially, in file order
//!   └── everything else      -> partitioned by owner
//!         ├── owner A: ops in file order  ─┐
//!         ├── owner B: ops in file order  ─┼─ one tokio task per owner
//!         └── owner C: ops in file order  ─┘
//! ```
//!
//! Operations of one owner never overtake each other. Operations of
//! different owners interleave freely; a transfer between two owners is
//! serialized against the other owner's operations only by the account
//! locks, so balance-dependent outcomes across owners may differ from the
//! sequential replay.

use std::collections::HashMap;

use tokio::task::JoinError;
use tracing::{debug, error};

use super::engine::{Applied, Ledger};
use crate::types::{LedgerError, Operation, OwnerId};

/// Result of applying a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub operation: Operation,
    pub result: Result<Applied, LedgerError>,
}

impl ProcessingResult {
    /// `true` when the operation ran and did not fail
    pub fn is_success(&self) -> bool {
        match &self.result {
            Ok(Applied::Opened(_)) => true,
            Ok(Applied::Finished(outcome)) => outcome.success,
            Err(_) => false,
        }
    }
}

/// Concurrent batch replayer
#[derive(Clone)]
pub struct BatchProcessor {
    ledger: Ledger,
}

impl BatchProcessor {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Split a batch into open operations and per-owner queues
    ///
    /// Relative order is preserved inside each part.
    pub fn partition_by_owner(
        &self,
        batch: Vec<Operation>,
    ) -> (Vec<Operation>, HashMap<OwnerId, Vec<Operation>>) {
        let mut opens = Vec::new();
        let mut owner_batches: HashMap<OwnerId, Vec<Operation>> = HashMap::new();

        for operation in batch {
            if operation.is_open() {
                opens.push(operation);
            } else {
                owner_batches
                    .entry(operation.owner().to_string())
                    .or_default()
                    .push(operation);
            }
        }

        (opens, owner_batches)
    }

    /// Apply operations one after another
    pub async fn process_sequential(&self, operations: Vec<Operation>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());

        for operation in operations {
            let result = self.ledger.apply(operation.clone()).await;
            if let Err(e) = &result {
                debug!(
                    op = operation.name(),
                    owner = operation.owner(),
                    error = %e,
                    "Operation rejected"
                );
            }
            results.push(ProcessingResult { operation, result });
        }

        results
    }

    /// Apply one batch
    ///
    /// Returns once every operation in the batch has finished.
    pub async fn process_batch(&self, batch: Vec<Operation>) -> Vec<ProcessingResult> {
        let (opens, owner_batches) = self.partition_by_owner(batch);

        let mut results = self.process_sequential(opens).await;

        let mut tasks = Vec::with_capacity(owner_batches.len());
        for (owner, operations) in owner_batches {
            let processor = self.clone();
            let queued = operations.clone();
            let task = tokio::spawn(async move { processor.process_sequential(queued).await });
            tasks.push((owner, operations, task));
        }

        for (owner, operations, task) in tasks {
            results.extend(settle_owner(&owner, operations, task.await));
        }

        results
    }
}

/// Results of one owner's task
///
/// If the task died, each of its operations is reported as a storage
/// failure. Some of them may have been applied before the task died.
fn settle_owner(
    owner: &str,
    operations: Vec<Operation>,
    joined: Result<Vec<ProcessingResult>, JoinError>,
) -> Vec<ProcessingResult> {
    match joined {
        Ok(owner_results) => owner_results,
        Err(e) => {
            error!(owner, operations = operations.len(), error = %e, "Owner task failed");
            let reason = format!("replay task for owner '{}' failed: {}", owner, e);
            operations
                .into_iter()
                .map(|operation| ProcessingResult {
                    operation,
                    result: Err(LedgerError::storage(reason.clone())),
                })
                .collect()
        }
    }
}
