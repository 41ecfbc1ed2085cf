//! Processing strategy module for operation replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! covering both CSV parsing and ledger processing. This allows different
//! implementations (sequential, concurrent batch) to be selected at runtime.

use crate::adapters::StaticRates;
use crate::cli::StrategyType;
use crate::config::LedgerConfig;
use crate::core::{Applied, Ledger, ProcessingResult};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Everything needed to build the ledger a replay runs against
#[derive(Debug, Clone, Default)]
pub struct LedgerSettings {
    pub config: LedgerConfig,
    pub rates: StaticRates,
}

impl LedgerSettings {
    pub fn new(config: LedgerConfig, rates: StaticRates) -> Self {
        Self { config, rates }
    }

    /// Fresh, empty ledger backed by the in-process cache
    pub fn build_ledger(&self) -> Ledger {
        Ledger::in_memory(self.rates.clone(), self.config.clone())
    }
}

/// Processing strategy trait for complete replay pipelines
///
/// Each strategy reads operations from a CSV file, applies them to a fresh
/// ledger, and writes the final account table to `output`.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the operations in `input_path` and write the account table
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The runtime cannot be created
    /// - Output cannot be written
    ///
    /// Rejected or failed operations are logged and do not stop the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy for the given type
///
/// `config` is only used by the async strategy; `None` selects the default
/// batch configuration.
pub fn create_strategy(
    strategy_type: StrategyType,
    settings: LedgerSettings,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(settings)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(settings, config))
        }
    }
}

/// Per-run tally of replayed rows
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Operations that ran and succeeded
    pub applied: usize,
    /// Operations rejected with an error or finished with a failed outcome
    pub failed: usize,
    /// Rows that never became an operation
    pub skipped: usize,
}

impl ReplaySummary {
    /// Log one result and count it
    pub(crate) fn record(&mut self, result: &ProcessingResult) {
        log_result(result);
        if result.is_success() {
            self.applied += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Log the result of one replayed operation
fn log_result(result: &ProcessingResult) {
    let operation = &result.operation;
    match &result.result {
        Ok(Applied::Opened(account)) => {
            debug!(owner = operation.owner(), account = account.id, "Account opened")
        }
        Ok(Applied::Finished(outcome)) if outcome.success => {
            debug!(op = operation.name(), owner = operation.owner(), "Operation completed")
        }
        Ok(Applied::Finished(outcome)) => warn!(
            op = operation.name(),
            owner = operation.owner(),
            code = outcome.code.as_deref().unwrap_or("UNKNOWN"),
            reason = outcome.error.as_deref().unwrap_or(""),
            "Operation failed"
        ),
        // Bad input fails identically on every retry
        Err(e) if e.is_validation() => info!(
            op = operation.name(),
            owner = operation.owner(),
            code = e.code(),
            error = %e,
            "Operation rejected as invalid"
        ),
        Err(e) => warn!(
            op = operation.name(),
            owner = operation.owner(),
            code = e.code(),
            error = %e,
            "Operation rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_create_strategy_both_types_produce_same_table() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"type,owner,counterparty,amount,currency,key\n\
              open,alice,,,USD,\n\
              deposit,alice,,500,,d1\n",
        )
        .unwrap();
        file.flush().unwrap();

        let mut outputs = vec![];
        for strategy_type in [StrategyType::Sync, StrategyType::Async] {
            let strategy = create_strategy(strategy_type, LedgerSettings::default(), None);
            let mut output = Vec::new();
            strategy.process(file.path(), &mut output).unwrap();
            outputs.push(String::from_utf8(output).unwrap());
        }

        let expected = "account,owner,currency,balance\n1,alice,USD,500\n";
        assert_eq!(outputs[0], expected);
        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_summary_counts_only_successful_operations() {
        use crate::types::{Currency, Operation};
        use rust_decimal::Decimal;

        let ledger = Ledger::default();
        let operations = vec![
            Operation::Open {
                owner: "alice".to_string(),
                currency: Currency::new("USD").unwrap(),
            },
            Operation::Deposit {
                owner: "alice".to_string(),
                amount: Decimal::from(100),
                key: "d1".to_string(),
            },
            Operation::Withdraw {
                owner: "alice".to_string(),
                amount: Decimal::from(500),
                key: "w1".to_string(),
            },
            Operation::Deposit {
                owner: "ghost".to_string(),
                amount: Decimal::from(1),
                key: "g1".to_string(),
            },
        ];

        let mut summary = ReplaySummary::default();
        for operation in operations {
            let result = ledger.apply(operation.clone()).await;
            summary.record(&ProcessingResult { operation, result });
        }

        assert_eq!(
            summary,
            ReplaySummary {
                applied: 2,
                failed: 2,
                skipped: 0,
            }
        );
    }
}
