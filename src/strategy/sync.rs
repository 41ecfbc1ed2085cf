//! Sequential processing strategy
//!
//! Replays operations one at a time, in file order, on a single-threaded
//! tokio runtime. The result is fully deterministic for a given input.
//!
//! # Design
//!
//! The SyncProcessingStrategy only orchestrates, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Ledger operations to `Ledger::apply`
//! - CSV output to `csv_format::write_accounts_csv`
//!
//! Rows are streamed; memory grows with accounts and records, not with the
//! size of the input file.

use crate::core::ProcessingResult;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{LedgerSettings, ProcessingStrategy, ReplaySummary};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Sequential replay strategy
///
/// ```no_run
/// use rust_ledger_engine::strategy::{LedgerSettings, ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(LedgerSettings::default());
/// let mut output = std::io::stdout();
/// strategy
///     .process(Path::new("operations.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    settings: LedgerSettings,
}

impl SyncProcessingStrategy {
    pub fn new(settings: LedgerSettings) -> Self {
        Self { settings }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay the file in order
    ///
    /// 1. Opens a `SyncReader` over the input
    /// 2. Applies each operation to a fresh ledger, waiting for it to finish
    /// 3. Writes the final account table
    ///
    /// Fatal errors (file not found, I/O errors) are returned immediately.
    /// Row errors and failed operations are logged and processing continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let ledger = self.settings.build_ledger();
        let accounts = runtime.block_on(async {
            let mut summary = ReplaySummary::default();
            for row in reader {
                match row {
                    Ok(operation) => {
                        let result = ledger.apply(operation.clone()).await;
                        summary.record(&ProcessingResult { operation, result });
                    }
                    Err(e) => {
                        warn!(error = %e, "Skipping invalid row");
                        summary.skipped += 1;
                    }
                }
            }
            info!(
                applied = summary.applied,
                failed = summary.failed,
                skipped = summary.skipped,
                "Sequential replay finished"
            );
            ledger.accounts().all_accounts().await
        });

        write_accounts_csv(&accounts, output)?;

        Ok(())
    }
}
