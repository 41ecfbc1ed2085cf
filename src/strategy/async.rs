//! Concurrent batch processing strategy
//!
//! Replays operations in batches on a multi-threaded tokio runtime, running
//! different owners in parallel.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (open-first, then owner partitioning)
//!     └── Ledger (shared by every task)
//! ```
//!
//! Batches run one after another, so an owner whose operations span several
//! batches still sees them in file order. Within a batch, owners run
//! concurrently.

use crate::core::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::{LedgerSettings, ProcessingStrategy, ReplaySummary};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Worker threads of the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches, default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Concurrent batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    settings: LedgerSettings,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(settings: LedgerSettings, config: BatchConfig) -> Self {
        Self { settings, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the file batch by batch
    ///
    /// 1. Builds a multi-threaded runtime with `max_concurrent_batches` workers
    /// 2. Reads batches with `AsyncReader`
    /// 3. Hands each batch to the `BatchProcessor` and waits for it
    /// 4. Writes the final account table
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let ledger = self.settings.build_ledger();
            let processor = BatchProcessor::new(ledger.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads `futures` AsyncRead, tokio files implement the tokio trait
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut batches = 0usize;
            let mut summary = ReplaySummary::default();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                batches += 1;
                debug!(batch = batches, operations = results.len(), "Batch applied");
                results.iter().for_each(|result| summary.record(result));
            }
            info!(
                batches,
                applied = summary.applied,
                failed = summary.failed,
                "Concurrent replay finished"
            );

            let accounts = ledger.accounts().all_accounts().await;
            write_accounts_csv(&accounts, output)?;

            Ok(())
        })
    }
}
