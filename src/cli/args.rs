use crate::adapters::{RateSpec, StaticRates};
use crate::config::{LedgerConfig, LogConfig};
use crate::strategy::{BatchConfig, LedgerSettings};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay ledger operations with idempotent, concurrency-safe processing
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay ledger operations and print the resulting account balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Replay strategy: 'sync' for file order or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for concurrent replay (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Exchange rates, repeatable
    #[arg(
        long = "rate",
        value_name = "FROM:TO=MULTIPLIER",
        help = "Directed exchange rate, e.g. USD:EUR=0.85 (repeatable)"
    )]
    pub rates: Vec<RateSpec>,

    /// Lifetime of the in-progress idempotency marker, in seconds
    #[arg(long = "in-progress-ttl", value_name = "SECONDS", default_value_t = 60)]
    pub in_progress_ttl: u64,

    /// Lifetime of a cached outcome, in seconds
    #[arg(long = "outcome-ttl", value_name = "SECONDS", default_value_t = 3600)]
    pub outcome_ttl: u64,

    /// Log filter, overridden by RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, falling back to defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig::with_ttls(
            Duration::from_secs(self.in_progress_ttl),
            Duration::from_secs(self.outcome_ttl),
        )
    }

    pub fn to_ledger_settings(&self) -> LedgerSettings {
        LedgerSettings::new(
            self.to_ledger_config(),
            StaticRates::from_specs(self.rates.iter().cloned()),
        )
    }

    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }
}
