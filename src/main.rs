//! Ledger engine CLI
//!
//! Replays a CSV file of ledger operations and prints the final account
//! balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 operations.csv > accounts.csv
//! cargo run -- --rate USD:EUR=0.85 --rate EUR:USD=1.17 operations.csv > accounts.csv
//! RUST_LOG=debug cargo run -- --log-json operations.csv > accounts.csv
//! ```
//!
//! # Processing Strategies
//!
//! - **sync**: one operation at a time, in file order (default)
//! - **async**: batches, owners replayed concurrently
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, unreadable input, output failure)

use rust_ledger_engine::cli;
use rust_ledger_engine::logging;
use rust_ledger_engine::strategy;
use std::process;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = logging::init_logging(&args.to_log_config()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, args.to_ledger_settings(), config)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        tracing::error!(error = %e, "Replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
