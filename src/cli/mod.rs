// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, StrategyType};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Invalid arguments and `--help` make clap print a message and exit the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
