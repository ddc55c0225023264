//! Ledger core CLI
//!
//! Provisions a ledger from a JSON seed, runs the operations in a CSV file
//! through the transaction coordinator, and prints the final positions of
//! every account, card and loan to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --seed seed.json operations.csv > positions.csv
//! cargo run -- --strategy sync --seed seed.json operations.csv > positions.csv
//! cargo run -- --batch-size 2000 --max-concurrent 8 --seed seed.json operations.csv
//! RUST_LOG=ledger_core=debug cargo run -- --seed seed.json operations.csv
//! ```
//!
//! Logs go to stderr. `-v` raises the default level to debug; `RUST_LOG`
//! overrides both.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, unreadable seed or input, provisioning failure)

use ledger_core::cli;
use ledger_core::strategy::{self, LedgerSetup};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = cli::parse_args();
    init_tracing(args.verbose);

    let setup = LedgerSetup::new(args.seed.clone(), args.to_ledger_config());
    let batch = match args.strategy {
        cli::StrategyType::Async => Some(args.to_batch_config()),
        cli::StrategyType::Sync => None,
    };
    let strategy = strategy::create_strategy(args.strategy, setup, batch);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
