use crate::core::config::{LedgerConfig, PaymentPolicy, SourceDebit, DEFAULT_ID_ATTEMPTS};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Run banking operations against a seeded ledger
#[derive(Parser, Debug)]
#[command(name = "ledger-core")]
#[command(
    about = "Run banking operations against a seeded ledger and print final positions",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file path containing operations
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// JSON seed with the accounts, cards and loans to provision
    #[arg(long = "seed", value_name = "SEED")]
    pub seed: Option<PathBuf>,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for in-order or 'async' for owner-parallel batches"
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
        help = "Worker threads for owner-parallel processing (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Resubmissions after a commit conflict (async mode only)
    #[arg(long = "max-conflict-retries", value_name = "COUNT")]
    pub max_conflict_retries: Option<u32>,

    /// Amount a credit card payment debits from its source account
    #[arg(long = "card-payment-debit", value_enum, default_value = "applied")]
    pub card_payment_debit: SourceDebit,

    /// Amount a loan payment debits from its source account
    #[arg(long = "loan-payment-debit", value_enum, default_value = "requested")]
    pub loan_payment_debit: SourceDebit,

    /// Candidates tried per generated account or card number
    #[arg(long = "id-attempts", value_name = "COUNT", default_value_t = DEFAULT_ID_ATTEMPTS)]
    pub id_attempts: u32,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values take their defaults; zero sizes fall back with a
    /// warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        let default = BatchConfig::default();
        if self.batch_size.is_none()
            && self.max_concurrent_batches.is_none()
            && self.max_conflict_retries.is_none()
        {
            return default;
        }

        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
            self.max_conflict_retries
                .unwrap_or(default.max_conflict_retries),
        )
    }

    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig::new(
            PaymentPolicy {
                card_payment: self.card_payment_debit,
                loan_payment: self.loan_payment_debit,
            },
            self.id_attempts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[test]
    fn test_seed_is_optional() {
        let parsed = CliArgs::try_parse_from(["program", "input.csv"]).unwrap();
        assert!(parsed.seed.is_none());

        let parsed =
            CliArgs::try_parse_from(["program", "--seed", "seed.json", "input.csv"]).unwrap();
        assert_eq!(parsed.seed, Some(PathBuf::from("seed.json")));
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get(), 16)]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get(), 16)]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8, 16)]
    #[case::custom_retries(&["program", "--max-conflict-retries", "0", "input.csv"], 1000, num_cpus::get(), 0)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get(), 16)]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get(), 16)]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] retries: u32,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, batch_size);
        assert_eq!(config.max_concurrent_batches, max_concurrent);
        assert_eq!(config.max_conflict_retries, retries);
    }

    #[rstest]
    #[case::defaults(&["program", "input.csv"], SourceDebit::Applied, SourceDebit::Requested)]
    #[case::flipped(
        &["program", "--card-payment-debit", "requested", "--loan-payment-debit", "applied", "input.csv"],
        SourceDebit::Requested,
        SourceDebit::Applied
    )]
    fn test_payment_policy(
        #[case] args: &[&str],
        #[case] card: SourceDebit,
        #[case] loan: SourceDebit,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_ledger_config();
        assert_eq!(config.payment_policy.card_payment, card);
        assert_eq!(config.payment_policy.loan_payment, loan);
    }

    #[test]
    fn test_zero_id_attempts_falls_back() {
        let config = CliArgs::try_parse_from(["program", "--id-attempts", "0", "input.csv"])
            .unwrap()
            .to_ledger_config();
        assert_eq!(config.id_attempts, DEFAULT_ID_ATTEMPTS);
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_debit(&["program", "--card-payment-debit", "all", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
