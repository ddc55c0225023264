//! End-to-end integration tests
//!
//! Each fixture under tests/fixtures/<name>/ holds:
//! - `seed.json` - instruments provisioned before processing
//! - `input.csv` - operations to run
//! - `expected.csv` - final positions
//!
//! Fixtures cover the happy path, insufficiency rejections, card lifecycle,
//! loan payoff, ownership scoping and malformed input. Owners in the same
//! fixture only interact through order-independent operations, so both
//! strategies must produce identical output.

#[cfg(test)]
mod tests {
    use ledger_core::cli::StrategyType;
    use ledger_core::strategy::{create_strategy, BatchConfig, LedgerSetup};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;

    /// Run `fixture_name` with `strategy_type` and compare against expected.csv
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType) {
        let fixture_dir = PathBuf::from("tests/fixtures").join(fixture_name);
        let seed_path = fixture_dir.join("seed.json");
        let input_path = fixture_dir.join("input.csv");
        let expected_path = fixture_dir.join("expected.csv");

        for path in [&seed_path, &input_path, &expected_path] {
            assert!(path.exists(), "Fixture file not found: {}", path.display());
        }

        // small batches so owners span several batches
        let strategy = create_strategy(
            strategy_type,
            LedgerSetup::new(Some(seed_path), Default::default()),
            Some(BatchConfig::new(3, 2, 64)),
        );

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process operations: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path).unwrap_or_else(|e| {
            panic!(
                "Failed to read expected file {}: {}",
                expected_path.display(),
                e
            )
        });

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("card_lifecycle")]
    #[case("loan_payoff")]
    #[case("ownership")]
    #[case("malformed_data")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy);
    }
}
