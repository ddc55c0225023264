//! Synchronous processing strategy
//!
//! Runs operations one at a time in file order on a current-thread runtime.
//! Because nothing runs concurrently, no commit can conflict and the final
//! positions are fully determined by the input order.
//!
//! # Design
//!
//! The strategy only orchestrates:
//! - seed provisioning to `LedgerSetup`
//! - CSV parsing to `SyncReader` (iterator interface)
//! - operation semantics to `TransactionCoordinator`
//! - output to `csv_format::write_positions_csv`

use crate::io::sync_reader::SyncReader;
use crate::strategy::{report, write_positions, LedgerSetup, ProcessingStrategy};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_core::strategy::{LedgerSetup, ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::{Path, PathBuf};
/// use std::io;
///
/// let setup = LedgerSetup::new(Some(PathBuf::from("seed.json")), Default::default());
/// let strategy = SyncProcessingStrategy::new(setup);
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("operations.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    setup: LedgerSetup,
}

impl SyncProcessingStrategy {
    pub fn new(setup: LedgerSetup) -> Self {
        Self { setup }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| LedgerError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let coordinator = self.setup.open().await?;
            let reader = SyncReader::new(input_path)?;

            let mut applied = 0usize;
            let mut rejected = 0usize;
            for row in reader {
                match row {
                    Ok(operation) => {
                        let result = coordinator.execute(operation.clone()).await;
                        report(&operation, &result);
                        if result.is_ok() {
                            applied += 1;
                        } else {
                            rejected += 1;
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping operation row"),
                }
            }
            info!(applied, rejected, "input processed");

            write_positions(coordinator.store().as_ref(), output).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,owner,target,amount,source,counterparty,status,description\n";

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn seeded_strategy(seed: &NamedTempFile) -> SyncProcessingStrategy {
        SyncProcessingStrategy::new(LedgerSetup::new(
            Some(seed.path().to_path_buf()),
            Default::default(),
        ))
    }

    const SEED: &str = r#"{
        "accounts": [
            { "id": 1, "owner": 1, "number": "1000000001", "account_type": "checking", "balance": "100" },
            { "id": 2, "owner": 2, "number": "1000000002", "account_type": "savings", "balance": "0" }
        ]
    }"#;

    #[test]
    fn test_sync_strategy_applies_operations_in_order() {
        let seed = create_temp_file(SEED);
        let input = create_temp_file(&format!(
            "{}withdrawal,1,1,100,,,,\nwithdrawal,1,1,1,,,,\ndeposit,2,2,25.5,,,,\n",
            HEADER
        ));

        let mut output = Vec::new();
        seeded_strategy(&seed)
            .process(input.path(), &mut output)
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("account,1,1,1000000001,checking,,0.00,,,"));
        assert!(output.contains("account,2,2,1000000002,savings,,25.50,,,"));
    }

    #[test]
    fn test_sync_strategy_continues_on_malformed_row() {
        let seed = create_temp_file(SEED);
        let input = create_temp_file(&format!(
            "{}deposit,1,1,10,,,,\ndeposit,1,1,invalid,,,,\ndeposit,1,1,5,,,,\n",
            HEADER
        ));

        let mut output = Vec::new();
        seeded_strategy(&seed)
            .process(input.path(), &mut output)
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("account,1,1,1000000001,checking,,115.00,,,"));
    }

    #[test]
    fn test_sync_strategy_without_seed_writes_header_only() {
        let input = create_temp_file(&format!("{}deposit,1,1,10,,,,\n", HEADER));

        let mut output = Vec::new();
        SyncProcessingStrategy::default()
            .process(input.path(), &mut output)
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.starts_with("instrument,id,owner"));
    }

    #[test]
    fn test_sync_strategy_handles_missing_input() {
        let mut output = Vec::new();
        let result = SyncProcessingStrategy::default().process(Path::new("nonexistent.csv"), &mut output);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to open file"));
    }

    #[test]
    fn test_sync_strategy_handles_missing_seed() {
        let input = create_temp_file(HEADER);
        let strategy = SyncProcessingStrategy::new(LedgerSetup::new(
            Some("no_such_seed.json".into()),
            Default::default(),
        ));

        let mut output = Vec::new();
        let result = strategy.process(input.path(), &mut output);
        assert!(matches!(result, Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
