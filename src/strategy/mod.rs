//! Processing strategy module for ledger runs
//!
//! A run provisions a store from an optional seed, feeds every operation in
//! the input CSV through the transaction coordinator, and writes the final
//! instrument positions. The strategies differ only in how operations are
//! scheduled: `sync` runs them one at a time in file order, `async` reads
//! batches and runs owners in parallel.

use crate::cli::StrategyType;
use crate::core::{
    IdentifierGenerator, InMemoryLedgerStore, LedgerConfig, LedgerStore, RandomNumberSource,
    TransactionCoordinator,
};
use crate::io::csv_format::write_positions_csv;
use crate::io::seed::{load_seed, provision};
use crate::types::{LedgerError, Operation, Receipt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete ledger runs
pub trait ProcessingStrategy: Send + Sync {
    /// Run every operation in `input_path` and write positions to `output`
    ///
    /// # Errors
    ///
    /// Returns an error if the seed or input cannot be read, provisioning
    /// fails, or output cannot be written. A rejected operation is logged and
    /// the run continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError>;
}

/// Everything needed to open a ledger before processing starts
#[derive(Debug, Clone, Default)]
pub struct LedgerSetup {
    /// JSON seed to provision from; an empty ledger when absent
    pub seed: Option<PathBuf>,
    pub config: LedgerConfig,
}

impl LedgerSetup {
    pub fn new(seed: Option<PathBuf>, config: LedgerConfig) -> Self {
        Self { seed, config }
    }

    /// Build a store, provision the seed and wrap it in a coordinator
    pub(crate) async fn open(
        &self,
    ) -> Result<TransactionCoordinator<InMemoryLedgerStore>, LedgerError> {
        let store = Arc::new(InMemoryLedgerStore::new());

        if let Some(path) = &self.seed {
            let seed = load_seed(path)?;
            let mut generator =
                IdentifierGenerator::new(RandomNumberSource::new(), self.config.id_attempts);
            provision(store.as_ref(), seed, &mut generator).await?;
        }

        Ok(TransactionCoordinator::new(store, self.config.clone()))
    }
}

/// Log the outcome of one operation
pub(crate) fn report(operation: &Operation, result: &Result<Receipt, LedgerError>) {
    match result {
        Ok(receipt) => debug!(
            op = operation.name(),
            owner = operation.owner(),
            records = receipt.records().len(),
            "operation applied"
        ),
        Err(e) => warn!(
            op = operation.name(),
            owner = operation.owner(),
            error = %e,
            "operation failed"
        ),
    }
}

/// Snapshot the store and write every position
pub(crate) async fn write_positions<S: LedgerStore>(
    store: &S,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let snapshot = store.snapshot().await?;
    write_positions_csv(&snapshot, output)
}

/// Create a processing strategy based on the specified strategy type
///
/// `batch` is ignored by the sync strategy.
pub fn create_strategy(
    strategy_type: StrategyType,
    setup: LedgerSetup,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(setup)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            setup,
            batch.unwrap_or_default(),
        )),
    }
}
