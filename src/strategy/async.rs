//! Asynchronous batch processing strategy
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches, max_conflict_retries)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (owner partitioning + conflict retry)
//!         └── TransactionCoordinator
//!             └── InMemoryLedgerStore (DashMap rows, optimistic commit)
//! ```
//!
//! Batches run one after another so an owner's operations keep file order
//! across batch boundaries. Within a batch each owner gets its own task on a
//! multi-thread runtime. Operations touching another owner's instruments
//! (transfers) race through commit validation and are retried on conflict,
//! so their relative order against that owner's own operations is not
//! fixed.

use crate::core::batch_processor::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::strategy::{report, write_positions, LedgerSetup, ProcessingStrategy};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Default resubmissions after a commit conflict
pub const DEFAULT_CONFLICT_RETRIES: u32 = 16;

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Worker threads for the runtime
    pub max_concurrent_batches: usize,
    /// Resubmissions allowed for an operation that lost a commit race
    pub max_conflict_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
            max_conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero sizes with defaults
    ///
    /// Zero conflict retries is valid: conflicts then surface immediately.
    pub fn new(batch_size: usize, max_concurrent_batches: usize, max_conflict_retries: u32) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid concurrency, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
            max_conflict_retries,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    setup: LedgerSetup,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(setup: LedgerSetup, config: BatchConfig) -> Self {
        Self { setup, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| LedgerError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let coordinator = self.setup.open().await?;
            let store = coordinator.store().clone();
            let processor = BatchProcessor::new(coordinator, self.config.max_conflict_retries);

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| LedgerError::Io {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;

            // csv-async reads futures::io, tokio files speak tokio::io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0usize;
            let mut rejected = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for outcome in processor.process_batch(batch).await {
                    report(&outcome.operation, &outcome.result);
                    if outcome.result.is_ok() {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
            }
            info!(applied, rejected, "input processed");

            write_positions(store.as_ref(), output).await
        })
    }
}
