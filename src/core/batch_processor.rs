//! Batch processing with owner-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which runs a batch of
//! operations concurrently while keeping each owner's operations in order.
//!
//! # Design
//!
//! A batch is partitioned by acting owner. Each owner's operations run
//! sequentially in their own tokio task, so operations from different
//! owners proceed in parallel. Cross-owner effects (a transfer crediting
//! someone else's account) are serialized by the store's commit-time
//! validation; an operation that loses that race fails with `Conflict` and
//! is resubmitted here, up to `max_conflict_retries` times.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── TransactionCoordinator<S>  (shared, cheap to clone)
//!     └── max_conflict_retries
//! ```

use crate::core::coordinator::TransactionCoordinator;
use crate::core::traits::LedgerStore;
use crate::types::{LedgerError, Operation, OwnerId, Receipt};
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{error, warn};

/// Result of processing a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub operation: Operation,
    pub result: Result<Receipt, LedgerError>,
    /// Number of times the operation was submitted
    pub attempts: u32,
}

/// Batch processor with owner-based partitioning
pub struct BatchProcessor<S: LedgerStore> {
    coordinator: TransactionCoordinator<S>,
    max_conflict_retries: u32,
}

impl<S: LedgerStore> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

impl<S: LedgerStore + 'static> BatchProcessor<S> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Coordinator shared by every owner task
    /// * `max_conflict_retries` - Resubmissions allowed after a `Conflict`
    pub fn new(coordinator: TransactionCoordinator<S>, max_conflict_retries: u32) -> Self {
        Self {
            coordinator,
            max_conflict_retries,
        }
    }

    /// Partition a batch of operations by acting owner
    ///
    /// # Guarantees
    ///
    /// - Each operation appears in exactly one sub-batch
    /// - Operations for each owner keep their original order
    pub fn partition_by_owner(&self, batch: Vec<Operation>) -> HashMap<OwnerId, Vec<Operation>> {
        let mut owner_batches: HashMap<OwnerId, Vec<Operation>> = HashMap::new();

        for operation in batch {
            owner_batches
                .entry(operation.owner())
                .or_default()
                .push(operation);
        }

        owner_batches
    }

    /// Run one operation, resubmitting it while it conflicts
    pub async fn run_with_retry(&self, operation: Operation) -> ProcessingResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = self.coordinator.execute(operation.clone()).await;

            match &result {
                Err(e) if e.is_retryable() && attempts <= self.max_conflict_retries => {
                    warn!(
                        operation = operation.name(),
                        owner = operation.owner(),
                        attempts,
                        "resubmitting after conflict"
                    );
                    tokio::task::yield_now().await;
                }
                _ => {
                    return ProcessingResult {
                        operation,
                        result,
                        attempts,
                    }
                }
            }
        }
    }

    /// Process all operations for a single owner sequentially
    ///
    /// Every operation runs even if earlier ones fail; results keep input
    /// order.
    pub async fn process_owner_operations(
        &self,
        operations: Vec<Operation>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());

        for operation in operations {
            results.push(self.run_with_retry(operation).await);
        }

        results
    }

    /// Process a batch with owner-based partitioning
    ///
    /// Results for different owners may be interleaved in any order. Every
    /// operation gets a result, including those of an owner task that died.
    pub async fn process_batch(&self, batch: Vec<Operation>) -> Vec<ProcessingResult> {
        let owner_batches = self.partition_by_owner(batch);

        let (submitted, tasks): (Vec<_>, Vec<_>) = owner_batches
            .into_values()
            .map(|operations| {
                let processor = self.clone();
                let submitted = operations.clone();
                let task = tokio::spawn(async move {
                    processor.process_owner_operations(operations).await
                });
                (submitted, task)
            })
            .unzip();

        let mut results = Vec::new();
        for (operations, joined) in submitted.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(owner_results) => results.extend(owner_results),
                Err(e) => {
                    error!(error = %e, operations = operations.len(), "owner task panicked");
                    results.extend(abandoned(operations, &e.to_string()));
                }
            }
        }

        results
    }
}

/// Failed results for operations whose owner task never reported back
///
/// Operations that ran before the task died may have committed, so the
/// error is a storage failure rather than a rejection.
fn abandoned(operations: Vec<Operation>, cause: &str) -> Vec<ProcessingResult> {
    operations
        .into_iter()
        .map(|operation| ProcessingResult {
            operation,
            result: Err(LedgerError::storage(format!(
                "owner task failed before reporting: {}",
                cause
            ))),
            attempts: 0,
        })
        .collect()
}
