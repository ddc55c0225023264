//! Core business logic module
//!
//! This module contains the ledger components:
//! - `rules` - Pure balance rules and invariant checks
//! - `traits` - Store traits (`LedgerStore`, `UnitOfWork`)
//! - `memory` - In-memory store with optimistic commit validation
//! - `coordinator` - Transaction coordinator running each operation atomically
//! - `identifier` - External account and card number generation
//! - `config` - Ledger configuration (payment policy, identifier attempts)
//! - `batch_processor` - Owner-partitioned concurrent batch execution

pub mod batch_processor;
pub mod config;
pub mod coordinator;
pub mod identifier;
pub mod memory;
pub mod rules;
pub mod traits;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use config::{LedgerConfig, PaymentPolicy, SourceDebit};
pub use coordinator::TransactionCoordinator;
pub use identifier::{
    IdentifierGenerator, InstrumentClass, NumberSource, RandomNumberSource, SequenceNumberSource,
};
pub use memory::InMemoryLedgerStore;
pub use traits::{LedgerSnapshot, LedgerStore, UnitOfWork};
