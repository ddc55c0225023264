//! Ledger Core Library
//! # Overview
//!
//! The core of a retail banking ledger: accounts, credit and debit cards,
//! and loans, mutated only through atomic operations that either fully
//! apply with their transaction records or leave no trace.
//!
//! # Architecture
//!
//! - [`types`] - Domain data (Account, Card, Loan, TransactionRecord, Operation, errors)
//! - [`core`] - Business logic:
//!   - [`core::coordinator`] - Transaction coordinator, one unit of work per operation
//!   - [`core::rules`] - Pure balance rules and invariant checks
//!   - [`core::memory`] - In-memory store with optimistic commit validation
//!   - [`core::identifier`] - Unique account and card number generation
//!   - [`core::batch_processor`] - Owner-parallel batch execution with conflict retry
//! - [`io`] - Seed provisioning, CSV operation input and position output
//! - [`strategy`] - Sync and async processing pipelines
//! - [`cli`] - CLI argument parsing
//!
//! # Operations
//!
//! - **Deposit / Withdraw**: credit or debit an owned account
//! - **Transfer**: move funds to any account by its number
//! - **Card payment**: pay down credit card debt from an owned account
//! - **Card purchase / cash advance**: charge a card
//! - **Loan payment**: pay down a loan, optionally from an owned account
//! - **Card status change**: block, reactivate or cancel a card
//!
//! # Invariants
//!
//! - account balances never go negative
//! - a credit card's available credit equals its limit minus its debt
//! - a loan is paid exactly when nothing remains owed

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{InMemoryLedgerStore, LedgerConfig, LedgerStore, TransactionCoordinator};
pub use io::write_positions_csv;
pub use types::{
    Account, Card, CardKind, CardStatus, LedgerError, Loan, Operation, Receipt,
    TransactionKind, TransactionRecord,
};
