//! In-memory ledger store
//!
//! DashMap tables of versioned rows plus an append-only record log. Units of
//! work read rows into a private cache, stage writes there, and publish them
//! at commit after checking that every row they read is still at the version
//! they saw.
//!
//! # Architecture
//!
//! ```text
//! InMemoryLedgerStore ──begin──▶ MemoryUnit
//!        │                          ├── read cache (row + read version)
//!        └── Arc<Tables>            ├── staged writes
//!              ├── accounts/cards/loans: DashMap<id, Versioned<T>>
//!              ├── number indexes
//!              ├── record log (RwLock<Vec>)
//!              └── commit latch
//! ```
//!
//! The commit latch is a plain mutex held only for in-memory validation and
//! apply. It is never held across an await.

mod store;
mod unit;

pub use store::InMemoryLedgerStore;
pub use unit::MemoryUnit;

use crate::types::{
    AccountId, Account, Card, CardId, LedgerError, Loan, LoanId, NewRecord, TransactionRecord,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

/// Row plus the number of committed writes it has seen
#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

impl<T> Versioned<T> {
    fn new(value: T) -> Self {
        Self { version: 0, value }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub accounts: DashMap<AccountId, Versioned<Account>>,
    pub cards: DashMap<CardId, Versioned<Card>>,
    pub loans: DashMap<LoanId, Versioned<Loan>>,
    pub account_numbers: DashMap<String, AccountId>,
    pub card_numbers: DashMap<String, CardId>,
    pub records: RwLock<Vec<TransactionRecord>>,
    next_record: AtomicU64,
    commit_latch: Mutex<()>,
}

impl Tables {
    pub fn latch(&self) -> Result<MutexGuard<'_, ()>, LedgerError> {
        self.commit_latch
            .lock()
            .map_err(|_| LedgerError::storage("commit latch poisoned"))
    }

    pub fn record_log(&self) -> Result<RwLockWriteGuard<'_, Vec<TransactionRecord>>, LedgerError> {
        self.records
            .write()
            .map_err(|_| LedgerError::storage("record log lock poisoned"))
    }

    /// Seal staged records with ids and a shared timestamp, and push them
    ///
    /// Callers hold the commit latch so log order matches id order.
    pub fn seal_records(
        &self,
        log: &mut Vec<TransactionRecord>,
        staged: Vec<NewRecord>,
    ) -> Vec<TransactionRecord> {
        let timestamp = Utc::now();
        let committed: Vec<TransactionRecord> = staged
            .into_iter()
            .map(|record| {
                let id = self.next_record.fetch_add(1, Ordering::SeqCst) + 1;
                record.commit(id, timestamp)
            })
            .collect();
        log.extend(committed.iter().cloned());
        committed
    }
}
