//! Store traits for the ledger core
//!
//! The coordinator only talks to storage through these two traits, so any
//! backend that provides ownership-scoped lookups and an all-or-nothing unit
//! of work can sit underneath it. `InMemoryLedgerStore` is the reference
//! implementation.

use crate::core::identifier::InstrumentClass;
use crate::types::{
    Account, AccountId, Card, CardId, LedgerError, Loan, LoanId, NewRecord, OwnerId,
    TransactionRecord,
};
use async_trait::async_trait;

/// Point-in-time copy of the whole ledger, ordered by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub accounts: Vec<Account>,
    pub cards: Vec<Card>,
    pub loans: Vec<Loan>,
    pub records: Vec<TransactionRecord>,
}

/// Storage backend for ledger entities and records
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Unit: UnitOfWork;

    /// Open a new unit of work
    async fn begin(&self) -> Result<Self::Unit, LedgerError>;

    /// Whether `number` is already taken within `class`
    async fn number_in_use(&self, class: InstrumentClass, number: &str)
        -> Result<bool, LedgerError>;

    /// Insert a provisioned account
    ///
    /// # Errors
    ///
    /// `ValidationError` if the row breaks an invariant, or its id or number
    /// is already taken.
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError>;

    /// Insert a provisioned card
    ///
    /// Debit cards must link to an existing account of the same owner.
    async fn insert_card(&self, card: Card) -> Result<Card, LedgerError>;

    /// Insert a provisioned loan together with its disbursement record
    async fn insert_loan(&self, loan: Loan) -> Result<(Loan, TransactionRecord), LedgerError>;

    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError>;
}

/// Atomic group of reads, staged writes and record appends
///
/// Reads are repeatable and observe the unit's own staged writes. Nothing is
/// visible to other units until [`UnitOfWork::commit`] succeeds; dropping a
/// unit without committing discards it.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Account `id` if it exists and belongs to `owner`, else `NotFound`
    async fn find_owned_account(
        &mut self,
        owner: OwnerId,
        id: AccountId,
    ) -> Result<Account, LedgerError>;

    async fn find_owned_card(&mut self, owner: OwnerId, id: CardId) -> Result<Card, LedgerError>;

    async fn find_owned_loan(&mut self, owner: OwnerId, id: LoanId) -> Result<Loan, LedgerError>;

    /// Account by external number, regardless of owner
    async fn find_account_by_number(&mut self, number: &str) -> Result<Account, LedgerError>;

    /// Account by id, regardless of owner
    async fn find_account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    /// Stage an updated account
    ///
    /// The account must have been read through this unit first, and must
    /// satisfy every balance invariant.
    fn put_account(&mut self, account: Account) -> Result<(), LedgerError>;

    fn put_card(&mut self, card: Card) -> Result<(), LedgerError>;

    fn put_loan(&mut self, loan: Loan) -> Result<(), LedgerError>;

    /// Stage a record to be appended at commit
    fn append(&mut self, record: NewRecord);

    /// Check that every row read so far is still current
    ///
    /// # Errors
    ///
    /// `Conflict` naming the first row that changed since this unit read it.
    fn validate(&self) -> Result<(), LedgerError>;

    /// Publish every staged write and record, or none of them
    ///
    /// Returns the committed records in append order.
    ///
    /// # Errors
    ///
    /// `Conflict` if any row this unit read changed since it was read.
    async fn commit(self) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Discard everything staged
    fn abort(self);
}
