use super::{Tables, Versioned};
use crate::core::rules;
use crate::core::traits::UnitOfWork;
use crate::types::{
    Account, AccountId, Card, CardId, Entity, LedgerError, Loan, LoanId, NewRecord, OwnerId,
    TransactionRecord,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Row as first read by the unit, plus any staged replacement
#[derive(Debug)]
struct Staged<T> {
    read_version: u64,
    value: T,
    dirty: bool,
}

/// Unit of work over [`super::InMemoryLedgerStore`]
#[derive(Debug)]
pub struct MemoryUnit {
    tables: Arc<Tables>,
    accounts: HashMap<AccountId, Staged<Account>>,
    cards: HashMap<CardId, Staged<Card>>,
    loans: HashMap<LoanId, Staged<Loan>>,
    records: Vec<NewRecord>,
}

/// Read through the unit cache, pinning the version on first read
fn load<T: Clone>(
    cache: &mut HashMap<u64, Staged<T>>,
    table: &DashMap<u64, Versioned<T>>,
    id: u64,
) -> Option<T> {
    if let Some(staged) = cache.get(&id) {
        return Some(staged.value.clone());
    }

    let staged = {
        let row = table.get(&id)?;
        Staged {
            read_version: row.version,
            value: row.value.clone(),
            dirty: false,
        }
    };
    let value = staged.value.clone();
    cache.insert(id, staged);
    Some(value)
}

fn stage<T>(
    cache: &mut HashMap<u64, Staged<T>>,
    entity: Entity,
    id: u64,
    value: T,
) -> Result<(), LedgerError> {
    match cache.get_mut(&id) {
        Some(staged) => {
            staged.value = value;
            staged.dirty = true;
            Ok(())
        }
        None => Err(LedgerError::storage(format!(
            "{} {} staged without being read in this unit",
            entity, id
        ))),
    }
}

/// Every cached row must still be at the version this unit read
fn validate<T>(
    cache: &HashMap<u64, Staged<T>>,
    table: &DashMap<u64, Versioned<T>>,
    entity: Entity,
) -> Result<(), LedgerError> {
    for (&id, staged) in cache {
        let current = table.get(&id).map(|row| row.version);
        if current != Some(staged.read_version) {
            return Err(LedgerError::Conflict { entity, id });
        }
    }
    Ok(())
}

fn apply<T>(cache: HashMap<u64, Staged<T>>, table: &DashMap<u64, Versioned<T>>) {
    for (id, staged) in cache {
        if !staged.dirty {
            continue;
        }
        if let Some(mut row) = table.get_mut(&id) {
            row.version += 1;
            row.value = staged.value;
        }
    }
}

impl MemoryUnit {
    pub(super) fn new(tables: Arc<Tables>) -> Self {
        Self {
            tables,
            accounts: HashMap::new(),
            cards: HashMap::new(),
            loans: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn has_writes(&self) -> bool {
        !self.records.is_empty()
            || self.accounts.values().any(|s| s.dirty)
            || self.cards.values().any(|s| s.dirty)
            || self.loans.values().any(|s| s.dirty)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn find_owned_account(
        &mut self,
        owner: OwnerId,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        load(&mut self.accounts, &self.tables.accounts, id)
            .filter(|account| account.owner == owner)
            .ok_or_else(|| LedgerError::not_found(Entity::Account, id))
    }

    async fn find_owned_card(&mut self, owner: OwnerId, id: CardId) -> Result<Card, LedgerError> {
        load(&mut self.cards, &self.tables.cards, id)
            .filter(|card| card.owner == owner)
            .ok_or_else(|| LedgerError::not_found(Entity::Card, id))
    }

    async fn find_owned_loan(&mut self, owner: OwnerId, id: LoanId) -> Result<Loan, LedgerError> {
        load(&mut self.loans, &self.tables.loans, id)
            .filter(|loan| loan.owner == owner)
            .ok_or_else(|| LedgerError::not_found(Entity::Loan, id))
    }

    async fn find_account_by_number(&mut self, number: &str) -> Result<Account, LedgerError> {
        let id = self
            .tables
            .account_numbers
            .get(number)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::not_found(Entity::Account, number))?;

        load(&mut self.accounts, &self.tables.accounts, id)
            .ok_or_else(|| LedgerError::not_found(Entity::Account, number))
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        load(&mut self.accounts, &self.tables.accounts, id)
            .ok_or_else(|| LedgerError::not_found(Entity::Account, id))
    }

    fn put_account(&mut self, account: Account) -> Result<(), LedgerError> {
        rules::check_account(&account)?;
        stage(&mut self.accounts, Entity::Account, account.id, account)
    }

    fn put_card(&mut self, card: Card) -> Result<(), LedgerError> {
        rules::check_card(&card)?;
        stage(&mut self.cards, Entity::Card, card.id, card)
    }

    fn put_loan(&mut self, loan: Loan) -> Result<(), LedgerError> {
        rules::check_loan(&loan)?;
        stage(&mut self.loans, Entity::Loan, loan.id, loan)
    }

    fn append(&mut self, record: NewRecord) {
        self.records.push(record);
    }

    fn validate(&self) -> Result<(), LedgerError> {
        let _latch = self.tables.latch()?;
        validate(&self.accounts, &self.tables.accounts, Entity::Account)?;
        validate(&self.cards, &self.tables.cards, Entity::Card)?;
        validate(&self.loans, &self.tables.loans, Entity::Loan)
    }

    async fn commit(self) -> Result<Vec<TransactionRecord>, LedgerError> {
        if !self.has_writes() {
            return Ok(Vec::new());
        }

        let MemoryUnit {
            tables,
            accounts,
            cards,
            loans,
            records,
        } = self;

        let _latch = tables.latch()?;

        validate(&accounts, &tables.accounts, Entity::Account)?;
        validate(&cards, &tables.cards, Entity::Card)?;
        validate(&loans, &tables.loans, Entity::Loan)?;

        let mut log = tables.record_log()?;
        apply(accounts, &tables.accounts);
        apply(cards, &tables.cards);
        apply(loans, &tables.loans);
        let committed = tables.seal_records(&mut log, records);

        trace!(records = committed.len(), "unit committed");
        Ok(committed)
    }

    fn abort(self) {
        trace!(staged_records = self.records.len(), "unit aborted");
    }
}
