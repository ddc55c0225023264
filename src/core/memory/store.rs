use super::{MemoryUnit, Tables, Versioned};
use crate::core::identifier::InstrumentClass;
use crate::core::rules;
use crate::core::traits::{LedgerSnapshot, LedgerStore};
use crate::types::{
    Account, Card, CardKind, LedgerError, Loan, NewRecord, TransactionKind, TransactionRecord,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Reference [`LedgerStore`] backed by DashMap tables
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, LedgerError> {
        Ok(MemoryUnit::new(Arc::clone(&self.tables)))
    }

    async fn number_in_use(
        &self,
        class: InstrumentClass,
        number: &str,
    ) -> Result<bool, LedgerError> {
        let used = match class {
            InstrumentClass::Account => self.tables.account_numbers.contains_key(number),
            InstrumentClass::Card => self.tables.card_numbers.contains_key(number),
        };
        Ok(used)
    }

    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError> {
        let _latch = self.tables.latch()?;

        rules::check_account(&account)?;
        if self.tables.accounts.contains_key(&account.id) {
            return Err(LedgerError::validation(format!(
                "account id {} already exists",
                account.id
            )));
        }
        if self.tables.account_numbers.contains_key(&account.number) {
            return Err(LedgerError::validation(format!(
                "account number {} already in use",
                account.number
            )));
        }

        self.tables
            .account_numbers
            .insert(account.number.clone(), account.id);
        self.tables
            .accounts
            .insert(account.id, Versioned::new(account.clone()));

        debug!(account = account.id, owner = account.owner, "account provisioned");
        Ok(account)
    }

    async fn insert_card(&self, card: Card) -> Result<Card, LedgerError> {
        let _latch = self.tables.latch()?;

        rules::check_card(&card)?;
        if self.tables.cards.contains_key(&card.id) {
            return Err(LedgerError::validation(format!(
                "card id {} already exists",
                card.id
            )));
        }
        if self.tables.card_numbers.contains_key(&card.number) {
            return Err(LedgerError::validation(format!(
                "card number {} already in use",
                card.number
            )));
        }
        if let CardKind::Debit { linked_account } = card.kind {
            let linked_owner = self
                .tables
                .accounts
                .get(&linked_account)
                .map(|row| row.value.owner);
            if linked_owner != Some(card.owner) {
                return Err(LedgerError::validation(format!(
                    "debit card {} must link to an account of owner {}",
                    card.id, card.owner
                )));
            }
        }

        self.tables.card_numbers.insert(card.number.clone(), card.id);
        self.tables.cards.insert(card.id, Versioned::new(card.clone()));

        debug!(card = card.id, owner = card.owner, kind = card.kind.name(), "card provisioned");
        Ok(card)
    }

    async fn insert_loan(&self, loan: Loan) -> Result<(Loan, TransactionRecord), LedgerError> {
        let _latch = self.tables.latch()?;

        rules::check_loan(&loan)?;
        if self.tables.loans.contains_key(&loan.id) {
            return Err(LedgerError::validation(format!(
                "loan id {} already exists",
                loan.id
            )));
        }

        let disbursement = NewRecord::new(
            loan.owner,
            TransactionKind::LoanDisbursement,
            loan.principal,
            format!("Loan disbursement {}", loan.loan_type),
        )
        .loan(loan.id);

        let mut log = self.tables.record_log()?;
        self.tables.loans.insert(loan.id, Versioned::new(loan.clone()));
        let mut sealed = self.tables.seal_records(&mut log, vec![disbursement]);
        let record = sealed
            .pop()
            .ok_or_else(|| LedgerError::storage("disbursement record was not sealed"))?;

        debug!(loan = loan.id, owner = loan.owner, principal = %loan.principal, "loan provisioned");
        Ok((loan, record))
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let _latch = self.tables.latch()?;

        let mut accounts: Vec<Account> = self
            .tables
            .accounts
            .iter()
            .map(|row| row.value.clone())
            .collect();
        accounts.sort_by_key(|account| account.id);

        let mut cards: Vec<Card> = self.tables.cards.iter().map(|row| row.value.clone()).collect();
        cards.sort_by_key(|card| card.id);

        let mut loans: Vec<Loan> = self.tables.loans.iter().map(|row| row.value.clone()).collect();
        loans.sort_by_key(|loan| loan.id);

        let records = self
            .tables
            .records
            .read()
            .map_err(|_| LedgerError::storage("record log lock poisoned"))?
            .clone();

        Ok(LedgerSnapshot {
            accounts,
            cards,
            loans,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::UnitOfWork;
    use crate::types::{AccountType, CardStatus, Entity, LoanType};
    use rust_decimal_macros::dec;

    async fn store_with_accounts() -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        store
            .insert_account(Account::new(1, 10, "1000000001", AccountType::Savings, dec!(100)))
            .await
            .unwrap();
        store
            .insert_account(Account::new(2, 20, "1000000002", AccountType::Checking, dec!(50)))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = store_with_accounts().await;

        let same_id = Account::new(1, 10, "1000000099", AccountType::Savings, dec!(0));
        assert!(matches!(
            store.insert_account(same_id).await,
            Err(LedgerError::ValidationError { .. })
        ));

        let same_number = Account::new(3, 10, "1000000001", AccountType::Savings, dec!(0));
        assert!(matches!(
            store.insert_account(same_number).await,
            Err(LedgerError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_rejects_invariant_violations() {
        let store = InMemoryLedgerStore::new();
        let negative = Account::new(1, 10, "1000000001", AccountType::Savings, dec!(-0.01));
        assert!(store.insert_account(negative).await.is_err());
        assert!(!store
            .number_in_use(InstrumentClass::Account, "1000000001")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_debit_card_must_link_to_owner_account() {
        let store = store_with_accounts().await;

        let foreign = Card::new(1, 10, "1111222233334444", "01/30", CardKind::debit(2));
        assert!(store.insert_card(foreign).await.is_err());

        let own = Card::new(1, 10, "1111222233334444", "01/30", CardKind::debit(1));
        let card = store.insert_card(own).await.unwrap();
        assert_eq!(card.status, CardStatus::Active);
        assert!(store
            .number_in_use(InstrumentClass::Card, "1111222233334444")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insert_loan_appends_disbursement() {
        let store = InMemoryLedgerStore::new();
        let loan = Loan::new(1, 10, LoanType::Auto, dec!(5000), dec!(7.5), 36);

        let (loan, record) = store.insert_loan(loan).await.unwrap();
        assert_eq!(record.kind, TransactionKind::LoanDisbursement);
        assert_eq!(record.amount, dec!(5000));
        assert_eq!(record.loan, Some(loan.id));
        assert_eq!(record.id, 1);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.loans.len(), 1);
        assert_eq!(snapshot.records.len(), 1);
    }

    #[tokio::test]
    async fn test_owned_lookup_hides_other_owners() {
        let store = store_with_accounts().await;
        let mut unit = store.begin().await.unwrap();

        let result = unit.find_owned_account(10, 2).await;
        assert_eq!(result, Err(LedgerError::not_found(Entity::Account, 2)));

        let missing = unit.find_owned_account(10, 99).await;
        assert_eq!(missing, Err(LedgerError::not_found(Entity::Account, 99)));

        let own = unit.find_owned_account(10, 1).await.unwrap();
        assert_eq!(own.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_commit_publishes_writes_and_records() {
        let store = store_with_accounts().await;
        let mut unit = store.begin().await.unwrap();

        let mut account = unit.find_owned_account(10, 1).await.unwrap();
        account.balance = dec!(150);
        unit.put_account(account).unwrap();
        unit.append(NewRecord::new(10, TransactionKind::Deposit, dec!(50), "Deposit").account(1));

        let records = unit.commit().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.accounts[0].balance, dec!(150));
        assert_eq!(snapshot.records.len(), 1);
    }

    #[tokio::test]
    async fn test_reads_see_staged_writes() {
        let store = store_with_accounts().await;
        let mut unit = store.begin().await.unwrap();

        let mut account = unit.find_owned_account(10, 1).await.unwrap();
        account.balance = dec!(1);
        unit.put_account(account).unwrap();

        let by_number = unit.find_account_by_number("1000000001").await.unwrap();
        assert_eq!(by_number.balance, dec!(1));
    }

    #[tokio::test]
    async fn test_drop_discards_staged_writes() {
        let store = store_with_accounts().await;
        {
            let mut unit = store.begin().await.unwrap();
            let mut account = unit.find_owned_account(10, 1).await.unwrap();
            account.balance = dec!(0);
            unit.put_account(account).unwrap();
            unit.append(NewRecord::new(10, TransactionKind::Withdrawal, dec!(100), "x"));
            unit.abort();
        }

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.accounts[0].balance, dec!(100));
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_stale_read_conflicts() {
        let store = store_with_accounts().await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let mut a = first.find_owned_account(10, 1).await.unwrap();
        let mut b = second.find_owned_account(10, 1).await.unwrap();

        a.balance = dec!(0);
        first.put_account(a).unwrap();
        first.commit().await.unwrap();

        b.balance = dec!(10);
        second.put_account(b).unwrap();
        second.append(NewRecord::new(10, TransactionKind::Withdrawal, dec!(90), "x"));
        let result = second.commit().await;
        assert_eq!(
            result,
            Err(LedgerError::Conflict {
                entity: Entity::Account,
                id: 1
            })
        );

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.accounts[0].balance, dec!(0));
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_read_set_is_validated_even_without_write() {
        let store = store_with_accounts().await;

        let mut reader = store.begin().await.unwrap();
        let _other = reader.find_owned_account(20, 2).await.unwrap();
        let mut own = reader.find_owned_account(10, 1).await.unwrap();

        let mut writer = store.begin().await.unwrap();
        let mut other = writer.find_owned_account(20, 2).await.unwrap();
        other.balance = dec!(0);
        writer.put_account(other).unwrap();
        writer.commit().await.unwrap();

        own.balance = dec!(99);
        reader.put_account(own).unwrap();
        assert!(matches!(
            reader.commit().await,
            Err(LedgerError::Conflict { id: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_put_requires_prior_read() {
        let store = store_with_accounts().await;
        let mut unit = store.begin().await.unwrap();

        let account = Account::new(1, 10, "1000000001", AccountType::Savings, dec!(5));
        assert!(matches!(
            unit.put_account(account),
            Err(LedgerError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_rejects_invariant_violation() {
        let store = store_with_accounts().await;
        let mut unit = store.begin().await.unwrap();

        let mut account = unit.find_owned_account(10, 1).await.unwrap();
        account.balance = dec!(-1);
        assert!(matches!(
            unit.put_account(account),
            Err(LedgerError::ValidationError { .. })
        ));
    }
}
