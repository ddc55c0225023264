//! Transaction coordinator
//!
//! Runs one logical funds movement as a single unit of work: it resolves the
//! entities involved through ownership-scoped lookups, checks every
//! precondition with the balance rules, stages the updated entities and the
//! transaction records, and commits. Any failure drops the unit, so a
//! rejected operation leaves no trace in the store.
//!
//! # Check order
//!
//! Every operation validates in the same order:
//! 1. amount (`InvalidAmount`)
//! 2. primary entity lookup and ownership (`NotFound`)
//! 3. entity state (`InvalidState`, `WrongCardKind`, ...)
//! 4. source/destination lookups
//! 5. sufficiency (`InsufficientFunds`, `InsufficientCredit`)
//!
//! The coordinator never retries; a `Conflict` from commit is returned to
//! the caller as is. A rejection from any of these checks is re-validated
//! against the unit's reads first and becomes `Conflict` if they went stale.

use crate::core::config::{LedgerConfig, SourceDebit};
use crate::core::rules;
use crate::core::traits::{LedgerStore, UnitOfWork};
use crate::types::{
    Account, AccountId, AccountReceipt, Amount, Card, CardChargeReceipt, CardId, CardKind,
    CardPaymentReceipt, CardStatus, CardStatusReceipt, Entity, ErrorKind, LedgerError,
    Loan, LoanId, LoanPaymentReceipt, LoanStatus, NewRecord, Operation, OwnerId, Receipt,
    StateViolation, TransactionKind, TransactionRecord, TransferReceipt,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Orchestrates ledger operations over a [`LedgerStore`]
#[derive(Debug)]
pub struct TransactionCoordinator<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S: LedgerStore> Clone for TransactionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

/// Log a failed operation at a level matching its cause
fn observe<T>(operation: &'static str, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
    if let Err(e) = &result {
        match e.kind() {
            ErrorKind::Conflict => warn!(operation, error = %e, "operation conflicted"),
            ErrorKind::Storage | ErrorKind::Arithmetic | ErrorKind::Validation => {
                error!(operation, error = %e, "operation failed")
            }
            _ => debug!(operation, error = %e, "operation rejected"),
        }
    }
    result
}

/// The single record a one-record operation committed
fn single(records: Vec<TransactionRecord>) -> Result<TransactionRecord, LedgerError> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::storage("commit returned no record"))
}

fn require_funds(account: &Account, amount: Decimal) -> Result<(), LedgerError> {
    if rules::sufficient_funds(account.balance, amount) {
        Ok(())
    } else {
        Err(LedgerError::insufficient_funds(
            account.id,
            account.balance,
            amount,
        ))
    }
}

fn require_active(card: &Card) -> Result<(), LedgerError> {
    if card.status == CardStatus::Active {
        Ok(())
    } else {
        Err(LedgerError::InvalidState(StateViolation::CardNotActive))
    }
}

fn debited_amount(policy: SourceDebit, requested: Decimal, applied: Decimal) -> Decimal {
    match policy {
        SourceDebit::Requested => requested,
        SourceDebit::Applied => applied,
    }
}

/// Let a rejection through only if the unit's reads are still current
///
/// A rejection decided on rows another commit has since replaced becomes
/// `Conflict`.
fn settle<U: UnitOfWork, T>(unit: &U, staged: Result<T, LedgerError>) -> Result<T, LedgerError> {
    match staged {
        Err(e) if !e.is_retryable() => {
            unit.validate()?;
            Err(e)
        }
        staged => staged,
    }
}

/// Card payment staged in a unit, waiting for commit
struct StagedCardPayment {
    card: Card,
    source: Account,
    applied: Decimal,
    debited: Decimal,
}

struct StagedLoanPayment {
    loan: Loan,
    source: Option<Account>,
    applied: Decimal,
    debited: Decimal,
    paid_off: bool,
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run any operation and wrap its receipt
    pub async fn execute(&self, operation: Operation) -> Result<Receipt, LedgerError> {
        match operation {
            Operation::Deposit {
                owner,
                account,
                amount,
                description,
            } => self
                .deposit(owner, account, amount, description)
                .await
                .map(Receipt::Deposit),
            Operation::Withdraw {
                owner,
                account,
                amount,
                description,
            } => self
                .withdraw(owner, account, amount, description)
                .await
                .map(Receipt::Withdrawal),
            Operation::Transfer {
                owner,
                from_account,
                to_number,
                amount,
                description,
            } => self
                .transfer(owner, from_account, &to_number, amount, description)
                .await
                .map(Receipt::Transfer),
            Operation::CardPayment {
                owner,
                card,
                amount,
                source_account,
            } => self
                .card_payment(owner, card, amount, source_account)
                .await
                .map(Receipt::CardPayment),
            Operation::CardPurchase {
                owner,
                card,
                amount,
                description,
            } => self
                .card_purchase(owner, card, amount, description)
                .await
                .map(Receipt::CardPurchase),
            Operation::CardCashAdvance {
                owner,
                card,
                amount,
            } => self
                .card_cash_advance(owner, card, amount)
                .await
                .map(Receipt::CardCashAdvance),
            Operation::LoanPayment {
                owner,
                loan,
                amount,
                source_account,
            } => self
                .loan_payment(owner, loan, amount, source_account)
                .await
                .map(Receipt::LoanPayment),
            Operation::CardStatusChange {
                owner,
                card,
                status,
            } => self
                .card_status_change(owner, card, &status)
                .await
                .map(Receipt::CardStatus),
        }
    }

    /// Credit an owned account
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound`, or `Conflict` from commit.
    #[instrument(skip(self, amount, description), fields(op = "deposit"))]
    pub async fn deposit(
        &self,
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<AccountReceipt, LedgerError> {
        observe("deposit", self.run_deposit(owner, account, amount, description).await)
    }

    async fn run_deposit(
        &self,
        owner: OwnerId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<AccountReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged = Self::stage_deposit(&mut unit, owner, account_id, amount, description).await;
        let account = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(account = account.id, %amount, balance = %account.balance, "deposit committed");
        Ok(AccountReceipt { account, record })
    }

    async fn stage_deposit(
        unit: &mut S::Unit,
        owner: OwnerId,
        account_id: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<Account, LedgerError> {
        let mut account = unit.find_owned_account(owner, account_id).await?;
        account.balance = rules::credit(account.balance, amount.value(), "deposit")?;
        unit.put_account(account.clone())?;

        let description = description.unwrap_or_else(|| "Deposit to account".to_string());
        unit.append(
            NewRecord::new(owner, TransactionKind::Deposit, amount.value(), description)
                .account(account.id),
        );
        Ok(account)
    }

    /// Debit an owned account
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound`, `InsufficientFunds`, or `Conflict`.
    #[instrument(skip(self, amount, description), fields(op = "withdrawal"))]
    pub async fn withdraw(
        &self,
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<AccountReceipt, LedgerError> {
        observe("withdrawal", self.run_withdraw(owner, account, amount, description).await)
    }

    async fn run_withdraw(
        &self,
        owner: OwnerId,
        account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<AccountReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged = Self::stage_withdraw(&mut unit, owner, account_id, amount, description).await;
        let account = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(account = account.id, %amount, balance = %account.balance, "withdrawal committed");
        Ok(AccountReceipt { account, record })
    }

    async fn stage_withdraw(
        unit: &mut S::Unit,
        owner: OwnerId,
        account_id: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<Account, LedgerError> {
        let mut account = unit.find_owned_account(owner, account_id).await?;
        require_funds(&account, amount.value())?;
        account.balance = rules::debit(account.balance, amount.value(), "withdrawal")?;
        unit.put_account(account.clone())?;

        let description = description.unwrap_or_else(|| "Withdrawal from account".to_string());
        unit.append(
            NewRecord::new(owner, TransactionKind::Withdrawal, amount.value(), description)
                .account(account.id),
        );
        Ok(account)
    }

    /// Move funds from an owned account to any account, by number
    ///
    /// The destination may belong to another owner; it is only ever
    /// credited. The source balance is checked before the destination is
    /// resolved.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound` (source or destination),
    /// `InsufficientFunds`, `SameAccount`, or `Conflict`.
    #[instrument(skip(self, amount, description), fields(op = "transfer"))]
    pub async fn transfer(
        &self,
        owner: OwnerId,
        from_account: AccountId,
        to_number: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransferReceipt, LedgerError> {
        observe(
            "transfer",
            self.run_transfer(owner, from_account, to_number, amount, description)
                .await,
        )
    }

    async fn run_transfer(
        &self,
        owner: OwnerId,
        from_account: AccountId,
        to_number: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransferReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged =
            Self::stage_transfer(&mut unit, owner, from_account, to_number, amount, description)
                .await;
        let (from, to) = settle(&unit, staged)?;

        let mut records = unit.commit().await?.into_iter();
        let (outgoing, incoming) = match (records.next(), records.next()) {
            (Some(outgoing), Some(incoming)) => (outgoing, incoming),
            _ => return Err(LedgerError::storage("transfer committed without both records")),
        };

        info!(
            from = from.id,
            to = to.id,
            %amount,
            from_balance = %from.balance,
            "transfer committed"
        );
        Ok(TransferReceipt {
            from,
            to,
            outgoing,
            incoming,
        })
    }

    async fn stage_transfer(
        unit: &mut S::Unit,
        owner: OwnerId,
        from_account: AccountId,
        to_number: &str,
        amount: Amount,
        description: Option<String>,
    ) -> Result<(Account, Account), LedgerError> {
        let mut from = unit.find_owned_account(owner, from_account).await?;
        require_funds(&from, amount.value())?;

        let mut to = unit.find_account_by_number(to_number).await?;
        if from.number == to.number {
            return Err(LedgerError::same_account(&from.number));
        }

        from.balance = rules::debit(from.balance, amount.value(), "transfer")?;
        to.balance = rules::credit(to.balance, amount.value(), "transfer")?;
        unit.put_account(from.clone())?;
        unit.put_account(to.clone())?;

        let outgoing_description =
            description.unwrap_or_else(|| format!("Transfer to {}", to.number));
        unit.append(
            NewRecord::new(
                from.owner,
                TransactionKind::TransferOut,
                amount.value(),
                outgoing_description,
            )
            .account(from.id)
            .between(&from.number, &to.number),
        );
        unit.append(
            NewRecord::new(
                to.owner,
                TransactionKind::TransferIn,
                amount.value(),
                format!("Transfer from {}", from.number),
            )
            .account(to.id)
            .between(&from.number, &to.number),
        );
        Ok((from, to))
    }

    /// Pay down a credit card's debt from an owned account
    ///
    /// The payment is capped at the current debt. The source must cover the
    /// requested amount; what is actually debited follows
    /// `PaymentPolicy::card_payment`.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound` (also for debit cards), `InvalidState`
    /// (`CardNotActive`, `NoDebt`), `InsufficientFunds`, or `Conflict`.
    #[instrument(skip(self, amount), fields(op = "card_payment"))]
    pub async fn card_payment(
        &self,
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
        source_account: AccountId,
    ) -> Result<CardPaymentReceipt, LedgerError> {
        observe(
            "card_payment",
            self.run_card_payment(owner, card, amount, source_account)
                .await,
        )
    }

    async fn run_card_payment(
        &self,
        owner: OwnerId,
        card_id: CardId,
        amount: Decimal,
        source_account: AccountId,
    ) -> Result<CardPaymentReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged = self
            .stage_card_payment(&mut unit, owner, card_id, amount, source_account)
            .await;
        let payment = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(
            card = payment.card.id,
            source = payment.source.id,
            applied = %payment.applied,
            debited = %payment.debited,
            "card payment committed"
        );
        Ok(CardPaymentReceipt {
            card: payment.card,
            source: payment.source,
            applied: payment.applied,
            debited: payment.debited,
            record,
        })
    }

    async fn stage_card_payment(
        &self,
        unit: &mut S::Unit,
        owner: OwnerId,
        card_id: CardId,
        amount: Amount,
        source_account: AccountId,
    ) -> Result<StagedCardPayment, LedgerError> {
        let mut card = unit.find_owned_card(owner, card_id).await?;
        let (credit_limit, current_debt) = match card.kind {
            CardKind::Credit {
                credit_limit,
                current_debt,
                ..
            } => (credit_limit, current_debt),
            CardKind::Debit { .. } => return Err(LedgerError::not_found(Entity::Card, card_id)),
        };
        require_active(&card)?;
        if current_debt <= Decimal::ZERO {
            return Err(LedgerError::InvalidState(StateViolation::NoDebt));
        }

        let mut source = unit.find_owned_account(owner, source_account).await?;
        require_funds(&source, amount.value())?;

        let applied = rules::applied_amount(amount.value(), current_debt);
        let debited = debited_amount(
            self.config.payment_policy.card_payment,
            amount.value(),
            applied,
        );

        source.balance = rules::debit(source.balance, debited, "card_payment")?;
        let fields = rules::clamp_credit_fields(
            credit_limit,
            rules::debit(current_debt, applied, "card_payment")?,
        );
        card.kind = CardKind::Credit {
            credit_limit,
            current_debt: fields.current_debt,
            available_credit: fields.available_credit,
        };

        unit.put_account(source.clone())?;
        unit.put_card(card.clone())?;
        unit.append(
            NewRecord::new(
                owner,
                TransactionKind::CardPayment,
                applied,
                format!(
                    "Credit card ****{} payment from account {}",
                    card.last_four(),
                    source.number
                ),
            )
            .card(card.id)
            .account(source.id),
        );
        Ok(StagedCardPayment {
            card,
            source,
            applied,
            debited,
        })
    }

    /// Charge a purchase to a card
    ///
    /// Credit cards draw on available credit; debit cards draw on their
    /// linked account.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound`, `InvalidState(CardNotActive)`,
    /// `InsufficientCredit`, `InsufficientFunds`, or `Conflict`.
    #[instrument(skip(self, amount, description), fields(op = "card_purchase"))]
    pub async fn card_purchase(
        &self,
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<CardChargeReceipt, LedgerError> {
        observe(
            "card_purchase",
            self.run_card_purchase(owner, card, amount, description)
                .await,
        )
    }

    async fn run_card_purchase(
        &self,
        owner: OwnerId,
        card_id: CardId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<CardChargeReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged =
            Self::stage_card_purchase(&mut unit, owner, card_id, amount, description).await;
        let (card, linked_account) = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(card = card.id, kind = card.kind.name(), %amount, "card purchase committed");
        Ok(CardChargeReceipt {
            card,
            linked_account,
            record,
        })
    }

    async fn stage_card_purchase(
        unit: &mut S::Unit,
        owner: OwnerId,
        card_id: CardId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<(Card, Option<Account>), LedgerError> {
        let mut card = unit.find_owned_card(owner, card_id).await?;
        require_active(&card)?;

        let description =
            description.unwrap_or_else(|| format!("Card purchase ****{}", card.last_four()));
        let mut record = NewRecord::new(
            owner,
            TransactionKind::CardPurchase,
            amount.value(),
            description,
        )
        .card(card.id);

        let linked_account = match card.kind {
            CardKind::Credit {
                credit_limit,
                current_debt,
                available_credit,
            } => {
                if !rules::credit_capacity(credit_limit, current_debt, amount.value()) {
                    return Err(LedgerError::insufficient_credit(
                        card.id,
                        available_credit,
                        amount.value(),
                    ));
                }
                let fields = rules::clamp_credit_fields(
                    credit_limit,
                    rules::credit(current_debt, amount.value(), "card_purchase")?,
                );
                card.kind = CardKind::Credit {
                    credit_limit,
                    current_debt: fields.current_debt,
                    available_credit: fields.available_credit,
                };
                unit.put_card(card.clone())?;
                None
            }
            CardKind::Debit { linked_account } => {
                let mut account = unit.find_account(linked_account).await?;
                require_funds(&account, amount.value())?;
                account.balance = rules::debit(account.balance, amount.value(), "card_purchase")?;
                unit.put_account(account.clone())?;
                record = record.account(account.id);
                Some(account)
            }
        };

        unit.append(record);
        Ok((card, linked_account))
    }

    /// Draw cash against a credit card's available credit
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound`, `WrongCardKind`,
    /// `InvalidState(CardNotActive)`, `InsufficientCredit`, or `Conflict`.
    #[instrument(skip(self, amount), fields(op = "card_cash_advance"))]
    pub async fn card_cash_advance(
        &self,
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
    ) -> Result<CardChargeReceipt, LedgerError> {
        observe(
            "card_cash_advance",
            self.run_card_cash_advance(owner, card, amount).await,
        )
    }

    async fn run_card_cash_advance(
        &self,
        owner: OwnerId,
        card_id: CardId,
        amount: Decimal,
    ) -> Result<CardChargeReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged = Self::stage_card_cash_advance(&mut unit, owner, card_id, amount).await;
        let card = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(card = card.id, %amount, "cash advance committed");
        Ok(CardChargeReceipt {
            card,
            linked_account: None,
            record,
        })
    }

    async fn stage_card_cash_advance(
        unit: &mut S::Unit,
        owner: OwnerId,
        card_id: CardId,
        amount: Amount,
    ) -> Result<Card, LedgerError> {
        let mut card = unit.find_owned_card(owner, card_id).await?;
        let (credit_limit, current_debt, available_credit) = match card.kind {
            CardKind::Credit {
                credit_limit,
                current_debt,
                available_credit,
            } => (credit_limit, current_debt, available_credit),
            CardKind::Debit { .. } => return Err(LedgerError::WrongCardKind { card: card.id }),
        };
        require_active(&card)?;
        if !rules::credit_capacity(credit_limit, current_debt, amount.value()) {
            return Err(LedgerError::insufficient_credit(
                card.id,
                available_credit,
                amount.value(),
            ));
        }

        let fields = rules::clamp_credit_fields(
            credit_limit,
            rules::credit(current_debt, amount.value(), "card_cash_advance")?,
        );
        card.kind = CardKind::Credit {
            credit_limit,
            current_debt: fields.current_debt,
            available_credit: fields.available_credit,
        };
        unit.put_card(card.clone())?;
        unit.append(
            NewRecord::new(
                owner,
                TransactionKind::CardCashAdvance,
                amount.value(),
                format!("Cash advance card ****{}", card.last_four()),
            )
            .card(card.id),
        );
        Ok(card)
    }

    /// Pay an installment loan, optionally from an owned account
    ///
    /// The payment is capped at the remaining balance and the loan becomes
    /// `paid` when nothing remains. When a source is given it must cover the
    /// requested amount; what is debited follows `PaymentPolicy::loan_payment`.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `NotFound`, `InvalidState` (`AlreadyPaid`,
    /// `LoanNotActive`), `InsufficientFunds`, or `Conflict`.
    #[instrument(skip(self, amount), fields(op = "loan_payment"))]
    pub async fn loan_payment(
        &self,
        owner: OwnerId,
        loan: LoanId,
        amount: Decimal,
        source_account: Option<AccountId>,
    ) -> Result<LoanPaymentReceipt, LedgerError> {
        observe(
            "loan_payment",
            self.run_loan_payment(owner, loan, amount, source_account)
                .await,
        )
    }

    async fn run_loan_payment(
        &self,
        owner: OwnerId,
        loan_id: LoanId,
        amount: Decimal,
        source_account: Option<AccountId>,
    ) -> Result<LoanPaymentReceipt, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut unit = self.store.begin().await?;
        let staged = self
            .stage_loan_payment(&mut unit, owner, loan_id, amount, source_account)
            .await;
        let payment = settle(&unit, staged)?;
        let record = single(unit.commit().await?)?;

        info!(
            loan = payment.loan.id,
            applied = %payment.applied,
            debited = %payment.debited,
            remaining = %payment.loan.remaining_balance,
            paid_off = payment.paid_off,
            "loan payment committed"
        );
        Ok(LoanPaymentReceipt {
            loan: payment.loan,
            source: payment.source,
            applied: payment.applied,
            debited: payment.debited,
            paid_off: payment.paid_off,
            record,
        })
    }

    async fn stage_loan_payment(
        &self,
        unit: &mut S::Unit,
        owner: OwnerId,
        loan_id: LoanId,
        amount: Amount,
        source_account: Option<AccountId>,
    ) -> Result<StagedLoanPayment, LedgerError> {
        let mut loan = unit.find_owned_loan(owner, loan_id).await?;
        match loan.status {
            LoanStatus::Paid => return Err(LedgerError::InvalidState(StateViolation::AlreadyPaid)),
            LoanStatus::Defaulted => {
                return Err(LedgerError::InvalidState(StateViolation::LoanNotActive))
            }
            LoanStatus::Active => {}
        }
        if loan.remaining_balance <= Decimal::ZERO {
            return Err(LedgerError::InvalidState(StateViolation::AlreadyPaid));
        }

        let mut source = match source_account {
            Some(id) => {
                let account = unit.find_owned_account(owner, id).await?;
                require_funds(&account, amount.value())?;
                Some(account)
            }
            None => None,
        };

        let applied = rules::applied_amount(amount.value(), loan.remaining_balance);
        let payoff = rules::loan_payoff(loan.remaining_balance, applied);
        loan.remaining_balance = payoff.remaining_balance;
        if payoff.paid {
            loan.status = LoanStatus::Paid;
        }

        let mut description = format!("Loan payment {}", loan.loan_type);
        let debited = match source.as_mut() {
            Some(account) => {
                let debited = debited_amount(
                    self.config.payment_policy.loan_payment,
                    amount.value(),
                    applied,
                );
                account.balance = rules::debit(account.balance, debited, "loan_payment")?;
                unit.put_account(account.clone())?;
                description.push_str(&format!(" from account {}", account.number));
                debited
            }
            None => Decimal::ZERO,
        };
        if payoff.paid {
            description.push_str(" (final payment)");
        }

        let mut record =
            NewRecord::new(owner, TransactionKind::LoanPayment, applied, description).loan(loan.id);
        if let Some(account) = &source {
            record = record.account(account.id);
        }

        unit.put_loan(loan.clone())?;
        unit.append(record);
        Ok(StagedLoanPayment {
            loan,
            source,
            applied,
            debited,
            paid_off: payoff.paid,
        })
    }

    /// Move a card to `active`, `blocked` or `cancelled`
    ///
    /// Requesting the card's current status is a successful no-op that
    /// commits nothing. Expired and cancelled cards never change.
    ///
    /// # Errors
    ///
    /// `InvalidTargetStatus`, `NotFound`, `TerminalState`, or `Conflict`.
    #[instrument(skip(self), fields(op = "card_status"))]
    pub async fn card_status_change(
        &self,
        owner: OwnerId,
        card: CardId,
        status: &str,
    ) -> Result<CardStatusReceipt, LedgerError> {
        observe(
            "card_status",
            self.run_card_status_change(owner, card, status).await,
        )
    }

    async fn run_card_status_change(
        &self,
        owner: OwnerId,
        card_id: CardId,
        status: &str,
    ) -> Result<CardStatusReceipt, LedgerError> {
        let target = match status.parse::<CardStatus>() {
            Ok(CardStatus::Expired) | Err(_) => {
                return Err(LedgerError::InvalidTargetStatus {
                    status: status.to_string(),
                })
            }
            Ok(target) => target,
        };

        let mut unit = self.store.begin().await?;
        let staged = Self::find_changeable_card(&mut unit, owner, card_id).await;
        let mut card = settle(&unit, staged)?;
        let previous = card.status;

        if previous == target {
            unit.validate()?;
            unit.abort();
            debug!(card = card.id, status = %target, "card already in requested status");
            return Ok(CardStatusReceipt {
                card,
                previous,
                changed: false,
            });
        }

        card.status = target;
        unit.put_card(card.clone())?;
        unit.commit().await?;

        info!(card = card.id, from = %previous, to = %target, "card status changed");
        Ok(CardStatusReceipt {
            card,
            previous,
            changed: true,
        })
    }

    async fn find_changeable_card(
        unit: &mut S::Unit,
        owner: OwnerId,
        card_id: CardId,
    ) -> Result<Card, LedgerError> {
        let card = unit.find_owned_card(owner, card_id).await?;
        if card.status.is_terminal() {
            return Err(LedgerError::TerminalState {
                card: card.id,
                status: card.status,
            });
        }
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PaymentPolicy;
    use crate::core::memory::InMemoryLedgerStore;
    use crate::types::{AccountType, Loan, LoanType};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    type Coordinator = TransactionCoordinator<InMemoryLedgerStore>;

    async fn ledger(policy: PaymentPolicy) -> Coordinator {
        let store = Arc::new(InMemoryLedgerStore::new());
        store
            .insert_account(Account::new(1, 1, "1000000001", AccountType::Checking, dec!(500)))
            .await
            .unwrap();
        store
            .insert_account(Account::new(2, 2, "1000000002", AccountType::Savings, dec!(50)))
            .await
            .unwrap();
        store
            .insert_card(Card::new(
                1,
                1,
                "4000000000000001",
                "12/30",
                CardKind::Credit {
                    credit_limit: dec!(1000),
                    current_debt: dec!(100),
                    available_credit: dec!(900),
                },
            ))
            .await
            .unwrap();
        store
            .insert_card(Card::new(2, 1, "4000000000000002", "12/30", CardKind::debit(1)))
            .await
            .unwrap();
        store
            .insert_card(Card::new(3, 1, "4000000000000003", "12/30", CardKind::credit(dec!(500))))
            .await
            .unwrap();
        store
            .insert_loan(Loan::new(1, 1, LoanType::Auto, dec!(300), dec!(4), 12))
            .await
            .unwrap();
        TransactionCoordinator::new(store, LedgerConfig::new(policy, 8))
    }

    async fn default_ledger() -> Coordinator {
        ledger(PaymentPolicy::default()).await
    }

    async fn record_count(coordinator: &Coordinator) -> usize {
        coordinator.store().snapshot().await.unwrap().records.len()
    }

    async fn balance(coordinator: &Coordinator, id: AccountId) -> Decimal {
        let snapshot = coordinator.store().snapshot().await.unwrap();
        snapshot
            .accounts
            .into_iter()
            .find(|a| a.id == id)
            .map(|a| a.balance)
            .unwrap()
    }

    #[tokio::test]
    async fn test_deposit_credits_and_records() {
        let coordinator = default_ledger().await;

        let receipt = coordinator.deposit(1, 1, dec!(25.50), None).await.unwrap();
        assert_eq!(receipt.account.balance, dec!(525.50));
        assert_eq!(receipt.record.kind, TransactionKind::Deposit);
        assert_eq!(receipt.record.amount, dec!(25.50));
        assert_eq!(receipt.record.description, "Deposit to account");
        assert_eq!(receipt.record.account, Some(1));
        assert_eq!(balance(&coordinator, 1).await, dec!(525.50));
    }

    #[rstest]
    #[case::zero(dec!(0))]
    #[case::negative(dec!(-5))]
    #[tokio::test]
    async fn test_non_positive_amount_rejected(#[case] amount: Decimal) {
        let coordinator = default_ledger().await;
        let before = record_count(&coordinator).await;

        let result = coordinator.deposit(1, 1, amount, None).await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        let result = coordinator.card_purchase(1, 1, amount, None).await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

        assert_eq!(record_count(&coordinator).await, before);
    }

    #[tokio::test]
    async fn test_foreign_account_is_not_found() {
        let coordinator = default_ledger().await;

        let result = coordinator.withdraw(1, 2, dec!(1), None).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound {
                entity: Entity::Account,
                ..
            })
        ));
        assert_eq!(balance(&coordinator, 2).await, dec!(50));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds() {
        let coordinator = default_ledger().await;

        let result = coordinator.withdraw(2, 2, dec!(50.01), None).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(balance(&coordinator, 2).await, dec!(50));
    }

    #[tokio::test]
    async fn test_transfer_records_both_legs() {
        let coordinator = default_ledger().await;

        let receipt = coordinator
            .transfer(1, 1, "1000000002", dec!(120), Some("Rent".to_string()))
            .await
            .unwrap();

        assert_eq!(receipt.from.balance, dec!(380));
        assert_eq!(receipt.to.balance, dec!(170));
        assert_eq!(receipt.outgoing.kind, TransactionKind::TransferOut);
        assert_eq!(receipt.outgoing.description, "Rent");
        assert_eq!(receipt.outgoing.owner, 1);
        assert_eq!(receipt.incoming.kind, TransactionKind::TransferIn);
        assert_eq!(receipt.incoming.description, "Transfer from 1000000001");
        assert_eq!(receipt.incoming.owner, 2);
        assert_eq!(receipt.outgoing.timestamp, receipt.incoming.timestamp);
        assert_eq!(receipt.incoming.from_number.as_deref(), Some("1000000001"));
        assert_eq!(receipt.incoming.to_number.as_deref(), Some("1000000002"));
    }

    #[tokio::test]
    async fn test_transfer_rejections() {
        let coordinator = default_ledger().await;
        let before = record_count(&coordinator).await;

        let result = coordinator.transfer(1, 1, "1000000001", dec!(1), None).await;
        assert!(matches!(result, Err(LedgerError::SameAccount { .. })));

        let result = coordinator.transfer(1, 1, "9999999999", dec!(1), None).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound {
                entity: Entity::Account,
                ..
            })
        ));

        // funds are checked before the destination is resolved
        let result = coordinator.transfer(1, 1, "9999999999", dec!(501), None).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

        assert_eq!(record_count(&coordinator).await, before);
        assert_eq!(balance(&coordinator, 1).await, dec!(500));
    }

    #[tokio::test]
    async fn test_card_payment_caps_at_debt() {
        let coordinator = default_ledger().await;

        let receipt = coordinator.card_payment(1, 1, dec!(300), 1).await.unwrap();
        assert_eq!(receipt.applied, dec!(100));
        assert_eq!(receipt.debited, dec!(100));
        assert_eq!(receipt.source.balance, dec!(400));
        assert_eq!(
            receipt.card.kind,
            CardKind::Credit {
                credit_limit: dec!(1000),
                current_debt: dec!(0),
                available_credit: dec!(1000),
            }
        );
        assert_eq!(receipt.record.amount, dec!(100));
        assert_eq!(
            receipt.record.description,
            "Credit card ****0001 payment from account 1000000001"
        );

        let result = coordinator.card_payment(1, 1, dec!(1), 1).await;
        assert!(matches!(
            result,
            Err(LedgerError::InvalidState(StateViolation::NoDebt))
        ));
    }

    #[tokio::test]
    async fn test_card_payment_requested_policy_debits_full_amount() {
        let coordinator = ledger(PaymentPolicy {
            card_payment: SourceDebit::Requested,
            loan_payment: SourceDebit::Requested,
        })
        .await;

        let receipt = coordinator.card_payment(1, 1, dec!(300), 1).await.unwrap();
        assert_eq!(receipt.applied, dec!(100));
        assert_eq!(receipt.debited, dec!(300));
        assert_eq!(balance(&coordinator, 1).await, dec!(200));
    }

    #[tokio::test]
    async fn test_card_payment_source_must_cover_requested_amount() {
        let coordinator = default_ledger().await;

        let result = coordinator.card_payment(1, 1, dec!(600), 1).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_card_payment_on_debit_card_is_not_found() {
        let coordinator = default_ledger().await;

        let result = coordinator.card_payment(1, 2, dec!(10), 1).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound {
                entity: Entity::Card,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_debit_card_purchase_draws_linked_account() {
        let coordinator = default_ledger().await;

        let receipt = coordinator
            .card_purchase(1, 2, dec!(75), Some("Groceries".to_string()))
            .await
            .unwrap();
        assert_eq!(receipt.linked_account.map(|a| a.balance), Some(dec!(425)));
        assert_eq!(receipt.record.description, "Groceries");
        assert_eq!(receipt.record.card, Some(2));
        assert_eq!(receipt.record.account, Some(1));

        let result = coordinator.card_purchase(1, 2, dec!(426), None).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_credit_card_purchase_default_description() {
        let coordinator = default_ledger().await;

        let receipt = coordinator.card_purchase(1, 3, dec!(20), None).await.unwrap();
        assert_eq!(receipt.record.description, "Card purchase ****0003");
        assert!(receipt.linked_account.is_none());
    }

    #[tokio::test]
    async fn test_cash_advance_rules() {
        let coordinator = default_ledger().await;

        let result = coordinator.card_cash_advance(1, 2, dec!(10)).await;
        assert!(matches!(result, Err(LedgerError::WrongCardKind { card: 2 })));

        let result = coordinator.card_cash_advance(1, 1, dec!(900.01)).await;
        assert!(matches!(result, Err(LedgerError::InsufficientCredit { .. })));

        let receipt = coordinator.card_cash_advance(1, 1, dec!(900)).await.unwrap();
        assert_eq!(receipt.record.kind, TransactionKind::CardCashAdvance);
        assert_eq!(receipt.record.description, "Cash advance card ****0001");

        coordinator.card_status_change(1, 3, "blocked").await.unwrap();
        let result = coordinator.card_cash_advance(1, 3, dec!(1)).await;
        assert!(matches!(
            result,
            Err(LedgerError::InvalidState(StateViolation::CardNotActive))
        ));
    }

    #[tokio::test]
    async fn test_loan_payment_without_source() {
        let coordinator = default_ledger().await;

        let receipt = coordinator.loan_payment(1, 1, dec!(100), None).await.unwrap();
        assert_eq!(receipt.applied, dec!(100));
        assert_eq!(receipt.debited, dec!(0));
        assert!(!receipt.paid_off);
        assert_eq!(receipt.loan.remaining_balance, dec!(200));
        assert_eq!(receipt.record.description, "Loan payment auto");
        assert_eq!(balance(&coordinator, 1).await, dec!(500));
    }

    #[tokio::test]
    async fn test_loan_final_payment_from_account() {
        let coordinator = default_ledger().await;

        let receipt = coordinator
            .loan_payment(1, 1, dec!(450), Some(1))
            .await
            .unwrap();
        assert_eq!(receipt.applied, dec!(300));
        assert_eq!(receipt.debited, dec!(450));
        assert!(receipt.paid_off);
        assert_eq!(receipt.loan.status, LoanStatus::Paid);
        assert_eq!(
            receipt.record.description,
            "Loan payment auto from account 1000000001 (final payment)"
        );
        assert_eq!(balance(&coordinator, 1).await, dec!(50));
    }

    #[tokio::test]
    async fn test_loan_payment_applied_policy() {
        let coordinator = ledger(PaymentPolicy {
            card_payment: SourceDebit::Applied,
            loan_payment: SourceDebit::Applied,
        })
        .await;

        let receipt = coordinator
            .loan_payment(1, 1, dec!(450), Some(1))
            .await
            .unwrap();
        assert_eq!(receipt.debited, dec!(300));
        assert_eq!(balance(&coordinator, 1).await, dec!(200));
    }

    #[rstest]
    #[case::expired("expired")]
    #[case::unknown("frozen")]
    #[tokio::test]
    async fn test_invalid_target_status(#[case] status: &str) {
        let coordinator = default_ledger().await;

        let result = coordinator.card_status_change(1, 1, status).await;
        assert!(matches!(result, Err(LedgerError::InvalidTargetStatus { .. })));
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() {
        let coordinator = default_ledger().await;

        let receipt = coordinator.card_status_change(1, 1, "active").await.unwrap();
        assert!(!receipt.changed);
        assert_eq!(receipt.previous, CardStatus::Active);

        let receipt = coordinator.card_status_change(1, 1, "blocked").await.unwrap();
        assert!(receipt.changed);
        let receipt = coordinator.card_status_change(1, 1, "active").await.unwrap();
        assert_eq!(receipt.previous, CardStatus::Blocked);
        assert_eq!(receipt.card.status, CardStatus::Active);
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let coordinator = default_ledger().await;

        let receipt = coordinator
            .execute(Operation::Transfer {
                owner: 2,
                from_account: 2,
                to_number: "1000000001".to_string(),
                amount: dec!(50),
                description: None,
            })
            .await
            .unwrap();

        assert!(matches!(receipt, Receipt::Transfer(_)));
        assert_eq!(receipt.records().len(), 2);
        assert_eq!(receipt.records()[0].description, "Transfer to 1000000001");
    }
}
