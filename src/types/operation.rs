//! Operation requests and their receipts
//!
//! [`Operation`] is the typed request accepted by
//! `TransactionCoordinator::execute`; each variant has a matching [`Receipt`]
//! variant carrying the committed entity snapshots and records.

use super::account::{Account, AccountId, OwnerId};
use super::card::{Card, CardId, CardStatus};
use super::loan::{Loan, LoanId};
use super::transaction::TransactionRecord;
use rust_decimal::Decimal;

/// One logical funds movement (or card status change) on behalf of an owner
///
/// Amounts are carried raw; the coordinator validates them before anything
/// else so that an invalid amount is always reported as `InvalidAmount`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Deposit {
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Withdraw {
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Transfer {
        owner: OwnerId,
        from_account: AccountId,
        to_number: String,
        amount: Decimal,
        description: Option<String>,
    },
    CardPayment {
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
        source_account: AccountId,
    },
    CardPurchase {
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
        description: Option<String>,
    },
    CardCashAdvance {
        owner: OwnerId,
        card: CardId,
        amount: Decimal,
    },
    LoanPayment {
        owner: OwnerId,
        loan: LoanId,
        amount: Decimal,
        source_account: Option<AccountId>,
    },
    CardStatusChange {
        owner: OwnerId,
        card: CardId,
        /// Raw target status; anything outside active/blocked/cancelled is rejected
        status: String,
    },
}

impl Operation {
    /// Acting owner
    pub fn owner(&self) -> OwnerId {
        match self {
            Operation::Deposit { owner, .. }
            | Operation::Withdraw { owner, .. }
            | Operation::Transfer { owner, .. }
            | Operation::CardPayment { owner, .. }
            | Operation::CardPurchase { owner, .. }
            | Operation::CardCashAdvance { owner, .. }
            | Operation::LoanPayment { owner, .. }
            | Operation::CardStatusChange { owner, .. } => *owner,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdrawal",
            Operation::Transfer { .. } => "transfer",
            Operation::CardPayment { .. } => "card_payment",
            Operation::CardPurchase { .. } => "card_purchase",
            Operation::CardCashAdvance { .. } => "card_cash_advance",
            Operation::LoanPayment { .. } => "loan_payment",
            Operation::CardStatusChange { .. } => "card_status",
        }
    }
}

/// Result of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct AccountReceipt {
    pub account: Account,
    pub record: TransactionRecord,
}

/// Result of a transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
    pub outgoing: TransactionRecord,
    pub incoming: TransactionRecord,
}

/// Result of a credit card payment
#[derive(Debug, Clone, PartialEq)]
pub struct CardPaymentReceipt {
    pub card: Card,
    pub source: Account,
    /// Amount taken off the card debt
    pub applied: Decimal,
    /// Amount taken from the source account
    pub debited: Decimal,
    pub record: TransactionRecord,
}

/// Result of a card purchase or cash advance
#[derive(Debug, Clone, PartialEq)]
pub struct CardChargeReceipt {
    pub card: Card,
    /// Linked account after the charge, for debit cards
    pub linked_account: Option<Account>,
    pub record: TransactionRecord,
}

/// Result of a loan payment
#[derive(Debug, Clone, PartialEq)]
pub struct LoanPaymentReceipt {
    pub loan: Loan,
    pub source: Option<Account>,
    pub applied: Decimal,
    pub debited: Decimal,
    /// This payment settled the loan
    pub paid_off: bool,
    pub record: TransactionRecord,
}

/// Result of a card status change
#[derive(Debug, Clone, PartialEq)]
pub struct CardStatusReceipt {
    pub card: Card,
    pub previous: CardStatus,
    /// False when the card already had the requested status
    pub changed: bool,
}

/// Receipt returned by `TransactionCoordinator::execute`
#[derive(Debug, Clone, PartialEq)]
pub enum Receipt {
    Deposit(AccountReceipt),
    Withdrawal(AccountReceipt),
    Transfer(TransferReceipt),
    CardPayment(CardPaymentReceipt),
    CardPurchase(CardChargeReceipt),
    CardCashAdvance(CardChargeReceipt),
    LoanPayment(LoanPaymentReceipt),
    CardStatus(CardStatusReceipt),
}

impl Receipt {
    /// Records committed by the operation, in commit order
    pub fn records(&self) -> Vec<&TransactionRecord> {
        match self {
            Receipt::Deposit(r) | Receipt::Withdrawal(r) => vec![&r.record],
            Receipt::Transfer(r) => vec![&r.outgoing, &r.incoming],
            Receipt::CardPayment(r) => vec![&r.record],
            Receipt::CardPurchase(r) | Receipt::CardCashAdvance(r) => vec![&r.record],
            Receipt::LoanPayment(r) => vec![&r.record],
            Receipt::CardStatus(_) => Vec::new(),
        }
    }
}
