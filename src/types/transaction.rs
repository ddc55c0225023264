//! Transaction record types
//!
//! Every committed balance change is accompanied by an immutable
//! [`TransactionRecord`]. The coordinator builds [`NewRecord`]s while staging
//! an operation; the store assigns the identifier and timestamp at commit.

use super::account::{AccountId, OwnerId};
use super::card::CardId;
use super::error::LedgerError;
use super::loan::LoanId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned record identifier, monotonically increasing
pub type RecordId = u64;

/// Kind of ledger movement a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    LoanPayment,
    /// Informational record written when a loan is provisioned
    LoanDisbursement,
    CardPayment,
    CardPurchase,
    CardCashAdvance,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::LoanPayment => "loan_payment",
            TransactionKind::LoanDisbursement => "loan_disbursement",
            TransactionKind::CardPayment => "card_payment",
            TransactionKind::CardPurchase => "card_purchase",
            TransactionKind::CardCashAdvance => "card_cash_advance",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strictly positive monetary amount
///
/// All funds-movement operations take their amount through this type, so a
/// zero or negative value is rejected before any entity is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Validate a raw decimal
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `value <= 0`.
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(value));
        }
        Ok(Amount(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Record staged inside a unit of work, not yet committed
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub owner: OwnerId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub account: Option<AccountId>,
    pub card: Option<CardId>,
    pub loan: Option<LoanId>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
}

impl NewRecord {
    pub fn new(
        owner: OwnerId,
        kind: TransactionKind,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        NewRecord {
            owner,
            kind,
            amount,
            description: description.into(),
            account: None,
            card: None,
            loan: None,
            from_number: None,
            to_number: None,
        }
    }

    pub fn account(mut self, id: AccountId) -> Self {
        self.account = Some(id);
        self
    }

    pub fn card(mut self, id: CardId) -> Self {
        self.card = Some(id);
        self
    }

    pub fn loan(mut self, id: LoanId) -> Self {
        self.loan = Some(id);
        self
    }

    pub fn between(mut self, from_number: &str, to_number: &str) -> Self {
        self.from_number = Some(from_number.to_string());
        self.to_number = Some(to_number.to_string());
        self
    }

    /// Seal the record with its store-assigned id and commit timestamp
    pub fn commit(self, id: RecordId, timestamp: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            owner: self.owner,
            kind: self.kind,
            amount: self.amount,
            timestamp,
            description: self.description,
            account: self.account,
            card: self.card,
            loan: self.loan,
            from_number: self.from_number,
            to_number: self.to_number,
        }
    }
}

/// Immutable record of a committed balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub owner: OwnerId,
    pub kind: TransactionKind,

    /// Applied amount (always > 0)
    pub amount: Decimal,

    pub timestamp: DateTime<Utc>,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan: Option<LoanId>,

    /// External account numbers, set on transfer records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_number: Option<String>,
}
