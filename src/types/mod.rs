//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `account`: Deposit accounts and identifier aliases
//! - `card`: Payment cards, their kinds and lifecycle
//! - `loan`: Installment loans
//! - `transaction`: Immutable ledger records and the `Amount` newtype
//! - `operation`: Operation requests and receipts
//! - `error`: Error types for the ledger core

pub mod account;
pub mod card;
pub mod error;
pub mod loan;
pub mod operation;
pub mod transaction;

pub use account::{Account, AccountId, AccountType, OwnerId};
pub use card::{Card, CardId, CardKind, CardStatus};
pub use error::{Entity, ErrorKind, LedgerError, StateViolation};
pub use loan::{Loan, LoanId, LoanStatus, LoanType};
pub use operation::{
    AccountReceipt, CardChargeReceipt, CardPaymentReceipt, CardStatusReceipt,
    LoanPaymentReceipt, Operation, Receipt, TransferReceipt,
};
pub use transaction::{Amount, NewRecord, RecordId, TransactionKind, TransactionRecord};
