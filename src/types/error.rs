//! Error types for the ledger core
//!
//! This module defines every failure a ledger operation, the store, or the
//! driver can report.
//!
//! # Error Categories
//!
//! - **Business-rule rejections**: insufficient funds or credit, invalid
//!   amounts, wrong instrument state. The operation is refused and nothing
//!   is committed.
//! - **Access**: `NotFound` covers both absence and ownership mismatch, so a
//!   caller cannot discover other owners' instruments.
//! - **Store failures**: optimistic `Conflict`, poisoned locks, arithmetic
//!   overflow while staging.
//! - **Driver failures**: file I/O, CSV/JSON parsing, invalid seed data.
//!
//! Use [`LedgerError::kind`] for a flat classification and
//! [`LedgerError::user_message`] for the text safe to show an end user.

use super::account::AccountId;
use super::card::{CardId, CardStatus};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Instrument class named in `NotFound` errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Card,
    Loan,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Account => f.write_str("account"),
            Entity::Card => f.write_str("card"),
            Entity::Loan => f.write_str("loan"),
        }
    }
}

/// State preconditions an operation can trip over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Card is not `active`
    CardNotActive,
    /// Credit card payment with nothing owed
    NoDebt,
    /// Loan is in a status that does not accept payments
    LoanNotActive,
    /// Loan has nothing left to pay
    AlreadyPaid,
}

impl fmt::Display for StateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StateViolation::CardNotActive => "card is not active",
            StateViolation::NoDebt => "card has no outstanding debt",
            StateViolation::LoanNotActive => "loan is not active",
            StateViolation::AlreadyPaid => "loan is already paid",
        };
        f.write_str(text)
    }
}

/// Flat classification of [`LedgerError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    InsufficientCredit,
    InvalidState,
    SameAccount,
    TerminalState,
    WrongCardKind,
    InvalidTargetStatus,
    Validation,
    Conflict,
    Arithmetic,
    IdentifierExhausted,
    Storage,
    Io,
    Parse,
    Seed,
}

/// Main error type for the ledger core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Entity absent, or not owned by the acting owner
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    /// Amount is zero, negative, or not a number
    #[error("Invalid amount '{amount}'")]
    InvalidAmount { amount: String },

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient credit on card {card}: available {available}, requested {requested}")]
    InsufficientCredit {
        card: CardId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Invalid state: {0}")]
    InvalidState(StateViolation),

    /// Transfer whose source and destination resolve to the same account
    #[error("Cannot transfer account {number} to itself")]
    SameAccount { number: String },

    /// Card already expired or cancelled
    #[error("Card {card} is {status} and cannot change status")]
    TerminalState { card: CardId, status: CardStatus },

    /// Operation requires a credit card
    #[error("Card {card} is not a credit card")]
    WrongCardKind { card: CardId },

    /// Requested status is not a valid transition target
    #[error("Invalid target status '{status}'")]
    InvalidTargetStatus { status: String },

    /// Provisioned row violates an invariant or a uniqueness constraint
    #[error("Validation failed: {message}")]
    ValidationError { message: String },

    /// Data read by a unit of work changed before it committed
    ///
    /// Nothing was applied; the caller may resubmit.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: Entity, id: u64 },

    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    #[error("Could not generate a unique {class} number after {attempts} attempts")]
    IdentifierExhausted { class: String, attempts: u32 },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse { line: Option<u64>, message: String },

    #[error("Invalid seed: {message}")]
    Seed { message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for LedgerError {
    fn from(error: csv_async::Error) -> Self {
        LedgerError::Parse {
            line: None,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::Seed {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_amount(amount: impl ToString) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    pub fn insufficient_funds(account: AccountId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    pub fn insufficient_credit(card: CardId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientCredit {
            card,
            available,
            requested,
        }
    }

    pub fn same_account(number: &str) -> Self {
        LedgerError::SameAccount {
            number: number.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::ValidationError {
            message: message.into(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    pub fn seed(message: impl Into<String>) -> Self {
        LedgerError::Seed {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            LedgerError::InvalidState(_) => ErrorKind::InvalidState,
            LedgerError::SameAccount { .. } => ErrorKind::SameAccount,
            LedgerError::TerminalState { .. } => ErrorKind::TerminalState,
            LedgerError::WrongCardKind { .. } => ErrorKind::WrongCardKind,
            LedgerError::InvalidTargetStatus { .. } => ErrorKind::InvalidTargetStatus,
            LedgerError::ValidationError { .. } => ErrorKind::Validation,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::ArithmeticOverflow { .. } => ErrorKind::Arithmetic,
            LedgerError::IdentifierExhausted { .. } => ErrorKind::IdentifierExhausted,
            LedgerError::Storage { .. } => ErrorKind::Storage,
            LedgerError::Io { .. } => ErrorKind::Io,
            LedgerError::Parse { .. } => ErrorKind::Parse,
            LedgerError::Seed { .. } => ErrorKind::Seed,
        }
    }

    /// Whether resubmitting the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    /// Fixed, detail-free message for the user-facing boundary
    ///
    /// Balances, identifiers and internal causes never leak through here;
    /// they stay in the `Display` output for logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "The requested item was not found",
            LedgerError::InvalidAmount { .. } => "The amount must be a positive number",
            LedgerError::InsufficientFunds { .. } => "Insufficient funds",
            LedgerError::InsufficientCredit { .. } => "Insufficient available credit",
            LedgerError::InvalidState(StateViolation::CardNotActive) => "The card is not active",
            LedgerError::InvalidState(StateViolation::NoDebt) => "The card has no pending debt",
            LedgerError::InvalidState(StateViolation::LoanNotActive) => "The loan is not active",
            LedgerError::InvalidState(StateViolation::AlreadyPaid) => {
                "The loan is already fully paid"
            }
            LedgerError::SameAccount { .. } => "Cannot transfer to the same account",
            LedgerError::TerminalState { .. } => {
                "The status of an expired or cancelled card cannot be changed"
            }
            LedgerError::WrongCardKind { .. } => "This operation requires a credit card",
            LedgerError::InvalidTargetStatus { .. } => "Invalid card status",
            LedgerError::ValidationError { .. } => "The provided data is invalid",
            LedgerError::Conflict { .. } => "The operation could not be completed, please retry",
            LedgerError::ArithmeticOverflow { .. }
            | LedgerError::IdentifierExhausted { .. }
            | LedgerError::Storage { .. }
            | LedgerError::Io { .. }
            | LedgerError::Parse { .. }
            | LedgerError::Seed { .. } => "Internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case::not_found(
        LedgerError::not_found(Entity::Account, 7),
        "account 7 not found"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(1, dec!(0.50), dec!(1.00)),
        "Insufficient funds in account 1: balance 0.50, requested 1.00"
    )]
    #[case::insufficient_credit(
        LedgerError::insufficient_credit(3, dec!(0), dec!(1)),
        "Insufficient credit on card 3: available 0, requested 1"
    )]
    #[case::invalid_state(
        LedgerError::InvalidState(StateViolation::NoDebt),
        "Invalid state: card has no outstanding debt"
    )]
    #[case::terminal(
        LedgerError::TerminalState { card: 9, status: CardStatus::Cancelled },
        "Card 9 is cancelled and cannot change status"
    )]
    #[case::parse_with_line(
        LedgerError::Parse { line: Some(42), message: "bad field".to_string() },
        "Parse error at line 42: bad field"
    )]
    #[case::parse_without_line(
        LedgerError::Parse { line: None, message: "bad field".to_string() },
        "Parse error: bad field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::not_found(LedgerError::not_found(Entity::Loan, 1), ErrorKind::NotFound)]
    #[case::same_account(LedgerError::same_account("1234567890"), ErrorKind::SameAccount)]
    #[case::conflict(
        LedgerError::Conflict { entity: Entity::Account, id: 1 },
        ErrorKind::Conflict
    )]
    #[case::validation(LedgerError::validation("negative balance"), ErrorKind::Validation)]
    #[case::overflow(LedgerError::arithmetic_overflow("deposit"), ErrorKind::Arithmetic)]
    fn test_error_kind(#[case] error: LedgerError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_user_message_hides_details() {
        let error = LedgerError::insufficient_funds(42, dec!(10.00), dec!(99.00));
        let message = error.user_message();
        assert!(!message.contains("42"));
        assert!(!message.contains("99"));
        assert_eq!(message, "Insufficient funds");

        let storage = LedgerError::storage("lock poisoned at shard 3");
        assert_eq!(storage.user_message(), "Internal error");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(LedgerError::Conflict {
            entity: Entity::Card,
            id: 1
        }
        .is_retryable());
        assert!(!LedgerError::insufficient_funds(1, dec!(0), dec!(1)).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert_eq!(error.to_string(), "I/O error: Permission denied");
        assert_eq!(error.kind(), ErrorKind::Io);
    }
}
