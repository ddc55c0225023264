//! Account-related types for the ledger core
//!
//! This module defines the deposit/checking Account structure and the
//! identifiers shared by every instrument.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner identifier supplied by the authentication collaborator
pub type OwnerId = u32;

/// Internal account identifier
pub type AccountId = u64;

/// Kind of deposit account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deposit or checking account
///
/// Accounts are created by provisioning and afterwards only mutated by the
/// transaction coordinator. The balance never drops below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Internal identifier
    pub id: AccountId,

    /// Owner of the account
    pub owner: OwnerId,

    /// Public account number, unique among accounts
    ///
    /// Transfers resolve their destination through this number.
    pub number: String,

    /// Savings or checking
    pub account_type: AccountType,

    /// Current balance (always >= 0)
    pub balance: Decimal,
}

impl Account {
    /// Create a new account with the given opening balance
    pub fn new(
        id: AccountId,
        owner: OwnerId,
        number: impl Into<String>,
        account_type: AccountType,
        balance: Decimal,
    ) -> Self {
        Account {
            id,
            owner,
            number: number.into(),
            account_type,
            balance,
        }
    }
}
