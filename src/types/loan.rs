//! Installment loan types

use super::account::OwnerId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal loan identifier
pub type LoanId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanType {
    Personal,
    Mortgage,
    Auto,
    Student,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanType::Personal => "personal",
            LoanType::Mortgage => "mortgage",
            LoanType::Auto => "auto",
            LoanType::Student => "student",
        }
    }
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Paid,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Paid => "paid",
            LoanStatus::Defaulted => "defaulted",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installment loan
///
/// `status == Paid` exactly when `remaining_balance` reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub owner: OwnerId,
    pub loan_type: LoanType,

    /// Original amount lent
    pub principal: Decimal,

    /// Annual interest rate in percent (5 means 5%)
    pub interest_rate: Decimal,

    pub term_months: u32,

    /// Outstanding balance (always >= 0)
    pub remaining_balance: Decimal,

    pub status: LoanStatus,
}

impl Loan {
    /// Create a freshly disbursed loan with the whole principal outstanding
    pub fn new(
        id: LoanId,
        owner: OwnerId,
        loan_type: LoanType,
        principal: Decimal,
        interest_rate: Decimal,
        term_months: u32,
    ) -> Self {
        Loan {
            id,
            owner,
            loan_type,
            principal,
            interest_rate,
            term_months,
            remaining_balance: principal,
            status: LoanStatus::Active,
        }
    }
}
