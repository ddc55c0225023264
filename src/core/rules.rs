//! Balance rules
//!
//! Pure invariant checks and derived-field recomputation shared by the
//! coordinator and the store's provisioning validation. Nothing here touches
//! storage or has side effects, so every rule can be tested in isolation.
//!
//! The invariants enforced are:
//! - `Account.balance >= 0`
//! - for credit cards, `available_credit = credit_limit - current_debt` with
//!   `0 <= available_credit <= credit_limit`
//! - `Loan.remaining_balance >= 0`, and a non-defaulted loan is `paid`
//!   exactly when nothing remains

use crate::types::{Account, Card, CardKind, LedgerError, Loan, LoanStatus};
use rust_decimal::Decimal;

/// Recomputed credit card fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditFields {
    pub current_debt: Decimal,
    pub available_credit: Decimal,
}

/// Loan balance after a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payoff {
    pub remaining_balance: Decimal,
    pub paid: bool,
}

/// Whether `balance` covers `amount`
pub fn sufficient_funds(balance: Decimal, amount: Decimal) -> bool {
    balance >= amount
}

/// Whether a credit line with `limit` and `debt` can absorb `amount`
pub fn credit_capacity(limit: Decimal, debt: Decimal, amount: Decimal) -> bool {
    clamp_credit_fields(limit, debt).available_credit >= amount
}

/// Normalize debt and derive available credit
///
/// Debt is floored at zero; available credit is `limit - debt` clamped into
/// `[0, limit]`.
pub fn clamp_credit_fields(limit: Decimal, debt: Decimal) -> CreditFields {
    let current_debt = debt.max(Decimal::ZERO);
    let available_credit = (limit - current_debt).max(Decimal::ZERO).min(limit);
    CreditFields {
        current_debt,
        available_credit,
    }
}

/// Apply a payment of `applied` to a loan with `remaining` outstanding
pub fn loan_payoff(remaining: Decimal, applied: Decimal) -> Payoff {
    let remaining_balance = (remaining - applied).max(Decimal::ZERO);
    Payoff {
        remaining_balance,
        paid: remaining_balance.is_zero(),
    }
}

/// Portion of a payment that can be applied against an outstanding balance
pub fn applied_amount(requested: Decimal, outstanding: Decimal) -> Decimal {
    requested.min(outstanding)
}

/// Checked addition
///
/// # Errors
///
/// Returns `LedgerError::ArithmeticOverflow` naming `operation` when the sum
/// does not fit.
pub fn credit(value: Decimal, amount: Decimal, operation: &str) -> Result<Decimal, LedgerError> {
    value
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation))
}

/// Checked subtraction
///
/// Sufficiency must be checked by the caller; this only guards the
/// arithmetic itself.
pub fn debit(value: Decimal, amount: Decimal, operation: &str) -> Result<Decimal, LedgerError> {
    value
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation))
}

/// Verify an account satisfies every invariant
pub fn check_account(account: &Account) -> Result<(), LedgerError> {
    if account.number.trim().is_empty() {
        return Err(LedgerError::validation(format!(
            "account {} has no number",
            account.id
        )));
    }
    if account.balance < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "account {} has negative balance {}",
            account.id, account.balance
        )));
    }
    Ok(())
}

/// Whether `expiry` reads as `MM/YY` (the slash is optional)
pub fn valid_expiry(expiry: &str) -> bool {
    let digits: Vec<char> = expiry.chars().filter(|c| *c != '/').collect();
    let slashes = expiry.len() - digits.len();
    if digits.len() != 4 || slashes > 1 || !digits.iter().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if slashes == 1 && expiry.find('/') != Some(2) {
        return false;
    }
    let month: String = digits[..2].iter().collect();
    matches!(month.parse::<u32>(), Ok(1..=12))
}

/// Verify a card satisfies every invariant
pub fn check_card(card: &Card) -> Result<(), LedgerError> {
    if card.number.trim().is_empty() {
        return Err(LedgerError::validation(format!(
            "card {} has no number",
            card.id
        )));
    }
    if !valid_expiry(&card.expiry) {
        return Err(LedgerError::validation(format!(
            "card {} has invalid expiry '{}'",
            card.id, card.expiry
        )));
    }

    if let CardKind::Credit {
        credit_limit,
        current_debt,
        available_credit,
    } = card.kind
    {
        if credit_limit < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "card {} has negative credit limit {}",
                card.id, credit_limit
            )));
        }
        if current_debt < Decimal::ZERO || current_debt > credit_limit {
            return Err(LedgerError::validation(format!(
                "card {} debt {} outside [0, {}]",
                card.id, current_debt, credit_limit
            )));
        }
        if available_credit != credit_limit - current_debt {
            return Err(LedgerError::validation(format!(
                "card {} available credit {} does not match limit {} minus debt {}",
                card.id, available_credit, credit_limit, current_debt
            )));
        }
    }
    Ok(())
}

/// Verify a loan satisfies every invariant
pub fn check_loan(loan: &Loan) -> Result<(), LedgerError> {
    if loan.principal <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "loan {} has non-positive principal {}",
            loan.id, loan.principal
        )));
    }
    if loan.interest_rate < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "loan {} has negative interest rate",
            loan.id
        )));
    }
    if loan.remaining_balance < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "loan {} has negative remaining balance {}",
            loan.id, loan.remaining_balance
        )));
    }

    let settled = loan.remaining_balance.is_zero();
    match loan.status {
        LoanStatus::Paid if !settled => Err(LedgerError::validation(format!(
            "loan {} is paid but {} remains",
            loan.id, loan.remaining_balance
        ))),
        LoanStatus::Active if settled => Err(LedgerError::validation(format!(
            "loan {} is active with nothing remaining",
            loan.id
        ))),
        _ => Ok(()),
    }
}
