//! CSV format handling for operation input and position output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvOperation structure for deserialization
//! - Conversion from CSV rows to [`Operation`]s
//! - Position output serialization
//!
//! # Input columns
//!
//! `op, owner, target, amount, source, counterparty, status, description`
//!
//! | op | target | other columns used |
//! |---|---|---|
//! | deposit / withdrawal | account id | amount, description |
//! | transfer | source account id | amount, counterparty (destination number), description |
//! | card_payment | card id | amount, source (account id) |
//! | card_purchase | card id | amount, description |
//! | card_cash_advance | card id | amount |
//! | loan_payment | loan id | amount, source (optional account id) |
//! | card_status | card id | status |
//!
//! All functions are pure (no I/O) for easy testing.

use crate::core::traits::LedgerSnapshot;
use crate::types::{CardKind, LedgerError, Operation, OwnerId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Header of the position output
pub const POSITION_HEADER: [&str; 10] = [
    "instrument",
    "id",
    "owner",
    "number",
    "kind",
    "status",
    "balance",
    "credit_limit",
    "current_debt",
    "available_credit",
];

/// CSV row structure for deserialization
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvOperation {
    pub op: String,
    pub owner: OwnerId,
    pub target: u64,
    pub amount: Option<String>,
    pub source: Option<u64>,
    pub counterparty: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse the amount column
///
/// Only presence and syntax are checked here; sign is left to the
/// coordinator so that `0` and `-5` surface as `InvalidAmount` rejections.
fn parse_amount(row: &CsvOperation) -> Result<Decimal, String> {
    match &row.amount {
        Some(raw) if !raw.trim().is_empty() => Decimal::from_str(raw.trim())
            .map_err(|_| format!("Invalid amount '{}' for {} on {}", raw, row.op, row.target)),
        _ => Err(format!("{} on {} requires an amount", row.op, row.target)),
    }
}

/// Convert a CsvOperation to an Operation
///
/// # Returns
///
/// - Ok(Operation) - Successfully converted row
/// - Err(String) - Unknown op, missing or malformed column
pub fn convert_csv_operation(row: CsvOperation) -> Result<Operation, String> {
    let op = row.op.trim().to_lowercase();
    let owner = row.owner;
    let target = row.target;

    let operation = match op.as_str() {
        "deposit" => Operation::Deposit {
            owner,
            account: target,
            amount: parse_amount(&row)?,
            description: non_empty(row.description),
        },
        "withdrawal" | "withdraw" => Operation::Withdraw {
            owner,
            account: target,
            amount: parse_amount(&row)?,
            description: non_empty(row.description),
        },
        "transfer" => {
            let amount = parse_amount(&row)?;
            let to_number = non_empty(row.counterparty)
                .ok_or_else(|| format!("transfer from {} requires a counterparty", target))?;
            Operation::Transfer {
                owner,
                from_account: target,
                to_number: to_number.trim().to_string(),
                amount,
                description: non_empty(row.description),
            }
        }
        "card_payment" => {
            let amount = parse_amount(&row)?;
            let source_account = row
                .source
                .ok_or_else(|| format!("card_payment on {} requires a source account", target))?;
            Operation::CardPayment {
                owner,
                card: target,
                amount,
                source_account,
            }
        }
        "card_purchase" => Operation::CardPurchase {
            owner,
            card: target,
            amount: parse_amount(&row)?,
            description: non_empty(row.description),
        },
        "card_cash_advance" => Operation::CardCashAdvance {
            owner,
            card: target,
            amount: parse_amount(&row)?,
        },
        "loan_payment" => Operation::LoanPayment {
            owner,
            loan: target,
            amount: parse_amount(&row)?,
            source_account: row.source,
        },
        "card_status" => {
            let status = non_empty(row.status)
                .ok_or_else(|| format!("card_status on {} requires a status", target))?;
            Operation::CardStatusChange {
                owner,
                card: target,
                status: status.trim().to_string(),
            }
        }
        _ => return Err(format!("Invalid operation '{}' on {}", row.op, target)),
    };

    Ok(operation)
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Write every instrument in `snapshot` as CSV
///
/// Rows are ordered accounts, then cards, then loans, each by id. Columns
/// that do not apply to an instrument are left empty.
pub fn write_positions_csv(
    snapshot: &LedgerSnapshot,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(POSITION_HEADER)?;

    for account in &snapshot.accounts {
        writer.write_record([
            "account".to_string(),
            account.id.to_string(),
            account.owner.to_string(),
            account.number.clone(),
            account.account_type.to_string(),
            String::new(),
            money(account.balance),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }

    for card in &snapshot.cards {
        let (limit, debt, available) = match card.kind {
            CardKind::Credit {
                credit_limit,
                current_debt,
                available_credit,
            } => (
                money(credit_limit),
                money(current_debt),
                money(available_credit),
            ),
            CardKind::Debit { .. } => (String::new(), String::new(), String::new()),
        };
        writer.write_record([
            "card".to_string(),
            card.id.to_string(),
            card.owner.to_string(),
            card.number.clone(),
            card.kind.name().to_string(),
            card.status.to_string(),
            String::new(),
            limit,
            debt,
            available,
        ])?;
    }

    for loan in &snapshot.loans {
        writer.write_record([
            "loan".to_string(),
            loan.id.to_string(),
            loan.owner.to_string(),
            String::new(),
            loan.loan_type.to_string(),
            loan.status.to_string(),
            money(loan.remaining_balance),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
