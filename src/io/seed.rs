//! Seed loading and provisioning
//!
//! Ledgers start from a JSON seed describing the accounts, cards and loans
//! to provision:
//!
//! ```json
//! {
//!   "accounts": [{ "id": 1, "owner": 1, "account_type": "savings", "balance": "500.00" }],
//!   "cards": [{ "id": 1, "owner": 1, "kind": "credit", "credit_limit": "1000" },
//!             { "id": 2, "owner": 1, "kind": "debit", "linked_account": 1 }],
//!   "loans": [{ "id": 1, "owner": 1, "loan_type": "personal", "principal": "5000",
//!               "interest_rate": "5", "term_months": 12 }]
//! }
//! ```
//!
//! Accounts and cards without a `number` get one from the identifier
//! generator; cards without an `expiry` expire three years from now.

use crate::core::identifier::{IdentifierGenerator, InstrumentClass, NumberSource};
use crate::core::rules;
use crate::core::traits::LedgerStore;
use crate::types::{
    Account, AccountId, AccountType, Card, CardId, CardKind, CardStatus, LedgerError, Loan,
    LoanId, LoanStatus, LoanType, OwnerId,
};
use chrono::{Months, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Card validity granted when the seed does not state an expiry
const DEFAULT_CARD_VALIDITY_MONTHS: u32 = 36;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
    #[serde(default)]
    pub cards: Vec<SeedCard>,
    #[serde(default)]
    pub loans: Vec<SeedLoan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
    pub id: AccountId,
    pub owner: OwnerId,
    pub number: Option<String>,
    pub account_type: AccountType,
    #[serde(default)]
    pub balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SeedCardKind {
    Credit {
        credit_limit: Decimal,
        #[serde(default)]
        current_debt: Decimal,
    },
    Debit {
        linked_account: AccountId,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCard {
    pub id: CardId,
    pub owner: OwnerId,
    pub number: Option<String>,
    pub expiry: Option<String>,
    pub status: Option<CardStatus>,
    #[serde(flatten)]
    pub kind: SeedCardKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedLoan {
    pub id: LoanId,
    pub owner: OwnerId,
    pub loan_type: LoanType,
    pub principal: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
    pub term_months: u32,
    /// Defaults to the principal
    pub remaining_balance: Option<Decimal>,
    pub status: Option<LoanStatus>,
}

/// Counts of provisioned rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub accounts: usize,
    pub cards: usize,
    pub loans: usize,
}

/// Read a seed file
///
/// # Errors
///
/// `LedgerError::Io` if the file cannot be opened, `LedgerError::Seed` if it
/// is not a valid seed document.
pub fn load_seed(path: &Path) -> Result<Seed, LedgerError> {
    let file = File::open(path).map_err(|e| LedgerError::Io {
        message: format!("Failed to open seed '{}': {}", path.display(), e),
    })?;
    let seed = serde_json::from_reader(BufReader::new(file))?;
    Ok(seed)
}

fn default_expiry() -> String {
    let now = Utc::now();
    now.checked_add_months(Months::new(DEFAULT_CARD_VALIDITY_MONTHS))
        .unwrap_or(now)
        .format("%m/%y")
        .to_string()
}

impl SeedCardKind {
    fn into_kind(self) -> CardKind {
        match self {
            SeedCardKind::Credit {
                credit_limit,
                current_debt,
            } => {
                let fields = rules::clamp_credit_fields(credit_limit, current_debt);
                CardKind::Credit {
                    credit_limit,
                    current_debt: fields.current_debt,
                    available_credit: fields.available_credit,
                }
            }
            SeedCardKind::Debit { linked_account } => CardKind::Debit { linked_account },
        }
    }
}

/// Provision every row of `seed` into `store`
///
/// Accounts go in first so debit cards can link to them. Each loan gets its
/// disbursement record from the store.
///
/// # Errors
///
/// The first provisioning failure aborts the load; rows inserted before it
/// stay in the store.
pub async fn provision<S, N>(
    store: &S,
    seed: Seed,
    generator: &mut IdentifierGenerator<N>,
) -> Result<ProvisionSummary, LedgerError>
where
    S: LedgerStore + ?Sized,
    N: NumberSource,
{
    let mut summary = ProvisionSummary::default();

    for row in seed.accounts {
        let number = match row.number {
            Some(number) => number,
            None => generator.generate(store, InstrumentClass::Account).await?,
        };
        store
            .insert_account(Account::new(
                row.id,
                row.owner,
                number,
                row.account_type,
                row.balance,
            ))
            .await?;
        summary.accounts += 1;
    }

    for row in seed.cards {
        let number = match row.number {
            Some(number) => number,
            None => generator.generate(store, InstrumentClass::Card).await?,
        };
        let mut card = Card::new(
            row.id,
            row.owner,
            number,
            row.expiry.unwrap_or_else(default_expiry),
            row.kind.into_kind(),
        );
        if let Some(status) = row.status {
            card.status = status;
        }
        store.insert_card(card).await?;
        summary.cards += 1;
    }

    for row in seed.loans {
        let mut loan = Loan::new(
            row.id,
            row.owner,
            row.loan_type,
            row.principal,
            row.interest_rate,
            row.term_months,
        );
        if let Some(remaining) = row.remaining_balance {
            loan.remaining_balance = remaining;
        }
        if let Some(status) = row.status {
            loan.status = status;
        }
        store.insert_loan(loan).await?;
        summary.loans += 1;
    }

    info!(
        accounts = summary.accounts,
        cards = summary.cards,
        loans = summary.loans,
        "ledger provisioned"
    );
    Ok(summary)
}
