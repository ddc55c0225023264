//! Payment card types
//!
//! A card shares its identity and lifecycle fields across kinds; everything
//! that only makes sense for one kind lives in the [`CardKind`] variant.

use super::account::{AccountId, OwnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal card identifier
pub type CardId = u64;

/// Card lifecycle status
///
/// `Expired` and `Cancelled` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
    Cancelled,
}

impl CardStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CardStatus::Expired | CardStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Blocked => "blocked",
            CardStatus::Expired => "expired",
            CardStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(CardStatus::Active),
            "blocked" => Ok(CardStatus::Blocked),
            "expired" => Ok(CardStatus::Expired),
            "cancelled" | "canceled" => Ok(CardStatus::Cancelled),
            other => Err(format!("unknown card status '{}'", other)),
        }
    }
}

/// Kind-specific card fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CardKind {
    /// Revolving credit line
    ///
    /// `available_credit` is derived: `credit_limit - current_debt`, clamped
    /// to `[0, credit_limit]`.
    Credit {
        credit_limit: Decimal,
        current_debt: Decimal,
        available_credit: Decimal,
    },

    /// Card drawing directly on a deposit account
    Debit { linked_account: AccountId },
}

impl CardKind {
    /// Fresh credit line with no debt
    pub fn credit(credit_limit: Decimal) -> Self {
        CardKind::Credit {
            credit_limit,
            current_debt: Decimal::ZERO,
            available_credit: credit_limit,
        }
    }

    pub fn debit(linked_account: AccountId) -> Self {
        CardKind::Debit { linked_account }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CardKind::Credit { .. } => "credit",
            CardKind::Debit { .. } => "debit",
        }
    }
}

/// Payment card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub owner: OwnerId,

    /// Public card number, unique among cards
    pub number: String,

    /// Expiry as printed on the card (MM/YY); informational only
    pub expiry: String,

    pub status: CardStatus,

    #[serde(flatten)]
    pub kind: CardKind,
}

impl Card {
    pub fn new(
        id: CardId,
        owner: OwnerId,
        number: impl Into<String>,
        expiry: impl Into<String>,
        kind: CardKind,
    ) -> Self {
        Card {
            id,
            owner,
            number: number.into(),
            expiry: expiry.into(),
            status: CardStatus::Active,
            kind,
        }
    }

    /// Last four digits, used in record descriptions
    pub fn last_four(&self) -> &str {
        let start = self.number.len().saturating_sub(4);
        self.number.get(start..).unwrap_or(&self.number)
    }
}
