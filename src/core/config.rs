//! Ledger configuration
//!
//! Knobs that change ledger semantics rather than how the driver schedules
//! work. Driver-side batching lives in `strategy::BatchConfig`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default number of candidates the identifier generator tries
pub const DEFAULT_ID_ATTEMPTS: u32 = 32;

/// How much a payment takes from its source account
///
/// Validation always checks the source against the requested amount; this
/// only decides what is actually debited once the payment has been capped
/// at the outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceDebit {
    /// Debit the full amount the caller asked to pay
    Requested,
    /// Debit only what was applied against the debt
    Applied,
}

/// Source-debit policy per payment operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPolicy {
    pub card_payment: SourceDebit,
    pub loan_payment: SourceDebit,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            card_payment: SourceDebit::Applied,
            loan_payment: SourceDebit::Requested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub payment_policy: PaymentPolicy,
    /// Attempts before the identifier generator gives up
    pub id_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            payment_policy: PaymentPolicy::default(),
            id_attempts: DEFAULT_ID_ATTEMPTS,
        }
    }
}

impl LedgerConfig {
    /// Build a config, falling back to the default attempt count on zero
    pub fn new(payment_policy: PaymentPolicy, id_attempts: u32) -> Self {
        let id_attempts = if id_attempts == 0 {
            tracing::warn!(
                id_attempts,
                default = DEFAULT_ID_ATTEMPTS,
                "invalid identifier attempt count, using default"
            );
            DEFAULT_ID_ATTEMPTS
        } else {
            id_attempts
        };

        Self {
            payment_policy,
            id_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PaymentPolicy::default();
        assert_eq!(policy.card_payment, SourceDebit::Applied);
        assert_eq!(policy.loan_payment, SourceDebit::Requested);
    }

    #[test]
    fn test_zero_attempts_falls_back() {
        let config = LedgerConfig::new(PaymentPolicy::default(), 0);
        assert_eq!(config.id_attempts, DEFAULT_ID_ATTEMPTS);

        let config = LedgerConfig::new(PaymentPolicy::default(), 5);
        assert_eq!(config.id_attempts, 5);
    }
}
