//! External number generation
//!
//! Account and card numbers are random numerals checked against the store's
//! uniqueness query. The randomness comes from an injected [`NumberSource`]
//! so tests can force collisions deterministically.
//!
//! # Formats
//!
//! - account: 10 digits in `1000000000..=9999999999`
//! - card: four 4-digit groups, each in `1000..=9999`, concatenated
//!
//! Generation only narrows the collision window; the store still rejects a
//! duplicate number on insert.

use crate::core::traits::LedgerStore;
use crate::types::LedgerError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::debug;

const ACCOUNT_LOW: u64 = 1_000_000_000;
const ACCOUNT_HIGH: u64 = 9_999_999_999;
const CARD_GROUP_LOW: u64 = 1_000;
const CARD_GROUP_HIGH: u64 = 9_999;
const CARD_GROUPS: usize = 4;

/// Instrument classes with their own number namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentClass {
    Account,
    Card,
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentClass::Account => f.write_str("account"),
            InstrumentClass::Card => f.write_str("card"),
        }
    }
}

/// Source of numbers for candidate generation
pub trait NumberSource: Send {
    /// Next number in `low..=high`
    fn next_in(&mut self, low: u64, high: u64) -> u64;
}

/// Uniform random numbers from `StdRng`
pub struct RandomNumberSource {
    rng: StdRng,
}

impl RandomNumberSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible source for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomNumberSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberSource for RandomNumberSource {
    fn next_in(&mut self, low: u64, high: u64) -> u64 {
        self.rng.gen_range(low..=high)
    }
}

/// Deterministic source cycling through fixed offsets
///
/// Each value is taken as an offset from `low`, wrapped into the requested
/// range. An empty list always yields `low`.
#[derive(Debug, Clone)]
pub struct SequenceNumberSource {
    offsets: Vec<u64>,
    position: usize,
}

impl SequenceNumberSource {
    pub fn new(offsets: Vec<u64>) -> Self {
        Self {
            offsets,
            position: 0,
        }
    }
}

impl NumberSource for SequenceNumberSource {
    fn next_in(&mut self, low: u64, high: u64) -> u64 {
        if self.offsets.is_empty() {
            return low;
        }
        let offset = self.offsets[self.position % self.offsets.len()];
        self.position += 1;
        let span = high.saturating_sub(low).saturating_add(1);
        low + offset % span
    }
}

/// Collision-checked number generator
pub struct IdentifierGenerator<N: NumberSource> {
    source: N,
    max_attempts: u32,
}

impl<N: NumberSource> IdentifierGenerator<N> {
    /// Create a generator trying at most `max_attempts` candidates per call
    pub fn new(source: N, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    fn candidate(&mut self, class: InstrumentClass) -> String {
        match class {
            InstrumentClass::Account => self.source.next_in(ACCOUNT_LOW, ACCOUNT_HIGH).to_string(),
            InstrumentClass::Card => (0..CARD_GROUPS)
                .map(|_| self.source.next_in(CARD_GROUP_LOW, CARD_GROUP_HIGH).to_string())
                .collect(),
        }
    }

    /// Produce a number not yet used within `class`
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::IdentifierExhausted` when every attempt collides,
    /// or any error raised by the store's uniqueness query.
    pub async fn generate<S>(
        &mut self,
        store: &S,
        class: InstrumentClass,
    ) -> Result<String, LedgerError>
    where
        S: LedgerStore + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.candidate(class);
            if !store.number_in_use(class, &candidate).await? {
                return Ok(candidate);
            }
            debug!(%class, attempt, "generated number already in use");
        }

        Err(LedgerError::IdentifierExhausted {
            class: class.to_string(),
            attempts: self.max_attempts,
        })
    }
}
