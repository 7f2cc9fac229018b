//! Ticket identifier generation.
//!
//! Identifiers are human-presentable and scoped to an event:
//! `EVENT-<eventId>-T-<8 random chars of A-Z0-9>`. The generator performs no
//! collision checking - uniqueness is a probabilistic property of the suffix
//! space, and duplicate registrations surface as a ledger rejection handled
//! by the lifecycle service.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

use crate::types::{EventId, TicketId};

/// Length of the random suffix.
pub const SUFFIX_LENGTH: usize = 8;

/// Characters the suffix is drawn from (36^8 ≈ 2.8e12 combinations).
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates event-scoped ticket identifiers from an injectable RNG.
///
/// Production instances seed from OS entropy; tests seed explicitly for
/// exact-identifier assertions.
#[derive(Debug)]
pub struct TicketIdGenerator {
    rng: Mutex<StdRng>,
}

impl TicketIdGenerator {
    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a generator with a fixed seed, yielding a deterministic
    /// identifier sequence.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Produces one identifier for `event_id`. No side effects beyond
    /// advancing the RNG.
    #[must_use]
    pub fn generate(&self, event_id: EventId) -> TicketId {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let suffix: String = (0..SUFFIX_LENGTH)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        TicketId::new(format!("EVENT-{event_id}-T-{suffix}"))
    }
}

impl Default for TicketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
