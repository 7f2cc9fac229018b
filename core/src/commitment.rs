//! Secret-bound ticket commitments.
//!
//! A commitment is `SHA-256(identifier bytes ‖ secret bytes)`: deterministic
//! for a fixed secret, so a presented identifier can always be re-hashed and
//! looked up on the ledger, and one-directional, so the ledger learns nothing
//! about identifiers it has not been shown.
//!
//! The secret is a capability equivalent to a signing key: anyone holding it
//! can forge valid-looking commitments offline. It is threaded in as explicit
//! configuration, lives in memory for the process lifetime, and never appears
//! in logs, errors, or serialized output.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::{CommitmentHash, TicketId};

/// The process-wide commitment secret.
///
/// `Debug` is redacted; there is intentionally no `Display`.
#[derive(Clone)]
pub struct CommitmentSecret(Vec<u8>);

impl CommitmentSecret {
    /// Wraps the configured secret bytes.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CommitmentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommitmentSecret(..)")
    }
}

/// Derives commitments from identifiers under a fixed secret.
#[derive(Clone, Debug)]
pub struct CommitmentHasher {
    secret: CommitmentSecret,
}

impl CommitmentHasher {
    /// Creates a hasher bound to `secret`.
    #[must_use]
    pub const fn new(secret: CommitmentSecret) -> Self {
        Self { secret }
    }

    /// Computes the commitment for `ticket_id`.
    ///
    /// Deterministic: the same identifier and secret always yield the same
    /// digest, which is required because the ledger stores nothing but the
    /// commitment.
    #[must_use]
    pub fn commit(&self, ticket_id: &TicketId) -> CommitmentHash {
        let mut hasher = Sha256::new();
        hasher.update(ticket_id.as_str().as_bytes());
        hasher.update(self.secret.as_bytes());
        CommitmentHash::from_bytes(hasher.finalize().into())
    }
}
