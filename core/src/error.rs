//! Error taxonomy for the ticket registry services.
//!
//! Validation and domain-state conflicts are typed values resolved at the
//! orchestration layer; ledger errors carry their own retry semantics (see
//! [`crate::ledger::LedgerError`]). Nothing in this module ever captures the
//! commitment secret or a signing key.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::types::TicketId;

/// Errors surfaced by the verification and lifecycle services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Malformed input, rejected before any external call. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The identifier is absent from the metadata cache where a record was
    /// expected. Distinct from ledger invalidity.
    #[error("ticket {0} not found in metadata store")]
    NotFound(TicketId),

    /// The ticket's ledger record is already marked used.
    #[error("ticket {0} has already been used")]
    AlreadyUsed(TicketId),

    /// The ledger holds no valid record for the ticket's commitment.
    #[error("ticket {0} is not valid on the ledger")]
    NotValid(TicketId),

    /// A ledger failure that is not a domain-state conflict: transient
    /// unavailability (after bounded read retries) or an unclassified
    /// rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl TicketError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the error is a caller mistake rather than a system fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::AlreadyUsed(_)
                | Self::NotValid(_)
                | Self::Ledger(LedgerError::Rejected(_) | LedgerError::InvalidRequest(_))
        )
    }
}
