//! Ticket verification: merging ledger truth with cached metadata.
//!
//! The ledger answers "is this commitment genuine and unused"; the cache
//! contributes display data. The merge resolves every disagreement case:
//! ledger-invalid always wins (Unregistered), a missing cache entry degrades
//! the payload but never the verdict (GenuineButUncatalogued), and event
//! enrichment is best-effort.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commitment::CommitmentHasher;
use crate::error::TicketError;
use crate::ledger::LedgerClient;
use crate::retry::{RetryPolicy, retry_read};
use crate::store::MetadataStore;
use crate::types::{
    CommitmentHash, EventDetails, LedgerRecord, ProgramAttestation, TicketId, TicketMetadata,
};

/// Classification of a verified ticket.
///
/// Terminal for a given identifier except `Valid` → `Used`, a one-way
/// transition driven by the lifecycle service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No record exists on the ledger for this identifier's commitment.
    Unregistered,
    /// The ledger proves genuineness but the local cache has no metadata -
    /// a recoverable anomaly, reported with a degraded payload.
    GenuineButUncatalogued,
    /// Genuine and not yet used.
    Valid,
    /// Genuine and already consumed.
    Used,
}

impl VerificationStatus {
    /// Whether the ledger holds a record for the commitment (invariant I1).
    #[must_use]
    pub const fn is_genuine(self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// Whether the ticket can still be admitted (invariant I2).
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Valid | Self::GenuineButUncatalogued)
    }
}

/// The merged verdict for one identifier.
#[derive(Clone, Debug, Serialize)]
pub struct Verification {
    /// The identifier that was presented.
    pub ticket_id: TicketId,
    /// Its derived commitment.
    pub commitment: CommitmentHash,
    /// Final classification.
    pub status: VerificationStatus,
    /// Raw ledger record (zeroed when unregistered).
    pub record: LedgerRecord,
    /// Cached metadata, when present.
    pub metadata: Option<TicketMetadata>,
    /// Event details, when the enrichment read succeeded.
    pub event: Option<EventDetails>,
}

/// Raw on-chain evidence for one identifier, for audit display.
#[derive(Clone, Debug, Serialize)]
pub struct LedgerProof {
    /// The identifier the proof was requested for.
    pub ticket_id: TicketId,
    /// Its derived commitment - the value actually stored on the ledger.
    pub commitment: CommitmentHash,
    /// Raw ledger record for the commitment.
    pub record: LedgerRecord,
    /// Program existence attestation and block height.
    pub attestation: ProgramAttestation,
    /// Whether the record carries a real registration timestamp.
    pub registered_on_chain: bool,
}

/// Merges a ledger read and a cache read into one verification verdict.
pub struct VerificationService {
    hasher: Arc<CommitmentHasher>,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<MetadataStore>,
    retry: RetryPolicy,
}

impl VerificationService {
    /// Creates a service with the default read-retry policy.
    #[must_use]
    pub fn new(
        hasher: Arc<CommitmentHasher>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<MetadataStore>,
    ) -> Self {
        Self {
            hasher,
            ledger,
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the read-retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Verifies one identifier.
    ///
    /// The ledger read and the cache read run concurrently; classification
    /// follows the merge rules above. A failed event-details fetch is
    /// reported as missing enrichment, never as a verification failure.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for an empty identifier;
    /// [`TicketError::Ledger`] when the ledger read keeps failing after
    /// bounded retries.
    pub async fn verify(&self, ticket_id: &TicketId) -> Result<Verification, TicketError> {
        if ticket_id.is_empty() {
            return Err(TicketError::validation("ticket identifier is required"));
        }

        let commitment = self.hasher.commit(ticket_id);
        let (record, metadata) = tokio::join!(
            retry_read(&self.retry, || self.ledger.read_by_commitment(&commitment)),
            async { self.store.get(ticket_id) },
        );
        let record = record?;

        let status = if !record.is_valid {
            VerificationStatus::Unregistered
        } else if metadata.is_none() {
            tracing::warn!(
                ticket_id = %ticket_id,
                "ledger record exists but metadata cache has no entry"
            );
            VerificationStatus::GenuineButUncatalogued
        } else if record.used {
            VerificationStatus::Used
        } else {
            VerificationStatus::Valid
        };

        let event = if record.is_valid {
            self.fetch_event_details(&record).await
        } else {
            None
        };

        tracing::debug!(ticket_id = %ticket_id, status = ?status, "ticket verified");
        Ok(Verification {
            ticket_id: ticket_id.clone(),
            commitment,
            status,
            record,
            metadata,
            event,
        })
    }

    /// Assembles the raw on-chain proof payload for one identifier.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for an empty identifier;
    /// [`TicketError::Ledger`] when either ledger read keeps failing after
    /// bounded retries.
    pub async fn ledger_proof(&self, ticket_id: &TicketId) -> Result<LedgerProof, TicketError> {
        if ticket_id.is_empty() {
            return Err(TicketError::validation("ticket identifier is required"));
        }

        let commitment = self.hasher.commit(ticket_id);
        let (record, attestation) = tokio::join!(
            retry_read(&self.retry, || self.ledger.read_by_commitment(&commitment)),
            retry_read(&self.retry, || self.ledger.attestation()),
        );
        let record = record?;
        let attestation = attestation?;

        Ok(LedgerProof {
            ticket_id: ticket_id.clone(),
            commitment,
            registered_on_chain: record.registered_on_chain(),
            record,
            attestation,
        })
    }

    async fn fetch_event_details(&self, record: &LedgerRecord) -> Option<EventDetails> {
        match self.ledger.get_event(record.event_id).await {
            Ok(details) => Some(details),
            Err(err) => {
                tracing::warn!(
                    event_id = %record.event_id,
                    error = %err,
                    "event enrichment failed; verification verdict unaffected"
                );
                None
            }
        }
    }
}
