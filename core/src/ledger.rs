//! The authoritative ledger boundary.
//!
//! [`LedgerClient`] abstracts the external registry program: batch
//! registration, commitment reads, use-marking, ownership transfer, and
//! aggregate reads. Every write is submit-then-await-finality at the ledger
//! level; implementations return once the transaction is final.
//!
//! [`InMemoryLedger`] is a complete reference implementation with the same
//! observable semantics as the deployed program - atomic batches, duplicate
//! rejection, a permanent `used` flag, owner-credential transfer checks -
//! used by tests and local development. The production JSON-RPC adapter
//! lives in the `ticket-registry-ledger` crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::types::{
    CommitmentHash, EventDetails, EventId, LedgerRecord, LedgerStats, OwnerAddress,
    ProgramAttestation, TxHash,
};

/// Maximum number of commitments one registration transaction accepts.
pub const MAX_BATCH_SIZE: usize = 100;

// ============================================================================
// Errors
// ============================================================================

/// The ledger's business-rule verdict on a rejected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// No record exists for the commitment.
    UnknownCommitment,
    /// A commitment in the batch is already registered.
    DuplicateCommitment,
    /// The record's `used` flag is already set.
    AlreadyUsed,
    /// The presented credential is not the recorded owner.
    NotTicketOwner,
    /// The event does not exist.
    UnknownEvent,
    /// The event no longer accepts registrations.
    EventInactive,
    /// A rejection this client does not classify further.
    Other(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommitment => f.write_str("unknown commitment"),
            Self::DuplicateCommitment => f.write_str("duplicate commitment"),
            Self::AlreadyUsed => f.write_str("ticket already used"),
            Self::NotTicketOwner => f.write_str("caller is not the ticket owner"),
            Self::UnknownEvent => f.write_str("unknown event"),
            Self::EventInactive => f.write_str("event is not active"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Failures at the ledger boundary.
///
/// `Transient` is eligible for bounded retry on reads; writes must reconcile
/// by re-reading before any retry (a blind resubmit could double-apply).
/// `Rejected` is the ledger's authoritative verdict and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Client-side precondition failure; nothing was sent to the ledger.
    #[error("invalid ledger request: {0}")]
    InvalidRequest(String),

    /// Network, timeout, or RPC transport failure.
    #[error("ledger temporarily unavailable: {0}")]
    Transient(String),

    /// The ledger evaluated the operation and refused it.
    #[error("ledger rejected the operation: {0}")]
    Rejected(RejectionReason),
}

impl LedgerError {
    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

// ============================================================================
// Signing credentials
// ============================================================================

/// A ledger signing credential.
///
/// Treated as a capability token: `Debug` is redacted and the raw material is
/// only reachable through [`SigningKey::reveal`], which exists for the RPC
/// adapter that must present it to the signing node.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    /// Wraps raw key material.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The address this credential authenticates as, derived one-way from
    /// the key material (first 20 bytes of its SHA-256, hex encoded).
    #[must_use]
    pub fn address(&self) -> OwnerAddress {
        let digest = Sha256::digest(self.0.as_bytes());
        OwnerAddress::new(format!("0x{}", hex::encode(&digest[..20])))
    }

    /// Exposes the raw key material. Callers must never log or serialize the
    /// returned value.
    #[must_use]
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

// ============================================================================
// Client trait
// ============================================================================

/// Validates batch-registration arguments before anything leaves the process.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidRequest`] on an empty batch, a
/// commitments/owners length mismatch, or a batch larger than
/// [`MAX_BATCH_SIZE`].
pub fn check_batch(
    commitments: &[CommitmentHash],
    owners: &[OwnerAddress],
) -> Result<(), LedgerError> {
    if commitments.is_empty() {
        return Err(LedgerError::InvalidRequest("empty batch".to_string()));
    }
    if commitments.len() != owners.len() {
        return Err(LedgerError::InvalidRequest(format!(
            "{} commitments but {} owners",
            commitments.len(),
            owners.len()
        )));
    }
    if commitments.len() > MAX_BATCH_SIZE {
        return Err(LedgerError::InvalidRequest(format!(
            "batch of {} exceeds the {MAX_BATCH_SIZE}-commitment limit",
            commitments.len()
        )));
    }
    Ok(())
}

/// Abstraction over the authoritative external ledger.
///
/// Reads may be served from a non-finalized view; callers tolerate eventual
/// consistency with recent writes. Writes return only after finality and a
/// returned error means the mutation did not happen - with the one caveat
/// that a `Transient` write failure is ambiguous and must be reconciled by
/// re-reading, never blindly resubmitted.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Registers a batch of commitments atomically: afterwards either every
    /// entry is present on the ledger or none is.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for precondition failures (checked before any ledger
    /// call), `Rejected` for the ledger's verdict (duplicate commitment,
    /// unknown or inactive event), `Transient` for transport failures.
    async fn register_batch(
        &self,
        commitments: &[CommitmentHash],
        owners: &[OwnerAddress],
        event_id: EventId,
    ) -> Result<TxHash, LedgerError>;

    /// Reads the record for a commitment. An unknown commitment yields the
    /// zeroed record with `is_valid == false`, not an error.
    ///
    /// # Errors
    ///
    /// `Transient` for transport failures.
    async fn read_by_commitment(
        &self,
        commitment: &CommitmentHash,
    ) -> Result<LedgerRecord, LedgerError>;

    /// Flips a record's `used` flag false→true. The ledger is the
    /// serialization point: its rejection is authoritative even when a
    /// preceding read looked clean.
    ///
    /// # Errors
    ///
    /// `Rejected` with `AlreadyUsed` or `UnknownCommitment`, `Transient` for
    /// transport failures.
    async fn mark_used(&self, commitment: &CommitmentHash) -> Result<TxHash, LedgerError>;

    /// Transfers a record to `new_owner`, authenticated by the **current
    /// owner's** credential. The system never signs this with its own key.
    ///
    /// # Errors
    ///
    /// `Rejected` with `NotTicketOwner` or `UnknownCommitment`, `Transient`
    /// for transport failures.
    async fn transfer_owner(
        &self,
        commitment: &CommitmentHash,
        new_owner: &OwnerAddress,
        signer: &SigningKey,
    ) -> Result<TxHash, LedgerError>;

    /// Reads descriptive event fields.
    ///
    /// # Errors
    ///
    /// `Rejected` with `UnknownEvent`, `Transient` for transport failures.
    async fn get_event(&self, event_id: EventId) -> Result<EventDetails, LedgerError>;

    /// Reads the program's aggregate counters.
    ///
    /// # Errors
    ///
    /// `Transient` for transport failures.
    async fn get_stats(&self) -> Result<LedgerStats, LedgerError>;

    /// Creates an event and returns its ledger-assigned identifier.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for empty fields, `Transient` for transport
    /// failures.
    async fn create_event(
        &self,
        name: &str,
        date: u64,
        location: &str,
    ) -> Result<(EventId, TxHash), LedgerError>;

    /// Attests that the registry program exists, for proof display.
    ///
    /// # Errors
    ///
    /// `Transient` for transport failures.
    async fn attestation(&self) -> Result<ProgramAttestation, LedgerError>;
}

// ============================================================================
// In-memory reference ledger
// ============================================================================

/// Synthetic code length reported by the in-memory program attestation.
const SYNTHETIC_CODE_LENGTH: u64 = 4214;

#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<CommitmentHash, LedgerRecord>,
    events: HashMap<EventId, EventDetails>,
    next_event_id: u64,
    total_tickets: u64,
    block_height: u64,
}

/// In-memory ledger with the deployed program's observable semantics.
#[derive(Debug)]
pub struct InMemoryLedger {
    program_address: String,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Creates an empty ledger reporting `program_address` in attestations.
    #[must_use]
    pub fn new(program_address: impl Into<String>) -> Self {
        Self {
            program_address: program_address.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_tx(state: &mut LedgerState, op: &str) -> TxHash {
        state.block_height += 1;
        let digest = Sha256::digest(format!("{op}:{}", state.block_height).as_bytes());
        TxHash::new(format!("0x{}", hex::encode(digest)))
    }

    fn now_unix() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new("0x5265676973747279446576000000000000000000")
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn register_batch(
        &self,
        commitments: &[CommitmentHash],
        owners: &[OwnerAddress],
        event_id: EventId,
    ) -> Result<TxHash, LedgerError> {
        check_batch(commitments, owners)?;
        let mut state = self.lock();
        let event = state
            .events
            .get(&event_id)
            .ok_or(LedgerError::Rejected(RejectionReason::UnknownEvent))?;
        if !event.active {
            return Err(LedgerError::Rejected(RejectionReason::EventInactive));
        }
        // All-or-nothing: reject the whole batch before touching any record.
        if commitments.iter().any(|c| state.records.contains_key(c)) {
            return Err(LedgerError::Rejected(RejectionReason::DuplicateCommitment));
        }
        let registered_at = Self::now_unix();
        for (commitment, owner) in commitments.iter().zip(owners) {
            state.records.insert(
                *commitment,
                LedgerRecord {
                    owner: owner.clone(),
                    used: false,
                    event_id,
                    registered_at,
                    is_valid: true,
                },
            );
        }
        state.total_tickets += commitments.len() as u64;
        Ok(Self::next_tx(&mut state, "registerBatch"))
    }

    async fn read_by_commitment(
        &self,
        commitment: &CommitmentHash,
    ) -> Result<LedgerRecord, LedgerError> {
        let state = self.lock();
        Ok(state
            .records
            .get(commitment)
            .cloned()
            .unwrap_or_else(LedgerRecord::absent))
    }

    async fn mark_used(&self, commitment: &CommitmentHash) -> Result<TxHash, LedgerError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(commitment)
            .ok_or(LedgerError::Rejected(RejectionReason::UnknownCommitment))?;
        if record.used {
            return Err(LedgerError::Rejected(RejectionReason::AlreadyUsed));
        }
        record.used = true;
        Ok(Self::next_tx(&mut state, "markUsed"))
    }

    async fn transfer_owner(
        &self,
        commitment: &CommitmentHash,
        new_owner: &OwnerAddress,
        signer: &SigningKey,
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(commitment)
            .ok_or(LedgerError::Rejected(RejectionReason::UnknownCommitment))?;
        if signer.address() != record.owner {
            return Err(LedgerError::Rejected(RejectionReason::NotTicketOwner));
        }
        record.owner = new_owner.clone();
        Ok(Self::next_tx(&mut state, "transferTicket"))
    }

    async fn get_event(&self, event_id: EventId) -> Result<EventDetails, LedgerError> {
        let state = self.lock();
        state
            .events
            .get(&event_id)
            .cloned()
            .ok_or(LedgerError::Rejected(RejectionReason::UnknownEvent))
    }

    async fn get_stats(&self) -> Result<LedgerStats, LedgerError> {
        let state = self.lock();
        Ok(LedgerStats {
            total_events: state.next_event_id,
            total_tickets: state.total_tickets,
        })
    }

    async fn create_event(
        &self,
        name: &str,
        date: u64,
        location: &str,
    ) -> Result<(EventId, TxHash), LedgerError> {
        if name.is_empty() || location.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "event name and location are required".to_string(),
            ));
        }
        let mut state = self.lock();
        state.next_event_id += 1;
        let event_id = EventId::new(state.next_event_id);
        state.events.insert(
            event_id,
            EventDetails {
                name: name.to_string(),
                date,
                location: location.to_string(),
                active: true,
            },
        );
        let tx = Self::next_tx(&mut state, "createEvent");
        Ok((event_id, tx))
    }

    async fn attestation(&self) -> Result<ProgramAttestation, LedgerError> {
        let state = self.lock();
        Ok(ProgramAttestation {
            program_address: self.program_address.clone(),
            code_exists: true,
            code_length: SYNTHETIC_CODE_LENGTH,
            block_height: state.block_height,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ZERO_ADDRESS;

    fn commitment(byte: u8) -> CommitmentHash {
        CommitmentHash::from_bytes([byte; 32])
    }

    async fn ledger_with_event() -> (InMemoryLedger, EventId) {
        let ledger = InMemoryLedger::default();
        let (event_id, _) = ledger
            .create_event("Test Concert", 1_900_000_000, "Jakarta")
            .await
            .unwrap();
        (ledger, event_id)
    }

    #[tokio::test]
    async fn event_ids_are_one_based_and_sequential() {
        let ledger = InMemoryLedger::default();
        let (first, _) = ledger.create_event("A", 1, "x").await.unwrap();
        let (second, _) = ledger.create_event("B", 2, "y").await.unwrap();
        assert_eq!(first, EventId::new(1));
        assert_eq!(second, EventId::new(2));
    }

    #[tokio::test]
    async fn registered_commitment_reads_back_valid() {
        let (ledger, event_id) = ledger_with_event().await;
        ledger
            .register_batch(&[commitment(1)], &[OwnerAddress::zero()], event_id)
            .await
            .unwrap();

        let record = ledger.read_by_commitment(&commitment(1)).await.unwrap();
        assert!(record.is_valid);
        assert!(!record.used);
        assert_eq!(record.event_id, event_id);
        assert_eq!(record.owner.as_str(), ZERO_ADDRESS);
        assert!(record.registered_on_chain());
    }

    #[tokio::test]
    async fn unknown_commitment_reads_back_absent() {
        let ledger = InMemoryLedger::default();
        let record = ledger.read_by_commitment(&commitment(9)).await.unwrap();
        assert_eq!(record, LedgerRecord::absent());
    }

    #[tokio::test]
    async fn batch_precondition_failures_are_invalid_requests() {
        let (ledger, event_id) = ledger_with_event().await;

        let err = ledger
            .register_batch(&[], &[], event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));

        let err = ledger
            .register_batch(&[commitment(1)], &[], event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));

        let commitments: Vec<_> = (0..=MAX_BATCH_SIZE)
            .map(|i| CommitmentHash::from_bytes([u8::try_from(i % 251).unwrap(); 32]))
            .collect();
        let owners = vec![OwnerAddress::zero(); commitments.len()];
        let err = ledger
            .register_batch(&commitments, &owners, event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn duplicate_commitment_rejects_whole_batch() {
        let (ledger, event_id) = ledger_with_event().await;
        ledger
            .register_batch(&[commitment(1)], &[OwnerAddress::zero()], event_id)
            .await
            .unwrap();

        let err = ledger
            .register_batch(
                &[commitment(2), commitment(1)],
                &[OwnerAddress::zero(), OwnerAddress::zero()],
                event_id,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Rejected(RejectionReason::DuplicateCommitment)
        );

        // Atomicity: the fresh commitment must not have been registered.
        let record = ledger.read_by_commitment(&commitment(2)).await.unwrap();
        assert!(!record.is_valid);
    }

    #[tokio::test]
    async fn registering_against_unknown_event_is_rejected() {
        let ledger = InMemoryLedger::default();
        let err = ledger
            .register_batch(&[commitment(1)], &[OwnerAddress::zero()], EventId::new(5))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Rejected(RejectionReason::UnknownEvent));
    }

    #[tokio::test]
    async fn mark_used_is_permanent_and_single_shot() {
        let (ledger, event_id) = ledger_with_event().await;
        ledger
            .register_batch(&[commitment(1)], &[OwnerAddress::zero()], event_id)
            .await
            .unwrap();

        ledger.mark_used(&commitment(1)).await.unwrap();
        let record = ledger.read_by_commitment(&commitment(1)).await.unwrap();
        assert!(record.used);

        let err = ledger.mark_used(&commitment(1)).await.unwrap_err();
        assert_eq!(err, LedgerError::Rejected(RejectionReason::AlreadyUsed));
        let record = ledger.read_by_commitment(&commitment(1)).await.unwrap();
        assert!(record.used);
    }

    #[tokio::test]
    async fn transfer_requires_the_recorded_owner_credential() {
        let (ledger, event_id) = ledger_with_event().await;
        let owner_key = SigningKey::new("owner-key");
        let thief_key = SigningKey::new("thief-key");
        ledger
            .register_batch(&[commitment(1)], &[owner_key.address()], event_id)
            .await
            .unwrap();

        let err = ledger
            .transfer_owner(&commitment(1), &OwnerAddress::new("0xdead"), &thief_key)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Rejected(RejectionReason::NotTicketOwner));

        ledger
            .transfer_owner(&commitment(1), &OwnerAddress::new("0xdead"), &owner_key)
            .await
            .unwrap();
        let record = ledger.read_by_commitment(&commitment(1)).await.unwrap();
        assert_eq!(record.owner, OwnerAddress::new("0xdead"));
    }

    #[tokio::test]
    async fn stats_track_events_and_tickets() {
        let (ledger, event_id) = ledger_with_event().await;
        ledger
            .register_batch(
                &[commitment(1), commitment(2)],
                &[OwnerAddress::zero(), OwnerAddress::zero()],
                event_id,
            )
            .await
            .unwrap();

        let stats = ledger.get_stats().await.unwrap();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.total_tickets, 2);
    }

    #[tokio::test]
    async fn attestation_reports_program_and_height() {
        let (ledger, event_id) = ledger_with_event().await;
        let before = ledger.attestation().await.unwrap();
        ledger
            .register_batch(&[commitment(1)], &[OwnerAddress::zero()], event_id)
            .await
            .unwrap();
        let after = ledger.attestation().await.unwrap();

        assert!(after.code_exists);
        assert!(after.code_length > 0);
        assert!(after.block_height > before.block_height);
    }

    #[test]
    fn signing_key_debug_is_redacted_and_address_is_stable() {
        let key = SigningKey::new("very-secret-key");
        assert!(!format!("{key:?}").contains("very-secret-key"));
        assert_eq!(key.address(), SigningKey::new("very-secret-key").address());
        assert_ne!(key.address(), SigningKey::new("other-key").address());
        assert_eq!(key.address().as_str().len(), 42);
    }
}
