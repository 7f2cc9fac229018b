//! Ticket lifecycle orchestration: issuance, use-marking, transfer.
//!
//! Issuance is one conceptual transaction: compute every identifier and
//! commitment first, make a single batch ledger call, and only after its
//! confirmed success write the cache - so concurrent readers never observe a
//! partially issued batch, and a failed registration leaves nothing behind.

use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::commitment::CommitmentHasher;
use crate::error::TicketError;
use crate::identifier::TicketIdGenerator;
use crate::ledger::{LedgerClient, LedgerError, MAX_BATCH_SIZE, RejectionReason, SigningKey};
use crate::retry::{RetryPolicy, retry_read};
use crate::store::MetadataStore;
use crate::types::{EventId, OwnerAddress, TicketId, TicketMetadata, TxHash};

/// Attempts at regenerating a batch whose commitments collided on the ledger.
/// Collisions are astronomically unlikely; this bound exists so a misbehaving
/// ledger cannot loop the service forever.
const DUPLICATE_REGENERATION_ATTEMPTS: usize = 3;

/// One ticket from a successful issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuedTicket {
    /// The identifier handed to the caller. The only copy - the ledger knows
    /// just the commitment.
    pub ticket_id: TicketId,
    /// Event the ticket admits to.
    pub event_id: EventId,
}

/// Result of a successful batch issuance.
#[derive(Clone, Debug, Serialize)]
pub struct IssuedBatch {
    /// Every issued ticket, in generation order.
    pub tickets: Vec<IssuedTicket>,
    /// The registration transaction, for audit display.
    pub tx_hash: TxHash,
}

/// Drives generation → commitment → batch registration → cache write, and
/// the use/transfer transitions against the ledger.
pub struct TicketLifecycleService {
    generator: TicketIdGenerator,
    hasher: Arc<CommitmentHasher>,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<MetadataStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl TicketLifecycleService {
    /// Creates a service with the default read-retry policy.
    #[must_use]
    pub fn new(
        generator: TicketIdGenerator,
        hasher: Arc<CommitmentHasher>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<MetadataStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            generator,
            hasher,
            ledger,
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the read-retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issues `quantity` tickets for `event_id` in one atomic batch.
    ///
    /// Tickets are bearer instruments (zero-address owner) unless `owner` is
    /// given. The batch is all-or-nothing: any registration failure means no
    /// cache records are written and no identifiers are returned as issued.
    /// A duplicate-commitment rejection regenerates the whole batch with
    /// fresh identifiers, a small bounded number of times.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] when `quantity` is outside `1..=100`
    /// (zero ledger calls, zero cache writes); [`TicketError::Ledger`] when
    /// registration fails.
    pub async fn issue_batch(
        &self,
        event_id: EventId,
        quantity: u32,
        owner: Option<OwnerAddress>,
    ) -> Result<IssuedBatch, TicketError> {
        let quantity = quantity as usize;
        if quantity == 0 || quantity > MAX_BATCH_SIZE {
            return Err(TicketError::validation(format!(
                "quantity must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        let owner = owner.unwrap_or_else(OwnerAddress::zero);

        let mut attempt = 0;
        loop {
            let ticket_ids: Vec<TicketId> = (0..quantity)
                .map(|_| self.generator.generate(event_id))
                .collect();
            let commitments: Vec<_> =
                ticket_ids.iter().map(|id| self.hasher.commit(id)).collect();
            let owners = vec![owner.clone(); quantity];

            match self
                .ledger
                .register_batch(&commitments, &owners, event_id)
                .await
            {
                Ok(tx_hash) => {
                    let created_at = self.clock.now();
                    let metadata: Vec<_> = ticket_ids
                        .iter()
                        .zip(&commitments)
                        .map(|(ticket_id, commitment)| TicketMetadata {
                            ticket_id: ticket_id.clone(),
                            commitment: *commitment,
                            event_id,
                            owner: owner.clone(),
                            created_at,
                        })
                        .collect();
                    self.store.put_all(metadata);

                    tracing::info!(
                        event_id = %event_id,
                        quantity,
                        tx_hash = %tx_hash,
                        "ticket batch registered"
                    );
                    let tickets = ticket_ids
                        .into_iter()
                        .map(|ticket_id| IssuedTicket {
                            ticket_id,
                            event_id,
                        })
                        .collect();
                    return Ok(IssuedBatch { tickets, tx_hash });
                }
                Err(LedgerError::Rejected(RejectionReason::DuplicateCommitment))
                    if attempt + 1 < DUPLICATE_REGENERATION_ATTEMPTS =>
                {
                    attempt += 1;
                    tracing::warn!(
                        event_id = %event_id,
                        attempt,
                        "commitment collision on the ledger; regenerating batch"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Transitions a ticket to used, exactly once.
    ///
    /// A fresh ledger read screens out already-used and invalid tickets
    /// without a write, but it is only advisory: the ledger's own rejection
    /// of the write is authoritative, so a concurrent racer that loses gets
    /// [`TicketError::AlreadyUsed`] rather than a crash.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for an empty identifier,
    /// [`TicketError::NotValid`] when the ledger holds no record,
    /// [`TicketError::AlreadyUsed`] when the flag is already set (screened
    /// or raced), [`TicketError::Ledger`] for transport failures.
    pub async fn mark_as_used(&self, ticket_id: &TicketId) -> Result<TxHash, TicketError> {
        if ticket_id.is_empty() {
            return Err(TicketError::validation("ticket identifier is required"));
        }
        let commitment = self.hasher.commit(ticket_id);

        let record =
            retry_read(&self.retry, || self.ledger.read_by_commitment(&commitment)).await?;
        if !record.is_valid {
            return Err(TicketError::NotValid(ticket_id.clone()));
        }
        if record.used {
            return Err(TicketError::AlreadyUsed(ticket_id.clone()));
        }

        match self.ledger.mark_used(&commitment).await {
            Ok(tx_hash) => {
                tracing::info!(ticket_id = %ticket_id, tx_hash = %tx_hash, "ticket marked used");
                Ok(tx_hash)
            }
            Err(LedgerError::Rejected(RejectionReason::AlreadyUsed)) => {
                Err(TicketError::AlreadyUsed(ticket_id.clone()))
            }
            Err(LedgerError::Rejected(RejectionReason::UnknownCommitment)) => {
                Err(TicketError::NotValid(ticket_id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Transfers ownership under the current owner's credential.
    ///
    /// The ledger is the source of truth for ownership; the cache's display
    /// owner is updated best-effort afterwards, and a missing cache entry is
    /// logged rather than failing an otherwise successful transfer.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for an empty identifier or a zero-address
    /// destination; [`TicketError::Ledger`] when the ledger rejects the
    /// credential (`NotTicketOwner`) or the transport fails.
    pub async fn transfer(
        &self,
        ticket_id: &TicketId,
        new_owner: OwnerAddress,
        credential: &SigningKey,
    ) -> Result<TxHash, TicketError> {
        if ticket_id.is_empty() {
            return Err(TicketError::validation("ticket identifier is required"));
        }
        if new_owner.is_zero() {
            return Err(TicketError::validation(
                "cannot transfer to the zero address",
            ));
        }
        let commitment = self.hasher.commit(ticket_id);

        let tx_hash = self
            .ledger
            .transfer_owner(&commitment, &new_owner, credential)
            .await?;

        if self.store.update_owner(ticket_id, &new_owner) {
            tracing::info!(
                ticket_id = %ticket_id,
                new_owner = %new_owner,
                tx_hash = %tx_hash,
                "ticket transferred"
            );
        } else {
            tracing::warn!(
                ticket_id = %ticket_id,
                "transfer finalized on the ledger but no cache entry to update; \
                 display owner lags"
            );
        }
        Ok(tx_hash)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::commitment::CommitmentSecret;
    use crate::ledger::InMemoryLedger;
    use crate::types::{
        CommitmentHash, EventDetails, LedgerRecord, LedgerStats, ProgramAttestation,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        store: Arc<MetadataStore>,
        service: TicketLifecycleService,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::default());
        let hasher = Arc::new(CommitmentHasher::new(CommitmentSecret::new(
            b"test-secret".to_vec(),
        )));
        let store = Arc::new(MetadataStore::new());
        let service = TicketLifecycleService::new(
            TicketIdGenerator::with_seed(7),
            hasher,
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            Arc::clone(&store),
            Arc::new(FixedClock::new(Utc::now())),
        )
        .with_retry_policy(RetryPolicy::none());
        Fixture {
            ledger,
            store,
            service,
        }
    }

    async fn event(fixture: &Fixture) -> EventId {
        let (event_id, _) = fixture
            .ledger
            .create_event("Concert", 1_900_000_000, "Jakarta")
            .await
            .unwrap();
        event_id
    }

    #[tokio::test]
    async fn issued_tickets_are_cached_and_registered() {
        let fx = fixture();
        let event_id = event(&fx).await;

        let batch = fx.service.issue_batch(event_id, 3, None).await.unwrap();
        assert_eq!(batch.tickets.len(), 3);
        assert_eq!(fx.store.len(), 3);
        for ticket in &batch.tickets {
            assert!(ticket.ticket_id.is_well_formed());
            let metadata = fx.store.get(&ticket.ticket_id).unwrap();
            assert_eq!(metadata.event_id, event_id);
            assert!(metadata.owner.is_zero());
            let record = fx
                .ledger
                .read_by_commitment(&metadata.commitment)
                .await
                .unwrap();
            assert!(record.is_valid);
        }
    }

    #[tokio::test]
    async fn quantity_bounds_are_validated_before_any_ledger_call() {
        struct CountingLedger {
            inner: InMemoryLedger,
            register_calls: AtomicUsize,
        }

        #[async_trait]
        impl LedgerClient for CountingLedger {
            async fn register_batch(
                &self,
                commitments: &[CommitmentHash],
                owners: &[OwnerAddress],
                event_id: EventId,
            ) -> Result<TxHash, LedgerError> {
                self.register_calls.fetch_add(1, Ordering::SeqCst);
                self.inner.register_batch(commitments, owners, event_id).await
            }
            async fn read_by_commitment(
                &self,
                commitment: &CommitmentHash,
            ) -> Result<LedgerRecord, LedgerError> {
                self.inner.read_by_commitment(commitment).await
            }
            async fn mark_used(
                &self,
                commitment: &CommitmentHash,
            ) -> Result<TxHash, LedgerError> {
                self.inner.mark_used(commitment).await
            }
            async fn transfer_owner(
                &self,
                commitment: &CommitmentHash,
                new_owner: &OwnerAddress,
                signer: &SigningKey,
            ) -> Result<TxHash, LedgerError> {
                self.inner.transfer_owner(commitment, new_owner, signer).await
            }
            async fn get_event(&self, event_id: EventId) -> Result<EventDetails, LedgerError> {
                self.inner.get_event(event_id).await
            }
            async fn get_stats(&self) -> Result<LedgerStats, LedgerError> {
                self.inner.get_stats().await
            }
            async fn create_event(
                &self,
                name: &str,
                date: u64,
                location: &str,
            ) -> Result<(EventId, TxHash), LedgerError> {
                self.inner.create_event(name, date, location).await
            }
            async fn attestation(&self) -> Result<ProgramAttestation, LedgerError> {
                self.inner.attestation().await
            }
        }

        let counting = Arc::new(CountingLedger {
            inner: InMemoryLedger::default(),
            register_calls: AtomicUsize::new(0),
        });
        let (event_id, _) = counting
            .inner
            .create_event("Concert", 1, "x")
            .await
            .unwrap();
        let hasher = Arc::new(CommitmentHasher::new(CommitmentSecret::new(b"s".to_vec())));
        let store = Arc::new(MetadataStore::new());
        let service = TicketLifecycleService::new(
            TicketIdGenerator::with_seed(1),
            hasher,
            Arc::clone(&counting) as Arc<dyn LedgerClient>,
            Arc::clone(&store),
            Arc::new(FixedClock::new(Utc::now())),
        );

        for quantity in [0, 101] {
            let err = service
                .issue_batch(event_id, quantity, None)
                .await
                .unwrap_err();
            assert!(matches!(err, TicketError::Validation(_)), "{quantity}");
        }
        assert_eq!(counting.register_calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_registration_writes_nothing() {
        struct DownLedger;

        #[async_trait]
        impl LedgerClient for DownLedger {
            async fn register_batch(
                &self,
                _commitments: &[CommitmentHash],
                _owners: &[OwnerAddress],
                _event_id: EventId,
            ) -> Result<TxHash, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn read_by_commitment(
                &self,
                _commitment: &CommitmentHash,
            ) -> Result<LedgerRecord, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn mark_used(
                &self,
                _commitment: &CommitmentHash,
            ) -> Result<TxHash, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn transfer_owner(
                &self,
                _commitment: &CommitmentHash,
                _new_owner: &OwnerAddress,
                _signer: &SigningKey,
            ) -> Result<TxHash, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn get_event(&self, _event_id: EventId) -> Result<EventDetails, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn get_stats(&self) -> Result<LedgerStats, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn create_event(
                &self,
                _name: &str,
                _date: u64,
                _location: &str,
            ) -> Result<(EventId, TxHash), LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
            async fn attestation(&self) -> Result<ProgramAttestation, LedgerError> {
                Err(LedgerError::Transient("rpc unreachable".to_string()))
            }
        }

        let hasher = Arc::new(CommitmentHasher::new(CommitmentSecret::new(b"s".to_vec())));
        let store = Arc::new(MetadataStore::new());
        let service = TicketLifecycleService::new(
            TicketIdGenerator::with_seed(1),
            hasher,
            Arc::new(DownLedger),
            Arc::clone(&store),
            Arc::new(FixedClock::new(Utc::now())),
        )
        .with_retry_policy(RetryPolicy::none());

        let err = service
            .issue_batch(EventId::new(1), 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::Ledger(LedgerError::Transient(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn duplicate_rejection_regenerates_the_batch() {
        struct CollideOnce {
            inner: InMemoryLedger,
            collisions_left: AtomicUsize,
        }

        #[async_trait]
        impl LedgerClient for CollideOnce {
            async fn register_batch(
                &self,
                commitments: &[CommitmentHash],
                owners: &[OwnerAddress],
                event_id: EventId,
            ) -> Result<TxHash, LedgerError> {
                if self
                    .collisions_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(LedgerError::Rejected(RejectionReason::DuplicateCommitment));
                }
                self.inner.register_batch(commitments, owners, event_id).await
            }
            async fn read_by_commitment(
                &self,
                commitment: &CommitmentHash,
            ) -> Result<LedgerRecord, LedgerError> {
                self.inner.read_by_commitment(commitment).await
            }
            async fn mark_used(
                &self,
                commitment: &CommitmentHash,
            ) -> Result<TxHash, LedgerError> {
                self.inner.mark_used(commitment).await
            }
            async fn transfer_owner(
                &self,
                commitment: &CommitmentHash,
                new_owner: &OwnerAddress,
                signer: &SigningKey,
            ) -> Result<TxHash, LedgerError> {
                self.inner.transfer_owner(commitment, new_owner, signer).await
            }
            async fn get_event(&self, event_id: EventId) -> Result<EventDetails, LedgerError> {
                self.inner.get_event(event_id).await
            }
            async fn get_stats(&self) -> Result<LedgerStats, LedgerError> {
                self.inner.get_stats().await
            }
            async fn create_event(
                &self,
                name: &str,
                date: u64,
                location: &str,
            ) -> Result<(EventId, TxHash), LedgerError> {
                self.inner.create_event(name, date, location).await
            }
            async fn attestation(&self) -> Result<ProgramAttestation, LedgerError> {
                self.inner.attestation().await
            }
        }

        let colliding = Arc::new(CollideOnce {
            inner: InMemoryLedger::default(),
            collisions_left: AtomicUsize::new(1),
        });
        let (event_id, _) = colliding.inner.create_event("C", 1, "x").await.unwrap();
        let hasher = Arc::new(CommitmentHasher::new(CommitmentSecret::new(b"s".to_vec())));
        let store = Arc::new(MetadataStore::new());
        let service = TicketLifecycleService::new(
            TicketIdGenerator::with_seed(1),
            hasher,
            Arc::clone(&colliding) as Arc<dyn LedgerClient>,
            Arc::clone(&store),
            Arc::new(FixedClock::new(Utc::now())),
        );

        let batch = service.issue_batch(event_id, 2, None).await.unwrap();
        assert_eq!(batch.tickets.len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn mark_as_used_is_idempotent_in_effect() {
        let fx = fixture();
        let event_id = event(&fx).await;
        let batch = fx.service.issue_batch(event_id, 1, None).await.unwrap();
        let ticket_id = &batch.tickets[0].ticket_id;

        fx.service.mark_as_used(ticket_id).await.unwrap();
        for _ in 0..2 {
            let err = fx.service.mark_as_used(ticket_id).await.unwrap_err();
            assert_eq!(err, TicketError::AlreadyUsed(ticket_id.clone()));
        }
    }

    #[tokio::test]
    async fn mark_as_used_rejects_unregistered_tickets() {
        let fx = fixture();
        let ticket_id = TicketId::new("EVENT-1-T-NEVERWAS");
        let err = fx.service.mark_as_used(&ticket_id).await.unwrap_err();
        assert_eq!(err, TicketError::NotValid(ticket_id));
    }

    #[tokio::test]
    async fn concurrent_mark_as_used_has_one_winner() {
        let fx = fixture();
        let event_id = event(&fx).await;
        let batch = fx.service.issue_batch(event_id, 1, None).await.unwrap();
        let ticket_id = batch.tickets[0].ticket_id.clone();

        let service = Arc::new(fx.service);
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                let ticket_id = ticket_id.clone();
                tokio::spawn(async move { service.mark_as_used(&ticket_id).await })
            })
            .collect();

        let mut wins = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert_eq!(err, TicketError::AlreadyUsed(ticket_id.clone())),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn transfer_updates_ledger_and_display_copy() {
        let fx = fixture();
        let event_id = event(&fx).await;
        let owner_key = SigningKey::new("owner-key");
        let batch = fx
            .service
            .issue_batch(event_id, 1, Some(owner_key.address()))
            .await
            .unwrap();
        let ticket_id = &batch.tickets[0].ticket_id;
        let new_owner = OwnerAddress::new("0xfeed");

        fx.service
            .transfer(ticket_id, new_owner.clone(), &owner_key)
            .await
            .unwrap();

        assert_eq!(fx.store.get(ticket_id).unwrap().owner, new_owner);
        let commitment = fx.store.get(ticket_id).unwrap().commitment;
        let record = fx.ledger.read_by_commitment(&commitment).await.unwrap();
        assert_eq!(record.owner, new_owner);
    }

    #[tokio::test]
    async fn foreign_credential_cannot_transfer_and_cache_is_untouched() {
        let fx = fixture();
        let event_id = event(&fx).await;
        let owner_key = SigningKey::new("owner-key");
        let batch = fx
            .service
            .issue_batch(event_id, 1, Some(owner_key.address()))
            .await
            .unwrap();
        let ticket_id = &batch.tickets[0].ticket_id;

        let err = fx
            .service
            .transfer(ticket_id, OwnerAddress::new("0xfeed"), &SigningKey::new("thief"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TicketError::Ledger(LedgerError::Rejected(RejectionReason::NotTicketOwner))
        );
        assert_eq!(fx.store.get(ticket_id).unwrap().owner, owner_key.address());
    }

    #[tokio::test]
    async fn transfer_to_zero_address_is_rejected_client_side() {
        let fx = fixture();
        let err = fx
            .service
            .transfer(
                &TicketId::new("EVENT-1-T-AAAAAAAA"),
                OwnerAddress::zero(),
                &SigningKey::new("k"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::Validation(_)));
    }
}
