//! # Ticket Registry Core
//!
//! The ticket commitment and state-reconciliation protocol: collision-
//! resistant identifier generation, secret-bound commitment derivation,
//! atomic batch registration against an authoritative external ledger, and
//! the verification/lifecycle services that reconcile ledger truth with
//! locally cached metadata.
//!
//! ## Architecture
//!
//! - [`identifier::TicketIdGenerator`] produces event-scoped identifiers
//!   from an injectable RNG.
//! - [`commitment::CommitmentHasher`] derives the fixed-size commitment the
//!   ledger stores - the identifier itself never leaves this process.
//! - [`ledger::LedgerClient`] abstracts the registry program; the JSON-RPC
//!   adapter lives in `ticket-registry-ledger`, and
//!   [`ledger::InMemoryLedger`] mirrors the program's semantics for tests
//!   and local development.
//! - [`store::MetadataStore`] caches descriptive fields not economical to
//!   keep on-chain; never authoritative for validity.
//! - [`verification::VerificationService`] merges ledger and cache reads
//!   into one verdict; [`lifecycle::TicketLifecycleService`] drives
//!   issuance, use-marking, and transfer.
//!
//! ## Invariants
//!
//! A ticket is *genuine* iff the ledger holds a record for its commitment;
//! *usable* iff genuine and not used; cache presence is neither necessary
//! nor sufficient for genuineness.

pub mod clock;
pub mod commitment;
pub mod error;
pub mod identifier;
pub mod ledger;
pub mod lifecycle;
pub mod retry;
pub mod store;
pub mod types;
pub mod verification;

pub use clock::{Clock, FixedClock, SystemClock};
pub use commitment::{CommitmentHasher, CommitmentSecret};
pub use error::TicketError;
pub use identifier::TicketIdGenerator;
pub use ledger::{
    InMemoryLedger, LedgerClient, LedgerError, MAX_BATCH_SIZE, RejectionReason, SigningKey,
};
pub use lifecycle::{IssuedBatch, IssuedTicket, TicketLifecycleService};
pub use retry::{RetryPolicy, retry_read};
pub use store::MetadataStore;
pub use types::{
    CommitmentHash, EventDetails, EventId, LedgerRecord, LedgerStats, OwnerAddress,
    ProgramAttestation, TicketId, TicketMetadata, TxHash, ZERO_ADDRESS,
};
pub use verification::{LedgerProof, Verification, VerificationService, VerificationStatus};
