//! Domain types for the ticket registry.
//!
//! This module contains the value objects shared by every component: ticket
//! and event identifiers, owner addresses, commitment hashes, and the record
//! types read from the ledger or held in the local metadata cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifier::SUFFIX_LENGTH;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event, assigned by the ledger's event counter.
///
/// Event identifiers are 1-based; `0` only appears inside the zeroed record
/// the ledger returns for an unknown commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Creates an `EventId` from a raw counter value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque printable ticket identifier: `EVENT-<eventId>-T-<8 chars A-Z0-9>`.
///
/// Identifiers are *practically* unique (36^8 suffix space), never unique by
/// construction; the ledger's duplicate-commitment rejection is the backstop.
/// The identifier itself never reaches the ledger - only its commitment does.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Wraps a raw identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the documented `EVENT-<eventId>-T-<suffix>` shape.
    ///
    /// Malformed identifiers are still verifiable (they hash to commitments
    /// the ledger has never seen and classify as unregistered); this check
    /// exists for diagnostics and tests, not as an admission gate.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.split('-');
        let (Some(prefix), Some(event), Some(tag), Some(suffix), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        prefix == "EVENT"
            && tag == "T"
            && !event.is_empty()
            && event.bytes().all(|b| b.is_ascii_digit())
            && suffix.len() == SUFFIX_LENGTH
            && suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Extracts the event identifier embedded in a well-formed ticket id.
    #[must_use]
    pub fn embedded_event_id(&self) -> Option<EventId> {
        if !self.is_well_formed() {
            return None;
        }
        self.0.split('-').nth(1)?.parse().ok().map(EventId::new)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Addresses and transaction references
// ============================================================================

/// The all-zero owner address: a bearer ticket, claimable by whoever
/// presents the identifier.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// A ledger account address, used both as the on-chain owner and as the
/// display copy cached in ticket metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerAddress(String);

impl OwnerAddress {
    /// Wraps a raw address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The zero-address bearer sentinel.
    #[must_use]
    pub fn zero() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    /// Whether this is the bearer sentinel.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a submitted ledger transaction, usable for audit display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Wraps a raw transaction reference.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Commitment hash
// ============================================================================

/// Error returned when parsing a commitment hash from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid commitment hash: {0}")]
pub struct ParseCommitmentError(String);

/// A 32-byte secret-bound digest of a ticket identifier.
///
/// This is the only value the ledger ever learns about a ticket. The mapping
/// identifier → commitment is one-directional: the ledger stores commitments
/// alone, so a caller must present the identifier to have it re-derived.
///
/// Renders and serializes as a fixed-length lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitmentHash([u8; 32]);

impl CommitmentHash {
    /// Wraps a raw digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the digest as 64 lowercase hex characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a digest from its hex form (an optional `0x` prefix is
    /// accepted).
    ///
    /// # Errors
    ///
    /// Returns [`ParseCommitmentError`] if the input is not exactly 32 bytes
    /// of hex.
    pub fn from_hex(input: &str) -> Result<Self, ParseCommitmentError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(stripped)
            .map_err(|err| ParseCommitmentError(err.to_string()))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseCommitmentError("expected 32 bytes".to_string()))?;
        Ok(Self(digest))
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({})", self.to_hex())
    }
}

impl TryFrom<String> for CommitmentHash {
    type Error = ParseCommitmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<CommitmentHash> for String {
    fn from(hash: CommitmentHash) -> Self {
        hash.to_hex()
    }
}

// ============================================================================
// Ledger-owned records
// ============================================================================

/// The authoritative on-chain state for one commitment.
///
/// Owned and mutated only by the ledger; read-only here. `is_valid` is true
/// iff the ledger holds a record for the commitment; once `used` is set it
/// never reverts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Current on-chain owner (zero address for bearer tickets).
    pub owner: OwnerAddress,
    /// Whether the ticket has been consumed. Permanent once true.
    pub used: bool,
    /// Event the commitment was registered under.
    pub event_id: EventId,
    /// Registration time in unix seconds (`0` when never registered).
    pub registered_at: u64,
    /// Whether a record exists for the queried commitment.
    pub is_valid: bool,
}

impl LedgerRecord {
    /// The zeroed record the ledger returns for an unknown commitment.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            owner: OwnerAddress::zero(),
            used: false,
            event_id: EventId::new(0),
            registered_at: 0,
            is_valid: false,
        }
    }

    /// Whether the record carries a real registration timestamp.
    #[must_use]
    pub const fn registered_on_chain(&self) -> bool {
        self.registered_at != 0
    }
}

/// Descriptive event fields, owned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Event name.
    pub name: String,
    /// Event date in unix seconds.
    pub date: u64,
    /// Venue / location description.
    pub location: String,
    /// Whether the event still accepts registrations.
    pub active: bool,
}

/// Aggregate counters maintained by the ledger program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Number of events created.
    pub total_events: u64,
    /// Number of ticket commitments registered.
    pub total_tickets: u64,
}

/// Existence attestation for the ledger program, for proof display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramAttestation {
    /// Address the registry program is deployed at.
    pub program_address: String,
    /// Whether code exists at that address.
    pub code_exists: bool,
    /// Length of the deployed code.
    pub code_length: u64,
    /// Ledger block height at the time of the read.
    pub block_height: u64,
}

// ============================================================================
// Locally cached metadata
// ============================================================================

/// Process-local descriptive record for an issued ticket.
///
/// Purely supplementary display data: never authoritative for genuineness or
/// use-state (the ledger is), created at issuance, owner updated on transfer,
/// never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMetadata {
    /// The ticket identifier this record describes.
    pub ticket_id: TicketId,
    /// The commitment registered for the identifier.
    pub commitment: CommitmentHash,
    /// Event the ticket admits to.
    pub event_id: EventId,
    /// Display copy of the owner address.
    pub owner: OwnerAddress,
    /// When this process issued the ticket.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_ticket_id_round_trips_event_id() {
        let id = TicketId::new("EVENT-42-T-A1B2C3D4");
        assert!(id.is_well_formed());
        assert_eq!(id.embedded_event_id(), Some(EventId::new(42)));
    }

    #[test]
    fn malformed_ticket_ids_are_detected() {
        for raw in [
            "",
            "EVENT-42-T-short",
            "EVENT-42-T-a1b2c3d4", // lowercase suffix
            "EVENT--T-A1B2C3D4",
            "TICKET-42-T-A1B2C3D4",
            "EVENT-42-X-A1B2C3D4",
            "EVENT-42-T-A1B2C3D4-EXTRA",
        ] {
            assert!(!TicketId::new(raw).is_well_formed(), "accepted {raw:?}");
        }
    }

    #[test]
    fn commitment_hash_hex_round_trip() {
        let hash = CommitmentHash::from_bytes([7u8; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(CommitmentHash::from_hex(&hex).unwrap(), hash);
        assert_eq!(CommitmentHash::from_hex(&format!("0x{hex}")).unwrap(), hash);
    }

    #[test]
    fn commitment_hash_rejects_bad_hex() {
        assert!(CommitmentHash::from_hex("zz").is_err());
        assert!(CommitmentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn commitment_hash_serializes_as_hex_string() {
        let hash = CommitmentHash::from_bytes([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: CommitmentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn zero_address_is_bearer_sentinel() {
        assert!(OwnerAddress::zero().is_zero());
        assert!(!OwnerAddress::new("0xabc").is_zero());
    }

    #[test]
    fn absent_record_is_invalid_and_unregistered() {
        let record = LedgerRecord::absent();
        assert!(!record.is_valid);
        assert!(!record.registered_on_chain());
    }
}
