//! Ticket lifecycle endpoints.
//!
//! - `POST /api/tickets/generate` - issue a batch
//! - `GET  /api/tickets/verify/:ticket_id` - verification verdict
//! - `POST /api/tickets/mark-used` - consume a ticket
//! - `POST /api/tickets/transfer` - transfer ownership
//! - `GET  /api/tickets` - list cached metadata
//! - `GET  /api/tickets/:ticket_id` - one cached record
//! - `GET  /api/tickets/:ticket_id/proof` - raw on-chain evidence

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use ticket_registry_core::{
    EventId, IssuedTicket, LedgerProof, OwnerAddress, SigningKey, TicketError, TicketId,
    TicketMetadata, TxHash, Verification,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Request to issue a batch of tickets.
#[derive(Debug, Deserialize)]
pub struct GenerateTicketsRequest {
    /// Event the tickets admit to.
    pub event_id: u64,
    /// Batch size, 1..=100.
    pub quantity: u32,
    /// Owner address; omitted means bearer tickets (zero address).
    #[serde(default)]
    pub owner: Option<String>,
}

/// Response after issuing a batch.
#[derive(Debug, Serialize)]
pub struct GenerateTicketsResponse {
    /// Issued tickets, in generation order.
    pub tickets: Vec<IssuedTicket>,
    /// Registration transaction, for audit display.
    pub tx_hash: TxHash,
}

/// Issue a batch of tickets in one atomic ledger registration.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:4000/api/tickets/generate \
///   -H "Content-Type: application/json" \
///   -d '{"event_id": 1, "quantity": 3}'
/// ```
pub async fn generate_tickets(
    State(state): State<AppState>,
    Json(request): Json<GenerateTicketsRequest>,
) -> Result<Json<GenerateTicketsResponse>, ApiError> {
    let owner = request.owner.map(OwnerAddress::new);
    let batch = state
        .lifecycle
        .issue_batch(EventId::new(request.event_id), request.quantity, owner)
        .await?;
    Ok(Json(GenerateTicketsResponse {
        tickets: batch.tickets,
        tx_hash: batch.tx_hash,
    }))
}

/// Verify a ticket: merged ledger + cache verdict with classification.
pub async fn verify_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Verification>, ApiError> {
    let verdict = state.verification.verify(&TicketId::new(ticket_id)).await?;
    Ok(Json(verdict))
}

/// Request to mark a ticket as used.
#[derive(Debug, Deserialize)]
pub struct MarkUsedRequest {
    /// The identifier presented at the gate.
    pub ticket_id: String,
}

/// Response after consuming a ticket.
#[derive(Debug, Serialize)]
pub struct MarkUsedResponse {
    /// The consumed identifier.
    pub ticket_id: TicketId,
    /// The use-marking transaction.
    pub tx_hash: TxHash,
}

/// Consume a ticket (Valid → Used, one-way). Racing calls get exactly one
/// winner; losers receive `ALREADY_USED`.
pub async fn mark_used(
    State(state): State<AppState>,
    Json(request): Json<MarkUsedRequest>,
) -> Result<Json<MarkUsedResponse>, ApiError> {
    let ticket_id = TicketId::new(request.ticket_id);
    let tx_hash = state.lifecycle.mark_as_used(&ticket_id).await?;
    Ok(Json(MarkUsedResponse { ticket_id, tx_hash }))
}

/// Request to transfer ticket ownership.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// The ticket to transfer.
    pub ticket_id: String,
    /// Destination address.
    pub new_owner: String,
    /// The current owner's signing credential. Never logged.
    pub owner_key: String,
}

/// Response after a transfer.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    /// The transferred identifier.
    pub ticket_id: TicketId,
    /// Destination address.
    pub new_owner: OwnerAddress,
    /// The transfer transaction.
    pub tx_hash: TxHash,
}

/// Transfer ownership under the current owner's credential. The ledger
/// rejects credentials that do not match the recorded owner.
pub async fn transfer_ticket(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let ticket_id = TicketId::new(request.ticket_id);
    let new_owner = OwnerAddress::new(request.new_owner);
    let credential = SigningKey::new(request.owner_key);

    let tx_hash = state
        .lifecycle
        .transfer(&ticket_id, new_owner.clone(), &credential)
        .await?;
    Ok(Json(TransferResponse {
        ticket_id,
        new_owner,
        tx_hash,
    }))
}

/// Cached metadata listing.
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    /// Every cached record, ordered by identifier.
    pub tickets: Vec<TicketMetadata>,
    /// Number of records.
    pub count: usize,
}

/// List the local metadata cache. Display data only - the ledger remains
/// the source of truth for validity and use-state.
pub async fn list_tickets(State(state): State<AppState>) -> Json<ListTicketsResponse> {
    let tickets = state.store.all();
    let count = tickets.len();
    Json(ListTicketsResponse { tickets, count })
}

/// One cached metadata record; 404 when this process never cataloged the
/// identifier (distinct from ledger invalidity).
pub async fn get_ticket_metadata(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketMetadata>, ApiError> {
    let ticket_id = TicketId::new(ticket_id);
    let metadata = state
        .store
        .get(&ticket_id)
        .ok_or(TicketError::NotFound(ticket_id))?;
    Ok(Json(metadata))
}

/// Raw on-chain evidence for a ticket: ledger record, program attestation,
/// and block height.
pub async fn ledger_proof(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<LedgerProof>, ApiError> {
    let proof = state
        .verification
        .ledger_proof(&TicketId::new(ticket_id))
        .await?;
    Ok(Json(proof))
}
