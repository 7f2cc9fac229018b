//! Event management endpoints.
//!
//! - `POST /api/events` - create an event on the ledger
//! - `GET  /api/events/:event_id` - read event details
//! - `GET  /api/stats` - ledger aggregate counters

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use ticket_registry_core::{EventDetails, EventId, TxHash};

use crate::error::ApiError;
use crate::state::AppState;

/// Request to create a new event.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Event name.
    pub name: String,
    /// Event date in unix seconds.
    pub date: u64,
    /// Venue / location description.
    pub location: String,
}

/// Response after creating an event.
#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    /// Ledger-assigned event identifier.
    pub event_id: EventId,
    /// Creation transaction, for audit display.
    pub tx_hash: TxHash,
}

/// Create a new event on the ledger.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:4000/api/events \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Rock Festival", "date": 1930000000, "location": "Jakarta"}'
/// ```
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<CreateEventResponse>, ApiError> {
    if request.name.trim().is_empty() || request.location.trim().is_empty() {
        return Err(ApiError::bad_request(
            "missing required fields: name, location",
        ));
    }

    let (event_id, tx_hash) = state
        .ledger
        .create_event(&request.name, request.date, &request.location)
        .await?;
    tracing::info!(%event_id, %tx_hash, "event created");
    Ok(Json(CreateEventResponse { event_id, tx_hash }))
}

/// Read event details from the ledger.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
) -> Result<Json<EventDetails>, ApiError> {
    let details = state.ledger.get_event(EventId::new(event_id)).await?;
    Ok(Json(details))
}

/// Aggregate counters response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of events created.
    pub total_events: u64,
    /// Number of ticket commitments registered.
    pub total_tickets: u64,
}

/// Read the registry program's aggregate counters.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.ledger.get_stats().await?;
    Ok(Json(StatsResponse {
        total_events: stats.total_events,
        total_tickets: stats.total_tickets,
    }))
}
