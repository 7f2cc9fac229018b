//! Router configuration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{events, health, tickets};
use crate::state::AppState;

/// Build the complete router: health probe plus the `/api` surface.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Ledger aggregates and events
        .route("/stats", get(events::get_stats))
        .route("/events", post(events::create_event))
        .route("/events/:event_id", get(events::get_event))
        // Ticket lifecycle
        .route("/tickets/generate", post(tickets::generate_tickets))
        .route("/tickets/verify/:ticket_id", get(tickets::verify_ticket))
        .route("/tickets/mark-used", post(tickets::mark_used))
        .route("/tickets/transfer", post(tickets::transfer_ticket))
        // Cache and proof reads
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:ticket_id", get(tickets::get_ticket_metadata))
        .route("/tickets/:ticket_id/proof", get(tickets::ledger_proof));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .with_state(state)
}
