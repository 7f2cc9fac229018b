//! # Ticket Registry Server
//!
//! HTTP surface over the ticket commitment protocol: thin axum handlers
//! wired to the core verification/lifecycle services and the JSON-RPC
//! ledger adapter. All invariants live in `ticket-registry-core`; this
//! crate is configuration, routing, and error-to-HTTP bridging.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
