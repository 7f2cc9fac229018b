//! HTTP handlers: thin adapters from request DTOs to the core services.

pub mod events;
pub mod health;
pub mod tickets;
