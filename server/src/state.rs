//! Application state shared across HTTP handlers.

use std::sync::Arc;

use ticket_registry_core::{
    LedgerClient, MetadataStore, TicketLifecycleService, VerificationService,
};

/// Shared resources for the API handlers, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// Issuance and state-transition orchestration.
    pub lifecycle: Arc<TicketLifecycleService>,
    /// Verification and proof assembly.
    pub verification: Arc<VerificationService>,
    /// Direct ledger reads (stats, event details).
    pub ledger: Arc<dyn LedgerClient>,
    /// The local metadata cache, for listings.
    pub store: Arc<MetadataStore>,
    /// Registry program address, for health display.
    pub program_address: String,
}

impl AppState {
    /// Bundles the shared services.
    #[must_use]
    pub fn new(
        lifecycle: Arc<TicketLifecycleService>,
        verification: Arc<VerificationService>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<MetadataStore>,
        program_address: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            verification,
            ledger,
            store,
            program_address: program_address.into(),
        }
    }
}
