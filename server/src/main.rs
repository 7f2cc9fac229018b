//! Ticket Registry Server binary.
//!
//! Loads configuration from the environment (`.env` honored), wires the
//! JSON-RPC ledger adapter into the core services, and serves the HTTP API
//! until interrupted.
//!
//! # Usage
//!
//! ```bash
//! REGISTRY_RPC_URL=http://127.0.0.1:8545 \
//! REGISTRY_PROGRAM_ADDRESS=0x... \
//! REGISTRY_WRITE_KEY=... \
//! COMMITMENT_SECRET=... \
//! cargo run --bin ticket-registry-server
//! ```

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_registry_core::{
    CommitmentHasher, LedgerClient, MetadataStore, RetryPolicy, SystemClock, TicketIdGenerator,
    TicketLifecycleService, VerificationService,
};
use ticket_registry_ledger::{FinalityPolicy, JsonRpcLedgerClient};
use ticket_registry_server::{AppState, Config, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticket_registry_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration invalid; refusing to start");
            std::process::exit(1);
        }
    };
    tracing::info!(
        rpc_url = %config.ledger.rpc_url,
        program = %config.ledger.program_address,
        "configuration loaded"
    );

    let ledger: Arc<dyn LedgerClient> = Arc::new(
        JsonRpcLedgerClient::new(
            config.ledger.rpc_url.clone(),
            config.ledger.program_address.clone(),
            config.ledger.write_key.clone(),
            config.ledger.request_timeout,
        )?
        .with_finality(FinalityPolicy {
            attempts: config.ledger.finality_attempts,
            interval: config.ledger.finality_interval,
        }),
    );

    let retry = RetryPolicy {
        max_retries: config.ledger.read_retries,
        ..RetryPolicy::default()
    };
    let hasher = Arc::new(CommitmentHasher::new(config.commitment_secret.clone()));
    let store = Arc::new(MetadataStore::new());

    let lifecycle = Arc::new(
        TicketLifecycleService::new(
            TicketIdGenerator::new(),
            Arc::clone(&hasher),
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::new(SystemClock),
        )
        .with_retry_policy(retry.clone()),
    );
    let verification = Arc::new(
        VerificationService::new(hasher, Arc::clone(&ledger), Arc::clone(&store))
            .with_retry_policy(retry),
    );

    let state = AppState::new(
        lifecycle,
        verification,
        ledger,
        store,
        config.ledger.program_address.clone(),
    );
    let router = build_router(state);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "ticket registry server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
