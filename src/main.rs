// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command of the Message tracker API server.

use cotm_tracker::{
    config::{Config, StoreBackend},
    db::{EntityStore, FirestoreDb, MemoryStore},
    services::LlmScoringClient,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Command of the Message tracker API");

    let store: Arc<dyn EntityStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if config.scoring_api_url.is_none() {
        tracing::warn!("SCORING_API_URL not set; scored submissions will be rejected");
    }
    let scoring = Arc::new(LlmScoringClient::new(
        config.scoring_api_url.clone(),
        config.scoring_model.clone(),
        config.scoring_api_key.clone(),
    ));

    let state = Arc::new(AppState::new(config.clone(), store, scoring));

    // Build router
    let app = cotm_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cotm_tracker=debug,info")),
        )
        .with(format)
        .init();
}
