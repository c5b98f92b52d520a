//! Tandem Server - HTTP front end for two-store table reconciliation.
//!
//! Exposes a status surface and a sync trigger over the tandem-engine
//! reconciliation core. The two remote stores sit behind HTTP adapters; a
//! store left unconfigured degrades to a "Not configured" status instead of
//! failing startup.

mod adapters;
mod config;
mod error;
mod routes;

use crate::adapters::{SheetsAdapter, WorkbookAdapter};
use crate::config::Config;
use axum::Router;
use std::sync::Arc;
use tandem_engine::{ReconciliationEngine, SourceAdapter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Tandem Server on {}:{}", config.host, config.port);
    if config.sheets.is_none() {
        tracing::warn!("store A (sheets) is not configured; syncs will fail until it is");
    }
    if config.workbook.is_none() {
        tracing::warn!("store B (workbook) is not configured; syncs will fail until it is");
    }

    // One HTTP client shared by both store adapters
    let client = reqwest::Client::builder()
        .user_agent(concat!("tandem-server/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let store_a: Arc<dyn SourceAdapter> =
        Arc::new(SheetsAdapter::new(client.clone(), config.sheets.clone()));
    let store_b: Arc<dyn SourceAdapter> =
        Arc::new(WorkbookAdapter::new(client, config.workbook.clone()));

    let engine = Arc::new(ReconciliationEngine::new(
        store_a,
        store_b,
        config.engine_config(),
    ));

    let state = AppState { engine };

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
